//! Session controller.
//!
//! Owns the single broadcast session of the process. Start, stop and the
//! per-session progress handling are serialized through one async mutex, so
//! a quota-triggered stop can race a caller's stop or a new start without
//! releasing the engine twice.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use super::meter::UsageMeter;
use crate::database::repositories::{PlanPolicyProvider, UsageLedger};
use crate::domain::{MediaItem, PlanPolicy};
use crate::engine::{EncodingEngine, EngineEvent, EngineHandle, EngineProgress};
use crate::events::{EndReason, EventPublisher, StreamEvent, format_bitrate, format_timemark};
use crate::input::{InputPlan, StartOptions, assemble};
use crate::{Error, Result};

/// Default media seconds that must pass before usage is charged.
pub const DEFAULT_USAGE_DEBOUNCE_SECS: u64 = 5;

/// Default bound on waiting for a terminated engine to exit.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Session controller configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Media seconds that must pass before usage is charged.
    pub usage_debounce_secs: u64,
    /// How long a stop waits for the engine to release the job.
    pub stop_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            usage_debounce_secs: DEFAULT_USAGE_DEBOUNCE_SECS,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// Lifecycle status of the session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request to start broadcasting resolved media items.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub account_id: String,
    /// Selected items in broadcast order.
    pub items: Vec<MediaItem>,
    /// Streaming destination URL.
    pub destination: String,
    pub options: StartOptions,
}

/// Point-in-time view of the active session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub account_id: String,
    pub status: SessionStatus,
    /// `playlist` or `audio_mix`.
    pub kind: String,
    pub looping: bool,
    pub started_at: DateTime<Utc>,
    /// Media seconds charged to the account by this session.
    pub charged_secs: u64,
}

struct ActiveSession {
    generation: u64,
    session_id: String,
    account_id: String,
    plan: InputPlan,
    /// Policy seen at start, used when a re-read fails.
    policy: PlanPolicy,
    started_at: DateTime<Utc>,
    meter: UsageMeter,
    handle: EngineHandle,
}

#[derive(Default)]
struct ControllerState {
    active: Option<ActiveSession>,
    /// Bumped on every launch so events of a superseded job are ignored.
    generation: u64,
}

struct Inner {
    engine: Arc<dyn EncodingEngine>,
    ledger: Arc<dyn UsageLedger>,
    policies: Arc<dyn PlanPolicyProvider>,
    publisher: Arc<dyn EventPublisher>,
    config: SessionConfig,
    state: Mutex<ControllerState>,
    status: RwLock<SessionStatus>,
}

/// Drives the single broadcast session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        engine: Arc<dyn EncodingEngine>,
        ledger: Arc<dyn UsageLedger>,
        policies: Arc<dyn PlanPolicyProvider>,
        publisher: Arc<dyn EventPublisher>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                ledger,
                policies,
                publisher,
                config,
                state: Mutex::new(ControllerState::default()),
                status: RwLock::new(SessionStatus::Idle),
            }),
        }
    }

    /// Start a session, replacing the active one if any.
    ///
    /// Returns once the engine has accepted the job. Nothing is stopped when
    /// the request is rejected before launch.
    pub async fn start(&self, request: StartRequest) -> Result<SessionSnapshot> {
        let StartRequest {
            account_id,
            items,
            destination,
            options,
        } = request;

        if items.is_empty() {
            return Err(Error::invalid_selection("No media items selected"));
        }

        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        let policy = inner.policies.get_policy(&account_id).await?;
        let usage = inner.ledger.get_usage(&account_id).await?;
        if policy.is_exhausted(usage) {
            info!(
                "Rejecting start for account {}: daily limit reached ({}s of {}s)",
                account_id, usage, policy.daily_limit_secs
            );
            return Err(Error::QuotaExhausted {
                usage_secs: usage,
                limit_secs: policy.daily_limit_secs,
            });
        }

        let plan = assemble(&items, &policy, &options)?;

        if state.active.is_some() {
            inner.stop_locked(&mut state, EndReason::Superseded).await;
        }

        inner.set_status(SessionStatus::Starting);
        info!(
            "Starting {} session for account {} ({} files, loop: {})",
            plan.kind(),
            account_id,
            plan.files().len(),
            plan.is_looping()
        );

        let mut handle = match inner.engine.launch(&plan, &destination).await {
            Ok(handle) => handle,
            Err(e) => {
                inner.set_status(SessionStatus::Idle);
                error!("Engine {} rejected the session: {}", inner.engine.name(), e);
                return Err(match e {
                    Error::Engine(_) => e,
                    other => Error::engine(other.to_string()),
                });
            }
        };

        let Some(events) = handle.take_events() else {
            handle.terminate();
            inner.set_status(SessionStatus::Idle);
            return Err(Error::engine("Engine handle has no event stream"));
        };

        state.generation += 1;
        let generation = state.generation;
        let session = ActiveSession {
            generation,
            session_id: uuid::Uuid::new_v4().to_string(),
            account_id,
            plan,
            policy,
            started_at: Utc::now(),
            meter: UsageMeter::new(inner.config.usage_debounce_secs),
            handle,
        };

        inner.set_status(SessionStatus::Running);
        let snapshot = session.snapshot(SessionStatus::Running);
        state.active = Some(session);

        tokio::spawn(Inner::monitor(Arc::clone(inner), generation, events));

        inner.publisher.publish(StreamEvent::Start {
            session_id: snapshot.session_id.clone(),
            account_id: snapshot.account_id.clone(),
            message: format!("Broadcast started ({})", snapshot.kind),
        });
        info!("Session {} is running", snapshot.session_id);

        Ok(snapshot)
    }

    /// Stop the active session. Returns whether a session was running.
    ///
    /// Idempotent and infallible.
    pub async fn stop(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        self.inner.stop_locked(&mut state, EndReason::Stopped).await
    }

    /// Whether a session is starting or running.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status(),
            SessionStatus::Starting | SessionStatus::Running
        )
    }

    pub fn status(&self) -> SessionStatus {
        *self.inner.status.read()
    }

    /// Snapshot of the active session, if any.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let state = self.inner.state.lock().await;
        state
            .active
            .as_ref()
            .map(|session| session.snapshot(self.status()))
    }
}

impl ActiveSession {
    fn snapshot(&self, status: SessionStatus) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            account_id: self.account_id.clone(),
            status,
            kind: self.plan.kind().to_string(),
            looping: self.plan.is_looping(),
            started_at: self.started_at,
            charged_secs: self.meter.charged_secs(),
        }
    }
}

impl Inner {
    fn set_status(&self, status: SessionStatus) {
        *self.status.write() = status;
    }

    /// Terminate and release the active session. Caller holds the state lock.
    async fn stop_locked(&self, state: &mut ControllerState, reason: EndReason) -> bool {
        let Some(session) = state.active.take() else {
            return false;
        };

        self.set_status(SessionStatus::Stopping);
        info!("Stopping session {} ({})", session.session_id, reason);

        session.handle.terminate();
        if tokio::time::timeout(self.config.stop_timeout, session.handle.wait_exited())
            .await
            .is_err()
        {
            warn!(
                "Engine job {} did not exit within {:?}",
                session.handle.id(),
                self.config.stop_timeout
            );
        }

        self.set_status(SessionStatus::Idle);
        self.publisher.publish(StreamEvent::End {
            session_id: session.session_id,
            reason,
        });
        true
    }

    /// Consume the event stream of one launched job.
    async fn monitor(self: Arc<Self>, generation: u64, mut events: mpsc::Receiver<EngineEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::Progress(progress) => self.on_progress(generation, progress).await,
                terminal => {
                    self.on_terminal(generation, terminal).await;
                    return;
                }
            }
        }

        self.on_terminal(
            generation,
            EngineEvent::Failed {
                cause: "Engine event stream closed unexpectedly".to_string(),
            },
        )
        .await;
    }

    async fn on_progress(&self, generation: u64, progress: EngineProgress) {
        let mut state = self.state.lock().await;
        let Some(session) = state
            .active
            .as_mut()
            .filter(|session| session.generation == generation)
        else {
            return;
        };

        let Some(charge) = session.meter.due(progress.elapsed_secs) else {
            return;
        };

        let usage = match self.ledger.add_usage(&session.account_id, charge).await {
            Ok(usage) => usage,
            Err(e) => {
                warn!(
                    "Failed to record {}s of usage for account {}: {}",
                    charge, session.account_id, e
                );
                return;
            }
        };
        session.meter.commit(charge);

        let policy = match self.policies.get_policy(&session.account_id).await {
            Ok(policy) => {
                session.policy = policy.clone();
                policy
            }
            Err(e) => {
                warn!(
                    "Failed to re-read plan policy for account {}: {}",
                    session.account_id, e
                );
                session.policy.clone()
            }
        };

        debug!(
            session_id = %session.session_id,
            charged = charge,
            usage,
            limit = policy.daily_limit_secs,
            "Usage recorded"
        );

        if policy.is_exhausted(usage) {
            info!(
                "Account {} reached its daily limit ({}s of {}s)",
                session.account_id, usage, policy.daily_limit_secs
            );
            self.publisher.publish(StreamEvent::Error {
                message: format!(
                    "Daily broadcast limit reached ({}s used of {}s)",
                    usage, policy.daily_limit_secs
                ),
            });
            self.stop_locked(&mut state, EndReason::QuotaExhausted)
                .await;
            return;
        }

        self.publisher.publish(StreamEvent::Stats {
            duration: format_timemark(progress.elapsed_secs),
            duration_secs: progress.elapsed_secs,
            bitrate: format_bitrate(progress.bitrate_kbps),
            usage_remaining: policy.remaining_secs(usage),
        });
    }

    async fn on_terminal(&self, generation: u64, event: EngineEvent) {
        let mut state = self.state.lock().await;
        let Some(session) = state
            .active
            .take_if(|session| session.generation == generation)
        else {
            debug!("Ignoring {:?} from a released engine job", event);
            return;
        };

        let reason = match event {
            EngineEvent::Ended => {
                info!("Session {} finished: input exhausted", session.session_id);
                EndReason::InputExhausted
            }
            EngineEvent::Failed { cause } => {
                error!("Session {} failed: {}", session.session_id, cause);
                self.publisher.publish(StreamEvent::Error { message: cause });
                EndReason::EngineFailed
            }
            _ => {
                info!("Session {} terminated by the engine", session.session_id);
                EndReason::Stopped
            }
        };

        self.set_status(SessionStatus::Idle);
        self.publisher.publish(StreamEvent::End {
            session_id: session.session_id,
            reason,
        });
    }
}
