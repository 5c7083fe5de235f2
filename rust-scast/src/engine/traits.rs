//! Encoding engine trait and related types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::input::InputPlan;

/// Capacity of the per-job event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Progress reported by a running job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineProgress {
    /// Media time pushed to the destination so far, in seconds.
    pub elapsed_secs: f64,
    /// Current output bitrate estimate in kbit/s.
    pub bitrate_kbps: Option<f64>,
    /// Encoding speed relative to real time.
    pub speed: Option<f64>,
}

/// Events emitted by a launched job.
///
/// Exactly one terminal event (`Ended`, `Failed` or `Terminated`) closes
/// the sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Progress(EngineProgress),
    /// The input ran out and the engine finished cleanly.
    Ended,
    /// The engine stopped on its own with an error.
    Failed { cause: String },
    /// The job was killed through [`EngineHandle::terminate`].
    Terminated,
}

impl EngineEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Create the two ends of a job: the handle given to the caller and the
/// reporter kept by the engine.
pub fn engine_channel(id: impl Into<String>) -> (EngineHandle, EngineReporter) {
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let cancellation_token = CancellationToken::new();
    let exited = CancellationToken::new();

    let handle = EngineHandle {
        id: id.into(),
        started_at: Utc::now(),
        cancellation_token: cancellation_token.clone(),
        exited: exited.clone(),
        events: Some(events_rx),
    };
    let reporter = EngineReporter {
        events_tx,
        cancellation_token,
        exited,
    };
    (handle, reporter)
}

/// Caller side of a launched job.
pub struct EngineHandle {
    id: String,
    started_at: DateTime<Utc>,
    cancellation_token: CancellationToken,
    exited: CancellationToken,
    events: Option<mpsc::Receiver<EngineEvent>>,
}

impl EngineHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Take the event stream. Returns `None` once taken.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<EngineEvent>> {
        self.events.take()
    }

    /// Kill the job immediately. Idempotent.
    pub fn terminate(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Whether the engine has released every resource of the job.
    pub fn has_exited(&self) -> bool {
        self.exited.is_cancelled()
    }

    /// Wait until the engine has released every resource of the job.
    pub async fn wait_exited(&self) {
        self.exited.cancelled().await;
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("id", &self.id)
            .field("started_at", &self.started_at)
            .field("terminated", &self.is_terminated())
            .field("exited", &self.has_exited())
            .finish()
    }
}

/// Engine side of a launched job.
///
/// Dropping the reporter marks the job as exited.
pub struct EngineReporter {
    events_tx: mpsc::Sender<EngineEvent>,
    cancellation_token: CancellationToken,
    exited: CancellationToken,
}

impl EngineReporter {
    /// Token cancelled when the caller terminates the job.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Report progress. Never blocks; progress is dropped when the caller
    /// is not keeping up. Returns whether the event was queued.
    pub fn report_progress(&self, progress: EngineProgress) -> bool {
        self.events_tx
            .try_send(EngineEvent::Progress(progress))
            .is_ok()
    }

    /// Mark the job as exited and deliver its terminal event.
    pub async fn finish(self, outcome: EngineEvent) {
        debug_assert!(outcome.is_terminal());
        self.exited.cancel();
        let _ = self.events_tx.send(outcome).await;
    }
}

impl Drop for EngineReporter {
    fn drop(&mut self) {
        self.exited.cancel();
    }
}

/// Trait for encoding engines.
#[async_trait]
pub trait EncodingEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &'static str;

    /// Launch a job that encodes `plan` and pushes it to `destination`.
    ///
    /// Returns as soon as the engine has accepted the job. Progress and the
    /// terminal event are delivered through the handle's event stream.
    async fn launch(&self, plan: &InputPlan, destination: &str) -> Result<EngineHandle>;

    /// Check if the engine is available (e.g., binary exists).
    fn is_available(&self) -> bool;

    /// Get the engine version string.
    fn version(&self) -> Option<String>;
}
