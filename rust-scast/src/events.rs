//! Session events published to live subscribers.
//!
//! Delivery is fire-and-forget: an event reaches the subscribers connected at
//! the moment it is published and is never replayed.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Why a session left the running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every input was played and looping is disabled.
    InputExhausted,
    /// Stopped on request.
    Stopped,
    /// Replaced by a newer session.
    Superseded,
    /// The account's daily limit was reached while streaming.
    QuotaExhausted,
    /// The encoding engine failed.
    EngineFailed,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputExhausted => "input_exhausted",
            Self::Stopped => "stopped",
            Self::Superseded => "superseded",
            Self::QuotaExhausted => "quota_exhausted",
            Self::EngineFailed => "engine_failed",
        }
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event published to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A session started streaming.
    Start {
        session_id: String,
        account_id: String,
        message: String,
    },
    /// Periodic statistics, emitted whenever usage is charged.
    Stats {
        /// Elapsed media time as `HH:MM:SS.ss`.
        duration: String,
        duration_secs: f64,
        /// Bitrate estimate such as `"3012 kbps"`, or `"N/A"`.
        bitrate: String,
        /// Seconds left of the daily quota.
        usage_remaining: u64,
    },
    Error {
        message: String,
    },
    /// A session left the running state.
    End {
        session_id: String,
        reason: EndReason,
    },
}

impl StreamEvent {
    /// Get a description of the event for logging.
    pub fn description(&self) -> String {
        match self {
            Self::Start { session_id, .. } => format!("Session started: {}", session_id),
            Self::Stats {
                duration,
                usage_remaining,
                ..
            } => format!("Stats: {} elapsed, {}s remaining", duration, usage_remaining),
            Self::Error { message } => format!("Error: {}", message),
            Self::End { session_id, reason } => {
                format!("Session {} ended: {}", session_id, reason)
            }
        }
    }
}

/// Sink the session controller publishes events into.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: StreamEvent);
}

/// Default channel capacity for session events.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast-channel publisher with any number of subscribers.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<StreamEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new broadcaster with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for EventBroadcaster {
    fn publish(&self, event: StreamEvent) {
        tracing::debug!("Publishing stream event: {}", event.description());
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

/// Format media seconds as `HH:MM:SS.ss`.
pub fn format_timemark(secs: f64) -> String {
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    let whole = secs.trunc() as u64;
    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let seconds = secs - (hours * 3600 + minutes * 60) as f64;
    format!("{:02}:{:02}:{:05.2}", hours, minutes, seconds)
}

/// Format a bitrate estimate for display.
pub fn format_bitrate(kbps: Option<f64>) -> String {
    match kbps {
        Some(kbps) if kbps.is_finite() && kbps >= 0.0 => format!("{} kbps", kbps.round() as u64),
        _ => "N/A".to_string(),
    }
}
