//! Broadcast session orchestration.
//!
//! The [`SessionController`] owns the single live session and its usage
//! accounting; the [`StreamService`] resolves caller requests into it.

mod controller;
mod meter;
mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{
    DEFAULT_STOP_TIMEOUT, DEFAULT_USAGE_DEBOUNCE_SECS, SessionConfig, SessionController,
    SessionSnapshot, SessionStatus, StartRequest,
};
pub use meter::UsageMeter;
pub use service::{StartSessionRequest, StreamService, StreamStatus, validate_destination};
