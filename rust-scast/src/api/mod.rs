//! HTTP control surface.
//!
//! Stream start/stop/status routes, a WebSocket relay for session events and
//! health checks, served with axum.

pub mod error;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState};
