//! Domain layer for rust-scast.
//!
//! Media items as the broadcaster sees them and the plan rules that gate them.

pub mod media;
pub mod plan;

pub use media::{MediaItem, MediaType};
pub use plan::PlanPolicy;
