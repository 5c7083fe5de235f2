//! Database models for rust-scast.
//!
//! These models map directly to the database schema.

pub mod account;
pub mod media;
pub mod plan;

pub use account::*;
pub use media::*;
pub use plan::*;
