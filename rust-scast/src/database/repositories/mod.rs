//! Repository layer for database access.
//!
//! Each collaborator the broadcaster consumes is a trait here with an SQLx
//! implementation next to it.

pub mod account;
pub mod media;
pub mod plan;
pub mod usage;

pub use account::*;
pub use media::*;
pub use plan::*;
pub use usage::*;
