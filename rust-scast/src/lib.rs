//! rust-scast library crate.
//!
//! A single-session live broadcaster: assembles stored media into an input
//! plan, drives ffmpeg to push it to a streaming destination and enforces a
//! daily per-account usage quota.

pub mod api;
pub mod config;
pub mod database;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod input;
pub mod logging;
pub mod session;

pub use error::{Error, Result};
