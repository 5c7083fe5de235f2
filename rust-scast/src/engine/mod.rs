//! Encoding engine abstraction.
//!
//! This module defines the `EncodingEngine` trait, the handle a launched job
//! is controlled through, and the ffmpeg-backed implementation.

mod ffmpeg;
mod traits;
pub mod utils;

pub use ffmpeg::{FfmpegEngine, FfmpegEngineConfig};
pub use traits::{
    EncodingEngine, EngineEvent, EngineHandle, EngineProgress, EngineReporter, engine_channel,
};
