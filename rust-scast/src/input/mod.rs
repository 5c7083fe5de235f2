//! Input assembly.
//!
//! Decides what the encoding engine is fed for a selection of stored media
//! and provides the audio chain that turns a list of audio files into one
//! continuous byte stream.

mod assembler;
mod feeder;
mod plan;

pub use assembler::{StartOptions, assemble, assemble_with_probe};
pub use feeder::{AudioChainFeeder, DEFAULT_CHUNK_SIZE, FeederExit};
pub use plan::{AudioMixPlan, InputPlan, PlaylistPlan};
