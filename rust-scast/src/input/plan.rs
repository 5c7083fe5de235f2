//! Resolved input plans.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A video playlist streamed as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistPlan {
    pub files: Vec<PathBuf>,
    pub looping: bool,
}

/// A chain of audio files with a still image as the video track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMixPlan {
    pub audio_files: Vec<PathBuf>,
    pub looping: bool,
    /// `None` means a generated black frame.
    pub overlay_image: Option<PathBuf>,
}

/// What the encoding engine is fed for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputPlan {
    Playlist(PlaylistPlan),
    AudioMix(AudioMixPlan),
}

impl InputPlan {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Playlist(_) => "playlist",
            Self::AudioMix(_) => "audio_mix",
        }
    }

    pub fn is_looping(&self) -> bool {
        match self {
            Self::Playlist(plan) => plan.looping,
            Self::AudioMix(plan) => plan.looping,
        }
    }

    /// The media files that make up the main input, in play order.
    pub fn files(&self) -> &[PathBuf] {
        match self {
            Self::Playlist(plan) => &plan.files,
            Self::AudioMix(plan) => &plan.audio_files,
        }
    }
}
