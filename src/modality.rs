use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two independent analysis streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Video,
    Audio,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Video => "video",
            Modality::Audio => "audio",
        }
    }

    /// Prefix used when allocating a fresh session id for this modality
    pub fn session_prefix(&self) -> &'static str {
        match self {
            Modality::Video => "video-session",
            Modality::Audio => "audio-session",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which modalities the user has switched on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalityActivation {
    pub video: bool,
    pub audio: bool,
}

impl ModalityActivation {
    pub fn is_active(&self, modality: Modality) -> bool {
        match modality {
            Modality::Video => self.video,
            Modality::Audio => self.audio,
        }
    }

    pub fn set(&mut self, modality: Modality, active: bool) {
        match modality {
            Modality::Video => self.video = active,
            Modality::Audio => self.audio = active,
        }
    }
}

/// Allocate a session id that has never been handed out before
pub fn new_session_id(modality: Modality) -> String {
    format!("{}-{}", modality.session_prefix(), uuid::Uuid::new_v4())
}
