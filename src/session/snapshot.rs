use crate::audio::{AudioSummary, ConversationTurn, RecorderState};
use crate::modality::ModalityActivation;
use crate::transport::SessionState;
use crate::video::{CaptureState, VideoObservation, VideoStats};
use serde::Serialize;

/// Everything a dashboard needs to render, published after every change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub activation: ModalityActivation,
    pub video: VideoSnapshot,
    pub audio: AudioSnapshot,
    pub combined_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoSnapshot {
    pub session_id: Option<String>,
    pub transport: Option<SessionState>,
    pub capture: CaptureState,
    pub is_analyzing: bool,
    pub stats: VideoStats,
    /// Every observation of the current session, oldest first
    pub observations: Vec<VideoObservation>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioSnapshot {
    pub session_id: Option<String>,
    pub transport: Option<SessionState>,
    pub recorder: RecorderState,
    pub is_recording: bool,
    /// An upload is out and no reply has arrived yet
    pub awaiting_response: bool,
    pub conversation: Vec<ConversationTurn>,
    /// Last summary requested, if any
    pub summary: Option<AudioSummary>,
    pub error: Option<String>,
    pub playback_open: bool,
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        Self {
            activation: ModalityActivation::default(),
            video: VideoSnapshot {
                session_id: None,
                transport: None,
                capture: CaptureState::Idle,
                is_analyzing: false,
                stats: VideoStats::default(),
                observations: Vec::new(),
                error: None,
            },
            audio: AudioSnapshot {
                session_id: None,
                transport: None,
                recorder: RecorderState::Idle,
                is_recording: false,
                awaiting_response: false,
                conversation: Vec::new(),
                summary: None,
                error: None,
                playback_open: false,
            },
            combined_score: None,
        }
    }
}
