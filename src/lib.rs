pub mod aggregate;
pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod modality;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod video;

pub use aggregate::combined_score;
pub use audio::{
    AudioPipeline, AudioSummary, Conversation, ConversationTurn, DirectoryPlaybackProvider,
    FileMicrophoneProvider, MicrophoneProvider, PlaybackProvider, RecorderState, Speaker,
};
pub use config::Config;
pub use error::{CommandError, ModalityError, OrchestratorClosed};
pub use http::{create_router, AppState};
pub use modality::{Modality, ModalityActivation};
pub use session::{Command, DashboardSnapshot, Devices, Orchestrator, OrchestratorHandle};
pub use transport::{Connector, SessionState, TransportSession, WebSocketConnector};
pub use video::{CameraProvider, CaptureState, StillImageCameraProvider, VideoPipeline, VideoStats};
