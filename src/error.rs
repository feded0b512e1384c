//! Error taxonomy shared by the transport, both capture pipelines and the orchestrator

use crate::modality::Modality;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModalityError {
    #[error("Device access denied: {0}")]
    DeviceAccessDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Channel connect failed: {0}")]
    ChannelConnectFailed(String),

    /// Malformed or unexpected inbound frame. Logged, never surfaced.
    #[error("Channel protocol error: {0}")]
    ChannelProtocol(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("The {0} module is not active")]
    Inactive(Modality),
}

impl ModalityError {
    /// The string shown to the user for this failure on the given modality
    pub fn user_message(&self, modality: Modality) -> String {
        let message = match (self, modality) {
            (ModalityError::DeviceAccessDenied(_), Modality::Video) => {
                "Camera access was denied. Please enable camera permissions."
            }
            (ModalityError::DeviceAccessDenied(_), Modality::Audio) => {
                "Microphone access was denied. Please enable microphone permissions."
            }
            (ModalityError::DeviceUnavailable(_), Modality::Video) => {
                "Failed to access camera. Please check your device."
            }
            (ModalityError::DeviceUnavailable(_), Modality::Audio) => {
                "Failed to access microphone. Please check your device."
            }
            (ModalityError::ChannelConnectFailed(_), Modality::Video) => {
                "Failed to connect to video analysis server"
            }
            (ModalityError::ChannelConnectFailed(_), Modality::Audio) => {
                "Failed to connect to audio analysis server"
            }
            (ModalityError::ProcessingFailed(_), Modality::Video) => "Failed to process video frame",
            (ModalityError::ProcessingFailed(_), Modality::Audio) => "Failed to process audio",
            (ModalityError::ChannelProtocol(_), _) | (ModalityError::Inactive(_), _) => {
                return self.to_string();
            }
        };
        message.to_string()
    }

    /// Protocol errors are recovered locally and never reach the user
    pub fn is_surfaced(&self) -> bool {
        !matches!(self, ModalityError::ChannelProtocol(_))
    }
}

/// The orchestrator task is gone; its handle can no longer deliver commands
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Session orchestrator has shut down")]
pub struct OrchestratorClosed;

/// Why a command sent through an orchestrator handle did not produce a snapshot
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error(transparent)]
    Rejected(#[from] ModalityError),

    #[error(transparent)]
    Closed(#[from] OrchestratorClosed),
}
