use crate::audio::AudioEvent;
use crate::error::ModalityError;
use crate::modality::Modality;
use crate::transport::TransportEvent;
use crate::video::VideoEvent;
use tokio::sync::{mpsc, oneshot};

use super::snapshot::DashboardSnapshot;

/// Requests accepted by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleVideo,
    ToggleAudio,
    StartVideo,
    StopVideo,
    StartRecording,
    StopRecording,
    ComputeAudioSummary,
    DismissError(Modality),
    Snapshot,
    Shutdown,
}

pub(crate) struct Request {
    pub command: Command,
    pub reply: oneshot::Sender<Result<DashboardSnapshot, ModalityError>>,
}

/// Completion of some asynchronous step, fed back into the orchestrator
pub enum Event {
    Transport(TransportEvent),
    Video(VideoEvent),
    Audio(AudioEvent),
}

/// Receiving side of every event source the orchestrator spawns work on
pub struct EventInbox {
    pub(crate) transport: mpsc::UnboundedReceiver<TransportEvent>,
    pub(crate) video: mpsc::UnboundedReceiver<VideoEvent>,
    pub(crate) audio: mpsc::UnboundedReceiver<AudioEvent>,
}

impl EventInbox {
    /// Next event from any source; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<Event> {
        tokio::select! {
            Some(event) = self.transport.recv() => Some(Event::Transport(event)),
            Some(event) = self.video.recv() => Some(Event::Video(event)),
            Some(event) = self.audio.recv() => Some(Event::Audio(event)),
            else => None,
        }
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<Event> {
        if let Ok(event) = self.transport.try_recv() {
            return Some(Event::Transport(event));
        }
        if let Ok(event) = self.video.try_recv() {
            return Some(Event::Video(event));
        }
        self.audio.try_recv().ok().map(Event::Audio)
    }
}
