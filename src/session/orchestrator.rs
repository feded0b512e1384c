use super::events::{Command, Event, EventInbox};
use super::snapshot::{AudioSnapshot, DashboardSnapshot, VideoSnapshot};
use crate::aggregate::combined_score;
use crate::audio::{
    AudioEvent, AudioPipeline, AudioSummary, MicrophoneProvider, PlaybackContext, PlaybackProvider,
};
use crate::config::Config;
use crate::error::ModalityError;
use crate::modality::{new_session_id, Modality, ModalityActivation};
use crate::protocol::{decode_audio, decode_video, encode_video_frame, AudioInbound, VideoInbound, WireFrame};
use crate::transport::{ChannelEvent, Connector, SessionState, TransportEvent, TransportSession};
use crate::video::{CameraProvider, VideoEvent, VideoObservation, VideoPipeline};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

const VIDEO_SERVER_ERROR: &str = "Video server error occurred";
const AUDIO_SERVER_ERROR: &str = "Audio server error occurred";
const TRANSCRIPTION_FAILED: &str = "Could not understand the audio. Please speak clearly and try again.";

/// Device providers the orchestrator draws from
#[derive(Clone)]
pub struct Devices {
    pub camera: Arc<dyn CameraProvider>,
    pub microphone: Arc<dyn MicrophoneProvider>,
    pub playback: Arc<dyn PlaybackProvider>,
}

/// Owner of every piece of per-modality state
///
/// All mutation happens through `execute` and `handle_event`, one call at a
/// time. `spawn` moves the orchestrator into its own task and hands back an
/// `OrchestratorHandle`.
pub struct Orchestrator {
    config: Arc<Config>,
    connector: Arc<dyn Connector>,
    playback_provider: Arc<dyn PlaybackProvider>,
    transport_events: mpsc::UnboundedSender<TransportEvent>,

    activation: ModalityActivation,

    video_session: Option<TransportSession>,
    video: VideoPipeline,
    video_error: Option<String>,

    audio_session: Option<TransportSession>,
    audio: AudioPipeline,
    audio_error: Option<String>,
    audio_summary: Option<AudioSummary>,
    awaiting_response: bool,
    playback: Option<PlaybackContext>,

    snapshots: watch::Sender<DashboardSnapshot>,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>, connector: Arc<dyn Connector>, devices: Devices) -> (Self, EventInbox) {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (video_tx, video_rx) = mpsc::unbounded_channel();
        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(DashboardSnapshot::default());

        let video = VideoPipeline::new(devices.camera, config.video.pipeline(), video_tx);
        let audio = AudioPipeline::new(devices.microphone, config.audio.constraints(), audio_tx);

        let orchestrator = Self {
            config,
            connector,
            playback_provider: devices.playback,
            transport_events: transport_tx,
            activation: ModalityActivation::default(),
            video_session: None,
            video,
            video_error: None,
            audio_session: None,
            audio,
            audio_error: None,
            audio_summary: None,
            awaiting_response: false,
            playback: None,
            snapshots,
        };

        let inbox = EventInbox {
            transport: transport_rx,
            video: video_rx,
            audio: audio_rx,
        };

        (orchestrator, inbox)
    }

    pub fn activation(&self) -> ModalityActivation {
        self.activation
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshots.subscribe()
    }

    /// Apply one command and publish the resulting state
    pub fn execute(&mut self, command: Command) -> Result<DashboardSnapshot, ModalityError> {
        debug!("Command: {:?}", command);

        let outcome = match command {
            Command::ToggleVideo => {
                self.toggle(Modality::Video);
                Ok(())
            }
            Command::ToggleAudio => {
                self.toggle(Modality::Audio);
                Ok(())
            }
            Command::StartVideo => self.start_video(),
            Command::StopVideo => {
                self.stop_video();
                Ok(())
            }
            Command::StartRecording => self.start_recording(),
            Command::StopRecording => {
                self.stop_recording();
                Ok(())
            }
            Command::ComputeAudioSummary => self.compute_audio_summary(),
            Command::DismissError(modality) => {
                *self.error_slot(modality) = None;
                Ok(())
            }
            Command::Snapshot => Ok(()),
            Command::Shutdown => {
                self.teardown();
                Ok(())
            }
        };

        let snapshot = self.publish();
        outcome.map(|_| snapshot)
    }

    /// Fold the result of an asynchronous step into the state
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Transport(event) => self.on_transport(event),
            Event::Video(event) => self.on_video(event),
            Event::Audio(event) => self.on_audio(event),
        }
        self.publish();
    }

    /// Current state, built fresh
    pub fn snapshot(&self) -> DashboardSnapshot {
        let video_stats = self.video.stats();

        DashboardSnapshot {
            activation: self.activation,
            combined_score: combined_score(&self.activation, &video_stats, self.audio_summary.as_ref()),
            video: VideoSnapshot {
                session_id: self.video_session.as_ref().map(|s| s.id().to_string()),
                transport: self.video_session.as_ref().map(TransportSession::state),
                capture: self.video.state(),
                is_analyzing: self.video.is_streaming(),
                stats: video_stats,
                observations: self.video.observations().to_vec(),
                error: self.video_error.clone(),
            },
            audio: AudioSnapshot {
                session_id: self.audio_session.as_ref().map(|s| s.id().to_string()),
                transport: self.audio_session.as_ref().map(TransportSession::state),
                recorder: self.audio.state(),
                is_recording: self.audio.is_recording(),
                awaiting_response: self.awaiting_response,
                conversation: self.audio.conversation().turns().to_vec(),
                summary: self.audio_summary.clone(),
                error: self.audio_error.clone(),
                playback_open: self.playback.as_ref().is_some_and(|p| !p.is_closed()),
            },
        }
    }

    /// Close both sessions, release both devices and the playback context
    ///
    /// Safe regardless of which modalities were ever active.
    pub fn teardown(&mut self) {
        info!("Tearing down all modality sessions");
        self.deactivate(Modality::Video);
        self.deactivate(Modality::Audio);
    }

    fn publish(&self) -> DashboardSnapshot {
        let next = self.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        next
    }

    // ------------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------------

    fn toggle(&mut self, modality: Modality) {
        if self.activation.is_active(modality) {
            self.deactivate(modality);
        } else {
            self.activate(modality);
        }
    }

    fn activate(&mut self, modality: Modality) {
        info!("Activating {} module", modality);
        self.activation.set(modality, true);
        *self.error_slot(modality) = None;

        self.open_session(modality);

        if modality == Modality::Audio {
            self.acquire_playback();
        }
    }

    fn deactivate(&mut self, modality: Modality) {
        if self.activation.is_active(modality) {
            info!("Deactivating {} module", modality);
        }
        self.activation.set(modality, false);

        match modality {
            Modality::Video => {
                self.video.stop();
                self.video.clear_history();
            }
            Modality::Audio => {
                self.audio.cancel();
                self.audio.conversation_mut().clear();
                self.audio_summary = None;
                self.awaiting_response = false;
                if let Some(mut playback) = self.playback.take() {
                    playback.close();
                }
            }
        }

        if let Some(mut session) = self.session_slot(modality).take() {
            session.close();
        }

        *self.error_slot(modality) = None;
    }

    fn acquire_playback(&mut self) {
        if self.playback.as_ref().is_some_and(|p| !p.is_closed()) {
            return;
        }

        let owner = self
            .audio_session
            .as_ref()
            .map(|s| s.id().to_string())
            .unwrap_or_else(|| new_session_id(Modality::Audio));

        match self.playback_provider.acquire(&owner) {
            Ok(output) => self.playback = Some(PlaybackContext::new(output)),
            Err(e) => {
                warn!("Playback unavailable: {}", e);
                self.playback = None;
            }
        }
    }

    /// Replace the modality's session with a freshly keyed one
    fn open_session(&mut self, modality: Modality) {
        if let Some(mut previous) = self.session_slot(modality).take() {
            previous.close();
        }

        let session_id = new_session_id(modality);
        let url = self.config.remote.endpoint(modality, &session_id);
        let session = TransportSession::open(
            modality,
            session_id,
            url,
            Arc::clone(&self.connector),
            self.transport_events.clone(),
        );

        *self.session_slot(modality) = Some(session);
    }

    /// Reopen the session if it has ended; a live one is left alone
    fn ensure_session(&mut self, modality: Modality) {
        let reusable = self
            .session_slot(modality)
            .as_ref()
            .is_some_and(|s| matches!(s.state(), SessionState::Connecting | SessionState::Open));

        if !reusable {
            self.open_session(modality);
        }
    }

    fn session_slot(&mut self, modality: Modality) -> &mut Option<TransportSession> {
        match modality {
            Modality::Video => &mut self.video_session,
            Modality::Audio => &mut self.audio_session,
        }
    }

    fn error_slot(&mut self, modality: Modality) -> &mut Option<String> {
        match modality {
            Modality::Video => &mut self.video_error,
            Modality::Audio => &mut self.audio_error,
        }
    }

    // ------------------------------------------------------------------
    // Pipeline commands
    // ------------------------------------------------------------------

    fn start_video(&mut self) -> Result<(), ModalityError> {
        if !self.activation.video {
            return Err(ModalityError::Inactive(Modality::Video));
        }

        self.ensure_session(Modality::Video);
        self.video_error = None;
        self.video.start();
        Ok(())
    }

    fn stop_video(&mut self) {
        self.video.stop();
        if let Some(session) = self.video_session.as_mut() {
            session.close();
        }
    }

    fn start_recording(&mut self) -> Result<(), ModalityError> {
        if !self.activation.audio {
            return Err(ModalityError::Inactive(Modality::Audio));
        }

        self.ensure_session(Modality::Audio);
        self.acquire_playback();
        self.audio_error = None;
        self.audio.start();
        Ok(())
    }

    fn stop_recording(&mut self) {
        if self.audio.stop() {
            self.awaiting_response = true;
        }
    }

    fn compute_audio_summary(&mut self) -> Result<(), ModalityError> {
        if !self.activation.audio {
            return Err(ModalityError::Inactive(Modality::Audio));
        }

        let summary = self.audio.conversation().summary();
        info!(
            "Audio summary: {} messages, {} flagged, average confidence {:.3}",
            summary.total_messages, summary.flagged_count, summary.average_confidence
        );
        self.audio_summary = Some(summary);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    fn on_transport(&mut self, event: TransportEvent) {
        let TransportEvent {
            modality,
            session_id,
            event,
        } = event;

        let current = self
            .session_slot(modality)
            .as_mut()
            .filter(|s| s.id() == session_id);

        let Some(session) = current else {
            // A replaced or closed session; a late channel is dropped here and closes
            debug!("Ignoring event for stale {} session {}", modality, session_id);
            return;
        };

        match event {
            ChannelEvent::Opened(outbound) => {
                session.attach(outbound);
            }
            ChannelEvent::Frame(frame) => match modality {
                Modality::Video => self.on_video_frame(&frame),
                Modality::Audio => self.on_audio_frame(&frame),
            },
            ChannelEvent::Failed(error) => {
                session.fail(&error);
                *self.error_slot(modality) = Some(error.user_message(modality));
                self.halt(modality);
            }
            ChannelEvent::Closed => {
                session.mark_closed();
                if modality == Modality::Audio {
                    self.awaiting_response = false;
                }
            }
        }
    }

    /// Stop the modality's capture after its channel failed; activation is kept
    fn halt(&mut self, modality: Modality) {
        match modality {
            Modality::Video => self.video.stop(),
            Modality::Audio => {
                self.audio.cancel();
                self.awaiting_response = false;
            }
        }
    }

    fn on_video_frame(&mut self, frame: &WireFrame) {
        let message = match decode_video(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping video message: {}", e);
                return;
            }
        };

        match message {
            VideoInbound::Analysis {
                emotion,
                score,
                timestamp,
            } => {
                debug!("Video analysis: {} ({:.3})", emotion, score);
                self.video.record(VideoObservation {
                    emotion,
                    score,
                    timestamp,
                });
            }
            VideoInbound::Error { message } => {
                let message = message.unwrap_or_else(|| VIDEO_SERVER_ERROR.to_string());
                warn!("Video server error: {}", message);
                self.video_error = Some(message);
            }
            VideoInbound::Unknown => {}
        }
    }

    fn on_audio_frame(&mut self, frame: &WireFrame) {
        let message = match decode_audio(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping audio message: {}", e);
                return;
            }
        };

        match message {
            AudioInbound::AiResponse {
                text_response,
                confidence_score,
                is_depressed,
                audio_response,
                transcription,
            } => {
                self.awaiting_response = false;
                self.audio
                    .conversation_mut()
                    .push_exchange(transcription, text_response, confidence_score, is_depressed);

                if let Some(encoded) = audio_response.filter(|a| !a.is_empty()) {
                    match self.playback.as_mut() {
                        Some(playback) => {
                            if let Err(e) = playback.play_base64_wav(&encoded) {
                                warn!("Failed to play response audio: {}", e);
                            }
                        }
                        None => debug!("No playback context, skipping response audio"),
                    }
                }
            }
            AudioInbound::TranscriptionFailed { message } => {
                self.awaiting_response = false;
                self.audio_error = Some(message.unwrap_or_else(|| TRANSCRIPTION_FAILED.to_string()));
            }
            AudioInbound::Error { message } => {
                self.awaiting_response = false;
                let message = message.unwrap_or_else(|| AUDIO_SERVER_ERROR.to_string());
                warn!("Audio server error: {}", message);
                self.audio_error = Some(message);
            }
            AudioInbound::Unknown => {}
        }
    }

    fn on_video(&mut self, event: VideoEvent) {
        match event {
            VideoEvent::DeviceReady { generation, result } => {
                if let Err(e) = self.video.on_device_ready(generation, result) {
                    self.video_error = Some(e.user_message(Modality::Video));
                }
            }
            VideoEvent::FrameEncoded { generation, jpeg } => {
                if !self.video.accepts_frame(generation) {
                    debug!("Dropping frame from stopped capture (generation {})", generation);
                    return;
                }
                if let Some(session) = self.video_session.as_mut() {
                    session.send(encode_video_frame(jpeg));
                }
            }
        }
    }

    fn on_audio(&mut self, event: AudioEvent) {
        match event {
            AudioEvent::DeviceReady { generation, result } => {
                if let Err(e) = self.audio.on_device_ready(generation, result) {
                    self.audio_error = Some(e.user_message(Modality::Audio));
                }
            }
            AudioEvent::PayloadReady { generation, result } => {
                match self.audio.on_payload_ready(generation, result) {
                    None => {}
                    Some(Ok(frame)) => match self.audio_session.as_mut() {
                        Some(session) if session.is_open() => {
                            info!("Uploading recording ({} bytes) on {}", frame.len(), session.id());
                            session.send(frame);
                        }
                        _ => {
                            warn!("Audio session not open, recording dropped");
                            self.awaiting_response = false;
                        }
                    },
                    Some(Err(e)) => {
                        self.awaiting_response = false;
                        self.audio_error = Some(e.user_message(Modality::Audio));
                    }
                }
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Drive the orchestrator until shutdown or until every handle is dropped
pub(crate) async fn run(
    mut orchestrator: Orchestrator,
    mut commands: mpsc::Receiver<super::events::Request>,
    mut inbox: EventInbox,
) {
    info!("Session orchestrator started");

    loop {
        tokio::select! {
            request = commands.recv() => {
                let Some(request) = request else {
                    debug!("All orchestrator handles dropped");
                    orchestrator.teardown();
                    orchestrator.publish();
                    break;
                };

                let shutdown = request.command == Command::Shutdown;
                let result = orchestrator.execute(request.command);
                let _ = request.reply.send(result);

                if shutdown {
                    break;
                }
            }
            Some(event) = inbox.recv() => orchestrator.handle_event(event),
        }
    }

    info!("Session orchestrator stopped");
}
