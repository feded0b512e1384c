// Shared fixtures for integration tests: an in-memory analysis service,
// scriptable devices and an orchestrator harness.

#![allow(dead_code)]

use anyhow::Result;
use image::{Rgb, RgbImage};
use modality_sessions::audio::{
    FileMicrophone, MicrophoneConstraints, MicrophoneDevice, MicrophoneProvider, PcmClip,
    PlaybackOutput, PlaybackProvider,
};
use modality_sessions::protocol::WireFrame;
use modality_sessions::transport::{ChannelHandle, Connector};
use modality_sessions::video::{CameraConstraints, CameraDevice, CameraProvider};
use modality_sessions::{
    Config, DashboardSnapshot, Devices, ModalityError, Orchestrator, OrchestratorHandle,
};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

pub const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// In-memory analysis service
// ============================================================================

/// The service's side of one accepted channel
pub struct ServerEnd {
    pub url: String,
    pub from_client: mpsc::UnboundedReceiver<WireFrame>,
    pub to_client: mpsc::UnboundedSender<WireFrame>,
}

impl ServerEnd {
    /// The client still holds its end
    pub fn is_live(&self) -> bool {
        !self.to_client.is_closed()
    }

    pub fn send_text(&self, text: &str) {
        let _ = self.to_client.send(WireFrame::Text(text.to_string()));
    }

    pub async fn next_frame(&mut self) -> Option<WireFrame> {
        tokio::time::timeout(WAIT, self.from_client.recv()).await.ok().flatten()
    }
}

/// Accepts every connection in memory, optionally holding handshakes until released
#[derive(Clone, Default)]
pub struct MemoryConnector {
    servers: Arc<Mutex<Vec<ServerEnd>>>,
    attempts: Arc<AtomicUsize>,
    refuse: bool,
    gate: Option<Arc<Semaphore>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connect attempt fails
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Connect attempts wait until `release` is called
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn release(&self, handshakes: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(handshakes);
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> usize {
        self.servers.lock().unwrap().len()
    }

    pub fn live_channels(&self, fragment: &str) -> usize {
        self.servers
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.url.contains(fragment) && s.is_live())
            .count()
    }

    /// Accepted channels whose client side can still send
    pub fn writable_channels(&self, fragment: &str) -> usize {
        self.servers
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.url.contains(fragment) && !s.from_client.is_closed())
            .count()
    }

    /// Remove and return the most recent server end whose URL contains `fragment`
    pub fn take_latest(&self, fragment: &str) -> Option<ServerEnd> {
        let mut servers = self.servers.lock().unwrap();
        let index = servers.iter().rposition(|s| s.url.contains(fragment))?;
        Some(servers.remove(index))
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<ChannelHandle, ModalityError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| ModalityError::ChannelConnectFailed(e.to_string()))?;
            permit.forget();
        }

        if self.refuse {
            return Err(ModalityError::ChannelConnectFailed(format!("{}: refused", url)));
        }

        let (outbound, from_client) = mpsc::unbounded_channel();
        let (to_client, inbound) = mpsc::unbounded_channel();

        self.servers.lock().unwrap().push(ServerEnd {
            url: url.to_string(),
            from_client,
            to_client,
        });

        Ok(ChannelHandle { outbound, inbound })
    }
}

// ============================================================================
// Devices
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Allow,
    Deny,
    Missing,
}

impl Grant {
    fn check(self, what: &str) -> Result<(), ModalityError> {
        match self {
            Grant::Allow => Ok(()),
            Grant::Deny => Err(ModalityError::DeviceAccessDenied(format!("{} permission denied", what))),
            Grant::Missing => Err(ModalityError::DeviceUnavailable(format!("no {} found", what))),
        }
    }
}

/// Camera that always has a solid grey frame ready
pub struct FakeCamera {
    released: Arc<AtomicUsize>,
}

impl CameraDevice for FakeCamera {
    fn grab_frame(&mut self) -> Result<Option<RgbImage>, ModalityError> {
        Ok(Some(RgbImage::from_pixel(320, 240, Rgb([90, 90, 90]))))
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "fake camera"
    }
}

#[derive(Clone)]
pub struct FakeCameraProvider {
    pub grant: Grant,
    pub requests: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl FakeCameraProvider {
    pub fn new(grant: Grant) -> Self {
        Self {
            grant,
            requests: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl CameraProvider for FakeCameraProvider {
    async fn request(&self, _constraints: &CameraConstraints) -> Result<Box<dyn CameraDevice>, ModalityError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.grant.check("camera")?;
        Ok(Box::new(FakeCamera {
            released: Arc::clone(&self.released),
        }))
    }
}

/// Hands out `FileMicrophone`s replaying an in-memory recording
#[derive(Clone)]
pub struct FakeMicrophoneProvider {
    pub grant: Grant,
    pub recording: Arc<Vec<u8>>,
    pub requests: Arc<AtomicUsize>,
}

impl FakeMicrophoneProvider {
    pub fn new(grant: Grant, recording: Vec<u8>) -> Self {
        Self {
            grant,
            recording: Arc::new(recording),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl MicrophoneProvider for FakeMicrophoneProvider {
    async fn request(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<Box<dyn MicrophoneDevice>, ModalityError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.grant.check("microphone")?;
        Ok(Box::new(FileMicrophone::from_bytes(
            PathBuf::from("capture.wav"),
            self.recording.as_ref().clone(),
            constraints.timeslice,
        )))
    }
}

/// Playback output that keeps every clip it was asked to play
#[derive(Clone, Default)]
pub struct RecordingPlayback {
    pub played: Arc<Mutex<Vec<PcmClip>>>,
    pub acquired: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

struct RecordingOutput {
    played: Arc<Mutex<Vec<PcmClip>>>,
    closed: Arc<AtomicUsize>,
}

impl PlaybackOutput for RecordingOutput {
    fn play(&mut self, clip: PcmClip) -> Result<(), ModalityError> {
        self.played.lock().unwrap().push(clip);
        Ok(())
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl PlaybackProvider for RecordingPlayback {
    fn acquire(&self, _session_id: &str) -> Result<Box<dyn PlaybackOutput>, ModalityError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingOutput {
            played: Arc::clone(&self.played),
            closed: Arc::clone(&self.closed),
        }))
    }
}

// ============================================================================
// Audio fixtures
// ============================================================================

/// A sine tone as a 16-bit WAV container
pub fn tone_wav(sample_rate: u32, channels: u16, seconds: f32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        let frames = (sample_rate as f32 * seconds) as usize;
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5 * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(sample)?;
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

// ============================================================================
// Orchestrator harness
// ============================================================================

pub struct Harness {
    pub handle: OrchestratorHandle,
    pub connector: MemoryConnector,
    pub camera: FakeCameraProvider,
    pub microphone: FakeMicrophoneProvider,
    pub playback: RecordingPlayback,
}

pub struct HarnessBuilder {
    connector: MemoryConnector,
    camera: Grant,
    microphone: Grant,
    recording: Option<Vec<u8>>,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            connector: MemoryConnector::new(),
            camera: Grant::Allow,
            microphone: Grant::Allow,
            recording: None,
        }
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for<F>(&self, predicate: F) -> Result<DashboardSnapshot>
    where
        F: FnMut(&DashboardSnapshot) -> bool,
    {
        let mut rx = self.handle.subscribe();
        let snapshot = tokio::time::timeout(WAIT, rx.wait_for(predicate)).await??;
        Ok(snapshot.clone())
    }
}

impl HarnessBuilder {
    pub fn connector(mut self, connector: MemoryConnector) -> Self {
        self.connector = connector;
        self
    }

    pub fn camera(mut self, grant: Grant) -> Self {
        self.camera = grant;
        self
    }

    pub fn microphone(mut self, grant: Grant) -> Self {
        self.microphone = grant;
        self
    }

    pub fn recording(mut self, recording: Vec<u8>) -> Self {
        self.recording = Some(recording);
        self
    }

    pub fn build(self) -> Result<Harness> {
        let mut config = Config::default();
        config.remote.base_url = "ws://analysis.test".to_string();
        config.video.frame_interval_ms = 20;
        config.audio.timeslice_ms = 10;

        let recording = match self.recording {
            Some(recording) => recording,
            None => tone_wav(48000, 2, 0.25)?,
        };

        let camera = FakeCameraProvider::new(self.camera);
        let microphone = FakeMicrophoneProvider::new(self.microphone, recording);
        let playback = RecordingPlayback::default();

        let devices = Devices {
            camera: Arc::new(camera.clone()),
            microphone: Arc::new(microphone.clone()),
            playback: Arc::new(playback.clone()),
        };

        let (orchestrator, inbox) =
            Orchestrator::new(Arc::new(config), Arc::new(self.connector.clone()), devices);
        let handle = orchestrator.spawn(inbox);

        Ok(Harness {
            handle,
            connector: self.connector,
            camera,
            microphone,
            playback,
        })
    }
}

/// Poll `condition` until it holds or the wait times out
pub async fn eventually<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
