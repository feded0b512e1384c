use crate::error::ModalityError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What the pipeline asks of a microphone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrophoneConstraints {
    /// Target sample rate hint (the device may ignore it; audio is resampled later)
    pub sample_rate: u32,
    /// Target channel count hint
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    /// How often the device should deliver an encoded chunk
    pub timeslice: Duration,
}

impl Default for MicrophoneConstraints {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // Service expects 16kHz
            channels: 1,        // Mono
            echo_cancellation: true,
            noise_suppression: true,
            timeslice: Duration::from_millis(500),
        }
    }
}

/// A piece of the device's native encoded stream
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub data: Vec<u8>,
    /// Milliseconds since recording started
    pub timestamp_ms: u64,
}

/// Microphone capture device
///
/// Delivers its native container format in chunks; concatenating every chunk
/// in order yields one container. The recording is only usable if its codec is
/// one `decode_container` supports (Opus is not).
pub trait MicrophoneDevice: Send {
    /// Start capturing
    ///
    /// Returns a channel receiver that will receive encoded chunks. The channel
    /// closes after `stop` once the final chunk has been delivered.
    fn start(&mut self) -> Result<mpsc::Receiver<EncodedChunk>, ModalityError>;

    /// Stop capturing and release the device. Idempotent.
    fn stop(&mut self);

    /// Check if device is currently capturing
    fn is_capturing(&self) -> bool;

    /// Container format hint for the decoder (e.g. "wav", "ogg")
    fn container_hint(&self) -> Option<&str> {
        None
    }

    /// Get device name for logging
    fn name(&self) -> &str;
}

/// Grants exclusive microphone access
///
/// Must report `DeviceAccessDenied` for permission refusals and
/// `DeviceUnavailable` for everything else.
#[async_trait::async_trait]
pub trait MicrophoneProvider: Send + Sync {
    async fn request(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<Box<dyn MicrophoneDevice>, ModalityError>;
}

/// Plays an audio file back as if it were being recorded
///
/// The file is cut into `timeslice`-spaced chunks; whatever has not been
/// delivered when `stop` is called is flushed as the final chunk.
pub struct FileMicrophone {
    path: PathBuf,
    bytes: Arc<Vec<u8>>,
    chunk_size: usize,
    timeslice: Duration,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl FileMicrophone {
    pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

    pub fn open(path: impl AsRef<Path>, timeslice: Duration) -> Result<Self, ModalityError> {
        let path = path.as_ref();
        info!("Opening audio file as microphone: {}", path.display());

        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => {
                ModalityError::DeviceAccessDenied(format!("{}: {}", path.display(), e))
            }
            _ => ModalityError::DeviceUnavailable(format!("{}: {}", path.display(), e)),
        })?;

        Ok(Self::from_bytes(path.to_path_buf(), bytes, timeslice))
    }

    pub fn from_bytes(path: PathBuf, bytes: Vec<u8>, timeslice: Duration) -> Self {
        Self {
            path,
            bytes: Arc::new(bytes),
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            timeslice,
            cancel: None,
            task: None,
        }
    }
}

impl MicrophoneDevice for FileMicrophone {
    fn start(&mut self) -> Result<mpsc::Receiver<EncodedChunk>, ModalityError> {
        if self.is_capturing() {
            return Err(ModalityError::DeviceUnavailable(
                "Microphone already capturing".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let bytes = Arc::clone(&self.bytes);
        let chunk_size = self.chunk_size.max(1);
        let timeslice = self.timeslice.max(Duration::from_millis(1));
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut offset = 0;
            let mut elapsed_ms = 0u64;
            let mut ticker = tokio::time::interval(timeslice);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        elapsed_ms += timeslice.as_millis() as u64;
                        if offset >= bytes.len() {
                            continue;
                        }
                        let end = (offset + chunk_size).min(bytes.len());
                        let chunk = EncodedChunk {
                            data: bytes[offset..end].to_vec(),
                            timestamp_ms: elapsed_ms,
                        };
                        offset = end;
                        if tx.send(chunk).await.is_err() {
                            return;
                        }
                    }
                }
            }

            // Final flush, like a recorder's last data event on stop
            if offset < bytes.len() {
                let chunk = EncodedChunk {
                    data: bytes[offset..].to_vec(),
                    timestamp_ms: elapsed_ms,
                };
                let _ = tx.send(chunk).await;
            }
            debug!("File microphone flushed");
        });

        self.cancel = Some(cancel);
        self.task = Some(task);

        info!("File microphone {} started", self.path.display());
        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
            info!("File microphone {} stopped", self.path.display());
        }
        // The task finishes its flush on its own and then drops the sender
        self.task = None;
    }

    fn is_capturing(&self) -> bool {
        self.cancel.is_some()
    }

    fn container_hint(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }

    fn name(&self) -> &str {
        "audio file"
    }
}

/// Hands out `FileMicrophone`s backed by a configured file
#[derive(Debug, Clone)]
pub struct FileMicrophoneProvider {
    path: Option<PathBuf>,
}

impl FileMicrophoneProvider {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait::async_trait]
impl MicrophoneProvider for FileMicrophoneProvider {
    async fn request(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<Box<dyn MicrophoneDevice>, ModalityError> {
        let path = self.path.clone().ok_or_else(|| {
            ModalityError::DeviceUnavailable("No audio source file configured".to_string())
        })?;

        info!(
            "Microphone requested ({}Hz, {} ch, echo_cancellation={}, noise_suppression={})",
            constraints.sample_rate,
            constraints.channels,
            constraints.echo_cancellation,
            constraints.noise_suppression
        );

        let timeslice = constraints.timeslice;
        let microphone = tokio::task::spawn_blocking(move || FileMicrophone::open(path, timeslice))
            .await
            .map_err(|e| ModalityError::DeviceUnavailable(format!("Microphone open task failed: {}", e)))??;

        Ok(Box::new(microphone))
    }
}
