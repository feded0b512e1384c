use super::backend::{EncodedChunk, MicrophoneConstraints, MicrophoneDevice, MicrophoneProvider};
use super::conversation::Conversation;
use super::decode::decode_container;
use super::resample::{downmix_to_mono, resample_linear};
use super::wav::encode_pcm16_mono;
use crate::error::ModalityError;
use crate::protocol::{encode_audio_upload, WireFrame};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    RequestingDevice,
    Recording,
    Processing,
    Failed,
}

/// Results of the pipeline's asynchronous steps, tagged with the generation that started them
pub enum AudioEvent {
    DeviceReady {
        generation: u64,
        result: Result<Box<dyn MicrophoneDevice>, ModalityError>,
    },
    PayloadReady {
        generation: u64,
        result: Result<WireFrame, ModalityError>,
    },
}

/// Record → stop → transcode → one upload message, plus the conversation log
pub struct AudioPipeline {
    provider: Arc<dyn MicrophoneProvider>,
    constraints: MicrophoneConstraints,
    events: mpsc::UnboundedSender<AudioEvent>,
    state: RecorderState,
    generation: u64,
    cancel: Option<CancellationToken>,
    device: Option<Box<dyn MicrophoneDevice>>,
    collector: Option<JoinHandle<Vec<u8>>>,
    container_hint: Option<String>,
    conversation: Conversation,
}

impl AudioPipeline {
    pub fn new(
        provider: Arc<dyn MicrophoneProvider>,
        constraints: MicrophoneConstraints,
        events: mpsc::UnboundedSender<AudioEvent>,
    ) -> Self {
        Self {
            provider,
            constraints,
            events,
            state: RecorderState::Idle,
            generation: 0,
            cancel: None,
            device: None,
            collector: None,
            container_hint: None,
            conversation: Conversation::new(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    /// Request the microphone. Returns false while a recording is requested, running or processing.
    pub fn start(&mut self) -> bool {
        if matches!(
            self.state,
            RecorderState::RequestingDevice | RecorderState::Recording | RecorderState::Processing
        ) {
            warn!("Audio recorder busy ({:?})", self.state);
            return false;
        }

        self.generation += 1;
        self.state = RecorderState::RequestingDevice;

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let provider = Arc::clone(&self.provider);
        let constraints = self.constraints.clone();
        let events = self.events.clone();
        let generation = self.generation;

        info!("Requesting microphone (generation {})", generation);

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Microphone request {} abandoned", generation);
                    return;
                }
                result = provider.request(&constraints) => result,
            };

            if let Err(rejected) = events.send(AudioEvent::DeviceReady { generation, result }) {
                if let AudioEvent::DeviceReady { result: Ok(mut device), .. } = rejected.0 {
                    device.stop();
                }
            }
        });

        true
    }

    /// Apply the outcome of a microphone request; on success recording begins
    pub fn on_device_ready(
        &mut self,
        generation: u64,
        result: Result<Box<dyn MicrophoneDevice>, ModalityError>,
    ) -> Result<(), ModalityError> {
        if generation != self.generation || self.state != RecorderState::RequestingDevice {
            debug!("Discarding stale microphone result (generation {})", generation);
            if let Ok(mut device) = result {
                device.stop();
            }
            return Ok(());
        }

        let started = result.and_then(|mut device| {
            let chunks = device.start()?;
            Ok((device, chunks))
        });

        let (device, chunks) = match started {
            Ok(started) => started,
            Err(e) => {
                warn!("Microphone access failed: {}", e);
                self.state = RecorderState::Failed;
                self.cancel = None;
                return Err(e);
            }
        };

        info!("Recording from {}", device.name());

        self.container_hint = device.container_hint().map(str::to_string);
        self.collector = Some(tokio::spawn(collect_chunks(chunks)));
        self.device = Some(device);
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// Finish the recording and hand it to the transcode step
    ///
    /// Returns false if nothing was recording.
    pub fn stop(&mut self) -> bool {
        if self.state != RecorderState::Recording {
            debug!("Audio recorder not recording ({:?})", self.state);
            return false;
        }

        if let Some(mut device) = self.device.take() {
            device.stop();
        }

        let Some(collector) = self.collector.take() else {
            self.state = RecorderState::Idle;
            return false;
        };

        self.state = RecorderState::Processing;

        let cancel = self.cancel.clone().unwrap_or_default();
        let events = self.events.clone();
        let generation = self.generation;
        let hint = self.container_hint.take();
        let target_rate = self.constraints.sample_rate;

        info!("Recording stopped, processing (generation {})", generation);

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Audio processing {} cancelled", generation);
                    return;
                }
                result = finish_recording(collector, hint, target_rate) => result,
            };

            let _ = events.send(AudioEvent::PayloadReady { generation, result });
        });

        true
    }

    /// Apply a finished transcode; returns the frame to send, or `None` when stale
    pub fn on_payload_ready(
        &mut self,
        generation: u64,
        result: Result<WireFrame, ModalityError>,
    ) -> Option<Result<WireFrame, ModalityError>> {
        if generation != self.generation || self.state != RecorderState::Processing {
            debug!("Discarding stale audio payload (generation {})", generation);
            return None;
        }

        self.cancel = None;
        self.state = match &result {
            Ok(_) => RecorderState::Idle,
            Err(e) => {
                warn!("Audio processing failed: {}", e);
                RecorderState::Failed
            }
        };

        Some(result)
    }

    /// Abandon any request, recording or processing and release the microphone. Safe when idle.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        if let Some(mut device) = self.device.take() {
            info!("Releasing microphone {}", device.name());
            device.stop();
        }

        if let Some(collector) = self.collector.take() {
            collector.abort();
        }

        self.container_hint = None;
        self.generation += 1;
        self.state = RecorderState::Idle;
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Concatenate chunks until the device closes the channel
async fn collect_chunks(mut chunks: mpsc::Receiver<EncodedChunk>) -> Vec<u8> {
    let mut blob = Vec::new();
    let mut count = 0usize;

    while let Some(chunk) = chunks.recv().await {
        if chunk.data.is_empty() {
            continue;
        }
        count += 1;
        blob.extend_from_slice(&chunk.data);
    }

    debug!("Collected {} chunks ({} bytes)", count, blob.len());
    blob
}

async fn finish_recording(
    collector: JoinHandle<Vec<u8>>,
    hint: Option<String>,
    target_rate: u32,
) -> Result<WireFrame, ModalityError> {
    let blob = collector
        .await
        .map_err(|e| ModalityError::ProcessingFailed(format!("Recorder task failed: {}", e)))?;

    tokio::task::spawn_blocking(move || render_upload(blob, hint.as_deref(), target_rate))
        .await
        .map_err(|e| ModalityError::ProcessingFailed(format!("Transcode task failed: {}", e)))?
}

/// Decode → mono → resample → WAV → upload frame
pub fn render_upload(
    blob: Vec<u8>,
    hint: Option<&str>,
    target_rate: u32,
) -> Result<WireFrame, ModalityError> {
    let decoded = decode_container(blob, hint)?;
    let mono = downmix_to_mono(&decoded.samples, decoded.channels);
    let resampled = resample_linear(&mono, decoded.sample_rate, target_rate);
    let wav = encode_pcm16_mono(&resampled, target_rate)?;

    info!(
        "Rendered {:.2}s recording to {} byte WAV at {}Hz",
        decoded.duration_seconds(),
        wav.len(),
        target_rate
    );

    encode_audio_upload(&wav)
}
