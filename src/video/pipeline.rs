use super::camera::{CameraConstraints, CameraDevice, CameraProvider};
use super::encode::FrameEncoder;
use super::stats::{EmotionTally, VideoObservation, VideoStats};
use crate::error::ModalityError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type SharedCamera = Arc<Mutex<Option<Box<dyn CameraDevice>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    RequestingDevice,
    Streaming,
    Failed,
}

/// Results of the pipeline's asynchronous steps
///
/// Every event carries the generation that started it; results from a
/// generation that has since been stopped are discarded.
pub enum VideoEvent {
    DeviceReady {
        generation: u64,
        result: Result<Box<dyn CameraDevice>, ModalityError>,
    },
    FrameEncoded {
        generation: u64,
        jpeg: Vec<u8>,
    },
}

/// Settings for the capture loop
#[derive(Debug, Clone)]
pub struct VideoPipelineConfig {
    pub constraints: CameraConstraints,
    pub encoder: FrameEncoder,
    pub frame_interval: Duration,
}

impl Default for VideoPipelineConfig {
    fn default() -> Self {
        Self {
            constraints: CameraConstraints::default(),
            encoder: FrameEncoder::default(),
            frame_interval: Duration::from_secs(1),
        }
    }
}

/// Camera → JPEG capture loop plus the rolling emotion statistics
pub struct VideoPipeline {
    provider: Arc<dyn CameraProvider>,
    config: VideoPipelineConfig,
    events: mpsc::UnboundedSender<VideoEvent>,
    state: CaptureState,
    generation: u64,
    cancel: Option<CancellationToken>,
    camera: Option<SharedCamera>,
    observations: Vec<VideoObservation>,
    tally: EmotionTally,
}

impl VideoPipeline {
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        config: VideoPipelineConfig,
        events: mpsc::UnboundedSender<VideoEvent>,
    ) -> Self {
        Self {
            provider,
            config,
            events,
            state: CaptureState::Idle,
            generation: 0,
            cancel: None,
            camera: None,
            observations: Vec::new(),
            tally: EmotionTally::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == CaptureState::Streaming
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Request the camera. Returns false if a request or stream is already running.
    pub fn start(&mut self) -> bool {
        if matches!(self.state, CaptureState::RequestingDevice | CaptureState::Streaming) {
            warn!("Video capture already running");
            return false;
        }

        self.generation += 1;
        self.state = CaptureState::RequestingDevice;

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let provider = Arc::clone(&self.provider);
        let constraints = self.config.constraints.clone();
        let events = self.events.clone();
        let generation = self.generation;

        info!("Requesting camera (generation {})", generation);

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Camera request {} abandoned", generation);
                    return;
                }
                result = provider.request(&constraints) => result,
            };

            if let Err(rejected) = events.send(VideoEvent::DeviceReady { generation, result }) {
                if let VideoEvent::DeviceReady { result: Ok(mut camera), .. } = rejected.0 {
                    camera.release();
                }
            }
        });

        true
    }

    /// Apply the outcome of a camera request
    pub fn on_device_ready(
        &mut self,
        generation: u64,
        result: Result<Box<dyn CameraDevice>, ModalityError>,
    ) -> Result<(), ModalityError> {
        if generation != self.generation || self.state != CaptureState::RequestingDevice {
            debug!("Discarding stale camera result (generation {})", generation);
            if let Ok(mut camera) = result {
                camera.release();
            }
            return Ok(());
        }

        let camera = match result {
            Ok(camera) => camera,
            Err(e) => {
                warn!("Camera access failed: {}", e);
                self.state = CaptureState::Failed;
                self.cancel = None;
                return Err(e);
            }
        };

        info!("Camera {} acquired, capturing every {:?}", camera.name(), self.config.frame_interval);

        let shared: SharedCamera = Arc::new(Mutex::new(Some(camera)));
        self.camera = Some(Arc::clone(&shared));
        self.state = CaptureState::Streaming;

        let cancel = self.cancel.clone().unwrap_or_default();
        tokio::spawn(run_capture_loop(
            shared,
            self.config.encoder,
            self.config.frame_interval,
            generation,
            self.events.clone(),
            cancel,
        ));

        Ok(())
    }

    /// Whether an encoded frame from `generation` should still be sent
    pub fn accepts_frame(&self, generation: u64) -> bool {
        generation == self.generation && self.state == CaptureState::Streaming
    }

    /// Cancel the capture timer and release the camera. Safe when never started.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        if let Some(shared) = self.camera.take() {
            let mut slot = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(mut camera) = slot.take() {
                info!("Releasing camera {}", camera.name());
                camera.release();
            }
        }

        if self.state != CaptureState::Idle {
            info!("Video capture stopped");
        }

        // Invalidate anything still in flight
        self.generation += 1;
        self.state = CaptureState::Idle;
    }

    /// Fold one inbound analysis result into the statistics
    pub fn record(&mut self, observation: VideoObservation) {
        self.tally.record(&observation);
        self.observations.push(observation);
    }

    pub fn observations(&self) -> &[VideoObservation] {
        &self.observations
    }

    pub fn stats(&self) -> VideoStats {
        self.tally.stats()
    }

    /// Drop all observations and derived stats
    pub fn clear_history(&mut self) {
        self.observations.clear();
        self.tally.clear();
    }
}

impl Drop for VideoPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Grab → encode → emit, once per interval, until cancelled or the camera is released
async fn run_capture_loop(
    camera: SharedCamera,
    encoder: FrameEncoder,
    interval: Duration,
    generation: u64,
    events: mpsc::UnboundedSender<VideoEvent>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; frames start one interval in
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let grabbed = {
            let mut slot = camera.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_mut() {
                Some(device) => device.grab_frame(),
                None => break,
            }
        };

        let frame = match grabbed {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Camera has no frame ready, skipping tick");
                continue;
            }
            Err(e) => {
                warn!("Video frame capture error: {}", e);
                continue;
            }
        };

        let jpeg = match tokio::task::spawn_blocking(move || encoder.encode(&frame)).await {
            Ok(Ok(jpeg)) => jpeg,
            Ok(Err(e)) => {
                warn!("Video frame encode error: {}", e);
                continue;
            }
            Err(e) => {
                warn!("Video frame encode task failed: {}", e);
                continue;
            }
        };

        if events.send(VideoEvent::FrameEncoded { generation, jpeg }).is_err() {
            break;
        }
    }

    debug!("Video capture loop {} stopped", generation);
}
