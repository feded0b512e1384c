use crate::audio::MicrophoneConstraints;
use crate::modality::Modality;
use crate::video::{CameraConstraints, FrameEncoder, VideoPipelineConfig};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub remote: RemoteConfig,
    pub video: VideoConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "modality-sessions".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

/// Where the analysis service lives
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// e.g. `ws://localhost:8000`
    pub base_url: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://localhost:8000".to_string(),
        }
    }
}

impl RemoteConfig {
    /// Channel URL for one session of the given modality
    pub fn endpoint(&self, modality: Modality, session_id: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        match modality {
            Modality::Video => format!("{}/video/ws/video/{}", base, session_id),
            Modality::Audio => format!("{}/voice/ws/conversation/{}", base, session_id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub frame_interval_ms: u64,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    pub width: u32,
    pub height: u32,
    /// Still image served by the file-backed camera
    pub source_image: Option<PathBuf>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 1000,
            jpeg_quality: 80,
            width: 640,
            height: 480,
            source_image: None,
        }
    }
}

impl VideoConfig {
    pub fn pipeline(&self) -> VideoPipelineConfig {
        VideoPipelineConfig {
            constraints: CameraConstraints {
                ideal_width: self.width,
                ideal_height: self.height,
                ..CameraConstraints::default()
            },
            encoder: FrameEncoder::new(self.width, self.height, self.jpeg_quality),
            frame_interval: Duration::from_millis(self.frame_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Rate of the uploaded WAV
    pub sample_rate: u32,
    pub channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub timeslice_ms: u64,
    /// Recording replayed by the file-backed microphone
    pub source_file: Option<PathBuf>,
    /// Where bot responses are written; muted when unset
    pub playback_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            echo_cancellation: true,
            noise_suppression: true,
            timeslice_ms: 500,
            source_file: None,
            playback_dir: None,
        }
    }
}

impl AudioConfig {
    pub fn constraints(&self) -> MicrophoneConstraints {
        MicrophoneConstraints {
            sample_rate: self.sample_rate,
            channels: self.channels,
            echo_cancellation: self.echo_cancellation,
            noise_suppression: self.noise_suppression,
            timeslice: Duration::from_millis(self.timeslice_ms),
        }
    }
}

impl Config {
    /// Load from a TOML file, with `MODALITY__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("MODALITY").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        settings
            .try_deserialize()
            .with_context(|| format!("Invalid config {}", path))
    }
}
