//! Video capture pipeline
//!
//! - `camera`: device contract and a still-image camera
//! - `encode`: downscale + JPEG
//! - `stats`: observations and incrementally maintained emotion statistics
//! - `pipeline`: the periodic capture loop and its lifecycle

pub mod camera;
pub mod encode;
pub mod pipeline;
pub mod stats;

pub use camera::{
    CameraConstraints, CameraDevice, CameraProvider, FacingMode, StillImageCamera,
    StillImageCameraProvider,
};
pub use encode::FrameEncoder;
pub use pipeline::{CaptureState, VideoEvent, VideoPipeline, VideoPipelineConfig};
pub use stats::{EmotionTally, VideoObservation, VideoStats};
