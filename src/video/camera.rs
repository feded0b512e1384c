use crate::error::ModalityError;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which way the camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

/// What the pipeline asks of a camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConstraints {
    /// Preferred width; devices may deliver something else
    pub ideal_width: u32,
    /// Preferred height; devices may deliver something else
    pub ideal_height: u32,
    /// Frames per second the pipeline will pull
    pub frame_rate: u32,
    pub facing: FacingMode,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 640,
            ideal_height: 480,
            frame_rate: 1,
            facing: FacingMode::User,
        }
    }
}

/// An exclusively held capture device
pub trait CameraDevice: Send {
    /// Current frame, or `None` if the device has nothing ready yet
    fn grab_frame(&mut self) -> Result<Option<RgbImage>, ModalityError>;

    /// Give the device back. Called exactly once by the pipeline.
    fn release(&mut self);

    /// Device name for logging
    fn name(&self) -> &str;
}

/// Grants exclusive camera access
///
/// Must report `DeviceAccessDenied` for permission refusals and
/// `DeviceUnavailable` for everything else.
#[async_trait::async_trait]
pub trait CameraProvider: Send + Sync {
    async fn request(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraDevice>, ModalityError>;
}

/// Serves one still image as a camera feed
pub struct StillImageCamera {
    path: PathBuf,
    frame: Option<RgbImage>,
}

impl StillImageCamera {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ModalityError> {
        let path = path.as_ref();
        info!("Opening still image camera: {}", path.display());

        let frame = image::open(path)
            .map_err(|e| match &e {
                image::ImageError::IoError(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                    ModalityError::DeviceAccessDenied(format!("{}: {}", path.display(), e))
                }
                _ => ModalityError::DeviceUnavailable(format!("{}: {}", path.display(), e)),
            })?
            .to_rgb8();

        info!(
            "Still image camera ready: {}x{}",
            frame.width(),
            frame.height()
        );

        Ok(Self {
            path: path.to_path_buf(),
            frame: Some(frame),
        })
    }
}

impl CameraDevice for StillImageCamera {
    fn grab_frame(&mut self) -> Result<Option<RgbImage>, ModalityError> {
        Ok(self.frame.clone())
    }

    fn release(&mut self) {
        if self.frame.take().is_none() {
            warn!("Still image camera {} released twice", self.path.display());
        }
    }

    fn name(&self) -> &str {
        "still image"
    }
}

/// Hands out `StillImageCamera`s backed by a configured file
#[derive(Debug, Clone)]
pub struct StillImageCameraProvider {
    path: Option<PathBuf>,
}

impl StillImageCameraProvider {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait::async_trait]
impl CameraProvider for StillImageCameraProvider {
    async fn request(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraDevice>, ModalityError> {
        let path = self.path.clone().ok_or_else(|| {
            ModalityError::DeviceUnavailable("No video source image configured".to_string())
        })?;

        info!(
            "Camera requested ({}x{} ideal, {} fps, {:?})",
            constraints.ideal_width, constraints.ideal_height, constraints.frame_rate, constraints.facing
        );

        let camera = tokio::task::spawn_blocking(move || StillImageCamera::open(path))
            .await
            .map_err(|e| ModalityError::DeviceUnavailable(format!("Camera open task failed: {}", e)))??;

        Ok(Box::new(camera))
    }
}
