use crate::error::ModalityError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, RgbImage};

/// Downscales frames to fit a bounding box and compresses them to JPEG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEncoder {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality, 1-100
    pub quality: u8,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self {
            max_width: 640,
            max_height: 480,
            quality: 80,
        }
    }
}

impl FrameEncoder {
    pub fn new(max_width: u32, max_height: u32, quality: u8) -> Self {
        Self {
            max_width: max_width.max(1),
            max_height: max_height.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    /// Output size for a frame; aspect ratio kept, never upscaled
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.max_width && height <= self.max_height {
            return (width, height);
        }

        let scale = f64::min(
            self.max_width as f64 / width as f64,
            self.max_height as f64 / height as f64,
        );

        (
            ((width as f64 * scale).round() as u32).max(1),
            ((height as f64 * scale).round() as u32).max(1),
        )
    }

    pub fn encode(&self, frame: &RgbImage) -> Result<Vec<u8>, ModalityError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(ModalityError::ProcessingFailed("Empty video frame".to_string()));
        }

        let (width, height) = self.target_size(frame.width(), frame.height());
        let resized;
        let source = if (width, height) == frame.dimensions() {
            frame
        } else {
            resized = imageops::resize(frame, width, height, FilterType::Triangle);
            &resized
        };

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode(source.as_raw(), width, height, ColorType::Rgb8)
            .map_err(|e| ModalityError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;

        Ok(jpeg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_frames_are_scaled_into_the_box() {
        let encoder = FrameEncoder::default();
        assert_eq!(encoder.target_size(1280, 720), (640, 360));
        assert_eq!(encoder.target_size(1920, 1440), (640, 480));
        assert_eq!(encoder.target_size(320, 240), (320, 240));
    }

    #[test]
    fn encodes_jpeg_with_soi_marker() {
        let frame = RgbImage::from_pixel(800, 600, image::Rgb([120, 80, 40]));
        let jpeg = FrameEncoder::default().encode(&frame).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (640, 480));
    }
}
