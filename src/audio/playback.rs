// Playback of bot speech responses
//
// One `PlaybackContext` exists per audio session. It wraps whatever output the
// provider hands out and guarantees the output is closed exactly once.

use super::decode::decode_container;
use super::wav::{to_pcm16, PcmClip};
use crate::error::ModalityError;
use base64::Engine;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// An audio output device
pub trait PlaybackOutput: Send {
    fn play(&mut self, clip: PcmClip) -> Result<(), ModalityError>;

    /// Release the output. Called exactly once.
    fn close(&mut self);
}

/// Hands out playback outputs, one per audio session
pub trait PlaybackProvider: Send + Sync {
    fn acquire(&self, session_id: &str) -> Result<Box<dyn PlaybackOutput>, ModalityError>;
}

/// The audio session's rendering context
pub struct PlaybackContext {
    output: Option<Box<dyn PlaybackOutput>>,
    clips_played: usize,
}

impl PlaybackContext {
    pub fn new(output: Box<dyn PlaybackOutput>) -> Self {
        Self {
            output: Some(output),
            clips_played: 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.output.is_none()
    }

    pub fn clips_played(&self) -> usize {
        self.clips_played
    }

    /// Decode a base64 audio payload and play it immediately.
    ///
    /// Despite the name the payload may be any container symphonia can
    /// probe; the conversation service answers with MP3.
    pub fn play_base64_wav(&mut self, encoded: &str) -> Result<(), ModalityError> {
        let Some(output) = self.output.as_mut() else {
            debug!("Playback context closed, dropping response audio");
            return Ok(());
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| ModalityError::ProcessingFailed(format!("Invalid base64 audio: {}", e)))?;

        let clip = decode_response_audio(bytes)?;
        info!(
            "Playing response audio: {:.2}s at {}Hz",
            clip.duration_seconds(),
            clip.sample_rate
        );

        output.play(clip)?;
        self.clips_played += 1;
        Ok(())
    }

    /// Close the output. Returns true only on the call that actually closed it.
    pub fn close(&mut self) -> bool {
        match self.output.take() {
            Some(mut output) => {
                output.close();
                info!("Playback context closed after {} clips", self.clips_played);
                true
            }
            None => false,
        }
    }
}

impl Drop for PlaybackContext {
    fn drop(&mut self) {
        self.close();
    }
}

/// Probe and decode response audio, then convert it to 16-bit samples
pub fn decode_response_audio(bytes: Vec<u8>) -> Result<PcmClip, ModalityError> {
    let decoded = decode_container(bytes, None)?;

    Ok(PcmClip {
        samples: decoded.samples.iter().copied().map(to_pcm16).collect(),
        sample_rate: decoded.sample_rate,
        channels: decoded.channels,
    })
}

/// Writes each response clip to `<dir>/<session>-response-NNN.wav`
pub struct DirectoryOutput {
    dir: PathBuf,
    session_id: String,
    index: usize,
}

impl PlaybackOutput for DirectoryOutput {
    fn play(&mut self, clip: PcmClip) -> Result<(), ModalityError> {
        let path = self
            .dir
            .join(format!("{}-response-{:03}.wav", self.session_id, self.index));

        let spec = hound::WavSpec {
            channels: clip.channels,
            sample_rate: clip.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(&path, spec).map_err(|e| {
            ModalityError::ProcessingFailed(format!("Failed to create {}: {}", path.display(), e))
        })?;

        for &sample in &clip.samples {
            writer.write_sample(sample).map_err(|e| {
                ModalityError::ProcessingFailed(format!("Failed to write {}: {}", path.display(), e))
            })?;
        }

        writer.finalize().map_err(|e| {
            ModalityError::ProcessingFailed(format!("Failed to finalize {}: {}", path.display(), e))
        })?;

        info!("Response audio saved to {}", path.display());
        self.index += 1;
        Ok(())
    }

    fn close(&mut self) {
        debug!("Directory output for {} closed", self.session_id);
    }
}

/// Provides `DirectoryOutput`s, or a muted output when no directory is configured
#[derive(Debug, Clone)]
pub struct DirectoryPlaybackProvider {
    dir: Option<PathBuf>,
}

impl DirectoryPlaybackProvider {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

impl PlaybackProvider for DirectoryPlaybackProvider {
    fn acquire(&self, session_id: &str) -> Result<Box<dyn PlaybackOutput>, ModalityError> {
        let Some(dir) = self.dir.clone() else {
            return Ok(Box::new(MutedOutput));
        };

        fs::create_dir_all(&dir).map_err(|e| {
            ModalityError::DeviceUnavailable(format!("Playback directory {}: {}", dir.display(), e))
        })?;

        Ok(Box::new(DirectoryOutput {
            dir,
            session_id: session_id.to_string(),
            index: 0,
        }))
    }
}

/// Discards audio
pub struct MutedOutput;

impl PlaybackOutput for MutedOutput {
    fn play(&mut self, clip: PcmClip) -> Result<(), ModalityError> {
        warn!(
            "No playback output configured, discarding {:.2}s of response audio",
            clip.duration_seconds()
        );
        Ok(())
    }

    fn close(&mut self) {}
}
