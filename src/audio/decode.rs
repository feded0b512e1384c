use crate::error::ModalityError;
use std::io::{Cursor, ErrorKind};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_NULL, CODEC_TYPE_OPUS};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

/// Linear PCM decoded from a recorded container
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

fn processing(context: &str, e: impl std::fmt::Display) -> ModalityError {
    ModalityError::ProcessingFailed(format!("{}: {}", context, e))
}

/// Codecs the decoder accepts, for error messages
pub const SUPPORTED_CODECS: &str = "PCM, ADPCM, FLAC, MP3, Vorbis, AAC, ALAC";

/// Decode a whole in-memory container.
///
/// Containers: WAV, AIFF, CAF, OGG, MP4 and MKV/WebM. The track's codec must be
/// one of `SUPPORTED_CODECS`; an Opus track (typical of WebM recorders) is
/// rejected.
pub fn decode_container(bytes: Vec<u8>, hint: Option<&str>) -> Result<DecodedAudio, ModalityError> {
    if bytes.is_empty() {
        return Err(ModalityError::ProcessingFailed("No audio captured".to_string()));
    }

    let byte_len = bytes.len();
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut probe_hint = Hint::new();
    if let Some(ext) = hint {
        probe_hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &probe_hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| processing("Unrecognised audio container", e))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ModalityError::ProcessingFailed("No audio track in recording".to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = make_decoder(&track.codec_params)?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(processing("Failed to read audio packet", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable audio packet: {}", e);
            }
            Err(e) => return Err(processing("Audio decode failed", e)),
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(ModalityError::ProcessingFailed(
            "Recording has no sample rate or channel layout".to_string(),
        ));
    }

    let decoded = DecodedAudio {
        samples,
        sample_rate,
        channels,
    };

    info!(
        "Decoded {} byte recording: {:.2}s, {}Hz, {} channels",
        byte_len,
        decoded.duration_seconds(),
        decoded.sample_rate,
        decoded.channels
    );
    debug!("{} interleaved samples", decoded.samples.len());

    Ok(decoded)
}

fn make_decoder(params: &CodecParameters) -> Result<Box<dyn Decoder>, ModalityError> {
    if params.codec == CODEC_TYPE_OPUS {
        return Err(ModalityError::ProcessingFailed(format!(
            "Opus audio cannot be decoded (supported codecs: {})",
            SUPPORTED_CODECS
        )));
    }

    symphonia::default::get_codecs()
        .make(params, &DecoderOptions::default())
        .map_err(|e| {
            processing(
                &format!("Unsupported audio codec (supported codecs: {})", SUPPORTED_CODECS),
                e,
            )
        })
}
