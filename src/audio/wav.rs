use crate::error::ModalityError;
use std::io::Cursor;

/// RIFF + fmt + data chunk headers of a canonical PCM WAV
pub const WAV_HEADER_LEN: usize = 44;

fn processing(context: &str, e: impl std::fmt::Display) -> ModalityError {
    ModalityError::ProcessingFailed(format!("{}: {}", context, e))
}

/// Convert a float sample in [-1.0, 1.0] to signed 16-bit
pub fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Encode mono float samples as a 16-bit PCM WAV with a 44-byte header
pub fn encode_pcm16_mono(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, ModalityError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| processing("Failed to start WAV container", e))?;

        for &sample in samples {
            writer
                .write_sample(to_pcm16(sample))
                .map_err(|e| processing("Failed to write WAV sample", e))?;
        }

        writer
            .finalize()
            .map_err(|e| processing("Failed to finalize WAV container", e))?;
    }

    Ok(cursor.into_inner())
}

/// PCM16 audio decoded from a WAV payload
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    /// Interleaved samples
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmClip {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Decode a 16-bit WAV payload (bot speech responses)
pub fn decode_pcm16(bytes: &[u8]) -> Result<PcmClip, ModalityError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| processing("Invalid WAV payload", e))?;

    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(ModalityError::ProcessingFailed(format!(
            "Unsupported WAV sample format: {:?} {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| processing("Failed to read WAV samples", e))?;

    Ok(PcmClip {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
    }

    #[test]
    fn header_is_canonical_44_bytes() {
        let n = 1234;
        let samples = vec![0.25f32; n];
        let wav = encode_pcm16_mono(&samples, 16000).unwrap();

        assert_eq!(wav.len(), WAV_HEADER_LEN + 2 * n);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32_at(&wav, 4), (36 + 2 * n) as u32);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u32_at(&wav, 16), 16);
        assert_eq!(u16_at(&wav, 20), 1); // PCM
        assert_eq!(u16_at(&wav, 22), 1); // mono
        assert_eq!(u32_at(&wav, 24), 16000);
        assert_eq!(u32_at(&wav, 28), 32000); // byteRate
        assert_eq!(u16_at(&wav, 32), 2); // blockAlign
        assert_eq!(u16_at(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 40), (2 * n) as u32);
    }

    #[test]
    fn samples_are_little_endian_and_clamped() {
        let wav = encode_pcm16_mono(&[1.0, -1.0, 2.0, 0.0], 16000).unwrap();
        let body: Vec<i16> = wav[WAV_HEADER_LEN..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(body, vec![32767, -32767, 32767, 0]);
    }

    #[test]
    fn empty_recording_still_has_header() {
        let wav = encode_pcm16_mono(&[], 16000).unwrap();
        assert_eq!(wav.len(), WAV_HEADER_LEN);
    }

    #[test]
    fn decode_reads_back_samples() {
        let wav = encode_pcm16_mono(&[0.5, -0.5], 16000).unwrap();
        let clip = decode_pcm16(&wav).unwrap();
        assert_eq!(clip.samples, vec![16383, -16383]);
        assert_eq!(clip.sample_rate, 16000);
        assert_eq!(clip.channels, 1);
    }
}
