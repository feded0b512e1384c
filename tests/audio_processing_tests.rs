// Integration tests for the recording → upload audio chain
//
// A recording is written as a real container, decoded with symphonia,
// downmixed, resampled to 16 kHz and re-encoded as a canonical WAV.

mod common;

use anyhow::Result;
use base64::Engine;
use common::tone_wav;
use modality_sessions::audio::{
    decode_container, decode_pcm16, decode_response_audio, render_upload, DirectoryPlaybackProvider, EncodedChunk,
    FileMicrophone, MicrophoneDevice, PlaybackContext, PlaybackProvider, WAV_HEADER_LEN,
};
use modality_sessions::protocol::WireFrame;
use modality_sessions::ModalityError;
use std::fs;
use std::io::Cursor;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_decode_stereo_wav_container() -> Result<()> {
    let wav = tone_wav(44100, 2, 0.5)?;
    let decoded = decode_container(wav, Some("wav"))?;

    assert_eq!(decoded.sample_rate, 44100);
    assert_eq!(decoded.channels, 2);
    assert_eq!(decoded.frame_count(), 22050);
    assert!((decoded.duration_seconds() - 0.5).abs() < 1e-6);

    // Samples are interleaved and both channels carry the same tone
    assert_eq!(decoded.samples[200], decoded.samples[201]);
    Ok(())
}

#[test]
fn test_decode_without_hint_probes_container() -> Result<()> {
    let decoded = decode_container(tone_wav(8000, 1, 0.1)?, None)?;
    assert_eq!(decoded.sample_rate, 8000);
    assert_eq!(decoded.channels, 1);
    Ok(())
}

#[test]
fn test_decode_rejects_garbage_and_empty_input() {
    let err = decode_container(b"RIFF but not really".to_vec(), Some("wav")).unwrap_err();
    assert!(matches!(err, ModalityError::ProcessingFailed(_)));

    let err = decode_container(Vec::new(), None).unwrap_err();
    assert_eq!(err, ModalityError::ProcessingFailed("No audio captured".into()));
}

#[test]
fn test_render_upload_produces_16khz_mono_wav() -> Result<()> {
    for (rate, channels) in [(48000, 2), (44100, 1), (16000, 1), (8000, 2)] {
        let recording = tone_wav(rate, channels, 1.0)?;
        let frame = render_upload(recording, Some("wav"), 16000)?;

        let WireFrame::Text(json) = frame else {
            panic!("upload must be a text frame");
        };
        let message: serde_json::Value = serde_json::from_str(&json)?;
        assert_eq!(message["type"], "audio");
        assert_eq!(message["transcription"], "");

        let wav = base64::engine::general_purpose::STANDARD.decode(message["audio"].as_str().unwrap())?;
        assert_eq!(wav.len(), WAV_HEADER_LEN + 2 * 16000, "{}Hz x{}", rate, channels);

        let clip = decode_pcm16(&wav)?;
        assert_eq!(clip.sample_rate, 16000);
        assert_eq!(clip.channels, 1);
        assert!(clip.samples.iter().any(|&s| s.unsigned_abs() > 8000), "tone should survive");
    }
    Ok(())
}

#[tokio::test]
async fn test_file_microphone_chunks_concatenate_to_source() -> Result<()> {
    let source = tone_wav(16000, 1, 2.0)?; // ~64 KiB, several chunks
    let mut microphone = FileMicrophone::from_bytes("speech.wav".into(), source.clone(), Duration::from_millis(5));

    assert_eq!(microphone.container_hint(), Some("wav"));
    let mut chunks = microphone.start()?;
    assert!(microphone.is_capturing());

    let first: EncodedChunk = tokio::time::timeout(common::WAIT, chunks.recv())
        .await?
        .expect("first chunk");
    microphone.stop();
    assert!(!microphone.is_capturing());

    let mut blob = first.data;
    while let Some(chunk) = chunks.recv().await {
        blob.extend_from_slice(&chunk.data);
    }

    assert_eq!(blob, source, "stop must flush everything not yet delivered");
    Ok(())
}

#[test]
fn test_directory_playback_writes_clips_and_closes_once() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let provider = DirectoryPlaybackProvider::new(Some(temp_dir.path().to_path_buf()));

    let mut playback = PlaybackContext::new(provider.acquire("audio-session-1")?);
    let speech = base64::engine::general_purpose::STANDARD.encode(tone_wav(22050, 1, 0.2)?);

    playback.play_base64_wav(&speech)?;
    playback.play_base64_wav(&speech)?;
    assert_eq!(playback.clips_played(), 2);

    let written = temp_dir.path().join("audio-session-1-response-001.wav");
    assert!(written.exists());
    assert!(fs::metadata(&written)?.len() > WAV_HEADER_LEN as u64);

    assert!(playback.close());
    assert!(!playback.close());
    assert!(playback.is_closed());

    // Closed contexts ignore further audio
    playback.play_base64_wav(&speech)?;
    assert_eq!(playback.clips_played(), 2);
    Ok(())
}

#[test]
fn test_playback_rejects_invalid_payloads() -> Result<()> {
    let provider = DirectoryPlaybackProvider::new(None);
    let mut playback = PlaybackContext::new(provider.acquire("audio-session-2")?);

    assert!(playback.play_base64_wav("***").is_err());
    let not_wav = base64::engine::general_purpose::STANDARD.encode(b"hello");
    assert!(playback.play_base64_wav(&not_wav).is_err());
    assert_eq!(playback.clips_played(), 0);
    Ok(())
}

fn float_wav(sample_rate: u32, samples: &[f32]) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[test]
fn test_response_audio_is_not_limited_to_pcm16() -> Result<()> {
    let samples: Vec<f32> = (0..2400).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
    let payload = float_wav(24000, &samples)?;

    let clip = decode_response_audio(payload.clone())?;
    assert_eq!(clip.sample_rate, 24000);
    assert_eq!(clip.channels, 1);
    assert_eq!(clip.samples.len(), 2400);
    assert_eq!(clip.samples[0], 16383);
    assert_eq!(clip.samples[1], -16383);

    let temp_dir = TempDir::new()?;
    let provider = DirectoryPlaybackProvider::new(Some(temp_dir.path().to_path_buf()));
    let mut playback = PlaybackContext::new(provider.acquire("audio-session-3")?);

    playback.play_base64_wav(&base64::engine::general_purpose::STANDARD.encode(payload))?;
    assert_eq!(playback.clips_played(), 1);

    let written = temp_dir.path().join("audio-session-3-response-000.wav");
    let clip = decode_pcm16(&fs::read(&written)?)?;
    assert_eq!(clip.sample_rate, 24000);
    assert_eq!(clip.samples.len(), 2400);
    Ok(())
}
