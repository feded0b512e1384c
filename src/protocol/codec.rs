use super::messages::{AudioInbound, OutboundMessage, VideoInbound, WireFrame};
use crate::error::ModalityError;
use crate::modality::Modality;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Frame an encoded still image for the video channel
pub fn encode_video_frame(jpeg: Vec<u8>) -> WireFrame {
    WireFrame::Binary(jpeg)
}

/// Frame a finished WAV recording for the conversation channel
pub fn encode_audio_upload(wav: &[u8]) -> Result<WireFrame, ModalityError> {
    let message = OutboundMessage::Audio {
        audio: base64::engine::general_purpose::STANDARD.encode(wav),
        transcription: String::new(),
    };

    let json = serde_json::to_string(&message)
        .map_err(|e| ModalityError::ProcessingFailed(format!("Failed to serialize audio message: {}", e)))?;

    Ok(WireFrame::Text(json))
}

pub fn decode_video(frame: &WireFrame) -> Result<VideoInbound, ModalityError> {
    let (message, kind) = decode_tagged::<VideoInbound>(Modality::Video, frame)?;
    if message == VideoInbound::Unknown {
        warn!("Unknown video message type: {}", kind);
    }
    Ok(message)
}

pub fn decode_audio(frame: &WireFrame) -> Result<AudioInbound, ModalityError> {
    let (message, kind) = decode_tagged::<AudioInbound>(Modality::Audio, frame)?;
    if message == AudioInbound::Unknown {
        warn!("Unknown audio message type: {}", kind);
    }
    Ok(message)
}

/// Parse a JSON object carrying a string `type` discriminant
fn decode_tagged<T: DeserializeOwned>(
    modality: Modality,
    frame: &WireFrame,
) -> Result<(T, String), ModalityError> {
    let text = match frame {
        WireFrame::Text(text) => text,
        WireFrame::Binary(bytes) => {
            return Err(ModalityError::ChannelProtocol(format!(
                "Unexpected binary frame ({} bytes) on {} channel",
                bytes.len(),
                modality
            )));
        }
    };

    let value: Value = serde_json::from_str(text)
        .map_err(|e| ModalityError::ChannelProtocol(format!("Invalid JSON on {} channel: {}", modality, e)))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ModalityError::ChannelProtocol(format!("Message on {} channel has no type", modality))
        })?
        .to_string();

    debug!("Decoding {} message of type {}", modality, kind);

    let message = serde_json::from_value::<T>(value).map_err(|e| {
        ModalityError::ChannelProtocol(format!("Malformed {} message ({}): {}", modality, kind, e))
    })?;

    Ok((message, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(json: &str) -> WireFrame {
        WireFrame::Text(json.to_string())
    }

    #[test]
    fn decodes_video_analysis() {
        let frame = text(r#"{"type":"analysis","emotion":"sad","score":0.8,"timestamp":"2024-05-01T10:00:00"}"#);
        let message = decode_video(&frame).unwrap();
        assert_eq!(
            message,
            VideoInbound::Analysis {
                emotion: "sad".into(),
                score: 0.8,
                timestamp: "2024-05-01T10:00:00".into(),
            }
        );
    }

    #[test]
    fn analysis_timestamp_accepts_any_json_type() {
        let cases = [
            (r#"{"type":"analysis","emotion":"sad","score":0.8,"timestamp":1714557600.5}"#, "1714557600.5"),
            (r#"{"type":"analysis","emotion":"sad","score":0.8,"timestamp":1714557600}"#, "1714557600"),
            (r#"{"type":"analysis","emotion":"sad","score":0.8,"timestamp":null}"#, ""),
            (r#"{"type":"analysis","emotion":"sad","score":0.8}"#, ""),
        ];

        for (json, expected) in cases {
            match decode_video(&text(json)).unwrap() {
                VideoInbound::Analysis {
                    emotion,
                    score,
                    timestamp,
                } => {
                    assert_eq!(emotion, "sad");
                    assert_eq!(score, 0.8);
                    assert_eq!(timestamp, expected, "{}", json);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn unknown_type_falls_back_without_error() {
        let message = decode_video(&text(r#"{"type":"heartbeat","seq":4}"#)).unwrap();
        assert_eq!(message, VideoInbound::Unknown);

        let message = decode_audio(&text(r#"{"type":"analysis","emotion":"sad"}"#)).unwrap();
        assert_eq!(message, AudioInbound::Unknown);
    }

    #[test]
    fn malformed_payloads_are_protocol_errors() {
        for frame in [
            text("not json at all"),
            text(r#"{"emotion":"sad"}"#),
            text(r#"{"type":"analysis","emotion":"sad","score":"high"}"#),
            text("[1,2,3]"),
            WireFrame::Binary(vec![0xff, 0xd8]),
        ] {
            let err = decode_video(&frame).unwrap_err();
            assert!(matches!(err, ModalityError::ChannelProtocol(_)), "{:?}", frame);
        }
    }

    #[test]
    fn ai_response_optional_fields_default() {
        let message = decode_audio(&text(r#"{"type":"ai_response","text_response":"Hi"}"#)).unwrap();
        match message {
            AudioInbound::AiResponse {
                text_response,
                confidence_score,
                is_depressed,
                audio_response,
                transcription,
            } => {
                assert_eq!(text_response.as_deref(), Some("Hi"));
                assert!(confidence_score.is_none());
                assert!(is_depressed.is_none());
                assert!(audio_response.is_none());
                assert!(transcription.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn audio_upload_has_fixed_schema() {
        let frame = encode_audio_upload(b"RIFF").unwrap();
        let WireFrame::Text(json) = frame else {
            panic!("audio upload must be a text frame");
        };
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "audio");
        assert_eq!(value["audio"], "UklGRg==");
        assert_eq!(value["transcription"], "");
        assert_eq!(value.as_object().unwrap().len(), 3);
    }
}
