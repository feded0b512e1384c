use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One frame on a duplex channel
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    /// JSON control/data message
    Text(String),
    /// Raw bytes (encoded still images on the video channel)
    Binary(Vec<u8>),
}

impl WireFrame {
    pub fn len(&self) -> usize {
        match self {
            WireFrame::Text(text) => text.len(),
            WireFrame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// JSON messages sent to the conversation endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// One completed recording segment
    Audio {
        /// Base64-encoded PCM16 mono WAV
        audio: String,
        /// Always empty; the service transcribes server-side
        transcription: String,
    },
}

/// Messages received on the video channel
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoInbound {
    Analysis {
        emotion: String,
        score: f64,
        /// Rendered as text whatever JSON type the service sends
        #[serde(default, deserialize_with = "timestamp_text")]
        timestamp: String,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Messages received on the conversation channel
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AudioInbound {
    AiResponse {
        #[serde(default)]
        text_response: Option<String>,
        #[serde(default)]
        confidence_score: Option<f64>,
        #[serde(default)]
        is_depressed: Option<bool>,
        /// Base64 WAV to play back immediately
        #[serde(default)]
        audio_response: Option<String>,
        /// What the service heard, echoed back
        #[serde(default)]
        transcription: Option<String>,
    },
    TranscriptionFailed {
        #[serde(default)]
        message: Option<String>,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Strings pass through, null becomes empty, numbers keep their JSON form
fn timestamp_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    })
}
