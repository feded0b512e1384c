//! Audio capture pipeline
//!
//! - `backend`: microphone contract and a file-backed microphone
//! - `decode`: recorded container → PCM (symphonia)
//! - `resample`: mono downmix and offline rate conversion
//! - `wav`: canonical PCM16 WAV encode/decode (hound)
//! - `playback`: bot speech playback context (any container symphonia probes)
//! - `conversation`: turn log and on-demand summary
//! - `pipeline`: record/stop/transcode lifecycle

pub mod backend;
pub mod conversation;
pub mod decode;
pub mod pipeline;
pub mod playback;
pub mod resample;
pub mod wav;

pub use backend::{
    EncodedChunk, FileMicrophone, FileMicrophoneProvider, MicrophoneConstraints, MicrophoneDevice,
    MicrophoneProvider,
};
pub use conversation::{AudioSummary, Conversation, ConversationTurn, Speaker};
pub use decode::{decode_container, DecodedAudio};
pub use pipeline::{render_upload, AudioEvent, AudioPipeline, RecorderState};
pub use playback::{
    decode_response_audio, DirectoryPlaybackProvider, MutedOutput, PlaybackContext, PlaybackOutput, PlaybackProvider,
};
pub use wav::{decode_pcm16, encode_pcm16_mono, PcmClip, WAV_HEADER_LEN};
