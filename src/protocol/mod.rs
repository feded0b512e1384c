pub mod codec;
pub mod messages;

pub use codec::{decode_audio, decode_video, encode_audio_upload, encode_video_frame};
pub use messages::{AudioInbound, OutboundMessage, VideoInbound, WireFrame};
