//! Per-modality duplex channels to the remote analysis service

mod session;
mod websocket;

pub use session::{
    ChannelEvent, ChannelHandle, Connector, SessionState, TransportEvent, TransportSession,
};
pub use websocket::WebSocketConnector;
