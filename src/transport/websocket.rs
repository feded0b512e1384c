// WebSocket connector for the remote analysis service

use super::session::{ChannelHandle, Connector};
use crate::error::ModalityError;
use crate::protocol::WireFrame;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Opens `ws://` / `wss://` channels with tokio-tungstenite
///
/// No timeout is applied: a hung handshake stays pending until the session
/// that requested it is closed.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<ChannelHandle, ModalityError> {
        info!("Connecting WebSocket {}", url);

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ModalityError::ChannelConnectFailed(format!("{}: {}", url, e)))?;

        let (mut sink, mut stream) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WireFrame>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<WireFrame>();

        let writer_url = url.to_string();
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let message = match frame {
                    WireFrame::Text(text) => Message::Text(text),
                    WireFrame::Binary(bytes) => Message::Binary(bytes),
                };

                if let Err(e) = sink.send(message).await {
                    warn!("WebSocket send to {} failed: {}", writer_url, e);
                    break;
                }
            }

            // Owner dropped the sender: close politely
            if let Err(e) = sink.close().await {
                debug!("WebSocket close for {} failed: {}", writer_url, e);
            }
            debug!("WebSocket writer for {} stopped", writer_url);
        });

        let reader_url = url.to_string();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let frame = match message {
                    Ok(Message::Text(text)) => WireFrame::Text(text),
                    Ok(Message::Binary(bytes)) => WireFrame::Binary(bytes),
                    Ok(Message::Close(frame)) => {
                        debug!("WebSocket {} closed by peer: {:?}", reader_url, frame);
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("WebSocket {} receive error: {}", reader_url, e);
                        break;
                    }
                };

                if inbound_tx.send(frame).is_err() {
                    break;
                }
            }
            debug!("WebSocket reader for {} stopped", reader_url);
        });

        info!("WebSocket {} connected", url);

        Ok(ChannelHandle {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
