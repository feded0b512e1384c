use crate::error::ModalityError;
use crate::modality::Modality;
use crate::protocol::WireFrame;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of one duplex channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
    Failed,
}

/// Both halves of an established channel
pub struct ChannelHandle {
    /// Frames to the remote service; dropping it closes the channel
    pub outbound: mpsc::UnboundedSender<WireFrame>,
    /// Frames from the remote service; ends when the remote closes
    pub inbound: mpsc::UnboundedReceiver<WireFrame>,
}

/// Establishes physical channels
///
/// Implementations:
/// - `WebSocketConnector`: tokio-tungstenite client
/// - in-memory connectors for tests
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<ChannelHandle, ModalityError>;
}

/// Something that happened on a channel, reported back to the owner
#[derive(Debug)]
pub enum ChannelEvent {
    Opened(mpsc::UnboundedSender<WireFrame>),
    Frame(WireFrame),
    Failed(ModalityError),
    Closed,
}

/// A channel event tagged with the session that produced it
#[derive(Debug)]
pub struct TransportEvent {
    pub modality: Modality,
    pub session_id: String,
    pub event: ChannelEvent,
}

/// One modality's persistent channel to the analysis service
///
/// The session itself never blocks: `open` spawns the connect attempt and every
/// later change arrives as a `TransportEvent` that the owner feeds back through
/// `attach`, `fail` and `mark_closed`.
pub struct TransportSession {
    id: String,
    modality: Modality,
    url: String,
    state: SessionState,
    outbound: Option<mpsc::UnboundedSender<WireFrame>>,
    cancel: CancellationToken,
    frames_sent: u64,
}

impl TransportSession {
    /// Start connecting to `url`; the session begins in `Connecting`
    pub fn open(
        modality: Modality,
        session_id: String,
        url: String,
        connector: Arc<dyn Connector>,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        info!("Opening {} session {} at {}", modality, session_id, url);

        let cancel = CancellationToken::new();

        tokio::spawn(run_channel(
            modality,
            session_id.clone(),
            url.clone(),
            connector,
            events,
            cancel.clone(),
        ));

        Self {
            id: session_id,
            modality,
            url,
            state: SessionState::Connecting,
            outbound: None,
            cancel,
            frames_sent: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Take ownership of a freshly opened channel
    ///
    /// Returns false (and drops the channel, closing it) unless the session is
    /// still waiting for it.
    pub fn attach(&mut self, outbound: mpsc::UnboundedSender<WireFrame>) -> bool {
        if self.state != SessionState::Connecting {
            debug!(
                "Discarding late channel for {} session {} ({:?})",
                self.modality, self.id, self.state
            );
            return false;
        }

        info!("{} session {} connected", self.modality, self.id);
        self.outbound = Some(outbound);
        self.state = SessionState::Open;
        true
    }

    /// Record a connect failure
    pub fn fail(&mut self, error: &ModalityError) {
        warn!("{} session {} failed: {}", self.modality, self.id, error);
        self.outbound = None;
        if self.state == SessionState::Connecting || self.state == SessionState::Open {
            self.state = SessionState::Failed;
        }
    }

    /// The remote side went away
    pub fn mark_closed(&mut self) {
        if self.state == SessionState::Open {
            info!("{} session {} disconnected", self.modality, self.id);
        }
        self.outbound = None;
        if self.state != SessionState::Failed {
            self.state = SessionState::Closed;
        }
    }

    /// Send one frame; silently dropped unless the channel is open
    pub fn send(&mut self, frame: WireFrame) {
        if self.state != SessionState::Open {
            debug!(
                "Dropping {} byte frame on {} session {} ({:?})",
                frame.len(),
                self.modality,
                self.id,
                self.state
            );
            return;
        }

        let delivered = match &self.outbound {
            Some(outbound) => outbound.send(frame).is_ok(),
            None => false,
        };

        if delivered {
            self.frames_sent += 1;
        } else {
            debug!("{} session {} writer is gone", self.modality, self.id);
            self.mark_closed();
        }
    }

    /// Close the channel (or abandon the connect attempt). Idempotent.
    pub fn close(&mut self) {
        self.cancel.cancel();

        if self.outbound.take().is_some() {
            info!("Closing {} session {}", self.modality, self.id);
        }

        if self.state != SessionState::Failed {
            self.state = SessionState::Closed;
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Connect, then forward inbound frames until the channel ends or is cancelled
async fn run_channel(
    modality: Modality,
    session_id: String,
    url: String,
    connector: Arc<dyn Connector>,
    events: mpsc::UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
) {
    let emit = |event: ChannelEvent| {
        events
            .send(TransportEvent {
                modality,
                session_id: session_id.clone(),
                event,
            })
            .is_ok()
    };

    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Connect to {} abandoned", url);
            return;
        }
        result = connector.connect(&url) => result,
    };

    let ChannelHandle {
        outbound,
        mut inbound,
    } = match connected {
        Ok(handle) => handle,
        Err(e) => {
            emit(ChannelEvent::Failed(e));
            return;
        }
    };

    if !emit(ChannelEvent::Opened(outbound)) {
        return;
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = inbound.recv() => match frame {
                Some(frame) => {
                    if !emit(ChannelEvent::Frame(frame)) {
                        break;
                    }
                }
                None => {
                    emit(ChannelEvent::Closed);
                    break;
                }
            },
        }
    }

    debug!("{} channel reader for {} stopped", modality, session_id);
}
