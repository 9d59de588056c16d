//! Peer Link
//!
//! The bidirectional, ordered, reliable channel between exactly two peers.
//! Transports push `LinkEvent`s into the owning peer's queue and expose a
//! non-blocking `send` for outgoing frames.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

// =============================================================================
// EVENTS AND STATUS
// =============================================================================

/// Notification from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Channel established (or re-established)
    Open,
    /// Text frame received
    Frame(String),
    /// Channel closed
    Close,
    /// Transport error; non-fatal
    Error(String),
}

/// Observable connection status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkStatus {
    /// No peer has connected yet
    #[default]
    Waiting,
    /// Channel open
    Connected,
    /// Channel was open and has closed
    Disconnected,
}

impl LinkStatus {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            LinkStatus::Waiting => "Waiting for Player 2...",
            LinkStatus::Connected => "Connected!",
            LinkStatus::Disconnected => "Disconnected",
        }
    }
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// No open channel to send on.
    #[error("link is not open")]
    NotOpen,

    /// Receiving side has gone away.
    #[error("peer channel closed")]
    ChannelClosed,

    /// Failed to bind or connect.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Outgoing half of a peer channel.
pub trait PeerLink: Send {
    /// Queue a frame for the other peer. Never blocks.
    fn send(&self, frame: String) -> Result<(), LinkError>;

    /// Is the channel currently open?
    fn is_open(&self) -> bool;
}

// =============================================================================
// IN-MEMORY LINK
// =============================================================================

/// In-process link, for tests and the demo.
///
/// Both ends share one open flag; frames sent while closed are refused.
#[derive(Clone)]
pub struct ChannelLink {
    open: Arc<AtomicBool>,
    /// Remote peer's event queue
    remote: mpsc::UnboundedSender<LinkEvent>,
    /// Own event queue (for lifecycle notifications)
    local: mpsc::UnboundedSender<LinkEvent>,
}

/// Create a connected pair of in-memory links, initially closed.
///
/// Returns `(host_end, guest_end)`, each with the receiver its peer task
/// should drain.
pub fn channel_pair() -> (
    (ChannelLink, mpsc::UnboundedReceiver<LinkEvent>),
    (ChannelLink, mpsc::UnboundedReceiver<LinkEvent>),
) {
    let open = Arc::new(AtomicBool::new(false));
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();

    let a = ChannelLink {
        open: open.clone(),
        remote: b_tx.clone(),
        local: a_tx.clone(),
    };
    let b = ChannelLink {
        open,
        remote: a_tx,
        local: b_tx,
    };
    ((a, a_rx), (b, b_rx))
}

impl ChannelLink {
    /// Open the channel; both ends observe `Open`.
    pub fn open(&self) {
        if !self.open.swap(true, Ordering::SeqCst) {
            let _ = self.local.send(LinkEvent::Open);
            let _ = self.remote.send(LinkEvent::Open);
        }
    }

    /// Close the channel; both ends observe `Close`.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.local.send(LinkEvent::Close);
            let _ = self.remote.send(LinkEvent::Close);
        }
    }
}

impl PeerLink for ChannelLink {
    fn send(&self, frame: String) -> Result<(), LinkError> {
        if !self.is_open() {
            return Err(LinkError::NotOpen);
        }
        self.remote
            .send(LinkEvent::Frame(frame))
            .map_err(|_| LinkError::ChannelClosed)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
