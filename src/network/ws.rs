//! WebSocket Transport
//!
//! Carries peer frames over a single WebSocket connection.
//! The host listens and serves one guest connection at a time (a new
//! connection after a drop is a reconnect); the guest dials the host's URL.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, connect_async, tungstenite::Message, WebSocketStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::network::link::{LinkError, LinkEvent, PeerLink};

type Slot = Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>;

/// Outgoing half of a WebSocket peer connection.
///
/// Holds the writer queue of the live connection, if any.
#[derive(Clone, Default)]
pub struct WsLink {
    slot: Slot,
}

impl WsLink {
    fn install(&self, sender: Option<mpsc::UnboundedSender<String>>) {
        let mut guard = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = sender;
    }

    fn current(&self) -> Option<mpsc::UnboundedSender<String>> {
        let guard = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    /// Listen on `addr` and serve guest connections.
    ///
    /// Returns the link and the bound address (useful with port 0).
    #[instrument(skip(events))]
    pub async fn host(
        addr: SocketAddr,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<(Self, SocketAddr), LinkError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Hosting on ws://{}", local_addr);

        let link = Self::default();
        let serving = link.clone();
        tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Accept error: {}", e);
                        continue;
                    }
                };
                let ws = match accept_async(stream).await {
                    Ok(ws) => ws,
                    Err(e) => {
                        error!("WebSocket handshake failed for {}: {}", peer, e);
                        continue;
                    }
                };
                info!("Guest connected from {}", peer);
                serving.drive(ws, &events).await;
                if events.is_closed() {
                    break;
                }
            }
        });

        Ok((link, local_addr))
    }

    /// Dial a hosting peer.
    #[instrument(skip(events))]
    pub async fn join(
        url: &str,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Self, LinkError> {
        let (ws, _) = connect_async(url).await?;
        info!("Connected to {}", url);

        let link = Self::default();
        let serving = link.clone();
        tokio::spawn(async move {
            serving.drive(ws, &events).await;
        });
        Ok(link)
    }

    /// Pump one connection until it closes.
    async fn drive<S>(&self, ws: WebSocketStream<S>, events: &mpsc::UnboundedSender<LinkEvent>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        self.install(Some(tx));
        let _ = events.send(LinkEvent::Open);

        loop {
            tokio::select! {
                outgoing = rx.recv() => {
                    let Some(text) = outgoing else { break };
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        error!("WebSocket send failed: {}", e);
                        let _ = events.send(LinkEvent::Error(e.to_string()));
                        break;
                    }
                }
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let _ = events.send(LinkEvent::Frame(text));
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Peer closed the connection");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("WebSocket error: {}", e);
                            let _ = events.send(LinkEvent::Error(e.to_string()));
                            break;
                        }
                    }
                }
            }
        }

        self.install(None);
        let _ = events.send(LinkEvent::Close);
    }
}

impl PeerLink for WsLink {
    fn send(&self, frame: String) -> Result<(), LinkError> {
        let sender = self.current().ok_or(LinkError::NotOpen)?;
        sender.send(frame).map_err(|_| LinkError::ChannelClosed)
    }

    fn is_open(&self) -> bool {
        self.current().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ws_roundtrip() {
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let (guest_tx, mut guest_rx) = mpsc::unbounded_channel();

        let (host, addr) = WsLink::host("127.0.0.1:0".parse().unwrap(), host_tx).await.unwrap();
        assert!(!host.is_open());

        let url = format!("ws://{}", addr);
        let guest = WsLink::join(&url, guest_tx).await.unwrap();

        assert_eq!(host_rx.recv().await, Some(LinkEvent::Open));
        assert_eq!(guest_rx.recv().await, Some(LinkEvent::Open));

        host.send("ping".into()).unwrap();
        assert_eq!(guest_rx.recv().await, Some(LinkEvent::Frame("ping".into())));

        guest.send("pong".into()).unwrap();
        assert_eq!(host_rx.recv().await, Some(LinkEvent::Frame("pong".into())));
    }

    #[test]
    fn test_send_without_connection() {
        let link = WsLink::default();
        assert!(matches!(link.send("x".into()), Err(LinkError::NotOpen)));
    }
}
