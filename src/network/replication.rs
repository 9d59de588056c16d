//! Replication Layer
//!
//! Keeps the two peers' `GameState`s converged.
//! - Local transitions are installed, then their touched fields are
//!   shipped as one `Update`.
//! - Remote `Update`s are merged field by field and never re-broadcast.
//! - On every channel open the host sends a full `Sync`.
//!
//! There are no acknowledgements or sequence numbers. A send while the
//! channel is down is dropped; the next `Sync` reconverges.

use std::collections::BTreeSet;
use tracing::{info, warn, debug};

use crate::core::hash::short_hex;
use crate::game::events::GameEvent;
use crate::game::state::{GameState, Seat, StateField};
use crate::game::turn::Transition;
use crate::network::link::{LinkEvent, LinkStatus, PeerLink};
use crate::network::protocol::{PeerMessage, StatePatch};

/// What an incoming link event did to local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Channel opened; `sent_sync` is true when a snapshot went out
    Opened { sent_sync: bool },
    /// Local state replaced by a snapshot
    Synced,
    /// Listed fields overwritten by a patch
    Merged(BTreeSet<StateField>),
    /// Channel closed
    Closed,
    /// Nothing changed (error, bad frame)
    Ignored,
}

/// Replication endpoint for one peer.
pub struct Replicator<L: PeerLink> {
    link: L,
    seat: Seat,
    status: LinkStatus,
}

impl<L: PeerLink> Replicator<L> {
    /// Wrap a link for the given local seat.
    pub fn new(link: L, seat: Seat) -> Self {
        Self {
            link,
            seat,
            status: LinkStatus::Waiting,
        }
    }

    /// Current connection status.
    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Does this side push the snapshot on connect?
    pub fn sends_sync(&self) -> bool {
        self.seat == Seat::Host
    }

    /// Install a locally computed transition and broadcast its fields.
    ///
    /// Returns the transition's events.
    pub fn commit(&self, state: &mut GameState, transition: Transition) -> Vec<GameEvent> {
        let patch = StatePatch::from_fields(&transition.state, &transition.changed);
        *state = transition.state;
        if !patch.is_empty() {
            self.broadcast(&PeerMessage::Update { updates: patch });
        }
        transition.events
    }

    /// Send a message to the other peer.
    ///
    /// Returns false if it could not be delivered.
    pub fn broadcast(&self, message: &PeerMessage) -> bool {
        let frame = match message.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to serialize peer message: {}", e);
                return false;
            }
        };
        match self.link.send(frame) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropped outgoing message: {}", e);
                false
            }
        }
    }

    /// Apply a transport notification to local state.
    pub fn handle_event(&mut self, state: &mut GameState, event: LinkEvent) -> Incoming {
        match event {
            LinkEvent::Open => {
                self.status = LinkStatus::Connected;
                let sent_sync = self.sends_sync() && self.broadcast(&PeerMessage::sync(state));
                info!(seat = %self.seat, sent_sync, "Peer link open");
                Incoming::Opened { sent_sync }
            }
            LinkEvent::Close => {
                self.status = LinkStatus::Disconnected;
                info!(seat = %self.seat, "Peer link closed");
                Incoming::Closed
            }
            LinkEvent::Error(reason) => {
                warn!(seat = %self.seat, "Peer link error: {}", reason);
                Incoming::Ignored
            }
            LinkEvent::Frame(frame) => self.apply_remote(state, &frame),
        }
    }

    /// Apply a received frame without re-broadcasting it.
    fn apply_remote(&mut self, state: &mut GameState, frame: &str) -> Incoming {
        let message = match PeerMessage::from_json(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(seat = %self.seat, "Undecodable peer frame: {}", e);
                return Incoming::Ignored;
            }
        };

        match message {
            PeerMessage::Sync { state: snapshot } => {
                *state = *snapshot;
                if let Ok(hash) = state.digest() {
                    info!(seat = %self.seat, digest = %short_hex(&hash), "Applied full sync");
                }
                Incoming::Synced
            }
            PeerMessage::Update { updates } => {
                let fields = updates.fields();
                updates.merge_into(state);
                debug!(seat = %self.seat, ?fields, "Merged update");
                Incoming::Merged(fields)
            }
        }
    }
}
