//! Network Layer
//!
//! Replication of the game state between the two peers, the turn clock,
//! and the per-peer event loop. Game rules live in `game/`.

pub mod protocol;
pub mod link;
pub mod ws;
pub mod replication;
pub mod timer;
pub mod session;
pub mod peer;

pub use protocol::{PeerMessage, StatePatch};
pub use link::{channel_pair, ChannelLink, LinkError, LinkEvent, LinkStatus, PeerLink};
pub use ws::WsLink;
pub use replication::{Incoming, Replicator};
pub use timer::{TickOutcome, TimerCoordinator, TimerState};
pub use session::{SessionController, SessionUpdate, UpdateOrigin};
pub use peer::{spawn_peer, run_peer, PeerCommand, PeerConfig, PeerError, PeerHandle};
