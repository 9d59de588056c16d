//! # Vocab Duel
//!
//! Replicated game core for a two-player turn-based word game played
//! peer to peer, with no central server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        VOCAB DUEL                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/              - Shared primitives                      │
//! │  └── hash.rs        - State digests for convergence checks   │
//! │                                                              │
//! │  game/              - Game rules (pure, no I/O)              │
//! │  ├── state.rs       - Replicated session snapshot            │
//! │  ├── board.rs       - 10x10 grid and path geometry           │
//! │  ├── action.rs      - Requested mutations                    │
//! │  ├── authority.rs   - Who may originate which action         │
//! │  ├── turn.rs        - Turn engine (state transitions)        │
//! │  └── events.rs      - Transition outcomes                    │
//! │                                                              │
//! │  network/           - Replication between the two peers      │
//! │  ├── protocol.rs    - Sync / Update wire messages            │
//! │  ├── link.rs        - Peer channel abstraction               │
//! │  ├── ws.rs          - WebSocket transport                    │
//! │  ├── replication.rs - Apply locally, broadcast, merge remote │
//! │  ├── timer.rs       - Per-turn countdown and resync          │
//! │  ├── session.rs     - Action API for the UI layer            │
//! │  └── peer.rs        - Per-peer event loop task               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency Model
//!
//! Last-writer-wins per local action. The acting peer computes the full
//! value of every field it touches and ships those values; the other peer
//! merges them verbatim. The authority rules in `game::authority` make
//! sure only one peer can write turn fields at a time.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::hash::{StateHash, short_hex};
pub use game::action::Action;
pub use game::authority::IllegalAction;
pub use game::board::{Board, CellPos};
pub use game::state::{GameState, Phase, Player, Seat, StateField, TurnPhase};
pub use game::turn::{apply, Transition};
pub use network::session::{SessionController, SessionUpdate};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Board width and height in cells
pub const BOARD_SIZE: usize = 10;

/// Seconds per turn
pub const TURN_SECONDS: u32 = 60;

/// The host re-broadcasts the clock whenever it hits a multiple of this
pub const RESYNC_EVERY_SECS: u32 = 5;

/// Consecutive missed turns that forfeit the game
pub const MAX_MISSED_TURNS: u8 = 5;

/// Shortest claimable word
pub const MIN_WORD_LEN: usize = 2;

/// Target score for a fresh session (win threshold 51)
pub const DEFAULT_TARGET_SCORE: u32 = 100;
