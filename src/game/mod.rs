//! Game Logic Module
//!
//! Pure game rules. Nothing here performs I/O or reads the clock.
//!
//! ## Module Structure
//!
//! - `state`: Replicated session snapshot
//! - `board`: Grid storage, selection geometry, letter normalization
//! - `action`: Requested mutations
//! - `authority`: Role and phase checks
//! - `turn`: Turn engine
//! - `events`: Transition outcomes for logs/observers

pub mod state;
pub mod board;
pub mod action;
pub mod authority;
pub mod turn;
pub mod events;

// Re-export key types
pub use state::{GameState, Player, Seat, Phase, TurnPhase, StateField, ChatMessage, AVATARS, CHAT_EMOJIS};
pub use board::{Board, CellPos};
pub use action::Action;
pub use authority::{authorize, IllegalAction};
pub use turn::{apply, Transition};
pub use events::{GameEvent, GameEventData};
