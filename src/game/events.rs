//! Game Events
//!
//! Structured record of what a transition did, for logs and observers.
//! Events describe outcomes; the chat log carries the user-facing text.

use serde::{Serialize, Deserialize};
use crate::game::board::CellPos;
use crate::game::state::{Seat, StateField};

/// Why a turn ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEndReason {
    /// A word was claimed without reaching the win threshold
    Claimed,
    /// The player ended the turn explicitly
    Skipped,
    /// The turn clock ran out
    TimedOut,
}

/// How a game was won.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    /// Score reached the win threshold
    Score,
    /// Opponent missed too many turns in a row
    Forfeit,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Play began
    GameStarted {
        target_score: u32,
        threshold: u32,
    },

    /// Cell chosen (placement target or claim path)
    CellSelected {
        cell: CellPos,
        word: String,
    },

    /// Placement selection cleared
    SelectionReset,

    /// Letter written to the board
    LetterPlaced {
        cell: CellPos,
        letter: char,
    },

    /// Typed letter was not A-Z
    InvalidLetter {
        input: String,
    },

    /// Word scored
    WordClaimed {
        word: String,
        points: u32,
        new_score: u32,
    },

    /// Word had already been claimed this session
    WordRejected {
        word: String,
    },

    /// Turn clock ran out for the acting player
    TurnTimedOut {
        missed_turns: u8,
    },

    /// Turn passed to the other player
    TurnAdvanced {
        next: Seat,
        reason: TurnEndReason,
    },

    /// Game over
    GameWon {
        winner: Seat,
        reason: WinReason,
    },

    /// Finished game reset to Setup
    LobbyRestarted,

    /// Chat line posted
    ChatPosted,

    /// Name, avatar or target score edited
    SetupChanged {
        field: StateField,
    },
}

/// A game event with the seat that caused it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Acting seat
    pub seat: Seat,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(seat: Seat, data: GameEventData) -> Self {
        Self { seat, data }
    }

    /// Does this event end the game?
    pub fn is_game_over(&self) -> bool {
        matches!(self.data, GameEventData::GameWon { .. })
    }

    /// Winner, if this is a game-over event.
    pub fn winner(&self) -> Option<Seat> {
        match self.data {
            GameEventData::GameWon { winner, .. } => Some(winner),
            _ => None,
        }
    }
}
