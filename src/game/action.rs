//! Player Actions
//!
//! Every mutation a peer can request against the game state.
//! Actions are evaluated locally by the turn engine; only the resulting
//! field values travel to the other peer, never the action itself.

use serde::{Serialize, Deserialize};
use crate::game::board::CellPos;

/// A requested state transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Pick a cell: the placement target, or the next letter of a claim path
    SelectCell { cell: CellPos },

    /// Write one letter into an empty cell
    PlaceLetter {
        cell: CellPos,
        /// Raw typed input; must be a single Latin letter
        letter: String,
    },

    /// Score the currently selected word
    ClaimWord,

    /// Give up the rest of the turn
    EndTurn,

    /// Clear the placement selection
    ResetSelection,

    /// Turn clock expired (timing authority only)
    Timeout,

    /// Post to the chat log
    SendChat { text: String },

    /// Leave Lobby/Setup and begin play
    StartGame,

    /// Reset a finished game back to Setup
    RestartLobby,

    /// Change own display name
    SetPlayerName { name: String },

    /// Change own avatar
    SetPlayerAvatar { avatar: String },

    /// Change the session target score
    SetTargetScore { score: u32 },
}

impl Action {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::SelectCell { .. } => "select_cell",
            Action::PlaceLetter { .. } => "place_letter",
            Action::ClaimWord => "claim_word",
            Action::EndTurn => "end_turn",
            Action::ResetSelection => "reset_selection",
            Action::Timeout => "timeout",
            Action::SendChat { .. } => "send_chat",
            Action::StartGame => "start_game",
            Action::RestartLobby => "restart_lobby",
            Action::SetPlayerName { .. } => "set_player_name",
            Action::SetPlayerAvatar { .. } => "set_player_avatar",
            Action::SetTargetScore { .. } => "set_target_score",
        }
    }
}
