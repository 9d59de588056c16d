//! Game State Definitions
//!
//! The full replicated snapshot of one game session.
//! Every top-level field travels verbatim on the wire.

use std::collections::BTreeSet;
use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::{TURN_SECONDS, DEFAULT_TARGET_SCORE};
use crate::core::hash::{StateHash, digest_encoded};
use crate::game::board::{Board, CellPos};

// =============================================================================
// AVATARS
// =============================================================================

/// Avatar symbols a player may pick during setup.
pub const AVATARS: [&str; 20] = [
    "😀", "😎", "🎮", "🚀", "⭐", "🔥", "💎", "🎯", "🏆", "👑",
    "🎨", "🌟", "💪", "🎭", "🦄", "🐉", "🌈", "⚡", "🎪", "🎸",
];

/// Quick-insert symbols offered next to the chat box.
pub const CHAT_EMOJIS: [&str; 20] = [
    "😊", "😂", "🤣", "😍", "🥳", "😱", "🤔", "👍", "👏", "🙌",
    "💯", "🔥", "❤️", "✨", "🎉", "😅", "😎", "🤩", "😜", "🤗",
];

/// Is this symbol in the avatar palette?
pub fn is_avatar(symbol: &str) -> bool {
    AVATARS.contains(&symbol)
}

// =============================================================================
// SEAT
// =============================================================================

/// One of the two player slots.
///
/// Encoded on the wire as its index: 0 = host (session creator),
/// 1 = guest (joiner).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Seat {
    /// Session creator, index 0. Also the timing authority.
    #[default]
    Host,
    /// Joiner, index 1.
    Guest,
}

impl Seat {
    /// Slot index into `GameState::players`.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Seat::Host => 0,
            Seat::Guest => 1,
        }
    }

    /// The opposing seat.
    #[inline]
    pub fn other(self) -> Seat {
        match self {
            Seat::Host => Seat::Guest,
            Seat::Guest => Seat::Host,
        }
    }
}

impl From<Seat> for u8 {
    fn from(seat: Seat) -> u8 {
        seat.index() as u8
    }
}

/// Seat index outside 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid seat index {0}")]
pub struct InvalidSeat(pub u8);

impl TryFrom<u8> for Seat {
    type Error = InvalidSeat;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(Seat::Host),
            1 => Ok(Seat::Guest),
            other => Err(InvalidSeat(other)),
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seat::Host => write!(f, "host"),
            Seat::Guest => write!(f, "guest"),
        }
    }
}

// =============================================================================
// PHASES
// =============================================================================

/// Session phase. Governs which actions are legal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Freshly created session, players arranging names
    #[default]
    Lobby,
    /// Rematch setup after a finished game
    Setup,
    /// Active gameplay
    Playing,
    /// Game over
    Ended,
}

impl Phase {
    /// Lobby or Setup: names, avatars and target score may change.
    #[inline]
    pub fn is_pregame(self) -> bool {
        matches!(self, Phase::Lobby | Phase::Setup)
    }
}

/// Sub-state within a turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// Place exactly one letter
    #[default]
    PlaceLetter,
    /// Select a straight run of letters and claim it, or end the turn
    ClaimWord,
}

// =============================================================================
// PLAYER
// =============================================================================

/// A player slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Display name (empty until typed)
    pub name: String,
    /// Avatar symbol from `AVATARS`
    pub avatar: String,
    /// Points this session
    pub score: u32,
    /// Consecutive missed turns since the last own claim (0..=5)
    pub missed_turns: u8,
}

impl Player {
    /// Empty player with an avatar.
    pub fn new(avatar: &str) -> Self {
        Self {
            name: String::new(),
            avatar: avatar.to_string(),
            score: 0,
            missed_turns: 0,
        }
    }

    /// "<avatar> <name>" as shown in the log.
    pub fn display_tag(&self) -> String {
        format!("{} {}", self.avatar, self.name)
    }
}

// =============================================================================
// CHAT LOG
// =============================================================================

/// One entry of the chat / system log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Rendered text
    pub text: String,
    /// When the originating peer appended it
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a log entry.
    pub fn new(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            timestamp,
        }
    }
}

// =============================================================================
// STATE FIELDS
// =============================================================================

/// Names of the top-level `GameState` fields.
///
/// Replication ships whole fields; this is the unit of a partial update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    /// `phase`
    Phase,
    /// `players` (both seats together)
    Players,
    /// `target_score`
    TargetScore,
    /// `current_player`
    CurrentPlayer,
    /// `turn_phase`
    TurnPhase,
    /// `time_left`
    TimeLeft,
    /// `board`
    Board,
    /// `selected_cells`
    SelectedCells,
    /// `current_word`
    CurrentWord,
    /// `claimed_words`
    ClaimedWords,
    /// `messages`
    Messages,
}

impl StateField {
    /// Every field, in declaration order.
    pub const ALL: [StateField; 11] = [
        StateField::Phase,
        StateField::Players,
        StateField::TargetScore,
        StateField::CurrentPlayer,
        StateField::TurnPhase,
        StateField::TimeLeft,
        StateField::Board,
        StateField::SelectedCells,
        StateField::CurrentWord,
        StateField::ClaimedWords,
        StateField::Messages,
    ];
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Complete state of a game session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Session phase
    pub phase: Phase,

    /// Host at index 0, guest at index 1
    pub players: [Player; 2],

    /// Session target; a player wins at floor(target / 2) + 1
    pub target_score: u32,

    /// Whose turn it is
    pub current_player: Seat,

    /// Sub-state within the current turn
    pub turn_phase: TurnPhase,

    /// Seconds left in the current turn (0..=60)
    pub time_left: u32,

    /// Letter grid
    pub board: Board,

    /// Cells chosen this turn phase, in order
    pub selected_cells: Vec<CellPos>,

    /// Letters under `selected_cells`, in order
    pub current_word: String,

    /// Words already scored this session (uppercase)
    pub claimed_words: BTreeSet<String>,

    /// Chat and system log (append-only)
    pub messages: Vec<ChatMessage>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Create a new session state in the lobby.
    pub fn new() -> Self {
        Self {
            phase: Phase::Lobby,
            players: [Player::new(AVATARS[0]), Player::new(AVATARS[1])],
            target_score: DEFAULT_TARGET_SCORE,
            current_player: Seat::Host,
            turn_phase: TurnPhase::PlaceLetter,
            time_left: TURN_SECONDS,
            board: Board::new(),
            selected_cells: Vec::new(),
            current_word: String::new(),
            claimed_words: BTreeSet::new(),
            messages: Vec::new(),
        }
    }

    /// Fresh Setup-phase state for a rematch.
    ///
    /// Keeps names, avatars and the target score; clears everything else.
    pub fn rematch(&self) -> Self {
        let mut next = Self::new();
        next.phase = Phase::Setup;
        next.target_score = self.target_score;
        for (fresh, old) in next.players.iter_mut().zip(self.players.iter()) {
            fresh.name = old.name.clone();
            fresh.avatar = old.avatar.clone();
        }
        next
    }

    /// Get a player by seat.
    pub fn player(&self, seat: Seat) -> &Player {
        &self.players[seat.index()]
    }

    /// Get a player mutably by seat.
    pub fn player_mut(&mut self, seat: Seat) -> &mut Player {
        &mut self.players[seat.index()]
    }

    /// Score needed to win.
    #[inline]
    pub fn win_threshold(&self) -> u32 {
        self.target_score / 2 + 1
    }

    /// Is it this seat's turn right now?
    pub fn is_turn_of(&self, seat: Seat) -> bool {
        self.phase == Phase::Playing && self.current_player == seat
    }

    /// Check if the game has ended.
    pub fn is_ended(&self) -> bool {
        self.phase == Phase::Ended
    }

    /// Re-derive the word under the current selection.
    pub fn derived_word(&self) -> String {
        self.board.read_word(&self.selected_cells)
    }

    /// Append a log entry.
    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Digest of the whole snapshot, for convergence checks.
    pub fn digest(&self) -> Result<StateHash, bincode::Error> {
        digest_encoded(self)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_defaults() {
        let state = GameState::new();
        assert_eq!(state.phase, Phase::Lobby);
        assert_eq!(state.current_player, Seat::Host);
        assert_eq!(state.turn_phase, TurnPhase::PlaceLetter);
        assert_eq!(state.time_left, 60);
        assert_eq!(state.target_score, 100);
        assert_eq!(state.players[0].avatar, "😀");
        assert_eq!(state.players[1].avatar, "😎");
        assert!(state.messages.is_empty());
    }

    #[test]
    fn test_win_threshold() {
        let mut state = GameState::new();
        state.target_score = 10;
        assert_eq!(state.win_threshold(), 6);
        state.target_score = 100;
        assert_eq!(state.win_threshold(), 51);
        state.target_score = 7;
        assert_eq!(state.win_threshold(), 4);
    }

    #[test]
    fn test_seat_roundtrip() {
        assert_eq!(Seat::Host.other(), Seat::Guest);
        assert_eq!(Seat::Guest.other(), Seat::Host);
        assert_eq!(Seat::try_from(1u8), Ok(Seat::Guest));
        assert_eq!(Seat::try_from(2u8), Err(InvalidSeat(2)));

        let json = serde_json::to_string(&Seat::Guest).unwrap();
        assert_eq!(json, "1");
        assert!(serde_json::from_str::<Seat>("3").is_err());
    }

    #[test]
    fn test_rematch_keeps_identity_only() {
        let mut state = GameState::new();
        state.phase = Phase::Ended;
        state.target_score = 40;
        state.players[0].name = "Ana".into();
        state.players[0].avatar = "🦄".into();
        state.players[0].score = 21;
        state.players[1].name = "Bo".into();
        state.players[1].missed_turns = 3;
        state.current_player = Seat::Guest;
        state.board.place(CellPos::new(1, 1), 'Q');
        state.claimed_words.insert("QI".into());
        state.push_message(ChatMessage::new("hi", Utc::now()));

        let next = state.rematch();
        assert_eq!(next.phase, Phase::Setup);
        assert_eq!(next.target_score, 40);
        assert_eq!(next.players[0].name, "Ana");
        assert_eq!(next.players[0].avatar, "🦄");
        assert_eq!(next.players[0].score, 0);
        assert_eq!(next.players[1].missed_turns, 0);
        assert_eq!(next.current_player, Seat::Host);
        assert_eq!(next.board.filled_count(), 0);
        assert!(next.claimed_words.is_empty());
        assert!(next.messages.is_empty());
    }

    #[test]
    fn test_digest_tracks_content() {
        let state = GameState::new();
        let copy = state.clone();
        assert_eq!(state.digest().unwrap(), copy.digest().unwrap());

        let mut changed = state.clone();
        changed.time_left = 59;
        assert_ne!(state.digest().unwrap(), changed.digest().unwrap());
    }

    #[test]
    fn test_state_field_all_is_complete() {
        let unique: BTreeSet<_> = StateField::ALL.iter().collect();
        assert_eq!(unique.len(), 11);
    }

    #[test]
    fn test_avatar_palette() {
        assert!(is_avatar("🐉"));
        assert!(!is_avatar("X"));
        assert_eq!(CHAT_EMOJIS.len(), 20);
    }
}
