//! Protocol Messages
//!
//! Wire format between the two peers. Exactly two message kinds exist:
//! a full snapshot (`Sync`) and a partial field patch (`Update`).
//! Both travel as JSON text frames.

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};

use crate::game::board::{Board, CellPos};
use crate::game::state::{ChatMessage, GameState, Phase, Player, Seat, StateField, TurnPhase};

// =============================================================================
// PEER MESSAGES
// =============================================================================

/// Messages exchanged between the two peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    /// Full snapshot. Receiver replaces its state wholesale.
    Sync { state: Box<GameState> },

    /// Partial patch. Receiver overwrites only the listed fields.
    Update { updates: StatePatch },
}

impl PeerMessage {
    /// Snapshot message for a state.
    pub fn sync(state: &GameState) -> Self {
        PeerMessage::Sync { state: Box::new(state.clone()) }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// =============================================================================
// STATE PATCH
// =============================================================================

/// A subset of `GameState`'s top-level fields.
///
/// Absent members are omitted on the wire and left untouched on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePatch {
    /// Session phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Both player slots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<[Player; 2]>,
    /// Target score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_score: Option<u32>,
    /// Whose turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_player: Option<Seat>,
    /// Turn sub-state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_phase: Option<TurnPhase>,
    /// Turn clock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_left: Option<u32>,
    /// Whole grid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<Board>,
    /// Selection path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_cells: Option<Vec<CellPos>>,
    /// Word under the selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_word: Option<String>,
    /// Scored words
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_words: Option<BTreeSet<String>>,
    /// Entire chat log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
}

impl StatePatch {
    /// Copy the named fields out of `state`.
    pub fn from_fields<'a>(
        state: &GameState,
        fields: impl IntoIterator<Item = &'a StateField>,
    ) -> Self {
        let mut patch = Self::default();
        for field in fields {
            match field {
                StateField::Phase => patch.phase = Some(state.phase),
                StateField::Players => patch.players = Some(state.players.clone()),
                StateField::TargetScore => patch.target_score = Some(state.target_score),
                StateField::CurrentPlayer => patch.current_player = Some(state.current_player),
                StateField::TurnPhase => patch.turn_phase = Some(state.turn_phase),
                StateField::TimeLeft => patch.time_left = Some(state.time_left),
                StateField::Board => patch.board = Some(state.board.clone()),
                StateField::SelectedCells => {
                    patch.selected_cells = Some(state.selected_cells.clone())
                }
                StateField::CurrentWord => patch.current_word = Some(state.current_word.clone()),
                StateField::ClaimedWords => {
                    patch.claimed_words = Some(state.claimed_words.clone())
                }
                StateField::Messages => patch.messages = Some(state.messages.clone()),
            }
        }
        patch
    }

    /// Clock re-anchor patch.
    pub fn time_left(seconds: u32) -> Self {
        Self {
            time_left: Some(seconds),
            ..Self::default()
        }
    }

    /// Fields present in this patch.
    pub fn fields(&self) -> BTreeSet<StateField> {
        let present = [
            (StateField::Phase, self.phase.is_some()),
            (StateField::Players, self.players.is_some()),
            (StateField::TargetScore, self.target_score.is_some()),
            (StateField::CurrentPlayer, self.current_player.is_some()),
            (StateField::TurnPhase, self.turn_phase.is_some()),
            (StateField::TimeLeft, self.time_left.is_some()),
            (StateField::Board, self.board.is_some()),
            (StateField::SelectedCells, self.selected_cells.is_some()),
            (StateField::CurrentWord, self.current_word.is_some()),
            (StateField::ClaimedWords, self.claimed_words.is_some()),
            (StateField::Messages, self.messages.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(field, is_set)| is_set.then_some(field))
            .collect()
    }

    /// Does this patch carry nothing?
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Overwrite the present fields of `state`.
    pub fn merge_into(self, state: &mut GameState) {
        if let Some(v) = self.phase { state.phase = v; }
        if let Some(v) = self.players { state.players = v; }
        if let Some(v) = self.target_score { state.target_score = v; }
        if let Some(v) = self.current_player { state.current_player = v; }
        if let Some(v) = self.turn_phase { state.turn_phase = v; }
        if let Some(v) = self.time_left { state.time_left = v; }
        if let Some(v) = self.board { state.board = v; }
        if let Some(v) = self.selected_cells { state.selected_cells = v; }
        if let Some(v) = self.current_word { state.current_word = v; }
        if let Some(v) = self.claimed_words { state.claimed_words = v; }
        if let Some(v) = self.messages { state.messages = v; }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn busy_state() -> GameState {
        let mut state = GameState::new();
        state.phase = Phase::Playing;
        state.players[0].name = "Ana".into();
        state.players[1].name = "Bo".into();
        state.players[1].score = 7;
        state.current_player = Seat::Guest;
        state.turn_phase = TurnPhase::ClaimWord;
        state.time_left = 42;
        state.board.place(CellPos::new(0, 0), 'O');
        state.board.place(CellPos::new(0, 1), 'X');
        state.selected_cells = vec![CellPos::new(0, 0)];
        state.current_word = "O".into();
        state.claimed_words.insert("OX".into());
        state.push_message(ChatMessage::new("hi", chrono::Utc::now()));
        state
    }

    #[test]
    fn test_sync_json_shape() {
        let msg = PeerMessage::sync(&GameState::new());
        let json = msg.to_json().unwrap();
        assert!(json.starts_with("{\"type\":\"sync\",\"state\":"));
        assert_eq!(PeerMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_update_omits_absent_fields() {
        let msg = PeerMessage::Update { updates: StatePatch::time_left(35) };
        let json = msg.to_json().unwrap();
        assert_eq!(json, "{\"type\":\"update\",\"updates\":{\"time_left\":35}}");
    }

    #[test]
    fn test_patch_fields_roundtrip() {
        let state = busy_state();
        let wanted = BTreeSet::from([StateField::Board, StateField::CurrentPlayer]);
        let patch = StatePatch::from_fields(&state, &wanted);
        assert_eq!(patch.fields(), wanted);
        assert!(!patch.is_empty());
        assert!(StatePatch::default().is_empty());
    }

    #[test]
    fn test_full_patch_equals_sync() {
        let state = busy_state();
        let patch = StatePatch::from_fields(&state, &StateField::ALL);
        let mut target = GameState::new();
        patch.merge_into(&mut target);
        assert_eq!(target, state);
    }

    #[test]
    fn test_unknown_frame_rejected() {
        assert!(PeerMessage::from_json("{\"type\":\"action\",\"x\":1}").is_err());
        assert!(PeerMessage::from_json("not json").is_err());
    }

    fn field_subset() -> impl Strategy<Value = BTreeSet<StateField>> {
        prop::sample::subsequence(StateField::ALL.to_vec(), 0..=StateField::ALL.len())
            .prop_map(|v| v.into_iter().collect())
    }

    proptest! {
        #[test]
        fn prop_update_touches_only_listed_fields(fields in field_subset()) {
            let source = busy_state();
            let original = GameState::new();

            let json = PeerMessage::Update { updates: StatePatch::from_fields(&source, &fields) }
                .to_json()
                .unwrap();
            let patch = match PeerMessage::from_json(&json).unwrap() {
                PeerMessage::Update { updates } => updates,
                other => panic!("unexpected {:?}", other),
            };

            let mut merged = original.clone();
            patch.merge_into(&mut merged);

            for field in StateField::ALL {
                let from = if fields.contains(&field) { &source } else { &original };
                let expect = StatePatch::from_fields(from, [&field]);
                let actual = StatePatch::from_fields(&merged, [&field]);
                prop_assert_eq!(actual, expect, "field {:?}", field);
            }
        }
    }
}
