//! Turn Engine
//!
//! Pure state transitions for the placement/claim turn cycle.
//! Never touches the network: given a state, an acting seat and an action,
//! it returns the next state and the set of top-level fields it rewrote.
//!
//! # Turn Cycle
//!
//! ```text
//! PlaceLetter --place--> ClaimWord --claim/end/timeout--> (other seat) PlaceLetter
//! ```

use std::collections::BTreeSet;
use chrono::{DateTime, Utc};

use crate::{MAX_MISSED_TURNS, MIN_WORD_LEN, TURN_SECONDS};
use crate::game::action::Action;
use crate::game::authority::{authorize, IllegalAction};
use crate::game::board::{can_extend_path, normalize_letter, CellPos};
use crate::game::events::{GameEvent, GameEventData, TurnEndReason, WinReason};
use crate::game::state::{
    is_avatar, ChatMessage, GameState, Phase, Seat, StateField, TurnPhase,
};

// =============================================================================
// TRANSITION
// =============================================================================

/// Result of applying one action.
#[derive(Clone, Debug)]
pub struct Transition {
    /// Complete next state
    pub state: GameState,
    /// Top-level fields that were rewritten
    pub changed: BTreeSet<StateField>,
    /// Log entries appended by this transition
    pub messages: Vec<ChatMessage>,
    /// What happened
    pub events: Vec<GameEvent>,
}

impl Transition {
    /// Did this transition end the game?
    pub fn ended_game(&self) -> bool {
        self.events.iter().any(GameEvent::is_game_over)
    }
}

/// Working copy of the state plus change bookkeeping.
struct Draft {
    state: GameState,
    actor: Seat,
    now: DateTime<Utc>,
    changed: BTreeSet<StateField>,
    messages: Vec<ChatMessage>,
    events: Vec<GameEvent>,
}

impl Draft {
    fn new(state: &GameState, actor: Seat, now: DateTime<Utc>) -> Self {
        Self {
            state: state.clone(),
            actor,
            now,
            changed: BTreeSet::new(),
            messages: Vec::new(),
            events: Vec::new(),
        }
    }

    fn touch(&mut self, field: StateField) {
        self.changed.insert(field);
    }

    fn event(&mut self, data: GameEventData) {
        self.events.push(GameEvent::new(self.actor, data));
    }

    /// Append a chat/system line.
    fn notice(&mut self, text: String) {
        let message = ChatMessage::new(text, self.now);
        self.state.push_message(message.clone());
        self.messages.push(message);
        self.touch(StateField::Messages);
    }

    fn clear_selection(&mut self) {
        self.state.selected_cells.clear();
        self.state.current_word.clear();
        self.touch(StateField::SelectedCells);
        self.touch(StateField::CurrentWord);
    }

    /// Hand the turn to the other seat with a fresh clock.
    fn advance_turn(&mut self, reason: TurnEndReason) {
        let next = self.state.current_player.other();
        self.state.current_player = next;
        self.state.time_left = TURN_SECONDS;
        self.state.turn_phase = TurnPhase::PlaceLetter;
        self.clear_selection();
        self.touch(StateField::CurrentPlayer);
        self.touch(StateField::TimeLeft);
        self.touch(StateField::TurnPhase);
        self.event(GameEventData::TurnAdvanced { next, reason });
    }

    /// Ends play. The final clock value ships with the result.
    fn end_game(&mut self, winner: Seat, reason: WinReason) {
        self.state.phase = Phase::Ended;
        self.touch(StateField::Phase);
        self.touch(StateField::TimeLeft);
        self.event(GameEventData::GameWon { winner, reason });
    }

    fn require_turn_phase(&self, expected: TurnPhase) -> Result<(), IllegalAction> {
        if self.state.turn_phase != expected {
            return Err(IllegalAction::WrongTurnPhase { expected });
        }
        Ok(())
    }

    fn finish(self) -> Transition {
        Transition {
            state: self.state,
            changed: self.changed,
            messages: self.messages,
            events: self.events,
        }
    }
}

// =============================================================================
// MESSAGE TEXTS
// =============================================================================

fn start_text(threshold: u32) -> String {
    format!("🎮 Game started! First to {} points wins!", threshold)
}

fn claim_text(tag: &str, word: &str, points: u32) -> String {
    format!("🌟 {} claimed \"{}\" (+{} pts)", tag, word, points)
}

fn win_text(tag: &str) -> String {
    format!("🏆 {} wins!", tag)
}

fn forfeit_text(tag: &str) -> String {
    format!("⏰ {} wins! Opponent missed {} turns.", tag, MAX_MISSED_TURNS)
}

fn timeout_text(tag: &str) -> String {
    format!("⏰ {} ran out of time!", tag)
}

fn reclaim_text(word: &str) -> String {
    format!("⚠️ The word \"{}\" has already been claimed!", word)
}

const INVALID_LETTER_TEXT: &str = "⚠️ Only English letters (A-Z) are allowed!";

// =============================================================================
// APPLY
// =============================================================================

/// Apply an action on behalf of `actor`.
///
/// `now` stamps any log entries the transition appends.
/// Refused actions return `Err` and leave nothing behind. Invalid input
/// (bad letter, re-claimed word) is `Ok` with a warning in the log.
pub fn apply(
    state: &GameState,
    actor: Seat,
    action: &Action,
    now: DateTime<Utc>,
) -> Result<Transition, IllegalAction> {
    authorize(state, actor, action)?;

    let mut draft = Draft::new(state, actor, now);
    match action {
        Action::SelectCell { cell } => select_cell(&mut draft, *cell)?,
        Action::PlaceLetter { cell, letter } => place_letter(&mut draft, *cell, letter)?,
        Action::ClaimWord => claim_word(&mut draft)?,
        Action::EndTurn => {
            draft.require_turn_phase(TurnPhase::ClaimWord)?;
            draft.advance_turn(TurnEndReason::Skipped);
        }
        Action::ResetSelection => {
            draft.require_turn_phase(TurnPhase::PlaceLetter)?;
            draft.clear_selection();
            draft.event(GameEventData::SelectionReset);
        }
        Action::Timeout => timeout(&mut draft),
        Action::SendChat { text } => send_chat(&mut draft, text)?,
        Action::StartGame => start_game(&mut draft)?,
        Action::RestartLobby => {
            draft.state = state.rematch();
            draft.changed.extend(StateField::ALL);
            draft.event(GameEventData::LobbyRestarted);
        }
        Action::SetPlayerName { name } => {
            draft.state.player_mut(actor).name = name.clone();
            draft.touch(StateField::Players);
            draft.event(GameEventData::SetupChanged { field: StateField::Players });
        }
        Action::SetPlayerAvatar { avatar } => {
            if !is_avatar(avatar) {
                return Err(IllegalAction::UnknownAvatar(avatar.clone()));
            }
            draft.state.player_mut(actor).avatar = avatar.clone();
            draft.touch(StateField::Players);
            draft.event(GameEventData::SetupChanged { field: StateField::Players });
        }
        Action::SetTargetScore { score } => {
            draft.state.target_score = *score;
            draft.touch(StateField::TargetScore);
            draft.event(GameEventData::SetupChanged { field: StateField::TargetScore });
        }
    }

    Ok(draft.finish())
}

fn select_cell(draft: &mut Draft, cell: CellPos) -> Result<(), IllegalAction> {
    if !cell.in_bounds() {
        return Err(IllegalAction::OutOfBounds(cell));
    }

    match draft.state.turn_phase {
        TurnPhase::PlaceLetter => {
            if !draft.state.board.is_empty_at(cell) {
                return Err(IllegalAction::CellOccupied(cell));
            }
            // Placement target: never accumulates
            draft.state.selected_cells = vec![cell];
        }
        TurnPhase::ClaimWord => {
            if !draft.state.board.is_filled_at(cell) {
                return Err(IllegalAction::CellEmpty(cell));
            }
            if !can_extend_path(&draft.state.selected_cells, cell) {
                return Err(IllegalAction::NotOnPath(cell));
            }
            draft.state.selected_cells.push(cell);
        }
    }

    draft.state.current_word = draft.state.derived_word();
    draft.touch(StateField::SelectedCells);
    draft.touch(StateField::CurrentWord);
    let word = draft.state.current_word.clone();
    draft.event(GameEventData::CellSelected { cell, word });
    Ok(())
}

fn place_letter(draft: &mut Draft, cell: CellPos, input: &str) -> Result<(), IllegalAction> {
    draft.require_turn_phase(TurnPhase::PlaceLetter)?;
    if !cell.in_bounds() {
        return Err(IllegalAction::OutOfBounds(cell));
    }
    if !draft.state.board.is_empty_at(cell) {
        return Err(IllegalAction::CellOccupied(cell));
    }

    let letter = match normalize_letter(input) {
        Some(letter) => letter,
        None => {
            draft.notice(INVALID_LETTER_TEXT.to_string());
            draft.event(GameEventData::InvalidLetter { input: input.to_string() });
            return Ok(());
        }
    };

    draft.state.board.place(cell, letter);
    draft.state.turn_phase = TurnPhase::ClaimWord;
    draft.touch(StateField::Board);
    draft.touch(StateField::TurnPhase);
    draft.clear_selection();
    draft.event(GameEventData::LetterPlaced { cell, letter });
    Ok(())
}

fn claim_word(draft: &mut Draft) -> Result<(), IllegalAction> {
    draft.require_turn_phase(TurnPhase::ClaimWord)?;

    let word = draft.state.derived_word();
    if word.len() < MIN_WORD_LEN {
        return Err(IllegalAction::WordTooShort(word.len()));
    }

    if draft.state.claimed_words.contains(&word) {
        draft.notice(reclaim_text(&word));
        draft.clear_selection();
        draft.event(GameEventData::WordRejected { word });
        return Ok(());
    }

    let actor = draft.actor;
    let points = word.len() as u32;
    let threshold = draft.state.win_threshold();

    let player = draft.state.player_mut(actor);
    player.score += points;
    player.missed_turns = 0;
    let new_score = player.score;
    let tag = player.display_tag();

    draft.state.claimed_words.insert(word.clone());
    draft.touch(StateField::Players);
    draft.touch(StateField::ClaimedWords);
    draft.notice(claim_text(&tag, &word, points));
    draft.event(GameEventData::WordClaimed { word, points, new_score });

    if new_score >= threshold {
        draft.notice(win_text(&tag));
        draft.end_game(actor, WinReason::Score);
    } else {
        draft.advance_turn(TurnEndReason::Claimed);
    }
    Ok(())
}

fn timeout(draft: &mut Draft) {
    let late = draft.state.current_player;
    let player = draft.state.player_mut(late);
    player.missed_turns = (player.missed_turns + 1).min(MAX_MISSED_TURNS);
    let missed_turns = player.missed_turns;
    let late_tag = player.display_tag();
    draft.touch(StateField::Players);
    draft.event(GameEventData::TurnTimedOut { missed_turns });

    if missed_turns >= MAX_MISSED_TURNS {
        let winner = late.other();
        let winner_tag = draft.state.player(winner).display_tag();
        draft.notice(forfeit_text(&winner_tag));
        draft.end_game(winner, WinReason::Forfeit);
    } else {
        draft.notice(timeout_text(&late_tag));
        draft.advance_turn(TurnEndReason::TimedOut);
    }
}

fn send_chat(draft: &mut Draft, text: &str) -> Result<(), IllegalAction> {
    if text.trim().is_empty() {
        return Err(IllegalAction::EmptyChat);
    }
    let tag = draft.state.player(draft.actor).display_tag();
    draft.notice(format!("{}: {}", tag, text));
    draft.event(GameEventData::ChatPosted);
    Ok(())
}

fn start_game(draft: &mut Draft) -> Result<(), IllegalAction> {
    if draft.state.players.iter().any(|p| p.name.trim().is_empty()) {
        return Err(IllegalAction::NamesMissing);
    }
    if draft.state.target_score == 0 {
        return Err(IllegalAction::ZeroTargetScore);
    }

    let target_score = draft.state.target_score;
    let threshold = draft.state.win_threshold();

    draft.state.phase = Phase::Playing;
    draft.state.turn_phase = TurnPhase::PlaceLetter;
    draft.state.time_left = TURN_SECONDS;
    draft.touch(StateField::Phase);
    draft.touch(StateField::TurnPhase);
    draft.touch(StateField::TimeLeft);
    draft.clear_selection();
    draft.notice(start_text(threshold));
    draft.event(GameEventData::GameStarted { target_score, threshold });
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn run(state: &GameState, actor: Seat, action: Action) -> GameState {
        apply(state, actor, &action, now()).unwrap().state
    }

    /// Ana (host) vs Bo (guest), target 10 (threshold 6), in play.
    fn started() -> GameState {
        let mut state = GameState::new();
        state = run(&state, Seat::Host, Action::SetPlayerName { name: "Ana".into() });
        state = run(&state, Seat::Guest, Action::SetPlayerName { name: "Bo".into() });
        state = run(&state, Seat::Host, Action::SetTargetScore { score: 10 });
        run(&state, Seat::Host, Action::StartGame)
    }

    /// Started game with CAT already on row 0, host in ClaimWord.
    fn cat_on_board() -> GameState {
        let mut state = started();
        state.board.place(CellPos::new(0, 0), 'C');
        state.board.place(CellPos::new(0, 1), 'A');
        state = run(&state, Seat::Host, Action::PlaceLetter {
            cell: CellPos::new(0, 2),
            letter: "t".into(),
        });
        state
    }

    fn select(state: GameState, seat: Seat, cells: &[(u8, u8)]) -> GameState {
        cells.iter().fold(state, |s, (r, c)| {
            run(&s, seat, Action::SelectCell { cell: CellPos::new(*r, *c) })
        })
    }

    #[test]
    fn test_start_game() {
        let state = started();
        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(state.turn_phase, TurnPhase::PlaceLetter);
        assert_eq!(state.time_left, 60);
        assert_eq!(state.messages.last().unwrap().text, "🎮 Game started! First to 6 points wins!");
    }

    #[test]
    fn test_start_requires_names() {
        let state = GameState::new();
        let result = apply(&state, Seat::Host, &Action::StartGame, now());
        assert_eq!(result.unwrap_err(), IllegalAction::NamesMissing);
    }

    #[test]
    fn test_start_requires_positive_target() {
        let mut state = GameState::new();
        state.players[0].name = "Ana".into();
        state.players[1].name = "Bo".into();
        state.target_score = 0;
        let result = apply(&state, Seat::Host, &Action::StartGame, now());
        assert_eq!(result.unwrap_err(), IllegalAction::ZeroTargetScore);
    }

    #[test]
    fn test_place_selection_is_singleton() {
        let state = select(started(), Seat::Host, &[(4, 4), (7, 1)]);
        assert_eq!(state.selected_cells, vec![CellPos::new(7, 1)]);
    }

    #[test]
    fn test_place_letter_moves_to_claim() {
        let state = run(&started(), Seat::Host, Action::PlaceLetter {
            cell: CellPos::new(0, 0),
            letter: "c".into(),
        });
        assert_eq!(state.board.get(CellPos::new(0, 0)), Some('C'));
        assert_eq!(state.turn_phase, TurnPhase::ClaimWord);
        assert!(state.selected_cells.is_empty());

        // One placement per turn
        let again = apply(&state, Seat::Host, &Action::PlaceLetter {
            cell: CellPos::new(0, 1),
            letter: "a".into(),
        }, now());
        assert_eq!(
            again.unwrap_err(),
            IllegalAction::WrongTurnPhase { expected: TurnPhase::PlaceLetter }
        );
    }

    #[test]
    fn test_invalid_letter_warns_without_placing() {
        let state = started();
        for input in ["", "7", "ab", "!"] {
            let t = apply(&state, Seat::Host, &Action::PlaceLetter {
                cell: CellPos::new(0, 0),
                letter: input.into(),
            }, now()).unwrap();
            assert_eq!(t.state.board, state.board);
            assert_eq!(t.state.turn_phase, TurnPhase::PlaceLetter);
            assert_eq!(t.messages.len(), 1);
            assert_eq!(t.messages[0].text, "⚠️ Only English letters (A-Z) are allowed!");
            assert_eq!(t.changed, BTreeSet::from([StateField::Messages]));
        }
    }

    #[test]
    fn test_place_on_filled_cell_is_refused() {
        let mut state = started();
        state.board.place(CellPos::new(2, 2), 'X');
        let result = apply(&state, Seat::Host, &Action::PlaceLetter {
            cell: CellPos::new(2, 2),
            letter: "a".into(),
        }, now());
        assert_eq!(result.unwrap_err(), IllegalAction::CellOccupied(CellPos::new(2, 2)));
    }

    #[test]
    fn test_claim_cat_scores_three() {
        let state = select(cat_on_board(), Seat::Host, &[(0, 0), (0, 1), (0, 2)]);
        assert_eq!(state.current_word, "CAT");

        let t = apply(&state, Seat::Host, &Action::ClaimWord, now()).unwrap();
        assert_eq!(t.state.players[0].score, 3);
        assert!(t.state.claimed_words.contains("CAT"));
        assert_eq!(t.state.current_player, Seat::Guest);
        assert_eq!(t.state.turn_phase, TurnPhase::PlaceLetter);
        assert_eq!(t.state.time_left, 60);
        assert_eq!(t.messages[0].text, "🌟 😀 Ana claimed \"CAT\" (+3 pts)");
    }

    #[test]
    fn test_reclaim_is_rejected() {
        let mut state = select(cat_on_board(), Seat::Host, &[(0, 0), (0, 1), (0, 2)]);
        state.claimed_words.insert("CAT".into());

        let t = apply(&state, Seat::Host, &Action::ClaimWord, now()).unwrap();
        assert_eq!(t.state.players[0].score, 0);
        assert_eq!(t.state.current_player, Seat::Host);
        assert_eq!(t.state.turn_phase, TurnPhase::ClaimWord);
        assert!(t.state.selected_cells.is_empty());
        assert_eq!(t.messages[0].text, "⚠️ The word \"CAT\" has already been claimed!");
    }

    #[test]
    fn test_claim_requires_two_letters() {
        let state = select(cat_on_board(), Seat::Host, &[(0, 2)]);
        let result = apply(&state, Seat::Host, &Action::ClaimWord, now());
        assert_eq!(result.unwrap_err(), IllegalAction::WordTooShort(1));
    }

    #[test]
    fn test_claim_path_must_be_straight() {
        let mut state = cat_on_board();
        state.board.place(CellPos::new(1, 1), 'X');
        let state = select(state, Seat::Host, &[(0, 0), (0, 1)]);
        let result = apply(&state, Seat::Host, &Action::SelectCell { cell: CellPos::new(1, 1) }, now());
        assert_eq!(result.unwrap_err(), IllegalAction::NotOnPath(CellPos::new(1, 1)));
    }

    #[test]
    fn test_claim_select_empty_cell_refused() {
        let state = cat_on_board();
        let result = apply(&state, Seat::Host, &Action::SelectCell { cell: CellPos::new(5, 5) }, now());
        assert_eq!(result.unwrap_err(), IllegalAction::CellEmpty(CellPos::new(5, 5)));
    }

    #[test]
    fn test_winning_claim_ends_game() {
        let mut state = select(cat_on_board(), Seat::Host, &[(0, 0), (0, 1), (0, 2)]);
        state.players[0].score = 4;

        let t = apply(&state, Seat::Host, &Action::ClaimWord, now()).unwrap();
        assert_eq!(t.state.phase, Phase::Ended);
        assert_eq!(t.state.players[0].score, 7);
        assert_eq!(t.state.current_player, Seat::Host);
        assert!(t.ended_game());
        assert_eq!(t.messages.last().unwrap().text, "🏆 😀 Ana wins!");

        let after = apply(&t.state, Seat::Guest, &Action::SendChat { text: "gg".into() }, now());
        assert_eq!(after.unwrap_err(), IllegalAction::GameOver);
    }

    #[test]
    fn test_claim_resets_missed_turns() {
        let mut state = select(cat_on_board(), Seat::Host, &[(0, 0), (0, 1), (0, 2)]);
        state.players[0].missed_turns = 3;
        state.players[1].missed_turns = 2;
        let state = run(&state, Seat::Host, Action::ClaimWord);
        assert_eq!(state.players[0].missed_turns, 0);
        assert_eq!(state.players[1].missed_turns, 2);
    }

    #[test]
    fn test_end_turn_discards_selection() {
        let state = select(cat_on_board(), Seat::Host, &[(0, 0), (0, 1)]);
        let state = run(&state, Seat::Host, Action::EndTurn);
        assert_eq!(state.current_player, Seat::Guest);
        assert!(state.selected_cells.is_empty());
        assert!(state.current_word.is_empty());
        assert_eq!(state.board.filled_count(), 3);
    }

    #[test]
    fn test_end_turn_requires_claim_phase() {
        let result = apply(&started(), Seat::Host, &Action::EndTurn, now());
        assert_eq!(
            result.unwrap_err(),
            IllegalAction::WrongTurnPhase { expected: TurnPhase::ClaimWord }
        );
    }

    #[test]
    fn test_reset_selection() {
        let state = select(started(), Seat::Host, &[(3, 3)]);
        let t = apply(&state, Seat::Host, &Action::ResetSelection, now()).unwrap();
        assert!(t.state.selected_cells.is_empty());
        assert_eq!(t.state.current_player, Seat::Host);
        assert!(!t.changed.contains(&StateField::CurrentPlayer));
    }

    #[test]
    fn test_timeout_advances_turn() {
        let mut state = cat_on_board();
        state.time_left = 0;
        let t = apply(&state, Seat::Host, &Action::Timeout, now()).unwrap();
        assert_eq!(t.state.players[0].missed_turns, 1);
        assert_eq!(t.state.current_player, Seat::Guest);
        assert_eq!(t.state.time_left, 60);
        assert_eq!(t.messages[0].text, "⏰ 😀 Ana ran out of time!");
    }

    #[test]
    fn test_fifth_timeout_forfeits() {
        let mut state = started();
        state.players[0].missed_turns = 4;
        let t = apply(&state, Seat::Host, &Action::Timeout, now()).unwrap();
        assert_eq!(t.state.players[0].missed_turns, 5);
        assert_eq!(t.state.phase, Phase::Ended);
        assert_eq!(t.events.iter().find_map(GameEvent::winner), Some(Seat::Guest));
        assert_eq!(t.messages[0].text, "⏰ 😎 Bo wins! Opponent missed 5 turns.");
    }

    #[test]
    fn test_game_end_ships_final_clock() {
        let mut state = started();
        state.players[0].missed_turns = 4;
        state.time_left = 0;
        let forfeit = apply(&state, Seat::Host, &Action::Timeout, now()).unwrap();
        assert!(forfeit.changed.contains(&StateField::TimeLeft));
        assert_eq!(forfeit.state.time_left, 0);

        let mut state = select(cat_on_board(), Seat::Host, &[(0, 0), (0, 1), (0, 2)]);
        state.players[0].score = 4;
        state.time_left = 17;
        let win = apply(&state, Seat::Host, &Action::ClaimWord, now()).unwrap();
        assert!(win.changed.contains(&StateField::TimeLeft));
        assert_eq!(win.state.time_left, 17);
    }

    #[test]
    fn test_missed_turns_only_move_on_timeout() {
        let mut state = cat_on_board();
        state.players[0].missed_turns = 2;
        state.players[1].missed_turns = 3;
        let missed = |s: &GameState| [s.players[0].missed_turns, s.players[1].missed_turns];

        // Host skips without claiming
        let state = select(state, Seat::Host, &[(0, 0), (0, 1)]);
        assert_eq!(missed(&state), [2, 3]);
        let state = run(&state, Seat::Host, Action::EndTurn);
        assert_eq!(missed(&state), [2, 3]);

        // Guest places, selects and claims: only the guest's own count clears
        let state = run(&state, Seat::Guest, Action::PlaceLetter {
            cell: CellPos::new(0, 3),
            letter: "s".into(),
        });
        assert_eq!(missed(&state), [2, 3]);
        let state = select(state, Seat::Guest, &[(0, 0), (0, 1), (0, 2), (0, 3)]);
        assert_eq!(missed(&state), [2, 3]);
        let state = run(&state, Seat::Guest, Action::ClaimWord);
        assert_eq!(missed(&state), [2, 0]);

        let state = run(&state, Seat::Host, Action::Timeout);
        assert_eq!(missed(&state), [3, 0]);
    }

    #[test]
    fn test_crossing_fifty_one_of_hundred_ends_game() {
        let mut state = started();
        state.target_score = 100;
        state.players[0].score = 49;
        state.board.place(CellPos::new(0, 0), 'C');
        state.board.place(CellPos::new(0, 1), 'A');
        let state = run(&state, Seat::Host, Action::PlaceLetter {
            cell: CellPos::new(0, 2),
            letter: "t".into(),
        });
        let state = select(state, Seat::Host, &[(0, 0), (0, 1), (0, 2)]);
        assert_eq!(state.win_threshold(), 51);

        let t = apply(&state, Seat::Host, &Action::ClaimWord, now()).unwrap();
        assert_eq!(t.state.players[0].score, 52);
        assert_eq!(t.state.phase, Phase::Ended);
        assert_eq!(t.state.current_player, Seat::Host);
        assert_eq!(t.state.turn_phase, TurnPhase::ClaimWord);
        assert!(!t.events.iter().any(|e| matches!(e.data, GameEventData::TurnAdvanced { .. })));
        assert_eq!(t.events.iter().find_map(GameEvent::winner), Some(Seat::Host));
    }

    #[test]
    fn test_guest_cannot_time_out() {
        let mut state = started();
        state.current_player = Seat::Guest;
        let result = apply(&state, Seat::Guest, &Action::Timeout, now());
        assert_eq!(result.unwrap_err(), IllegalAction::HostOnly(Seat::Guest));
    }

    #[test]
    fn test_chat_kept_as_typed_blank_refused() {
        let state = started();
        let t = apply(&state, Seat::Guest, &Action::SendChat { text: " hello ".into() }, now()).unwrap();
        assert_eq!(t.messages[0].text, "😎 Bo:  hello ");
        assert_eq!(t.changed, BTreeSet::from([StateField::Messages]));

        let blank = apply(&state, Seat::Guest, &Action::SendChat { text: "   ".into() }, now());
        assert_eq!(blank.unwrap_err(), IllegalAction::EmptyChat);
    }

    #[test]
    fn test_avatar_must_be_in_palette() {
        let state = GameState::new();
        let t = apply(&state, Seat::Guest, &Action::SetPlayerAvatar { avatar: "🐉".into() }, now()).unwrap();
        assert_eq!(t.state.players[1].avatar, "🐉");
        assert_eq!(t.state.players[0].avatar, "😀");

        let bad = apply(&state, Seat::Guest, &Action::SetPlayerAvatar { avatar: "X".into() }, now());
        assert_eq!(bad.unwrap_err(), IllegalAction::UnknownAvatar("X".into()));
    }

    #[test]
    fn test_restart_lobby() {
        let mut state = started();
        state.phase = Phase::Ended;
        state.players[1].score = 9;
        let t = apply(&state, Seat::Host, &Action::RestartLobby, now()).unwrap();
        assert_eq!(t.state.phase, Phase::Setup);
        assert_eq!(t.state.players[1].name, "Bo");
        assert_eq!(t.state.players[1].score, 0);
        assert_eq!(t.state.target_score, 10);
        assert_eq!(t.changed.len(), StateField::ALL.len());

        // Rematch can start straight from Setup
        let again = run(&t.state, Seat::Host, Action::StartGame);
        assert_eq!(again.phase, Phase::Playing);
    }

    #[test]
    fn test_changed_fields_cover_diff() {
        let state = select(cat_on_board(), Seat::Host, &[(0, 0), (0, 1), (0, 2)]);
        let t = apply(&state, Seat::Host, &Action::ClaimWord, now()).unwrap();
        assert!(t.changed.contains(&StateField::Players));
        assert!(t.changed.contains(&StateField::ClaimedWords));
        assert!(t.changed.contains(&StateField::CurrentPlayer));
        assert!(!t.changed.contains(&StateField::Board));
        assert_eq!(t.state.board, state.board);
    }

    // -------------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------------

    fn letters() -> impl Strategy<Value = Vec<char>> {
        prop::collection::vec(prop::char::range('A', 'Z'), 2..=10)
    }

    proptest! {
        #[test]
        fn prop_claimed_word_never_rescored(word in letters(), seat_is_guest in any::<bool>()) {
            let seat = if seat_is_guest { Seat::Guest } else { Seat::Host };
            let mut state = started();
            state.current_player = seat;
            state.turn_phase = TurnPhase::ClaimWord;
            for (col, letter) in word.iter().enumerate() {
                state.board.place(CellPos::new(3, col as u8), *letter);
            }
            let cells: Vec<(u8, u8)> = (0..word.len() as u8).map(|c| (3, c)).collect();
            let mut state = select(state, seat, &cells);
            let text: String = word.iter().collect();
            state.claimed_words.insert(text);
            let before = state.players.clone();

            let t = apply(&state, seat, &Action::ClaimWord, now()).unwrap();
            prop_assert_eq!(&t.state.players, &before);
            prop_assert_eq!(t.state.current_player, seat);
        }

        #[test]
        fn prop_turn_advance_resets_clock(time_left in 0u32..=60, path in 0u8..3) {
            let mut state = cat_on_board();
            state.time_left = time_left;
            let state = match path {
                0 => {
                    let s = select(state, Seat::Host, &[(0, 0), (0, 1), (0, 2)]);
                    run(&s, Seat::Host, Action::ClaimWord)
                }
                1 => run(&state, Seat::Host, Action::EndTurn),
                _ => run(&state, Seat::Host, Action::Timeout),
            };
            prop_assert_eq!(state.time_left, 60);
            prop_assert_eq!(state.turn_phase, TurnPhase::PlaceLetter);
            prop_assert_eq!(state.current_player, Seat::Guest);
        }

        #[test]
        fn prop_missed_turns_capped(timeouts in 1usize..12) {
            let mut state = started();
            for _ in 0..timeouts {
                state.current_player = Seat::Host;
                match apply(&state, Seat::Host, &Action::Timeout, now()) {
                    Ok(t) => state = t.state,
                    Err(e) => {
                        prop_assert_eq!(e, IllegalAction::GameOver);
                        break;
                    }
                }
            }
            prop_assert!(state.players[0].missed_turns <= MAX_MISSED_TURNS);
            prop_assert_eq!(state.phase == Phase::Ended, timeouts >= MAX_MISSED_TURNS as usize);
        }
    }
}
