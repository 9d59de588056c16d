//! Session Controller
//!
//! Top-level orchestrator for one peer. Owns the single `GameState`,
//! runs actions through the turn engine, hands results to the replication
//! layer, and drives the turn timer.
//!
//! Every action reads the latest owned state immediately before computing
//! its transition, so an interleaved remote update is never overwritten
//! from a stale copy.

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{info, debug, warn, instrument};
use uuid::Uuid;

use crate::core::hash::short_hex;
use crate::game::action::Action;
use crate::game::authority::{IllegalAction, TIMING_AUTHORITY};
use crate::game::board::CellPos;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::state::{GameState, Seat};
use crate::game::turn::apply;
use crate::network::link::{LinkEvent, LinkStatus, PeerLink};
use crate::network::protocol::{PeerMessage, StatePatch};
use crate::network::replication::{Incoming, Replicator};
use crate::network::timer::{TickOutcome, TimerCoordinator};

/// Capacity of the observer channel.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// What caused a session update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrigin {
    /// A local action
    Local,
    /// A message from the other peer
    Remote,
    /// The local turn clock
    Timer,
    /// A connection status change
    Link,
}

/// Post-mutation snapshot for observers (the UI layer).
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    /// What caused it
    pub origin: UpdateOrigin,
    /// State after the change
    pub state: GameState,
    /// Events from a local transition (empty otherwise)
    pub events: Vec<GameEvent>,
    /// Connection status after the change
    pub status: LinkStatus,
}

/// One peer's game session.
pub struct SessionController<L: PeerLink> {
    /// Session identifier (logs only).
    id: Uuid,
    /// Local seat.
    seat: Seat,
    /// Authoritative local snapshot.
    state: GameState,
    /// Replication endpoint.
    replicator: Replicator<L>,
    /// Turn countdown.
    timer: TimerCoordinator,
    /// Observer channel.
    updates: broadcast::Sender<SessionUpdate>,
    /// Set when the countdown restarted; cleared by `take_timer_restart`.
    timer_restarted: bool,
}

impl<L: PeerLink> SessionController<L> {
    /// Create a session with a fresh lobby state.
    pub fn new(link: L, seat: Seat) -> Self {
        Self::with_state(link, seat, GameState::new())
    }

    /// Create a session from an existing state.
    pub fn with_state(link: L, seat: Seat, state: GameState) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let mut timer = TimerCoordinator::new();
        let timer_restarted = timer.observe(&state);
        let id = Uuid::new_v4();
        info!(session = %id, seat = %seat, "Session created");

        Self {
            id,
            seat,
            state,
            replicator: Replicator::new(link, seat),
            timer,
            updates,
            timer_restarted,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Local seat.
    pub fn seat(&self) -> Seat {
        self.seat
    }

    /// Latest local state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Consume the session, keeping its final state.
    pub fn into_state(self) -> GameState {
        self.state
    }

    /// Connection status.
    pub fn status(&self) -> LinkStatus {
        self.replicator.status()
    }

    /// Underlying link.
    pub fn link(&self) -> &L {
        self.replicator.link()
    }

    /// Subscribe to post-mutation snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Sender side of the observer channel.
    pub fn update_sender(&self) -> broadcast::Sender<SessionUpdate> {
        self.updates.clone()
    }

    /// Is the turn countdown running?
    pub fn timer_running(&self) -> bool {
        self.timer.is_running()
    }

    /// Did the countdown restart since the last call?
    pub fn take_timer_restart(&mut self) -> bool {
        std::mem::take(&mut self.timer_restarted)
    }

    // =========================================================================
    // ACTION API
    // =========================================================================

    /// Choose a cell (placement target, or next letter of a claim).
    pub fn select_cell(&mut self, row: u8, col: u8) -> Result<(), IllegalAction> {
        self.dispatch(Action::SelectCell { cell: CellPos::new(row, col) })
    }

    /// Write a letter into an empty cell.
    pub fn place_letter(&mut self, row: u8, col: u8, letter: &str) -> Result<(), IllegalAction> {
        self.dispatch(Action::PlaceLetter {
            cell: CellPos::new(row, col),
            letter: letter.to_string(),
        })
    }

    /// Claim the selected word.
    pub fn claim_word_points(&mut self) -> Result<(), IllegalAction> {
        self.dispatch(Action::ClaimWord)
    }

    /// Skip the rest of the turn.
    pub fn end_turn(&mut self) -> Result<(), IllegalAction> {
        self.dispatch(Action::EndTurn)
    }

    /// Clear the placement selection.
    pub fn reset_selection(&mut self) -> Result<(), IllegalAction> {
        self.dispatch(Action::ResetSelection)
    }

    /// Post a chat line.
    pub fn send_chat(&mut self, text: &str) -> Result<(), IllegalAction> {
        self.dispatch(Action::SendChat { text: text.to_string() })
    }

    /// Begin play (host).
    pub fn start_game(&mut self) -> Result<(), IllegalAction> {
        self.dispatch(Action::StartGame)
    }

    /// Reset a finished game for a rematch (host).
    pub fn restart_lobby(&mut self) -> Result<(), IllegalAction> {
        self.dispatch(Action::RestartLobby)
    }

    /// Set own display name.
    pub fn set_player_name(&mut self, name: &str) -> Result<(), IllegalAction> {
        self.dispatch(Action::SetPlayerName { name: name.to_string() })
    }

    /// Set own avatar.
    pub fn set_player_avatar(&mut self, avatar: &str) -> Result<(), IllegalAction> {
        self.dispatch(Action::SetPlayerAvatar { avatar: avatar.to_string() })
    }

    /// Set the target score (host).
    pub fn set_target_score(&mut self, score: u32) -> Result<(), IllegalAction> {
        self.dispatch(Action::SetTargetScore { score })
    }

    /// Run an action as the local seat, install and broadcast the result.
    fn dispatch(&mut self, action: Action) -> Result<(), IllegalAction> {
        let transition = match apply(&self.state, self.seat, &action, Utc::now()) {
            Ok(transition) => transition,
            Err(e) => {
                debug!(seat = %self.seat, action = action.name(), "Refused: {}", e);
                return Err(e);
            }
        };

        let events = self.replicator.commit(&mut self.state, transition);
        self.log_events(&events);
        self.after_change(UpdateOrigin::Local, events);
        Ok(())
    }

    // =========================================================================
    // INPUTS FROM THE PEER LOOP
    // =========================================================================

    /// Feed a transport notification.
    #[instrument(skip(self, event), fields(seat = %self.seat))]
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match self.replicator.handle_event(&mut self.state, event) {
            Incoming::Opened { .. } | Incoming::Closed => {
                self.after_change(UpdateOrigin::Link, Vec::new())
            }
            Incoming::Synced | Incoming::Merged(_) => {
                self.after_change(UpdateOrigin::Remote, Vec::new())
            }
            Incoming::Ignored => {}
        }
    }

    /// Advance the local turn clock by one second.
    pub fn on_tick(&mut self) {
        let is_authority = self.seat == TIMING_AUTHORITY;
        match self.timer.tick(&mut self.state, is_authority) {
            TickOutcome::Idle => {}
            TickOutcome::Ticked { .. } => self.publish(UpdateOrigin::Timer, Vec::new()),
            TickOutcome::Resync { time_left } => {
                debug!(time_left, "Re-anchoring peer clock");
                self.replicator.broadcast(&PeerMessage::Update {
                    updates: StatePatch::time_left(time_left),
                });
                self.publish(UpdateOrigin::Timer, Vec::new());
            }
            TickOutcome::Expired => {
                // Zero is a resync point too
                self.replicator.broadcast(&PeerMessage::Update {
                    updates: StatePatch::time_left(0),
                });
                if let Err(e) = self.dispatch(Action::Timeout) {
                    warn!("Timeout refused: {}", e);
                }
            }
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn after_change(&mut self, origin: UpdateOrigin, events: Vec<GameEvent>) {
        if self.timer.observe(&self.state) {
            self.timer_restarted = true;
        }
        self.publish(origin, events);
    }

    fn publish(&self, origin: UpdateOrigin, events: Vec<GameEvent>) {
        // No subscribers is fine
        let _ = self.updates.send(SessionUpdate {
            origin,
            state: self.state.clone(),
            events,
            status: self.status(),
        });
    }

    fn log_events(&self, events: &[GameEvent]) {
        for event in events {
            match &event.data {
                GameEventData::GameStarted { target_score, threshold } => {
                    info!(session = %self.id, target_score, threshold, "Game started");
                }
                GameEventData::WordClaimed { word, points, new_score } => {
                    info!(seat = %event.seat, %word, points, new_score, "Word claimed");
                }
                GameEventData::GameWon { winner, reason } => {
                    let digest = self.state.digest().map(|h| short_hex(&h)).unwrap_or_default();
                    info!(session = %self.id, winner = %winner, ?reason, %digest, "Game over");
                }
                GameEventData::LobbyRestarted => {
                    info!(session = %self.id, "Lobby restarted");
                }
                other => debug!(seat = %event.seat, ?other, "Game event"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::game::state::{Phase, TurnPhase};
    use crate::network::link::{channel_pair, ChannelLink};

    struct Duo {
        host: SessionController<ChannelLink>,
        host_rx: UnboundedReceiver<LinkEvent>,
        guest: SessionController<ChannelLink>,
        guest_rx: UnboundedReceiver<LinkEvent>,
    }

    impl Duo {
        fn new() -> Self {
            let ((a, host_rx), (b, guest_rx)) = channel_pair();
            Self {
                host: SessionController::new(a, Seat::Host),
                host_rx,
                guest: SessionController::new(b, Seat::Guest),
                guest_rx,
            }
        }

        /// Deliver every queued link event on both sides until quiet.
        fn pump(&mut self) {
            loop {
                let mut moved = false;
                while let Ok(event) = self.host_rx.try_recv() {
                    self.host.handle_link_event(event);
                    moved = true;
                }
                while let Ok(event) = self.guest_rx.try_recv() {
                    self.guest.handle_link_event(event);
                    moved = true;
                }
                if !moved {
                    break;
                }
            }
        }

        fn connected_and_started() -> Self {
            let mut duo = Self::new();
            duo.host.link().open();
            duo.pump();
            // Players travel as one field: edits must not cross in flight
            duo.host.set_player_name("Ana").unwrap();
            duo.pump();
            duo.guest.set_player_name("Bo").unwrap();
            duo.pump();
            duo.host.set_target_score(10).unwrap();
            duo.host.start_game().unwrap();
            duo.pump();
            duo
        }
    }

    #[test]
    fn test_connect_syncs_guest() {
        let mut duo = Duo::new();
        duo.host.set_target_score(42).unwrap();
        assert_eq!(duo.guest.status(), LinkStatus::Waiting);

        duo.host.link().open();
        duo.pump();
        assert_eq!(duo.guest.status(), LinkStatus::Connected);
        assert_eq!(duo.guest.state().target_score, 42);
        assert_eq!(duo.guest.state(), duo.host.state());
    }

    #[test]
    fn test_actions_replicate() {
        let mut duo = Duo::connected_and_started();
        assert_eq!(duo.guest.state().phase, Phase::Playing);
        assert_eq!(duo.guest.state().players[0].name, "Ana");
        assert_eq!(duo.host.state().players[1].name, "Bo");

        duo.host.place_letter(4, 4, "q").unwrap();
        duo.pump();
        assert_eq!(duo.guest.state().turn_phase, TurnPhase::ClaimWord);
        assert_eq!(duo.guest.state().board.get(CellPos::new(4, 4)), Some('Q'));

        duo.host.end_turn().unwrap();
        duo.pump();
        assert_eq!(duo.guest.state().current_player, Seat::Guest);
        assert_eq!(duo.guest.state(), duo.host.state());
    }

    #[test]
    fn test_out_of_turn_action_refused_silently() {
        let mut duo = Duo::connected_and_started();
        let before = duo.guest.state().clone();
        assert!(matches!(
            duo.guest.place_letter(0, 0, "a"),
            Err(IllegalAction::NotYourTurn { .. })
        ));
        assert_eq!(duo.guest.state(), &before);
        duo.pump();
        assert_eq!(duo.host.state().board.filled_count(), 0);
    }

    #[test]
    fn test_chat_from_guest_reaches_host() {
        let mut duo = Duo::connected_and_started();
        duo.guest.send_chat("good luck").unwrap();
        duo.pump();
        let last = duo.host.state().messages.last().unwrap();
        assert_eq!(last.text, "😎 Bo: good luck");
    }

    #[test]
    fn test_timer_restart_flag() {
        let mut duo = Duo::new();
        assert!(!duo.host.take_timer_restart());
        duo.host.set_player_name("Ana").unwrap();
        duo.host.state.players[1].name = "Bo".into();
        duo.host.start_game().unwrap();
        assert!(duo.host.timer_running());
        assert!(duo.host.take_timer_restart());
        assert!(!duo.host.take_timer_restart());
    }

    #[test]
    fn test_host_resync_broadcasts_time_left() {
        let mut duo = Duo::connected_and_started();
        for _ in 0..5 {
            duo.host.on_tick();
        }
        assert_eq!(duo.host.state().time_left, 55);

        // Guest clock drifted; resync pulls it back
        duo.guest.state.time_left = 58;
        duo.pump();
        assert_eq!(duo.guest.state().time_left, 55);
    }

    #[test]
    fn test_host_expiry_fires_timeout() {
        let mut duo = Duo::connected_and_started();
        duo.host.state.time_left = 1;
        duo.host.on_tick();
        duo.pump();
        assert_eq!(duo.host.state().current_player, Seat::Guest);
        assert_eq!(duo.host.state().players[0].missed_turns, 1);
        assert_eq!(duo.guest.state().current_player, Seat::Guest);
        assert_eq!(duo.guest.state().time_left, 60);
    }

    #[test]
    fn test_host_expiry_broadcasts_zero() {
        let mut duo = Duo::connected_and_started();
        duo.host.state.time_left = 1;
        duo.host.on_tick();
        // Zero travels ahead of the timeout itself
        let first = duo.guest_rx.try_recv().unwrap();
        assert!(matches!(&first, LinkEvent::Frame(f) if f.contains("\"time_left\":0")));
    }

    #[test]
    fn test_forfeit_leaves_peers_identical() {
        let mut duo = Duo::connected_and_started();
        duo.host.state.players[0].missed_turns = 4;
        duo.guest.state.players[0].missed_turns = 4;
        duo.host.state.time_left = 1;
        duo.guest.state.time_left = 3;

        duo.host.on_tick();
        duo.pump();
        assert_eq!(duo.host.state().phase, Phase::Ended);
        assert_eq!(duo.guest.state().phase, Phase::Ended);
        assert_eq!(duo.guest.state().time_left, 0);
        assert!(!duo.guest.timer_running());
        assert_eq!(duo.guest.state(), duo.host.state());
    }

    #[test]
    fn test_guest_expiry_does_nothing() {
        let mut duo = Duo::connected_and_started();
        duo.guest.state.time_left = 1;
        duo.guest.on_tick();
        duo.guest.on_tick();
        duo.pump();
        assert_eq!(duo.guest.state().time_left, 0);
        assert_eq!(duo.guest.state().current_player, Seat::Host);
        assert_eq!(duo.host.state().players[0].missed_turns, 0);
    }

    #[test]
    fn test_subscribers_see_updates() {
        let mut duo = Duo::new();
        let mut rx = duo.host.subscribe();
        duo.host.set_player_name("Ana").unwrap();
        let update = rx.try_recv().unwrap();
        assert_eq!(update.origin, UpdateOrigin::Local);
        assert_eq!(update.state.players[0].name, "Ana");
        assert_eq!(update.events.len(), 1);
    }
}
