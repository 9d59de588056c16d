//! Peer Event Loop
//!
//! Runs one `SessionController` inside a single tokio task. Link events,
//! UI commands and the one-second turn tick are all funneled through one
//! `select!`, so every mutation of the peer's state is strictly ordered.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, debug, instrument};

use crate::DEFAULT_TARGET_SCORE;
use crate::game::state::GameState;
use crate::network::link::{LinkEvent, PeerLink};
use crate::network::session::{SessionController, SessionUpdate};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Peer configuration.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Listen address when hosting.
    pub bind_addr: SocketAddr,
    /// Turn clock period (one "second").
    pub tick_interval: Duration,
    /// UI command queue capacity.
    pub command_buffer: usize,
    /// Target score of a freshly hosted session.
    pub default_target_score: u32,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9001)),
            tick_interval: Duration::from_secs(1),
            command_buffer: 64,
            default_target_score: DEFAULT_TARGET_SCORE,
        }
    }
}

impl PeerConfig {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("VOCAB_BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            tick_interval: std::env::var("VOCAB_TICK_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            command_buffer: defaults.command_buffer,
            default_target_score: std::env::var("VOCAB_TARGET_SCORE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_target_score),
        }
    }

    /// Initial state for a hosted session.
    pub fn initial_state(&self) -> GameState {
        let mut state = GameState::new();
        state.target_score = self.default_target_score;
        state
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Requests from the UI layer.
#[derive(Debug)]
pub enum PeerCommand {
    /// Choose a cell
    SelectCell { row: u8, col: u8 },
    /// Write a letter (raw input, validated by the engine)
    PlaceLetter { row: u8, col: u8, letter: String },
    /// Claim the selected word
    ClaimWord,
    /// Skip the rest of the turn
    EndTurn,
    /// Clear the placement selection
    ResetSelection,
    /// Post a chat line
    SendChat(String),
    /// Begin play (host)
    StartGame,
    /// Rematch after the game ends (host)
    RestartLobby,
    /// Set own name
    SetPlayerName(String),
    /// Set own avatar
    SetPlayerAvatar(String),
    /// Set the target score (host)
    SetTargetScore(u32),
    /// Reply with the current state once everything queued before it is applied
    Snapshot(oneshot::Sender<GameState>),
    /// Stop the peer task
    Shutdown,
}

/// Peer task errors.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// The peer task is no longer accepting commands.
    #[error("peer task has stopped")]
    Stopped,

    /// The peer task panicked or was cancelled.
    #[error("peer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn run_command<L: PeerLink>(session: &mut SessionController<L>, command: PeerCommand) {
    let result = match command {
        PeerCommand::SelectCell { row, col } => session.select_cell(row, col),
        PeerCommand::PlaceLetter { row, col, letter } => session.place_letter(row, col, &letter),
        PeerCommand::ClaimWord => session.claim_word_points(),
        PeerCommand::EndTurn => session.end_turn(),
        PeerCommand::ResetSelection => session.reset_selection(),
        PeerCommand::SendChat(text) => session.send_chat(&text),
        PeerCommand::StartGame => session.start_game(),
        PeerCommand::RestartLobby => session.restart_lobby(),
        PeerCommand::SetPlayerName(name) => session.set_player_name(&name),
        PeerCommand::SetPlayerAvatar(avatar) => session.set_player_avatar(&avatar),
        PeerCommand::SetTargetScore(score) => session.set_target_score(score),
        PeerCommand::Snapshot(reply) => {
            let _ = reply.send(session.state().clone());
            Ok(())
        }
        PeerCommand::Shutdown => Ok(()),
    };
    if let Err(e) = result {
        debug!("Command refused: {}", e);
    }
}

// =============================================================================
// EVENT LOOP
// =============================================================================

/// Drive a session until shutdown. Returns the final state.
#[instrument(skip_all, fields(seat = %session.seat()))]
pub async fn run_peer<L: PeerLink>(
    mut session: SessionController<L>,
    mut link_events: mpsc::UnboundedReceiver<LinkEvent>,
    mut commands: mpsc::Receiver<PeerCommand>,
    tick_interval: Duration,
) -> GameState {
    let mut ticker = interval_at(Instant::now() + tick_interval, tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(session = %session.id(), "Peer loop started");

    loop {
        if session.take_timer_restart() {
            ticker.reset();
        }

        // Remote changes first, so commands never act on a stale snapshot
        tokio::select! {
            biased;
            Some(event) = link_events.recv() => session.handle_link_event(event),
            command = commands.recv() => match command {
                Some(PeerCommand::Shutdown) | None => break,
                Some(command) => run_command(&mut session, command),
            },
            _ = ticker.tick(), if session.timer_running() => session.on_tick(),
        }
    }

    debug!("Peer loop stopped");
    session.into_state()
}

/// Handle to a spawned peer task.
pub struct PeerHandle {
    commands: mpsc::Sender<PeerCommand>,
    updates: broadcast::Sender<SessionUpdate>,
    task: JoinHandle<GameState>,
}

impl PeerHandle {
    /// Queue a command.
    pub async fn send(&self, command: PeerCommand) -> Result<(), PeerError> {
        self.commands.send(command).await.map_err(|_| PeerError::Stopped)
    }

    /// Current state, after everything already queued has been applied.
    pub async fn snapshot(&self) -> Result<GameState, PeerError> {
        let (reply, rx) = oneshot::channel();
        self.send(PeerCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| PeerError::Stopped)
    }

    /// Subscribe to session updates.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Stop the task and return its final state.
    pub async fn shutdown(self) -> Result<GameState, PeerError> {
        // The task may already have stopped; the join below reports the outcome
        let _ = self.commands.send(PeerCommand::Shutdown).await;
        Ok(self.task.await?)
    }
}

/// Spawn a peer task for a session.
pub fn spawn_peer<L: PeerLink + 'static>(
    session: SessionController<L>,
    link_events: mpsc::UnboundedReceiver<LinkEvent>,
    config: &PeerConfig,
) -> PeerHandle {
    let (commands, command_rx) = mpsc::channel(config.command_buffer);
    let updates = session.update_sender();
    let task = tokio::spawn(run_peer(session, link_events, command_rx, config.tick_interval));
    PeerHandle { commands, updates, task }
}
