//! Turn Timer
//!
//! Both peers count `time_left` down locally once per second. Only the
//! timing authority re-anchors the other side (every 5 s) and fires the
//! timeout; the other side free-runs and saturates at zero.
//!
//! ```text
//! Idle --(phase becomes Playing)--> Running
//! Running --(phase leaves Playing)--> Idle
//! Running --(current player / turn phase changes)--> Running (restart)
//! ```

use crate::RESYNC_EVERY_SECS;
use crate::game::state::{GameState, Phase, Seat, TurnPhase};

/// Countdown state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimerState {
    /// Not counting
    #[default]
    Idle,
    /// Counting down once per tick
    Running,
}

/// Result of one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer not running; nothing changed
    Idle,
    /// Local clock decremented
    Ticked { time_left: u32 },
    /// Authority hit a resync point; broadcast this value
    Resync { time_left: u32 },
    /// Authority's clock ran out; broadcast the zero, then fire the timeout
    Expired,
}

/// The fields whose change restarts the countdown.
type TurnKey = (Phase, Seat, TurnPhase);

/// Per-peer countdown driver.
#[derive(Debug, Default)]
pub struct TimerCoordinator {
    state: TimerState,
    key: Option<TurnKey>,
}

impl TimerCoordinator {
    /// Create an idle timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Is the countdown running?
    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Re-evaluate after any state change.
    ///
    /// Returns true when the countdown (re)started and the tick source
    /// should be realigned. A change to `time_left` alone never restarts.
    pub fn observe(&mut self, game: &GameState) -> bool {
        let key = (game.phase, game.current_player, game.turn_phase);
        if self.key == Some(key) {
            return false;
        }
        self.key = Some(key);
        self.state = if game.phase == Phase::Playing {
            TimerState::Running
        } else {
            TimerState::Idle
        };
        self.is_running()
    }

    /// Decrement the local clock by one second.
    pub fn tick(&mut self, game: &mut GameState, is_authority: bool) -> TickOutcome {
        if !self.is_running() || game.phase != Phase::Playing {
            return TickOutcome::Idle;
        }

        let time_left = game.time_left.saturating_sub(1);
        game.time_left = time_left;

        if !is_authority {
            return TickOutcome::Ticked { time_left };
        }
        if time_left == 0 {
            TickOutcome::Expired
        } else if time_left % RESYNC_EVERY_SECS == 0 {
            TickOutcome::Resync { time_left }
        } else {
            TickOutcome::Ticked { time_left }
        }
    }
}
