//! Action Authority
//!
//! Decides which peer may originate which action at a given moment.
//! At most one peer can legally produce a turn-state mutation at a time,
//! so last-writer-wins replication never races on turn fields.

use thiserror::Error;

use crate::game::action::Action;
use crate::game::board::CellPos;
use crate::game::state::{GameState, Phase, Seat, TurnPhase};

// =============================================================================
// ERRORS
// =============================================================================

/// Refused action. Never mutates state and never produces a log message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalAction {
    /// Nothing but a rematch is accepted after the game ends
    #[error("game is over")]
    GameOver,

    /// Not allowed in the current session phase
    #[error("action not allowed in phase {0:?}")]
    WrongPhase(Phase),

    /// Not allowed in the current turn phase
    #[error("action requires turn phase {expected:?}")]
    WrongTurnPhase { expected: TurnPhase },

    /// Turn-bound action from the seat not on turn
    #[error("{actor} acted during {current}'s turn")]
    NotYourTurn { actor: Seat, current: Seat },

    /// Host-only action from the guest
    #[error("only the host may do this (actor: {0})")]
    HostOnly(Seat),

    /// Cell outside the 10x10 grid
    #[error("cell {0} is off the board")]
    OutOfBounds(CellPos),

    /// Target cell already has a letter
    #[error("cell {0} already holds a letter")]
    CellOccupied(CellPos),

    /// Claim path cell has no letter
    #[error("cell {0} is empty")]
    CellEmpty(CellPos),

    /// Cell breaks the adjacent, straight-line path
    #[error("cell {0} does not extend the selection in a straight line")]
    NotOnPath(CellPos),

    /// Selection too short to score
    #[error("word of length {0} is too short to claim")]
    WordTooShort(usize),

    /// A player has no name yet
    #[error("both players need a name")]
    NamesMissing,

    /// Target score of zero
    #[error("target score must be positive")]
    ZeroTargetScore,

    /// Avatar not in the palette
    #[error("unknown avatar {0:?}")]
    UnknownAvatar(String),

    /// Blank chat line
    #[error("chat message is empty")]
    EmptyChat,
}

// =============================================================================
// AUTHORITY CLASSES
// =============================================================================

/// Who may originate an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorityClass {
    /// Only the seat whose turn it is, during play
    TurnBound,
    /// Only the timing authority (host), during play
    TimingAuthority,
    /// Only the host
    HostOnly,
    /// Either seat, editing its own player slot before play
    OwnSeat,
    /// Either seat, during play
    Anyone,
}

impl Action {
    /// Authority class of this action.
    pub fn authority_class(&self) -> AuthorityClass {
        match self {
            Action::SelectCell { .. }
            | Action::PlaceLetter { .. }
            | Action::ClaimWord
            | Action::EndTurn
            | Action::ResetSelection => AuthorityClass::TurnBound,
            Action::Timeout => AuthorityClass::TimingAuthority,
            Action::StartGame | Action::RestartLobby | Action::SetTargetScore { .. } => {
                AuthorityClass::HostOnly
            }
            Action::SetPlayerName { .. } | Action::SetPlayerAvatar { .. } => AuthorityClass::OwnSeat,
            Action::SendChat { .. } => AuthorityClass::Anyone,
        }
    }
}

/// The seat that owns the turn clock.
pub const TIMING_AUTHORITY: Seat = Seat::Host;

/// Check that `actor` may originate `action` against `state`.
///
/// Covers role and phase only; cell and word preconditions are checked
/// by the turn engine.
pub fn authorize(state: &GameState, actor: Seat, action: &Action) -> Result<(), IllegalAction> {
    if state.phase == Phase::Ended && *action != Action::RestartLobby {
        return Err(IllegalAction::GameOver);
    }

    match action.authority_class() {
        AuthorityClass::TurnBound => {
            require_phase(state, Phase::Playing)?;
            if actor != state.current_player {
                return Err(IllegalAction::NotYourTurn {
                    actor,
                    current: state.current_player,
                });
            }
        }
        AuthorityClass::TimingAuthority => {
            if actor != TIMING_AUTHORITY {
                return Err(IllegalAction::HostOnly(actor));
            }
            require_phase(state, Phase::Playing)?;
        }
        AuthorityClass::HostOnly => {
            if actor != Seat::Host {
                return Err(IllegalAction::HostOnly(actor));
            }
            match action {
                Action::RestartLobby => require_phase(state, Phase::Ended)?,
                _ => require_pregame(state)?,
            }
        }
        AuthorityClass::OwnSeat => require_pregame(state)?,
        AuthorityClass::Anyone => require_phase(state, Phase::Playing)?,
    }

    Ok(())
}

fn require_phase(state: &GameState, phase: Phase) -> Result<(), IllegalAction> {
    if state.phase != phase {
        return Err(IllegalAction::WrongPhase(state.phase));
    }
    Ok(())
}

fn require_pregame(state: &GameState) -> Result<(), IllegalAction> {
    if !state.phase.is_pregame() {
        return Err(IllegalAction::WrongPhase(state.phase));
    }
    Ok(())
}
