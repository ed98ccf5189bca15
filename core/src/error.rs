use thiserror::Error;

use crate::GameState;

/// Failure taxonomy for the engine and the opponent contract.
///
/// Everything here is a fatal contract violation: the match cannot continue
/// once one of these is returned. Recoverable conditions (wrong cell clicked,
/// exhausted rank, illegal move target) never surface as errors; they are
/// reported through [`crate::NotifyReason`] events instead.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Coordinates outside the grid")]
    OutOfBounds,
    #[error("Invalid state change from {from:?} to {to:?}")]
    InvalidTransition { from: GameState, to: GameState },
    #[error("Acted on an empty cell")]
    EmptyPiece,
    #[error("Opponent returned an illegal move")]
    IllegalOpponentMove,
    #[error("Opponent returned a deployment with unplaced pieces")]
    DeploymentUnfilled,
    #[error("Declare-rank battle resolved without a guess")]
    MissingGuess,
    #[error("Belief board diverged from the observed view")]
    BeliefDesync,
    #[error("No candidate move in any category")]
    NoMoveFound,
    #[error("Placement statistics could not be loaded or saved")]
    Persistence,
    #[error("Engine invariant violated: {0}")]
    Invariant(&'static str),
}

pub type Result<T> = core::result::Result<T, GameError>;
