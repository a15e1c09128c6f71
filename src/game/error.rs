use super::fleet::{Coord, ShipType};
use super::state::Phase;
use thiserror::Error;

/// Reasons a local board mutation was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Action not allowed in '{actual}' phase (requires '{expected}')")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("{ship} does not fit on the board at {origin}")]
    OutOfBounds { ship: ShipType, origin: Coord },

    #[error("{ship} overlaps another ship at {cell}")]
    Overlap { ship: ShipType, cell: Coord },

    #[error("{0} has already been placed")]
    DuplicateShip(ShipType),

    #[error("Fleet must contain exactly {expected} ships, got {actual}")]
    IncompleteFleet { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, GameError>;
