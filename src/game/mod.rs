// Re-export all public items
pub use self::board::{Board, CellState};
pub use self::error::GameError;
pub use self::fleet::{
    cells_occupied_by, occupied_cells, total_ship_cells, validate_fleet, Coord, Orientation,
    ShipPlacement, ShipType, FLEET_SIZE, GRID_SIZE,
};
pub use self::state::{MatchState, Phase, RemainingShips, ShotOutcome, ShotRecord, Side, Winner};

// Define submodules
mod board;
mod error;
pub mod fleet;
pub mod state;
