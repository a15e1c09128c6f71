use super::fleet::{cells_occupied_by, Coord, ShipPlacement, GRID_SIZE};
use serde::{Deserialize, Serialize};

/// State of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellState {
    #[default]
    Empty,
    Ship,
    Hit,
    Miss,
    Sunk,
}

impl CellState {
    /// Whether a shot has already landed on this cell
    pub fn is_fired(self) -> bool {
        matches!(self, CellState::Hit | CellState::Miss | CellState::Sunk)
    }

    /// Whether this cell is a ship cell that has been struck
    pub fn is_struck(self) -> bool {
        matches!(self, CellState::Hit | CellState::Sunk)
    }
}

/// Square grid of cell states.
///
/// Each side keeps two: its own board (ships plus the opponent's shots) and an
/// opponent view (its own shots and their reported outcomes).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    cells: [[CellState; GRID_SIZE as usize]; GRID_SIZE as usize],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell state at `coord`, or `None` when outside the grid
    pub fn get(&self, coord: Coord) -> Option<CellState> {
        if !coord.in_bounds() {
            return None;
        }
        Some(self.cells[coord.y as usize][coord.x as usize])
    }

    /// Overwrite a cell; out-of-bounds writes are ignored
    pub fn set(&mut self, coord: Coord, state: CellState) {
        if coord.in_bounds() {
            self.cells[coord.y as usize][coord.x as usize] = state;
        }
    }

    /// True when every cell of `ship` is inside the grid and still empty
    pub fn can_place(&self, ship: &ShipPlacement) -> bool {
        cells_occupied_by(ship)
            .into_iter()
            .all(|cell| self.get(cell) == Some(CellState::Empty))
    }

    /// Mark the cells of `ship` as occupied
    pub fn place(&mut self, ship: &ShipPlacement) {
        for cell in cells_occupied_by(ship) {
            self.set(cell, CellState::Ship);
        }
    }

    /// Rebuild a board containing only the given ships
    pub fn from_fleet(fleet: &[ShipPlacement]) -> Self {
        let mut board = Self::new();
        for ship in fleet {
            board.place(ship);
        }
        board
    }

    /// True when every cell of `ship` has been hit
    pub fn is_ship_sunk(&self, ship: &ShipPlacement) -> bool {
        cells_occupied_by(ship)
            .into_iter()
            .all(|cell| self.get(cell).is_some_and(CellState::is_struck))
    }

    /// Number of ships in `fleet` whose cells have all been hit
    pub fn sunk_count(&self, fleet: &[ShipPlacement]) -> usize {
        fleet.iter().filter(|ship| self.is_ship_sunk(ship)).count()
    }
}
