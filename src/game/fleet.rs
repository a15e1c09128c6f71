use super::error::GameError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Width and height of the square battle grid
pub const GRID_SIZE: u8 = 10;

/// Number of ships in a complete fleet
pub const FLEET_SIZE: usize = 5;

/// The five ship kinds, each with a fixed hull length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipType {
    Carrier,
    Battleship,
    Cruiser,
    Submarine,
    Destroyer,
}

impl ShipType {
    /// Every ship kind, in fleet-configuration order
    pub const ALL: [ShipType; FLEET_SIZE] = [
        ShipType::Carrier,
        ShipType::Battleship,
        ShipType::Cruiser,
        ShipType::Submarine,
        ShipType::Destroyer,
    ];

    /// Number of cells the ship occupies
    pub fn size(self) -> u8 {
        match self {
            ShipType::Carrier => 5,
            ShipType::Battleship => 4,
            ShipType::Cruiser => 3,
            ShipType::Submarine => 3,
            ShipType::Destroyer => 2,
        }
    }

    /// Wire name of the ship kind, also the sort key of the canonical commit form
    pub fn name(self) -> &'static str {
        match self {
            ShipType::Carrier => "carrier",
            ShipType::Battleship => "battleship",
            ShipType::Cruiser => "cruiser",
            ShipType::Submarine => "submarine",
            ShipType::Destroyer => "destroyer",
        }
    }
}

impl fmt::Display for ShipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Total number of ship cells in a complete fleet (17)
pub fn total_ship_cells() -> usize {
    ShipType::ALL.iter().map(|ship| ship.size() as usize).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[serde(rename = "h")]
    Horizontal,
    #[serde(rename = "v")]
    Vertical,
}

/// A grid coordinate; `x` is the column and `y` the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: u8,
    pub y: u8,
}

impl Coord {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(&self) -> bool {
        self.x < GRID_SIZE && self.y < GRID_SIZE
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A ship placed on the grid.
///
/// Field order is significant: it is the key order of the canonical JSON form
/// that board commitments hash over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShipPlacement {
    #[serde(rename = "type")]
    pub kind: ShipType,
    pub x: u8,
    pub y: u8,
    pub orientation: Orientation,
}

impl ShipPlacement {
    pub fn new(kind: ShipType, x: u8, y: u8, orientation: Orientation) -> Self {
        Self {
            kind,
            x,
            y,
            orientation,
        }
    }

    pub fn origin(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    /// Cells covered by this ship (see [`cells_occupied_by`])
    pub fn cells(&self) -> Vec<Coord> {
        cells_occupied_by(self)
    }

    pub fn contains(&self, coord: Coord) -> bool {
        self.cells().contains(&coord)
    }

    pub fn in_bounds(&self) -> bool {
        self.cells().iter().all(Coord::in_bounds)
    }
}

/// Board-geometry oracle: the coordinates a placement covers.
///
/// Cells are produced origin-first along the orientation axis. Arithmetic
/// saturates, so a placement hanging off the grid yields out-of-bounds cells
/// rather than wrapping.
pub fn cells_occupied_by(ship: &ShipPlacement) -> Vec<Coord> {
    (0..ship.kind.size())
        .map(|i| match ship.orientation {
            Orientation::Horizontal => Coord::new(ship.x.saturating_add(i), ship.y),
            Orientation::Vertical => Coord::new(ship.x, ship.y.saturating_add(i)),
        })
        .collect()
}

/// Union of all cells covered by a set of placements
pub fn occupied_cells(fleet: &[ShipPlacement]) -> HashSet<Coord> {
    fleet.iter().flat_map(cells_occupied_by).collect()
}

/// Check that a fleet is a legal, complete layout.
///
/// A legal fleet has exactly one placement per ship kind, every cell inside
/// the grid, and no two ships sharing a cell.
pub fn validate_fleet(fleet: &[ShipPlacement]) -> Result<(), GameError> {
    if fleet.len() != FLEET_SIZE {
        return Err(GameError::IncompleteFleet {
            expected: FLEET_SIZE,
            actual: fleet.len(),
        });
    }

    let mut kinds = HashSet::new();
    let mut occupied = HashSet::new();
    for ship in fleet {
        if !kinds.insert(ship.kind) {
            return Err(GameError::DuplicateShip(ship.kind));
        }
        for cell in cells_occupied_by(ship) {
            if !cell.in_bounds() {
                return Err(GameError::OutOfBounds {
                    ship: ship.kind,
                    origin: ship.origin(),
                });
            }
            if !occupied.insert(cell) {
                return Err(GameError::Overlap {
                    ship: ship.kind,
                    cell,
                });
            }
        }
    }

    Ok(())
}
