use super::board::{Board, CellState};
use super::error::{GameError, Result};
use super::fleet::{validate_fleet, Coord, ShipPlacement, ShipType, FLEET_SIZE};
use crate::crypto::Salt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Match phases in their linear order.
///
/// The derived `Ord` follows declaration order, which is what forward-only
/// phase reconciliation compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lobby,
    Setup,
    Commit,
    Battle,
    Reveal,
    GameOver,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Lobby,
        Phase::Setup,
        Phase::Commit,
        Phase::Battle,
        Phase::Reveal,
        Phase::GameOver,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Lobby => "lobby",
            Phase::Setup => "setup",
            Phase::Commit => "commit",
            Phase::Battle => "battle",
            Phase::Reveal => "reveal",
            Phase::GameOver => "gameover",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which seat a player occupies. The host is always side `a` and opens fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "a")]
    A,
    #[serde(rename = "b")]
    B,
}

impl Side {
    pub fn from_host_flag(is_host: bool) -> Self {
        if is_host {
            Side::A
        } else {
            Side::B
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Me,
    Opponent,
}

/// One fired shot as recorded in the match history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotRecord {
    #[serde(flatten)]
    pub coord: Coord,
    pub hit: bool,
    pub sunk: Option<ShipType>,
    #[serde(rename = "player")]
    pub attacker: Side,
    /// Local-only marker for a shot whose result has not arrived yet
    #[serde(skip)]
    pub pending: bool,
}

impl ShotRecord {
    pub fn new(coord: Coord, hit: bool, sunk: Option<ShipType>, attacker: Side) -> Self {
        Self {
            coord,
            hit,
            sunk,
            attacker,
            pending: false,
        }
    }
}

/// Outcome of an incoming shot against the own board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotOutcome {
    pub hit: bool,
    pub sunk: Option<ShipType>,
}

/// Ships still afloat on each side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingShips {
    pub me: usize,
    pub opponent: usize,
}

/// Complete state of one match as seen by one side.
///
/// Every mutation is a guarded transition: it checks the current phase (and
/// any auxiliary condition) and either applies the change or leaves the state
/// untouched, reporting which happened. No I/O happens here.
#[derive(Debug, Clone)]
pub struct MatchState {
    role: Side,
    phase: Phase,
    own_board: Board,
    opponent_board: Board,
    own_fleet: Vec<ShipPlacement>,
    opponent_fleet: Vec<ShipPlacement>,
    my_turn: bool,
    own_digest: Option<String>,
    own_salt: Option<Salt>,
    opponent_digest: Option<String>,
    opponent_salt: Option<String>,
    winner: Option<Winner>,
    cheat_detected: bool,
    shot_history: Vec<ShotRecord>,
}

impl MatchState {
    /// Create a fresh match sitting in the lobby
    pub fn new(role: Side) -> Self {
        Self {
            role,
            phase: Phase::Lobby,
            own_board: Board::new(),
            opponent_board: Board::new(),
            own_fleet: Vec::new(),
            opponent_fleet: Vec::new(),
            my_turn: false,
            own_digest: None,
            own_salt: None,
            opponent_digest: None,
            opponent_salt: None,
            winner: None,
            cheat_detected: false,
            shot_history: Vec::new(),
        }
    }

    // ----- accessors -----

    pub fn role(&self) -> Side {
        self.role
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn own_board(&self) -> &Board {
        &self.own_board
    }

    pub fn opponent_board(&self) -> &Board {
        &self.opponent_board
    }

    pub fn own_fleet(&self) -> &[ShipPlacement] {
        &self.own_fleet
    }

    pub fn opponent_fleet(&self) -> &[ShipPlacement] {
        &self.opponent_fleet
    }

    pub fn is_my_turn(&self) -> bool {
        self.my_turn
    }

    pub fn own_digest(&self) -> Option<&str> {
        self.own_digest.as_deref()
    }

    pub fn own_salt(&self) -> Option<&Salt> {
        self.own_salt.as_ref()
    }

    pub fn opponent_digest(&self) -> Option<&str> {
        self.opponent_digest.as_deref()
    }

    pub fn opponent_salt(&self) -> Option<&str> {
        self.opponent_salt.as_deref()
    }

    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    pub fn cheat_detected(&self) -> bool {
        self.cheat_detected
    }

    pub fn shot_history(&self) -> &[ShotRecord] {
        &self.shot_history
    }

    /// History length, used as a monotonically increasing turn counter
    pub fn turn_number(&self) -> usize {
        self.shot_history.len()
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn can_fire(&self) -> bool {
        self.phase == Phase::Battle && self.my_turn
    }

    /// True while a local shot is still waiting for its result
    pub fn has_pending_shot(&self) -> bool {
        self.shot_history.iter().any(|shot| shot.pending)
    }

    /// Own ships whose every cell has been hit
    pub fn own_sunk_count(&self) -> usize {
        self.own_board.sunk_count(&self.own_fleet)
    }

    /// Distinct opponent ships the opponent has reported sunk by our shots
    pub fn opponent_sunk_count(&self) -> usize {
        self.shot_history
            .iter()
            .filter(|shot| shot.attacker == self.role)
            .filter_map(|shot| shot.sunk)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn own_fleet_destroyed(&self) -> bool {
        self.own_fleet.len() == FLEET_SIZE && self.own_sunk_count() >= FLEET_SIZE
    }

    pub fn opponent_fleet_destroyed(&self) -> bool {
        self.opponent_sunk_count() >= FLEET_SIZE
    }

    pub fn remaining_ships(&self) -> RemainingShips {
        RemainingShips {
            me: self.own_fleet.len() - self.own_sunk_count(),
            opponent: FLEET_SIZE.saturating_sub(self.opponent_sunk_count()),
        }
    }

    /// A shot is valid when it lands on the grid on a cell not fired before
    pub fn is_valid_shot(&self, coord: Coord) -> bool {
        coord.in_bounds()
            && !self
                .shot_history
                .iter()
                .any(|shot| shot.attacker == self.role && shot.coord == coord)
    }

    // ----- setup -----

    /// lobby -> setup
    pub fn start_setup(&mut self) -> bool {
        if self.phase != Phase::Lobby {
            return false;
        }
        self.phase = Phase::Setup;
        self.own_board = Board::new();
        self.own_fleet.clear();
        true
    }

    /// Add a ship to the own board during setup
    pub fn place_ship(&mut self, ship: ShipPlacement) -> Result<()> {
        self.require_phase(Phase::Setup)?;

        if self.own_fleet.iter().any(|placed| placed.kind == ship.kind) {
            return Err(GameError::DuplicateShip(ship.kind));
        }
        if !ship.in_bounds() {
            return Err(GameError::OutOfBounds {
                ship: ship.kind,
                origin: ship.origin(),
            });
        }
        if let Some(cell) = ship
            .cells()
            .into_iter()
            .find(|cell| self.own_board.get(*cell) != Some(CellState::Empty))
        {
            return Err(GameError::Overlap {
                ship: ship.kind,
                cell,
            });
        }

        self.own_board.place(&ship);
        self.own_fleet.push(ship);
        Ok(())
    }

    /// Remove a previously placed ship during setup
    pub fn remove_ship(&mut self, kind: ShipType) -> bool {
        if self.phase != Phase::Setup || !self.own_fleet.iter().any(|ship| ship.kind == kind) {
            return false;
        }
        self.own_fleet.retain(|ship| ship.kind != kind);
        self.own_board = Board::from_fleet(&self.own_fleet);
        true
    }

    /// setup -> commit. Requires a complete, legal fleet.
    pub fn commit(&mut self, digest: String, salt: Salt) -> bool {
        if self.phase != Phase::Setup || validate_fleet(&self.own_fleet).is_err() {
            return false;
        }
        self.own_digest = Some(digest);
        self.own_salt = Some(salt);
        self.phase = Phase::Commit;
        true
    }

    /// Store the opponent's digest. Legal in setup or commit, and only once.
    pub fn receive_opponent_commit(&mut self, digest: String) -> bool {
        if !matches!(self.phase, Phase::Setup | Phase::Commit) || self.opponent_digest.is_some() {
            return false;
        }
        self.opponent_digest = Some(digest);
        true
    }

    /// commit -> battle once both digests are known. The host fires first.
    pub fn start_battle(&mut self) -> bool {
        if self.phase != Phase::Commit
            || self.own_digest.is_none()
            || self.opponent_digest.is_none()
        {
            return false;
        }
        self.my_turn = self.role == Side::A;
        self.phase = Phase::Battle;
        true
    }

    // ----- battle -----

    /// Record a provisional local shot and hand the turn over
    pub fn fire_shot(&mut self, coord: Coord) -> bool {
        if !self.can_fire() || self.opponent_board.get(coord) != Some(CellState::Empty) {
            return false;
        }
        if !self.is_valid_shot(coord) {
            return false;
        }

        let mut record = ShotRecord::new(coord, false, None, self.role);
        record.pending = true;
        self.shot_history.push(record);
        self.my_turn = false;
        true
    }

    /// Apply an opponent shot to the own board and compute its outcome.
    ///
    /// Returns `None` (leaving state untouched) outside battle, off the grid,
    /// or when the cell was already fired upon.
    pub fn receive_shot(&mut self, coord: Coord) -> Option<ShotOutcome> {
        if self.phase != Phase::Battle {
            return None;
        }
        let cell = self.own_board.get(coord)?;
        if cell.is_fired() {
            return None;
        }

        let hit = cell == CellState::Ship;
        let mut sunk = None;
        if hit {
            self.own_board.set(coord, CellState::Hit);
            if let Some(ship) = self.own_fleet.iter().find(|ship| ship.contains(coord)) {
                if self.own_board.is_ship_sunk(ship) {
                    sunk = Some(ship.kind);
                    for cell in ship.cells() {
                        self.own_board.set(cell, CellState::Sunk);
                    }
                }
            }
        } else {
            self.own_board.set(coord, CellState::Miss);
        }

        self.shot_history
            .push(ShotRecord::new(coord, hit, sunk, self.role.opponent()));
        self.my_turn = true;
        Some(ShotOutcome { hit, sunk })
    }

    /// Patch the most recent provisional local shot at `coord` with its result
    pub fn receive_result(&mut self, coord: Coord, hit: bool, sunk: Option<ShipType>) -> bool {
        if self.phase != Phase::Battle {
            return false;
        }
        let role = self.role;
        let Some(record) = self
            .shot_history
            .iter_mut()
            .rev()
            .find(|shot| shot.attacker == role && shot.coord == coord && shot.pending)
        else {
            return false;
        };

        record.hit = hit;
        record.sunk = sunk;
        record.pending = false;
        self.opponent_board.set(
            coord,
            if hit {
                CellState::Hit
            } else {
                CellState::Miss
            },
        );
        true
    }

    /// Apply a shot taken from the peer's history during resync.
    ///
    /// Local shots are recorded with the peer's reported outcome. Opponent
    /// shots are re-evaluated against the own board, whose outcome is returned
    /// so it can be reported back.
    pub fn replay_shot(&mut self, record: &ShotRecord) -> Option<ShotOutcome> {
        if self.phase != Phase::Battle || !record.coord.in_bounds() {
            return None;
        }

        if record.attacker == self.role {
            if !self.receive_result(record.coord, record.hit, record.sunk) {
                self.shot_history.push(ShotRecord::new(
                    record.coord,
                    record.hit,
                    record.sunk,
                    self.role,
                ));
                self.opponent_board.set(
                    record.coord,
                    if record.hit {
                        CellState::Hit
                    } else {
                        CellState::Miss
                    },
                );
            }
            self.my_turn = false;
            None
        } else {
            self.receive_shot(record.coord)
        }
    }

    // ----- endgame -----

    /// battle -> reveal
    pub fn start_reveal(&mut self) -> bool {
        if self.phase != Phase::Battle {
            return false;
        }
        self.phase = Phase::Reveal;
        self.my_turn = false;
        true
    }

    /// Store the opponent's revealed fleet and salt
    pub fn receive_reveal(&mut self, fleet: Vec<ShipPlacement>, salt_hex: String) -> bool {
        if self.phase != Phase::Reveal {
            return false;
        }
        self.opponent_fleet = fleet;
        self.opponent_salt = Some(salt_hex);
        true
    }

    /// Raise the cheat indicator. It is never cleared within a match.
    pub fn flag_cheat(&mut self) {
        if !self.cheat_detected {
            debug!("Cheat indicator raised");
        }
        self.cheat_detected = true;
    }

    /// battle | reveal -> gameover
    pub fn finish_game(&mut self, winner: Winner) -> bool {
        if !matches!(self.phase, Phase::Battle | Phase::Reveal) {
            return false;
        }
        self.winner = Some(winner);
        self.phase = Phase::GameOver;
        self.my_turn = false;
        true
    }

    /// gameover -> setup, clearing every per-match field
    pub fn reset_for_rematch(&mut self) -> bool {
        if self.phase != Phase::GameOver {
            return false;
        }
        *self = Self::new(self.role);
        self.phase = Phase::Setup;
        true
    }

    fn require_phase(&self, expected: Phase) -> Result<()> {
        if self.phase != expected {
            return Err(GameError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }
}
