//! Fleets and an in-memory match harness

use broadside::game::{Coord, Orientation, ShipPlacement, ShipType, Side};
use broadside::messages::{parse_game_message, GameMessage};
use broadside::protocol::GameProtocol;
use std::time::{Duration, Instant};

/// Ships stacked in rows 0..=4, all horizontal from column 0
pub fn standard_fleet() -> Vec<ShipPlacement> {
    vec![
        ShipPlacement::new(ShipType::Carrier, 0, 0, Orientation::Horizontal),
        ShipPlacement::new(ShipType::Battleship, 0, 1, Orientation::Horizontal),
        ShipPlacement::new(ShipType::Cruiser, 0, 2, Orientation::Horizontal),
        ShipPlacement::new(ShipType::Submarine, 0, 3, Orientation::Horizontal),
        ShipPlacement::new(ShipType::Destroyer, 0, 4, Orientation::Horizontal),
    ]
}

/// Ships spread over the board with mixed orientations
pub fn scattered_fleet() -> Vec<ShipPlacement> {
    vec![
        ShipPlacement::new(ShipType::Destroyer, 8, 8, Orientation::Vertical),
        ShipPlacement::new(ShipType::Carrier, 2, 5, Orientation::Vertical),
        ShipPlacement::new(ShipType::Submarine, 5, 0, Orientation::Horizontal),
        ShipPlacement::new(ShipType::Battleship, 9, 1, Orientation::Vertical),
        ShipPlacement::new(ShipType::Cruiser, 4, 7, Orientation::Horizontal),
    ]
}

/// Every cell of every ship, in fleet order
pub fn ship_cells(fleet: &[ShipPlacement]) -> Vec<Coord> {
    fleet.iter().flat_map(|ship| ship.cells()).collect()
}

/// Cells in rows 5..=9, which `standard_fleet` never occupies
pub fn open_water() -> Vec<Coord> {
    (5..10)
        .flat_map(|y| (0..10).map(move |x| Coord::new(x, y)))
        .collect()
}

/// Send a message through its wire form, as the relay would deliver it
pub fn over_the_wire(message: &GameMessage) -> GameMessage {
    let json = message.to_json().expect("message serializes");
    parse_game_message(&json).expect("message validates")
}

/// Two orchestrators wired back to back, with a manual clock for debounce
pub struct MatchHarness {
    pub host: GameProtocol,
    pub guest: GameProtocol,
    clock: Instant,
}

impl MatchHarness {
    /// Both players present with their fleets placed, nothing committed
    pub fn placed(host_fleet: &[ShipPlacement], guest_fleet: &[ShipPlacement]) -> Self {
        let mut host = GameProtocol::new(Side::A);
        let mut guest = GameProtocol::new(Side::B);
        assert!(host.on_peer_presence(true).is_empty());
        assert!(guest.on_peer_presence(true).is_empty());

        for ship in host_fleet {
            host.place_ship(*ship).expect("host placement");
        }
        for ship in guest_fleet {
            guest.place_ship(*ship).expect("guest placement");
        }

        Self {
            host,
            guest,
            clock: Instant::now(),
        }
    }

    /// Both fleets committed and exchanged
    pub fn in_battle(host_fleet: &[ShipPlacement], guest_fleet: &[ShipPlacement]) -> Self {
        let mut harness = Self::placed(host_fleet, guest_fleet);
        let host_commit = harness.host.commit_fleet().expect("host commit");
        let guest_commit = harness.guest.commit_fleet().expect("guest commit");
        harness.exchange(vec![host_commit], vec![guest_commit]);
        harness
    }

    /// A time safely past the shot debounce
    pub fn tick(&mut self) -> Instant {
        self.clock += Duration::from_secs(1);
        self.clock
    }

    /// Deliver messages in both directions until nobody has anything to say
    pub fn exchange(&mut self, mut to_guest: Vec<GameMessage>, mut to_host: Vec<GameMessage>) {
        while !to_guest.is_empty() || !to_host.is_empty() {
            let mut guest_replies = Vec::new();
            for message in to_guest.drain(..) {
                guest_replies.extend(self.guest.handle_incoming(over_the_wire(&message)));
            }
            let mut host_replies = Vec::new();
            for message in to_host.drain(..) {
                host_replies.extend(self.host.handle_incoming(over_the_wire(&message)));
            }
            to_guest = host_replies;
            to_host = guest_replies;
        }
    }

    /// Host fires and the shot and its result travel normally
    pub fn host_fires(&mut self, coord: Coord) {
        let now = self.tick();
        let shot = self.host.fire(coord, now).expect("host may fire");
        self.exchange(vec![shot], Vec::new());
    }

    /// Guest fires and the shot and its result travel normally
    pub fn guest_fires(&mut self, coord: Coord) {
        let now = self.tick();
        let shot = self.guest.fire(coord, now).expect("guest may fire");
        self.exchange(Vec::new(), vec![shot]);
    }
}
