pub mod cli;
pub mod crypto;
pub mod game;
pub mod messages;
pub mod network;
pub mod protocol;

// Re-export key types for easy testing
pub use crypto::{Commitment, Salt};
pub use game::{Coord, MatchState, Phase, ShipPlacement, ShipType, Side, Winner};
pub use messages::{GameMessage, RelayMessage};
pub use network::{RelayClient, RelayServer, RoomManager};
pub use protocol::{audit, AuditReport, GameProtocol};
