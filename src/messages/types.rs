use crate::game::{Coord, Phase, ShipPlacement, ShipType, ShotRecord};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a generated room id
pub const ROOM_ID_LEN: usize = 8;

const ROOM_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a short random room id for sharing with an opponent
///
/// # Examples
///
/// ```
/// use broadside::messages::generate_room_id;
///
/// let room_id = generate_room_id();
/// assert_eq!(room_id.len(), 8);
/// assert!(room_id.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
/// ```
pub fn generate_room_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_ID_LEN)
        .map(|_| ROOM_ID_ALPHABET[rng.gen_range(0..ROOM_ID_ALPHABET.len())] as char)
        .collect()
}

/// Messages exchanged between the two players through the relay.
///
/// Every message is a single JSON object whose `type` field names the variant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameMessage {
    Ready,
    Commit {
        digest: String,
    },
    Shot {
        x: u8,
        y: u8,
    },
    #[serde(rename = "result")]
    ShotResult {
        x: u8,
        y: u8,
        hit: bool,
        sunk: Option<ShipType>,
    },
    Reveal {
        fleet: Vec<ShipPlacement>,
        salt: String,
    },
    Rematch,
    Ping {
        timestamp: u64,
    },
    Pong {
        timestamp: u64,
    },
    SyncRequest,
    SyncResponse {
        phase: Phase,
        #[serde(rename = "turnNumber")]
        turn_number: usize,
        #[serde(rename = "shotHistory")]
        shot_history: Vec<ShotRecord>,
    },
}

/// Phases in which ping, pong and sync messages are accepted
const ANY_PHASE: &[Phase] = &Phase::ALL;

impl GameMessage {
    /// Every `type` tag a game message may carry
    pub const TYPES: [&'static str; 10] = [
        "ready",
        "commit",
        "shot",
        "result",
        "reveal",
        "rematch",
        "ping",
        "pong",
        "sync_request",
        "sync_response",
    ];

    pub fn new_shot(coord: Coord) -> Self {
        GameMessage::Shot {
            x: coord.x,
            y: coord.y,
        }
    }

    pub fn new_result(coord: Coord, hit: bool, sunk: Option<ShipType>) -> Self {
        GameMessage::ShotResult {
            x: coord.x,
            y: coord.y,
            hit,
            sunk,
        }
    }

    pub fn new_reveal(fleet: Vec<ShipPlacement>, salt_hex: String) -> Self {
        GameMessage::Reveal {
            fleet,
            salt: salt_hex,
        }
    }

    pub fn new_ping(timestamp: u64) -> Self {
        GameMessage::Ping { timestamp }
    }

    pub fn new_pong(timestamp: u64) -> Self {
        GameMessage::Pong { timestamp }
    }

    /// Get the message type as it appears on the wire
    pub fn message_type(&self) -> &'static str {
        match self {
            GameMessage::Ready => "ready",
            GameMessage::Commit { .. } => "commit",
            GameMessage::Shot { .. } => "shot",
            GameMessage::ShotResult { .. } => "result",
            GameMessage::Reveal { .. } => "reveal",
            GameMessage::Rematch => "rematch",
            GameMessage::Ping { .. } => "ping",
            GameMessage::Pong { .. } => "pong",
            GameMessage::SyncRequest => "sync_request",
            GameMessage::SyncResponse { .. } => "sync_response",
        }
    }

    /// Phases in which this message may be processed
    pub fn legal_phases(&self) -> &'static [Phase] {
        match self {
            GameMessage::Ready => &[Phase::Setup],
            GameMessage::Commit { .. } => &[Phase::Setup, Phase::Commit],
            GameMessage::Shot { .. } | GameMessage::ShotResult { .. } => &[Phase::Battle],
            GameMessage::Reveal { .. } => &[Phase::Reveal],
            GameMessage::Rematch => &[Phase::GameOver],
            GameMessage::Ping { .. }
            | GameMessage::Pong { .. }
            | GameMessage::SyncRequest
            | GameMessage::SyncResponse { .. } => ANY_PHASE,
        }
    }

    pub fn is_legal_in(&self, phase: Phase) -> bool {
        self.legal_phases().contains(&phase)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Error codes the relay reports to a client
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayErrorCode {
    RoomFull,
    InvalidMessage,
    RateLimited,
}

impl fmt::Display for RelayErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            RelayErrorCode::RoomFull => "ROOM_FULL",
            RelayErrorCode::InvalidMessage => "INVALID_MESSAGE",
            RelayErrorCode::RateLimited => "RATE_LIMITED",
        };
        f.write_str(code)
    }
}

/// Envelopes consumed or produced by the relay itself; never forwarded to game logic
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    Join {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    PeerCount {
        count: usize,
    },
    PeerLeft,
    Error {
        code: RelayErrorCode,
        message: String,
    },
}

impl RelayMessage {
    /// Wire names of every relay envelope
    pub const TYPES: [&'static str; 4] = ["join", "peer_count", "peer_left", "error"];

    pub fn join(room_id: impl Into<String>) -> Self {
        RelayMessage::Join {
            room_id: room_id.into(),
        }
    }

    pub fn error(code: RelayErrorCode, message: impl Into<String>) -> Self {
        RelayMessage::Error {
            code,
            message: message.into(),
        }
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            RelayMessage::Join { .. } => "join",
            RelayMessage::PeerCount { .. } => "peer_count",
            RelayMessage::PeerLeft => "peer_left",
            RelayMessage::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Anything a client may receive from the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingMessage {
    Game(GameMessage),
    Relay(RelayMessage),
}
