use super::types::{GameMessage, IncomingMessage, RelayMessage};
use crate::crypto::DIGEST_HEX_LEN;
use crate::game::{Coord, ShipPlacement, ShotRecord, FLEET_SIZE, GRID_SIZE};
use serde_json::Value;
use thiserror::Error;

/// Longest room id the relay accepts
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Reasons an incoming message is rejected before reaching game logic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Malformed JSON: {0}")]
    InvalidJson(String),

    #[error("Message is missing a string 'type' field")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Malformed '{message_type}' message: {reason}")]
    Malformed {
        message_type: String,
        reason: String,
    },

    #[error("Coordinate out of range: {0}")]
    CoordinateOutOfRange(Coord),

    #[error("Invalid digest: expected {DIGEST_HEX_LEN} lowercase hex characters")]
    InvalidDigest,

    #[error("Invalid salt: expected {DIGEST_HEX_LEN} lowercase hex characters")]
    InvalidSalt,

    #[error("Invalid revealed fleet: {0}")]
    InvalidFleet(String),

    #[error("Timestamp must be positive")]
    InvalidTimestamp,

    #[error("Peer count must be positive")]
    InvalidPeerCount,

    #[error("Invalid room id: {0}")]
    InvalidRoomId(String),
}

/// True for exactly 64 lowercase hexadecimal characters
pub fn is_hex_digest(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn validate_coord(x: u8, y: u8) -> Result<(), ValidationError> {
    let coord = Coord::new(x, y);
    if x >= GRID_SIZE || y >= GRID_SIZE {
        return Err(ValidationError::CoordinateOutOfRange(coord));
    }
    Ok(())
}

fn validate_revealed_fleet(fleet: &[ShipPlacement]) -> Result<(), ValidationError> {
    if fleet.len() != FLEET_SIZE {
        return Err(ValidationError::InvalidFleet(format!(
            "expected {} ships, got {}",
            FLEET_SIZE,
            fleet.len()
        )));
    }
    for ship in fleet {
        if validate_coord(ship.x, ship.y).is_err() {
            return Err(ValidationError::InvalidFleet(format!(
                "{} origin {} is off the grid",
                ship.kind,
                ship.origin()
            )));
        }
    }
    Ok(())
}

fn validate_history(history: &[ShotRecord]) -> Result<(), ValidationError> {
    for shot in history {
        validate_coord(shot.coord.x, shot.coord.y)?;
    }
    Ok(())
}

/// Validate a room id: non-empty, bounded, printable ASCII without whitespace
pub fn validate_room_id(room_id: &str) -> Result<(), ValidationError> {
    if room_id.is_empty() {
        return Err(ValidationError::InvalidRoomId(
            "room id cannot be empty".to_string(),
        ));
    }
    if room_id.len() > MAX_ROOM_ID_LEN {
        return Err(ValidationError::InvalidRoomId(format!(
            "room id longer than {} characters",
            MAX_ROOM_ID_LEN
        )));
    }
    if !room_id.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ValidationError::InvalidRoomId(format!(
            "room id '{}' contains unsupported characters",
            room_id.escape_default()
        )));
    }
    Ok(())
}

/// Validate the field ranges of a decoded game message.
///
/// Decoding already guarantees field presence and types; this checks what the
/// type system cannot: grid coordinates, hex formats, fleet size and positive
/// timestamps. A revealed fleet is checked structurally only. Whether it is a
/// legal layout is for the auditor to decide.
///
/// # Arguments
///
/// * `message` - The decoded game message
///
/// # Returns
///
/// * `Ok(())` - If every field is in range
/// * `Err(ValidationError)` - Naming the first offending field
///
/// # Examples
///
/// ```
/// use broadside::messages::{validate_game_message, GameMessage};
///
/// assert!(validate_game_message(&GameMessage::Shot { x: 9, y: 0 }).is_ok());
/// assert!(validate_game_message(&GameMessage::Shot { x: 10, y: 0 }).is_err());
/// ```
pub fn validate_game_message(message: &GameMessage) -> Result<(), ValidationError> {
    match message {
        GameMessage::Ready | GameMessage::Rematch | GameMessage::SyncRequest => Ok(()),
        GameMessage::Commit { digest } => {
            if !is_hex_digest(digest) {
                return Err(ValidationError::InvalidDigest);
            }
            Ok(())
        }
        GameMessage::Shot { x, y } => validate_coord(*x, *y),
        GameMessage::ShotResult { x, y, .. } => validate_coord(*x, *y),
        GameMessage::Reveal { fleet, salt } => {
            validate_revealed_fleet(fleet)?;
            if !is_hex_digest(salt) {
                return Err(ValidationError::InvalidSalt);
            }
            Ok(())
        }
        GameMessage::Ping { timestamp } | GameMessage::Pong { timestamp } => {
            if *timestamp == 0 {
                return Err(ValidationError::InvalidTimestamp);
            }
            Ok(())
        }
        GameMessage::SyncResponse { shot_history, .. } => validate_history(shot_history),
    }
}

/// Validate the fields of a relay envelope
pub fn validate_relay_message(message: &RelayMessage) -> Result<(), ValidationError> {
    match message {
        RelayMessage::Join { room_id } => validate_room_id(room_id),
        RelayMessage::PeerCount { count } => {
            if *count == 0 {
                return Err(ValidationError::InvalidPeerCount);
            }
            Ok(())
        }
        RelayMessage::PeerLeft | RelayMessage::Error { .. } => Ok(()),
    }
}

fn malformed(message_type: &str, error: serde_json::Error) -> ValidationError {
    ValidationError::Malformed {
        message_type: message_type.to_string(),
        reason: error.to_string(),
    }
}

/// Parse and validate one raw JSON text message.
///
/// The `type` field decides whether the payload is a relay envelope or a game
/// message. Anything unparseable, of unknown type, or out of range is
/// rejected; callers drop rejected messages.
///
/// # Examples
///
/// ```
/// use broadside::messages::{parse_incoming, GameMessage, IncomingMessage};
///
/// let parsed = parse_incoming(r#"{"type":"shot","x":3,"y":4}"#).unwrap();
/// assert_eq!(parsed, IncomingMessage::Game(GameMessage::Shot { x: 3, y: 4 }));
///
/// assert!(parse_incoming(r#"{"type":"shot","x":3}"#).is_err());
/// assert!(parse_incoming("not json").is_err());
/// ```
pub fn parse_incoming(raw: &str) -> Result<IncomingMessage, ValidationError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;
    let message_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingType)?
        .to_string();

    if RelayMessage::TYPES.contains(&message_type.as_str()) {
        let message: RelayMessage =
            serde_json::from_value(value).map_err(|e| malformed(&message_type, e))?;
        validate_relay_message(&message)?;
        return Ok(IncomingMessage::Relay(message));
    }

    if !GameMessage::TYPES.contains(&message_type.as_str()) {
        return Err(ValidationError::UnknownType(message_type));
    }
    let message: GameMessage =
        serde_json::from_value(value).map_err(|e| malformed(&message_type, e))?;
    validate_game_message(&message)?;
    Ok(IncomingMessage::Game(message))
}

/// Parse a game message, rejecting relay envelopes
pub fn parse_game_message(raw: &str) -> Result<GameMessage, ValidationError> {
    match parse_incoming(raw)? {
        IncomingMessage::Game(message) => Ok(message),
        IncomingMessage::Relay(message) => {
            Err(ValidationError::UnknownType(message.message_type().to_string()))
        }
    }
}
