pub mod types;
pub mod validation;
pub mod wire;

pub use types::{
    generate_room_id, GameMessage, IncomingMessage, RelayErrorCode, RelayMessage, ROOM_ID_LEN,
};
pub use validation::{
    is_hex_digest, parse_game_message, parse_incoming, validate_game_message,
    validate_relay_message, validate_room_id, ValidationError,
};
pub use wire::{
    // Core framing types
    FramedMessage,
    WireConfig,
    WireProtocolError,

    // Wire protocol constants
    CLIENT_CONNECT_TIMEOUT,
    DEFAULT_WRITE_TIMEOUT,
    LENGTH_PREFIX_SIZE,
    MAX_MESSAGE_SIZE,
};
