pub mod client;
pub mod connection;
pub mod rate_limit;
pub mod reconnect;
pub mod rooms;
pub mod server;

pub use client::{ClientConfig, ClientEvent, RelayClient, DEFAULT_HEARTBEAT_INTERVAL};
pub use connection::{Connection, ConnectionError, ConnectionReader, ConnectionWriter};
pub use rate_limit::{RateLimiter, DEFAULT_RATE_LIMIT_MAX, DEFAULT_RATE_LIMIT_WINDOW};
pub use reconnect::{
    CloseAction, ConnectionState, ConnectionStatus, ReconnectPolicy, DEFAULT_BASE_DELAY,
    DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES,
};
pub use rooms::{
    ConnectionHandle, HealthReport, Outbound, RelayError, RoomConfig, RoomManager, RoomStats,
    DEFAULT_MAX_CLIENTS_PER_ROOM, DEFAULT_MAX_ROOMS, DEFAULT_ROOM_TIMEOUT,
};
pub use server::{RelayServer, ServerConfig};
