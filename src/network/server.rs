use crate::messages::wire::{WireConfig, WireProtocolError, DEFAULT_WRITE_TIMEOUT, MAX_MESSAGE_SIZE};
use crate::messages::{validate_room_id, RelayErrorCode, RelayMessage};
use crate::network::connection::{Connection, ConnectionError, ConnectionWriter};
use crate::network::rate_limit::{RateLimiter, DEFAULT_RATE_LIMIT_MAX, DEFAULT_RATE_LIMIT_WINDOW};
use crate::network::rooms::{ConnectionHandle, Outbound, RoomConfig, RoomManager};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Relay settings that apply per connection and per room
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub rooms: RoomConfig,
    pub max_message_size: usize,
    pub write_timeout: Duration,
    pub rate_limit_max: usize,
    pub rate_limit_window: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rooms: RoomConfig::default(),
            max_message_size: MAX_MESSAGE_SIZE,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
        }
    }
}

impl ServerConfig {
    fn wire_config(&self) -> WireConfig {
        WireConfig::new(self.max_message_size, self.write_timeout)
    }
}

/// Room relay: pairs connections by room id and forwards their frames
/// without interpreting anything but the join envelope.
pub struct RelayServer {
    listener: TcpListener,
    rooms: Arc<RoomManager>,
    config: ServerConfig,
}

impl RelayServer {
    pub async fn bind(addr: &str, config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind relay to address: {}", addr))?;

        info!(
            event = "server_started",
            addr = %listener.local_addr()?,
            max_rooms = config.rooms.max_rooms,
            max_message_size = config.max_message_size
        );

        Ok(Self {
            listener,
            rooms: RoomManager::new(config.rooms.clone()),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn rooms(&self) -> Arc<RoomManager> {
        Arc::clone(&self.rooms)
    }

    /// Accept connections until the process ends
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` completes, then drop every connection
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);

        // Track active connections for management
        let mut active_connections: HashMap<usize, JoinHandle<()>> = HashMap::new();
        let mut connection_counter = 0usize;

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer_addr)) => {
                    connection_counter += 1;
                    let connection_id = connection_counter;
                    info!(event = "client_connected", connection_id, peer = %peer_addr);

                    let rooms = Arc::clone(&self.rooms);
                    let config = self.config.clone();
                    let handle = task::spawn(async move {
                        let connection = match Connection::new(stream, config.wire_config()) {
                            Ok(connection) => connection,
                            Err(e) => {
                                error!("Connection {} setup failed: {}", connection_id, e);
                                return;
                            }
                        };
                        Self::handle_connection(connection, rooms, config, connection_id).await;
                    });
                    active_connections.insert(connection_id, handle);

                    // Clean up completed connections
                    active_connections.retain(|id, handle| {
                        if handle.is_finished() {
                            debug!("Cleaning up completed connection {}", id);
                            false
                        } else {
                            true
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            }
        }

        for handle in active_connections.values() {
            handle.abort();
        }
        info!(event = "server_stopped", open_connections = active_connections.len());
        Ok(())
    }

    /// Handle one client from first frame to disconnect
    #[instrument(skip(connection, rooms, config), fields(peer = %connection.peer_addr()))]
    async fn handle_connection(
        connection: Connection,
        rooms: Arc<RoomManager>,
        config: ServerConfig,
        connection_id: usize,
    ) {
        let (mut reader, writer) = connection.into_split();
        let (handle, outbound) = ConnectionHandle::new();
        let mut writer_task = task::spawn(Self::write_loop(writer, outbound));
        let mut writer_done = false;
        let mut limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window);

        loop {
            let received = tokio::select! {
                received = reader.receive_text() => received,
                _ = &mut writer_task => {
                    writer_done = true;
                    break;
                }
            };

            match received {
                Ok(text) => Self::handle_frame(&rooms, &handle, &mut limiter, text).await,
                Err(ConnectionError::ConnectionClosed) => break,
                Err(ConnectionError::WireProtocol(WireProtocolError::MessageTooLarge {
                    size,
                    ..
                })) => {
                    info!(event = "invalid_message", reason = "too_large", size);
                    handle.send_relay(&RelayMessage::error(
                        RelayErrorCode::InvalidMessage,
                        "Message too large",
                    ));
                    handle.close();
                    break;
                }
                Err(e) => {
                    warn!(event = "client_error", error = %e);
                    break;
                }
            }
        }

        rooms.leave(handle.id()).await;
        // Dropping the last sender ends the writer once its queue drains.
        drop(handle);
        if !writer_done {
            if let Err(e) = writer_task.await {
                debug!("Writer task ended abnormally: {}", e);
            }
        }
        info!(event = "client_disconnected");
    }

    /// Route one text frame: rate limit, JSON check, then join or forward
    async fn handle_frame(
        rooms: &RoomManager,
        handle: &ConnectionHandle,
        limiter: &mut RateLimiter,
        text: String,
    ) {
        if !limiter.check(Instant::now()) {
            info!(event = "rate_limited", connection = %handle.id());
            handle.send_relay(&RelayMessage::error(
                RelayErrorCode::RateLimited,
                "Rate limit exceeded",
            ));
            return;
        }

        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => {
                info!(event = "invalid_message", reason = "invalid_json");
                handle.send_relay(&RelayMessage::error(
                    RelayErrorCode::InvalidMessage,
                    "Invalid JSON",
                ));
                return;
            }
        };

        match join_room_id(&value) {
            Some(room_id) => {
                if let Err(e) = rooms.join(room_id, handle).await {
                    warn!(room_id, error = %e, "Join rejected");
                    handle.send_relay(&RelayMessage::error(e.code(), "Room is full"));
                    handle.close();
                }
            }
            None => {
                rooms.broadcast(handle.id(), Arc::from(text)).await;
            }
        }
    }

    async fn write_loop(mut writer: ConnectionWriter, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
        while let Some(next) = outbound.recv().await {
            match next {
                Outbound::Frame(text) => {
                    if let Err(e) = writer.send_text(&text).await {
                        warn!(error = %e, "Failed to write frame");
                        break;
                    }
                }
                Outbound::Close => break,
            }
        }
        if let Err(e) = writer.shutdown().await {
            debug!("Shutdown after write loop failed: {}", e);
        }
    }
}

/// Room id of a well-formed join envelope; anything else is forwarded
fn join_room_id(value: &Value) -> Option<&str> {
    if value.get("type").and_then(Value::as_str) != Some("join") {
        return None;
    }
    let room_id = value.get("roomId").and_then(Value::as_str)?;
    validate_room_id(room_id).ok().map(|_| room_id)
}
