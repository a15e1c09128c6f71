use crate::messages::wire::{WireConfig, CLIENT_CONNECT_TIMEOUT};
use crate::messages::{parse_incoming, GameMessage, IncomingMessage, RelayErrorCode, RelayMessage};
use crate::network::connection::{Connection, ConnectionError, ConnectionReader, ConnectionWriter};
use crate::network::reconnect::{CloseAction, ConnectionState, ConnectionStatus, ReconnectPolicy};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for one player's relay connection
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay address, `host:port`
    pub relay_addr: String,
    pub room_id: String,
    /// Whether this side created the room
    pub is_host: bool,
    pub heartbeat_interval: Duration,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
    pub wire: WireConfig,
}

impl ClientConfig {
    pub fn new(relay_addr: impl Into<String>, room_id: impl Into<String>, is_host: bool) -> Self {
        Self {
            relay_addr: relay_addr.into(),
            room_id: room_id.into(),
            is_host,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: CLIENT_CONNECT_TIMEOUT,
            wire: WireConfig::default(),
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

/// Everything the driver reports back to the game layer
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A validated game message from the peer
    Game(GameMessage),
    /// The peer joined (true) or left (false) the room
    PeerPresence(bool),
    StatusChanged(ConnectionStatus),
    RelayError {
        code: RelayErrorCode,
        message: String,
    },
    /// Round trip measured from a heartbeat reply
    Latency(Duration),
}

#[derive(Debug)]
enum ClientCommand {
    Send(GameMessage),
    Disconnect,
    Reconnect,
}

enum SessionEnd {
    /// The socket went away; consult the reconnect policy
    Closed,
    /// Every client handle is gone; stop the driver
    Shutdown,
}

/// Handle on a background task that keeps one relay connection alive.
///
/// Messages sent while the connection is down are dropped with a warning;
/// the game layer recovers them through a sync request once the peer is back.
#[derive(Debug)]
pub struct RelayClient {
    commands: mpsc::UnboundedSender<ClientCommand>,
    task: JoinHandle<()>,
}

impl RelayClient {
    /// Start the driver; events arrive on the returned receiver
    pub fn spawn(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            state: ConnectionState::new(config.reconnect.clone()),
            config,
            commands: command_rx,
            events: event_tx,
        };
        let task = tokio::spawn(driver.run());

        (
            Self {
                commands: command_tx,
                task,
            },
            event_rx,
        )
    }

    /// Queue a game message; returns false once the driver has stopped
    pub fn send(&self, message: GameMessage) -> bool {
        self.commands.send(ClientCommand::Send(message)).is_ok()
    }

    /// Close the connection without scheduling a reconnect
    pub fn disconnect(&self) -> bool {
        self.commands.send(ClientCommand::Disconnect).is_ok()
    }

    /// Retry immediately with a fresh retry budget
    pub fn reconnect(&self) -> bool {
        self.commands.send(ClientCommand::Reconnect).is_ok()
    }

    /// Stop the driver and wait for it to finish
    pub async fn shutdown(self) {
        let Self { commands, task } = self;
        drop(commands);
        if let Err(e) = task.await {
            debug!("Relay client task ended abnormally: {}", e);
        }
    }
}

struct Driver {
    config: ClientConfig,
    state: ConnectionState,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl Driver {
    #[instrument(skip(self), fields(relay = %self.config.relay_addr, room_id = %self.config.room_id, host = self.config.is_host))]
    async fn run(mut self) {
        loop {
            self.state.on_connecting();
            self.emit_status();

            match Connection::connect(
                &self.config.relay_addr,
                self.config.wire.clone(),
                self.config.connect_timeout,
            )
            .await
            {
                Ok(connection) => {
                    self.state.on_open();
                    self.emit_status();
                    info!("Connected to relay");
                    if let SessionEnd::Shutdown = self.session(connection).await {
                        return;
                    }
                }
                Err(e) => warn!("Relay connection failed: {}", e),
            }

            let had_peer = self.state.peer_connected();
            let action = self.state.on_close();
            if had_peer {
                self.emit(ClientEvent::PeerPresence(false));
            }
            self.emit_status();

            let resume = match action {
                CloseAction::Reconnect(delay) => self.backoff(delay).await,
                CloseAction::Stop => self.wait_for_reconnect().await,
                CloseAction::GiveUp => {
                    warn!("Giving up on the relay until a manual reconnect");
                    self.wait_for_reconnect().await
                }
            };
            if !resume {
                return;
            }
        }
    }

    /// Sleep out a backoff delay while still serving commands
    async fn backoff(&mut self, delay: Duration) -> bool {
        debug!(delay = ?delay, retry = self.state.retry_count(), "Waiting before reconnect");
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(ClientCommand::Send(message)) => drop_offline(&message),
                    Some(ClientCommand::Disconnect) => {
                        self.go_offline();
                        self.emit_status();
                        return self.wait_for_reconnect().await;
                    }
                    Some(ClientCommand::Reconnect) => {
                        self.state.manual_reconnect();
                        return true;
                    }
                    None => return false,
                },
            }
        }
    }

    /// Stay down until the caller asks for a reconnect
    async fn wait_for_reconnect(&mut self) -> bool {
        while let Some(command) = self.commands.recv().await {
            match command {
                ClientCommand::Send(message) => drop_offline(&message),
                ClientCommand::Disconnect => {}
                ClientCommand::Reconnect => {
                    if self.state.manual_reconnect() {
                        return true;
                    }
                }
            }
        }
        false
    }

    async fn session(&mut self, connection: Connection) -> SessionEnd {
        let (reader, mut writer) = connection.into_split();

        let join = RelayMessage::join(self.config.room_id.clone());
        if let Err(e) = writer.send_json(&join).await {
            warn!("Failed to send join: {}", e);
            return SessionEnd::Closed;
        }

        // Frame reads are not cancel safe, so they run on their own task.
        let (frame_tx, mut frames) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(read_loop(reader, frame_tx));

        let interval = self.config.heartbeat_interval;
        let mut heartbeat = time::interval_at(Instant::now() + interval, interval);

        let end = loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Some(Ok(text)) => {
                        if let Err(e) = self.handle_frame(&text, &mut writer).await {
                            warn!("Relay write failed: {}", e);
                            break SessionEnd::Closed;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Relay read failed: {}", e);
                        break SessionEnd::Closed;
                    }
                    None => {
                        info!("Relay closed the connection");
                        break SessionEnd::Closed;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(ClientCommand::Send(message)) => {
                        if let Err(e) = writer.send_json(&message).await {
                            warn!(message_type = message.message_type(), "Send failed: {}", e);
                            break SessionEnd::Closed;
                        }
                    }
                    Some(ClientCommand::Disconnect) => {
                        self.go_offline();
                        break SessionEnd::Closed;
                    }
                    Some(ClientCommand::Reconnect) => debug!("Already connected"),
                    None => {
                        self.state.disconnect();
                        break SessionEnd::Shutdown;
                    }
                },
                _ = heartbeat.tick() => {
                    if let Err(e) = writer.send_json(&GameMessage::new_ping(unix_millis())).await {
                        warn!("Heartbeat failed: {}", e);
                        break SessionEnd::Closed;
                    }
                }
            }
        };

        reader_task.abort();
        if let Err(e) = writer.shutdown().await {
            debug!("Shutdown failed: {}", e);
        }
        end
    }

    async fn handle_frame(
        &mut self,
        text: &str,
        writer: &mut ConnectionWriter,
    ) -> Result<(), ConnectionError> {
        let incoming = match parse_incoming(text) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!("Dropping invalid message: {}", e);
                return Ok(());
            }
        };

        match incoming {
            IncomingMessage::Relay(RelayMessage::PeerCount { count }) => {
                self.set_peer_present(count >= 2);
            }
            IncomingMessage::Relay(RelayMessage::PeerLeft) => self.set_peer_present(false),
            IncomingMessage::Relay(RelayMessage::Error { code, message }) => {
                warn!(code = %code, "Relay error: {}", message);
                self.emit(ClientEvent::RelayError { code, message });
            }
            IncomingMessage::Relay(RelayMessage::Join { .. }) => {
                debug!("Ignoring join echoed by relay");
            }
            IncomingMessage::Game(GameMessage::Ping { timestamp }) => {
                writer.send_json(&GameMessage::new_pong(timestamp)).await?;
            }
            IncomingMessage::Game(GameMessage::Pong { timestamp }) => {
                let latency = self.state.record_pong(unix_millis(), timestamp);
                self.emit(ClientEvent::Latency(latency));
            }
            IncomingMessage::Game(message) => self.emit(ClientEvent::Game(message)),
        }
        Ok(())
    }

    /// Caller-initiated close; the peer counts as gone from here on
    fn go_offline(&mut self) {
        let had_peer = self.state.peer_connected();
        self.state.disconnect();
        if had_peer {
            self.emit(ClientEvent::PeerPresence(false));
        }
    }

    fn set_peer_present(&mut self, present: bool) {
        if self.state.peer_connected() != present {
            self.state.set_peer_connected(present);
            info!(present, "Peer presence changed");
            self.emit(ClientEvent::PeerPresence(present));
        }
    }

    fn emit_status(&self) {
        self.emit(ClientEvent::StatusChanged(self.state.status()));
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

async fn read_loop(
    mut reader: ConnectionReader,
    frames: mpsc::UnboundedSender<Result<String, ConnectionError>>,
) {
    loop {
        match reader.receive_text().await {
            Ok(text) => {
                if frames.send(Ok(text)).is_err() {
                    return;
                }
            }
            Err(ConnectionError::ConnectionClosed) => return,
            Err(e) => {
                let _ = frames.send(Err(e));
                return;
            }
        }
    }
}

fn drop_offline(message: &GameMessage) {
    warn!(
        message_type = message.message_type(),
        "Not connected to relay, dropping message"
    );
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
