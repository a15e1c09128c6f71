//! Helpers for talking to a live relay on an ephemeral port

use broadside::messages::{RelayMessage, WireConfig};
use broadside::network::{
    Connection, ConnectionReader, ConnectionWriter, RelayServer, RoomManager, ServerConfig,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// A relay running in the background on an ephemeral port
pub struct TestRelay {
    pub addr: SocketAddr,
    pub rooms: Arc<RoomManager>,
    pub handle: JoinHandle<anyhow::Result<()>>,
}

/// Bind a relay to 127.0.0.1:0 and run it in the background
pub async fn start_relay(config: ServerConfig) -> TestRelay {
    let server = RelayServer::bind("127.0.0.1:0", config)
        .await
        .expect("relay binds");
    let addr = server.local_addr().expect("relay has an address");
    let rooms = server.rooms();
    let handle = tokio::spawn(server.run());
    TestRelay {
        addr,
        rooms,
        handle,
    }
}

/// A raw framed connection to the relay
pub struct RawPeer {
    pub reader: ConnectionReader,
    pub writer: ConnectionWriter,
}

impl RawPeer {
    pub async fn connect(addr: SocketAddr) -> Self {
        Self::connect_with(addr, WireConfig::default()).await
    }

    /// Connect with a custom frame limit, e.g. to send frames the relay refuses
    pub async fn connect_with(addr: SocketAddr, wire: WireConfig) -> Self {
        let connection = Connection::connect(&addr.to_string(), wire, STEP_TIMEOUT)
            .await
            .expect("connects to relay");
        let (reader, writer) = connection.into_split();
        Self { reader, writer }
    }

    /// Connect and join `room_id`, consuming the peer count reply
    pub async fn join(addr: SocketAddr, room_id: &str) -> (Self, usize) {
        let mut peer = Self::connect(addr).await;
        peer.send_json(&RelayMessage::join(room_id)).await;
        match peer.recv_relay().await {
            RelayMessage::PeerCount { count } => (peer, count),
            other => panic!("expected peer_count, got {:?}", other),
        }
    }

    pub async fn send_text(&mut self, text: &str) {
        self.writer.send_text(text).await.expect("frame sent");
    }

    pub async fn send_json<T: serde::Serialize>(&mut self, message: &T) {
        self.writer.send_json(message).await.expect("frame sent");
    }

    pub async fn recv_text(&mut self) -> String {
        timeout(STEP_TIMEOUT, self.reader.receive_text())
            .await
            .expect("frame arrives in time")
            .expect("frame is readable")
    }

    pub async fn recv_relay(&mut self) -> RelayMessage {
        let text = self.recv_text().await;
        serde_json::from_str(&text).expect("relay envelope")
    }

    /// True once the relay has closed this connection
    pub async fn is_closed(&mut self) -> bool {
        matches!(
            timeout(STEP_TIMEOUT, self.reader.receive_text()).await,
            Ok(Err(_))
        )
    }
}
