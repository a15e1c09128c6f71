use crate::messages::{RelayErrorCode, RelayMessage};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_ROOMS: usize = 100;
pub const DEFAULT_MAX_CLIENTS_PER_ROOM: usize = 2;
pub const DEFAULT_ROOM_TIMEOUT: Duration = Duration::from_secs(3600);

/// Frames queued for a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(Arc<str>),
    Close,
}

/// The relay's handle on one client connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a frame; returns false if the connection is already gone
    pub fn send(&self, outbound: Outbound) -> bool {
        self.tx.send(outbound).is_ok()
    }

    pub fn send_relay(&self, message: &RelayMessage) -> bool {
        match message.to_json() {
            Ok(json) => self.send(Outbound::Frame(Arc::from(json))),
            Err(e) => {
                warn!(error = %e, "Failed to encode relay message");
                false
            }
        }
    }

    pub fn close(&self) -> bool {
        self.send(Outbound::Close)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Room {room_id} is full")]
    RoomFull { room_id: String },

    #[error("Room limit of {max_rooms} reached")]
    TooManyRooms { max_rooms: usize },
}

impl RelayError {
    /// Wire error code reported to the client
    pub fn code(&self) -> RelayErrorCode {
        RelayErrorCode::RoomFull
    }
}

#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub max_rooms: usize,
    pub max_clients_per_room: usize,
    pub room_timeout: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_rooms: DEFAULT_MAX_ROOMS,
            max_clients_per_room: DEFAULT_MAX_CLIENTS_PER_ROOM,
            room_timeout: DEFAULT_ROOM_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoomStats {
    pub rooms: usize,
    pub connections: usize,
}

/// Serializable health summary of the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub rooms: usize,
    pub connections: usize,
}

struct Room {
    id: String,
    members: Vec<ConnectionHandle>,
    created_at: Instant,
    last_activity: Instant,
    timer: Option<JoinHandle<()>>,
    generation: u64,
    closed: bool,
}

impl Room {
    fn new(id: &str) -> Self {
        let now = Instant::now();
        Self {
            id: id.to_string(),
            members: Vec::new(),
            created_at: now,
            last_activity: now,
            timer: None,
            generation: 0,
            closed: false,
        }
    }

    fn broadcast_relay(&self, message: &RelayMessage) {
        for member in &self.members {
            member.send_relay(message);
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Maps room ids to at most `max_clients_per_room` connections.
///
/// Each room sits behind its own lock, so membership changes, forwarding and
/// the idle timer of one room are serialized while independent rooms proceed
/// in parallel. The room map lock is only held to look up, insert or remove
/// an entry and is never held while waiting on a room lock.
pub struct RoomManager {
    config: RoomConfig,
    rooms: Mutex<HashMap<String, Arc<Mutex<Room>>>>,
    memberships: Mutex<HashMap<Uuid, String>>,
    self_ref: Weak<RoomManager>,
}

impl RoomManager {
    pub fn new(config: RoomConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            config,
            rooms: Mutex::new(HashMap::new()),
            memberships: Mutex::new(HashMap::new()),
            self_ref: self_ref.clone(),
        })
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Add `conn` to `room_id`, creating the room if needed.
    ///
    /// Fails with `RoomFull` when the room already holds the maximum number of
    /// members, or `TooManyRooms` when a new room would exceed the room ceiling.
    /// On success every member, the joiner included, receives the new peer
    /// count, which is also returned.
    pub async fn join(&self, room_id: &str, conn: &ConnectionHandle) -> Result<usize, RelayError> {
        let current = self.memberships.lock().await.get(&conn.id).cloned();
        match current {
            Some(current) if current == room_id => {
                debug!(room_id, connection = %conn.id, "Connection already in room");
                return self.member_count(room_id).await.ok_or_else(|| RelayError::RoomFull {
                    room_id: room_id.to_string(),
                });
            }
            Some(_) => self.leave(conn.id).await,
            None => {}
        }

        loop {
            let room_arc = {
                let mut rooms = self.rooms.lock().await;
                match rooms.get(room_id) {
                    Some(room) => Arc::clone(room),
                    None => {
                        if rooms.len() >= self.config.max_rooms {
                            warn!(room_id, max_rooms = self.config.max_rooms, "Room limit reached");
                            return Err(RelayError::TooManyRooms {
                                max_rooms: self.config.max_rooms,
                            });
                        }
                        let room = Arc::new(Mutex::new(Room::new(room_id)));
                        rooms.insert(room_id.to_string(), Arc::clone(&room));
                        info!(event = "room_created", room_id);
                        room
                    }
                }
            };

            let mut room = room_arc.lock().await;
            if room.closed {
                // Deleted between lookup and lock; look it up again.
                continue;
            }
            if room.members.len() >= self.config.max_clients_per_room {
                warn!(room_id, connection = %conn.id, "Room is full");
                return Err(RelayError::RoomFull {
                    room_id: room_id.to_string(),
                });
            }

            room.members.push(conn.clone());
            self.memberships
                .lock()
                .await
                .insert(conn.id, room_id.to_string());
            self.touch(&mut room);

            let peer_count = room.members.len();
            room.broadcast_relay(&RelayMessage::PeerCount { count: peer_count });
            info!(event = "peer_joined", room_id, peer_count, connection = %conn.id);
            return Ok(peer_count);
        }
    }

    /// Remove a connection from its room, deleting the room once empty
    pub async fn leave(&self, conn_id: Uuid) {
        let Some(room_id) = self.memberships.lock().await.remove(&conn_id) else {
            return;
        };
        let Some(room_arc) = self.lookup(&room_id).await else {
            return;
        };

        let mut room = room_arc.lock().await;
        room.members.retain(|member| member.id != conn_id);

        if room.members.is_empty() {
            room.closed = true;
            room.cancel_timer();
            self.remove_room(&room_id, &room_arc).await;
            info!(
                event = "room_deleted",
                room_id = %room_id,
                lifetime_secs = room.created_at.elapsed().as_secs()
            );
        } else {
            room.broadcast_relay(&RelayMessage::PeerLeft);
            self.touch(&mut room);
            info!(
                event = "peer_left",
                room_id = %room_id,
                peer_count = room.members.len()
            );
        }
    }

    /// Forward an opaque payload to every other open member of the sender's room.
    ///
    /// Returns how many members it was delivered to. Senders outside any room
    /// are ignored.
    pub async fn broadcast(&self, sender: Uuid, payload: Arc<str>) -> usize {
        let Some(room_id) = self.memberships.lock().await.get(&sender).cloned() else {
            debug!(connection = %sender, "Dropping message from connection outside any room");
            return 0;
        };
        let Some(room_arc) = self.lookup(&room_id).await else {
            return 0;
        };

        let mut room = room_arc.lock().await;
        if room.closed {
            return 0;
        }
        self.touch(&mut room);

        let mut delivered = 0;
        for member in room.members.iter().filter(|member| member.id != sender) {
            if member.is_open() && member.send(Outbound::Frame(Arc::clone(&payload))) {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn stats(&self) -> RoomStats {
        let rooms: Vec<Arc<Mutex<Room>>> = self.rooms.lock().await.values().cloned().collect();
        let mut connections = 0;
        for room in &rooms {
            connections += room.lock().await.members.len();
        }
        RoomStats {
            rooms: rooms.len(),
            connections,
        }
    }

    pub async fn health(&self) -> HealthReport {
        let stats = self.stats().await;
        HealthReport {
            status: "ok",
            rooms: stats.rooms,
            connections: stats.connections,
        }
    }

    /// Room the connection currently belongs to
    pub async fn room_of(&self, conn_id: Uuid) -> Option<String> {
        self.memberships.lock().await.get(&conn_id).cloned()
    }

    async fn member_count(&self, room_id: &str) -> Option<usize> {
        let room = self.lookup(room_id).await?;
        let count = room.lock().await.members.len();
        Some(count)
    }

    async fn lookup(&self, room_id: &str) -> Option<Arc<Mutex<Room>>> {
        self.rooms.lock().await.get(room_id).cloned()
    }

    async fn remove_room(&self, room_id: &str, room_arc: &Arc<Mutex<Room>>) {
        let mut rooms = self.rooms.lock().await;
        if rooms
            .get(room_id)
            .is_some_and(|current| Arc::ptr_eq(current, room_arc))
        {
            rooms.remove(room_id);
        }
    }

    /// Record activity and restart the idle timer
    fn touch(&self, room: &mut Room) {
        room.last_activity = Instant::now();
        room.cancel_timer();
        room.generation += 1;

        let generation = room.generation;
        let room_id = room.id.clone();
        let timeout = self.config.room_timeout;
        let manager = self.self_ref.clone();
        room.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(manager) = manager.upgrade() {
                manager.expire(&room_id, generation).await;
            }
        }));
    }

    /// Idle timeout fired: close every member and delete the room
    async fn expire(&self, room_id: &str, generation: u64) {
        let Some(room_arc) = self.lookup(room_id).await else {
            return;
        };
        let mut room = room_arc.lock().await;
        if room.closed || room.generation != generation {
            return;
        }

        room.closed = true;
        // This task is the timer; drop its handle instead of aborting itself.
        room.timer.take();
        let members = std::mem::take(&mut room.members);
        {
            let mut memberships = self.memberships.lock().await;
            for member in &members {
                memberships.remove(&member.id);
            }
        }
        for member in &members {
            member.close();
        }
        self.remove_room(room_id, &room_arc).await;

        info!(
            event = "room_timeout",
            room_id,
            closed_connections = members.len(),
            idle_secs = room.last_activity.elapsed().as_secs()
        );
    }
}
