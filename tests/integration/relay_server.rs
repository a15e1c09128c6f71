use crate::common::relay_utils::{start_relay, RawPeer, TestRelay, STEP_TIMEOUT};
use broadside::messages::{FramedMessage, RelayErrorCode, RelayMessage};
use broadside::network::{RoomConfig, RoomStats, ServerConfig};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

async fn wait_for_stats(relay: &TestRelay, expected: RoomStats) {
    for _ in 0..100 {
        if relay.rooms.stats().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("relay never reached {:?}", expected);
}

#[tokio::test]
async fn test_pairing_and_forwarding() {
    let relay = start_relay(ServerConfig::default()).await;

    let (mut host, count) = RawPeer::join(relay.addr, "abc12345").await;
    assert_eq!(count, 1);
    let (mut guest, count) = RawPeer::join(relay.addr, "abc12345").await;
    assert_eq!(count, 2);
    assert_eq!(host.recv_relay().await, RelayMessage::PeerCount { count: 2 });

    let shot = r#"{"type":"shot","x":3,"y":4}"#;
    host.send_text(shot).await;
    assert_eq!(guest.recv_text().await, shot);

    // Game content is forwarded verbatim, even if the relay has no idea what it is.
    let opaque = r#"{"type":"anything","payload":[1,2,3]}"#;
    guest.send_text(opaque).await;
    assert_eq!(host.recv_text().await, opaque);

    assert_eq!(
        relay.rooms.stats().await,
        RoomStats {
            rooms: 1,
            connections: 2
        }
    );
    relay.handle.abort();
}

#[tokio::test]
async fn test_third_peer_gets_room_full_and_is_closed() {
    let relay = start_relay(ServerConfig::default()).await;
    let (_host, _) = RawPeer::join(relay.addr, "fullroom").await;
    let (_guest, _) = RawPeer::join(relay.addr, "fullroom").await;

    let mut third = RawPeer::connect(relay.addr).await;
    third.send_json(&RelayMessage::join("fullroom")).await;
    match third.recv_relay().await {
        RelayMessage::Error { code, .. } => assert_eq!(code, RelayErrorCode::RoomFull),
        other => panic!("expected error, got {:?}", other),
    }
    assert!(third.is_closed().await);

    assert_eq!(
        relay.rooms.stats().await,
        RoomStats {
            rooms: 1,
            connections: 2
        }
    );
    relay.handle.abort();
}

#[tokio::test]
async fn test_invalid_json_reports_error_without_closing() {
    let relay = start_relay(ServerConfig::default()).await;
    let (mut host, _) = RawPeer::join(relay.addr, "badjson1").await;

    host.send_text("{not json").await;
    match host.recv_relay().await {
        RelayMessage::Error { code, .. } => assert_eq!(code, RelayErrorCode::InvalidMessage),
        other => panic!("expected error, got {:?}", other),
    }

    // Still in the room: the next joiner is announced.
    let (_guest, count) = RawPeer::join(relay.addr, "badjson1").await;
    assert_eq!(count, 2);
    assert_eq!(host.recv_relay().await, RelayMessage::PeerCount { count: 2 });
    relay.handle.abort();
}

#[tokio::test]
async fn test_oversized_frame_closes_connection() {
    let relay = start_relay(ServerConfig::default()).await;
    let mut stream = TcpStream::connect(relay.addr).await.unwrap();

    // Announce a frame over the limit; the relay refuses before reading a body.
    stream.write_all(&8192u32.to_be_bytes()).await.unwrap();

    let framed = FramedMessage::default();
    let reply = timeout(STEP_TIMEOUT, framed.read_text(&mut stream))
        .await
        .unwrap()
        .unwrap();
    match serde_json::from_str::<RelayMessage>(&reply).unwrap() {
        RelayMessage::Error { code, .. } => assert_eq!(code, RelayErrorCode::InvalidMessage),
        other => panic!("expected error, got {:?}", other),
    }

    let next = timeout(STEP_TIMEOUT, framed.read_text(&mut stream)).await.unwrap();
    assert!(next.unwrap_err().is_closed());
    relay.handle.abort();
}

#[tokio::test]
async fn test_rate_limit_replies_without_closing() {
    let config = ServerConfig {
        rate_limit_max: 3,
        ..ServerConfig::default()
    };
    let relay = start_relay(config).await;
    let (mut host, _) = RawPeer::join(relay.addr, "chatty01").await;

    host.send_text(r#"{"type":"ping","timestamp":1}"#).await;
    host.send_text(r#"{"type":"ping","timestamp":2}"#).await;
    host.send_text(r#"{"type":"ping","timestamp":3}"#).await;
    match host.recv_relay().await {
        RelayMessage::Error { code, .. } => assert_eq!(code, RelayErrorCode::RateLimited),
        other => panic!("expected error, got {:?}", other),
    }

    // Relay-originated frames still reach the limited connection.
    let (_guest, _) = RawPeer::join(relay.addr, "chatty01").await;
    assert_eq!(host.recv_relay().await, RelayMessage::PeerCount { count: 2 });
    relay.handle.abort();
}

#[tokio::test]
async fn test_peer_left_then_room_deleted() {
    let relay = start_relay(ServerConfig::default()).await;
    let (mut host, _) = RawPeer::join(relay.addr, "leaving1").await;
    let (guest, _) = RawPeer::join(relay.addr, "leaving1").await;
    assert_eq!(host.recv_relay().await, RelayMessage::PeerCount { count: 2 });

    drop(guest);
    assert_eq!(host.recv_relay().await, RelayMessage::PeerLeft);
    wait_for_stats(
        &relay,
        RoomStats {
            rooms: 1,
            connections: 1,
        },
    )
    .await;

    drop(host);
    wait_for_stats(
        &relay,
        RoomStats {
            rooms: 0,
            connections: 0,
        },
    )
    .await;
    relay.handle.abort();
}

#[tokio::test]
async fn test_room_ceiling_rejects_new_rooms() {
    let config = ServerConfig {
        rooms: RoomConfig {
            max_rooms: 1,
            ..RoomConfig::default()
        },
        ..ServerConfig::default()
    };
    let relay = start_relay(config).await;
    let (_first, _) = RawPeer::join(relay.addr, "room0001").await;

    let mut second = RawPeer::connect(relay.addr).await;
    second.send_json(&RelayMessage::join("room0002")).await;
    match second.recv_relay().await {
        RelayMessage::Error { code, .. } => assert_eq!(code, RelayErrorCode::RoomFull),
        other => panic!("expected error, got {:?}", other),
    }
    assert!(second.is_closed().await);

    // The existing room still accepts its second player.
    let (_guest, count) = RawPeer::join(relay.addr, "room0001").await;
    assert_eq!(count, 2);
    relay.handle.abort();
}
