//! Wire shapes of the messages both clients must agree on

use broadside::game::{Coord, Phase, ShipType, Side, ShotRecord};
use broadside::messages::{
    generate_room_id, parse_incoming, GameMessage, IncomingMessage, RelayErrorCode, RelayMessage,
    ValidationError, ROOM_ID_LEN,
};
use serde_json::{json, Value};

fn as_value(message: &GameMessage) -> Value {
    serde_json::from_str(&message.to_json().unwrap()).unwrap()
}

#[test]
fn test_result_shape() {
    let message = GameMessage::new_result(Coord::new(4, 2), true, Some(ShipType::Cruiser));
    assert_eq!(
        as_value(&message),
        json!({"type": "result", "x": 4, "y": 2, "hit": true, "sunk": "cruiser"})
    );
}

#[test]
fn test_sync_response_shape() {
    let message = GameMessage::SyncResponse {
        phase: Phase::Battle,
        turn_number: 1,
        shot_history: vec![ShotRecord::new(Coord::new(1, 1), false, None, Side::A)],
    };
    assert_eq!(
        as_value(&message),
        json!({
            "type": "sync_response",
            "phase": "battle",
            "turnNumber": 1,
            "shotHistory": [{"x": 1, "y": 1, "hit": false, "sunk": null, "player": "a"}]
        })
    );
}

#[test]
fn test_relay_envelopes_are_told_apart_from_game_messages() {
    match parse_incoming(r#"{"type":"peer_count","count":2}"#).unwrap() {
        IncomingMessage::Relay(RelayMessage::PeerCount { count }) => assert_eq!(count, 2),
        other => panic!("unexpected {:?}", other),
    }
    match parse_incoming(r#"{"type":"error","code":"RATE_LIMITED","message":"slow down"}"#)
        .unwrap()
    {
        IncomingMessage::Relay(RelayMessage::Error { code, .. }) => {
            assert_eq!(code, RelayErrorCode::RateLimited)
        }
        other => panic!("unexpected {:?}", other),
    }
    match parse_incoming(r#"{"type":"shot","x":0,"y":9}"#).unwrap() {
        IncomingMessage::Game(message) => assert_eq!(message, GameMessage::Shot { x: 0, y: 9 }),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_hostile_payloads_are_rejected() {
    assert!(matches!(
        parse_incoming("[]"),
        Err(ValidationError::MissingType)
    ));
    assert!(matches!(
        parse_incoming(r#"{"type":"launch_missiles"}"#),
        Err(ValidationError::UnknownType(_))
    ));
    assert!(parse_incoming(r#"{"type":"shot","x":10,"y":0}"#).is_err());
    assert!(parse_incoming(r#"{"type":"shot","x":-1,"y":0}"#).is_err());
    assert!(parse_incoming(r#"{"type":"commit","digest":"ABC"}"#).is_err());
    assert!(parse_incoming(r#"{"type":"ping","timestamp":0}"#).is_err());
    assert!(parse_incoming("not json at all").is_err());
}

#[test]
fn test_room_id_format() {
    for _ in 0..50 {
        let id = generate_room_id();
        assert_eq!(id.len(), ROOM_ID_LEN);
        assert!(id.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
    }
}
