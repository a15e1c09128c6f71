use broadside::network::{CloseAction, ConnectionState, ConnectionStatus, ReconnectPolicy};
use std::time::Duration;

#[test]
fn test_full_backoff_schedule() {
    let mut state = ConnectionState::new(ReconnectPolicy::default());
    state.on_connecting();
    assert_eq!(state.status(), ConnectionStatus::Connecting);
    state.on_open();

    let expected_ms = [1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000, 30000, 30000];
    for (retry, expected) in expected_ms.iter().enumerate() {
        assert_eq!(
            state.on_close(),
            CloseAction::Reconnect(Duration::from_millis(*expected)),
            "retry {}",
            retry + 1
        );
        state.on_connecting();
        assert_eq!(state.status(), ConnectionStatus::Reconnecting);
    }
    assert_eq!(state.on_close(), CloseAction::GiveUp);
    assert_eq!(state.status(), ConnectionStatus::Disconnected);
    assert_eq!(state.on_close(), CloseAction::GiveUp);
}

#[test]
fn test_successful_reconnect_restarts_schedule() {
    let mut state = ConnectionState::new(ReconnectPolicy::default());
    state.on_open();
    state.on_close();
    state.on_close();
    state.on_close();
    state.on_open();

    assert_eq!(
        state.on_close(),
        CloseAction::Reconnect(Duration::from_millis(1000))
    );
}

#[test]
fn test_manual_reconnect_when_connected_is_refused() {
    let mut state = ConnectionState::new(ReconnectPolicy::default());
    state.on_open();
    assert!(!state.manual_reconnect());
    assert!(state.is_connected());
}

#[test]
fn test_disconnect_then_manual_reconnect() {
    let mut state = ConnectionState::new(ReconnectPolicy::default());
    state.on_open();
    state.disconnect();
    assert_eq!(state.on_close(), CloseAction::Stop);

    assert!(state.manual_reconnect());
    state.on_open();
    // The intentional flag does not outlive the manual reconnect.
    assert!(matches!(state.on_close(), CloseAction::Reconnect(_)));
}

#[test]
fn test_custom_policy() {
    let policy = ReconnectPolicy {
        base_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(2),
        max_retries: 4,
    };
    let delays: Vec<Duration> = (0..5).map(|retry| policy.delay_for(retry)).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(250),
            Duration::from_millis(500),
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            Duration::from_millis(2000),
        ]
    );
}
