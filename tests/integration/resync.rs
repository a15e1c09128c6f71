use crate::common::fixtures::{
    open_water, over_the_wire, scattered_fleet, ship_cells, standard_fleet, MatchHarness,
};
use broadside::game::{CellState, Coord, Phase, Winner};
use broadside::messages::GameMessage;

/// Both sides lose and regain the peer; each returns its sync request
fn reconnect_both(harness: &mut MatchHarness) -> (Vec<GameMessage>, Vec<GameMessage>) {
    assert!(harness.host.on_peer_presence(false).is_empty());
    assert!(harness.guest.on_peer_presence(false).is_empty());
    let from_host = harness.host.on_peer_presence(true);
    let from_guest = harness.guest.on_peer_presence(true);
    assert_eq!(from_host, vec![GameMessage::SyncRequest]);
    assert_eq!(from_guest, vec![GameMessage::SyncRequest]);
    (from_host, from_guest)
}

#[test]
fn test_lost_shot_is_replayed_and_answered() {
    let mut harness = MatchHarness::in_battle(&standard_fleet(), &scattered_fleet());

    // The shot at the guest's carrier never reaches the guest.
    let now = harness.tick();
    let _lost = harness.host.fire(Coord::new(2, 5), now).unwrap();
    assert!(harness.host.is_awaiting_result());
    assert_eq!(harness.guest.state().turn_number(), 0);

    let (from_host, from_guest) = reconnect_both(&mut harness);
    harness.exchange(from_host, from_guest);

    assert!(!harness.host.is_awaiting_result());
    assert_eq!(
        harness.host.state().opponent_board().get(Coord::new(2, 5)),
        Some(CellState::Hit)
    );
    assert_eq!(
        harness.guest.state().own_board().get(Coord::new(2, 5)),
        Some(CellState::Hit)
    );
    assert_eq!(harness.host.state().shot_history(), harness.guest.state().shot_history());

    // Play continues with the guest to move.
    assert!(harness.guest.state().is_my_turn());
    harness.guest_fires(open_water()[0]);
    assert!(harness.host.state().is_my_turn());
}

#[test]
fn test_lost_result_is_recovered() {
    let mut harness = MatchHarness::in_battle(&standard_fleet(), &scattered_fleet());

    let now = harness.tick();
    let shot = harness.host.fire(Coord::new(5, 0), now).unwrap();
    let replies = harness.guest.handle_incoming(over_the_wire(&shot));
    assert_eq!(replies.len(), 1);
    // The result is dropped on the way back.
    assert!(harness.host.is_awaiting_result());

    let (from_host, from_guest) = reconnect_both(&mut harness);
    harness.exchange(from_host, from_guest);

    assert!(!harness.host.is_awaiting_result());
    let last = harness.host.state().shot_history()[0];
    assert!(last.hit);
    assert!(!last.pending);
    // Nothing was applied twice to the guest's board.
    assert_eq!(harness.guest.state().turn_number(), 1);
}

#[test]
fn test_sync_with_identical_state_changes_nothing() {
    let mut harness = MatchHarness::in_battle(&standard_fleet(), &scattered_fleet());
    harness.host_fires(Coord::new(0, 9));
    harness.guest_fires(Coord::new(0, 9));

    let before_host = harness.host.state().shot_history().to_vec();
    let (from_host, from_guest) = reconnect_both(&mut harness);
    harness.exchange(from_host, from_guest);

    assert_eq!(harness.host.state().shot_history(), before_host.as_slice());
    assert_eq!(harness.guest.state().shot_history(), before_host.as_slice());
    assert_eq!(harness.host.phase(), Phase::Battle);
    assert!(harness.host.state().is_my_turn());
}

#[test]
fn test_phase_never_regresses_from_stale_peer() {
    let mut harness = MatchHarness::in_battle(&standard_fleet(), &scattered_fleet());

    let stale = GameMessage::SyncResponse {
        phase: Phase::Setup,
        turn_number: 0,
        shot_history: Vec::new(),
    };
    let replies = harness.host.handle_incoming(stale);
    assert_eq!(harness.host.phase(), Phase::Battle);
    // A peer stuck before commit gets our digest again.
    assert!(matches!(replies.as_slice(), [GameMessage::Commit { .. }]));
}

#[test]
fn test_lost_commit_is_resent_on_sync() {
    let mut harness = MatchHarness::placed(&standard_fleet(), &scattered_fleet());
    let _lost = harness.host.commit_fleet().unwrap();
    let guest_commit = harness.guest.commit_fleet().unwrap();
    harness.exchange(Vec::new(), vec![guest_commit]);

    assert_eq!(harness.host.phase(), Phase::Battle);
    assert_eq!(harness.guest.phase(), Phase::Commit);

    let (from_host, from_guest) = reconnect_both(&mut harness);
    harness.exchange(from_host, from_guest);

    assert_eq!(harness.guest.phase(), Phase::Battle);
    assert_eq!(
        harness.guest.state().opponent_digest(),
        harness.host.state().own_digest()
    );
}

#[test]
fn test_peer_ahead_in_game_over_finishes_local_match() {
    let mut harness = MatchHarness::in_battle(&standard_fleet(), &scattered_fleet());
    harness.host_fires(Coord::new(0, 9));

    let ahead = GameMessage::SyncResponse {
        phase: Phase::GameOver,
        turn_number: 1,
        shot_history: harness.host.state().shot_history().to_vec(),
    };
    let replies = harness.guest.handle_incoming(ahead);

    assert_eq!(harness.guest.phase(), Phase::GameOver);
    assert!(matches!(replies.as_slice(), [GameMessage::Reveal { .. }]));
}

#[test]
fn test_lost_reveal_is_resent_on_sync() {
    let mut harness = MatchHarness::in_battle(&standard_fleet(), &scattered_fleet());
    let targets = ship_cells(&scattered_fleet());
    let misses = open_water();

    for (target, miss) in targets.iter().zip(misses.iter()).take(16) {
        harness.host_fires(*target);
        harness.guest_fires(*miss);
    }

    // The last ship goes down, and both the result and the guest's reveal are lost.
    let now = harness.tick();
    let shot = harness.host.fire(targets[16], now).unwrap();
    let replies = harness.guest.handle_incoming(over_the_wire(&shot));
    assert_eq!(replies.len(), 2);
    assert!(matches!(replies[1], GameMessage::Reveal { .. }));
    assert_eq!(harness.guest.phase(), Phase::Reveal);
    assert_eq!(harness.host.phase(), Phase::Battle);

    let (from_host, from_guest) = reconnect_both(&mut harness);
    harness.exchange(from_host, from_guest);

    assert_eq!(harness.host.phase(), Phase::GameOver);
    assert_eq!(harness.guest.phase(), Phase::GameOver);
    assert_eq!(harness.host.state().winner(), Some(Winner::Me));
    assert_eq!(harness.guest.state().winner(), Some(Winner::Opponent));
    assert!(harness.host.audit_report().unwrap().is_clean());
    assert_eq!(harness.host.state().opponent_fleet().len(), 5);
}
