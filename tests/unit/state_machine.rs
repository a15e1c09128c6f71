use crate::common::fixtures::standard_fleet;
use broadside::crypto::Salt;
use broadside::game::{Coord, MatchState, Phase, Side, Winner};
use broadside::messages::GameMessage;
use broadside::protocol::GameProtocol;

fn host_in_setup() -> MatchState {
    let mut host = MatchState::new(Side::A);
    assert!(host.start_setup());
    for ship in standard_fleet() {
        host.place_ship(ship).unwrap();
    }
    host
}

#[test]
fn test_battle_waits_for_both_digests() {
    let mut host = host_in_setup();
    assert!(host.commit("H1".to_string(), Salt::generate()));
    assert_eq!(host.phase(), Phase::Commit);

    // Only H1 is known.
    assert!(!host.start_battle());
    assert_eq!(host.phase(), Phase::Commit);

    assert!(host.receive_opponent_commit("H2".to_string()));
    assert!(host.start_battle());
    assert_eq!(host.phase(), Phase::Battle);
    assert!(host.is_my_turn());
    assert_eq!(host.own_digest(), Some("H1"));
    assert_eq!(host.opponent_digest(), Some("H2"));
}

#[test]
fn test_orchestrated_host_starts_battle_on_opponent_commit() {
    let mut host = GameProtocol::new(Side::A);
    host.on_peer_presence(true);
    for ship in standard_fleet() {
        host.place_ship(ship).unwrap();
    }
    host.commit_fleet().unwrap();
    assert_eq!(host.phase(), Phase::Commit);

    let replies = host.handle_incoming(GameMessage::Commit {
        digest: "b".repeat(64),
    });
    assert!(replies.is_empty());
    assert_eq!(host.phase(), Phase::Battle);
    assert!(host.state().is_my_turn());
}

#[test]
fn test_guest_waits_for_first_shot() {
    let mut guest = MatchState::new(Side::B);
    guest.start_setup();
    for ship in standard_fleet() {
        guest.place_ship(ship).unwrap();
    }
    assert!(guest.receive_opponent_commit("H1".to_string()));
    assert!(guest.commit("H2".to_string(), Salt::generate()));
    assert!(guest.start_battle());
    assert!(!guest.is_my_turn());
    assert!(!guest.can_fire());
    assert!(!guest.fire_shot(Coord::new(0, 0)));
}

#[test]
fn test_transitions_are_no_ops_outside_their_phase() {
    let mut state = MatchState::new(Side::A);
    assert!(!state.start_battle());
    assert!(!state.start_reveal());
    assert!(!state.finish_game(Winner::Me));
    assert!(!state.reset_for_rematch());
    assert_eq!(state.phase(), Phase::Lobby);

    let mut host = host_in_setup();
    assert!(!host.start_setup());
    assert!(!host.start_battle());
    assert_eq!(host.phase(), Phase::Setup);
    assert!(host.receive_shot(Coord::new(0, 0)).is_none());
    assert!(!host.receive_result(Coord::new(0, 0), true, None));
}

#[test]
fn test_cheat_flag_survives_until_rematch() {
    let mut host = host_in_setup();
    host.commit("H1".into(), Salt::generate());
    host.receive_opponent_commit("H2".into());
    host.start_battle();

    host.flag_cheat();
    assert!(host.start_reveal());
    assert!(host.cheat_detected());
    assert!(host.finish_game(Winner::Me));
    assert!(host.cheat_detected());

    assert!(host.reset_for_rematch());
    assert!(!host.cheat_detected());
    assert_eq!(host.phase(), Phase::Setup);
}

#[test]
fn test_shot_validity() {
    let mut host = host_in_setup();
    host.commit("H1".into(), Salt::generate());
    host.receive_opponent_commit("H2".into());
    host.start_battle();

    assert!(host.is_valid_shot(Coord::new(9, 9)));
    assert!(!host.is_valid_shot(Coord::new(10, 0)));
    assert!(host.fire_shot(Coord::new(9, 9)));
    assert!(!host.is_valid_shot(Coord::new(9, 9)));
    assert!(host.has_pending_shot());
}
