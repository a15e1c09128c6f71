use super::audit::{audit, AuditReport};
use crate::crypto::{self, Commitment, CommitmentError};
use crate::game::{
    Coord, GameError, MatchState, Phase, ShipPlacement, ShipType, ShotRecord, Side, Winner,
};
use crate::messages::GameMessage;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default minimum spacing between two local shots
pub const DEFAULT_MIN_SHOT_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub min_shot_interval: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            min_shot_interval: DEFAULT_MIN_SHOT_INTERVAL,
        }
    }
}

/// Reasons a local action is refused
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Action not allowed in {phase} phase")]
    WrongPhase { phase: Phase },

    #[error("Firing too fast; wait {remaining:?}")]
    Debounced { remaining: Duration },

    #[error("Still waiting for the result of the previous shot")]
    AwaitingResult,

    #[error("It is not your turn")]
    NotYourTurn,

    #[error("Cannot fire at {0}")]
    InvalidTarget(Coord),

    #[error("Fleet is not ready to commit: {0}")]
    Fleet(#[from] GameError),

    #[error("Commitment failed: {0}")]
    Commitment(#[from] CommitmentError),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Drives one side of a match.
///
/// Local actions return the message to send; incoming messages return any
/// replies. The orchestrator owns the match state plus the bookkeeping the
/// state machine does not model: the cached commitment, ready and rematch
/// flags, shot debounce, and the latest audit. It performs no I/O, so the
/// caller decides how messages travel.
#[derive(Debug)]
pub struct GameProtocol {
    state: MatchState,
    config: ProtocolConfig,
    commitment: Option<Commitment>,
    local_ready: bool,
    opponent_ready: bool,
    local_rematch: bool,
    opponent_rematch: bool,
    last_shot_at: Option<Instant>,
    reveal_sent: bool,
    audit_report: Option<AuditReport>,
    peer_present: bool,
}

impl GameProtocol {
    pub fn new(role: Side) -> Self {
        Self::with_config(role, ProtocolConfig::default())
    }

    pub fn with_config(role: Side, config: ProtocolConfig) -> Self {
        Self {
            state: MatchState::new(role),
            config,
            commitment: None,
            local_ready: false,
            opponent_ready: false,
            local_rematch: false,
            opponent_rematch: false,
            last_shot_at: None,
            reveal_sent: false,
            audit_report: None,
            peer_present: false,
        }
    }

    // ----- accessors -----

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn commitment(&self) -> Option<&Commitment> {
        self.commitment.as_ref()
    }

    pub fn audit_report(&self) -> Option<&AuditReport> {
        self.audit_report.as_ref()
    }

    pub fn is_awaiting_result(&self) -> bool {
        self.state.has_pending_shot()
    }

    pub fn is_local_ready(&self) -> bool {
        self.local_ready
    }

    pub fn is_opponent_ready(&self) -> bool {
        self.opponent_ready
    }

    pub fn both_ready(&self) -> bool {
        self.local_ready && self.opponent_ready
    }

    pub fn rematch_requested(&self) -> (bool, bool) {
        (self.local_rematch, self.opponent_rematch)
    }

    pub fn is_peer_present(&self) -> bool {
        self.peer_present
    }

    // ----- local actions -----

    /// lobby -> setup
    pub fn start_setup(&mut self) -> bool {
        self.state.start_setup()
    }

    pub fn place_ship(&mut self, ship: ShipPlacement) -> std::result::Result<(), GameError> {
        self.state.place_ship(ship)
    }

    pub fn remove_ship(&mut self, kind: ShipType) -> bool {
        self.state.remove_ship(kind)
    }

    /// Announce that the local fleet is placed. Informational only.
    pub fn ready(&mut self) -> Result<GameMessage> {
        self.require_phase(Phase::Setup)?;
        self.local_ready = true;
        Ok(GameMessage::Ready)
    }

    /// Commit the placed fleet and produce the commit message.
    ///
    /// When the opponent's digest is already known the battle starts
    /// immediately.
    pub fn commit_fleet(&mut self) -> Result<GameMessage> {
        self.require_phase(Phase::Setup)?;
        crate::game::validate_fleet(self.state.own_fleet())?;

        let commitment = crypto::commit(self.state.own_fleet())?;
        let digest = commitment.digest.clone();
        if !self.state.commit(digest.clone(), commitment.salt.clone()) {
            return Err(ProtocolError::WrongPhase {
                phase: self.state.phase(),
            });
        }
        self.commitment = Some(commitment);
        info!(digest = %digest, "Fleet committed");

        self.try_start_battle();
        Ok(GameMessage::Commit { digest })
    }

    /// Fire at `coord`.
    ///
    /// Refused while a previous shot is unresolved, within the minimum shot
    /// interval of the previous shot, out of turn, or at a cell already fired
    /// upon.
    pub fn fire(&mut self, coord: Coord, now: Instant) -> Result<GameMessage> {
        self.require_phase(Phase::Battle)?;

        if let Some(last) = self.last_shot_at {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.config.min_shot_interval {
                return Err(ProtocolError::Debounced {
                    remaining: self.config.min_shot_interval - elapsed,
                });
            }
        }
        if self.state.has_pending_shot() {
            return Err(ProtocolError::AwaitingResult);
        }
        if !self.state.is_my_turn() {
            return Err(ProtocolError::NotYourTurn);
        }
        if !self.state.fire_shot(coord) {
            return Err(ProtocolError::InvalidTarget(coord));
        }

        self.last_shot_at = Some(now);
        debug!(x = coord.x, y = coord.y, "Shot fired");
        Ok(GameMessage::new_shot(coord))
    }

    /// Ask for a rematch; the match resets once both sides have asked
    pub fn request_rematch(&mut self) -> Result<GameMessage> {
        self.require_phase(Phase::GameOver)?;
        self.local_rematch = true;
        if self.opponent_rematch {
            self.new_match();
        }
        Ok(GameMessage::Rematch)
    }

    pub fn sync_request(&self) -> GameMessage {
        GameMessage::SyncRequest
    }

    /// Track peer presence reported by the relay.
    ///
    /// The peer arriving moves a lobby match into setup. The peer coming back
    /// at any later point means messages may have been lost, so a sync request
    /// is returned.
    pub fn on_peer_presence(&mut self, present: bool) -> Vec<GameMessage> {
        let arrived = present && !self.peer_present;
        self.peer_present = present;
        if !arrived {
            return Vec::new();
        }

        if self.state.phase() == Phase::Lobby {
            self.state.start_setup();
            Vec::new()
        } else {
            info!(phase = %self.state.phase(), "Peer returned, requesting sync");
            vec![self.sync_request()]
        }
    }

    // ----- incoming messages -----

    /// Apply one validated incoming message and return the replies to send.
    ///
    /// Messages that are not legal in the current phase are dropped with a
    /// warning; they can arise harmlessly from reordering around a reconnect.
    pub fn handle_incoming(&mut self, message: GameMessage) -> Vec<GameMessage> {
        let phase = self.state.phase();
        if !message.is_legal_in(phase) {
            warn!(
                message_type = message.message_type(),
                phase = %phase,
                "Ignoring message not valid in current phase"
            );
            return Vec::new();
        }

        let mut outgoing = Vec::new();
        match message {
            GameMessage::Ready => self.handle_ready(),
            GameMessage::Commit { digest } => self.handle_commit(digest),
            GameMessage::Shot { x, y } => self.handle_shot(Coord::new(x, y), &mut outgoing),
            GameMessage::ShotResult { x, y, hit, sunk } => {
                self.handle_result(Coord::new(x, y), hit, sunk, &mut outgoing)
            }
            GameMessage::Reveal { fleet, salt } => self.handle_reveal(fleet, salt),
            GameMessage::Rematch => self.handle_rematch(),
            GameMessage::Ping { timestamp } => outgoing.push(GameMessage::new_pong(timestamp)),
            // Latency is measured by the connection driver.
            GameMessage::Pong { .. } => {}
            GameMessage::SyncRequest => outgoing.push(self.sync_response()),
            GameMessage::SyncResponse {
                phase,
                turn_number,
                shot_history,
            } => self.handle_sync_response(phase, turn_number, shot_history, &mut outgoing),
        }
        outgoing
    }

    fn handle_ready(&mut self) {
        self.opponent_ready = true;
        if self.both_ready() {
            debug!("Both players ready");
        }
    }

    fn handle_commit(&mut self, digest: String) {
        if !self.state.receive_opponent_commit(digest) {
            warn!("Ignoring repeated opponent commitment");
            return;
        }
        debug!("Opponent commitment received");
        self.try_start_battle();
    }

    fn handle_shot(&mut self, coord: Coord, outgoing: &mut Vec<GameMessage>) {
        let Some(outcome) = self.state.receive_shot(coord) else {
            warn!(x = coord.x, y = coord.y, "Ignoring shot at an already fired cell");
            return;
        };
        outgoing.push(GameMessage::new_result(coord, outcome.hit, outcome.sunk));
        if let Some(ship) = outcome.sunk {
            info!(ship = %ship, "Own ship sunk");
        }
        self.check_fleet_destroyed(outgoing);
    }

    fn handle_result(
        &mut self,
        coord: Coord,
        hit: bool,
        sunk: Option<ShipType>,
        outgoing: &mut Vec<GameMessage>,
    ) {
        if !self.state.receive_result(coord, hit, sunk) {
            warn!(x = coord.x, y = coord.y, "Ignoring result for a shot not in flight");
            return;
        }
        if let Some(ship) = sunk {
            info!(ship = %ship, "Opponent ship sunk");
        }
        self.check_fleet_destroyed(outgoing);
    }

    fn handle_reveal(&mut self, fleet: Vec<ShipPlacement>, salt: String) {
        if !self.state.receive_reveal(fleet, salt) {
            return;
        }

        let report = audit(
            self.state.opponent_fleet(),
            self.state.opponent_salt().unwrap_or_default(),
            self.state.opponent_digest(),
            self.state.shot_history(),
            self.state.role(),
        );
        if report.cheat_detected() {
            self.state.flag_cheat();
        }
        self.audit_report = Some(report);
        self.finish();
    }

    fn handle_rematch(&mut self) {
        self.opponent_rematch = true;
        if self.local_rematch {
            self.new_match();
        }
    }

    fn sync_response(&self) -> GameMessage {
        GameMessage::SyncResponse {
            phase: self.state.phase(),
            turn_number: self.state.turn_number(),
            shot_history: self.state.shot_history().to_vec(),
        }
    }

    /// Reconcile with the peer's view after a reconnect.
    ///
    /// Results for our unresolved shots are taken from the peer's history,
    /// shots beyond our history length are replayed, and the phase advances
    /// forward only. A commit or reveal the peer may have missed is sent again.
    fn handle_sync_response(
        &mut self,
        remote_phase: Phase,
        remote_turn: usize,
        remote_history: Vec<ShotRecord>,
        outgoing: &mut Vec<GameMessage>,
    ) {
        let role = self.state.role();
        let local_turn = self.state.turn_number();

        if let Some(commitment) = &self.commitment {
            if matches!(remote_phase, Phase::Setup | Phase::Commit) {
                outgoing.push(GameMessage::Commit {
                    digest: commitment.digest.clone(),
                });
            }
            // The peer has not finished, so our earlier reveal may have been lost.
            if self.reveal_sent && remote_phase < Phase::GameOver {
                let fleet = crypto::canonical_order(self.state.own_fleet());
                outgoing.push(GameMessage::new_reveal(fleet, commitment.salt_hex()));
                debug!(remote = %remote_phase, "Resending reveal");
            }
        }

        for record in remote_history.iter().take(local_turn) {
            if record.attacker == role {
                self.state.receive_result(record.coord, record.hit, record.sunk);
            }
        }

        let mut replayed = 0;
        for record in remote_history
            .iter()
            .take(remote_turn)
            .skip(local_turn)
        {
            if let Some(outcome) = self.state.replay_shot(record) {
                outgoing.push(GameMessage::new_result(record.coord, outcome.hit, outcome.sunk));
            }
            replayed += 1;
        }
        if replayed > 0 {
            info!(replayed, local_turn, remote_turn, "Replayed missed shots");
        }

        self.check_fleet_destroyed(outgoing);

        let local_phase = self.state.phase();
        if remote_phase > local_phase {
            match remote_phase {
                Phase::Reveal if local_phase == Phase::Battle => self.begin_reveal(outgoing),
                Phase::GameOver => {
                    if local_phase == Phase::Battle {
                        self.begin_reveal(outgoing);
                    }
                    self.finish();
                }
                _ => debug!(
                    local = %local_phase,
                    remote = %remote_phase,
                    "Peer is ahead; waiting for its messages"
                ),
            }
        }
    }

    // ----- transitions -----

    fn try_start_battle(&mut self) {
        if self.state.start_battle() {
            info!(my_turn = self.state.is_my_turn(), "Battle started");
        }
    }

    fn check_fleet_destroyed(&mut self, outgoing: &mut Vec<GameMessage>) {
        if self.state.phase() != Phase::Battle {
            return;
        }
        if self.state.own_fleet_destroyed() || self.state.opponent_fleet_destroyed() {
            self.begin_reveal(outgoing);
        }
    }

    /// battle -> reveal, sending our fleet and salt exactly once
    fn begin_reveal(&mut self, outgoing: &mut Vec<GameMessage>) {
        self.state.start_reveal();
        if self.reveal_sent || self.state.phase() != Phase::Reveal {
            return;
        }
        let Some(commitment) = &self.commitment else {
            warn!("No commitment cached; cannot reveal");
            return;
        };
        let fleet = crypto::canonical_order(self.state.own_fleet());
        outgoing.push(GameMessage::new_reveal(fleet, commitment.salt_hex()));
        self.reveal_sent = true;
        info!("Fleet revealed");
    }

    fn finish(&mut self) {
        let winner = if self.state.own_fleet_destroyed() {
            Winner::Opponent
        } else {
            Winner::Me
        };
        if self.state.finish_game(winner) {
            info!(
                winner = ?winner,
                cheat_detected = self.state.cheat_detected(),
                "Game over"
            );
        }
    }

    /// Start the next match: resets the match state and every per-match flag together
    fn new_match(&mut self) {
        if !self.state.reset_for_rematch() {
            return;
        }
        self.commitment = None;
        self.local_ready = false;
        self.opponent_ready = false;
        self.local_rematch = false;
        self.opponent_rematch = false;
        self.last_shot_at = None;
        self.reveal_sent = false;
        self.audit_report = None;
        info!("Rematch started");
    }

    fn require_phase(&self, expected: Phase) -> Result<()> {
        let phase = self.state.phase();
        if phase != expected {
            return Err(ProtocolError::WrongPhase { phase });
        }
        Ok(())
    }
}
