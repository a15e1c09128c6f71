use crate::crypto;
use crate::game::{occupied_cells, validate_fleet, Coord, ShipPlacement, ShipType, ShotRecord, Side};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// A single contradiction between the opponent's reveal and the match record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditFinding {
    /// No opponent commitment was ever received
    MissingCommitment,
    /// The revealed fleet and salt do not hash to the committed digest
    HashMismatch,
    /// The revealed layout is not a legal fleet
    InvalidFleet(String),
    /// A reported hit or miss disagrees with the revealed layout
    DishonestResult { coord: Coord, reported_hit: bool },
    /// A reported sinking that the local shots cannot account for
    UnverifiedSunk { ship: ShipType, coord: Coord },
    /// Every cell of a ship was hit but no result ever reported it sunk
    UnreportedSunk { ship: ShipType },
}

impl fmt::Display for AuditFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditFinding::MissingCommitment => write!(f, "no board commitment was received"),
            AuditFinding::HashMismatch => write!(f, "board commitment hash mismatch"),
            AuditFinding::InvalidFleet(reason) => write!(f, "revealed fleet is invalid: {}", reason),
            AuditFinding::DishonestResult {
                coord,
                reported_hit,
            } => write!(
                f,
                "shot at {} was reported as a {} but the revealed board disagrees",
                coord,
                if *reported_hit { "hit" } else { "miss" }
            ),
            AuditFinding::UnverifiedSunk { ship, coord } => write!(
                f,
                "{} reported sunk at {} but not every cell was hit",
                ship, coord
            ),
            AuditFinding::UnreportedSunk { ship } => {
                write!(f, "{} had every cell hit but was never reported sunk", ship)
            }
        }
    }
}

/// Outcome of auditing one opponent reveal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn cheat_detected(&self) -> bool {
        !self.findings.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Audit an opponent's reveal against its commitment and our shot history.
///
/// Four checks run, and every contradiction found is recorded:
///
/// 1. The revealed fleet and salt must hash to `expected_digest`.
/// 2. Each settled shot fired by `local_side` must agree with the revealed
///    layout: a reported hit on an occupied cell, a reported miss on an empty one.
/// 3. Each ship reported sunk by one of our shots must have every cell hit by
///    our reported hits.
/// 4. Each revealed ship whose cells were all hit by our shots must have been
///    reported sunk by one of them.
///
/// Findings never interrupt the match; the caller decides how to surface them.
pub fn audit(
    revealed: &[ShipPlacement],
    salt_hex: &str,
    expected_digest: Option<&str>,
    history: &[ShotRecord],
    local_side: Side,
) -> AuditReport {
    let mut report = AuditReport::default();

    match expected_digest {
        Some(digest) if crypto::verify(revealed, salt_hex, digest) => {}
        Some(_) => report.findings.push(AuditFinding::HashMismatch),
        None => report.findings.push(AuditFinding::MissingCommitment),
    }

    if let Err(e) = validate_fleet(revealed) {
        report.findings.push(AuditFinding::InvalidFleet(e.to_string()));
    }

    let occupied = occupied_cells(revealed);
    let own_shots: Vec<&ShotRecord> = history
        .iter()
        .filter(|shot| shot.attacker == local_side && !shot.pending)
        .collect();

    for shot in &own_shots {
        if shot.hit != occupied.contains(&shot.coord) {
            report.findings.push(AuditFinding::DishonestResult {
                coord: shot.coord,
                reported_hit: shot.hit,
            });
        }
    }

    let hits: HashSet<Coord> = own_shots
        .iter()
        .filter(|shot| shot.hit)
        .map(|shot| shot.coord)
        .collect();
    for shot in &own_shots {
        let Some(kind) = shot.sunk else { continue };
        let verified = revealed
            .iter()
            .find(|ship| ship.kind == kind)
            .is_some_and(|ship| ship.cells().iter().all(|cell| hits.contains(cell)));
        if !verified {
            report.findings.push(AuditFinding::UnverifiedSunk {
                ship: kind,
                coord: shot.coord,
            });
        }
    }

    let reported_sunk: HashSet<ShipType> =
        own_shots.iter().filter_map(|shot| shot.sunk).collect();
    for ship in revealed {
        let all_hit = ship.cells().iter().all(|cell| hits.contains(cell));
        if all_hit && !reported_sunk.contains(&ship.kind) {
            report
                .findings
                .push(AuditFinding::UnreportedSunk { ship: ship.kind });
        }
    }

    for finding in &report.findings {
        warn!(finding = %finding, "Cheat detected");
    }
    report
}
