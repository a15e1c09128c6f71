use crate::crypto::{self, Salt};
use crate::game::{validate_fleet, ShipPlacement};
use crate::messages::is_hex_digest;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Outcome of an offline reveal check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub digest_matches: bool,
    /// Layout problem, if the fleet breaks placement rules
    pub fleet_error: Option<String>,
}

impl VerifyReport {
    pub fn is_honest(&self) -> bool {
        self.digest_matches && self.fleet_error.is_none()
    }
}

/// Verify a revealed fleet stored as JSON at `path`
pub fn verify_fleet_file(path: &Path, salt_hex: &str, digest: &str) -> Result<VerifyReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fleet file: {}", path.display()))?;
    let fleet: Vec<ShipPlacement> =
        serde_json::from_str(&content).context("Fleet file is not a list of ship placements")?;
    verify_fleet(&fleet, salt_hex, digest)
}

pub fn verify_fleet(fleet: &[ShipPlacement], salt_hex: &str, digest: &str) -> Result<VerifyReport> {
    Salt::from_hex(salt_hex).context("Invalid salt")?;
    if !is_hex_digest(digest) {
        bail!("Digest must be 64 lowercase hex characters");
    }

    Ok(VerifyReport {
        digest_matches: crypto::verify(fleet, salt_hex, digest),
        fleet_error: validate_fleet(fleet).err().map(|e| e.to_string()),
    })
}
