use crate::game::ShipPlacement;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Length of the random commitment salt in bytes
pub const SALT_LEN: usize = 32;

/// Length of a hex-encoded SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum CommitmentError {
    #[error("Failed to serialize fleet: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid salt: {0}")]
    InvalidSalt(String),
}

/// Random salt binding a commitment; withheld until reveal
#[derive(Clone, PartialEq, Eq)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    /// Draw a fresh salt from the operating system CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex salt
    pub fn from_hex(salt_hex: &str) -> Result<Self, CommitmentError> {
        let decoded =
            hex::decode(salt_hex).map_err(|e| CommitmentError::InvalidSalt(e.to_string()))?;
        let bytes: [u8; SALT_LEN] = decoded.try_into().map_err(|v: Vec<u8>| {
            CommitmentError::InvalidSalt(format!(
                "expected {} bytes, got {}",
                SALT_LEN,
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }

    /// Lowercase hex encoding, as sent in the reveal message
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// Keep the salt out of logs until it is revealed on purpose.
impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

/// A board commitment: the published digest and the withheld salt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    pub digest: String,
    pub salt: Salt,
}

impl Commitment {
    pub fn salt_hex(&self) -> String {
        self.salt.to_hex()
    }
}

/// Placements sorted by ship-type name; the order a reveal must use
pub fn canonical_order(fleet: &[ShipPlacement]) -> Vec<ShipPlacement> {
    let mut sorted = fleet.to_vec();
    sorted.sort_by(|a, b| a.kind.name().cmp(b.kind.name()));
    sorted
}

/// Canonical serialization of a fleet: placements sorted by ship-type name,
/// encoded as compact JSON with key order `type, x, y, orientation`.
pub fn canonical_form(fleet: &[ShipPlacement]) -> Result<String, CommitmentError> {
    Ok(serde_json::to_string(&canonical_order(fleet))?)
}

/// Hash `serialized:salt_hex` with SHA-256, returning lowercase hex
fn digest_payload(serialized: &str, salt_hex: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    hasher.update(b":");
    hasher.update(salt_hex.as_bytes());
    hex::encode(hasher.finalize())
}

/// Commit to a fleet with a fresh random salt.
///
/// Two calls with the same fleet produce different salts and therefore
/// different digests.
///
/// # Examples
///
/// ```
/// use broadside::crypto::{commit, verify};
/// use broadside::game::{Orientation, ShipPlacement, ShipType};
///
/// let fleet = vec![
///     ShipPlacement::new(ShipType::Carrier, 0, 0, Orientation::Horizontal),
///     ShipPlacement::new(ShipType::Battleship, 0, 1, Orientation::Horizontal),
///     ShipPlacement::new(ShipType::Cruiser, 0, 2, Orientation::Horizontal),
///     ShipPlacement::new(ShipType::Submarine, 0, 3, Orientation::Horizontal),
///     ShipPlacement::new(ShipType::Destroyer, 0, 4, Orientation::Horizontal),
/// ];
/// let commitment = commit(&fleet).unwrap();
/// assert_eq!(commitment.digest.len(), 64);
/// ```
pub fn commit(fleet: &[ShipPlacement]) -> Result<Commitment, CommitmentError> {
    let serialized = canonical_form(fleet)?;
    let salt = Salt::generate();
    let digest = digest_payload(&serialized, &salt.to_hex());
    Ok(Commitment { digest, salt })
}

/// Check a revealed fleet and salt against a previously published digest.
///
/// The revealed fleet is hashed in the order given, without re-sorting: a
/// reveal that is not already in canonical order does not verify.
pub fn verify(revealed: &[ShipPlacement], salt_hex: &str, expected_digest: &str) -> bool {
    let serialized = match serde_json::to_string(revealed) {
        Ok(serialized) => serialized,
        Err(_) => return false,
    };
    digest_payload(&serialized, salt_hex) == expected_digest
}
