pub mod commitment;

pub use commitment::{
    canonical_form, canonical_order, commit, verify, Commitment, CommitmentError, Salt,
    DIGEST_HEX_LEN, SALT_LEN,
};
