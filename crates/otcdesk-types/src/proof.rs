//! Identity proof inputs handed to the external verifier.
//!
//! The proof system itself is opaque to OTCDesk. What the protocol does own
//! is the binding of a proof to the calling account (the *signal*) and the
//! nullifier, which lets the identity gate refuse a second account presenting
//! the same human.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AccountId, constants};

/// A 32-byte nullifier hash. One nullifier verifies at most one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Nullifier(pub [u8; 32]);

impl Nullifier {
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nullifier:{}", hex::encode(&self.0[..8]))
    }
}

/// Inputs of an identity proof, as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProof {
    /// Root of the identity set the proof is a member of.
    pub merkle_root: [u8; 32],
    /// Per-human nullifier for this protocol.
    pub nullifier_hash: Nullifier,
    /// Opaque proof bytes.
    pub proof: Vec<u8>,
}

/// Hash an account into the signal the proof must commit to.
///
/// SHA-256 over a domain-separated account id, with the top byte cleared so
/// the value fits a ~248-bit scalar field.
#[must_use]
pub fn signal_hash(account: &AccountId) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(constants::SIGNAL_DOMAIN);
    hasher.update(account.as_bytes());
    let mut out: [u8; 32] = hasher.finalize().into();
    out[0] = 0;
    out
}

/// Fixture proof for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl IdentityProof {
    pub fn dummy(nullifier_byte: u8) -> Self {
        Self {
            merkle_root: [0u8; 32],
            nullifier_hash: Nullifier([nullifier_byte; 32]),
            proof: vec![0u8; 256],
        }
    }
}
