//! Identity gate: the verification flag every mutating call checks first.
//!
//! An account becomes verified either by presenting an identity proof that
//! the injected [`ProofVerifier`] accepts, or by the host granting it after
//! validating the identity out of band. Flags are monotonic: nothing in the
//! protocol clears them.
//!
//! ## Strategies
//!
//! - [`RejectUnverified`]: default. Refuses every proof, so only `grant`
//!   can verify accounts.
//! - [`SelfAttested`]: accepts any proof. Reproduces the permissive
//!   self-service flag of the first deployments; for local networks and tests.

use std::collections::{HashMap, HashSet};

use otcdesk_types::{AccountId, IdentityProof, Nullifier, OtcError, Result, signal_hash};

/// Checks an identity proof against the signal derived from the caller.
pub trait ProofVerifier {
    /// # Errors
    /// `ProofRejected` if the proof does not verify.
    fn verify_proof(&self, proof: &IdentityProof, signal_hash: &[u8; 32]) -> Result<()>;
}

/// Refuses every proof.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectUnverified;

impl ProofVerifier for RejectUnverified {
    fn verify_proof(&self, _proof: &IdentityProof, _signal_hash: &[u8; 32]) -> Result<()> {
        Err(OtcError::ProofRejected {
            reason: "no proof verifier configured; identities must be granted externally"
                .to_string(),
        })
    }
}

/// Accepts every non-empty proof without checking it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfAttested;

impl ProofVerifier for SelfAttested {
    fn verify_proof(&self, proof: &IdentityProof, _signal_hash: &[u8; 32]) -> Result<()> {
        if proof.proof.is_empty() {
            return Err(OtcError::ProofRejected {
                reason: "empty proof".to_string(),
            });
        }
        Ok(())
    }
}

/// Tracks which accounts passed identity verification.
pub struct IdentityGate {
    /// Accounts with the verified flag set.
    verified: HashSet<AccountId>,
    /// Nullifier → the account it verified.
    nullifiers: HashMap<Nullifier, AccountId>,
    /// Injected proof-checking strategy.
    verifier: Box<dyn ProofVerifier + Send + Sync>,
}

impl IdentityGate {
    /// Create a gate that rejects all proofs ([`RejectUnverified`]).
    #[must_use]
    pub fn new() -> Self {
        Self::with_verifier(RejectUnverified)
    }

    /// Create a gate backed by the given verifier.
    #[must_use]
    pub fn with_verifier(verifier: impl ProofVerifier + Send + Sync + 'static) -> Self {
        Self {
            verified: HashSet::new(),
            nullifiers: HashMap::new(),
            verifier: Box::new(verifier),
        }
    }

    #[must_use]
    pub fn is_verified(&self, account: &AccountId) -> bool {
        self.verified.contains(account)
    }

    /// Gate check run at the start of every mutating call.
    ///
    /// # Errors
    /// `Unauthorized` if `account` is not verified.
    pub fn require_verified(&self, account: &AccountId) -> Result<()> {
        if self.is_verified(account) {
            Ok(())
        } else {
            Err(OtcError::Unauthorized {
                caller: account.clone(),
                reason: "address is not verified".to_string(),
            })
        }
    }

    /// Verify `caller` with an identity proof.
    ///
    /// Returns `true` if the flag was newly set, `false` if the caller was
    /// already verified (the proof is not re-checked).
    ///
    /// # Errors
    /// - `NullifierReused` if the nullifier already verified another account
    /// - `ProofRejected` if the verifier refuses the proof
    pub fn verify(&mut self, caller: &AccountId, proof: &IdentityProof) -> Result<bool> {
        if self.is_verified(caller) {
            return Ok(false);
        }

        if let Some(owner) = self.nullifiers.get(&proof.nullifier_hash) {
            tracing::warn!(
                caller = %caller,
                owner = %owner,
                nullifier = %proof.nullifier_hash.short(),
                "nullifier reuse rejected"
            );
            return Err(OtcError::NullifierReused {
                nullifier: proof.nullifier_hash.to_string(),
            });
        }

        self.verifier.verify_proof(proof, &signal_hash(caller))?;

        self.nullifiers.insert(proof.nullifier_hash, caller.clone());
        self.verified.insert(caller.clone());
        Ok(true)
    }

    /// Set the flag for an account validated outside the protocol.
    ///
    /// Returns `true` if the flag was newly set.
    pub fn grant(&mut self, account: AccountId) -> bool {
        self.verified.insert(account)
    }

    /// Number of verified accounts.
    #[must_use]
    pub fn verified_count(&self) -> usize {
        self.verified.len()
    }
}

impl Default for IdentityGate {
    fn default() -> Self {
        Self::new()
    }
}
