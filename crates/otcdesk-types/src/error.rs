//! Error types for the OTCDesk escrow protocol.
//!
//! All errors use the `OTC_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Identity / authorization errors
//! - 2xx: Deal and registry errors
//! - 3xx: Deposit and custody errors
//! - 9xx: General / internal errors
//!
//! Every error aborts the whole operation; no partial state survives.

use thiserror::Error;

use crate::{AccountId, Amount, BlockHeight, DealId, DealStatus};

/// Central error enum for all OTCDesk operations.
#[derive(Debug, Error)]
pub enum OtcError {
    // =================================================================
    // Identity / Authorization Errors (1xx)
    // =================================================================
    /// The caller lacks the verification flag or the role the operation needs.
    #[error("OTC_ERR_100: Unauthorized caller {caller}: {reason}")]
    Unauthorized { caller: AccountId, reason: String },

    /// The proof verifier refused the submitted identity proof.
    #[error("OTC_ERR_101: Identity proof rejected: {reason}")]
    ProofRejected { reason: String },

    /// The nullifier already verified a different account.
    #[error("OTC_ERR_102: Nullifier {nullifier} already used")]
    NullifierReused { nullifier: String },

    // =================================================================
    // Deal / Registry Errors (2xx)
    // =================================================================
    /// The deal index is past the end of the registry.
    #[error("OTC_ERR_200: Invalid deal ID {deal_id} (registry holds {count} deals)")]
    InvalidDealId { deal_id: DealId, count: u64 },

    /// Only `Open` deals can be taken.
    #[error("OTC_ERR_201: Deal {deal_id} not available: status is {status}")]
    DealNotAvailable { deal_id: DealId, status: DealStatus },

    /// Only `Taken` deals can be settled.
    #[error("OTC_ERR_202: Deal {deal_id} not taken: status is {status}")]
    DealNotTaken { deal_id: DealId, status: DealStatus },

    /// The deal already reached a terminal status; nothing is left to pay out.
    #[error("OTC_ERR_203: Deal {deal_id} already finalized: status is {status}")]
    DealFinalized { deal_id: DealId, status: DealStatus },

    /// Refund requested before the expiry boundary was crossed.
    #[error("OTC_ERR_204: Deal {deal_id} has not expired yet: expiry {expiry}, current {current}")]
    NotYetExpired {
        deal_id: DealId,
        expiry: BlockHeight,
        current: BlockHeight,
    },

    /// Deal fields failed validation.
    #[error("OTC_ERR_205: Invalid deal: {reason}")]
    InvalidDeal { reason: String },

    /// Registry-level bounds failure.
    #[error("OTC_ERR_206: Registry index {index} out of range (len {len})")]
    IndexOutOfRange { index: u64, len: u64 },

    /// The registry reached its configured capacity.
    #[error("OTC_ERR_207: Registry full: capacity {capacity}")]
    RegistryFull { capacity: usize },

    // =================================================================
    // Deposit / Custody Errors (3xx)
    // =================================================================
    /// The value attached to the call is below the required deposit.
    #[error("OTC_ERR_300: Insufficient deposit: need {needed}, attached {attached}")]
    InsufficientDeposit { needed: Amount, attached: Amount },

    /// The custody adapter reported a failed transfer.
    #[error("OTC_ERR_301: Transfer of {amount} to {to} failed: {reason}")]
    TransferFailed {
        to: AccountId,
        amount: Amount,
        reason: String,
    },

    /// Custody holdings no longer match what open deals account for.
    #[error("OTC_ERR_302: Custody invariant violation: {reason}")]
    CustodyInvariantViolation { reason: String },

    /// Amount arithmetic overflowed the base unit.
    #[error("OTC_ERR_303: Amount overflow: {context}")]
    AmountOverflow { context: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("OTC_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("OTC_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, out-of-range values, etc.).
    #[error("OTC_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, OtcError>;

impl From<serde_json::Error> for OtcError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = OtcError::InvalidDealId {
            deal_id: DealId(9),
            count: 2,
        };
        let msg = format!("{err}");
        assert!(msg.starts_with("OTC_ERR_200"), "Got: {msg}");
        assert!(msg.contains("deal:9"));
    }

    #[test]
    fn insufficient_deposit_display() {
        let err = OtcError::InsufficientDeposit {
            needed: 100,
            attached: 50,
        };
        let msg = format!("{err}");
        assert!(msg.contains("OTC_ERR_300"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn not_yet_expired_display() {
        let err = OtcError::NotYetExpired {
            deal_id: DealId(0),
            expiry: BlockHeight(10),
            current: BlockHeight(5),
        };
        let msg = format!("{err}");
        assert!(msg.contains("#10"));
        assert!(msg.contains("#5"));
    }

    #[test]
    fn status_errors_name_the_status() {
        let err = OtcError::DealNotAvailable {
            deal_id: DealId(1),
            status: DealStatus::Taken,
        };
        assert!(format!("{err}").contains("TAKEN"));
    }

    #[test]
    fn serde_json_error_converts() {
        let bad = serde_json::from_str::<u64>("not json").unwrap_err();
        let err: OtcError = bad.into();
        assert!(matches!(err, OtcError::Serialization(_)));
    }

    #[test]
    fn all_errors_have_otc_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(OtcError::Unauthorized {
                caller: AccountId::from("mallory"),
                reason: "not verified".into(),
            }),
            Box::new(OtcError::RegistryFull { capacity: 1 }),
            Box::new(OtcError::TransferFailed {
                to: AccountId::from("bob"),
                amount: 5,
                reason: "test".into(),
            }),
            Box::new(OtcError::Internal("test".into())),
            Box::new(OtcError::Configuration("test".into())),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("OTC_ERR_"),
                "Error missing OTC_ERR_ prefix: {msg}"
            );
        }
    }
}
