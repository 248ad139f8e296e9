//! Notification types for the OTCDesk audit trail.
//!
//! Every committed state change produces one [`DealEvent`]. Events are
//! informational: the registry stays the source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, BlockHeight, DealId, EventId};

/// What happened, with the fields the protocol publishes for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// An account passed the identity gate.
    AccountVerified { account: AccountId },
    /// A seller posted a new offer.
    OfferPosted {
        deal_id: DealId,
        deal_type: String,
        opportunity_name: String,
        seller: AccountId,
        seller_deposit: Amount,
        buyer_deposit: Amount,
        expiry_block: BlockHeight,
    },
    /// A buyer took an open offer.
    OfferTaken {
        deal_id: DealId,
        buyer: AccountId,
        buyer_deposit: Amount,
    },
    /// Both deposits were released to their owners.
    TradeSettled {
        deal_id: DealId,
        seller: AccountId,
        buyer: AccountId,
        seller_amount: Amount,
        buyer_amount: Amount,
    },
    /// The seller (re)assigned the attestor.
    AttestorSwapped {
        deal_id: DealId,
        previous: Option<AccountId>,
        attestor: AccountId,
    },
    /// The attestor moved the expiry boundary.
    ExpiryExtended {
        deal_id: DealId,
        previous: BlockHeight,
        expiry_block: BlockHeight,
    },
    /// Deposits were returned after expiry.
    Refunded {
        deal_id: DealId,
        seller: AccountId,
        buyer: Option<AccountId>,
        seller_amount: Amount,
        buyer_amount: Amount,
    },
}

impl EventKind {
    /// Event name as published to listeners.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AccountVerified { .. } => "AccountVerified",
            Self::OfferPosted { .. } => "OfferPosted",
            Self::OfferTaken { .. } => "OfferTaken",
            Self::TradeSettled { .. } => "TradeSettled",
            Self::AttestorSwapped { .. } => "AttestorSwapped",
            Self::ExpiryExtended { .. } => "ExpiryExtended",
            Self::Refunded { .. } => "Refunded",
        }
    }

    /// The deal this event concerns, if any.
    #[must_use]
    pub fn deal_id(&self) -> Option<DealId> {
        match self {
            Self::AccountVerified { .. } => None,
            Self::OfferPosted { deal_id, .. }
            | Self::OfferTaken { deal_id, .. }
            | Self::TradeSettled { deal_id, .. }
            | Self::AttestorSwapped { deal_id, .. }
            | Self::ExpiryExtended { deal_id, .. }
            | Self::Refunded { deal_id, .. } => Some(*deal_id),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A notification emitted after a state change committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealEvent {
    pub id: EventId,
    pub kind: EventKind,
    /// Block counter at the time of the call.
    pub block_height: BlockHeight,
    pub emitted_at: DateTime<Utc>,
}

impl DealEvent {
    #[must_use]
    pub fn new(kind: EventKind, block_height: BlockHeight) -> Self {
        Self {
            id: EventId::new(),
            kind,
            block_height,
            emitted_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Structured payload as a JSON string.
    pub fn payload_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(&self.kind)?)
    }
}
