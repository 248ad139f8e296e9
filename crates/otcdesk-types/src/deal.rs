//! # Deal: one escrow transaction record
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐  take   ┌───────┐  settle   ┌─────────┐
//!   │ OPEN ├────────▶│ TAKEN ├──────────▶│ SETTLED │
//!   └──┬───┘         └───┬───┘           └─────────┘
//!      │ refund          │ refund
//!      ▼                 ▼
//!   ┌──────────────────────┐
//!   │       REFUNDED       │
//!   └──────────────────────┘
//! ```
//!
//! `SETTLED` and `REFUNDED` are terminal. A deal is never removed from the
//! registry; terminal deals stay as the historical record.

use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, BlockHeight, DealId};

/// The lifecycle status of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealStatus {
    /// Posted by the seller, waiting for a counterpart.
    Open,
    /// A buyer accepted and locked their deposit.
    Taken,
    /// Both deposits paid out. **Terminal.**
    Settled,
    /// Deposits returned after expiry. **Terminal.**
    Refunded,
}

impl DealStatus {
    /// Can a deal in this status move to `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Open, Self::Taken | Self::Refunded) | (Self::Taken, Self::Settled | Self::Refunded)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Refunded)
    }
}

impl std::fmt::Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Taken => write!(f, "TAKEN"),
            Self::Settled => write!(f, "SETTLED"),
            Self::Refunded => write!(f, "REFUNDED"),
        }
    }
}

/// A single OTC deal between a seller and a buyer, optionally overseen by an
/// attestor.
///
/// `buyer` is `None` exactly while the deal is `Open`. Before a buyer takes
/// the offer, `buyer_deposit` holds the amount the seller asked for; after
/// taking it holds what the buyer actually attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    /// Registry index of this deal.
    pub id: DealId,
    /// Free-form classification tag.
    pub deal_type: String,
    /// Name of the opportunity being traded.
    pub opportunity_name: String,
    /// The account that posted the offer.
    pub seller: AccountId,
    /// The account that took the offer, once taken.
    pub buyer: Option<AccountId>,
    /// Assigned by the seller; may extend expiry.
    pub attestor: Option<AccountId>,
    /// Seller's deposit held in custody.
    pub seller_deposit: Amount,
    /// Buyer's deposit (requested while open, held once taken).
    pub buyer_deposit: Amount,
    /// Current lifecycle status.
    pub status: DealStatus,
    /// Refunds are allowed once the block counter is strictly past this.
    pub expiry_block: BlockHeight,
}

impl Deal {
    /// Create a freshly posted `Open` deal.
    #[must_use]
    pub fn open(
        id: DealId,
        deal_type: impl Into<String>,
        opportunity_name: impl Into<String>,
        seller: AccountId,
        expiry_block: BlockHeight,
        seller_deposit: Amount,
        buyer_deposit: Amount,
    ) -> Self {
        Self {
            id,
            deal_type: deal_type.into(),
            opportunity_name: opportunity_name.into(),
            seller,
            buyer: None,
            attestor: None,
            seller_deposit,
            buyer_deposit,
            status: DealStatus::Open,
            expiry_block,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == DealStatus::Open
    }

    #[must_use]
    pub fn is_seller(&self, account: &AccountId) -> bool {
        &self.seller == account
    }

    /// `false` whenever no attestor is assigned.
    #[must_use]
    pub fn is_attestor(&self, account: &AccountId) -> bool {
        self.attestor.as_ref() == Some(account)
    }

    #[must_use]
    pub fn is_expired_at(&self, now: BlockHeight) -> bool {
        now.is_past(self.expiry_block)
    }

    /// What custody currently holds on behalf of this deal.
    ///
    /// The buyer leg only counts once a buyer has locked it; terminal deals
    /// hold nothing.
    #[must_use]
    pub fn held_amount(&self) -> Amount {
        match self.status {
            DealStatus::Open => self.seller_deposit,
            DealStatus::Taken => self.seller_deposit.saturating_add(self.buyer_deposit),
            DealStatus::Settled | DealStatus::Refunded => 0,
        }
    }
}

/// Fixture deal for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Deal {
    pub fn dummy(id: u64, seller: &str, seller_deposit: Amount, buyer_deposit: Amount) -> Self {
        Self::open(
            DealId(id),
            "equity",
            "Series A allocation",
            AccountId::from(seller),
            BlockHeight(100),
            seller_deposit,
            buyer_deposit,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_transitions_valid() {
        assert!(DealStatus::Open.can_transition_to(DealStatus::Taken));
        assert!(DealStatus::Open.can_transition_to(DealStatus::Refunded));
        assert!(DealStatus::Taken.can_transition_to(DealStatus::Settled));
        assert!(DealStatus::Taken.can_transition_to(DealStatus::Refunded));
    }

    #[test]
    fn state_transitions_invalid() {
        assert!(!DealStatus::Open.can_transition_to(DealStatus::Settled));
        assert!(!DealStatus::Taken.can_transition_to(DealStatus::Open));
        for terminal in [DealStatus::Settled, DealStatus::Refunded] {
            assert!(terminal.is_terminal());
            for target in [
                DealStatus::Open,
                DealStatus::Taken,
                DealStatus::Settled,
                DealStatus::Refunded,
            ] {
                assert!(!terminal.can_transition_to(target), "{terminal} -> {target}");
            }
        }
    }

    #[test]
    fn open_deal_has_no_counterparties() {
        let deal = Deal::dummy(0, "alice", 100, 50);
        assert!(deal.is_open());
        assert!(deal.buyer.is_none());
        assert!(deal.attestor.is_none());
    }

    #[test]
    fn attestor_check_fails_when_unassigned() {
        let mut deal = Deal::dummy(0, "alice", 100, 50);
        let carol = AccountId::from("carol");
        assert!(!deal.is_attestor(&carol));
        deal.attestor = Some(carol.clone());
        assert!(deal.is_attestor(&carol));
    }

    #[test]
    fn held_amount_follows_status() {
        let mut deal = Deal::dummy(0, "alice", 100, 50);
        assert_eq!(deal.held_amount(), 100);

        deal.status = DealStatus::Taken;
        deal.buyer = Some(AccountId::from("bob"));
        assert_eq!(deal.held_amount(), 150);

        deal.status = DealStatus::Settled;
        assert_eq!(deal.held_amount(), 0);
    }

    #[test]
    fn serde_roundtrip() {
        let deal = Deal::dummy(7, "alice", u128::MAX, 1);
        let json = serde_json::to_string(&deal).unwrap();
        let back: Deal = serde_json::from_str(&json).unwrap();
        assert_eq!(deal, back);
    }
}
