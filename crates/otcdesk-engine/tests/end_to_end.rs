//! End-to-end tests across the identity gate, the registry, custody and the
//! event stream.
//!
//! These drive a [`DealEngine`] through full deal lifecycles: verified
//! parties post, take, settle and refund deals, and after every step the
//! custody ledger must agree with what the deals say they hold.

use otcdesk_engine::{CallContext, DealEngine};
use otcdesk_ingress::{IdentityGate, SelfAttested};
use otcdesk_settlement::{Custody, EventLog, LedgerCustody, TracingNotifier};
use otcdesk_types::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

type Notifier = (TracingNotifier, EventLog);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("otcdesk=debug")
        .with_test_writer()
        .try_init();
}

/// Helper: an engine with a handful of verified parties.
struct Desk {
    engine: DealEngine<LedgerCustody, Notifier>,
    block: u64,
}

impl Desk {
    fn new(config: EngineConfig) -> Self {
        init_tracing();
        let engine = DealEngine::new(
            config,
            IdentityGate::with_verifier(SelfAttested),
            LedgerCustody::new(),
            (TracingNotifier, EventLog::new()),
        )
        .expect("default config is valid");
        let mut desk = Self { engine, block: 1 };
        for (i, name) in ["alice", "bob", "carol", "dave"].into_iter().enumerate() {
            let proof = IdentityProof::dummy(u8::try_from(i).unwrap());
            let ctx = at(name, desk.block);
            assert!(desk.engine.verify(&ctx, &proof).unwrap());
        }
        desk
    }

    fn advance_to(&mut self, block: u64) {
        self.block = block;
    }

    fn post(&mut self, seller: &str, deposit: Amount, buyer_deposit: Amount, expiry: u64) -> DealId {
        let ctx = at(seller, self.block).with_attached(deposit);
        self.engine
            .post_offer(
                &ctx,
                "equity",
                "Series B secondary",
                BlockHeight(expiry),
                deposit,
                buyer_deposit,
            )
            .expect("post should succeed")
    }

    fn take(&mut self, buyer: &str, deal_id: DealId, attached: Amount) {
        let ctx = at(buyer, self.block).with_attached(attached);
        self.engine
            .take_offer(&ctx, deal_id)
            .expect("take should succeed");
    }

    fn log(&self) -> &EventLog {
        &self.engine.notifier().1
    }

    /// Live deals have a buyer exactly when they are past `Open`.
    fn assert_buyer_invariant(&self) {
        for deal in self.engine.deals() {
            match deal.status {
                DealStatus::Open => assert!(deal.buyer.is_none(), "{} open with buyer", deal.id),
                DealStatus::Taken | DealStatus::Settled => {
                    assert!(deal.buyer.is_some(), "{} {} without buyer", deal.id, deal.status);
                }
                DealStatus::Refunded => {}
            }
        }
    }
}

fn at(caller: &str, block: u64) -> CallContext {
    CallContext::new(caller, BlockHeight(block))
}

fn acct(name: &str) -> AccountId {
    AccountId::from(name)
}

// =========================================================================
// Full lifecycles
// =========================================================================

#[test]
fn post_take_settle() {
    let mut desk = Desk::new(EngineConfig::default());

    // Alice posts with 100 attached, asking 50 from the buyer.
    let id = desk.post("alice", 100, 50, 10);
    assert_eq!(id, DealId(0));
    let deal = desk.engine.deal(id).unwrap();
    assert_eq!(deal.status, DealStatus::Open);
    assert_eq!(deal.seller_deposit, 100);
    assert!(deal.buyer.is_none());
    desk.engine.verify_custody().unwrap();

    // Bob takes with 50 attached.
    desk.advance_to(3);
    desk.take("bob", id, 50);
    let deal = desk.engine.deal(id).unwrap();
    assert_eq!(deal.status, DealStatus::Taken);
    assert_eq!(deal.buyer, Some(acct("bob")));
    assert_eq!(desk.engine.custody().held(), 150);
    desk.engine.verify_custody().unwrap();

    // Alice names Carol as attestor, who settles.
    desk.engine
        .swap_attestor(&at("alice", desk.block), id, acct("carol"))
        .unwrap();
    desk.advance_to(5);
    desk.engine.settle_trade(&at("carol", desk.block), id).unwrap();

    let custody = desk.engine.custody();
    let alice = acct("alice");
    let bob = acct("bob");
    let to_alice: Vec<_> = custody.payouts_to(&alice).collect();
    let to_bob: Vec<_> = custody.payouts_to(&bob).collect();
    assert_eq!(to_alice.len(), 1);
    assert_eq!(to_alice[0].amount, 100);
    assert_eq!(to_bob.len(), 1);
    assert_eq!(to_bob[0].amount, 50);
    assert_eq!(custody.held(), 0);
    assert_eq!(desk.engine.deal(id).unwrap().status, DealStatus::Settled);
    desk.engine.verify_custody().unwrap();

    assert_eq!(
        desk.log().for_deal(id).map(DealEvent::name).collect::<Vec<_>>(),
        vec!["OfferPosted", "OfferTaken", "AttestorSwapped", "TradeSettled"]
    );
}

#[test]
fn taken_deal_refunds_after_expiry() {
    let mut desk = Desk::new(EngineConfig::default());
    let id = desk.post("alice", 100, 50, 10);
    desk.take("bob", id, 50);

    desk.advance_to(5);
    let err = desk.engine.refund(&at("bob", desk.block), id).unwrap_err();
    assert!(matches!(err, OtcError::NotYetExpired { .. }));
    assert_eq!(desk.engine.custody().held(), 150);

    desk.advance_to(11);
    desk.engine.refund(&at("bob", desk.block), id).unwrap();

    let deal = desk.engine.deal(id).unwrap();
    assert_eq!(deal.status, DealStatus::Refunded);
    assert_eq!(deal.seller_deposit, 0);
    assert_eq!(deal.buyer_deposit, 0);
    let custody = desk.engine.custody();
    assert_eq!(custody.balance_of(&acct("alice")), 100);
    assert_eq!(custody.balance_of(&acct("bob")), 50);
    desk.engine.verify_custody().unwrap();

    // A second refund must not pay anyone again.
    let err = desk.engine.refund(&at("alice", desk.block), id).unwrap_err();
    assert!(matches!(err, OtcError::DealFinalized { .. }));
    assert_eq!(desk.engine.custody().payouts().len(), 2);
}

#[test]
fn attestor_extends_expiry_to_delay_refund() {
    let mut desk = Desk::new(EngineConfig::default());
    let id = desk.post("alice", 100, 50, 10);
    desk.take("bob", id, 50);
    desk.engine
        .swap_attestor(&at("alice", desk.block), id, acct("carol"))
        .unwrap();
    desk.engine
        .extend_expiry(&at("carol", desk.block), id, BlockHeight(20))
        .unwrap();

    desk.advance_to(15);
    assert!(desk.engine.refund(&at("alice", desk.block), id).is_err());
    desk.engine.settle_trade(&at("carol", desk.block), id).unwrap();
    desk.engine.verify_custody().unwrap();
}

#[test]
fn attestor_only_desk() {
    let config = EngineConfig::from_json_str(r#"{"settlement_authority":"attestor_only"}"#).unwrap();
    let mut desk = Desk::new(config);
    let id = desk.post("alice", 10, 10, 10);
    desk.take("bob", id, 10);

    for party in ["alice", "bob", "dave"] {
        let err = desk.engine.settle_trade(&at(party, desk.block), id).unwrap_err();
        assert!(matches!(err, OtcError::Unauthorized { .. }));
    }
    desk.engine
        .swap_attestor(&at("alice", desk.block), id, acct("dave"))
        .unwrap();
    desk.engine.settle_trade(&at("dave", desk.block), id).unwrap();
}

#[test]
fn unverified_caller_cannot_touch_deals() {
    let mut desk = Desk::new(EngineConfig::default());
    let id = desk.post("alice", 100, 50, 10);
    let before = desk.engine.deal(id).unwrap().clone();
    let events = desk.log().len();

    let ctx = at("mallory", desk.block).with_attached(1_000);
    assert!(desk.engine.take_offer(&ctx, id).is_err());
    assert!(desk.engine.refund(&ctx, id).is_err());

    assert_eq!(desk.engine.deal(id).unwrap(), &before);
    assert_eq!(desk.log().len(), events);
    assert_eq!(desk.engine.custody().held(), 100);
}

#[test]
fn nullifier_cannot_verify_second_account() {
    let mut desk = Desk::new(EngineConfig::default());
    let ctx = at("mallory", desk.block);
    let err = desk
        .engine
        .verify(&ctx, &IdentityProof::dummy(0))
        .unwrap_err();
    assert!(matches!(err, OtcError::NullifierReused { .. }));
    assert!(!desk.engine.is_verified(&acct("mallory")));
}

// =========================================================================
// Invariants under many deals
// =========================================================================

#[test]
fn randomized_deals_conserve_custody() {
    let mut desk = Desk::new(EngineConfig::default());
    let mut rng = StdRng::seed_from_u64(7);
    let parties = ["alice", "bob", "carol", "dave"];

    for round in 0..200u64 {
        desk.advance_to(round + 1);
        let actor = parties[rng.gen_range(0..parties.len())];

        match rng.gen_range(0..4) {
            0 => {
                let seller_deposit = rng.gen_range(0..1_000u128);
                let extra = rng.gen_range(0..10u128);
                let ctx = at(actor, desk.block).with_attached(seller_deposit + extra);
                let expiry = BlockHeight(desk.block + rng.gen_range(0..20));
                desk.engine
                    .post_offer(&ctx, "token", "allocation", expiry, seller_deposit, rng.gen_range(0..500))
                    .unwrap();
            }
            1 if desk.engine.deal_count() > 0 => {
                let id = DealId(rng.gen_range(0..desk.engine.deal_count()));
                let ctx = at(actor, desk.block).with_attached(rng.gen_range(0..600));
                let _ = desk.engine.take_offer(&ctx, id);
            }
            2 if desk.engine.deal_count() > 0 => {
                let id = DealId(rng.gen_range(0..desk.engine.deal_count()));
                let _ = desk.engine.settle_trade(&at(actor, desk.block), id);
            }
            3 if desk.engine.deal_count() > 0 => {
                let id = DealId(rng.gen_range(0..desk.engine.deal_count()));
                let _ = desk.engine.refund(&at(actor, desk.block), id);
            }
            _ => {}
        }

        desk.engine.verify_custody().unwrap();
        desk.assert_buyer_invariant();
        assert_eq!(desk.engine.custody().held(), desk.engine.held_in_escrow());
    }

    // Every settled or refunded deal paid out at most once per party.
    let custody = desk.engine.custody();
    let paid: Amount = custody.payouts().iter().map(|p| p.amount).sum();
    let deposited: Amount = parties
        .iter()
        .map(|p| custody.deposited_by(&acct(p)))
        .sum();
    assert_eq!(deposited - paid, custody.held());
}

#[test]
fn events_serialize_with_large_amounts() {
    let mut desk = Desk::new(EngineConfig::default());
    let big = u128::from(u64::MAX) * 4;
    let id = desk.post("alice", big, big, 10);
    desk.take("bob", id, big);

    let event = desk.log().last().unwrap();
    let json = event.payload_json().unwrap();
    let kind: EventKind = serde_json::from_str(&json).unwrap();
    assert_eq!(kind, event.kind);
}
