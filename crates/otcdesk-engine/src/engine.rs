//! Deal lifecycle engine.
//!
//! Every operation runs the same pipeline:
//!
//! 1. Identity gate: the caller must be verified
//! 2. Validate the deal index, its status, and the caller's role
//! 3. Move value through custody (deposits in, payouts out)
//! 4. Write the deal
//! 5. Notify
//!
//! All checks run before the first side effect, so a rejected call leaves
//! the registry, the gate, and custody untouched.
//!
//! ## Payout policy
//!
//! Settlement and refund first check that custody covers every leg, then
//! issue the legs in order (seller, then buyer), and only write the deal once
//! all legs succeeded. If a leg fails, every leg already issued is reclaimed
//! into custody, the deal is left as it was, and `TransferFailed` is
//! returned. A retry therefore starts from the same custody state and cannot
//! pay a leg twice.

use otcdesk_ingress::{DealRegistry, IdentityGate};
use otcdesk_settlement::{
    Custody, CustodyConservation, EventLog, EventNotifier, LedgerCustody, Payout,
};
use otcdesk_types::{
    AccountId, Amount, BlockHeight, Deal, DealEvent, DealId, DealStatus, EngineConfig,
    EventKind, IdentityProof, OtcError, Result, SettlementAuthority,
};

use crate::context::CallContext;

/// Owns protocol state and orchestrates every deal operation.
pub struct DealEngine<C: Custody, N: EventNotifier> {
    config: EngineConfig,
    gate: IdentityGate,
    registry: DealRegistry,
    custody: C,
    notifier: N,
    /// Running deposit/payout totals for the conservation check.
    books: CustodyConservation,
}

impl DealEngine<LedgerCustody, EventLog> {
    /// Engine backed by an in-memory ledger and event log.
    pub fn in_memory(config: EngineConfig, gate: IdentityGate) -> Result<Self> {
        Self::new(config, gate, LedgerCustody::new(), EventLog::new())
    }
}

impl<C: Custody, N: EventNotifier> DealEngine<C, N> {
    /// Create an engine with an empty registry.
    ///
    /// # Errors
    /// `Configuration` if `config` fails validation.
    pub fn new(config: EngineConfig, gate: IdentityGate, custody: C, notifier: N) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: DealRegistry::with_capacity(config.registry_capacity),
            config,
            gate,
            custody,
            notifier,
            books: CustodyConservation::new(),
        })
    }

    // =================================================================
    // Identity
    // =================================================================

    /// Verify the caller with an identity proof.
    ///
    /// Returns `true` if the caller was newly verified.
    pub fn verify(&mut self, ctx: &CallContext, proof: &IdentityProof) -> Result<bool> {
        let newly = self.gate.verify(&ctx.caller, proof)?;
        if newly {
            tracing::info!(account = %ctx.caller, "address verified");
            self.emit(
                EventKind::AccountVerified {
                    account: ctx.caller.clone(),
                },
                ctx.block_height,
            );
        }
        Ok(newly)
    }

    /// Mark an externally validated account as verified.
    pub fn grant(&mut self, account: AccountId, at: BlockHeight) -> bool {
        let newly = self.gate.grant(account.clone());
        if newly {
            tracing::info!(account = %account, "address granted");
            self.emit(EventKind::AccountVerified { account }, at);
        }
        newly
    }

    // =================================================================
    // Deal operations
    // =================================================================

    /// Post a new offer. The caller becomes the seller; the attached value
    /// is locked as the seller deposit.
    ///
    /// `seller_deposit` is only the minimum the caller must attach. The deal
    /// records the full attached amount, so any excess is refunded or paid
    /// out with the rest of the seller leg.
    ///
    /// # Errors
    /// - `Unauthorized` if the caller is not verified
    /// - `InvalidDeal` if a label exceeds `max_label_bytes`
    /// - `InsufficientDeposit` if `ctx.attached < seller_deposit`
    /// - `RegistryFull` if the registry is at capacity
    pub fn post_offer(
        &mut self,
        ctx: &CallContext,
        deal_type: &str,
        opportunity_name: &str,
        expiry_block: BlockHeight,
        seller_deposit: Amount,
        buyer_deposit: Amount,
    ) -> Result<DealId> {
        self.gate.require_verified(&ctx.caller)?;
        self.check_label("deal_type", deal_type)?;
        self.check_label("opportunity_name", opportunity_name)?;
        if ctx.attached < seller_deposit {
            return Err(OtcError::InsufficientDeposit {
                needed: seller_deposit,
                attached: ctx.attached,
            });
        }
        if !self.registry.has_room() {
            return Err(OtcError::RegistryFull {
                capacity: self.registry.capacity(),
            });
        }

        self.lock_deposit(&ctx.caller, ctx.attached)?;

        let deal = Deal::open(
            self.registry.next_id(),
            deal_type,
            opportunity_name,
            ctx.caller.clone(),
            expiry_block,
            ctx.attached,
            buyer_deposit,
        );
        let deal_id = self.registry.append(deal)?;

        tracing::info!(
            deal = %deal_id,
            seller = %ctx.caller,
            seller_deposit = ctx.attached,
            buyer_deposit,
            expiry = expiry_block.0,
            "offer posted"
        );
        self.emit(
            EventKind::OfferPosted {
                deal_id,
                deal_type: deal_type.to_string(),
                opportunity_name: opportunity_name.to_string(),
                seller: ctx.caller.clone(),
                seller_deposit: ctx.attached,
                buyer_deposit,
                expiry_block,
            },
            ctx.block_height,
        );
        Ok(deal_id)
    }

    /// Take an open offer. The caller becomes the buyer; the attached value
    /// is locked and recorded as the buyer deposit.
    ///
    /// # Errors
    /// - `Unauthorized` if the caller is not verified
    /// - `InvalidDealId` if `deal_id` is out of range
    /// - `DealNotAvailable` if the deal is not `Open`
    /// - `InsufficientDeposit` if `ctx.attached` is below the requested deposit
    pub fn take_offer(&mut self, ctx: &CallContext, deal_id: DealId) -> Result<()> {
        self.gate.require_verified(&ctx.caller)?;
        let deal = self.deal(deal_id)?;
        if deal.status != DealStatus::Open {
            return Err(OtcError::DealNotAvailable {
                deal_id,
                status: deal.status,
            });
        }
        if ctx.attached < deal.buyer_deposit {
            return Err(OtcError::InsufficientDeposit {
                needed: deal.buyer_deposit,
                attached: ctx.attached,
            });
        }

        self.lock_deposit(&ctx.caller, ctx.attached)?;

        let deal = self.registry.get_mut(deal_id)?;
        deal.buyer = Some(ctx.caller.clone());
        deal.buyer_deposit = ctx.attached;
        deal.status = DealStatus::Taken;

        tracing::info!(
            deal = %deal_id,
            buyer = %ctx.caller,
            buyer_deposit = ctx.attached,
            "offer taken"
        );
        self.emit(
            EventKind::OfferTaken {
                deal_id,
                buyer: ctx.caller.clone(),
                buyer_deposit: ctx.attached,
            },
            ctx.block_height,
        );
        Ok(())
    }

    /// Settle a taken deal: release the seller deposit to the seller and the
    /// buyer deposit to the buyer.
    ///
    /// Claim verification happens off-protocol before this call; under
    /// [`SettlementAuthority::AttestorOnly`] only the attestor may trigger it.
    ///
    /// # Errors
    /// - `Unauthorized` if the caller is not verified, or is not the attestor
    ///   under `AttestorOnly`
    /// - `InvalidDealId` if `deal_id` is out of range
    /// - `DealNotTaken` if the deal is not `Taken`
    /// - `TransferFailed` if custody could not pay a leg
    pub fn settle_trade(&mut self, ctx: &CallContext, deal_id: DealId) -> Result<()> {
        self.gate.require_verified(&ctx.caller)?;
        let deal = self.deal(deal_id)?;
        if deal.status != DealStatus::Taken {
            return Err(OtcError::DealNotTaken {
                deal_id,
                status: deal.status,
            });
        }
        if self.config.settlement_authority == SettlementAuthority::AttestorOnly
            && !deal.is_attestor(&ctx.caller)
        {
            tracing::warn!(deal = %deal_id, caller = %ctx.caller, "settlement by non-attestor rejected");
            return Err(OtcError::Unauthorized {
                caller: ctx.caller.clone(),
                reason: format!("only the attestor can settle {deal_id}"),
            });
        }
        let buyer = deal.buyer.clone().ok_or_else(|| {
            OtcError::Internal(format!("{deal_id} is TAKEN without a buyer"))
        })?;
        let seller = deal.seller.clone();
        let (seller_amount, buyer_amount) = (deal.seller_deposit, deal.buyer_deposit);

        let legs = Payout::legs(&seller, seller_amount, Some(&buyer), buyer_amount);
        self.pay_out(deal_id, &legs)?;

        self.registry.get_mut(deal_id)?.status = DealStatus::Settled;

        tracing::info!(
            deal = %deal_id,
            seller = %seller,
            buyer = %buyer,
            seller_amount,
            buyer_amount,
            "trade settled"
        );
        self.emit(
            EventKind::TradeSettled {
                deal_id,
                seller,
                buyer,
                seller_amount,
                buyer_amount,
            },
            ctx.block_height,
        );
        Ok(())
    }

    /// Assign or replace the attestor. Only the seller may do this, in any
    /// status.
    ///
    /// # Errors
    /// - `Unauthorized` if the caller is not verified or is not the seller
    /// - `InvalidDealId` if `deal_id` is out of range
    pub fn swap_attestor(
        &mut self,
        ctx: &CallContext,
        deal_id: DealId,
        new_attestor: AccountId,
    ) -> Result<()> {
        self.gate.require_verified(&ctx.caller)?;
        if !self.deal(deal_id)?.is_seller(&ctx.caller) {
            tracing::warn!(deal = %deal_id, caller = %ctx.caller, "attestor swap by non-seller rejected");
            return Err(OtcError::Unauthorized {
                caller: ctx.caller.clone(),
                reason: format!("only the seller can swap the attestor of {deal_id}"),
            });
        }

        let previous = self
            .registry
            .get_mut(deal_id)?
            .attestor
            .replace(new_attestor.clone());

        tracing::info!(deal = %deal_id, attestor = %new_attestor, "attestor swapped");
        self.emit(
            EventKind::AttestorSwapped {
                deal_id,
                previous,
                attestor: new_attestor,
            },
            ctx.block_height,
        );
        Ok(())
    }

    /// Move the expiry boundary. Only the current attestor may do this; the
    /// new value may be earlier or later than the old one.
    ///
    /// # Errors
    /// - `Unauthorized` if the caller is not verified or is not the attestor
    /// - `InvalidDealId` if `deal_id` is out of range
    pub fn extend_expiry(
        &mut self,
        ctx: &CallContext,
        deal_id: DealId,
        new_expiry: BlockHeight,
    ) -> Result<()> {
        self.gate.require_verified(&ctx.caller)?;
        if !self.deal(deal_id)?.is_attestor(&ctx.caller) {
            tracing::warn!(deal = %deal_id, caller = %ctx.caller, "expiry change by non-attestor rejected");
            return Err(OtcError::Unauthorized {
                caller: ctx.caller.clone(),
                reason: format!("only the attestor can extend the expiry of {deal_id}"),
            });
        }

        let deal = self.registry.get_mut(deal_id)?;
        let previous = std::mem::replace(&mut deal.expiry_block, new_expiry);
        if new_expiry < previous {
            tracing::debug!(deal = %deal_id, previous = previous.0, expiry = new_expiry.0, "expiry moved earlier");
        }

        tracing::info!(deal = %deal_id, expiry = new_expiry.0, "expiry extended");
        self.emit(
            EventKind::ExpiryExtended {
                deal_id,
                previous,
                expiry_block: new_expiry,
            },
            ctx.block_height,
        );
        Ok(())
    }

    /// Return held deposits once the deal has expired.
    ///
    /// The seller gets the seller deposit back; if the deal was taken, the
    /// buyer gets the buyer deposit back. Both deposit fields are zeroed.
    ///
    /// # Errors
    /// - `Unauthorized` if the caller is not verified
    /// - `InvalidDealId` if `deal_id` is out of range
    /// - `DealFinalized` if the deal is already `Settled` or `Refunded`
    /// - `NotYetExpired` unless `ctx.block_height > expiry_block`
    /// - `TransferFailed` if custody could not pay a leg
    pub fn refund(&mut self, ctx: &CallContext, deal_id: DealId) -> Result<()> {
        self.gate.require_verified(&ctx.caller)?;
        let deal = self.deal(deal_id)?;
        if deal.status.is_terminal() {
            tracing::warn!(deal = %deal_id, status = %deal.status, caller = %ctx.caller, "refund of finalized deal rejected");
            return Err(OtcError::DealFinalized {
                deal_id,
                status: deal.status,
            });
        }
        if !deal.is_expired_at(ctx.block_height) {
            return Err(OtcError::NotYetExpired {
                deal_id,
                expiry: deal.expiry_block,
                current: ctx.block_height,
            });
        }
        let seller = deal.seller.clone();
        let buyer = deal.buyer.clone();
        let seller_amount = deal.seller_deposit;
        let buyer_amount = match deal.status {
            DealStatus::Taken => deal.buyer_deposit,
            _ => 0,
        };

        let legs = Payout::legs(&seller, seller_amount, buyer.as_ref(), buyer_amount);
        self.pay_out(deal_id, &legs)?;

        let deal = self.registry.get_mut(deal_id)?;
        deal.status = DealStatus::Refunded;
        deal.seller_deposit = 0;
        deal.buyer_deposit = 0;

        tracing::info!(
            deal = %deal_id,
            seller = %seller,
            seller_amount,
            buyer_amount,
            "refunded"
        );
        self.emit(
            EventKind::Refunded {
                deal_id,
                seller,
                buyer,
                seller_amount,
                buyer_amount,
            },
            ctx.block_height,
        );
        Ok(())
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Look up a deal.
    ///
    /// # Errors
    /// `InvalidDealId` if `deal_id` is out of range.
    pub fn deal(&self, deal_id: DealId) -> Result<&Deal> {
        if !self.registry.contains(deal_id) {
            return Err(OtcError::InvalidDealId {
                deal_id,
                count: self.registry.count(),
            });
        }
        self.registry.get(deal_id)
    }

    #[must_use]
    pub fn deal_count(&self) -> u64 {
        self.registry.count()
    }

    pub fn deals(&self) -> impl Iterator<Item = &Deal> {
        self.registry.iter()
    }

    pub fn deals_with_status(&self, status: DealStatus) -> impl Iterator<Item = &Deal> {
        self.registry.with_status(status)
    }

    #[must_use]
    pub fn is_verified(&self, account: &AccountId) -> bool {
        self.gate.is_verified(account)
    }

    /// Sum of what live deals hold in custody.
    #[must_use]
    pub fn held_in_escrow(&self) -> Amount {
        self.registry
            .iter()
            .map(Deal::held_amount)
            .fold(0u128, u128::saturating_add)
    }

    /// Check custody holdings against the engine's books and the deals.
    ///
    /// # Errors
    /// `CustodyInvariantViolation` if they disagree.
    pub fn verify_custody(&self) -> Result<()> {
        self.books.verify(self.custody.held(), self.registry.iter())
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn custody(&self) -> &C {
        &self.custody
    }

    #[must_use]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    // =================================================================
    // Internals
    // =================================================================

    fn check_label(&self, field: &str, value: &str) -> Result<()> {
        if value.len() > self.config.max_label_bytes {
            return Err(OtcError::InvalidDeal {
                reason: format!(
                    "{field} is {} bytes, limit is {}",
                    value.len(),
                    self.config.max_label_bytes
                ),
            });
        }
        Ok(())
    }

    /// Move attached value into custody and book it.
    fn lock_deposit(&mut self, from: &AccountId, amount: Amount) -> Result<()> {
        let mut books = self.books.clone();
        books.record_deposit(amount)?;
        self.custody.accept_deposit(from, amount)?;
        self.books = books;
        Ok(())
    }

    /// Issue payout legs in order. Nothing is written to the deal here.
    fn pay_out(&mut self, deal_id: DealId, legs: &[Payout]) -> Result<()> {
        let total = Payout::total(legs)?;
        let held = self.custody.held();
        if total > held {
            tracing::error!(deal = %deal_id, total, held, "custody cannot cover payout");
            return Err(OtcError::CustodyInvariantViolation {
                reason: format!("{deal_id} pays out {total} but custody holds {held}"),
            });
        }

        let mut books = self.books.clone();
        for leg in legs {
            books.record_payout(leg.amount)?;
        }

        for (i, leg) in legs.iter().enumerate() {
            if let Err(err) = self.custody.transfer(&leg.to, leg.amount) {
                tracing::error!(deal = %deal_id, to = %leg.to, amount = leg.amount, error = %err, "payout leg failed");
                self.reclaim_legs(deal_id, &legs[..i])?;
                return Err(match err {
                    err @ OtcError::TransferFailed { .. } => err,
                    other => OtcError::TransferFailed {
                        to: leg.to.clone(),
                        amount: leg.amount,
                        reason: other.to_string(),
                    },
                });
            }
        }

        self.books = books;
        Ok(())
    }

    /// Reverse already-issued legs, newest first.
    fn reclaim_legs(&mut self, deal_id: DealId, issued: &[Payout]) -> Result<()> {
        for leg in issued.iter().rev() {
            self.custody.reclaim(&leg.to, leg.amount).map_err(|err| {
                tracing::error!(deal = %deal_id, to = %leg.to, amount = leg.amount, error = %err, "payout leg could not be reclaimed");
                OtcError::CustodyInvariantViolation {
                    reason: format!(
                        "{deal_id} paid {} to {} but could not reclaim it: {err}",
                        leg.amount, leg.to
                    ),
                }
            })?;
            tracing::warn!(deal = %deal_id, to = %leg.to, amount = leg.amount, "payout leg reclaimed");
        }
        Ok(())
    }

    fn emit(&mut self, kind: EventKind, at: BlockHeight) {
        self.notifier.notify(&DealEvent::new(kind, at));
    }
}
