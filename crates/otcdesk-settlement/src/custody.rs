//! Custody adapter: where attached deposits are held and paid out from.
//!
//! The engine never moves value itself. It asks a [`Custody`] implementation
//! to accept attached deposits and to transfer amounts out to accounts. Each
//! call is atomic on its own: it either applies in full or changes nothing.
//!
//! A multi-leg payout is not atomic as a whole. When a later leg fails, the
//! engine calls [`Custody::reclaim`] on every leg already issued, returning
//! custody to its state before the payout.

use std::collections::HashMap;

use otcdesk_types::{AccountId, Amount, OtcError, Result};

/// Value movement primitives the engine relies on.
pub trait Custody {
    /// Take `amount` attached by `from` into custody.
    fn accept_deposit(&mut self, from: &AccountId, amount: Amount) -> Result<()>;

    /// Pay `amount` out of custody to `to`.
    ///
    /// # Errors
    /// `TransferFailed` if the transfer could not be executed.
    fn transfer(&mut self, to: &AccountId, amount: Amount) -> Result<()>;

    /// Take back `amount` just paid to `to` by [`Custody::transfer`].
    ///
    /// # Errors
    /// `TransferFailed` if the amount could not be recovered.
    fn reclaim(&mut self, to: &AccountId, amount: Amount) -> Result<()>;

    /// Total currently held in custody.
    fn held(&self) -> Amount;
}

/// One outgoing transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub to: AccountId,
    pub amount: Amount,
}

impl Payout {
    /// Build the seller leg followed by the buyer leg.
    ///
    /// Legs with no recipient or a zero amount are dropped, so the result
    /// holds between zero and two payouts.
    #[must_use]
    pub fn legs(
        seller: &AccountId,
        seller_amount: Amount,
        buyer: Option<&AccountId>,
        buyer_amount: Amount,
    ) -> Vec<Payout> {
        let mut legs = Vec::with_capacity(2);
        if seller_amount > 0 {
            legs.push(Payout {
                to: seller.clone(),
                amount: seller_amount,
            });
        }
        if let Some(buyer) = buyer {
            if buyer_amount > 0 {
                legs.push(Payout {
                    to: buyer.clone(),
                    amount: buyer_amount,
                });
            }
        }
        legs
    }

    /// Sum of all legs.
    ///
    /// # Errors
    /// `AmountOverflow` if the sum does not fit the base unit.
    pub fn total(legs: &[Payout]) -> Result<Amount> {
        legs.iter().try_fold(0u128, |acc, leg| {
            acc.checked_add(leg.amount)
                .ok_or_else(|| OtcError::AmountOverflow {
                    context: "payout total".to_string(),
                })
        })
    }
}

/// In-memory custody ledger.
///
/// Holds a single custody pool plus the balances credited to accounts by
/// payouts. Used by local deployments and tests in place of a chain.
pub struct LedgerCustody {
    /// Value currently in custody.
    pool: Amount,
    /// Per-account balances credited by payouts.
    balances: HashMap<AccountId, Amount>,
    /// Per-account totals attached as deposits.
    deposits: HashMap<AccountId, Amount>,
    /// Every executed payout in order.
    payouts: Vec<Payout>,
    /// Payouts taken back after a failed multi-leg payout.
    reclaimed: Vec<Payout>,
}

impl LedgerCustody {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: 0,
            balances: HashMap::new(),
            deposits: HashMap::new(),
            payouts: Vec::new(),
            reclaimed: Vec::new(),
        }
    }

    /// Balance credited to `account` by payouts.
    #[must_use]
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Total `account` has attached as deposits.
    #[must_use]
    pub fn deposited_by(&self, account: &AccountId) -> Amount {
        self.deposits.get(account).copied().unwrap_or(0)
    }

    /// Executed payouts, oldest first.
    #[must_use]
    pub fn payouts(&self) -> &[Payout] {
        &self.payouts
    }

    /// Payouts reversed by [`Custody::reclaim`], oldest first.
    #[must_use]
    pub fn reclaimed(&self) -> &[Payout] {
        &self.reclaimed
    }

    /// Payouts received by `account`, including reclaimed ones.
    pub fn payouts_to<'a>(&'a self, account: &'a AccountId) -> impl Iterator<Item = &'a Payout> {
        self.payouts.iter().filter(move |p| &p.to == account)
    }
}

impl Default for LedgerCustody {
    fn default() -> Self {
        Self::new()
    }
}

impl Custody for LedgerCustody {
    fn accept_deposit(&mut self, from: &AccountId, amount: Amount) -> Result<()> {
        let pool = self
            .pool
            .checked_add(amount)
            .ok_or_else(|| OtcError::AmountOverflow {
                context: format!("custody pool deposit from {from}"),
            })?;
        let deposited = self
            .deposited_by(from)
            .checked_add(amount)
            .ok_or_else(|| OtcError::AmountOverflow {
                context: format!("deposit total for {from}"),
            })?;

        self.pool = pool;
        self.deposits.insert(from.clone(), deposited);
        Ok(())
    }

    fn transfer(&mut self, to: &AccountId, amount: Amount) -> Result<()> {
        if amount > self.pool {
            return Err(OtcError::TransferFailed {
                to: to.clone(),
                amount,
                reason: format!("custody holds only {}", self.pool),
            });
        }
        let credited =
            self.balance_of(to)
                .checked_add(amount)
                .ok_or_else(|| OtcError::TransferFailed {
                    to: to.clone(),
                    amount,
                    reason: "recipient balance overflow".to_string(),
                })?;

        self.pool -= amount;
        self.balances.insert(to.clone(), credited);
        self.payouts.push(Payout {
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    fn reclaim(&mut self, to: &AccountId, amount: Amount) -> Result<()> {
        let remaining =
            self.balance_of(to)
                .checked_sub(amount)
                .ok_or_else(|| OtcError::TransferFailed {
                    to: to.clone(),
                    amount,
                    reason: format!("cannot reclaim, balance is {}", self.balance_of(to)),
                })?;
        let pool = self
            .pool
            .checked_add(amount)
            .ok_or_else(|| OtcError::AmountOverflow {
                context: format!("custody pool reclaim from {to}"),
            })?;

        self.pool = pool;
        self.balances.insert(to.clone(), remaining);
        self.reclaimed.push(Payout {
            to: to.clone(),
            amount,
        });
        Ok(())
    }

    fn held(&self) -> Amount {
        self.pool
    }
}
