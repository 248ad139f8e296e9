//! Custody conservation invariant checker.
//!
//! Invariant enforced on demand after any sequence of operations:
//! ```text
//! custody.held() == Σ(deposits accepted) − Σ(payouts issued) == Σ(deal.held_amount())
//! ```
//!
//! The first equality catches a custody adapter that lost or invented value,
//! the second catches deal bookkeeping that drifted from what was locked.

use otcdesk_types::{Amount, Deal, OtcError, Result};

/// Running totals of value the engine moved into and out of custody.
#[derive(Debug, Clone, Default)]
pub struct CustodyConservation {
    /// Total deposits accepted since genesis.
    deposited: Amount,
    /// Total payouts issued since genesis.
    paid_out: Amount,
}

impl CustodyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deposit accepted into custody.
    ///
    /// # Errors
    /// `AmountOverflow` if the running total overflows.
    pub fn record_deposit(&mut self, amount: Amount) -> Result<()> {
        self.deposited =
            self.deposited
                .checked_add(amount)
                .ok_or_else(|| OtcError::AmountOverflow {
                    context: "total deposited".to_string(),
                })?;
        Ok(())
    }

    /// Record a payout issued from custody.
    ///
    /// # Errors
    /// `AmountOverflow` if the running total overflows.
    pub fn record_payout(&mut self, amount: Amount) -> Result<()> {
        self.paid_out =
            self.paid_out
                .checked_add(amount)
                .ok_or_else(|| OtcError::AmountOverflow {
                    context: "total paid out".to_string(),
                })?;
        Ok(())
    }

    /// What custody should hold: deposits − payouts.
    ///
    /// # Errors
    /// `CustodyInvariantViolation` if more was paid out than deposited.
    pub fn expected_held(&self) -> Result<Amount> {
        self.deposited
            .checked_sub(self.paid_out)
            .ok_or_else(|| OtcError::CustodyInvariantViolation {
                reason: format!(
                    "paid out {} exceeds deposited {}",
                    self.paid_out, self.deposited
                ),
            })
    }

    /// Verify custody holdings against the running totals and the deals.
    ///
    /// # Errors
    /// `CustodyInvariantViolation` if any side disagrees.
    pub fn verify<'a>(
        &self,
        custody_held: Amount,
        deals: impl IntoIterator<Item = &'a Deal>,
    ) -> Result<()> {
        let expected = self.expected_held()?;
        if custody_held != expected {
            return Err(OtcError::CustodyInvariantViolation {
                reason: format!(
                    "custody holds {custody_held} != expected {expected} \
                     (deposited={}, paid_out={})",
                    self.deposited, self.paid_out
                ),
            });
        }

        let owed = deals.into_iter().try_fold(0u128, |acc, deal| {
            acc.checked_add(deal.held_amount())
                .ok_or_else(|| OtcError::AmountOverflow {
                    context: "sum of deal holdings".to_string(),
                })
        })?;
        if owed != expected {
            return Err(OtcError::CustodyInvariantViolation {
                reason: format!("deals account for {owed} != expected {expected}"),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn total_deposited(&self) -> Amount {
        self.deposited
    }

    #[must_use]
    pub fn total_paid_out(&self) -> Amount {
        self.paid_out
    }
}
