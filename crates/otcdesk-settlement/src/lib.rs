//! # otcdesk-settlement
//!
//! **Custody Plane**: the collaborators the lifecycle engine calls into
//! once a state change is decided.
//!
//! ## Architecture
//!
//! 1. **Custody**: accepts attached deposits and pays amounts out
//!    ([`LedgerCustody`] is the in-memory ledger)
//! 2. **Payout**: ordered seller/buyer legs for settlement and refund
//! 3. **CustodyConservation**: checks custody holdings against deal books
//! 4. **EventNotifier**: best-effort notification sink ([`EventLog`],
//!    [`TracingNotifier`])

pub mod conservation;
pub mod custody;
pub mod notifier;

pub use conservation::CustodyConservation;
pub use custody::{Custody, LedgerCustody, Payout};
pub use notifier::{EventLog, EventNotifier, TracingNotifier};
