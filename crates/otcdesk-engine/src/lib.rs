//! # otcdesk-engine
//!
//! Lifecycle engine for **otcdesk**, an escrow-based OTC deal desk between
//! identity-verified parties.
//!
//! - [`DealEngine`]: owns the identity gate, the deal registry, a custody
//!   adapter and an event notifier, and runs every deal operation
//! - [`CallContext`]: caller, attached value and block height for one call
//!
//! ## Deal Lifecycle
//!
//! ```text
//!   post_offer        take_offer          settle_trade
//! ────────────▶ OPEN ────────────▶ TAKEN ──────────────▶ SETTLED
//!                 │                  │
//!                 │   refund         │   refund
//!                 │ (height > expiry)│ (height > expiry)
//!                 └────────▶ REFUNDED ◀┘
//! ```
//!
//! `swap_attestor` (seller) and `extend_expiry` (attestor) touch a deal's
//! roles and timing without changing its status.

pub mod context;
pub mod engine;

pub use context::CallContext;
pub use engine::DealEngine;
