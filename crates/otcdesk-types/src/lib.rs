//! # otcdesk-types
//!
//! Shared types, errors, and configuration for the **OTCDesk** escrow protocol.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`DealId`], [`BlockHeight`], [`EventId`], [`Amount`]
//! - **Deal model**: [`Deal`], [`DealStatus`]
//! - **Identity proofs**: [`IdentityProof`], [`signal_hash`]
//! - **Events**: [`DealEvent`], [`EventKind`]
//! - **Configuration**: [`EngineConfig`], [`SettlementAuthority`]
//! - **Errors**: [`OtcError`] with `OTC_ERR_` prefix codes
//! - **Constants**: protocol-wide limits and defaults

pub mod config;
pub mod constants;
pub mod deal;
pub mod error;
pub mod event;
pub mod ids;
pub mod proof;

pub use config::*;
pub use deal::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use proof::*;

// Constants are accessed via `otcdesk_types::constants::FOO`
// (not re-exported to avoid name collisions).
