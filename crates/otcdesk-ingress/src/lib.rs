//! # otcdesk-ingress
//!
//! **Security Envelope**: the identity gate every mutating call passes
//! through, and the deal registry that holds protocol state.
//!
//! ## Architecture
//!
//! 1. **IdentityGate**: verification flags per account, set by an injected
//!    [`ProofVerifier`] or granted by the host
//! 2. **DealRegistry**: append-only, index-addressed store of deals
//!
//! ```text
//! caller → IdentityGate.require_verified() → DealRegistry.get()/append()
//! ```

pub mod identity;
pub mod registry;

pub use identity::{IdentityGate, ProofVerifier, RejectUnverified, SelfAttested};
pub use registry::DealRegistry;
