//! Protocol-wide constants for the OTCDesk escrow.

/// Default maximum number of deals a registry accepts.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 1_000_000;

/// Default maximum byte length of a deal type or opportunity name.
pub const DEFAULT_MAX_LABEL_BYTES: usize = 256;

/// Domain separator for identity signal hashes.
pub const SIGNAL_DOMAIN: &[u8] = b"otcdesk:signal:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name.
pub const PROTOCOL_NAME: &str = "OTCDesk";
