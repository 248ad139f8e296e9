//! Configuration for an OTCDesk engine instance.

use serde::{Deserialize, Serialize};

use crate::{OtcError, Result, constants};

/// Who may settle a `Taken` deal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementAuthority {
    /// Any verified caller may trigger settlement.
    #[default]
    AnyVerified,
    /// Only the deal's assigned attestor may trigger settlement.
    AttestorOnly,
}

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of deals the registry accepts.
    pub registry_capacity: usize,
    /// Maximum byte length of `deal_type` and `opportunity_name`.
    pub max_label_bytes: usize,
    /// Settlement authorization policy.
    pub settlement_authority: SettlementAuthority,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry_capacity: constants::DEFAULT_REGISTRY_CAPACITY,
            max_label_bytes: constants::DEFAULT_MAX_LABEL_BYTES,
            settlement_authority: SettlementAuthority::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON config document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| OtcError::Configuration(format!("invalid engine config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values no engine can run with.
    pub fn validate(&self) -> Result<()> {
        if self.registry_capacity == 0 {
            return Err(OtcError::Configuration(
                "registry_capacity must be > 0".to_string(),
            ));
        }
        if self.max_label_bytes == 0 {
            return Err(OtcError::Configuration(
                "max_label_bytes must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
