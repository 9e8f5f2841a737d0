use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::BlockHeight;

/// Gas charged by every payment broker method.
pub const DEFAULT_GAS_COST: u64 = 100;

/// Blocks a target has to redeem or dispute after the payer cancels.
pub const CANCEL_DELAY_BLOCKS: BlockHeight = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid actor configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid actor configuration: {0} must be non-zero")]
    Zero(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    pub gas_cost: u64,
    pub cancel_delay_blocks: BlockHeight,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            gas_cost: DEFAULT_GAS_COST,
            cancel_delay_blocks: CANCEL_DELAY_BLOCKS,
        }
    }
}

impl ActorConfig {
    /// Parses a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ActorConfig = serde_json::from_str(json)?;
        if config.cancel_delay_blocks == 0 {
            return Err(ConfigError::Zero("cancel_delay_blocks"));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = ActorConfig::from_json(r#"{ "gas_cost": 7 }"#).unwrap();
        assert_eq!(config.gas_cost, 7);
        assert_eq!(config.cancel_delay_blocks, CANCEL_DELAY_BLOCKS);
        assert_eq!(ActorConfig::from_json("{}").unwrap(), ActorConfig::default());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            ActorConfig::from_json(r#"{ "cancel_delay_blocks": 0 }"#),
            Err(ConfigError::Zero(_))
        ));
        assert!(matches!(
            ActorConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
