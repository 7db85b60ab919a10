//! Optional TOML configuration for the CLI
//!
//! ```toml
//! [encoder]
//! value-mode = "attribute-values-only"
//! identifier-policy = "path-derived"
//!
//! [validator]
//! mode = "stop-on-first"
//! check-integrity = false
//! ```

use crate::cli::error::CliError;
use crate::codec::EncoderConfig;
use crate::validation::ValidatorConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub encoder: EncoderConfig,
    pub validator: ValidatorConfig,
}

impl CliConfig {
    /// Load from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::FileReadError(path.to_path_buf(), e.to_string()))?;
        Self::from_toml(&content).map_err(|e| CliError::ConfigError(path.to_path_buf(), e))
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{IdentifierPolicy, ValueMode};
    use crate::validation::ValidationMode;

    #[test]
    fn test_partial_config() {
        let config = CliConfig::from_toml(
            "[encoder]\nvalue-mode = \"structure-only\"\n\n[validator]\nmode = \"stop-on-first\"\n",
        )
        .unwrap();
        assert_eq!(config.encoder.value_mode, ValueMode::StructureOnly);
        assert_eq!(config.encoder.identifier_policy, IdentifierPolicy::Random);
        assert_eq!(config.validator.mode, ValidationMode::StopOnFirst);
        assert!(config.validator.check_integrity);
    }

    #[test]
    fn test_unknown_table_rejected() {
        assert!(CliConfig::from_toml("[decoder]\nwrite-values = false\n").is_err());
    }
}
