//! Encoder and decoder settings

use crate::models::document::CURRENT_API_VERSION;
use serde::{Deserialize, Serialize};

/// Which values the encoder writes out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueMode {
    /// Dataset and attribute values
    #[default]
    Full,
    /// Attribute values only; datasets keep their type and shape
    AttributeValuesOnly,
    /// No values at all
    StructureOnly,
}

impl ValueMode {
    pub fn dataset_values(&self) -> bool {
        matches!(self, ValueMode::Full)
    }

    pub fn attribute_values(&self) -> bool {
        !matches!(self, ValueMode::StructureOnly)
    }
}

/// How the encoder names objects that carry no recorded identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentifierPolicy {
    /// Fresh random identifiers on every run
    #[default]
    Random,
    /// Identifiers derived from each object's first alias, so repeated runs agree
    PathDerived,
}

/// Encoder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EncoderConfig {
    pub value_mode: ValueMode,
    pub identifier_policy: IdentifierPolicy,
    /// Reuse identifiers the store recorded from an earlier decode
    pub reuse_identifiers: bool,
    pub include_timestamps: bool,
    pub api_version: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            value_mode: ValueMode::Full,
            identifier_policy: IdentifierPolicy::Random,
            reuse_identifiers: true,
            include_timestamps: true,
            api_version: CURRENT_API_VERSION.to_string(),
        }
    }
}

impl EncoderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value_mode(mut self, mode: ValueMode) -> Self {
        self.value_mode = mode;
        self
    }

    pub fn with_identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.identifier_policy = policy;
        self
    }

    pub fn with_reuse_identifiers(mut self, reuse: bool) -> Self {
        self.reuse_identifiers = reuse;
        self
    }

    pub fn with_timestamps(mut self, include: bool) -> Self {
        self.include_timestamps = include;
        self
    }

    /// Version stamped into `apiVersion`
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }
}

/// Decoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DecoderConfig {
    /// Write dataset values and attribute values
    pub write_values: bool,
    /// Record each object's document identifier in the store
    pub record_identifiers: bool,
    /// Restore `created`/`lastModified` where the store supports it
    pub apply_timestamps: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            write_values: true,
            record_identifiers: true,
            apply_timestamps: true,
        }
    }
}

impl DecoderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(mut self, write: bool) -> Self {
        self.write_values = write;
        self
    }

    pub fn with_record_identifiers(mut self, record: bool) -> Self {
        self.record_identifiers = record;
        self
    }

    pub fn with_timestamps(mut self, apply: bool) -> Self {
        self.apply_timestamps = apply;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_mode_switches() {
        assert!(ValueMode::Full.dataset_values());
        assert!(ValueMode::AttributeValuesOnly.attribute_values());
        assert!(!ValueMode::AttributeValuesOnly.dataset_values());
        assert!(!ValueMode::StructureOnly.attribute_values());
    }

    #[test]
    fn test_encoder_config_builder() {
        let config = EncoderConfig::new()
            .with_value_mode(ValueMode::StructureOnly)
            .with_identifier_policy(IdentifierPolicy::PathDerived)
            .with_timestamps(false);
        assert_eq!(config.value_mode, ValueMode::StructureOnly);
        assert_eq!(config.identifier_policy, IdentifierPolicy::PathDerived);
        assert!(!config.include_timestamps);
        assert_eq!(config.api_version, CURRENT_API_VERSION);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: EncoderConfig =
            serde_json::from_str(r#"{"value-mode": "attribute-values-only"}"#).unwrap();
        assert_eq!(config.value_mode, ValueMode::AttributeValuesOnly);
        assert!(config.reuse_identifiers);
    }
}
