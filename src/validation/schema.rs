//! JSON Schema validation of whole documents
//!
//! The schema is embedded at build time and compiled once per process.
//! Schema errors come back as [`Violation`]s keyed by the JSON pointer of the
//! offending value; when integrity checks are enabled, cross-reference
//! problems the schema cannot express (dangling links, duplicate identifiers,
//! committed datatype cycles) are appended after them.

use crate::error::Result;
use crate::models::document::Document;
use crate::validation::integrity::check_document;
use crate::validation::{ValidationMode, Violation};
use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SCHEMA_SOURCE: &str = include_str!("../../schemas/hdf5-json.schema.json");

static SCHEMA: Lazy<Validator> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(SCHEMA_SOURCE).unwrap();
    Validator::new(&schema).unwrap()
});

/// The embedded schema as a JSON value
pub fn schema_document() -> Value {
    serde_json::from_str(SCHEMA_SOURCE).unwrap_or(Value::Null)
}

/// Turn a jsonschema error into a violation
fn format_validation_error(error: &jsonschema::ValidationError) -> Violation {
    let path = error.instance_path().to_string();
    let location = if path == "/" { String::new() } else { path };
    Violation::new(location, error.to_string())
}

/// Validator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ValidatorConfig {
    pub mode: ValidationMode,
    /// Also run the cross-reference checks on documents that parse
    pub check_integrity: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::Exhaustive,
            check_integrity: true,
        }
    }
}

impl ValidatorConfig {
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_integrity(mut self, enabled: bool) -> Self {
        self.check_integrity = enabled;
        self
    }
}

/// Violations found in one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub violations: Vec<Violation>,
}

impl DocumentReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Reports for every document of a batch, in input order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn is_valid(&self) -> bool {
        self.documents.iter().all(DocumentReport::is_valid)
    }

    pub fn failed(&self) -> impl Iterator<Item = &DocumentReport> {
        self.documents.iter().filter(|d| !d.is_valid())
    }

    pub fn violation_count(&self) -> usize {
        self.documents.iter().map(|d| d.violations.len()).sum()
    }
}

/// Validates documents against the embedded schema
///
/// Validation never mutates its input: running it twice on the same value
/// gives the same violations in the same order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator {
    config: ValidatorConfig,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a parsed document; an empty vector means it conforms
    pub fn validate(&self, document: &Value) -> Vec<Violation> {
        let mut violations: Vec<Violation> = match self.config.mode {
            ValidationMode::StopOnFirst => match SCHEMA.validate(document) {
                Ok(()) => Vec::new(),
                Err(error) => vec![format_validation_error(&error)],
            },
            ValidationMode::Exhaustive => SCHEMA
                .iter_errors(document)
                .map(|error| format_validation_error(&error))
                .collect(),
        };
        if self.config.mode == ValidationMode::StopOnFirst && !violations.is_empty() {
            return violations;
        }
        if self.config.check_integrity
            && let Ok(doc) = Document::from_value(document.clone())
        {
            let reported: HashSet<String> =
                violations.iter().map(|v| v.location.clone()).collect();
            let issues = check_document(&doc)
                .into_iter()
                .map(|issue| issue.to_violation())
                .filter(|v| !reported.contains(&v.location));
            match self.config.mode {
                ValidationMode::StopOnFirst => violations.extend(issues.take(1)),
                ValidationMode::Exhaustive => violations.extend(issues),
            }
        }
        debug!(violations = violations.len(), "Validated document");
        violations
    }

    /// Validate JSON text; text that does not parse is a single violation at the root
    pub fn validate_str(&self, content: &str) -> Vec<Violation> {
        match serde_json::from_str::<Value>(content) {
            Ok(value) => self.validate(&value),
            Err(e) => vec![Violation::new("", format!("Failed to parse JSON: {}", e))],
        }
    }

    /// Validate one file, or every `*.json` file directly inside a folder
    pub fn validate_path(&self, path: &Path) -> Result<BatchReport> {
        let paths = if path.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };
        Ok(self.validate_batch(&paths))
    }

    /// Validate each file independently; one bad document does not stop the rest
    pub fn validate_batch(&self, paths: &[PathBuf]) -> BatchReport {
        info!(documents = paths.len(), "Validating batch");
        #[cfg(feature = "parallel")]
        let documents = {
            use rayon::prelude::*;
            paths.par_iter().map(|p| self.validate_file(p)).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let documents = paths.iter().map(|p| self.validate_file(p)).collect();
        BatchReport { documents }
    }

    /// A file that cannot be read as UTF-8 text is reported as a root violation
    fn validate_file(&self, path: &Path) -> DocumentReport {
        let violations = match fs::read_to_string(path) {
            Ok(content) => self.validate_str(&content),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read document");
                vec![Violation::new("", format!("Failed to read file: {}", e))]
            }
        };
        DocumentReport {
            path: path.to_path_buf(),
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ROOT: &str = "00000000-0000-4000-8000-000000000001";

    fn minimal() -> Value {
        json!({
            "apiVersion": "1.1.1",
            "root": ROOT,
            "groups": {ROOT: {"alias": ["/"]}}
        })
    }

    #[test]
    fn test_schema_compiles() {
        assert!(schema_document().is_object());
        assert!(SchemaValidator::new().validate(&minimal()).is_empty());
    }

    #[test]
    fn test_missing_root_reported_at_root() {
        let violations = SchemaValidator::new().validate(&json!({"apiVersion": "1.1.1", "groups": {}}));
        assert!(!violations.is_empty());
        assert_eq!(violations[0].display_location(), "root");
    }

    #[test]
    fn test_unparseable_text() {
        let violations = SchemaValidator::new().validate_str("{not json");
        assert_eq!(violations.len(), 1);
        assert!(violations[0].rule.starts_with("Failed to parse JSON"));
    }

    #[test]
    fn test_integrity_can_be_disabled() {
        let mut doc = minimal();
        doc["groups"][ROOT]["links"] = json!([{
            "class": "H5L_TYPE_HARD",
            "title": "missing",
            "collection": "groups",
            "id": "00000000-0000-4000-8000-0000000000ff"
        }]);
        assert_eq!(SchemaValidator::new().validate(&doc).len(), 1);
        let schema_only = SchemaValidator::with_config(ValidatorConfig::default().with_integrity(false));
        assert!(schema_only.validate(&doc).is_empty());
    }
}
