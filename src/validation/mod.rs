//! Validation functionality
//!
//! Provides validation logic for:
//! - Schema conformance of whole documents (`schema`)
//! - Cross-reference integrity: dangling links, duplicate identifiers, committed datatype cycles (`integrity`)
//! - Syntax of identifiers, alias paths and link titles (`input`)

pub mod input;
pub mod integrity;
pub mod schema;

pub use integrity::{IntegrityIssue, check_document, check_structure};
pub use schema::{BatchReport, DocumentReport, SchemaValidator, ValidatorConfig};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One structural problem found in a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer into the document; empty for the document itself
    pub location: String,
    /// What rule was broken
    pub rule: String,
}

impl Violation {
    pub fn new(location: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            rule: rule.into(),
        }
    }

    /// Location for display; the document itself shows as `root`
    pub fn display_location(&self) -> &str {
        if self.location.is_empty() || self.location == "/" {
            "root"
        } else {
            &self.location
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at path '{}': {}", self.display_location(), self.rule)
    }
}

/// How far validation goes within one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationMode {
    /// Stop at the first violation in each document
    StopOnFirst,
    /// Collect every violation
    #[default]
    Exhaustive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_display() {
        let v = Violation::new("/userblockSize", "500 is not one of [512, 1024]");
        assert_eq!(v.to_string(), "at path '/userblockSize': 500 is not one of [512, 1024]");
        assert_eq!(Violation::new("", "bad").to_string(), "at path 'root': bad");
    }
}
