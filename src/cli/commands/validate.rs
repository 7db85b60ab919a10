//! Validate command implementation

use crate::cli::error::CliError;
use crate::cli::output::{format_status, format_summary, format_violation};
use crate::validation::{BatchReport, SchemaValidator, ValidatorConfig};
use std::path::PathBuf;

/// Validate every path (file or folder of `*.json`), printing as it goes
///
/// Returns `true` when every document is valid.
pub fn handle_validate(paths: &[PathBuf], config: ValidatorConfig) -> Result<bool, CliError> {
    if paths.is_empty() {
        return Err(CliError::InvalidArgument(
            "at least one file or folder is required".to_string(),
        ));
    }
    let validator = SchemaValidator::with_config(config);
    let mut all = BatchReport::default();
    for path in paths {
        if !path.exists() {
            return Err(CliError::FileReadError(path.clone(), "no such file or folder".to_string()));
        }
        let report = validator.validate_path(path)?;
        for document in &report.documents {
            println!("{}", format_status(document));
            for violation in &document.violations {
                eprintln!("{}", format_violation(&document.path, violation));
            }
        }
        all.documents.extend(report.documents);
    }
    println!("{}", format_summary(all.documents.len(), all.failed().count()));
    Ok(all.is_valid())
}
