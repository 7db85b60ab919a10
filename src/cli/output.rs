//! Output formatting for CLI

use crate::validation::{DocumentReport, Violation};
use std::path::Path;

/// Status line printed for each validated document
pub fn format_status(report: &DocumentReport) -> String {
    format!(
        "Validating {} ... {}",
        report.path.display(),
        if report.is_valid() { "pass" } else { "FAIL" }
    )
}

/// One line per violation, prefixed with the file it came from
pub fn format_violation(path: &Path, violation: &Violation) -> String {
    format!("{} ---> {}", path.display(), violation)
}

/// Closing summary for a batch
pub fn format_summary(documents: usize, failed: usize) -> String {
    if failed == 0 {
        format!("All {} document(s) valid", documents)
    } else {
        format!("{} of {} document(s) failed validation", failed, documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_and_violation_lines() {
        let report = DocumentReport {
            path: PathBuf::from("bad.json"),
            violations: vec![Violation::new("/userblockSize", "500 is not one of [512]")],
        };
        assert_eq!(format_status(&report), "Validating bad.json ... FAIL");
        assert_eq!(
            format_violation(&report.path, &report.violations[0]),
            "bad.json ---> at path '/userblockSize': 500 is not one of [512]"
        );
        assert_eq!(format_summary(2, 1), "1 of 2 document(s) failed validation");
    }
}
