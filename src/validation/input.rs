//! Syntax checks for identifiers, alias paths and link titles.
//!
//! These run on the raw strings of a document before anything is parsed, so
//! they take `&str` and report the first rule broken.

use crate::models::identifier::Identifier;
use thiserror::Error;

/// Maximum length accepted for a link title or attribute name
pub const MAX_NAME_LENGTH: usize = 65535;

/// Maximum length accepted for an alias path
pub const MAX_PATH_LENGTH: usize = 1 << 20;

/// Errors that can occur during input validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Input is empty when a value is required
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Input exceeds maximum allowed length
    #[error("{field} exceeds maximum length (max: {max}, got: {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Input contains invalid characters
    #[error("{field} contains invalid characters: {reason}")]
    InvalidCharacters { field: &'static str, reason: String },

    /// Input has invalid format
    #[error("{0}: {1}")]
    InvalidFormat(&'static str, String),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an object identifier.
///
/// Identifiers are lowercase hyphenated UUIDs.
///
/// # Examples
///
/// ```
/// use hdf5_json::validation::input::validate_identifier;
///
/// assert!(validate_identifier("0a1b2c3d-0000-4000-8000-00000000abcd").is_ok());
/// assert!(validate_identifier("0A1B2C3D-0000-4000-8000-00000000ABCD").is_err());
/// ```
pub fn validate_identifier(id: &str) -> ValidationResult<()> {
    if id.is_empty() {
        return Err(ValidationError::Empty("identifier"));
    }
    if !Identifier::is_canonical(id) {
        return Err(ValidationError::InvalidFormat(
            "identifier",
            format!("'{}' is not a lowercase hyphenated UUID", id),
        ));
    }
    Ok(())
}

/// Validate an alias path.
///
/// # Rules
///
/// - Must start with `/`
/// - `/` alone names the root group
/// - Otherwise no segment may be empty (no `//`, no trailing `/`)
///
/// # Examples
///
/// ```
/// use hdf5_json::validation::input::validate_alias_path;
///
/// assert!(validate_alias_path("/").is_ok());
/// assert!(validate_alias_path("/g1/dset").is_ok());
/// assert!(validate_alias_path("g1").is_err());
/// assert!(validate_alias_path("/g1//dset").is_err());
/// ```
pub fn validate_alias_path(path: &str) -> ValidationResult<()> {
    if path.is_empty() {
        return Err(ValidationError::Empty("alias"));
    }
    if path.len() > MAX_PATH_LENGTH {
        return Err(ValidationError::TooLong {
            field: "alias",
            max: MAX_PATH_LENGTH,
            actual: path.len(),
        });
    }
    if !path.starts_with('/') {
        return Err(ValidationError::InvalidFormat(
            "alias",
            format!("'{}' must start with '/'", path),
        ));
    }
    if path == "/" {
        return Ok(());
    }
    if path[1..].split('/').any(str::is_empty) {
        return Err(ValidationError::InvalidFormat(
            "alias",
            format!("'{}' has an empty path segment", path),
        ));
    }
    Ok(())
}

/// Validate a link title.
///
/// Titles are non-empty and never contain `/`. Any other character,
/// including `.` and whitespace, is allowed.
pub fn validate_link_title(title: &str) -> ValidationResult<()> {
    validate_name("link title", title)?;
    if title.contains('/') {
        return Err(ValidationError::InvalidCharacters {
            field: "link title",
            reason: "'/' separates path segments".to_string(),
        });
    }
    Ok(())
}

/// Validate an attribute name.
pub fn validate_attribute_name(name: &str) -> ValidationResult<()> {
    validate_name("attribute name", name)
}

fn validate_name(field: &'static str, name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_NAME_LENGTH,
            actual: name.len(),
        });
    }
    if name.contains('\0') {
        return Err(ValidationError::InvalidCharacters {
            field,
            reason: "NUL character".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(validate_identifier("9f2a4d7e-1c3b-4e5f-8a9b-0c1d2e3f4a5b").is_ok());
        assert_eq!(validate_identifier(""), Err(ValidationError::Empty("identifier")));
        assert!(validate_identifier("9f2a4d7e1c3b4e5f8a9b0c1d2e3f4a5b").is_err());
        assert!(validate_identifier("groups/9f2a4d7e-1c3b-4e5f-8a9b-0c1d2e3f4a5b").is_err());
    }

    #[test]
    fn test_alias_rules() {
        assert!(validate_alias_path("/").is_ok());
        assert!(validate_alias_path("/a").is_ok());
        assert!(validate_alias_path("/a b/c.d").is_ok());
        assert!(validate_alias_path("").is_err());
        assert!(validate_alias_path("a/b").is_err());
        assert!(validate_alias_path("/a/").is_err());
        assert!(validate_alias_path("//").is_err());
    }

    #[test]
    fn test_link_title_rules() {
        assert!(validate_link_title("dset1").is_ok());
        assert!(validate_link_title(".").is_ok());
        assert!(matches!(
            validate_link_title("a/b"),
            Err(ValidationError::InvalidCharacters { .. })
        ));
        assert_eq!(validate_link_title(""), Err(ValidationError::Empty("link title")));
    }

    #[test]
    fn test_attribute_name_length() {
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(matches!(
            validate_attribute_name(&long),
            Err(ValidationError::TooLong { .. })
        ));
    }
}
