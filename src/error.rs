//! Error taxonomy for encode and decode passes

use crate::models::identifier::{Collection, Identifier};
use crate::store::StoreError;
use crate::validation::Violation;

/// Result type used across the codec
pub type Result<T> = std::result::Result<T, Hdf5JsonError>;

/// Errors raised while translating between native objects and documents
///
/// Structural variants carry a JSON-pointer location into the document
/// (`/datasets/<id>/type/fields/0/type`).
#[derive(Debug, thiserror::Error)]
pub enum Hdf5JsonError {
    /// A datatype object mixes variant fields, omits a required one, or breaks a datatype invariant
    #[error("Malformed datatype at '{location}': {reason}")]
    MalformedDatatype { location: String, reason: String },

    /// A shape or selection breaks the dataspace invariants
    #[error("Malformed dataspace at '{location}': {reason}")]
    MalformedDataspace { location: String, reason: String },

    /// A literal value does not fit its datatype or dataspace
    #[error("Malformed value at '{location}': {reason}")]
    MalformedValue { location: String, reason: String },

    /// A link, datatype or reference value names an identifier absent from the document
    #[error("Unresolved identifier reference at '{location}': {reference}")]
    UnresolvedIdentifierReference { location: String, reference: String },

    /// Committed datatype creation stopped making progress
    #[error("Unresolved committed datatype references, no progress for: {}", format_identifiers(.0))]
    UnresolvedDatatypeReference(Vec<Identifier>),

    /// The same identifier is a key in more than one collection
    #[error("Duplicate identifier {identifier} in both {first} and {second}")]
    DuplicateIdentifier {
        identifier: String,
        first: Collection,
        second: Collection,
    },

    /// Structural non-conformance
    #[error("Schema violation: {0}")]
    SchemaViolation(Violation),

    /// The native store rejected a call
    #[error("Native store error: {0}")]
    NativeStore(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Hdf5JsonError {
    pub(crate) fn datatype(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDatatype {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn dataspace(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDataspace {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn value(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedValue {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolved(location: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::UnresolvedIdentifierReference {
            location: location.into(),
            reference: reference.into(),
        }
    }
}

fn format_identifiers(ids: &[Identifier]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
