//! Object identifiers and typed object references
//!
//! Every group, dataset and committed datatype in a document is keyed by an
//! [`Identifier`]: a lowercase hyphenated UUID string. References between
//! objects (hard links, committed datatype uses, reference values) carry the
//! identifier plus the collection it lives in, rendered as `groups/<id>`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Canonical identifier pattern accepted for collection keys and references
pub const IDENTIFIER_PATTERN: &str = r"^[a-f0-9]{8}-([a-f0-9]{4}-){3}[a-f0-9]{12}$";

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(IDENTIFIER_PATTERN).unwrap());

/// Namespace for path-derived identifiers
const IDENTIFIER_NAMESPACE: Uuid = Uuid::from_u128(0x6f1e_0f5a_2b7c_4d3e_9a41_58c0_d2e7_b913);

/// Error returned when a string is not a canonical identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a canonical identifier (expected lowercase xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx)")]
pub struct IdentifierParseError(pub String);

/// Stable identity of one object within a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Uuid);

impl Identifier {
    /// Generate a fresh random identifier
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic identifier derived from a name (an alias path or a native address)
    pub fn derived(name: &str) -> Self {
        Self(Uuid::new_v5(&IDENTIFIER_NAMESPACE, name.as_bytes()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Check whether a string matches the canonical identifier pattern
    pub fn is_canonical(s: &str) -> bool {
        IDENTIFIER_REGEX.is_match(s)
    }
}

impl From<Uuid> for Identifier {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Uuid's Display is already the lowercase hyphenated form
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !Self::is_canonical(s) {
            return Err(IdentifierParseError(s.to_string()));
        }
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| IdentifierParseError(s.to_string()))
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The three object collections of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Groups,
    Datasets,
    Datatypes,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Groups => "groups",
            Collection::Datasets => "datasets",
            Collection::Datatypes => "datatypes",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "groups" => Ok(Collection::Groups),
            "datasets" => Ok(Collection::Datasets),
            "datatypes" => Ok(Collection::Datatypes),
            _ => Err(format!("Unknown collection: {}", s)),
        }
    }
}

/// Reference to an object by collection and identifier (`datasets/<id>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub collection: Collection,
    pub id: Identifier,
}

impl ObjectRef {
    pub fn new(collection: Collection, id: Identifier) -> Self {
        Self { collection, id }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for ObjectRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (collection, id) = s
            .split_once('/')
            .ok_or_else(|| format!("'{}' is not a <collection>/<identifier> reference", s))?;
        Ok(Self {
            collection: collection.parse()?,
            id: id.parse().map_err(|e: IdentifierParseError| e.to_string())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_display_is_canonical() {
        let id = Identifier::new_v4();
        assert!(Identifier::is_canonical(&id.to_string()));
    }

    #[test]
    fn test_identifier_rejects_uppercase_and_simple_forms() {
        assert!("6A6C8F34-1F2D-4E55-9C1B-0A2B3C4D5E6F".parse::<Identifier>().is_err());
        assert!("6a6c8f341f2d4e559c1b0a2b3c4d5e6f".parse::<Identifier>().is_err());
        assert!("6a6c8f34-1f2d-4e55-9c1b-0a2b3c4d5e6f".parse::<Identifier>().is_ok());
    }

    #[test]
    fn test_derived_identifiers_are_stable() {
        assert_eq!(Identifier::derived("/g1/d1"), Identifier::derived("/g1/d1"));
        assert_ne!(Identifier::derived("/g1/d1"), Identifier::derived("/g1/d2"));
    }

    #[test]
    fn test_object_ref_round_trip() {
        let id = Identifier::new_v4();
        let reference = ObjectRef::new(Collection::Datasets, id);
        let text = reference.to_string();
        assert!(text.starts_with("datasets/"));
        assert_eq!(text.parse::<ObjectRef>().unwrap(), reference);
        assert!("tables/abc".parse::<ObjectRef>().is_err());
    }
}
