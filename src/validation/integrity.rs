//! Cross-reference integrity checks
//!
//! Checks what a JSON Schema cannot express: that identifiers are unique
//! across collections, that hard links and committed datatype references
//! resolve, that link titles are unique per group, and that committed
//! datatypes do not depend on each other in a cycle.
//!
//! The checks run over the wire form, so they work on documents whose
//! datatypes and values have not been parsed yet.

use crate::error::Hdf5JsonError;
use crate::models::document::{AttributeEntry, Document, SUPPORTED_API_VERSIONS};
use crate::models::identifier::{Collection, Identifier};
use crate::models::link::{
    Link, USER_DEFINED_LINK_CLASS_MAX, USER_DEFINED_LINK_CLASS_MIN, is_user_defined_link_class,
};
use crate::validation::Violation;
use crate::validation::input::{
    validate_alias_path, validate_attribute_name, validate_identifier, validate_link_title,
};
use petgraph::algo::tarjan_scc;
use petgraph::{Directed, Graph};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Prefix of a committed datatype reference inside a type
const COMMITTED_PREFIX: &str = "datatypes/";

/// One integrity problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    UnsupportedApiVersion { version: String },
    UserblockWithoutSize,
    UserblockTooLarge { length: usize, size: u64 },
    MalformedKey { collection: Collection, key: String, reason: String },
    DuplicateIdentifier { identifier: String, first: Collection, second: Collection },
    MissingRoot { root: String },
    InvalidAlias { location: String, reason: String },
    InvalidLinkTitle { location: String, reason: String },
    DuplicateLinkTitle { location: String, title: String },
    InvalidLinkClass { location: String, link_class: u32 },
    DanglingLink { location: String, reference: String },
    DanglingDatatype { location: String, reference: String },
    InvalidAttributeName { location: String, reason: String },
    DuplicateAttributeName { location: String, name: String },
    DatatypeCycle { cycle: Vec<Identifier> },
}

impl IntegrityIssue {
    /// JSON pointer of the offending value
    pub fn location(&self) -> String {
        match self {
            IntegrityIssue::UnsupportedApiVersion { .. } => "/apiVersion".to_string(),
            IntegrityIssue::UserblockWithoutSize | IntegrityIssue::UserblockTooLarge { .. } => {
                "/userblock".to_string()
            }
            IntegrityIssue::MalformedKey { collection, key, .. } => {
                format!("/{}/{}", collection, key)
            }
            IntegrityIssue::DuplicateIdentifier {
                identifier, second, ..
            } => format!("/{}/{}", second, identifier),
            IntegrityIssue::MissingRoot { .. } => "/root".to_string(),
            IntegrityIssue::InvalidAlias { location, .. }
            | IntegrityIssue::InvalidLinkTitle { location, .. }
            | IntegrityIssue::DuplicateLinkTitle { location, .. }
            | IntegrityIssue::InvalidLinkClass { location, .. }
            | IntegrityIssue::DanglingLink { location, .. }
            | IntegrityIssue::DanglingDatatype { location, .. }
            | IntegrityIssue::InvalidAttributeName { location, .. }
            | IntegrityIssue::DuplicateAttributeName { location, .. } => location.clone(),
            IntegrityIssue::DatatypeCycle { cycle } => cycle
                .first()
                .map(|id| format!("/datatypes/{}", id))
                .unwrap_or_else(|| "/datatypes".to_string()),
        }
    }

    /// Human readable rule description
    pub fn rule(&self) -> String {
        match self {
            IntegrityIssue::UnsupportedApiVersion { version } => format!(
                "apiVersion '{}' is not one of {}",
                version,
                SUPPORTED_API_VERSIONS.join(", ")
            ),
            IntegrityIssue::UserblockWithoutSize => {
                "userblock is only allowed together with userblockSize".to_string()
            }
            IntegrityIssue::UserblockTooLarge { length, size } => {
                format!("userblock of {} bytes exceeds userblockSize {}", length, size)
            }
            IntegrityIssue::MalformedKey { reason, .. } => reason.clone(),
            IntegrityIssue::DuplicateIdentifier {
                identifier,
                first,
                second,
            } => format!("identifier {} appears in both {} and {}", identifier, first, second),
            IntegrityIssue::MissingRoot { root } => format!("root group {} is not in groups", root),
            IntegrityIssue::InvalidAlias { reason, .. }
            | IntegrityIssue::InvalidLinkTitle { reason, .. }
            | IntegrityIssue::InvalidAttributeName { reason, .. } => reason.clone(),
            IntegrityIssue::DuplicateLinkTitle { title, .. } => {
                format!("link title '{}' is used more than once in this group", title)
            }
            IntegrityIssue::InvalidLinkClass { link_class, .. } => {
                format!(
                    "user-defined link class {} is outside {}..={}",
                    link_class, USER_DEFINED_LINK_CLASS_MIN, USER_DEFINED_LINK_CLASS_MAX
                )
            }
            IntegrityIssue::DanglingLink { reference, .. } => {
                format!("hard link target {} is not in the document", reference)
            }
            IntegrityIssue::DanglingDatatype { reference, .. } => {
                format!("committed datatype {} is not in the document", reference)
            }
            IntegrityIssue::DuplicateAttributeName { name, .. } => {
                format!("attribute name '{}' is used more than once", name)
            }
            IntegrityIssue::DatatypeCycle { cycle } => format!(
                "committed datatypes depend on each other in a cycle: {}",
                cycle
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            ),
        }
    }

    pub fn to_violation(&self) -> Violation {
        Violation::new(self.location(), self.rule())
    }

    /// The codec error this issue aborts a decode with
    pub fn into_error(self) -> Hdf5JsonError {
        match self {
            IntegrityIssue::DuplicateIdentifier {
                identifier,
                first,
                second,
            } => Hdf5JsonError::DuplicateIdentifier {
                identifier,
                first,
                second,
            },
            IntegrityIssue::MissingRoot { root } => Hdf5JsonError::unresolved("/root", root),
            IntegrityIssue::DanglingLink { location, reference }
            | IntegrityIssue::DanglingDatatype { location, reference } => {
                Hdf5JsonError::unresolved(location, reference)
            }
            IntegrityIssue::DatatypeCycle { cycle } => Hdf5JsonError::UnresolvedDatatypeReference(cycle),
            other => Hdf5JsonError::SchemaViolation(other.to_violation()),
        }
    }
}

/// Every integrity issue except committed datatype cycles
pub fn check_structure(doc: &Document) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();

    if !SUPPORTED_API_VERSIONS.contains(&doc.api_version.as_str()) {
        issues.push(IntegrityIssue::UnsupportedApiVersion {
            version: doc.api_version.clone(),
        });
    }
    match (&doc.userblock, doc.userblock_size) {
        (Some(_), None) => issues.push(IntegrityIssue::UserblockWithoutSize),
        (Some(block), Some(size)) if block.len() as u64 > size => {
            issues.push(IntegrityIssue::UserblockTooLarge {
                length: block.len(),
                size,
            })
        }
        _ => {}
    }

    // Keys and uniqueness across collections
    let mut seen: HashMap<&str, Collection> = HashMap::new();
    let keys = doc
        .groups
        .keys()
        .map(|k| (Collection::Groups, k))
        .chain(doc.datasets.keys().map(|k| (Collection::Datasets, k)))
        .chain(doc.datatypes.keys().map(|k| (Collection::Datatypes, k)));
    for (collection, key) in keys {
        if let Err(e) = validate_identifier(key) {
            issues.push(IntegrityIssue::MalformedKey {
                collection,
                key: key.clone(),
                reason: e.to_string(),
            });
            continue;
        }
        if let Some(first) = seen.get(key.as_str()) {
            issues.push(IntegrityIssue::DuplicateIdentifier {
                identifier: key.clone(),
                first: *first,
                second: collection,
            });
        } else {
            seen.insert(key, collection);
        }
    }

    if !doc.groups.contains_key(&doc.root) {
        issues.push(IntegrityIssue::MissingRoot {
            root: doc.root.clone(),
        });
    }

    for (collection, key, aliases, attributes) in objects(doc) {
        let location = format!("/{}/{}", collection, key);
        for (i, alias) in aliases.iter().enumerate() {
            if let Err(e) = validate_alias_path(alias) {
                issues.push(IntegrityIssue::InvalidAlias {
                    location: format!("{}/alias/{}", location, i),
                    reason: e.to_string(),
                });
            }
        }
        check_attributes(attributes, &location, doc, &mut issues);
    }

    for (key, group) in &doc.groups {
        let location = format!("/groups/{}", key);
        let mut titles = HashSet::new();
        for (i, link) in group.links.iter().enumerate() {
            let link_location = format!("{}/links/{}", location, i);
            if let Err(e) = validate_link_title(link.title()) {
                issues.push(IntegrityIssue::InvalidLinkTitle {
                    location: format!("{}/title", link_location),
                    reason: e.to_string(),
                });
            } else if !titles.insert(link.title()) {
                issues.push(IntegrityIssue::DuplicateLinkTitle {
                    location: format!("{}/title", link_location),
                    title: link.title().to_string(),
                });
            }
            if let Link::UserDefined { link_class, .. } = link
                && !is_user_defined_link_class(*link_class)
            {
                issues.push(IntegrityIssue::InvalidLinkClass {
                    location: format!("{}/linkClass", link_location),
                    link_class: *link_class,
                });
            }
            if let Link::Hard { collection, id, .. } = link
                && !contains(doc, *collection, id)
            {
                issues.push(IntegrityIssue::DanglingLink {
                    location: format!("{}/id", link_location),
                    reference: format!("{}/{}", collection, id),
                });
            }
        }
    }

    for (key, dataset) in &doc.datasets {
        let location = format!("/datasets/{}/type", key);
        check_type_references(&dataset.datatype, &location, doc, &mut issues);
    }
    for (key, datatype) in &doc.datatypes {
        let location = format!("/datatypes/{}/type", key);
        check_type_references(&datatype.datatype, &location, doc, &mut issues);
    }

    issues
}

/// Every integrity issue, committed datatype cycles included
pub fn check_document(doc: &Document) -> Vec<IntegrityIssue> {
    let mut issues = check_structure(doc);
    issues.extend(datatype_cycles(doc));
    issues
}

type ObjectView<'a> = (Collection, &'a String, &'a [String], &'a [AttributeEntry]);

fn objects(doc: &Document) -> impl Iterator<Item = ObjectView<'_>> {
    let groups = doc.groups.iter().map(|(k, e)| {
        (Collection::Groups, k, e.alias.as_slice(), e.attributes.as_slice())
    });
    let datasets = doc.datasets.iter().map(|(k, e)| {
        (Collection::Datasets, k, e.alias.as_slice(), e.attributes.as_slice())
    });
    let datatypes = doc.datatypes.iter().map(|(k, e)| {
        (Collection::Datatypes, k, e.alias.as_slice(), e.attributes.as_slice())
    });
    groups.chain(datasets).chain(datatypes)
}

fn contains(doc: &Document, collection: Collection, key: &str) -> bool {
    match collection {
        Collection::Groups => doc.groups.contains_key(key),
        Collection::Datasets => doc.datasets.contains_key(key),
        Collection::Datatypes => doc.datatypes.contains_key(key),
    }
}

fn check_attributes(
    attributes: &[AttributeEntry],
    location: &str,
    doc: &Document,
    issues: &mut Vec<IntegrityIssue>,
) {
    let mut names = HashSet::new();
    for (i, attribute) in attributes.iter().enumerate() {
        let attr_location = format!("{}/attributes/{}", location, i);
        if let Err(e) = validate_attribute_name(&attribute.name) {
            issues.push(IntegrityIssue::InvalidAttributeName {
                location: format!("{}/name", attr_location),
                reason: e.to_string(),
            });
        } else if !names.insert(attribute.name.as_str()) {
            issues.push(IntegrityIssue::DuplicateAttributeName {
                location: format!("{}/name", attr_location),
                name: attribute.name.clone(),
            });
        }
        check_type_references(
            &attribute.datatype,
            &format!("{}/type", attr_location),
            doc,
            issues,
        );
    }
}

/// Committed datatype references inside a raw type, with their locations
fn type_references(value: &Value, location: &str, out: &mut Vec<(String, String)>) {
    match value {
        Value::String(s) => {
            if let Some(id) = s.strip_prefix(COMMITTED_PREFIX) {
                out.push((location.to_string(), id.to_string()));
            }
        }
        Value::Object(obj) => {
            if let Some(base) = obj.get("base") {
                type_references(base, &format!("{}/base", location), out);
            }
            if let Some(Value::Array(fields)) = obj.get("fields") {
                for (i, field) in fields.iter().enumerate() {
                    if let Some(field_type) = field.get("type") {
                        type_references(field_type, &format!("{}/fields/{}/type", location, i), out);
                    }
                }
            }
        }
        _ => {}
    }
}

fn check_type_references(
    value: &Value,
    location: &str,
    doc: &Document,
    issues: &mut Vec<IntegrityIssue>,
) {
    let mut refs = Vec::new();
    type_references(value, location, &mut refs);
    for (ref_location, id) in refs {
        if !doc.datatypes.contains_key(&id) {
            issues.push(IntegrityIssue::DanglingDatatype {
                location: ref_location,
                reference: format!("{}{}", COMMITTED_PREFIX, id),
            });
        }
    }
}

/// Cycles among committed datatypes, one issue per strongly connected component
fn datatype_cycles(doc: &Document) -> Vec<IntegrityIssue> {
    let mut graph = Graph::<Identifier, (), Directed>::new();
    let mut node_map = HashMap::new();

    for key in doc.datatypes.keys() {
        if let Ok(id) = key.parse::<Identifier>() {
            node_map.insert(key.as_str(), graph.add_node(id));
        }
    }
    for (key, entry) in &doc.datatypes {
        let Some(&from) = node_map.get(key.as_str()) else {
            continue;
        };
        let mut refs = Vec::new();
        type_references(&entry.datatype, "", &mut refs);
        for (_, target) in refs {
            if let Some(&to) = node_map.get(target.as_str()) {
                graph.update_edge(from, to, ());
            }
        }
    }

    let mut issues = Vec::new();
    for component in tarjan_scc(&graph) {
        let is_cycle = component.len() > 1
            || component
                .first()
                .is_some_and(|&n| graph.find_edge(n, n).is_some());
        if is_cycle {
            let mut cycle: Vec<Identifier> = component.iter().map(|&n| graph[n]).collect();
            cycle.sort_by_key(|id| doc.datatypes.get_index_of(&id.to_string()));
            issues.push(IntegrityIssue::DatatypeCycle { cycle });
        }
    }
    issues.sort_by_key(|issue| issue.location());
    issues
}
