//! Native store to document
//!
//! Aliases come from a first walk over hard links only: every path from the
//! root to an object is recorded, and a group already on the current path
//! is not entered again, so hard link cycles terminate.
//!
//! The encoder then walks the store breadth-first from the root group. Every
//! native address gets exactly one identifier, assigned the first time the
//! address is seen, whether that is through a hard link, a committed
//! datatype use or a reference value. Shared objects are written once.

use crate::codec::config::{EncoderConfig, IdentifierPolicy};
use crate::error::{Hdf5JsonError, Result};
use crate::models::dataspace::Dataspace;
use crate::models::datatype::Datatype;
use crate::models::document::{Document, SUPPORTED_API_VERSIONS};
use crate::models::graph::{
    Attribute, CommittedDatatype, Dataset, Group, Hdf5Object, ObjectBody, ObjectGraph, Timestamps,
};
use crate::models::identifier::{Collection, Identifier, ObjectRef};
use crate::models::link::Link;
use crate::models::value::DataValue;
use crate::store::{NativeAttribute, NativeKind, NativeSource, ObjectAddr, StoreError};
use crate::validation::integrity::IntegrityIssue;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Encodes an open native store into a document
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    config: EncoderConfig,
}

impl Encoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode the whole store reachable from its root group
    pub fn encode<S: NativeSource + ?Sized>(&self, source: &S) -> Result<Document> {
        self.encode_graph(source)?.to_document()
    }

    /// Build the object graph without serializing it
    pub fn encode_graph<S: NativeSource + ?Sized>(&self, source: &S) -> Result<ObjectGraph> {
        if !SUPPORTED_API_VERSIONS.contains(&self.config.api_version.as_str()) {
            let issue = IntegrityIssue::UnsupportedApiVersion {
                version: self.config.api_version.clone(),
            };
            return Err(Hdf5JsonError::SchemaViolation(issue.to_violation()));
        }
        let mut pass = EncodePass::new(source, &self.config);
        let graph = pass.run()?;
        info!(
            objects = graph.len(),
            groups = graph.count(Collection::Groups),
            datasets = graph.count(Collection::Datasets),
            datatypes = graph.count(Collection::Datatypes),
            "Encoded native store"
        );
        Ok(graph)
    }
}

fn collection_of(kind: NativeKind) -> Collection {
    match kind {
        NativeKind::Group => Collection::Groups,
        NativeKind::Dataset => Collection::Datasets,
        NativeKind::Datatype => Collection::Datatypes,
    }
}

/// Path of a link below a group reached at `parent`
fn child_path(parent: &str, title: &str) -> String {
    if parent == "/" {
        format!("/{}", title)
    } else {
        format!("{}/{}", parent, title)
    }
}

/// State of one encode pass
struct EncodePass<'a, S: NativeSource + ?Sized> {
    source: &'a S,
    config: &'a EncoderConfig,
    refs: HashMap<ObjectAddr, ObjectRef>,
    used: HashSet<Identifier>,
    aliases: HashMap<ObjectAddr, Vec<String>>,
    queue: VecDeque<ObjectAddr>,
}

impl<'a, S: NativeSource + ?Sized> EncodePass<'a, S> {
    fn new(source: &'a S, config: &'a EncoderConfig) -> Self {
        Self {
            source,
            config,
            refs: HashMap::new(),
            used: HashSet::new(),
            aliases: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    fn run(&mut self) -> Result<ObjectGraph> {
        let mut file = self.source.file_info()?;
        if !self.config.include_timestamps {
            file.timestamps = Timestamps::default();
        }
        if !self.config.reuse_identifiers {
            file.id = None;
        }
        let root = self.source.root()?;
        if self.source.object_kind(root)? != NativeKind::Group {
            return Err(StoreError::NotAGroup(root).into());
        }
        self.collect_aliases(root)?;
        let root_id = self.identify(root, Collection::Groups)?;

        let mut graph = ObjectGraph::new(root_id, file);
        graph.api_version = self.config.api_version.clone();

        while let Some(addr) = self.queue.pop_front() {
            let object = self.encode_object(addr)?;
            debug!(id = %object.id, collection = %object.collection(), addr = %addr, "Encoded object");
            graph.insert(object)?;
        }

        for (addr, aliases) in self.aliases.drain() {
            if let Some(reference) = self.refs.get(&addr)
                && let Some(object) = graph.get_mut(&reference.id)
            {
                object.alias = aliases;
            }
        }
        Ok(graph)
    }

    /// Identifier for `addr`, assigning one and queueing the object on first sight
    fn identify(&mut self, addr: ObjectAddr, collection: Collection) -> Result<Identifier> {
        if let Some(reference) = self.refs.get(&addr) {
            if reference.collection != collection {
                return Err(StoreError::InvalidOperation(format!(
                    "object {} is a member of {} but was referenced as {}",
                    addr, reference.collection, collection
                ))
                .into());
            }
            return Ok(reference.id);
        }

        let persistent = if self.config.reuse_identifiers {
            self.source.persistent_identifier(addr)?
        } else {
            None
        };
        let id = match (persistent, self.config.identifier_policy) {
            (Some(id), _) => id,
            (None, IdentifierPolicy::Random) => Identifier::new_v4(),
            (None, IdentifierPolicy::PathDerived) => match self.primary_alias(addr) {
                Some(alias) => Identifier::derived(alias),
                None => Identifier::derived(&format!("{}@{}", collection, addr)),
            },
        };
        if !self.used.insert(id) {
            let first = self
                .refs
                .values()
                .find(|r| r.id == id)
                .map(|r| r.collection)
                .unwrap_or(collection);
            return Err(Hdf5JsonError::DuplicateIdentifier {
                identifier: id.to_string(),
                first,
                second: collection,
            });
        }
        self.refs.insert(addr, ObjectRef::new(collection, id));
        self.queue.push_back(addr);
        Ok(id)
    }

    /// Identifier for an object found through a type or value
    fn reference(&mut self, addr: ObjectAddr) -> Result<ObjectRef> {
        let collection = match self.refs.get(&addr) {
            Some(reference) => reference.collection,
            None => collection_of(self.source.object_kind(addr)?),
        };
        let id = self.identify(addr, collection)?;
        Ok(ObjectRef::new(collection, id))
    }

    /// Record every hard link path from the root, breadth-first
    fn collect_aliases(&mut self, root: ObjectAddr) -> Result<()> {
        self.add_alias(root, "/".to_string());
        let mut pending = VecDeque::from([(root, "/".to_string(), vec![root])]);
        while let Some((group, path, ancestors)) = pending.pop_front() {
            for link in self.source.group_links(group)? {
                let Some((collection, target)) = link.target() else {
                    continue;
                };
                let target = *target;
                let child = child_path(&path, link.title());
                self.add_alias(target, child.clone());
                if collection == Collection::Groups
                    && !ancestors.contains(&target)
                    && self.source.object_kind(target)? == NativeKind::Group
                {
                    let mut chain = ancestors.clone();
                    chain.push(target);
                    pending.push_back((target, child, chain));
                }
            }
        }
        debug!(objects = self.aliases.len(), "Collected alias paths");
        Ok(())
    }

    fn primary_alias(&self, addr: ObjectAddr) -> Option<&str> {
        self.aliases
            .get(&addr)
            .and_then(|a| a.first())
            .map(String::as_str)
    }

    fn add_alias(&mut self, addr: ObjectAddr, path: String) {
        let aliases = self.aliases.entry(addr).or_default();
        if !aliases.contains(&path) {
            aliases.push(path);
        }
    }

    fn encode_object(&mut self, addr: ObjectAddr) -> Result<Hdf5Object> {
        let reference = self
            .refs
            .get(&addr)
            .copied()
            .ok_or(StoreError::ObjectNotFound(addr))?;

        let body = match reference.collection {
            Collection::Groups => ObjectBody::Group(self.encode_group(addr)?),
            Collection::Datasets => ObjectBody::Dataset(self.encode_dataset(addr)?),
            Collection::Datatypes => {
                let datatype = self.source.committed_datatype(addr)?;
                ObjectBody::Datatype(CommittedDatatype {
                    datatype: self.datatype(&datatype)?,
                })
            }
        };

        let attributes = self
            .source
            .attributes(addr)?
            .iter()
            .map(|a| self.attribute(a))
            .collect::<Result<Vec<_>>>()?;

        let mut object = Hdf5Object::new(reference.id, body);
        object.attributes = attributes;
        if self.config.include_timestamps {
            object.timestamps = self.source.timestamps(addr)?;
        }
        Ok(object)
    }

    fn encode_group(&mut self, addr: ObjectAddr) -> Result<Group> {
        let native_links = self.source.group_links(addr)?;
        let mut links = Vec::with_capacity(native_links.len());
        for link in &native_links {
            let mapped: Link = link.try_map_target(|collection, target| -> Result<Identifier> {
                let kind = self.source.object_kind(*target)?;
                if collection_of(kind) != collection {
                    return Err(Hdf5JsonError::from(StoreError::InvalidOperation(format!(
                        "hard link '{}' names {} as a member of {}",
                        link.title(),
                        target,
                        collection
                    ))));
                }
                self.identify(*target, collection)
            })?;
            links.push(mapped);
        }
        Ok(Group {
            links,
            properties: self.source.group_properties(addr)?,
        })
    }

    fn encode_dataset(&mut self, addr: ObjectAddr) -> Result<Dataset> {
        let native = self.source.dataset(addr)?;
        let datatype = self.datatype(&native.datatype)?;
        let value = if self.config.value_mode.dataset_values()
            && !matches!(native.dataspace, Dataspace::Null)
        {
            match self.source.read_dataset_value(addr)? {
                Some(value) => Some(self.value(&value)?),
                None => {
                    warn!(addr = %addr, "Dataset has no stored value");
                    None
                }
            }
        } else {
            None
        };
        let fill_value = native
            .fill_value
            .as_ref()
            .map(|v| self.value(v))
            .transpose()?;
        Ok(Dataset {
            datatype,
            shape: native.dataspace,
            value,
            fill_value,
            properties: native.properties,
        })
    }

    fn attribute(&mut self, attribute: &NativeAttribute) -> Result<Attribute> {
        let value = match &attribute.value {
            Some(v)
                if self.config.value_mode.attribute_values()
                    && !matches!(attribute.dataspace, Dataspace::Null) =>
            {
                Some(self.value(v)?)
            }
            _ => None,
        };
        Ok(Attribute {
            name: attribute.name.clone(),
            datatype: self.datatype(&attribute.datatype)?,
            shape: attribute.dataspace.clone(),
            value,
            properties: attribute.properties,
        })
    }

    fn datatype(&mut self, datatype: &Datatype<ObjectAddr>) -> Result<Datatype> {
        datatype.try_map_committed(&mut |addr: &ObjectAddr| {
            self.identify(*addr, Collection::Datatypes)
        })
    }

    fn value(&mut self, value: &DataValue<ObjectAddr>) -> Result<DataValue<ObjectRef>> {
        value.try_map_refs(&mut |addr: &ObjectAddr| self.reference(*addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::graph::FileInfo;
    use crate::models::properties::GroupCreationProperties;
    use crate::store::{MemoryStore, NativeSink};

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("/", "a"), "/a");
        assert_eq!(child_path("/a", "b"), "/a/b");
    }

    #[test]
    fn test_empty_file_has_root_alias() {
        let mut store = MemoryStore::new();
        store
            .create_file(&FileInfo::default(), &GroupCreationProperties::default())
            .unwrap();
        let graph = Encoder::default().encode_graph(&store).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get(&graph.root).unwrap().alias, vec!["/".to_string()]);
    }

    #[test]
    fn test_unsupported_api_version_rejected() {
        let mut store = MemoryStore::new();
        store
            .create_file(&FileInfo::default(), &GroupCreationProperties::default())
            .unwrap();
        let encoder = Encoder::new(EncoderConfig::default().with_api_version("2.0.0"));
        match encoder.encode_graph(&store) {
            Err(Hdf5JsonError::SchemaViolation(violation)) => {
                assert_eq!(violation.location, "/apiVersion");
                assert!(violation.rule.contains("2.0.0"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        let older = Encoder::new(EncoderConfig::default().with_api_version("1.0.0"));
        assert_eq!(older.encode(&store).unwrap().api_version, "1.0.0");
    }

    #[test]
    fn test_path_derived_identifiers_repeat() {
        let mut store = MemoryStore::new();
        let root = store
            .create_file(&FileInfo::default(), &GroupCreationProperties::default())
            .unwrap();
        let g = store.create_group(&GroupCreationProperties::default()).unwrap();
        store.create_link(root, &Link::hard("g", Collection::Groups, g)).unwrap();

        let encoder = Encoder::new(
            EncoderConfig::default().with_identifier_policy(IdentifierPolicy::PathDerived),
        );
        let first = encoder.encode_graph(&store).unwrap();
        let second = encoder.encode_graph(&store).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.root, Identifier::derived("/"));
        assert_eq!(first.resolve_path("/g").unwrap().id, Identifier::derived("/g"));
    }
}
