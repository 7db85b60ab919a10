//! In-memory object graph
//!
//! An arena of groups, datasets and committed datatypes keyed by
//! [`Identifier`]. Objects never point at each other directly: links,
//! committed datatype uses and reference values all carry identifiers, so a
//! graph with cyclic links needs no special ownership handling.

use crate::error::{Hdf5JsonError, Result};
use crate::models::dataspace::Dataspace;
use crate::models::datatype::Datatype;
use crate::models::document::{
    AttributeEntry, CURRENT_API_VERSION, DatasetEntry, DatasetPropertiesEntry, DatatypeEntry,
    Document, GroupEntry,
};
use crate::models::identifier::{Collection, Identifier, ObjectRef};
use crate::models::link::Link;
use crate::models::properties::{
    AttributeCreationProperties, DatasetCreationProperties, DriverInfo, FileCreationProperties,
    GroupCreationProperties,
};
use crate::models::value::{
    DataValue, ValueContext, element_value_from_json, element_value_to_json, value_from_json,
    value_to_json,
};
use crate::validation::integrity;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::debug;

/// Creation and modification times of an object or file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamps {
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

/// File-level settings
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileInfo {
    /// Persistent identifier of the file itself
    pub id: Option<Identifier>,
    pub userblock: Option<Vec<u8>>,
    pub userblock_size: Option<u64>,
    pub driver_info: Option<DriverInfo>,
    pub creation_properties: FileCreationProperties,
    pub timestamps: Timestamps,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub datatype: Datatype,
    pub shape: Dataspace,
    pub value: Option<DataValue<ObjectRef>>,
    pub properties: AttributeCreationProperties,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    /// Links in enumeration order
    pub links: Vec<Link>,
    pub properties: GroupCreationProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub datatype: Datatype,
    pub shape: Dataspace,
    pub value: Option<DataValue<ObjectRef>>,
    pub fill_value: Option<DataValue<ObjectRef>>,
    pub properties: DatasetCreationProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommittedDatatype {
    pub datatype: Datatype,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBody {
    Group(Group),
    Dataset(Dataset),
    Datatype(CommittedDatatype),
}

impl ObjectBody {
    pub fn collection(&self) -> Collection {
        match self {
            ObjectBody::Group(_) => Collection::Groups,
            ObjectBody::Dataset(_) => Collection::Datasets,
            ObjectBody::Datatype(_) => Collection::Datatypes,
        }
    }
}

/// One group, dataset or committed datatype
#[derive(Debug, Clone, PartialEq)]
pub struct Hdf5Object {
    pub id: Identifier,
    /// Paths under which the object is reachable
    pub alias: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub timestamps: Timestamps,
    pub body: ObjectBody,
}

impl Hdf5Object {
    pub fn new(id: Identifier, body: ObjectBody) -> Self {
        Self {
            id,
            alias: Vec::new(),
            attributes: Vec::new(),
            timestamps: Timestamps::default(),
            body,
        }
    }

    pub fn collection(&self) -> Collection {
        self.body.collection()
    }

    pub fn reference(&self) -> ObjectRef {
        ObjectRef::new(self.collection(), self.id)
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.body {
            ObjectBody::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&Dataset> {
        match &self.body {
            ObjectBody::Dataset(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_datatype(&self) -> Option<&CommittedDatatype> {
        match &self.body {
            ObjectBody::Datatype(t) => Some(t),
            _ => None,
        }
    }
}

/// Arena of objects keyed by identifier
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGraph {
    pub api_version: String,
    pub root: Identifier,
    pub file: FileInfo,
    objects: IndexMap<Identifier, Hdf5Object>,
}

impl ObjectGraph {
    pub fn new(root: Identifier, file: FileInfo) -> Self {
        Self {
            api_version: CURRENT_API_VERSION.to_string(),
            root,
            file,
            objects: IndexMap::new(),
        }
    }

    /// Add an object; identifiers are unique across all collections
    pub fn insert(&mut self, object: Hdf5Object) -> Result<()> {
        if let Some(existing) = self.objects.get(&object.id) {
            return Err(Hdf5JsonError::DuplicateIdentifier {
                identifier: object.id.to_string(),
                first: existing.collection(),
                second: object.collection(),
            });
        }
        self.objects.insert(object.id, object);
        Ok(())
    }

    pub fn get(&self, id: &Identifier) -> Option<&Hdf5Object> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: &Identifier) -> Option<&mut Hdf5Object> {
        self.objects.get_mut(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &Hdf5Object> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.objects().filter(|o| o.collection() == collection).count()
    }

    pub fn root_group(&self) -> Option<&Group> {
        self.get(&self.root).and_then(Hdf5Object::as_group)
    }

    /// Follow hard links from the root along a `/`-separated path
    pub fn resolve_path(&self, path: &str) -> Option<&Hdf5Object> {
        let mut current = self.get(&self.root)?;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let group = current.as_group()?;
            let link = group.links.iter().find(|l| l.title() == segment)?;
            let (_, id) = link.target()?;
            current = self.get(id)?;
        }
        Some(current)
    }

    /// Build a graph from a document, checking its structure first
    ///
    /// Structural problems (malformed keys, duplicate identifiers, dangling
    /// hard links and committed datatype references, bad aliases and titles)
    /// are reported before any datatype, dataspace or value is parsed.
    pub fn from_document(doc: &Document) -> Result<Self> {
        if let Some(issue) = integrity::check_structure(doc).into_iter().next() {
            return Err(issue.into_error());
        }

        let root = parse_id(&doc.root, "/root")?;
        let file = FileInfo {
            id: doc.id.as_deref().map(|id| parse_id(id, "/id")).transpose()?,
            userblock: doc.userblock.clone(),
            userblock_size: doc.userblock_size,
            driver_info: doc.driver_info.clone(),
            creation_properties: doc.creation_properties.clone().unwrap_or_default(),
            timestamps: Timestamps {
                created: doc.created,
                modified: doc.last_modified,
            },
        };
        let mut graph = ObjectGraph::new(root, file);
        graph.api_version = doc.api_version.clone();

        // Shapes and types first; values need every committed type and dataset space
        for (key, entry) in &doc.datatypes {
            let location = format!("/datatypes/{}", key);
            let id = parse_id(key, &location)?;
            let datatype = Datatype::from_json(&entry.datatype, &format!("{}/type", location))?;
            let mut object = Hdf5Object::new(id, ObjectBody::Datatype(CommittedDatatype { datatype }));
            object.alias = entry.alias.clone();
            object.timestamps = Timestamps {
                created: entry.created,
                modified: entry.last_modified,
            };
            graph.insert(object)?;
        }
        for (key, entry) in &doc.groups {
            let location = format!("/groups/{}", key);
            let id = parse_id(key, &location)?;
            let links = entry
                .links
                .iter()
                .enumerate()
                .map(|(i, link)| {
                    link.try_map_target(|_, target| parse_id(target, &format!("{}/links/{}/id", location, i)))
                })
                .collect::<Result<Vec<_>>>()?;
            let mut object = Hdf5Object::new(
                id,
                ObjectBody::Group(Group {
                    links,
                    properties: entry.creation_properties.clone().unwrap_or_default(),
                }),
            );
            object.alias = entry.alias.clone();
            object.timestamps = Timestamps {
                created: entry.created,
                modified: entry.last_modified,
            };
            graph.insert(object)?;
        }
        for (key, entry) in &doc.datasets {
            let location = format!("/datasets/{}", key);
            let id = parse_id(key, &location)?;
            let datatype = Datatype::from_json(&entry.datatype, &format!("{}/type", location))?;
            let shape = Dataspace::from_json(&entry.shape, &format!("{}/shape", location))?;
            let properties = entry
                .creation_properties
                .as_ref()
                .map(|p| p.properties.clone())
                .unwrap_or_default();
            properties.check_layout(&shape, &format!("{}/creationProperties", location))?;
            let mut object = Hdf5Object::new(
                id,
                ObjectBody::Dataset(Dataset {
                    datatype,
                    shape,
                    value: None,
                    fill_value: None,
                    properties,
                }),
            );
            object.alias = entry.alias.clone();
            object.timestamps = Timestamps {
                created: entry.created,
                modified: entry.last_modified,
            };
            graph.insert(object)?;
        }

        // Committed datatypes may only be referenced, never contained
        for object in graph.objects() {
            if let Some(committed) = object.as_datatype()
                && let Datatype::Committed(target) = &committed.datatype
            {
                return Err(Hdf5JsonError::datatype(
                    format!("/datatypes/{}/type", object.id),
                    format!("a committed datatype cannot be an alias of datatypes/{}", target),
                ));
            }
        }

        let attributes = collect_attributes(&graph, doc)?;
        let values = collect_dataset_values(&graph, doc)?;
        for (id, attrs) in attributes {
            if let Some(object) = graph.get_mut(&id) {
                object.attributes = attrs;
            }
        }
        for (id, value, fill_value) in values {
            if let Some(Hdf5Object {
                body: ObjectBody::Dataset(dataset),
                ..
            }) = graph.get_mut(&id)
            {
                dataset.value = value;
                dataset.fill_value = fill_value;
            }
        }

        debug!(
            groups = graph.count(Collection::Groups),
            datasets = graph.count(Collection::Datasets),
            datatypes = graph.count(Collection::Datatypes),
            "Built object graph from document"
        );
        Ok(graph)
    }

    /// Write this graph out in wire form
    pub fn to_document(&self) -> Result<Document> {
        let mut doc = Document {
            api_version: self.api_version.clone(),
            id: self.file.id.map(|id| id.to_string()),
            root: self.root.to_string(),
            created: self.file.timestamps.created,
            last_modified: self.file.timestamps.modified,
            userblock: self.file.userblock.clone(),
            userblock_size: self.file.userblock_size,
            driver_info: self.file.driver_info.clone(),
            creation_properties: Some(self.file.creation_properties.clone())
                .filter(|p| !p.is_empty()),
            groups: IndexMap::new(),
            datasets: IndexMap::new(),
            datatypes: IndexMap::new(),
        };

        for object in self.objects() {
            let key = object.id.to_string();
            let location = format!("/{}/{}", object.collection(), key);
            let attributes = object
                .attributes
                .iter()
                .enumerate()
                .map(|(i, a)| self.attribute_entry(a, &format!("{}/attributes/{}", location, i)))
                .collect::<Result<Vec<_>>>()?;
            match &object.body {
                ObjectBody::Group(group) => {
                    let links = group
                        .links
                        .iter()
                        .map(|l| l.try_map_target(|_, id| Ok::<_, Hdf5JsonError>(id.to_string())))
                        .collect::<Result<Vec<_>>>()?;
                    doc.groups.insert(
                        key,
                        GroupEntry {
                            alias: object.alias.clone(),
                            attributes,
                            links,
                            creation_properties: Some(group.properties.clone())
                                .filter(|p| !p.is_empty()),
                            created: object.timestamps.created,
                            last_modified: object.timestamps.modified,
                        },
                    );
                }
                ObjectBody::Dataset(dataset) => {
                    let value = match &dataset.value {
                        Some(v) => value_to_json(
                            &dataset.datatype,
                            &dataset.shape,
                            v,
                            self,
                            &format!("{}/value", location),
                        )?,
                        None => None,
                    };
                    let fill_value = dataset
                        .fill_value
                        .as_ref()
                        .map(|v| {
                            element_value_to_json(
                                &dataset.datatype,
                                v,
                                self,
                                &format!("{}/creationProperties/fillValue", location),
                            )
                        })
                        .transpose()?;
                    let creation_properties = if dataset.properties.is_empty() && fill_value.is_none() {
                        None
                    } else {
                        Some(DatasetPropertiesEntry {
                            properties: dataset.properties.clone(),
                            fill_value,
                        })
                    };
                    doc.datasets.insert(
                        key,
                        DatasetEntry {
                            alias: object.alias.clone(),
                            attributes,
                            datatype: dataset.datatype.to_json(),
                            shape: dataset.shape.to_json(),
                            value,
                            creation_properties,
                            created: object.timestamps.created,
                            last_modified: object.timestamps.modified,
                        },
                    );
                }
                ObjectBody::Datatype(committed) => {
                    doc.datatypes.insert(
                        key,
                        DatatypeEntry {
                            alias: object.alias.clone(),
                            attributes,
                            datatype: committed.datatype.to_json(),
                            created: object.timestamps.created,
                            last_modified: object.timestamps.modified,
                        },
                    );
                }
            }
        }
        Ok(doc)
    }

    fn attribute_entry(&self, attribute: &Attribute, location: &str) -> Result<AttributeEntry> {
        let value = match &attribute.value {
            Some(v) => value_to_json(
                &attribute.datatype,
                &attribute.shape,
                v,
                self,
                &format!("{}/value", location),
            )?,
            None => None,
        };
        Ok(AttributeEntry {
            name: attribute.name.clone(),
            datatype: attribute.datatype.to_json(),
            shape: attribute.shape.to_json(),
            value,
            creation_properties: Some(attribute.properties).filter(|p| !p.is_empty()),
        })
    }
}

impl ValueContext for ObjectGraph {
    fn committed_type(&self, id: &Identifier) -> Option<&Datatype> {
        self.get(id).and_then(Hdf5Object::as_datatype).map(|t| &t.datatype)
    }

    fn contains(&self, reference: &ObjectRef) -> bool {
        self.get(&reference.id)
            .is_some_and(|o| o.collection() == reference.collection)
    }

    fn dataset_space(&self, id: &Identifier) -> Option<&Dataspace> {
        self.get(id).and_then(Hdf5Object::as_dataset).map(|d| &d.shape)
    }
}

fn parse_id(text: &str, location: &str) -> Result<Identifier> {
    text.parse()
        .map_err(|_| Hdf5JsonError::unresolved(location, text))
}

fn entry_attributes<'a>(doc: &'a Document, collection: Collection, key: &str) -> &'a [AttributeEntry] {
    let attributes = match collection {
        Collection::Groups => doc.groups.get(key).map(|e| &e.attributes),
        Collection::Datasets => doc.datasets.get(key).map(|e| &e.attributes),
        Collection::Datatypes => doc.datatypes.get(key).map(|e| &e.attributes),
    };
    attributes.map(Vec::as_slice).unwrap_or(&[])
}

fn collect_attributes(graph: &ObjectGraph, doc: &Document) -> Result<Vec<(Identifier, Vec<Attribute>)>> {
    let mut collected = Vec::new();
    for object in graph.objects() {
        let key = object.id.to_string();
        let entries = entry_attributes(doc, object.collection(), &key);
        if entries.is_empty() {
            continue;
        }
        let mut attributes = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let location = format!("/{}/{}/attributes/{}", object.collection(), key, i);
            let datatype = Datatype::from_json(&entry.datatype, &format!("{}/type", location))?;
            let shape = Dataspace::from_json(&entry.shape, &format!("{}/shape", location))?;
            let value = match &entry.value {
                Some(json) if !matches!(shape, Dataspace::Null) => Some(value_from_json(
                    &datatype,
                    &shape,
                    json,
                    graph,
                    &format!("{}/value", location),
                )?),
                Some(json) if !json.is_null() => {
                    return Err(Hdf5JsonError::value(
                        format!("{}/value", location),
                        "a null dataspace carries no value",
                    ));
                }
                _ => None,
            };
            attributes.push(Attribute {
                name: entry.name.clone(),
                datatype,
                shape,
                value,
                properties: entry.creation_properties.unwrap_or_default(),
            });
        }
        collected.push((object.id, attributes));
    }
    Ok(collected)
}

type DatasetValues = (Identifier, Option<DataValue<ObjectRef>>, Option<DataValue<ObjectRef>>);

fn collect_dataset_values(graph: &ObjectGraph, doc: &Document) -> Result<Vec<DatasetValues>> {
    let entries: HashMap<&str, &DatasetEntry> =
        doc.datasets.iter().map(|(k, v)| (k.as_str(), v)).collect();
    let mut collected = Vec::new();
    for object in graph.objects() {
        let Some(dataset) = object.as_dataset() else {
            continue;
        };
        let key = object.id.to_string();
        let Some(entry) = entries.get(key.as_str()) else {
            continue;
        };
        let location = format!("/datasets/{}", key);
        let value = match &entry.value {
            Some(json) if !matches!(dataset.shape, Dataspace::Null) => Some(value_from_json(
                &dataset.datatype,
                &dataset.shape,
                json,
                graph,
                &format!("{}/value", location),
            )?),
            Some(json) if !json.is_null() => {
                return Err(Hdf5JsonError::value(
                    format!("{}/value", location),
                    "a null dataspace carries no value",
                ));
            }
            _ => None,
        };
        let fill_value = entry
            .creation_properties
            .as_ref()
            .and_then(|p| p.fill_value.as_ref())
            .map(|json| {
                element_value_from_json(
                    &dataset.datatype,
                    json,
                    graph,
                    &format!("{}/creationProperties/fillValue", location),
                )
            })
            .transpose()?;
        if value.is_some() || fill_value.is_some() {
            collected.push((object.id, value, fill_value));
        }
    }
    Ok(collected)
}
