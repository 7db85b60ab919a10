//! In-memory native store
//!
//! Behaves like a freshly created HDF5 file: addresses are handed out in
//! creation order, links enumerate by creation order only when the group
//! tracks it and by name otherwise, and link titles are unique per group.

use super::{
    NativeAttribute, NativeDataset, NativeKind, NativeSink, NativeSource, ObjectAddr, StoreError,
};
use crate::models::datatype::Datatype;
use crate::models::graph::{FileInfo, Timestamps};
use crate::models::identifier::{Collection, Identifier};
use crate::models::link::{Link, is_user_defined_link_class};
use crate::models::properties::GroupCreationProperties;
use crate::models::value::DataValue;
use std::collections::BTreeMap;
use tracing::trace;

/// First address handed out; the superblock sits below it in a real file
const FIRST_ADDR: u64 = 0x60;
const ADDR_STEP: u64 = 0x40;

#[derive(Debug, Clone, PartialEq)]
enum MemoryBody {
    Group {
        properties: GroupCreationProperties,
        links: Vec<Link<ObjectAddr>>,
    },
    Dataset {
        definition: NativeDataset,
        value: Option<DataValue<ObjectAddr>>,
    },
    Datatype(Datatype<ObjectAddr>),
}

#[derive(Debug, Clone, PartialEq)]
struct MemoryObject {
    body: MemoryBody,
    attributes: Vec<NativeAttribute>,
    timestamps: Timestamps,
    identifier: Option<Identifier>,
}

impl MemoryObject {
    fn new(body: MemoryBody) -> Self {
        Self {
            body,
            attributes: Vec::new(),
            timestamps: Timestamps::default(),
            identifier: None,
        }
    }

    fn kind(&self) -> NativeKind {
        match self.body {
            MemoryBody::Group { .. } => NativeKind::Group,
            MemoryBody::Dataset { .. } => NativeKind::Dataset,
            MemoryBody::Datatype(_) => NativeKind::Datatype,
        }
    }

    fn tracks_attribute_order(&self) -> bool {
        match &self.body {
            MemoryBody::Group { properties, .. } => properties.attribute_creation_order.is_some(),
            MemoryBody::Dataset { definition, .. } => {
                definition.properties.attribute_creation_order.is_some()
            }
            MemoryBody::Datatype(_) => false,
        }
    }
}

/// A native file held entirely in memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    file: Option<FileInfo>,
    root: Option<ObjectAddr>,
    objects: BTreeMap<ObjectAddr, MemoryObject>,
    next_addr: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects, root group included
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Follow hard links from the root along a `/`-separated path
    pub fn resolve_path(&self, path: &str) -> Option<ObjectAddr> {
        let mut current = self.root?;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let MemoryBody::Group { links, .. } = &self.objects.get(&current)?.body else {
                return None;
            };
            let (_, addr) = links.iter().find(|l| l.title() == segment)?.target()?;
            current = *addr;
        }
        Some(current)
    }

    fn allocate(&mut self, body: MemoryBody) -> ObjectAddr {
        let addr = ObjectAddr(FIRST_ADDR + self.next_addr * ADDR_STEP);
        self.next_addr += 1;
        self.objects.insert(addr, MemoryObject::new(body));
        addr
    }

    fn object(&self, addr: ObjectAddr) -> Result<&MemoryObject, StoreError> {
        self.objects.get(&addr).ok_or(StoreError::ObjectNotFound(addr))
    }

    fn object_mut(&mut self, addr: ObjectAddr) -> Result<&mut MemoryObject, StoreError> {
        self.objects
            .get_mut(&addr)
            .ok_or(StoreError::ObjectNotFound(addr))
    }

    fn require_file(&self) -> Result<(), StoreError> {
        if self.file.is_none() {
            return Err(StoreError::NotInitialized);
        }
        Ok(())
    }

    /// Every committed datatype a definition uses must already exist
    fn check_committed(&self, datatype: &Datatype<ObjectAddr>) -> Result<(), StoreError> {
        for addr in datatype.committed_references() {
            if self.object(*addr)?.kind() != NativeKind::Datatype {
                return Err(StoreError::InvalidOperation(format!(
                    "{} is not a committed datatype",
                    addr
                )));
            }
        }
        Ok(())
    }

    fn check_references(&self, value: &DataValue<ObjectAddr>) -> Result<(), StoreError> {
        value
            .try_map_refs(&mut |addr: &ObjectAddr| self.object(*addr).map(|_| ()))
            .map(|_| ())
    }
}

impl NativeSource for MemoryStore {
    fn file_info(&self) -> Result<FileInfo, StoreError> {
        self.file.clone().ok_or(StoreError::NotInitialized)
    }

    fn root(&self) -> Result<ObjectAddr, StoreError> {
        self.root.ok_or(StoreError::NotInitialized)
    }

    fn object_kind(&self, addr: ObjectAddr) -> Result<NativeKind, StoreError> {
        Ok(self.object(addr)?.kind())
    }

    fn persistent_identifier(&self, addr: ObjectAddr) -> Result<Option<Identifier>, StoreError> {
        Ok(self.object(addr)?.identifier)
    }

    fn timestamps(&self, addr: ObjectAddr) -> Result<Timestamps, StoreError> {
        Ok(self.object(addr)?.timestamps)
    }

    fn attributes(&self, addr: ObjectAddr) -> Result<Vec<NativeAttribute>, StoreError> {
        let object = self.object(addr)?;
        let mut attributes = object.attributes.clone();
        if !object.tracks_attribute_order() {
            attributes.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(attributes)
    }

    fn group_links(&self, group: ObjectAddr) -> Result<Vec<Link<ObjectAddr>>, StoreError> {
        match &self.object(group)?.body {
            MemoryBody::Group { properties, links } => {
                let mut links = links.clone();
                if !properties.tracks_link_order() {
                    links.sort_by(|a, b| a.title().cmp(b.title()));
                }
                Ok(links)
            }
            _ => Err(StoreError::NotAGroup(group)),
        }
    }

    fn group_properties(&self, group: ObjectAddr) -> Result<GroupCreationProperties, StoreError> {
        match &self.object(group)?.body {
            MemoryBody::Group { properties, .. } => Ok(properties.clone()),
            _ => Err(StoreError::NotAGroup(group)),
        }
    }

    fn dataset(&self, addr: ObjectAddr) -> Result<NativeDataset, StoreError> {
        match &self.object(addr)?.body {
            MemoryBody::Dataset { definition, .. } => Ok(definition.clone()),
            _ => Err(StoreError::NotADataset(addr)),
        }
    }

    fn read_dataset_value(&self, addr: ObjectAddr) -> Result<Option<DataValue<ObjectAddr>>, StoreError> {
        match &self.object(addr)?.body {
            MemoryBody::Dataset { value, .. } => Ok(value.clone()),
            _ => Err(StoreError::NotADataset(addr)),
        }
    }

    fn committed_datatype(&self, addr: ObjectAddr) -> Result<Datatype<ObjectAddr>, StoreError> {
        match &self.object(addr)?.body {
            MemoryBody::Datatype(datatype) => Ok(datatype.clone()),
            _ => Err(StoreError::InvalidOperation(format!(
                "{} is not a committed datatype",
                addr
            ))),
        }
    }
}

impl NativeSink for MemoryStore {
    fn create_file(
        &mut self,
        info: &FileInfo,
        root_properties: &GroupCreationProperties,
    ) -> Result<ObjectAddr, StoreError> {
        if self.file.is_some() {
            return Err(StoreError::AlreadyInitialized);
        }
        if let (Some(userblock), Some(size)) = (&info.userblock, info.userblock_size)
            && userblock.len() as u64 > size
        {
            return Err(StoreError::InvalidOperation(format!(
                "userblock of {} bytes does not fit in {} bytes",
                userblock.len(),
                size
            )));
        }
        self.file = Some(info.clone());
        let root = self.allocate(MemoryBody::Group {
            properties: root_properties.clone(),
            links: Vec::new(),
        });
        self.root = Some(root);
        trace!(root = %root, "Created in-memory file");
        Ok(root)
    }

    fn create_group(&mut self, properties: &GroupCreationProperties) -> Result<ObjectAddr, StoreError> {
        self.require_file()?;
        Ok(self.allocate(MemoryBody::Group {
            properties: properties.clone(),
            links: Vec::new(),
        }))
    }

    fn create_dataset(&mut self, dataset: &NativeDataset) -> Result<ObjectAddr, StoreError> {
        self.require_file()?;
        self.check_committed(&dataset.datatype)?;
        if let Some(fill) = &dataset.fill_value {
            self.check_references(fill)?;
        }
        Ok(self.allocate(MemoryBody::Dataset {
            definition: dataset.clone(),
            value: None,
        }))
    }

    fn commit_datatype(&mut self, datatype: &Datatype<ObjectAddr>) -> Result<ObjectAddr, StoreError> {
        self.require_file()?;
        if let Datatype::Committed(addr) = datatype {
            return Err(StoreError::InvalidOperation(format!(
                "cannot commit an alias of committed datatype {}",
                addr
            )));
        }
        self.check_committed(datatype)?;
        Ok(self.allocate(MemoryBody::Datatype(datatype.clone())))
    }

    fn create_link(&mut self, group: ObjectAddr, link: &Link<ObjectAddr>) -> Result<(), StoreError> {
        let title = link.title();
        if title.is_empty() || title.contains('/') {
            return Err(StoreError::InvalidOperation(format!(
                "invalid link title '{}'",
                title
            )));
        }
        if let Link::UserDefined { link_class, .. } = link
            && !is_user_defined_link_class(*link_class)
        {
            return Err(StoreError::InvalidOperation(format!(
                "link '{}' has class {}, outside the user-defined range",
                title, link_class
            )));
        }
        if let Some((collection, target)) = link.target() {
            let expected = match collection {
                Collection::Groups => NativeKind::Group,
                Collection::Datasets => NativeKind::Dataset,
                Collection::Datatypes => NativeKind::Datatype,
            };
            if self.object(*target)?.kind() != expected {
                return Err(StoreError::InvalidOperation(format!(
                    "hard link '{}' names {} as {} but it is not",
                    title, target, collection
                )));
            }
        }
        match &mut self.object_mut(group)?.body {
            MemoryBody::Group { links, .. } => {
                if links.iter().any(|l| l.title() == title) {
                    return Err(StoreError::LinkExists {
                        group,
                        title: title.to_string(),
                    });
                }
                links.push(link.clone());
                Ok(())
            }
            _ => Err(StoreError::NotAGroup(group)),
        }
    }

    fn write_attribute(&mut self, addr: ObjectAddr, attribute: &NativeAttribute) -> Result<(), StoreError> {
        self.check_committed(&attribute.datatype)?;
        if let Some(value) = &attribute.value {
            self.check_references(value)?;
        }
        let object = self.object_mut(addr)?;
        if object.attributes.iter().any(|a| a.name == attribute.name) {
            return Err(StoreError::InvalidOperation(format!(
                "attribute '{}' already exists on {}",
                attribute.name, addr
            )));
        }
        object.attributes.push(attribute.clone());
        Ok(())
    }

    fn write_dataset_value(
        &mut self,
        addr: ObjectAddr,
        value: &DataValue<ObjectAddr>,
    ) -> Result<(), StoreError> {
        self.check_references(value)?;
        match &mut self.object_mut(addr)?.body {
            MemoryBody::Dataset { definition, value: slot } => {
                if matches!(definition.dataspace, crate::models::dataspace::Dataspace::Null) {
                    return Err(StoreError::InvalidOperation(format!(
                        "dataset {} has a null dataspace",
                        addr
                    )));
                }
                *slot = Some(value.clone());
                Ok(())
            }
            _ => Err(StoreError::NotADataset(addr)),
        }
    }

    fn set_timestamps(&mut self, addr: ObjectAddr, timestamps: &Timestamps) -> Result<(), StoreError> {
        self.object_mut(addr)?.timestamps = *timestamps;
        Ok(())
    }

    fn record_identifier(&mut self, addr: ObjectAddr, id: Identifier) -> Result<(), StoreError> {
        self.object_mut(addr)?.identifier = Some(id);
        Ok(())
    }
}
