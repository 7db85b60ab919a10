//! Native store abstraction
//!
//! The codec never talks to an HDF5 library directly. The encoder reads
//! through [`NativeSource`] and the decoder writes through [`NativeSink`];
//! both address objects by opaque [`ObjectAddr`] handles. [`MemoryStore`]
//! implements both and is what the tests and the CLI round-trip run on.

use crate::models::dataspace::Dataspace;
use crate::models::datatype::Datatype;
use crate::models::graph::{FileInfo, Timestamps};
use crate::models::identifier::Identifier;
use crate::models::link::Link;
use crate::models::properties::{
    AttributeCreationProperties, DatasetCreationProperties, GroupCreationProperties,
};
use crate::models::value::DataValue;
use std::fmt;

pub mod memory;

pub use memory::MemoryStore;

/// Opaque handle of a native object (an object header address in a real file)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectAddr(pub u64);

impl fmt::Display for ObjectAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Kind of a native object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    Group,
    Dataset,
    Datatype,
}

/// Error type for native store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectAddr),
    #[error("Link '{title}' already exists in group {group}")]
    LinkExists { group: ObjectAddr, title: String },
    #[error("Object {0} is not a group")]
    NotAGroup(ObjectAddr),
    #[error("Object {0} is not a dataset")]
    NotADataset(ObjectAddr),
    #[error("File has not been created")]
    NotInitialized,
    #[error("File has already been created")]
    AlreadyInitialized,
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Dataset definition as a native store sees it
#[derive(Debug, Clone, PartialEq)]
pub struct NativeDataset {
    pub datatype: Datatype<ObjectAddr>,
    pub dataspace: Dataspace,
    pub properties: DatasetCreationProperties,
    pub fill_value: Option<DataValue<ObjectAddr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeAttribute {
    pub name: String,
    pub datatype: Datatype<ObjectAddr>,
    pub dataspace: Dataspace,
    pub value: Option<DataValue<ObjectAddr>>,
    pub properties: AttributeCreationProperties,
}

/// Read access to an open native file
///
/// Enumerations return in the store's own order: links by creation order
/// when the group tracks it and by name otherwise, attributes likewise.
pub trait NativeSource {
    /// File-level settings; `id` is the persistent identifier, if the file carries one
    fn file_info(&self) -> Result<FileInfo, StoreError>;

    /// Address of the root group
    fn root(&self) -> Result<ObjectAddr, StoreError>;

    fn object_kind(&self, addr: ObjectAddr) -> Result<NativeKind, StoreError>;

    /// Identifier recorded on the object by an earlier decode, if any
    fn persistent_identifier(&self, _addr: ObjectAddr) -> Result<Option<Identifier>, StoreError> {
        Ok(None)
    }

    fn timestamps(&self, addr: ObjectAddr) -> Result<Timestamps, StoreError>;

    fn attributes(&self, addr: ObjectAddr) -> Result<Vec<NativeAttribute>, StoreError>;

    /// Links of a group in enumeration order
    fn group_links(&self, group: ObjectAddr) -> Result<Vec<Link<ObjectAddr>>, StoreError>;

    fn group_properties(&self, group: ObjectAddr) -> Result<GroupCreationProperties, StoreError>;

    /// Dataset definition without its value
    fn dataset(&self, addr: ObjectAddr) -> Result<NativeDataset, StoreError>;

    /// Full dataset value; `None` when nothing has been written
    fn read_dataset_value(&self, addr: ObjectAddr) -> Result<Option<DataValue<ObjectAddr>>, StoreError>;

    fn committed_datatype(&self, addr: ObjectAddr) -> Result<Datatype<ObjectAddr>, StoreError>;
}

/// Write access to a native file being created
///
/// Objects are created unlinked and wired into groups with
/// [`create_link`](NativeSink::create_link) afterwards, so creation order
/// never depends on the link structure.
pub trait NativeSink {
    /// Create the file and its root group, returning the root's address
    fn create_file(
        &mut self,
        info: &FileInfo,
        root_properties: &GroupCreationProperties,
    ) -> Result<ObjectAddr, StoreError>;

    fn create_group(&mut self, properties: &GroupCreationProperties) -> Result<ObjectAddr, StoreError>;

    fn create_dataset(&mut self, dataset: &NativeDataset) -> Result<ObjectAddr, StoreError>;

    /// Commit a named datatype; it may refer to datatypes committed earlier
    fn commit_datatype(&mut self, datatype: &Datatype<ObjectAddr>) -> Result<ObjectAddr, StoreError>;

    /// Add a link to a group; titles are unique per group
    fn create_link(&mut self, group: ObjectAddr, link: &Link<ObjectAddr>) -> Result<(), StoreError>;

    fn write_attribute(&mut self, addr: ObjectAddr, attribute: &NativeAttribute) -> Result<(), StoreError>;

    fn write_dataset_value(
        &mut self,
        addr: ObjectAddr,
        value: &DataValue<ObjectAddr>,
    ) -> Result<(), StoreError>;

    /// Restore recorded timestamps; stores that cannot set them ignore the call
    fn set_timestamps(&mut self, _addr: ObjectAddr, _timestamps: &Timestamps) -> Result<(), StoreError> {
        Ok(())
    }

    /// Remember which document identifier an object was created from
    fn record_identifier(&mut self, _addr: ObjectAddr, _id: Identifier) -> Result<(), StoreError> {
        Ok(())
    }

    /// Make everything written so far durable
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
