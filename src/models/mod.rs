//! Models module
//!
//! Defines the datatype, dataspace and property models, the wire form of a
//! document and the in-memory object graph built from it.

pub mod dataspace;
pub mod datatype;
pub mod document;
pub mod graph;
pub mod identifier;
pub mod link;
pub mod properties;
pub mod value;

pub use dataspace::{Dataspace, Extent, HyperslabBlock, RegionReference, Selection};
pub use datatype::{ByteOrder, CharSet, Datatype, EnumType, FloatType, IntegerType, StringType};
pub use document::{Document, CURRENT_API_VERSION, SUPPORTED_API_VERSIONS};
pub use graph::{
    Attribute, CommittedDatatype, Dataset, FileInfo, Group, Hdf5Object, ObjectBody, ObjectGraph,
    Timestamps,
};
pub use identifier::{Collection, Identifier, ObjectRef};
pub use link::Link;
pub use properties::{
    AttributeCreationProperties, DatasetCreationProperties, FileCreationProperties, Filter,
    GroupCreationProperties, Layout, LinkCreationProperties,
};
pub use value::{DataValue, ValueContext};
