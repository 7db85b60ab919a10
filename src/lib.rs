//! HDF5/JSON - lossless translation between HDF5 object graphs and JSON documents
//!
//! Provides:
//! - Data models for datatypes, dataspaces, selections, properties and values (`models`)
//! - The native store boundary and an in-memory store (`store`)
//! - Encoding a native store to a document and decoding it back (`codec`)
//! - Schema and cross-reference validation of documents (`validation`)
//!
//! ```
//! use hdf5_json::{Decoder, Encoder, MemoryStore};
//! use serde_json::json;
//!
//! let doc = hdf5_json::Document::from_value(json!({
//!     "apiVersion": "1.1.1",
//!     "root": "00000000-0000-4000-8000-000000000001",
//!     "groups": {"00000000-0000-4000-8000-000000000001": {"alias": ["/"]}}
//! })).unwrap();
//! let store = Decoder::default().decode(&doc, MemoryStore::new()).unwrap();
//! let again = Encoder::default().encode(&store).unwrap();
//! assert_eq!(again.root, doc.root);
//! ```

pub mod codec;
pub mod error;
pub mod models;
pub mod store;
pub mod validation;

#[cfg(feature = "cli")]
pub mod cli;

pub use codec::{Decoder, DecoderConfig, Encoder, EncoderConfig, IdentifierPolicy, ValueMode};
pub use error::{Hdf5JsonError, Result};
pub use models::{Document, Identifier, ObjectGraph};
pub use store::{MemoryStore, NativeSink, NativeSource, ObjectAddr, StoreError};
pub use validation::{SchemaValidator, ValidationMode, ValidatorConfig, Violation};
