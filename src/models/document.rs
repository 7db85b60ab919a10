//! Wire form of an HDF5/JSON document
//!
//! These structs mirror the JSON layout one-to-one. Datatypes, dataspaces and
//! values stay as raw JSON here; they are parsed (with proper error
//! locations) when a document is turned into an
//! [`ObjectGraph`](crate::models::graph::ObjectGraph).

use crate::models::link::Link;
use crate::models::properties::{
    AttributeCreationProperties, DatasetCreationProperties, DriverInfo, FileCreationProperties,
    GroupCreationProperties,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document format versions this crate reads
pub const SUPPORTED_API_VERSIONS: &[&str] = &["1.0.0", "1.1.0", "1.1.1"];

/// Version written by default
pub const CURRENT_API_VERSION: &str = "1.1.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub root: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userblock: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userblock_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_info: Option<DriverInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_properties: Option<FileCreationProperties>,
    #[serde(default)]
    pub groups: IndexMap<String, GroupEntry>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub datasets: IndexMap<String, DatasetEntry>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub datatypes: IndexMap<String, DatatypeEntry>,
}

impl Document {
    pub fn from_json_str(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn to_json_string_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Total number of objects across the three collections
    pub fn object_count(&self) -> usize {
        self.groups.len() + self.datasets.len() + self.datatypes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alias: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_properties: Option<GroupCreationProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Dataset creation properties plus the fill value, which is typed by the dataset
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetPropertiesEntry {
    #[serde(flatten)]
    pub properties: DatasetCreationProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetEntry {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alias: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeEntry>,
    #[serde(rename = "type")]
    pub datatype: Value,
    pub shape: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_properties: Option<DatasetPropertiesEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatatypeEntry {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alias: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeEntry>,
    #[serde(rename = "type")]
    pub datatype: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub datatype: Value,
    pub shape: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_properties: Option<AttributeCreationProperties>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collections_keep_document_order() {
        let doc = Document::from_value(json!({
            "apiVersion": "1.1.1",
            "root": "00000000-0000-4000-8000-000000000002",
            "groups": {
                "00000000-0000-4000-8000-000000000002": {},
                "00000000-0000-4000-8000-000000000001": {"alias": ["/b"]}
            }
        }))
        .unwrap();
        let keys: Vec<&String> = doc.groups.keys().collect();
        assert_eq!(
            keys,
            vec!["00000000-0000-4000-8000-000000000002", "00000000-0000-4000-8000-000000000001"]
        );
        assert_eq!(doc.object_count(), 2);
    }

    #[test]
    fn test_dataset_fill_value_sits_with_creation_properties() {
        let entry: DatasetEntry = serde_json::from_value(json!({
            "type": {"class": "H5T_INTEGER", "base": "H5T_STD_I16BE"},
            "shape": {"class": "H5S_SIMPLE", "dims": [3]},
            "creationProperties": {
                "fillTime": "H5D_FILL_TIME_ALLOC",
                "fillValue": -1,
                "layout": {"class": "H5D_CHUNKED", "dims": [3]}
            }
        }))
        .unwrap();
        let props = entry.creation_properties.unwrap();
        assert_eq!(props.fill_value, Some(json!(-1)));
        assert!(props.properties.layout.is_some());
    }

    #[test]
    fn test_empty_collections_are_omitted() {
        let doc = Document {
            api_version: CURRENT_API_VERSION.to_string(),
            id: None,
            root: "00000000-0000-4000-8000-000000000002".to_string(),
            created: None,
            last_modified: None,
            userblock: None,
            userblock_size: None,
            driver_info: None,
            creation_properties: None,
            groups: IndexMap::new(),
            datasets: IndexMap::new(),
            datatypes: IndexMap::new(),
        };
        let value = doc.to_value().unwrap();
        assert!(value.get("datasets").is_none());
        assert!(value.get("datatypes").is_none());
        assert_eq!(value["groups"], json!({}));
    }
}
