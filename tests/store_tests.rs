//! Native store contract tests

use hdf5_json::models::datatype::{ByteOrder, FloatType};
use hdf5_json::models::graph::{FileInfo, Timestamps};
use hdf5_json::models::properties::{
    AttributeCreationProperties, CreationOrder, DatasetCreationProperties, GroupCreationProperties,
};
use hdf5_json::models::{Collection, Dataspace, Datatype, DataValue, Identifier, Link};
use hdf5_json::store::{NativeAttribute, NativeDataset};
use hdf5_json::{
    Decoder, Document, Hdf5JsonError, MemoryStore, NativeSink, NativeSource, ObjectAddr, StoreError,
};
use chrono::{TimeZone, Utc};
use serde_json::json;

fn scalar_attribute(name: &str, value: f64) -> NativeAttribute {
    NativeAttribute {
        name: name.to_string(),
        datatype: Datatype::Float(FloatType::ieee(8, ByteOrder::LittleEndian)),
        dataspace: Dataspace::Scalar,
        value: Some(DataValue::Float(value)),
        properties: AttributeCreationProperties::default(),
    }
}

fn new_file(root_properties: GroupCreationProperties) -> (MemoryStore, ObjectAddr) {
    let mut store = MemoryStore::new();
    let root = store.create_file(&FileInfo::default(), &root_properties).unwrap();
    (store, root)
}

mod memory_store_tests {
    use super::*;

    #[test]
    fn test_file_created_once() {
        let (mut store, _) = new_file(GroupCreationProperties::default());
        assert!(matches!(
            store.create_file(&FileInfo::default(), &GroupCreationProperties::default()),
            Err(StoreError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_userblock_must_fit() {
        let info = FileInfo {
            userblock: Some(vec![0; 600]),
            userblock_size: Some(512),
            ..FileInfo::default()
        };
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.create_file(&info, &GroupCreationProperties::default()),
            Err(StoreError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_attribute_order() {
        let (mut store, root) = new_file(GroupCreationProperties::default());
        store.write_attribute(root, &scalar_attribute("b", 1.0)).unwrap();
        store.write_attribute(root, &scalar_attribute("a", 2.0)).unwrap();
        let names: Vec<String> = store.attributes(root).unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["a", "b"]);

        let tracked = GroupCreationProperties {
            attribute_creation_order: Some(CreationOrder::Tracked),
            ..GroupCreationProperties::default()
        };
        let g = store.create_group(&tracked).unwrap();
        store.write_attribute(g, &scalar_attribute("b", 1.0)).unwrap();
        store.write_attribute(g, &scalar_attribute("a", 2.0)).unwrap();
        let names: Vec<String> = store.attributes(g).unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let (mut store, root) = new_file(GroupCreationProperties::default());
        store.write_attribute(root, &scalar_attribute("x", 1.0)).unwrap();
        assert!(store.write_attribute(root, &scalar_attribute("x", 2.0)).is_err());
    }

    #[test]
    fn test_null_dataspace_takes_no_value() {
        let (mut store, _) = new_file(GroupCreationProperties::default());
        let dset = store
            .create_dataset(&NativeDataset {
                datatype: Datatype::Float(FloatType::ieee(4, ByteOrder::BigEndian)),
                dataspace: Dataspace::Null,
                properties: DatasetCreationProperties::default(),
                fill_value: None,
            })
            .unwrap();
        assert!(store.write_dataset_value(dset, &DataValue::Float(1.0)).is_err());
    }

    #[test]
    fn test_committed_alias_rejected() {
        let (mut store, _) = new_file(GroupCreationProperties::default());
        let t = store
            .commit_datatype(&Datatype::Float(FloatType::ieee(8, ByteOrder::LittleEndian)))
            .unwrap();
        assert!(store.commit_datatype(&Datatype::Committed(t)).is_err());
        let g = store.create_group(&GroupCreationProperties::default()).unwrap();
        assert!(store.commit_datatype(&Datatype::VariableLength(Box::new(Datatype::Committed(g)))).is_err());
    }

    #[test]
    fn test_identifiers_and_timestamps_recorded() {
        let (mut store, root) = new_file(GroupCreationProperties::default());
        let id = Identifier::derived("/");
        let stamps = Timestamps {
            created: Some(Utc.with_ymd_and_hms(2023, 5, 1, 8, 30, 0).unwrap()),
            modified: None,
        };
        store.record_identifier(root, id).unwrap();
        store.set_timestamps(root, &stamps).unwrap();
        assert_eq!(store.persistent_identifier(root).unwrap(), Some(id));
        assert_eq!(store.timestamps(root).unwrap(), stamps);
    }

    #[test]
    fn test_unknown_address() {
        let (store, _) = new_file(GroupCreationProperties::default());
        assert!(matches!(
            store.object_kind(ObjectAddr(0x1)),
            Err(StoreError::ObjectNotFound(ObjectAddr(0x1)))
        ));
    }
}

mod sink_error_tests {
    use super::*;

    /// Delegates to a memory store but refuses every link
    struct NoLinks(MemoryStore);

    impl NativeSink for NoLinks {
        fn create_file(
            &mut self,
            info: &FileInfo,
            root_properties: &GroupCreationProperties,
        ) -> Result<ObjectAddr, StoreError> {
            self.0.create_file(info, root_properties)
        }

        fn create_group(&mut self, properties: &GroupCreationProperties) -> Result<ObjectAddr, StoreError> {
            self.0.create_group(properties)
        }

        fn create_dataset(&mut self, dataset: &NativeDataset) -> Result<ObjectAddr, StoreError> {
            self.0.create_dataset(dataset)
        }

        fn commit_datatype(&mut self, datatype: &Datatype<ObjectAddr>) -> Result<ObjectAddr, StoreError> {
            self.0.commit_datatype(datatype)
        }

        fn create_link(&mut self, _group: ObjectAddr, _link: &Link<ObjectAddr>) -> Result<(), StoreError> {
            Err(StoreError::Backend("links are read-only".to_string()))
        }

        fn write_attribute(&mut self, addr: ObjectAddr, attribute: &NativeAttribute) -> Result<(), StoreError> {
            self.0.write_attribute(addr, attribute)
        }

        fn write_dataset_value(
            &mut self,
            addr: ObjectAddr,
            value: &DataValue<ObjectAddr>,
        ) -> Result<(), StoreError> {
            self.0.write_dataset_value(addr, value)
        }
    }

    #[test]
    fn test_store_errors_propagate_unchanged() {
        let root = "00000000-0000-4000-8000-000000000001";
        let child = "00000000-0000-4000-8000-000000000002";
        let doc = Document::from_value(json!({
            "apiVersion": "1.1.1",
            "root": root,
            "groups": {
                root: {"links": [{"class": "H5L_TYPE_HARD", "title": "c", "collection": "groups", "id": child}]},
                child: {}
            }
        }))
        .unwrap();
        match Decoder::default().decode(&doc, NoLinks(MemoryStore::new())) {
            Err(Hdf5JsonError::NativeStore(StoreError::Backend(message))) => {
                assert_eq!(message, "links are read-only");
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("decode should fail"),
        }
    }

    #[test]
    fn test_hard_link_collection_mismatch() {
        let (mut store, root) = new_file(GroupCreationProperties::default());
        let g = store.create_group(&GroupCreationProperties::default()).unwrap();
        assert!(matches!(
            store.create_link(root, &Link::hard("g", Collection::Datasets, g)),
            Err(StoreError::InvalidOperation(_))
        ));
    }
}
