//! Schema and integrity validation tests

use hdf5_json::validation::{SchemaValidator, ValidationMode, ValidatorConfig};
use hdf5_json::{Decoder, Encoder, MemoryStore};
use serde_json::{Value, json};
use std::fs;

const ROOT: &str = "00000000-0000-4000-8000-000000000001";
const DSET: &str = "00000000-0000-4000-8000-000000000002";
const TYPE: &str = "00000000-0000-4000-8000-000000000003";
const OTHER: &str = "00000000-0000-4000-8000-000000000004";

fn valid_document() -> Value {
    json!({
        "apiVersion": "1.1.1",
        "root": ROOT,
        "created": "2024-03-01T12:00:00Z",
        "userblock": [1, 2, 3],
        "userblockSize": 512,
        "creationProperties": {
            "sizes": {"offsetSize": 8, "lengthSize": 8},
            "symbolTable": {"treeRank": 16, "nodeSize": 4}
        },
        "groups": {
            ROOT: {
                "alias": ["/"],
                "creationProperties": {"linkCreationOrder": "H5P_CRT_ORDER_TRACKED"},
                "links": [
                    {"class": "H5L_TYPE_HARD", "title": "temps", "collection": "datasets", "id": DSET},
                    {"class": "H5L_TYPE_HARD", "title": "point_t", "collection": "datatypes", "id": TYPE},
                    {"class": "H5L_TYPE_SOFT", "title": "dangling", "h5path": "/nowhere"},
                    {"class": "H5L_TYPE_EXTERNAL", "title": "ext", "file": "other.h5", "h5path": "/x"},
                    {"class": "H5L_TYPE_USER_DEFINED", "title": "ud", "linkClass": 65, "data": [0, 1]}
                ],
                "attributes": [{
                    "name": "title",
                    "type": {"class": "H5T_STRING", "charSet": "H5T_CSET_UTF8", "length": "H5T_VARIABLE", "strPad": "H5T_STR_NULLTERM"},
                    "shape": {"class": "H5S_SCALAR"},
                    "value": "readings",
                    "creationProperties": {"nameCharEncoding": "H5T_CSET_ASCII"}
                }]
            }
        },
        "datasets": {
            DSET: {
                "alias": ["/temps"],
                "type": format!("datatypes/{}", TYPE),
                "shape": {"class": "H5S_SIMPLE", "dims": [2], "maxdims": ["H5S_UNLIMITED"]},
                "value": [[1, 2.5], [3, "NaN"]],
                "creationProperties": {
                    "allocTime": "H5D_ALLOC_TIME_INCR",
                    "fillTime": "H5D_FILL_TIME_IFSET",
                    "fillValue": [0, 0.0],
                    "layout": {"class": "H5D_CHUNKED", "dims": [16]},
                    "filters": [
                        {"class": "H5Z_FILTER_SHUFFLE", "id": 2},
                        {"class": "H5Z_FILTER_DEFLATE", "id": 1, "level": 6},
                        {"class": "H5Z_FILTER_USER", "id": 307, "name": "bzip2", "parameters": [9]}
                    ]
                }
            }
        },
        "datatypes": {
            TYPE: {
                "alias": ["/point_t"],
                "type": {"class": "H5T_COMPOUND", "fields": [
                    {"name": "id", "type": {"class": "H5T_INTEGER", "base": "H5T_STD_I32LE"}},
                    {"name": "v", "type": {"class": "H5T_FLOAT", "base": "H5T_IEEE_F64BE"}}
                ]}
            }
        }
    })
}

mod schema_tests {
    use super::*;

    #[test]
    fn test_valid_document_passes() {
        let violations = SchemaValidator::new().validate(&valid_document());
        assert!(violations.is_empty(), "unexpected violations: {:?}", violations);
    }

    #[test]
    fn test_userblock_size_not_power_of_two() {
        let mut doc = valid_document();
        doc["userblockSize"] = json!(500);
        let violations = SchemaValidator::new().validate(&doc);
        assert_eq!(violations.len(), 1, "{:?}", violations);
        assert_eq!(violations[0].location, "/userblockSize");
    }

    #[test]
    fn test_validation_is_idempotent() {
        let mut doc = valid_document();
        doc["userblockSize"] = json!(500);
        doc["groups"][ROOT]["links"][0]["title"] = json!("a/b");
        doc["datasets"][DSET]["shape"]["dims"] = json!([-1]);
        let validator = SchemaValidator::new();
        let before = doc.clone();
        let first = validator.validate(&doc);
        let second = validator.validate(&doc);
        assert!(first.len() >= 3);
        assert_eq!(first, second);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_stop_on_first_reports_one() {
        let mut doc = valid_document();
        doc["userblockSize"] = json!(500);
        doc["apiVersion"] = json!("9.9.9");
        let exhaustive = SchemaValidator::new().validate(&doc);
        assert!(exhaustive.len() >= 2);
        let stop = SchemaValidator::with_config(
            ValidatorConfig::default().with_mode(ValidationMode::StopOnFirst),
        )
        .validate(&doc);
        assert_eq!(stop.len(), 1);
    }

    #[test]
    fn test_mixed_datatype_fields_rejected() {
        let mut doc = valid_document();
        doc["datatypes"][TYPE]["type"] =
            json!({"class": "H5T_INTEGER", "base": "H5T_STD_I32LE", "size": 4});
        assert!(!SchemaValidator::new().validate(&doc).is_empty());
    }

    #[test]
    fn test_well_known_filter_with_wrong_id() {
        let mut doc = valid_document();
        doc["datasets"][DSET]["creationProperties"]["filters"][0]["id"] = json!(5);
        let violations = SchemaValidator::new().validate(&doc);
        assert!(!violations.is_empty());
        assert!(
            violations
                .iter()
                .all(|v| v.location.starts_with(&format!("/datasets/{}/creationProperties/filters/0", DSET)))
        );
    }

    #[test]
    fn test_userblock_requires_size() {
        let mut doc = valid_document();
        doc.as_object_mut().unwrap().remove("userblockSize");
        assert!(!SchemaValidator::new().validate(&doc).is_empty());
    }

    #[test]
    fn test_bad_alias_and_key() {
        let mut doc = valid_document();
        doc["datasets"][DSET]["alias"] = json!(["temps"]);
        assert!(!SchemaValidator::new().validate(&doc).is_empty());

        let mut doc = valid_document();
        doc["groups"]["NOT-A-UUID"] = json!({});
        assert!(!SchemaValidator::new().validate(&doc).is_empty());
    }

    #[test]
    fn test_encoder_output_validates() {
        let doc = hdf5_json::Document::from_value(valid_document()).unwrap();
        let store = Decoder::default().decode(&doc, MemoryStore::new()).unwrap();
        let encoded = Encoder::default().encode(&store).unwrap().to_value().unwrap();
        let violations = SchemaValidator::new().validate(&encoded);
        assert!(violations.is_empty(), "unexpected violations: {:?}", violations);
    }
}

mod integrity_tests {
    use super::*;

    #[test]
    fn test_dangling_hard_link() {
        let mut doc = valid_document();
        doc["groups"][ROOT]["links"][0]["id"] = json!(OTHER);
        let violations = SchemaValidator::new().validate(&doc);
        assert!(violations.iter().any(|v| {
            v.location.starts_with(&format!("/groups/{}/links", ROOT)) && v.rule.contains(OTHER)
        }));
    }

    #[test]
    fn test_duplicate_link_title() {
        let mut doc = valid_document();
        doc["groups"][ROOT]["links"][2]["title"] = json!("temps");
        assert!(!SchemaValidator::new().validate(&doc).is_empty());
    }

    #[test]
    fn test_reserved_link_class_rejected() {
        let mut doc = valid_document();
        doc["groups"][ROOT]["links"][4]["linkClass"] = json!(3);
        let violations = SchemaValidator::new().validate(&doc);
        let location = format!("/groups/{}/links/4/linkClass", ROOT);
        assert!(violations.iter().any(|v| v.location == location));

        let issues = hdf5_json::validation::check_structure(
            &hdf5_json::Document::from_value(doc).unwrap(),
        );
        assert!(issues.iter().any(|i| i.location() == location));
    }

    #[test]
    fn test_committed_cycle_reported() {
        let mut doc = valid_document();
        doc["datatypes"][OTHER] = json!({"type": {"class": "H5T_VLEN", "base": format!("datatypes/{}", TYPE)}});
        doc["datatypes"][TYPE]["type"] =
            json!({"class": "H5T_ARRAY", "dims": [2], "base": format!("datatypes/{}", OTHER)});
        doc["datasets"][DSET].as_object_mut().unwrap().remove("value");
        doc["datasets"][DSET]["creationProperties"]
            .as_object_mut()
            .unwrap()
            .remove("fillValue");
        let violations = SchemaValidator::new().validate(&doc);
        assert_eq!(violations.len(), 1, "{:?}", violations);
        assert!(violations[0].rule.contains("cycle"));
    }
}

mod batch_tests {
    use super::*;

    #[test]
    fn test_folder_validates_every_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = valid_document();
        bad["userblockSize"] = json!(500);
        fs::write(dir.path().join("a_good.json"), valid_document().to_string()).unwrap();
        fs::write(dir.path().join("b_bad.json"), bad.to_string()).unwrap();
        fs::write(dir.path().join("c_broken.json"), "{").unwrap();
        fs::write(dir.path().join("readme.md"), "# not a document").unwrap();

        let report = SchemaValidator::new().validate_path(dir.path()).unwrap();
        assert_eq!(report.documents.len(), 3);
        assert!(!report.is_valid());
        assert!(report.documents[0].is_valid());
        assert!(report.documents[0].path.ends_with("a_good.json"));
        assert_eq!(report.documents[1].violations.len(), 1);
        assert_eq!(report.failed().count(), 2);
    }

    #[test]
    fn test_stop_on_first_continues_to_next_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = valid_document();
        bad["userblockSize"] = json!(500);
        bad["apiVersion"] = json!("0.1");
        fs::write(dir.path().join("1.json"), bad.to_string()).unwrap();
        fs::write(dir.path().join("2.json"), bad.to_string()).unwrap();

        let validator = SchemaValidator::with_config(
            ValidatorConfig::default().with_mode(ValidationMode::StopOnFirst),
        );
        let report = validator.validate_path(dir.path()).unwrap();
        assert_eq!(report.documents.len(), 2);
        assert!(report.documents.iter().all(|d| d.violations.len() == 1));
        assert_eq!(report.violation_count(), 2);
    }

    #[test]
    fn test_unreadable_document_reported_in_place() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), valid_document().to_string()).unwrap();
        fs::write(dir.path().join("b.json"), [0xff, 0xfe, 0x00]).unwrap();
        fs::write(dir.path().join("c.json"), valid_document().to_string()).unwrap();

        let report = SchemaValidator::new().validate_path(dir.path()).unwrap();
        assert_eq!(report.documents.len(), 3);
        assert!(report.documents[0].is_valid());
        assert!(report.documents[2].is_valid());
        let unreadable = &report.documents[1];
        assert!(unreadable.path.ends_with("b.json"));
        assert_eq!(unreadable.violations.len(), 1);
        assert_eq!(unreadable.violations[0].location, "");
        assert!(unreadable.violations[0].rule.starts_with("Failed to read file"));
    }

    #[test]
    fn test_single_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, valid_document().to_string()).unwrap();
        let report = SchemaValidator::new().validate_path(&path).unwrap();
        assert_eq!(report.documents.len(), 1);
        assert!(report.is_valid());
    }
}
