//! Roundtrip command implementation
//!
//! Decodes a document into an in-memory store and encodes the store again.
//! With the default settings the output names every object by the same
//! identifier as the input.

use crate::cli::error::CliError;
use crate::codec::{Decoder, Encoder, EncoderConfig};
use crate::store::MemoryStore;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

/// Load input content from file or stdin
fn load_input(input: &str) -> Result<String, CliError> {
    if input == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .map_err(|e| CliError::InvalidArgument(format!("Failed to read stdin: {}", e)))?;
        Ok(content)
    } else {
        let path = PathBuf::from(input);
        std::fs::read_to_string(&path).map_err(|e| CliError::FileReadError(path, e.to_string()))
    }
}

/// Decode `input` and return the re-encoded document as pretty JSON
pub fn handle_roundtrip(input: &str, config: EncoderConfig) -> Result<String, CliError> {
    let content = load_input(input)?;
    roundtrip_str(&content, config)
}

pub fn roundtrip_str(content: &str, config: EncoderConfig) -> Result<String, CliError> {
    let store = Decoder::default().decode_str(content, MemoryStore::new())?;
    info!(objects = store.len(), "Decoded into memory store");
    let doc = Encoder::new(config).encode(&store)?;
    doc.to_json_string_pretty()
        .map_err(|e| CliError::Codec(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ValueMode;
    use serde_json::Value;

    const DOC: &str = r#"{
        "apiVersion": "1.1.1",
        "root": "00000000-0000-4000-8000-000000000001",
        "groups": {
            "00000000-0000-4000-8000-000000000001": {
                "alias": ["/"],
                "links": [{"class": "H5L_TYPE_HARD", "title": "d", "collection": "datasets", "id": "00000000-0000-4000-8000-000000000002"}]
            }
        },
        "datasets": {
            "00000000-0000-4000-8000-000000000002": {
                "alias": ["/d"],
                "type": {"class": "H5T_INTEGER", "base": "H5T_STD_I32LE"},
                "shape": {"class": "H5S_SIMPLE", "dims": [2]},
                "value": [7, 8]
            }
        }
    }"#;

    #[test]
    fn test_roundtrip_keeps_identifiers_and_values() {
        let out: Value = serde_json::from_str(&roundtrip_str(DOC, EncoderConfig::default()).unwrap()).unwrap();
        let dset = &out["datasets"]["00000000-0000-4000-8000-000000000002"];
        assert_eq!(dset["value"], serde_json::json!([7, 8]));
        assert_eq!(dset["alias"], serde_json::json!(["/d"]));
    }

    #[test]
    fn test_roundtrip_structure_only() {
        let config = EncoderConfig::default().with_value_mode(ValueMode::StructureOnly);
        let out: Value = serde_json::from_str(&roundtrip_str(DOC, config).unwrap()).unwrap();
        assert!(out["datasets"]["00000000-0000-4000-8000-000000000002"].get("value").is_none());
    }

    #[test]
    fn test_roundtrip_rejects_unresolved_link() {
        let broken = DOC.replace("\"collection\": \"datasets\", \"id\": \"00000000-0000-4000-8000-000000000002\"", "\"collection\": \"datasets\", \"id\": \"00000000-0000-4000-8000-0000000000ff\"");
        assert!(matches!(
            roundtrip_str(&broken, EncoderConfig::default()),
            Err(CliError::Codec(_))
        ));
    }
}
