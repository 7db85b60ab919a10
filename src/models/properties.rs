//! Creation property bundles
//!
//! Plain records; every field is optional and an absent field means "native
//! default". Nothing here invents a value the source did not carry.

use crate::error::{Hdf5JsonError, Result};
use crate::models::dataspace::Dataspace;
use crate::models::datatype::CharSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Link/attribute creation order tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreationOrder {
    #[serde(rename = "H5P_CRT_ORDER_TRACKED")]
    Tracked,
    /// Tracked and indexed
    #[serde(rename = "H5P_CRT_ORDER_INDEXED")]
    Indexed,
}

/// Compact/dense storage switch-over thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PhaseChange {
    pub max_compact: u32,
    pub min_dense: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinksEstimate {
    pub num_entries: u32,
    pub name_length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocTime {
    #[serde(rename = "H5D_ALLOC_TIME_DEFAULT")]
    Default,
    #[serde(rename = "H5D_ALLOC_TIME_EARLY")]
    Early,
    #[serde(rename = "H5D_ALLOC_TIME_INCR")]
    Incremental,
    #[serde(rename = "H5D_ALLOC_TIME_LATE")]
    Late,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillTime {
    #[serde(rename = "H5D_FILL_TIME_IFSET")]
    IfSet,
    #[serde(rename = "H5D_FILL_TIME_ALLOC")]
    Alloc,
    #[serde(rename = "H5D_FILL_TIME_NEVER")]
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SzipCoding {
    #[serde(rename = "H5_SZIP_EC_OPTION_MASK")]
    EntropyCoding,
    #[serde(rename = "H5_SZIP_NN_OPTION_MASK")]
    NearestNeighbor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleType {
    #[serde(rename = "H5Z_SO_FLOAT_DSCALE")]
    FloatDScale,
    #[serde(rename = "H5Z_SO_FLOAT_ESCALE")]
    FloatEScale,
    #[serde(rename = "H5Z_SO_INT")]
    Integer,
}

pub const FILTER_DEFLATE: u32 = 1;
pub const FILTER_SHUFFLE: u32 = 2;
pub const FILTER_FLETCHER32: u32 = 3;
pub const FILTER_SZIP: u32 = 4;
pub const FILTER_NBIT: u32 = 5;
pub const FILTER_SCALEOFFSET: u32 = 6;
pub const FILTER_LZF: u32 = 32000;

const WELL_KNOWN_FILTERS: &[u32] = &[
    FILTER_DEFLATE,
    FILTER_SHUFFLE,
    FILTER_FLETCHER32,
    FILTER_SZIP,
    FILTER_NBIT,
    FILTER_SCALEOFFSET,
    FILTER_LZF,
];

/// One stage of a filter pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FilterRepr", into = "FilterRepr")]
pub enum Filter {
    Deflate {
        level: u32,
    },
    Shuffle,
    Fletcher32,
    Szip {
        bits_per_pixel: u32,
        coding: SzipCoding,
        pixels_per_block: u32,
        pixels_per_scan_line: u32,
    },
    NBit,
    ScaleOffset {
        scale_type: ScaleType,
        scale_offset: i32,
    },
    Lzf,
    User {
        id: u32,
        name: Option<String>,
        parameters: Vec<u32>,
    },
}

impl Filter {
    pub fn id(&self) -> u32 {
        match self {
            Filter::Deflate { .. } => FILTER_DEFLATE,
            Filter::Shuffle => FILTER_SHUFFLE,
            Filter::Fletcher32 => FILTER_FLETCHER32,
            Filter::Szip { .. } => FILTER_SZIP,
            Filter::NBit => FILTER_NBIT,
            Filter::ScaleOffset { .. } => FILTER_SCALEOFFSET,
            Filter::Lzf => FILTER_LZF,
            Filter::User { id, .. } => *id,
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Filter::Deflate { .. } => "H5Z_FILTER_DEFLATE",
            Filter::Shuffle => "H5Z_FILTER_SHUFFLE",
            Filter::Fletcher32 => "H5Z_FILTER_FLETCHER32",
            Filter::Szip { .. } => "H5Z_FILTER_SZIP",
            Filter::NBit => "H5Z_FILTER_NBIT",
            Filter::ScaleOffset { .. } => "H5Z_FILTER_SCALEOFFSET",
            Filter::Lzf => "H5Z_FILTER_LZF",
            Filter::User { .. } => "H5Z_FILTER_USER",
        }
    }
}

/// Flat wire shape of a filter; checked into [`Filter`] on the way in
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FilterRepr {
    class: String,
    id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bits_per_pixel: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coding: Option<SzipCoding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pixels_per_block: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pixels_per_scan_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale_type: Option<ScaleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale_offset: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameters: Option<Vec<u32>>,
}

/// Reason a filter entry was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterError(String);

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FilterRepr {
    fn present_options(&self) -> Vec<&'static str> {
        let mut present = Vec::new();
        if self.name.is_some() {
            present.push("name");
        }
        if self.level.is_some() {
            present.push("level");
        }
        if self.bits_per_pixel.is_some() {
            present.push("bitsPerPixel");
        }
        if self.coding.is_some() {
            present.push("coding");
        }
        if self.pixels_per_block.is_some() {
            present.push("pixelsPerBlock");
        }
        if self.pixels_per_scan_line.is_some() {
            present.push("pixelsPerScanLine");
        }
        if self.scale_type.is_some() {
            present.push("scaleType");
        }
        if self.scale_offset.is_some() {
            present.push("scaleOffset");
        }
        if self.parameters.is_some() {
            present.push("parameters");
        }
        present
    }

    fn expect(&self, id: u32, allowed: &[&str]) -> std::result::Result<(), FilterError> {
        if self.id != id {
            return Err(FilterError(format!(
                "{} must have id {}, got {}",
                self.class, id, self.id
            )));
        }
        match self.present_options().into_iter().find(|o| !allowed.contains(o)) {
            Some(option) => Err(FilterError(format!(
                "option '{}' does not belong to {}",
                option, self.class
            ))),
            None => Ok(()),
        }
    }

    fn required<T: Copy>(&self, value: Option<T>, option: &str) -> std::result::Result<T, FilterError> {
        value.ok_or_else(|| FilterError(format!("{} requires '{}'", self.class, option)))
    }
}

impl TryFrom<FilterRepr> for Filter {
    type Error = FilterError;

    fn try_from(repr: FilterRepr) -> std::result::Result<Self, Self::Error> {
        match repr.class.as_str() {
            "H5Z_FILTER_DEFLATE" => {
                repr.expect(FILTER_DEFLATE, &["level"])?;
                let level = repr.required(repr.level, "level")?;
                if level > 9 {
                    return Err(FilterError(format!("deflate level {} is outside 0..=9", level)));
                }
                Ok(Filter::Deflate { level })
            }
            "H5Z_FILTER_SHUFFLE" => repr.expect(FILTER_SHUFFLE, &[]).map(|_| Filter::Shuffle),
            "H5Z_FILTER_FLETCHER32" => repr.expect(FILTER_FLETCHER32, &[]).map(|_| Filter::Fletcher32),
            "H5Z_FILTER_SZIP" => {
                repr.expect(
                    FILTER_SZIP,
                    &["bitsPerPixel", "coding", "pixelsPerBlock", "pixelsPerScanLine"],
                )?;
                Ok(Filter::Szip {
                    bits_per_pixel: repr.required(repr.bits_per_pixel, "bitsPerPixel")?,
                    coding: repr.required(repr.coding, "coding")?,
                    pixels_per_block: repr.required(repr.pixels_per_block, "pixelsPerBlock")?,
                    pixels_per_scan_line: repr.required(repr.pixels_per_scan_line, "pixelsPerScanLine")?,
                })
            }
            "H5Z_FILTER_NBIT" => repr.expect(FILTER_NBIT, &[]).map(|_| Filter::NBit),
            "H5Z_FILTER_SCALEOFFSET" => {
                repr.expect(FILTER_SCALEOFFSET, &["scaleType", "scaleOffset"])?;
                Ok(Filter::ScaleOffset {
                    scale_type: repr.required(repr.scale_type, "scaleType")?,
                    scale_offset: repr.required(repr.scale_offset, "scaleOffset")?,
                })
            }
            "H5Z_FILTER_LZF" => repr.expect(FILTER_LZF, &[]).map(|_| Filter::Lzf),
            "H5Z_FILTER_USER" => {
                if repr.id == 0 || WELL_KNOWN_FILTERS.contains(&repr.id) {
                    return Err(FilterError(format!(
                        "user filter id {} must be positive and not a well-known filter id",
                        repr.id
                    )));
                }
                repr.expect(repr.id, &["name", "parameters"])?;
                Ok(Filter::User {
                    id: repr.id,
                    name: repr.name,
                    parameters: repr.parameters.unwrap_or_default(),
                })
            }
            other => Err(FilterError(format!("unknown filter class '{}'", other))),
        }
    }
}

impl From<Filter> for FilterRepr {
    fn from(filter: Filter) -> Self {
        let mut repr = FilterRepr {
            class: filter.class_name().to_string(),
            id: filter.id(),
            ..Default::default()
        };
        match filter {
            Filter::Deflate { level } => repr.level = Some(level),
            Filter::Szip {
                bits_per_pixel,
                coding,
                pixels_per_block,
                pixels_per_scan_line,
            } => {
                repr.bits_per_pixel = Some(bits_per_pixel);
                repr.coding = Some(coding);
                repr.pixels_per_block = Some(pixels_per_block);
                repr.pixels_per_scan_line = Some(pixels_per_scan_line);
            }
            Filter::ScaleOffset {
                scale_type,
                scale_offset,
            } => {
                repr.scale_type = Some(scale_type);
                repr.scale_offset = Some(scale_offset);
            }
            Filter::User {
                name, parameters, ..
            } => {
                repr.name = name;
                repr.parameters = Some(parameters);
            }
            Filter::Shuffle | Filter::Fletcher32 | Filter::NBit | Filter::Lzf => {}
        }
        repr
    }
}

/// Segment of a contiguous dataset stored in an external file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExternalFile {
    pub name: String,
    pub offset: u64,
    pub size: u64,
}

/// Raw data storage layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum Layout {
    #[serde(rename = "H5D_COMPACT")]
    Compact,
    #[serde(rename = "H5D_CONTIGUOUS")]
    Contiguous {
        #[serde(
            rename = "externalStorage",
            default,
            skip_serializing_if = "Vec::is_empty"
        )]
        external_storage: Vec<ExternalFile>,
    },
    #[serde(rename = "H5D_CHUNKED")]
    Chunked { dims: Vec<u64> },
}

/// Creation properties of a dataset (the fill value travels beside these)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetCreationProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alloc_time: Option<AllocTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_time: Option<FillTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_times: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_creation_order: Option<CreationOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_phase_change: Option<PhaseChange>,
}

impl DatasetCreationProperties {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check the layout against the dataset's dataspace
    pub fn check_layout(&self, space: &Dataspace, location: &str) -> Result<()> {
        let Some(Layout::Chunked { dims }) = &self.layout else {
            return Ok(());
        };
        let location = format!("{}/layout", location);
        if !matches!(space, Dataspace::Simple { .. }) {
            return Err(Hdf5JsonError::dataspace(location, "chunked layout needs a simple dataspace"));
        }
        if dims.len() != space.rank() {
            return Err(Hdf5JsonError::dataspace(
                location,
                format!(
                    "chunk rank {} does not match dataspace rank {}",
                    dims.len(),
                    space.rank()
                ),
            ));
        }
        if dims.contains(&0) {
            return Err(Hdf5JsonError::dataspace(location, "chunk dimensions must be positive"));
        }
        Ok(())
    }
}

/// Creation properties of a group
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCreationProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_creation_order: Option<CreationOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_creation_order: Option<CreationOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_phase_change: Option<PhaseChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_phase_change: Option<PhaseChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links_estimate: Option<LinksEstimate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_heap_size_hint: Option<u64>,
    /// Filters applied to the link-name heap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_times: Option<bool>,
}

impl GroupCreationProperties {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether links are enumerated in creation order rather than by name
    pub fn tracks_link_order(&self) -> bool {
        self.link_creation_order.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttributeCreationProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_char_encoding: Option<CharSet>,
}

impl AttributeCreationProperties {
    pub fn is_empty(&self) -> bool {
        self.name_char_encoding.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkCreationProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_char_encoding: Option<CharSet>,
}

impl LinkCreationProperties {
    pub fn is_empty(&self) -> bool {
        self.name_char_encoding.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddressSizes {
    pub offset_size: u8,
    pub length_size: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SharedMessageType {
    #[serde(rename = "H5O_SHMESG_NONE_FLAG")]
    None,
    #[serde(rename = "H5O_SHMESG_SDSPACE_FLAG")]
    Dataspace,
    #[serde(rename = "H5O_SHMESG_DTYPE_FLAG")]
    Datatype,
    #[serde(rename = "H5O_SHMESG_FILL_FLAG")]
    FillValue,
    #[serde(rename = "H5O_SHMESG_PLINE_FLAG")]
    FilterPipeline,
    #[serde(rename = "H5O_SHMESG_ATTR_FLAG")]
    Attribute,
    #[serde(rename = "H5O_SHMESG_ALL_FLAG")]
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SharedMessageIndex {
    pub message_types: Vec<SharedMessageType>,
    pub min_message_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SharedMessagePhaseChange {
    pub max_list: u32,
    pub min_btree: u32,
}

/// Shared object header message configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SharedMessageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_change: Option<SharedMessagePhaseChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<SharedMessageIndex>,
}

/// Symbol table B-tree rank and leaf node size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SymbolTableConfig {
    pub tree_rank: u32,
    pub node_size: u32,
}

/// File-level creation properties
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCreationProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_btree_rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_list_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_block_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<AddressSizes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_messages: Option<SharedMessageConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_table: Option<SymbolTableConfig>,
}

impl FileCreationProperties {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryType {
    #[serde(rename = "H5FD_MEM_SUPER")]
    Super,
    #[serde(rename = "H5FD_MEM_BTREE")]
    BTree,
    #[serde(rename = "H5FD_MEM_DRAW")]
    RawData,
    #[serde(rename = "H5FD_MEM_GHEAP")]
    GlobalHeap,
    #[serde(rename = "H5FD_MEM_LHEAP")]
    LocalHeap,
    #[serde(rename = "H5FD_MEM_OHDR")]
    ObjectHeader,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MultiDriverMember {
    pub data_map: MemoryType,
    pub file_name: String,
    pub address: u64,
    pub relax_flag: bool,
}

/// File driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DriverInfo {
    Family {
        #[serde(rename = "memberSize")]
        member_size: u64,
    },
    Multi(Vec<MultiDriverMember>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_well_known_filter_wire_shape() {
        let filter = Filter::Deflate { level: 6 };
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json, json!({"class": "H5Z_FILTER_DEFLATE", "id": 1, "level": 6}));
        assert_eq!(serde_json::from_value::<Filter>(json).unwrap(), filter);
    }

    #[test]
    fn test_szip_and_scale_offset_options() {
        let szip: Filter = serde_json::from_value(json!({
            "class": "H5Z_FILTER_SZIP", "id": 4, "bitsPerPixel": 8,
            "coding": "H5_SZIP_NN_OPTION_MASK", "pixelsPerBlock": 32, "pixelsPerScanLine": 64
        }))
        .unwrap();
        assert!(matches!(szip, Filter::Szip { coding: SzipCoding::NearestNeighbor, .. }));

        let so: Filter = serde_json::from_value(json!({
            "class": "H5Z_FILTER_SCALEOFFSET", "id": 6, "scaleType": "H5Z_SO_INT", "scaleOffset": 0
        }))
        .unwrap();
        assert_eq!(so.id(), FILTER_SCALEOFFSET);
    }

    #[test]
    fn test_filter_with_wrong_id_or_foreign_option_is_rejected() {
        assert!(serde_json::from_value::<Filter>(json!({"class": "H5Z_FILTER_SHUFFLE", "id": 3})).is_err());
        assert!(
            serde_json::from_value::<Filter>(json!({"class": "H5Z_FILTER_SHUFFLE", "id": 2, "level": 4}))
                .is_err()
        );
        assert!(serde_json::from_value::<Filter>(json!({"class": "H5Z_FILTER_DEFLATE", "id": 1})).is_err());
    }

    #[test]
    fn test_user_filter() {
        let json = json!({"class": "H5Z_FILTER_USER", "id": 307, "name": "bzip2", "parameters": [9]});
        let filter: Filter = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(filter.id(), 307);
        assert_eq!(serde_json::to_value(&filter).unwrap(), json);
        assert!(serde_json::from_value::<Filter>(json!({"class": "H5Z_FILTER_USER", "id": 1})).is_err());
    }

    #[test]
    fn test_layout_shapes() {
        let chunked: Layout = serde_json::from_value(json!({"class": "H5D_CHUNKED", "dims": [10, 10]})).unwrap();
        assert_eq!(chunked, Layout::Chunked { dims: vec![10, 10] });
        let compact: Layout = serde_json::from_value(json!({"class": "H5D_COMPACT"})).unwrap();
        assert_eq!(compact, Layout::Compact);
        let contiguous = Layout::Contiguous {
            external_storage: vec![],
        };
        assert_eq!(serde_json::to_value(&contiguous).unwrap(), json!({"class": "H5D_CONTIGUOUS"}));
    }

    #[test]
    fn test_chunk_rank_must_match_dataspace() {
        let props = DatasetCreationProperties {
            layout: Some(Layout::Chunked { dims: vec![4] }),
            ..Default::default()
        };
        assert!(props.check_layout(&Dataspace::simple(vec![8]), "/datasets/x/creationProperties").is_ok());
        assert!(props.check_layout(&Dataspace::simple(vec![8, 8]), "/datasets/x/creationProperties").is_err());
        assert!(props.check_layout(&Dataspace::Scalar, "/datasets/x/creationProperties").is_err());
    }

    #[test]
    fn test_driver_info_shapes() {
        let family: DriverInfo = serde_json::from_value(json!({"memberSize": 1048576})).unwrap();
        assert_eq!(family, DriverInfo::Family { member_size: 1048576 });
        let multi: DriverInfo = serde_json::from_value(json!([
            {"dataMap": "H5FD_MEM_SUPER", "fileName": "f-s.h5", "address": 0, "relaxFlag": false}
        ]))
        .unwrap();
        assert!(matches!(multi, DriverInfo::Multi(ref members) if members.len() == 1));
    }

    #[test]
    fn test_empty_bundles_are_detected() {
        assert!(GroupCreationProperties::default().is_empty());
        let tracked = GroupCreationProperties {
            link_creation_order: Some(CreationOrder::Tracked),
            ..Default::default()
        };
        assert!(!tracked.is_empty());
        assert!(tracked.tracks_link_order());
    }
}
