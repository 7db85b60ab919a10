//! Dataspace (shape) and selection model

use crate::error::{Hdf5JsonError, Result};
use serde_json::{Map, Value, json};

/// Sentinel for an unlimited maximum extent
pub const UNLIMITED: &str = "H5S_UNLIMITED";

/// Largest rank a simple dataspace may have
pub const MAX_RANK: usize = 32;

/// Maximum size of one dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extent {
    Fixed(u64),
    Unlimited,
}

impl Extent {
    fn to_json(self) -> Value {
        match self {
            Extent::Fixed(n) => json!(n),
            Extent::Unlimited => json!(UNLIMITED),
        }
    }
}

/// Shape of a dataset or attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dataspace {
    Null,
    Scalar,
    Simple { dims: Vec<u64>, maxdims: Vec<Extent> },
}

impl Dataspace {
    /// Fixed-size simple dataspace
    pub fn simple(dims: Vec<u64>) -> Self {
        let maxdims = dims.iter().map(|d| Extent::Fixed(*d)).collect();
        Dataspace::Simple { dims, maxdims }
    }

    /// Simple dataspace with explicit maximum extents
    pub fn extensible(dims: Vec<u64>, maxdims: Vec<Extent>) -> Self {
        Dataspace::Simple { dims, maxdims }
    }

    pub fn rank(&self) -> usize {
        match self {
            Dataspace::Simple { dims, .. } => dims.len(),
            _ => 0,
        }
    }

    pub fn dims(&self) -> &[u64] {
        match self {
            Dataspace::Simple { dims, .. } => dims,
            _ => &[],
        }
    }

    pub fn element_count(&self) -> u64 {
        match self {
            Dataspace::Null => 0,
            Dataspace::Scalar => 1,
            Dataspace::Simple { dims, .. } => dims.iter().product(),
        }
    }

    /// True when some dimension may grow beyond its current size
    pub fn is_extensible(&self) -> bool {
        match self {
            Dataspace::Simple { dims, maxdims } => {
                dims.iter().zip(maxdims).any(|(d, m)| match m {
                    Extent::Fixed(max) => max != d,
                    Extent::Unlimited => true,
                })
            }
            _ => false,
        }
    }

    /// JSON form; `maxdims` is written only for extensible dataspaces
    pub fn to_json(&self) -> Value {
        match self {
            Dataspace::Null => json!({"class": "H5S_NULL"}),
            Dataspace::Scalar => json!({"class": "H5S_SCALAR"}),
            Dataspace::Simple { dims, maxdims } => {
                let mut obj = Map::new();
                obj.insert("class".to_string(), json!("H5S_SIMPLE"));
                obj.insert("dims".to_string(), json!(dims));
                if self.is_extensible() {
                    let maxdims: Vec<Value> = maxdims.iter().map(|m| m.to_json()).collect();
                    obj.insert("maxdims".to_string(), Value::Array(maxdims));
                }
                Value::Object(obj)
            }
        }
    }

    /// Parse the JSON form of a dataspace found at `location`
    pub fn from_json(value: &Value, location: &str) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Hdf5JsonError::dataspace(location, "expected a dataspace object"))?;
        let class = obj
            .get("class")
            .and_then(Value::as_str)
            .ok_or_else(|| Hdf5JsonError::dataspace(location, "missing 'class'"))?;

        let allowed: &[&str] = match class {
            "H5S_NULL" | "H5S_SCALAR" => &["class"],
            "H5S_SIMPLE" => &["class", "dims", "maxdims"],
            other => {
                return Err(Hdf5JsonError::dataspace(
                    location,
                    format!("unknown dataspace class '{}'", other),
                ));
            }
        };
        if let Some(key) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(Hdf5JsonError::dataspace(
                location,
                format!("field '{}' does not belong to {}", key, class),
            ));
        }

        match class {
            "H5S_NULL" => Ok(Dataspace::Null),
            "H5S_SCALAR" => Ok(Dataspace::Scalar),
            _ => {
                let dims = obj
                    .get("dims")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Hdf5JsonError::dataspace(location, "missing 'dims'"))?;
                if dims.is_empty() || dims.len() > MAX_RANK {
                    return Err(Hdf5JsonError::dataspace(
                        location,
                        format!("rank must be between 1 and {}", MAX_RANK),
                    ));
                }
                let dims = dims
                    .iter()
                    .map(|d| {
                        d.as_u64().ok_or_else(|| {
                            Hdf5JsonError::dataspace(location, "dims must be non-negative integers")
                        })
                    })
                    .collect::<Result<Vec<u64>>>()?;

                let maxdims = match obj.get("maxdims") {
                    None => dims.iter().map(|d| Extent::Fixed(*d)).collect(),
                    Some(max) => parse_maxdims(max, &dims, location)?,
                };
                Ok(Dataspace::Simple { dims, maxdims })
            }
        }
    }
}

fn parse_maxdims(value: &Value, dims: &[u64], location: &str) -> Result<Vec<Extent>> {
    let entries = value
        .as_array()
        .ok_or_else(|| Hdf5JsonError::dataspace(location, "'maxdims' must be an array"))?;
    if entries.len() != dims.len() {
        return Err(Hdf5JsonError::dataspace(
            location,
            format!("'maxdims' has rank {} but 'dims' has rank {}", entries.len(), dims.len()),
        ));
    }
    entries
        .iter()
        .zip(dims)
        .map(|(entry, dim)| match entry {
            Value::String(s) if s == UNLIMITED => Ok(Extent::Unlimited),
            _ => match entry.as_u64() {
                Some(max) if max > 0 && max >= *dim => Ok(Extent::Fixed(max)),
                _ => Err(Hdf5JsonError::dataspace(
                    location,
                    format!(
                        "maxdims entries must be {} or a positive integer >= the matching dims entry",
                        UNLIMITED
                    ),
                )),
            },
        })
        .collect()
}

/// One hyperslab block; `end` is exclusive
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HyperslabBlock {
    pub start: Vec<u64>,
    pub end: Vec<u64>,
}

/// Region of a dataspace, used inside region references
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selection {
    Hyperslab(Vec<HyperslabBlock>),
    Points(Vec<Vec<u64>>),
}

pub const SELECT_HYPERSLABS: &str = "H5S_SEL_HYPERSLABS";
pub const SELECT_POINTS: &str = "H5S_SEL_POINTS";

impl Selection {
    pub fn select_type(&self) -> &'static str {
        match self {
            Selection::Hyperslab(_) => SELECT_HYPERSLABS,
            Selection::Points(_) => SELECT_POINTS,
        }
    }

    /// JSON form of the coordinates (`[[start, end], ...]` or `[point, ...]`)
    pub fn coordinates_json(&self) -> Value {
        match self {
            Selection::Hyperslab(blocks) => Value::Array(
                blocks
                    .iter()
                    .map(|b| json!([b.start, b.end]))
                    .collect(),
            ),
            Selection::Points(points) => json!(points),
        }
    }

    /// Parse a selection from its `select_type` and coordinate list
    pub fn from_json(select_type: &str, coordinates: &Value, location: &str) -> Result<Self> {
        let entries = coordinates
            .as_array()
            .ok_or_else(|| Hdf5JsonError::dataspace(location, "'selection' must be an array"))?;
        match select_type {
            SELECT_POINTS => entries
                .iter()
                .map(|p| coordinate(p, location))
                .collect::<Result<Vec<_>>>()
                .map(Selection::Points),
            SELECT_HYPERSLABS => entries
                .iter()
                .map(|pair| {
                    let corners = pair.as_array().filter(|c| c.len() == 2).ok_or_else(|| {
                        Hdf5JsonError::dataspace(location, "hyperslab blocks must be [start, end] pairs")
                    })?;
                    Ok(HyperslabBlock {
                        start: coordinate(&corners[0], location)?,
                        end: coordinate(&corners[1], location)?,
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Selection::Hyperslab),
            other => Err(Hdf5JsonError::dataspace(
                location,
                format!(
                    "select_type must be {} or {}, got '{}'",
                    SELECT_HYPERSLABS, SELECT_POINTS, other
                ),
            )),
        }
    }

    /// Check every coordinate against the rank and extent of `space`
    pub fn check_within(&self, space: &Dataspace, location: &str) -> Result<()> {
        let dims = space.dims();
        let fits = |coord: &[u64], inclusive_end: bool| -> Result<()> {
            if coord.len() != dims.len() {
                return Err(Hdf5JsonError::dataspace(
                    location,
                    format!(
                        "coordinate rank {} does not match dataspace rank {}",
                        coord.len(),
                        dims.len()
                    ),
                ));
            }
            let outside = coord.iter().zip(dims).any(|(c, d)| {
                if inclusive_end { c > d } else { c >= d }
            });
            if outside {
                return Err(Hdf5JsonError::dataspace(
                    location,
                    format!("coordinate {:?} lies outside dims {:?}", coord, dims),
                ));
            }
            Ok(())
        };
        match self {
            Selection::Points(points) => points.iter().try_for_each(|p| fits(p, false)),
            Selection::Hyperslab(blocks) => blocks.iter().try_for_each(|block| {
                fits(&block.start, false)?;
                fits(&block.end, true)?;
                if block.start.iter().zip(&block.end).any(|(s, e)| e <= s) {
                    return Err(Hdf5JsonError::dataspace(
                        location,
                        "hyperslab end corner must be greater than its start corner",
                    ));
                }
                Ok(())
            }),
        }
    }
}

fn coordinate(value: &Value, location: &str) -> Result<Vec<u64>> {
    value
        .as_array()
        .and_then(|c| c.iter().map(Value::as_u64).collect::<Option<Vec<u64>>>())
        .ok_or_else(|| {
            Hdf5JsonError::dataspace(location, "coordinates must be arrays of non-negative integers")
        })
}

/// Reference to a region of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionReference<R> {
    pub dataset: R,
    pub selection: Selection,
}

impl<R> RegionReference<R> {
    pub fn try_map<S, E>(&self, f: &mut impl FnMut(&R) -> std::result::Result<S, E>) -> std::result::Result<RegionReference<S>, E> {
        Ok(RegionReference {
            dataset: f(&self.dataset)?,
            selection: self.selection.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_simple_omits_maxdims() {
        let json = Dataspace::simple(vec![4]).to_json();
        assert_eq!(json, json!({"class": "H5S_SIMPLE", "dims": [4]}));
        assert_eq!(Dataspace::from_json(&json, "/shape").unwrap(), Dataspace::simple(vec![4]));
    }

    #[test]
    fn test_unlimited_maxdims_round_trip() {
        let space = Dataspace::extensible(vec![10, 2], vec![Extent::Unlimited, Extent::Fixed(2)]);
        let json = space.to_json();
        assert_eq!(json["maxdims"], json!(["H5S_UNLIMITED", 2]));
        assert_eq!(Dataspace::from_json(&json, "/shape").unwrap(), space);
    }

    #[test]
    fn test_invalid_shapes_are_rejected() {
        let cases = [
            json!({"class": "H5S_SIMPLE", "dims": [-1]}),
            json!({"class": "H5S_SIMPLE", "dims": []}),
            json!({"class": "H5S_SIMPLE", "dims": [3], "maxdims": [0]}),
            json!({"class": "H5S_SIMPLE", "dims": [3], "maxdims": [2]}),
            json!({"class": "H5S_SIMPLE", "dims": [3], "maxdims": [3, 3]}),
            json!({"class": "H5S_SCALAR", "dims": [1]}),
            json!({"class": "H5S_BOX"}),
        ];
        for case in cases {
            let result = Dataspace::from_json(&case, "/shape");
            assert!(
                matches!(result, Err(Hdf5JsonError::MalformedDataspace { .. })),
                "accepted {}",
                case
            );
        }
    }

    #[test]
    fn test_selection_rank_must_match() {
        let space = Dataspace::simple(vec![10, 10]);
        let points = Selection::from_json(SELECT_POINTS, &json!([[1, 2], [3]]), "/value").unwrap();
        assert!(points.check_within(&space, "/value").is_err());

        let slab = Selection::from_json(SELECT_HYPERSLABS, &json!([[[0, 0], [5, 10]]]), "/value").unwrap();
        assert!(slab.check_within(&space, "/value").is_ok());

        let empty_block = Selection::from_json(SELECT_HYPERSLABS, &json!([[[2, 2], [2, 4]]]), "/value").unwrap();
        assert!(empty_block.check_within(&space, "/value").is_err());
    }

    #[test]
    fn test_unknown_select_type_rejected() {
        let result = Selection::from_json("H5S_SEL_ALL", &json!([]), "/value");
        assert!(matches!(result, Err(Hdf5JsonError::MalformedDataspace { .. })));
    }
}
