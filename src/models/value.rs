//! Dataset and attribute values
//!
//! [`DataValue`] is the typed element tree exchanged with native stores. Like
//! [`Datatype`], it is generic over how references point at objects: native
//! addresses on the store side, [`ObjectRef`] on the document side. The JSON
//! mapping below only ever sees the document side.

use crate::error::{Hdf5JsonError, Result};
use crate::models::dataspace::{Dataspace, RegionReference, Selection};
use crate::models::datatype::{Datatype, ReferenceKind, StringLength, integer_from_json};
use crate::models::identifier::{Collection, Identifier, ObjectRef};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

/// Committed datatypes may nest through each other at most this deep
const MAX_COMMITTED_DEPTH: usize = 64;

/// Element values, nested by dataspace dimensions and by aggregate datatypes
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue<R> {
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    /// Opaque element bytes
    Bytes(Vec<u8>),
    ObjectRef(Option<R>),
    RegionRef(Option<RegionReference<R>>),
    /// Dataspace rows, array elements, variable-length sequences and compound records
    Sequence(Vec<DataValue<R>>),
}

impl<R> DataValue<R> {
    /// Rebuild this value with every object reference translated by `f`
    pub fn try_map_refs<S, E, F>(&self, f: &mut F) -> std::result::Result<DataValue<S>, E>
    where
        F: FnMut(&R) -> std::result::Result<S, E>,
    {
        Ok(match self {
            DataValue::Int(v) => DataValue::Int(*v),
            DataValue::UInt(v) => DataValue::UInt(*v),
            DataValue::Float(v) => DataValue::Float(*v),
            DataValue::String(s) => DataValue::String(s.clone()),
            DataValue::Bytes(b) => DataValue::Bytes(b.clone()),
            DataValue::ObjectRef(r) => DataValue::ObjectRef(r.as_ref().map(&mut *f).transpose()?),
            DataValue::RegionRef(r) => {
                DataValue::RegionRef(r.as_ref().map(|r| r.try_map(&mut *f)).transpose()?)
            }
            DataValue::Sequence(items) => {
                let mut mapped = Vec::with_capacity(items.len());
                for item in items {
                    mapped.push(item.try_map_refs(f)?);
                }
                DataValue::Sequence(mapped)
            }
        })
    }
}

/// What the JSON mapping needs to know about the surrounding document
pub trait ValueContext {
    /// Definition of a committed datatype
    fn committed_type(&self, id: &Identifier) -> Option<&Datatype>;

    /// Whether the document has an object at `reference`
    fn contains(&self, reference: &ObjectRef) -> bool;

    /// Dataspace of a dataset, used to check region selections
    fn dataset_space(&self, id: &Identifier) -> Option<&Dataspace>;
}

/// JSON form of a whole dataset/attribute value; `None` for null dataspaces
pub fn value_to_json(
    datatype: &Datatype,
    space: &Dataspace,
    value: &DataValue<ObjectRef>,
    ctx: &dyn ValueContext,
    location: &str,
) -> Result<Option<Value>> {
    match space {
        Dataspace::Null => Ok(None),
        Dataspace::Scalar => element_to_json(datatype, value, ctx, location, 0).map(Some),
        Dataspace::Simple { dims, .. } => {
            shaped_to_json(dims, datatype, value, ctx, location, 0).map(Some)
        }
    }
}

/// Parse the JSON form of a whole dataset/attribute value
pub fn value_from_json(
    datatype: &Datatype,
    space: &Dataspace,
    json: &Value,
    ctx: &dyn ValueContext,
    location: &str,
) -> Result<DataValue<ObjectRef>> {
    match space {
        Dataspace::Null => Err(Hdf5JsonError::value(location, "a null dataspace carries no value")),
        Dataspace::Scalar => element_from_json(datatype, json, ctx, location, 0),
        Dataspace::Simple { dims, .. } => shaped_from_json(dims, datatype, json, ctx, location, 0),
    }
}

/// JSON form of a single element (fill values)
pub fn element_value_to_json(
    datatype: &Datatype,
    value: &DataValue<ObjectRef>,
    ctx: &dyn ValueContext,
    location: &str,
) -> Result<Value> {
    element_to_json(datatype, value, ctx, location, 0)
}

/// Parse a single element (fill values)
pub fn element_value_from_json(
    datatype: &Datatype,
    json: &Value,
    ctx: &dyn ValueContext,
    location: &str,
) -> Result<DataValue<ObjectRef>> {
    element_from_json(datatype, json, ctx, location, 0)
}

fn resolve<'a>(
    id: &Identifier,
    ctx: &'a dyn ValueContext,
    location: &str,
    depth: usize,
) -> Result<&'a Datatype> {
    if depth >= MAX_COMMITTED_DEPTH {
        return Err(Hdf5JsonError::datatype(
            location,
            "committed datatypes nest too deeply (cyclic definition?)",
        ));
    }
    ctx.committed_type(id).ok_or_else(|| {
        Hdf5JsonError::unresolved(location, ObjectRef::new(Collection::Datatypes, *id).to_string())
    })
}

fn shaped_to_json(
    dims: &[u64],
    datatype: &Datatype,
    value: &DataValue<ObjectRef>,
    ctx: &dyn ValueContext,
    location: &str,
    depth: usize,
) -> Result<Value> {
    let Some((len, rest)) = dims.split_first() else {
        return element_to_json(datatype, value, ctx, location, depth);
    };
    let DataValue::Sequence(items) = value else {
        return Err(Hdf5JsonError::value(location, "expected a sequence of elements"));
    };
    if items.len() as u64 != *len {
        return Err(Hdf5JsonError::value(
            location,
            format!("expected {} elements, found {}", len, items.len()),
        ));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| shaped_to_json(rest, datatype, item, ctx, &format!("{}/{}", location, i), depth))
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

fn shaped_from_json(
    dims: &[u64],
    datatype: &Datatype,
    json: &Value,
    ctx: &dyn ValueContext,
    location: &str,
    depth: usize,
) -> Result<DataValue<ObjectRef>> {
    let Some((len, rest)) = dims.split_first() else {
        return element_from_json(datatype, json, ctx, location, depth);
    };
    let items = json
        .as_array()
        .ok_or_else(|| Hdf5JsonError::value(location, "expected an array"))?;
    if items.len() as u64 != *len {
        return Err(Hdf5JsonError::value(
            location,
            format!("expected {} elements, found {}", len, items.len()),
        ));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| shaped_from_json(rest, datatype, item, ctx, &format!("{}/{}", location, i), depth))
        .collect::<Result<Vec<_>>>()
        .map(DataValue::Sequence)
}

fn mismatch(datatype: &Datatype, value: &DataValue<ObjectRef>, location: &str) -> Hdf5JsonError {
    Hdf5JsonError::value(
        location,
        format!("{:?} is not a valid {} element", value, datatype.class_name()),
    )
}

fn element_to_json(
    datatype: &Datatype,
    value: &DataValue<ObjectRef>,
    ctx: &dyn ValueContext,
    location: &str,
    depth: usize,
) -> Result<Value> {
    match (datatype, value) {
        (
            Datatype::Integer(_) | Datatype::Bitfield(_) | Datatype::Enumeration(_),
            DataValue::Int(v),
        ) => Ok(json!(v)),
        (
            Datatype::Integer(_) | Datatype::Bitfield(_) | Datatype::Enumeration(_),
            DataValue::UInt(v),
        ) => Ok(json!(v)),
        (Datatype::Float(_), DataValue::Float(v)) => Ok(float_json(*v)),
        (Datatype::String(_), DataValue::String(s)) => Ok(json!(s)),
        (Datatype::Opaque(_), DataValue::Bytes(bytes)) => Ok(json!(STANDARD.encode(bytes))),
        (Datatype::Reference(ReferenceKind::Object), DataValue::ObjectRef(r)) => {
            Ok(r.map_or(Value::Null, |r| json!(r.to_string())))
        }
        (Datatype::Reference(ReferenceKind::DatasetRegion), DataValue::RegionRef(r)) => {
            Ok(match r {
                None => Value::Null,
                Some(region) => json!({
                    "id": region.dataset.id.to_string(),
                    "select_type": region.selection.select_type(),
                    "selection": region.selection.coordinates_json(),
                }),
            })
        }
        (Datatype::Array { base, dims }, _) => shaped_to_json(dims, base, value, ctx, location, depth),
        (Datatype::Compound(fields), DataValue::Sequence(items)) => {
            if items.len() != fields.len() {
                return Err(Hdf5JsonError::value(
                    location,
                    format!("compound record has {} fields, expected {}", items.len(), fields.len()),
                ));
            }
            fields
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (field, item))| {
                    element_to_json(&field.datatype, item, ctx, &format!("{}/{}", location, i), depth)
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        (Datatype::VariableLength(base), DataValue::Sequence(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| element_to_json(base, item, ctx, &format!("{}/{}", location, i), depth))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        (Datatype::Committed(id), _) => {
            let resolved = resolve(id, ctx, location, depth)?;
            element_to_json(resolved, value, ctx, location, depth + 1)
        }
        _ => Err(mismatch(datatype, value, location)),
    }
}

fn float_json(v: f64) -> Value {
    if v.is_nan() {
        json!("NaN")
    } else if v.is_infinite() {
        json!(if v > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        json!(v)
    }
}

fn element_from_json(
    datatype: &Datatype,
    json: &Value,
    ctx: &dyn ValueContext,
    location: &str,
    depth: usize,
) -> Result<DataValue<ObjectRef>> {
    match datatype {
        Datatype::Integer(t) => {
            let v = integer_from_json(json)
                .ok_or_else(|| Hdf5JsonError::value(location, "expected an integer"))?;
            let (min, max) = t.value_range();
            if v < min || v > max {
                return Err(Hdf5JsonError::value(
                    location,
                    format!("{} does not fit in {} bits", v, t.precision),
                ));
            }
            integer_value(v, t.signed, location)
        }
        Datatype::Bitfield(t) => {
            let v = json
                .as_u64()
                .ok_or_else(|| Hdf5JsonError::value(location, "expected a non-negative integer"))?;
            if t.precision < 64 && v >> t.precision != 0 {
                return Err(Hdf5JsonError::value(
                    location,
                    format!("{} does not fit in {} bits", v, t.precision),
                ));
            }
            Ok(DataValue::UInt(v))
        }
        Datatype::Enumeration(t) => {
            let v = integer_from_json(json)
                .ok_or_else(|| Hdf5JsonError::value(location, "expected an integer"))?;
            if !t.members.iter().any(|m| m.value == v) {
                return Err(Hdf5JsonError::value(
                    location,
                    format!("{} is not a member of the enumeration", v),
                ));
            }
            integer_value(v, t.base.signed, location)
        }
        Datatype::Float(_) => match json {
            Value::String(s) => match s.as_str() {
                "NaN" => Ok(DataValue::Float(f64::NAN)),
                "Infinity" => Ok(DataValue::Float(f64::INFINITY)),
                "-Infinity" => Ok(DataValue::Float(f64::NEG_INFINITY)),
                _ => Err(Hdf5JsonError::value(location, format!("'{}' is not a number", s))),
            },
            _ => json
                .as_f64()
                .map(DataValue::Float)
                .ok_or_else(|| Hdf5JsonError::value(location, "expected a number")),
        },
        Datatype::String(t) => {
            let s = json
                .as_str()
                .ok_or_else(|| Hdf5JsonError::value(location, "expected a string"))?;
            if let StringLength::Fixed(n) = t.length
                && s.len() as u64 > n
            {
                return Err(Hdf5JsonError::value(
                    location,
                    format!("string of {} bytes exceeds fixed length {}", s.len(), n),
                ));
            }
            Ok(DataValue::String(s.to_string()))
        }
        Datatype::Opaque(t) => {
            let encoded = json
                .as_str()
                .ok_or_else(|| Hdf5JsonError::value(location, "expected a base64 string"))?;
            let bytes = STANDARD
                .decode(encoded)
                .map_err(|e| Hdf5JsonError::value(location, format!("invalid base64: {}", e)))?;
            if bytes.len() != t.size as usize {
                return Err(Hdf5JsonError::value(
                    location,
                    format!("opaque element has {} bytes, expected {}", bytes.len(), t.size),
                ));
            }
            Ok(DataValue::Bytes(bytes))
        }
        Datatype::Reference(ReferenceKind::Object) => match json {
            Value::Null => Ok(DataValue::ObjectRef(None)),
            Value::String(s) => {
                let reference: ObjectRef = s
                    .parse()
                    .map_err(|_| Hdf5JsonError::unresolved(location, s.as_str()))?;
                if !ctx.contains(&reference) {
                    return Err(Hdf5JsonError::unresolved(location, s.as_str()));
                }
                Ok(DataValue::ObjectRef(Some(reference)))
            }
            _ => Err(Hdf5JsonError::value(location, "expected an object reference string or null")),
        },
        Datatype::Reference(ReferenceKind::DatasetRegion) => match json {
            Value::Null => Ok(DataValue::RegionRef(None)),
            Value::Object(obj) => {
                if let Some(key) = obj
                    .keys()
                    .find(|k| !["id", "select_type", "selection"].contains(&k.as_str()))
                {
                    return Err(Hdf5JsonError::value(
                        location,
                        format!("field '{}' does not belong to a region reference", key),
                    ));
                }
                let id_text = obj
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Hdf5JsonError::value(location, "region reference needs 'id'"))?;
                let unresolved = || {
                    Hdf5JsonError::unresolved(
                        location,
                        format!("{}/{}", Collection::Datasets, id_text),
                    )
                };
                let id: Identifier = id_text.parse().map_err(|_| unresolved())?;
                let space = ctx.dataset_space(&id).ok_or_else(unresolved)?;
                let select_type = obj.get("select_type").and_then(Value::as_str).ok_or_else(|| {
                    Hdf5JsonError::dataspace(location, "region reference needs 'select_type'")
                })?;
                let coordinates = obj.get("selection").ok_or_else(|| {
                    Hdf5JsonError::dataspace(location, "region reference needs 'selection'")
                })?;
                let selection = Selection::from_json(select_type, coordinates, location)?;
                selection.check_within(space, location)?;
                Ok(DataValue::RegionRef(Some(RegionReference {
                    dataset: ObjectRef::new(Collection::Datasets, id),
                    selection,
                })))
            }
            _ => Err(Hdf5JsonError::value(location, "expected a region reference object or null")),
        },
        Datatype::Array { base, dims } => shaped_from_json(dims, base, json, ctx, location, depth),
        Datatype::Compound(fields) => {
            let items = json
                .as_array()
                .ok_or_else(|| Hdf5JsonError::value(location, "expected a compound record array"))?;
            if items.len() != fields.len() {
                return Err(Hdf5JsonError::value(
                    location,
                    format!("compound record has {} fields, expected {}", items.len(), fields.len()),
                ));
            }
            fields
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (field, item))| {
                    element_from_json(&field.datatype, item, ctx, &format!("{}/{}", location, i), depth)
                })
                .collect::<Result<Vec<_>>>()
                .map(DataValue::Sequence)
        }
        Datatype::VariableLength(base) => json
            .as_array()
            .ok_or_else(|| Hdf5JsonError::value(location, "expected a variable-length array"))?
            .iter()
            .enumerate()
            .map(|(i, item)| element_from_json(base, item, ctx, &format!("{}/{}", location, i), depth))
            .collect::<Result<Vec<_>>>()
            .map(DataValue::Sequence),
        Datatype::Committed(id) => {
            let resolved = resolve(id, ctx, location, depth)?;
            element_from_json(resolved, json, ctx, location, depth + 1)
        }
    }
}

fn integer_value(v: i128, signed: bool, location: &str) -> Result<DataValue<ObjectRef>> {
    let out_of_range = || Hdf5JsonError::value(location, format!("{} is out of range", v));
    if signed {
        i64::try_from(v).map(DataValue::Int).map_err(|_| out_of_range())
    } else {
        u64::try_from(v).map(DataValue::UInt).map_err(|_| out_of_range())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::datatype::{ByteOrder, CompoundField, FloatType, IntegerType, OpaqueType, StringType};
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestContext {
        types: HashMap<Identifier, Datatype>,
        datasets: HashMap<Identifier, Dataspace>,
    }

    impl ValueContext for TestContext {
        fn committed_type(&self, id: &Identifier) -> Option<&Datatype> {
            self.types.get(id)
        }

        fn contains(&self, reference: &ObjectRef) -> bool {
            reference.collection == Collection::Datasets && self.datasets.contains_key(&reference.id)
        }

        fn dataset_space(&self, id: &Identifier) -> Option<&Dataspace> {
            self.datasets.get(id)
        }
    }

    fn i32le() -> Datatype {
        Datatype::Integer(IntegerType::standard(4, ByteOrder::LittleEndian, true))
    }

    #[test]
    fn test_simple_integer_value() {
        let ctx = TestContext::default();
        let space = Dataspace::simple(vec![2, 2]);
        let json = json!([[1, 2], [3, 4]]);
        let value = value_from_json(&i32le(), &space, &json, &ctx, "/value").unwrap();
        assert_eq!(
            value_to_json(&i32le(), &space, &value, &ctx, "/value").unwrap(),
            Some(json)
        );
    }

    #[test]
    fn test_shape_mismatch_is_reported() {
        let ctx = TestContext::default();
        let result = value_from_json(&i32le(), &Dataspace::simple(vec![3]), &json!([1, 2]), &ctx, "/value");
        assert!(matches!(result, Err(Hdf5JsonError::MalformedValue { .. })));
    }

    #[test]
    fn test_integer_range_is_checked() {
        let ctx = TestContext::default();
        let u8le = Datatype::Integer(IntegerType::standard(1, ByteOrder::LittleEndian, false));
        assert!(value_from_json(&u8le, &Dataspace::Scalar, &json!(255), &ctx, "/value").is_ok());
        assert!(value_from_json(&u8le, &Dataspace::Scalar, &json!(256), &ctx, "/value").is_err());
        assert!(value_from_json(&u8le, &Dataspace::Scalar, &json!(-1), &ctx, "/value").is_err());
    }

    #[test]
    fn test_non_finite_floats() {
        let ctx = TestContext::default();
        let f64le = Datatype::Float(FloatType::ieee(8, ByteOrder::LittleEndian));
        let json = json!(["NaN", "Infinity", "-Infinity", 1.5]);
        let value = value_from_json(&f64le, &Dataspace::simple(vec![4]), &json, &ctx, "/value").unwrap();
        let written = value_to_json(&f64le, &Dataspace::simple(vec![4]), &value, &ctx, "/value").unwrap();
        assert_eq!(written, Some(json));
    }

    #[test]
    fn test_compound_with_committed_field() {
        let mut ctx = TestContext::default();
        let committed = Identifier::new_v4();
        ctx.types.insert(committed, Datatype::String(StringType::variable(Default::default())));
        let dtype = Datatype::Compound(vec![
            CompoundField {
                name: "id".to_string(),
                datatype: i32le(),
            },
            CompoundField {
                name: "label".to_string(),
                datatype: Datatype::Committed(committed),
            },
        ]);
        let json = json!([[1, "a"], [2, "b"]]);
        let value = value_from_json(&dtype, &Dataspace::simple(vec![2]), &json, &ctx, "/value").unwrap();
        assert_eq!(
            value_to_json(&dtype, &Dataspace::simple(vec![2]), &value, &ctx, "/value").unwrap(),
            Some(json)
        );
    }

    #[test]
    fn test_object_reference_must_resolve() {
        let mut ctx = TestContext::default();
        let target = Identifier::new_v4();
        ctx.datasets.insert(target, Dataspace::simple(vec![10]));
        let dtype = Datatype::Reference(ReferenceKind::Object);

        let good = json!(format!("datasets/{}", target));
        let value = value_from_json(&dtype, &Dataspace::Scalar, &good, &ctx, "/value").unwrap();
        assert_eq!(
            value,
            DataValue::ObjectRef(Some(ObjectRef::new(Collection::Datasets, target)))
        );

        let missing = json!(format!("datasets/{}", Identifier::new_v4()));
        let result = value_from_json(&dtype, &Dataspace::Scalar, &missing, &ctx, "/value");
        assert!(matches!(result, Err(Hdf5JsonError::UnresolvedIdentifierReference { .. })));
    }

    #[test]
    fn test_region_reference_rank_is_checked() {
        let mut ctx = TestContext::default();
        let target = Identifier::new_v4();
        ctx.datasets.insert(target, Dataspace::simple(vec![10, 10]));
        let dtype = Datatype::Reference(ReferenceKind::DatasetRegion);

        let good = json!({"id": target.to_string(), "select_type": "H5S_SEL_POINTS", "selection": [[0, 1], [9, 9]]});
        let value = value_from_json(&dtype, &Dataspace::Scalar, &good, &ctx, "/value").unwrap();
        assert_eq!(
            value_to_json(&dtype, &Dataspace::Scalar, &value, &ctx, "/value").unwrap(),
            Some(good)
        );

        let bad = json!({"id": target.to_string(), "select_type": "H5S_SEL_POINTS", "selection": [[0, 1, 2]]});
        let result = value_from_json(&dtype, &Dataspace::Scalar, &bad, &ctx, "/value");
        assert!(matches!(result, Err(Hdf5JsonError::MalformedDataspace { .. })));
    }

    #[test]
    fn test_opaque_values_are_base64() {
        let ctx = TestContext::default();
        let dtype = Datatype::Opaque(OpaqueType {
            size: 3,
            tag: "rgb".to_string(),
        });
        let value = DataValue::Bytes(vec![255, 0, 128]);
        let json = value_to_json(&dtype, &Dataspace::Scalar, &value, &ctx, "/value").unwrap().unwrap();
        assert_eq!(json, json!("/wCA"));
        assert_eq!(value_from_json(&dtype, &Dataspace::Scalar, &json, &ctx, "/value").unwrap(), value);
    }

    #[test]
    fn test_null_dataspace_has_no_value() {
        let ctx = TestContext::default();
        let value = DataValue::Sequence(vec![]);
        assert_eq!(value_to_json(&i32le(), &Dataspace::Null, &value, &ctx, "/value").unwrap(), None);
        assert!(value_from_json(&i32le(), &Dataspace::Null, &json!([]), &ctx, "/value").is_err());
    }

    #[test]
    fn test_try_map_refs() {
        let id = Identifier::new_v4();
        let value = DataValue::Sequence(vec![
            DataValue::ObjectRef(Some(ObjectRef::new(Collection::Groups, id))),
            DataValue::ObjectRef(None),
        ]);
        let mapped: DataValue<u64> = value.try_map_refs(&mut |_: &ObjectRef| Ok::<_, ()>(5)).unwrap();
        assert_eq!(
            mapped,
            DataValue::Sequence(vec![DataValue::ObjectRef(Some(5)), DataValue::ObjectRef(None)])
        );
    }
}
