//! HDF5 datatype model
//!
//! [`Datatype`] is a closed recursive sum type with one variant per HDF5
//! datatype class. It is generic over the way a committed datatype is
//! referenced: documents and object graphs use [`Identifier`], native stores
//! use their own object addresses.
//!
//! Numeric and bitfield types are always held in fully parameterized form.
//! The JSON mapping writes the short predefined form (`H5T_STD_I32LE`) when
//! the parameters exactly match one of the standard types.

use crate::error::{Hdf5JsonError, Result};
use crate::models::identifier::{Collection, Identifier, ObjectRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashSet;

/// Byte order of an atomic type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "H5T_ORDER_LE",
            ByteOrder::BigEndian => "H5T_ORDER_BE",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "LE",
            ByteOrder::BigEndian => "BE",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "H5T_ORDER_LE" => Some(ByteOrder::LittleEndian),
            "H5T_ORDER_BE" => Some(ByteOrder::BigEndian),
            _ => None,
        }
    }
}

/// Fill rule for unused bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Padding {
    #[default]
    Zero,
    One,
    Background,
}

impl Padding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Padding::Zero => "H5T_PAD_ZERO",
            Padding::One => "H5T_PAD_ONE",
            Padding::Background => "H5T_PAD_BACKGROUND",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "H5T_PAD_ZERO" => Some(Padding::Zero),
            "H5T_PAD_ONE" => Some(Padding::One),
            "H5T_PAD_BACKGROUND" => Some(Padding::Background),
            _ => None,
        }
    }
}

/// Mantissa normalization of a floating point type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Normalization {
    #[default]
    Implied,
    MsbSet,
    None,
}

impl Normalization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Normalization::Implied => "H5T_NORM_IMPLIED",
            Normalization::MsbSet => "H5T_NORM_MSBSET",
            Normalization::None => "H5T_NORM_NONE",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "H5T_NORM_IMPLIED" => Some(Normalization::Implied),
            "H5T_NORM_MSBSET" => Some(Normalization::MsbSet),
            "H5T_NORM_NONE" => Some(Normalization::None),
            _ => None,
        }
    }
}

/// Character set of strings and of link/attribute names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CharSet {
    #[default]
    #[serde(rename = "H5T_CSET_ASCII")]
    Ascii,
    #[serde(rename = "H5T_CSET_UTF8")]
    Utf8,
}

impl CharSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            CharSet::Ascii => "H5T_CSET_ASCII",
            CharSet::Utf8 => "H5T_CSET_UTF8",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "H5T_CSET_ASCII" => Some(CharSet::Ascii),
            "H5T_CSET_UTF8" => Some(CharSet::Utf8),
            _ => None,
        }
    }
}

/// String termination/padding rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StringPadding {
    #[default]
    NullTerminate,
    NullPad,
    SpacePad,
}

impl StringPadding {
    pub fn as_str(&self) -> &'static str {
        match self {
            StringPadding::NullTerminate => "H5T_STR_NULLTERM",
            StringPadding::NullPad => "H5T_STR_NULLPAD",
            StringPadding::SpacePad => "H5T_STR_SPACEPAD",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "H5T_STR_NULLTERM" => Some(StringPadding::NullTerminate),
            "H5T_STR_NULLPAD" => Some(StringPadding::NullPad),
            "H5T_STR_SPACEPAD" => Some(StringPadding::SpacePad),
            _ => None,
        }
    }
}

/// Sentinel for variable length strings
pub const VARIABLE_LENGTH: &str = "H5T_VARIABLE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringLength {
    Fixed(u64),
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StringType {
    pub length: StringLength,
    pub char_set: CharSet,
    pub padding: StringPadding,
}

impl StringType {
    pub fn variable(char_set: CharSet) -> Self {
        Self {
            length: StringLength::Variable,
            char_set,
            padding: StringPadding::NullTerminate,
        }
    }

    pub fn fixed(length: u64, char_set: CharSet, padding: StringPadding) -> Self {
        Self {
            length: StringLength::Fixed(length),
            char_set,
            padding,
        }
    }
}

/// Fixed-point integer layout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntegerType {
    /// Size in bytes
    pub size: u32,
    pub order: ByteOrder,
    pub signed: bool,
    /// Significant bits
    pub precision: u32,
    /// Bit offset of the first significant bit
    pub offset: u32,
    pub lsb_pad: Padding,
    pub msb_pad: Padding,
}

impl IntegerType {
    /// A standard integer of `size` bytes using every bit
    pub fn standard(size: u32, order: ByteOrder, signed: bool) -> Self {
        Self {
            size,
            order,
            signed,
            precision: size * 8,
            offset: 0,
            lsb_pad: Padding::Zero,
            msb_pad: Padding::Zero,
        }
    }

    pub fn predefined_name(&self) -> Option<String> {
        if !is_standard_layout(self.size, self.precision, self.offset, self.lsb_pad, self.msb_pad) {
            return None;
        }
        let kind = if self.signed { 'I' } else { 'U' };
        Some(format!("H5T_STD_{}{}{}", kind, self.size * 8, self.order.suffix()))
    }

    pub fn from_predefined(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("H5T_STD_")?;
        let signed = match rest.chars().next()? {
            'I' => true,
            'U' => false,
            _ => return None,
        };
        let (size, order) = parse_width_order(&rest[1..])?;
        Some(Self::standard(size, order, signed))
    }

    /// Inclusive range of values representable with this precision
    pub fn value_range(&self) -> (i128, i128) {
        let bits = self.precision.min(64);
        if self.signed {
            let half = 1i128 << (bits.max(1) - 1);
            (-half, half - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }
}

/// Bitfield layout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitfieldType {
    pub size: u32,
    pub order: ByteOrder,
    pub precision: u32,
    pub offset: u32,
    pub lsb_pad: Padding,
    pub msb_pad: Padding,
}

impl BitfieldType {
    pub fn standard(size: u32, order: ByteOrder) -> Self {
        Self {
            size,
            order,
            precision: size * 8,
            offset: 0,
            lsb_pad: Padding::Zero,
            msb_pad: Padding::Zero,
        }
    }

    pub fn predefined_name(&self) -> Option<String> {
        if !is_standard_layout(self.size, self.precision, self.offset, self.lsb_pad, self.msb_pad) {
            return None;
        }
        Some(format!("H5T_STD_B{}{}", self.size * 8, self.order.suffix()))
    }

    pub fn from_predefined(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("H5T_STD_B")?;
        let (size, order) = parse_width_order(rest)?;
        Some(Self::standard(size, order))
    }
}

/// Floating point layout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FloatType {
    pub size: u32,
    pub order: ByteOrder,
    pub precision: u32,
    pub offset: u32,
    pub lsb_pad: Padding,
    pub msb_pad: Padding,
    pub internal_pad: Padding,
    pub sign_position: u32,
    pub exponent_position: u32,
    pub exponent_size: u32,
    pub exponent_bias: u64,
    pub mantissa_position: u32,
    pub mantissa_size: u32,
    pub normalization: Normalization,
}

impl FloatType {
    /// IEEE 754 binary32 (`size == 4`) or binary64 (any other size)
    pub fn ieee(size: u32, order: ByteOrder) -> Self {
        let (sign_position, exponent_position, exponent_size, exponent_bias, mantissa_size) =
            if size == 4 {
                (31, 23, 8, 127, 23)
            } else {
                (63, 52, 11, 1023, 52)
            };
        Self {
            size: if size == 4 { 4 } else { 8 },
            order,
            precision: if size == 4 { 32 } else { 64 },
            offset: 0,
            lsb_pad: Padding::Zero,
            msb_pad: Padding::Zero,
            internal_pad: Padding::Zero,
            sign_position,
            exponent_position,
            exponent_size,
            exponent_bias,
            mantissa_position: 0,
            mantissa_size,
            normalization: Normalization::Implied,
        }
    }

    pub fn predefined_name(&self) -> Option<String> {
        if (self.size == 4 || self.size == 8) && *self == Self::ieee(self.size, self.order) {
            Some(format!("H5T_IEEE_F{}{}", self.size * 8, self.order.suffix()))
        } else {
            None
        }
    }

    pub fn from_predefined(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("H5T_IEEE_F")?;
        let (size, order) = parse_width_order(rest)?;
        match size {
            4 | 8 => Some(Self::ieee(size, order)),
            _ => None,
        }
    }
}

/// Kind of reference stored by a reference type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Object,
    DatasetRegion,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Object => "H5T_STD_REF_OBJ",
            ReferenceKind::DatasetRegion => "H5T_STD_REF_DSETREG",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "H5T_STD_REF_OBJ" => Some(ReferenceKind::Object),
            "H5T_STD_REF_DSETREG" => Some(ReferenceKind::DatasetRegion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpaqueType {
    pub size: u32,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumMember {
    pub name: String,
    pub value: i128,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    pub base: IntegerType,
    pub members: Vec<EnumMember>,
}

impl EnumType {
    /// The HDF5 boolean convention: `FALSE = 0, TRUE = 1` over a signed byte
    pub fn boolean() -> Self {
        Self {
            base: IntegerType::standard(1, ByteOrder::LittleEndian, true),
            members: vec![
                EnumMember {
                    name: "FALSE".to_string(),
                    value: 0,
                },
                EnumMember {
                    name: "TRUE".to_string(),
                    value: 1,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundField<R = Identifier> {
    pub name: String,
    pub datatype: Datatype<R>,
}

/// A datatype, with committed datatypes referenced through `R`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Datatype<R = Identifier> {
    Integer(IntegerType),
    Float(FloatType),
    String(StringType),
    Bitfield(BitfieldType),
    Opaque(OpaqueType),
    Reference(ReferenceKind),
    Enumeration(EnumType),
    Array { base: Box<Datatype<R>>, dims: Vec<u64> },
    Compound(Vec<CompoundField<R>>),
    VariableLength(Box<Datatype<R>>),
    Committed(R),
}

impl<R> Datatype<R> {
    /// HDF5 class name of this datatype
    pub fn class_name(&self) -> &'static str {
        match self {
            Datatype::Integer(_) => "H5T_INTEGER",
            Datatype::Float(_) => "H5T_FLOAT",
            Datatype::String(_) => "H5T_STRING",
            Datatype::Bitfield(_) => "H5T_BITFIELD",
            Datatype::Opaque(_) => "H5T_OPAQUE",
            Datatype::Reference(_) => "H5T_REFERENCE",
            Datatype::Enumeration(_) => "H5T_ENUM",
            Datatype::Array { .. } => "H5T_ARRAY",
            Datatype::Compound(_) => "H5T_COMPOUND",
            Datatype::VariableLength(_) => "H5T_VLEN",
            Datatype::Committed(_) => "committed",
        }
    }

    /// Rebuild this datatype with every committed reference translated by `f`
    pub fn try_map_committed<S, E, F>(&self, f: &mut F) -> std::result::Result<Datatype<S>, E>
    where
        F: FnMut(&R) -> std::result::Result<S, E>,
    {
        Ok(match self {
            Datatype::Integer(t) => Datatype::Integer(t.clone()),
            Datatype::Float(t) => Datatype::Float(t.clone()),
            Datatype::String(t) => Datatype::String(t.clone()),
            Datatype::Bitfield(t) => Datatype::Bitfield(t.clone()),
            Datatype::Opaque(t) => Datatype::Opaque(t.clone()),
            Datatype::Reference(kind) => Datatype::Reference(*kind),
            Datatype::Enumeration(t) => Datatype::Enumeration(t.clone()),
            Datatype::Array { base, dims } => Datatype::Array {
                base: Box::new(base.try_map_committed(f)?),
                dims: dims.clone(),
            },
            Datatype::Compound(fields) => {
                let mut mapped = Vec::with_capacity(fields.len());
                for field in fields {
                    mapped.push(CompoundField {
                        name: field.name.clone(),
                        datatype: field.datatype.try_map_committed(f)?,
                    });
                }
                Datatype::Compound(mapped)
            }
            Datatype::VariableLength(base) => {
                Datatype::VariableLength(Box::new(base.try_map_committed(f)?))
            }
            Datatype::Committed(r) => Datatype::Committed(f(r)?),
        })
    }

    /// Every committed datatype this datatype uses directly
    pub fn committed_references(&self) -> Vec<&R> {
        let mut refs = Vec::new();
        self.collect_committed(&mut refs);
        refs
    }

    fn collect_committed<'a>(&'a self, refs: &mut Vec<&'a R>) {
        match self {
            Datatype::Array { base, .. } | Datatype::VariableLength(base) => {
                base.collect_committed(refs)
            }
            Datatype::Compound(fields) => {
                for field in fields {
                    field.datatype.collect_committed(refs);
                }
            }
            Datatype::Committed(r) => refs.push(r),
            _ => {}
        }
    }
}

/// Keys allowed next to `class` for each parameterized form
const INTEGER_KEYS: &[&str] = &["class", "size", "order", "sign", "precision", "offset", "pad"];
const BITFIELD_KEYS: &[&str] = &["class", "size", "order", "precision", "offset", "pad"];
const FLOAT_KEYS: &[&str] = &[
    "class",
    "size",
    "order",
    "precision",
    "offset",
    "pad",
    "internalPad",
    "signPosition",
    "exponent",
    "mantissa",
];
const PREDEFINED_KEYS: &[&str] = &["class", "base"];

impl Datatype<Identifier> {
    /// JSON form of this datatype
    pub fn to_json(&self) -> Value {
        match self {
            Datatype::Integer(t) => match t.predefined_name() {
                Some(base) => json!({"class": "H5T_INTEGER", "base": base}),
                None => {
                    let mut obj = fixed_point_json("H5T_INTEGER", t.size, t.order, t.precision, t.offset, t.lsb_pad, t.msb_pad);
                    let sign = if t.signed { "H5T_SGN_2" } else { "H5T_SGN_NONE" };
                    obj.insert("sign".to_string(), json!(sign));
                    Value::Object(obj)
                }
            },
            Datatype::Bitfield(t) => match t.predefined_name() {
                Some(base) => json!({"class": "H5T_BITFIELD", "base": base}),
                None => Value::Object(fixed_point_json(
                    "H5T_BITFIELD",
                    t.size,
                    t.order,
                    t.precision,
                    t.offset,
                    t.lsb_pad,
                    t.msb_pad,
                )),
            },
            Datatype::Float(t) => match t.predefined_name() {
                Some(base) => json!({"class": "H5T_FLOAT", "base": base}),
                None => {
                    let mut obj = fixed_point_json("H5T_FLOAT", t.size, t.order, t.precision, t.offset, t.lsb_pad, t.msb_pad);
                    obj.insert("internalPad".to_string(), json!(t.internal_pad.as_str()));
                    obj.insert("signPosition".to_string(), json!(t.sign_position));
                    obj.insert(
                        "exponent".to_string(),
                        json!({
                            "position": t.exponent_position,
                            "size": t.exponent_size,
                            "bias": t.exponent_bias,
                        }),
                    );
                    obj.insert(
                        "mantissa".to_string(),
                        json!({
                            "position": t.mantissa_position,
                            "size": t.mantissa_size,
                            "normalization": t.normalization.as_str(),
                        }),
                    );
                    Value::Object(obj)
                }
            },
            Datatype::String(t) => {
                let length = match t.length {
                    StringLength::Fixed(n) => json!(n),
                    StringLength::Variable => json!(VARIABLE_LENGTH),
                };
                json!({
                    "class": "H5T_STRING",
                    "charSet": t.char_set.as_str(),
                    "length": length,
                    "strPad": t.padding.as_str(),
                })
            }
            Datatype::Opaque(t) => json!({"class": "H5T_OPAQUE", "size": t.size, "tag": t.tag}),
            Datatype::Reference(kind) => json!({"class": "H5T_REFERENCE", "base": kind.as_str()}),
            Datatype::Enumeration(t) => {
                let members: Vec<Value> = t
                    .members
                    .iter()
                    .map(|m| json!({"name": m.name, "value": integer_json(m.value)}))
                    .collect();
                json!({
                    "class": "H5T_ENUM",
                    "base": Datatype::<Identifier>::Integer(t.base.clone()).to_json(),
                    "members": members,
                })
            }
            Datatype::Array { base, dims } => {
                json!({"class": "H5T_ARRAY", "base": base.to_json(), "dims": dims})
            }
            Datatype::Compound(fields) => {
                let fields: Vec<Value> = fields
                    .iter()
                    .map(|f| json!({"name": f.name, "type": f.datatype.to_json()}))
                    .collect();
                json!({"class": "H5T_COMPOUND", "fields": fields})
            }
            Datatype::VariableLength(base) => json!({"class": "H5T_VLEN", "base": base.to_json()}),
            Datatype::Committed(id) => {
                json!(ObjectRef::new(Collection::Datatypes, *id).to_string())
            }
        }
    }

    /// Parse the JSON form of a datatype found at `location`
    pub fn from_json(value: &Value, location: &str) -> Result<Self> {
        match value {
            Value::String(s) => Self::from_shorthand(s, location),
            Value::Object(obj) => Self::from_object(obj, location),
            _ => Err(Hdf5JsonError::datatype(
                location,
                "expected a datatype object or a reference string",
            )),
        }
    }

    fn from_shorthand(s: &str, location: &str) -> Result<Self> {
        if s.starts_with("datatypes/") {
            let reference: ObjectRef = s
                .parse()
                .map_err(|_| Hdf5JsonError::unresolved(location, s))?;
            return Ok(Datatype::Committed(reference.id));
        }
        predefined(s).ok_or_else(|| {
            Hdf5JsonError::datatype(location, format!("unknown predefined datatype '{}'", s))
        })
    }

    fn from_object(obj: &Map<String, Value>, location: &str) -> Result<Self> {
        let class = obj
            .get("class")
            .and_then(Value::as_str)
            .ok_or_else(|| Hdf5JsonError::datatype(location, "missing 'class'"))?;

        match class {
            "H5T_INTEGER" => {
                if obj.contains_key("base") {
                    only_keys(obj, PREDEFINED_KEYS, class, location)?;
                    let name = str_field(obj, "base", location)?;
                    return IntegerType::from_predefined(name)
                        .map(Datatype::Integer)
                        .ok_or_else(|| bad_base(class, name, location));
                }
                only_keys(obj, INTEGER_KEYS, class, location)?;
                let size = positive_u32(obj, "size", location)?;
                let signed = match str_field(obj, "sign", location)? {
                    "H5T_SGN_2" => true,
                    "H5T_SGN_NONE" => false,
                    other => {
                        return Err(Hdf5JsonError::datatype(
                            location,
                            format!("unknown sign '{}'", other),
                        ));
                    }
                };
                let (lsb_pad, msb_pad) = parse_pad(obj, location)?;
                let (precision, offset) = parse_bit_layout(obj, size, location)?;
                Ok(Datatype::Integer(IntegerType {
                    size,
                    order: parse_order(obj, location)?,
                    signed,
                    precision,
                    offset,
                    lsb_pad,
                    msb_pad,
                }))
            }
            "H5T_BITFIELD" => {
                if obj.contains_key("base") {
                    only_keys(obj, PREDEFINED_KEYS, class, location)?;
                    let name = str_field(obj, "base", location)?;
                    return BitfieldType::from_predefined(name)
                        .map(Datatype::Bitfield)
                        .ok_or_else(|| bad_base(class, name, location));
                }
                only_keys(obj, BITFIELD_KEYS, class, location)?;
                let size = positive_u32(obj, "size", location)?;
                let (lsb_pad, msb_pad) = parse_pad(obj, location)?;
                let (precision, offset) = parse_bit_layout(obj, size, location)?;
                Ok(Datatype::Bitfield(BitfieldType {
                    size,
                    order: parse_order(obj, location)?,
                    precision,
                    offset,
                    lsb_pad,
                    msb_pad,
                }))
            }
            "H5T_FLOAT" => {
                if obj.contains_key("base") {
                    only_keys(obj, PREDEFINED_KEYS, class, location)?;
                    let name = str_field(obj, "base", location)?;
                    return FloatType::from_predefined(name)
                        .map(Datatype::Float)
                        .ok_or_else(|| bad_base(class, name, location));
                }
                only_keys(obj, FLOAT_KEYS, class, location)?;
                let size = positive_u32(obj, "size", location)?;
                let (lsb_pad, msb_pad) = parse_pad(obj, location)?;
                let internal_pad = match obj.get("internalPad") {
                    Some(v) => v.as_str().and_then(Padding::parse).ok_or_else(|| {
                        Hdf5JsonError::datatype(location, "invalid 'internalPad'")
                    })?,
                    None => Padding::Zero,
                };
                let exponent_location = format!("{}/exponent", location);
                let exponent = object_field(obj, "exponent", location)?;
                let mantissa_location = format!("{}/mantissa", location);
                let mantissa = object_field(obj, "mantissa", location)?;
                only_keys(exponent, &["position", "size", "bias"], "exponent", &exponent_location)?;
                only_keys(mantissa, &["position", "size", "normalization"], "mantissa", &mantissa_location)?;
                let normalization = match mantissa.get("normalization") {
                    Some(v) => v.as_str().and_then(Normalization::parse).ok_or_else(|| {
                        Hdf5JsonError::datatype(&mantissa_location, "invalid 'normalization'")
                    })?,
                    None => Normalization::Implied,
                };
                let (precision, offset) = parse_bit_layout(obj, size, location)?;
                Ok(Datatype::Float(FloatType {
                    size,
                    order: parse_order(obj, location)?,
                    precision,
                    offset,
                    lsb_pad,
                    msb_pad,
                    internal_pad,
                    sign_position: required_u32(obj, "signPosition", location)?,
                    exponent_position: required_u32(exponent, "position", &exponent_location)?,
                    exponent_size: positive_u32(exponent, "size", &exponent_location)?,
                    exponent_bias: exponent
                        .get("bias")
                        .and_then(Value::as_u64)
                        .ok_or_else(|| {
                            Hdf5JsonError::datatype(&exponent_location, "missing or invalid 'bias'")
                        })?,
                    mantissa_position: required_u32(mantissa, "position", &mantissa_location)?,
                    mantissa_size: positive_u32(mantissa, "size", &mantissa_location)?,
                    normalization,
                }))
            }
            "H5T_STRING" => {
                only_keys(obj, &["class", "length", "charSet", "strPad"], class, location)?;
                let length = match obj.get("length") {
                    Some(Value::String(s)) if s == VARIABLE_LENGTH => StringLength::Variable,
                    Some(v) => match v.as_u64() {
                        Some(n) if n > 0 => StringLength::Fixed(n),
                        _ => {
                            return Err(Hdf5JsonError::datatype(
                                location,
                                format!(
                                    "string 'length' must be a positive integer or {}",
                                    VARIABLE_LENGTH
                                ),
                            ));
                        }
                    },
                    None => return Err(Hdf5JsonError::datatype(location, "missing 'length'")),
                };
                let char_set = CharSet::parse(str_field(obj, "charSet", location)?)
                    .ok_or_else(|| Hdf5JsonError::datatype(location, "invalid 'charSet'"))?;
                let padding = match obj.get("strPad") {
                    Some(v) => v
                        .as_str()
                        .and_then(StringPadding::parse)
                        .ok_or_else(|| Hdf5JsonError::datatype(location, "invalid 'strPad'"))?,
                    None => StringPadding::NullTerminate,
                };
                Ok(Datatype::String(StringType {
                    length,
                    char_set,
                    padding,
                }))
            }
            "H5T_OPAQUE" => {
                only_keys(obj, &["class", "size", "tag"], class, location)?;
                let tag = match obj.get("tag") {
                    Some(v) => v
                        .as_str()
                        .ok_or_else(|| Hdf5JsonError::datatype(location, "'tag' must be a string"))?
                        .to_string(),
                    None => String::new(),
                };
                Ok(Datatype::Opaque(OpaqueType {
                    size: positive_u32(obj, "size", location)?,
                    tag,
                }))
            }
            "H5T_REFERENCE" => {
                only_keys(obj, PREDEFINED_KEYS, class, location)?;
                let name = str_field(obj, "base", location)?;
                ReferenceKind::parse(name)
                    .map(Datatype::Reference)
                    .ok_or_else(|| bad_base(class, name, location))
            }
            "H5T_ENUM" => {
                only_keys(obj, &["class", "base", "members", "mapping"], class, location)?;
                let base_location = format!("{}/base", location);
                let base_json = obj
                    .get("base")
                    .ok_or_else(|| Hdf5JsonError::datatype(location, "missing 'base'"))?;
                let base = match Self::from_json(base_json, &base_location)? {
                    Datatype::Integer(t) => t,
                    other => {
                        return Err(Hdf5JsonError::datatype(
                            &base_location,
                            format!("enumeration base must be H5T_INTEGER, got {}", other.class_name()),
                        ));
                    }
                };
                let members = parse_members(obj, &base, location)?;
                Ok(Datatype::Enumeration(EnumType { base, members }))
            }
            "H5T_ARRAY" => {
                only_keys(obj, &["class", "base", "dims"], class, location)?;
                let dims = obj
                    .get("dims")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Hdf5JsonError::datatype(location, "missing 'dims'"))?;
                if dims.is_empty() {
                    return Err(Hdf5JsonError::datatype(location, "array 'dims' must not be empty"));
                }
                let dims = dims
                    .iter()
                    .map(|d| match d.as_u64() {
                        Some(n) if n > 0 => Ok(n),
                        _ => Err(Hdf5JsonError::datatype(
                            location,
                            "array dimensions must be positive integers",
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                let base = Self::base_field(obj, location)?;
                Ok(Datatype::Array {
                    base: Box::new(base),
                    dims,
                })
            }
            "H5T_COMPOUND" => {
                only_keys(obj, &["class", "fields"], class, location)?;
                let fields = obj
                    .get("fields")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Hdf5JsonError::datatype(location, "missing 'fields'"))?;
                if fields.is_empty() {
                    return Err(Hdf5JsonError::datatype(location, "compound must have at least one field"));
                }
                let mut names = HashSet::new();
                let mut parsed = Vec::with_capacity(fields.len());
                for (i, field) in fields.iter().enumerate() {
                    let field_location = format!("{}/fields/{}", location, i);
                    let field_obj = field.as_object().ok_or_else(|| {
                        Hdf5JsonError::datatype(&field_location, "compound field must be an object")
                    })?;
                    only_keys(field_obj, &["name", "type"], "compound field", &field_location)?;
                    let name = str_field(field_obj, "name", &field_location)?;
                    if name.is_empty() {
                        return Err(Hdf5JsonError::datatype(&field_location, "field name must not be empty"));
                    }
                    if !names.insert(name) {
                        return Err(Hdf5JsonError::datatype(
                            &field_location,
                            format!("duplicate compound field name '{}'", name),
                        ));
                    }
                    let type_json = field_obj.get("type").ok_or_else(|| {
                        Hdf5JsonError::datatype(&field_location, "missing 'type'")
                    })?;
                    parsed.push(CompoundField {
                        name: name.to_string(),
                        datatype: Self::from_json(type_json, &format!("{}/type", field_location))?,
                    });
                }
                Ok(Datatype::Compound(parsed))
            }
            "H5T_VLEN" => {
                only_keys(obj, &["class", "base", "size"], class, location)?;
                match obj.get("size") {
                    None => {}
                    Some(Value::String(s)) if s == VARIABLE_LENGTH => {}
                    Some(_) => {
                        return Err(Hdf5JsonError::datatype(
                            location,
                            format!("variable-length 'size' can only be {}", VARIABLE_LENGTH),
                        ));
                    }
                }
                Ok(Datatype::VariableLength(Box::new(Self::base_field(obj, location)?)))
            }
            other => Err(Hdf5JsonError::datatype(
                location,
                format!("unknown datatype class '{}'", other),
            )),
        }
    }

    fn base_field(obj: &Map<String, Value>, location: &str) -> Result<Self> {
        let base = obj
            .get("base")
            .ok_or_else(|| Hdf5JsonError::datatype(location, "missing 'base'"))?;
        Self::from_json(base, &format!("{}/base", location))
    }
}

/// Predefined datatype by name, e.g. `H5T_STD_U16BE` or `H5T_STD_REF_OBJ`
pub fn predefined<R>(name: &str) -> Option<Datatype<R>> {
    if let Some(kind) = ReferenceKind::parse(name) {
        return Some(Datatype::Reference(kind));
    }
    if let Some(t) = BitfieldType::from_predefined(name) {
        return Some(Datatype::Bitfield(t));
    }
    if let Some(t) = IntegerType::from_predefined(name) {
        return Some(Datatype::Integer(t));
    }
    FloatType::from_predefined(name).map(Datatype::Float)
}

fn is_standard_layout(size: u32, precision: u32, offset: u32, lsb: Padding, msb: Padding) -> bool {
    matches!(size, 1 | 2 | 4 | 8)
        && precision == size * 8
        && offset == 0
        && lsb == Padding::Zero
        && msb == Padding::Zero
}

/// Parse `32LE` into (4 bytes, little endian)
fn parse_width_order(rest: &str) -> Option<(u32, ByteOrder)> {
    let (bits, order) = if let Some(bits) = rest.strip_suffix("LE") {
        (bits, ByteOrder::LittleEndian)
    } else {
        (rest.strip_suffix("BE")?, ByteOrder::BigEndian)
    };
    match bits {
        "8" => Some((1, order)),
        "16" => Some((2, order)),
        "32" => Some((4, order)),
        "64" => Some((8, order)),
        _ => None,
    }
}

fn fixed_point_json(
    class: &str,
    size: u32,
    order: ByteOrder,
    precision: u32,
    offset: u32,
    lsb: Padding,
    msb: Padding,
) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("class".to_string(), json!(class));
    obj.insert("size".to_string(), json!(size));
    obj.insert("order".to_string(), json!(order.as_str()));
    obj.insert("precision".to_string(), json!(precision));
    obj.insert("offset".to_string(), json!(offset));
    obj.insert("pad".to_string(), json!({"lsb": lsb.as_str(), "msb": msb.as_str()}));
    obj
}

/// JSON number for an enumeration value
pub(crate) fn integer_json(value: i128) -> Value {
    if let Ok(v) = i64::try_from(value) {
        json!(v)
    } else if let Ok(v) = u64::try_from(value) {
        json!(v)
    } else {
        Value::Null
    }
}

pub(crate) fn integer_from_json(value: &Value) -> Option<i128> {
    value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
}

/// Enumeration members from either `members` (canonical) or a `mapping` of name to value
fn parse_members(obj: &Map<String, Value>, base: &IntegerType, location: &str) -> Result<Vec<EnumMember>> {
    let entries: Vec<(String, &str, Option<&Value>)> = match (obj.get("members"), obj.get("mapping")) {
        (Some(_), Some(_)) => {
            return Err(Hdf5JsonError::datatype(
                location,
                "enumeration takes 'members' or 'mapping', not both",
            ));
        }
        (Some(members), None) => {
            let members = members
                .as_array()
                .ok_or_else(|| Hdf5JsonError::datatype(location, "'members' must be an array"))?;
            members
                .iter()
                .enumerate()
                .map(|(i, member)| {
                    let member_location = format!("{}/members/{}", location, i);
                    let member = member.as_object().ok_or_else(|| {
                        Hdf5JsonError::datatype(&member_location, "enumeration member must be an object")
                    })?;
                    only_keys(member, &["name", "value"], "enumeration member", &member_location)?;
                    let name = str_field(member, "name", &member_location)?;
                    Ok((member_location, name, member.get("value")))
                })
                .collect::<Result<Vec<_>>>()?
        }
        (None, Some(mapping)) => mapping
            .as_object()
            .ok_or_else(|| Hdf5JsonError::datatype(location, "'mapping' must be an object"))?
            .iter()
            .map(|(name, value)| (format!("{}/mapping/{}", location, name), name.as_str(), Some(value)))
            .collect(),
        (None, None) => return Err(Hdf5JsonError::datatype(location, "missing 'members'")),
    };
    if entries.is_empty() {
        return Err(Hdf5JsonError::datatype(location, "enumeration must have at least one member"));
    }

    let from_mapping = obj.contains_key("mapping");
    let (min, max) = base.value_range();
    let mut names = HashSet::new();
    let mut values = HashSet::new();
    let mut parsed = Vec::with_capacity(entries.len());
    for (member_location, name, value) in entries {
        let value = value
            .and_then(integer_from_json)
            .ok_or_else(|| Hdf5JsonError::datatype(&member_location, "'value' must be an integer"))?;
        if value < min || value > max {
            return Err(Hdf5JsonError::datatype(
                &member_location,
                format!("value {} does not fit the enumeration base", value),
            ));
        }
        if !names.insert(name) {
            return Err(Hdf5JsonError::datatype(
                &member_location,
                format!("duplicate enumeration member name '{}'", name),
            ));
        }
        if !values.insert(value) {
            return Err(Hdf5JsonError::datatype(
                &member_location,
                format!("duplicate enumeration member value {}", value),
            ));
        }
        parsed.push(EnumMember {
            name: name.to_string(),
            value,
        });
    }
    // A mapping carries no member order of its own
    if from_mapping {
        parsed.sort_by_key(|m| m.value);
    }
    Ok(parsed)
}

fn only_keys(obj: &Map<String, Value>, allowed: &[&str], owner: &str, location: &str) -> Result<()> {
    match obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(Hdf5JsonError::datatype(
            location,
            format!("field '{}' does not belong to {}", key, owner),
        )),
        None => Ok(()),
    }
}

fn bad_base(class: &str, name: &str, location: &str) -> Hdf5JsonError {
    Hdf5JsonError::datatype(location, format!("'{}' is not a valid base for {}", name, class))
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str, location: &str) -> Result<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Hdf5JsonError::datatype(location, format!("missing or invalid '{}'", key)))
}

fn object_field<'a>(obj: &'a Map<String, Value>, key: &str, location: &str) -> Result<&'a Map<String, Value>> {
    obj.get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| Hdf5JsonError::datatype(location, format!("missing or invalid '{}'", key)))
}

fn opt_u32(obj: &Map<String, Value>, key: &str, location: &str) -> Result<Option<u32>> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                Hdf5JsonError::datatype(location, format!("'{}' must be a non-negative integer", key))
            }),
    }
}

fn required_u32(obj: &Map<String, Value>, key: &str, location: &str) -> Result<u32> {
    opt_u32(obj, key, location)?
        .ok_or_else(|| Hdf5JsonError::datatype(location, format!("missing '{}'", key)))
}

/// `precision` and `offset` of a layout `size` bytes wide; both must fit in its bits
fn parse_bit_layout(obj: &Map<String, Value>, size: u32, location: &str) -> Result<(u32, u32)> {
    let bits = size.checked_mul(8).ok_or_else(|| {
        Hdf5JsonError::datatype(location, format!("'size' {} is too large", size))
    })?;
    let precision = opt_u32(obj, "precision", location)?.unwrap_or(bits);
    let offset = opt_u32(obj, "offset", location)?.unwrap_or(0);
    if u64::from(precision) + u64::from(offset) > u64::from(bits) {
        return Err(Hdf5JsonError::datatype(
            location,
            format!(
                "precision {} at offset {} does not fit in {} bits",
                precision, offset, bits
            ),
        ));
    }
    Ok((precision, offset))
}

fn positive_u32(obj: &Map<String, Value>, key: &str, location: &str) -> Result<u32> {
    match required_u32(obj, key, location)? {
        0 => Err(Hdf5JsonError::datatype(location, format!("'{}' must be positive", key))),
        n => Ok(n),
    }
}

fn parse_order(obj: &Map<String, Value>, location: &str) -> Result<ByteOrder> {
    ByteOrder::parse(str_field(obj, "order", location)?)
        .ok_or_else(|| Hdf5JsonError::datatype(location, "invalid 'order'"))
}

fn parse_pad(obj: &Map<String, Value>, location: &str) -> Result<(Padding, Padding)> {
    let Some(pad) = obj.get("pad") else {
        return Ok((Padding::Zero, Padding::Zero));
    };
    let pad_location = format!("{}/pad", location);
    let pad = pad
        .as_object()
        .ok_or_else(|| Hdf5JsonError::datatype(&pad_location, "'pad' must be an object"))?;
    only_keys(pad, &["lsb", "msb"], "pad", &pad_location)?;
    let side = |key: &str| -> Result<Padding> {
        match pad.get(key) {
            None => Ok(Padding::Zero),
            Some(v) => v.as_str().and_then(Padding::parse).ok_or_else(|| {
                Hdf5JsonError::datatype(&pad_location, format!("invalid '{}' padding", key))
            }),
        }
    };
    Ok((side("lsb")?, side("msb")?))
}
