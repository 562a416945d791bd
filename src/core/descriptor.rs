//! Purpose: Canonical descriptor model for message, enum, and field schemas.
//! Exports: `FieldType`, `FieldLabel`, `FieldDescriptor`, `MessageDescriptor`, `EnumDescriptor`.
//! Role: Single normalized spelling for every schema concept the rest of the crate keys on.
//! Invariants: Numeric and symbolic wire spellings collapse to one enum at deserialize time.
//! Invariants: `type_name` is set iff the field type is ENUM or MESSAGE (checked at load).

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Scalar and composite protobuf field types, one canonical key per type.
///
/// GROUP (wire type 10) is deliberately absent: group fields are rejected
/// when a schema document is loaded.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FieldType {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Message,
    Bytes,
    Uint32,
    Enum,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::Int64 => "int64",
            FieldType::Uint64 => "uint64",
            FieldType::Int32 => "int32",
            FieldType::Fixed64 => "fixed64",
            FieldType::Fixed32 => "fixed32",
            FieldType::Bool => "bool",
            FieldType::String => "string",
            FieldType::Message => "message",
            FieldType::Bytes => "bytes",
            FieldType::Uint32 => "uint32",
            FieldType::Enum => "enum",
            FieldType::Sfixed32 => "sfixed32",
            FieldType::Sfixed64 => "sfixed64",
            FieldType::Sint32 => "sint32",
            FieldType::Sint64 => "sint64",
        }
    }

    /// Types that carry a `type_name` reference into the registry.
    pub fn is_named(&self) -> bool {
        matches!(self, FieldType::Message | FieldType::Enum)
    }

    fn from_number(number: u64) -> Result<Self, TypeSpellingError> {
        let field_type = match number {
            1 => FieldType::Double,
            2 => FieldType::Float,
            3 => FieldType::Int64,
            4 => FieldType::Uint64,
            5 => FieldType::Int32,
            6 => FieldType::Fixed64,
            7 => FieldType::Fixed32,
            8 => FieldType::Bool,
            9 => FieldType::String,
            10 => return Err(TypeSpellingError::Group),
            11 => FieldType::Message,
            12 => FieldType::Bytes,
            13 => FieldType::Uint32,
            14 => FieldType::Enum,
            15 => FieldType::Sfixed32,
            16 => FieldType::Sfixed64,
            17 => FieldType::Sint32,
            18 => FieldType::Sint64,
            _ => return Err(TypeSpellingError::Unknown),
        };
        Ok(field_type)
    }

    fn from_symbol(symbol: &str) -> Result<Self, TypeSpellingError> {
        let field_type = match symbol {
            "TYPE_DOUBLE" => FieldType::Double,
            "TYPE_FLOAT" => FieldType::Float,
            "TYPE_INT64" => FieldType::Int64,
            "TYPE_UINT64" => FieldType::Uint64,
            "TYPE_INT32" => FieldType::Int32,
            "TYPE_FIXED64" => FieldType::Fixed64,
            "TYPE_FIXED32" => FieldType::Fixed32,
            "TYPE_BOOL" => FieldType::Bool,
            "TYPE_STRING" => FieldType::String,
            "TYPE_GROUP" => return Err(TypeSpellingError::Group),
            "TYPE_MESSAGE" => FieldType::Message,
            "TYPE_BYTES" => FieldType::Bytes,
            "TYPE_UINT32" => FieldType::Uint32,
            "TYPE_ENUM" => FieldType::Enum,
            "TYPE_SFIXED32" => FieldType::Sfixed32,
            "TYPE_SFIXED64" => FieldType::Sfixed64,
            "TYPE_SINT32" => FieldType::Sint32,
            "TYPE_SINT64" => FieldType::Sint64,
            _ => return Err(TypeSpellingError::Unknown),
        };
        Ok(field_type)
    }
}

enum TypeSpellingError {
    Group,
    Unknown,
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldTypeVisitor;

        impl Visitor<'_> for FieldTypeVisitor {
            type Value = FieldType;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a field type number (1..=18) or symbol like \"TYPE_INT32\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<FieldType, E> {
                FieldType::from_number(value).map_err(|err| match err {
                    TypeSpellingError::Group => {
                        E::custom("group fields are not supported")
                    }
                    TypeSpellingError::Unknown => {
                        E::custom(format!("unknown field type number {value}"))
                    }
                })
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<FieldType, E> {
                if value < 0 {
                    return Err(E::custom(format!("unknown field type number {value}")));
                }
                self.visit_u64(value as u64)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<FieldType, E> {
                FieldType::from_symbol(value).map_err(|err| match err {
                    TypeSpellingError::Group => {
                        E::custom("group fields are not supported")
                    }
                    TypeSpellingError::Unknown => {
                        E::custom(format!("unknown field type symbol {value:?}"))
                    }
                })
            }
        }

        deserializer.deserialize_any(FieldTypeVisitor)
    }
}

/// Field cardinality marker.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FieldLabel {
    Optional,
    Required,
    Repeated,
}

impl FieldLabel {
    pub fn name(&self) -> &'static str {
        match self {
            FieldLabel::Optional => "optional",
            FieldLabel::Required => "required",
            FieldLabel::Repeated => "repeated",
        }
    }
}

impl<'de> Deserialize<'de> for FieldLabel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldLabelVisitor;

        impl Visitor<'_> for FieldLabelVisitor {
            type Value = FieldLabel;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a field label number (1..=3) or symbol like \"LABEL_OPTIONAL\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<FieldLabel, E> {
                match value {
                    1 => Ok(FieldLabel::Optional),
                    2 => Ok(FieldLabel::Required),
                    3 => Ok(FieldLabel::Repeated),
                    _ => Err(E::custom(format!("unknown field label number {value}"))),
                }
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<FieldLabel, E> {
                if value < 0 {
                    return Err(E::custom(format!("unknown field label number {value}")));
                }
                self.visit_u64(value as u64)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<FieldLabel, E> {
                match value {
                    "LABEL_OPTIONAL" => Ok(FieldLabel::Optional),
                    "LABEL_REQUIRED" => Ok(FieldLabel::Required),
                    "LABEL_REPEATED" => Ok(FieldLabel::Repeated),
                    _ => Err(E::custom(format!("unknown field label symbol {value:?}"))),
                }
            }
        }

        deserializer.deserialize_any(FieldLabelVisitor)
    }
}

/// One field of a message type. Shared read-only by every node built for it.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub name: String,
    /// Wire tag, unique within the owning message. Informational here.
    pub number: u32,
    pub label: FieldLabel,
    pub field_type: FieldType,
    /// Possibly scope-qualified registry reference; set iff `field_type.is_named()`.
    pub type_name: Option<String>,
    /// Textual default, possibly percent-encoded.
    pub default_value: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct MessageDescriptor {
    /// Fully-qualified owner path, used for comment lookup only.
    pub prefix_name: Option<String>,
    pub fields: Vec<Arc<FieldDescriptor>>,
}

impl MessageDescriptor {
    /// Stable presentation order used by the original form: ascending field number.
    pub fn sort_fields_by_number(&mut self) {
        self.fields
            .sort_by(|left, right| left.number.cmp(&right.number));
    }
}

#[derive(Clone, Debug)]
pub struct EnumValue {
    pub name: String,
    /// Authoritative wire value for the variant.
    pub number: i64,
}

#[derive(Clone, Debug, Default)]
pub struct EnumDescriptor {
    pub variants: Vec<EnumValue>,
}

impl EnumDescriptor {
    pub fn number_for(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|variant| variant.name == name)
            .map(|variant| variant.number)
    }
}
