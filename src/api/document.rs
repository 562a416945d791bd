//! Purpose: Load a reflection schema document into a descriptor registry.
//! Exports: `SchemaDocument`, `LoadOptions`.
//! Role: Deserialization boundary; transport of the document is the caller's job.
//! Invariants: Numeric and symbolic type/label spellings normalize at load time.
//! Invariants: Field names and numbers are unique within their message.
//! Invariants: `type_name` is present iff the field type is ENUM or MESSAGE.

use crate::core::descriptor::{
    EnumDescriptor, EnumValue, FieldDescriptor, FieldLabel, FieldType, MessageDescriptor,
};
use crate::core::error::{Error, ErrorKind};
use crate::core::registry::{Registry, unqualified};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Sort every message's fields by ascending field number, the
    /// presentation order the original form used for the request type.
    pub sort_fields_by_number: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self {
            sort_fields_by_number: false,
        }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    method: Option<RawMethod>,
    #[serde(default)]
    message_type: Vec<RawNamedType<RawMessageInfo>>,
    #[serde(default)]
    enum_type: Vec<RawNamedType<RawEnumInfo>>,
    #[serde(default)]
    comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
struct RawMethod {
    #[serde(default)]
    input_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNamedType<T> {
    full_name: String,
    info: T,
}

#[derive(Debug, Deserialize)]
struct RawMessageInfo {
    #[serde(default)]
    field: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    number: u32,
    label: FieldLabel,
    #[serde(rename = "type")]
    field_type: FieldType,
    #[serde(default)]
    type_name: Option<String>,
    #[serde(default)]
    default_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEnumInfo {
    #[serde(default)]
    value: Vec<RawEnumValue>,
}

#[derive(Debug, Deserialize)]
struct RawEnumValue {
    name: String,
    number: i64,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    full_name: String,
    #[serde(default)]
    leading_comments: Option<String>,
    #[serde(default)]
    trailing_comments: Option<String>,
}

/// A loaded schema document: the registry plus the request type the
/// document's method names, when present.
#[derive(Debug)]
pub struct SchemaDocument {
    registry: Registry,
    input_type: Option<String>,
}

impl SchemaDocument {
    pub fn from_json(input: &str, options: &LoadOptions) -> Result<Self, Error> {
        let raw: RawDocument = serde_json::from_str(input).map_err(|err| {
            Error::new(ErrorKind::Schema)
                .with_message("malformed schema document")
                .with_source(err)
        })?;

        let mut registry = Registry::new();
        for entry in raw.message_type {
            let mut descriptor = MessageDescriptor {
                prefix_name: Some(entry.full_name.clone()),
                fields: Vec::with_capacity(entry.info.field.len()),
            };
            let mut names: HashSet<String> = HashSet::new();
            let mut numbers: HashSet<u32> = HashSet::new();
            for field in entry.info.field {
                check_field(&entry.full_name, &field, &mut names, &mut numbers)?;
                descriptor.fields.push(Arc::new(FieldDescriptor {
                    name: field.name,
                    number: field.number,
                    label: field.label,
                    field_type: field.field_type,
                    type_name: field.type_name,
                    default_value: field.default_value,
                }));
            }
            if options.sort_fields_by_number {
                descriptor.sort_fields_by_number();
            }
            registry.insert_message(entry.full_name, descriptor);
        }

        for entry in raw.enum_type {
            let variants = entry
                .info
                .value
                .into_iter()
                .map(|variant| EnumValue {
                    name: variant.name,
                    number: variant.number,
                })
                .collect();
            registry.insert_enum(entry.full_name, EnumDescriptor { variants });
        }

        for comment in raw.comments {
            let mut text = comment.leading_comments.unwrap_or_default();
            if let Some(trailing) = comment.trailing_comments {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&trailing);
            }
            registry.insert_comment(comment.full_name, text);
        }

        let input_type = raw
            .method
            .and_then(|method| method.input_type)
            .map(|name| unqualified(&name).to_string());

        debug!(
            messages = registry.message_names().len(),
            enums = registry.enum_names().len(),
            "loaded schema document"
        );
        Ok(Self {
            registry,
            input_type,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn into_registry(self) -> Registry {
        self.registry
    }

    /// Unqualified name of the method's request type, when the document
    /// carries one.
    pub fn input_type(&self) -> Option<&str> {
        self.input_type.as_deref()
    }
}

fn check_field(
    owner: &str,
    field: &RawField,
    names: &mut HashSet<String>,
    numbers: &mut HashSet<u32>,
) -> Result<(), Error> {
    let context = || format!("{owner}.{}", field.name);
    if field.number == 0 {
        return Err(Error::new(ErrorKind::Schema)
            .with_message("field number must be positive")
            .with_field(context()));
    }
    if !names.insert(field.name.clone()) {
        return Err(Error::new(ErrorKind::Schema)
            .with_message("duplicate field name")
            .with_field(context()));
    }
    if !numbers.insert(field.number) {
        return Err(Error::new(ErrorKind::Schema)
            .with_message("duplicate field number")
            .with_field(context()));
    }
    if field.field_type.is_named() && field.type_name.is_none() {
        return Err(Error::new(ErrorKind::Schema)
            .with_message("enum/message field carries no type name")
            .with_field(context()));
    }
    if !field.field_type.is_named() && field.type_name.is_some() {
        return Err(Error::new(ErrorKind::Schema)
            .with_message("scalar field carries a type name")
            .with_field(context()));
    }
    Ok(())
}
