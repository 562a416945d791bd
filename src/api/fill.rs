//! Purpose: Apply a JSON object of raw user inputs onto a built form tree.
//! Exports: `fill`.
//! Role: Stand-in for the rendering layer's edits: expands placeholders,
//!       grows repeated fields, enables optional fields, writes slots.
//! Invariants: Filling stages raw input only; validation happens at
//!             extraction, so lexically bad text is accepted here.

use crate::core::descriptor::{FieldDescriptor, FieldLabel, FieldType};
use crate::core::error::{Error, ErrorKind};
use crate::core::node::{FormTree, NodeId};
use crate::core::registry::Registry;
use serde_json::{Map, Value};
use std::sync::Arc;

pub fn fill(tree: &mut FormTree, registry: &Registry, input: &Value) -> Result<(), Error> {
    let Value::Object(object) = input else {
        return Err(Error::new(ErrorKind::Usage).with_message("input must be a JSON object"));
    };
    fill_message(tree, registry, tree.root(), object)
}

fn fill_message(
    tree: &mut FormTree,
    registry: &Registry,
    node: NodeId,
    object: &Map<String, Value>,
) -> Result<(), Error> {
    for (key, value) in object {
        let child = tree
            .children(node)
            .iter()
            .copied()
            .find(|&child| tree.field(child).is_some_and(|field| field.name == *key))
            .ok_or_else(|| {
                let base = tree.full_name(node);
                let path = if base.is_empty() {
                    key.clone()
                } else {
                    format!("{base}.{key}")
                };
                Error::new(ErrorKind::Usage)
                    .with_message("no such field in message")
                    .with_field(path)
            })?;
        fill_field(tree, registry, child, value)?;
    }
    Ok(())
}

fn fill_field(
    tree: &mut FormTree,
    registry: &Registry,
    id: NodeId,
    value: &Value,
) -> Result<(), Error> {
    // Null means "leave this field alone": disabled stays disabled.
    if value.is_null() {
        return Ok(());
    }
    let Some(field) = tree.field(id).cloned() else {
        return Err(Error::new(ErrorKind::Internal).with_message("filled node has no descriptor"));
    };

    if tree.is_repeated(id) {
        let Value::Array(items) = value else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("repeated field expects an array")
                .with_field(tree.full_name(id)));
        };
        for item_value in items {
            let item = tree.add_repeated_item(id, registry)?;
            fill_one(tree, registry, item, item_value, &field)?;
        }
        return Ok(());
    }

    fill_one(tree, registry, id, value, &field)?;
    if field.label == FieldLabel::Optional {
        tree.set_enabled(id, true)?;
    }
    Ok(())
}

fn fill_one(
    tree: &mut FormTree,
    registry: &Registry,
    id: NodeId,
    value: &Value,
    field: &Arc<FieldDescriptor>,
) -> Result<(), Error> {
    match field.field_type {
        FieldType::Message => {
            let Value::Object(object) = value else {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("message field expects an object")
                    .with_field(tree.full_name(id)));
            };
            tree.expand(id, registry)?;
            fill_message(tree, registry, id, object)
        }
        FieldType::Bool => match value {
            Value::Bool(checked) => tree.set_checked(id, *checked),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message("bool field expects true or false")
                .with_field(tree.full_name(id))),
        },
        FieldType::Enum => fill_enum(tree, registry, id, value, field),
        _ => match value {
            Value::String(text) => tree.set_text(id, text.clone()),
            Value::Number(number) => tree.set_text(id, number.to_string()),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message("scalar field expects a string or number")
                .with_field(tree.full_name(id))),
        },
    }
}

/// Enum inputs select by numeric value or by variant name.
fn fill_enum(
    tree: &mut FormTree,
    registry: &Registry,
    id: NodeId,
    value: &Value,
    field: &Arc<FieldDescriptor>,
) -> Result<(), Error> {
    match value {
        Value::Number(number) => {
            let Some(selection) = number.as_i64() else {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("enum field expects an integer value")
                    .with_field(tree.full_name(id)));
            };
            tree.set_selected(id, Some(selection))
        }
        Value::String(name) => {
            let type_name = field.type_name.as_deref().ok_or_else(|| {
                Error::new(ErrorKind::Schema).with_message("enum field carries no type name")
            })?;
            let descriptor = registry
                .resolve_enum(type_name)
                .map_err(|err| err.with_field(tree.full_name(id)))?;
            let Some(selection) = descriptor.number_for(name) else {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("unknown enum variant {name:?}"))
                    .with_field(tree.full_name(id)));
            };
            tree.set_selected(id, Some(selection))
        }
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message("enum field expects a number or variant name")
            .with_field(tree.full_name(id))),
    }
}

#[cfg(test)]
mod tests {
    use super::fill;
    use crate::core::build::build;
    use crate::core::error::ErrorKind;
    use crate::core::extract::extract;
    use crate::core::descriptor::{
        EnumDescriptor, EnumValue, FieldDescriptor, FieldLabel, FieldType, MessageDescriptor,
    };
    use crate::core::registry::Registry;
    use serde_json::json;
    use std::sync::Arc;

    fn field(
        name: &str,
        number: u32,
        label: FieldLabel,
        field_type: FieldType,
        type_name: Option<&str>,
    ) -> Arc<FieldDescriptor> {
        Arc::new(FieldDescriptor {
            name: name.to_string(),
            number,
            label,
            field_type,
            type_name: type_name.map(str::to_string),
            default_value: None,
        })
    }

    fn demo_registry() -> Registry {
        let mut registry = Registry::new();
        registry.insert_enum(
            "demo.Mode",
            EnumDescriptor {
                variants: vec![
                    EnumValue { name: "PLAIN".to_string(), number: 0 },
                    EnumValue { name: "LOUD".to_string(), number: 1 },
                ],
            },
        );
        registry.insert_message(
            "demo.Inner",
            MessageDescriptor {
                prefix_name: None,
                fields: vec![field("value", 1, FieldLabel::Required, FieldType::Int64, None)],
            },
        );
        registry.insert_message(
            "demo.Request",
            MessageDescriptor {
                prefix_name: None,
                fields: vec![
                    field("count", 1, FieldLabel::Required, FieldType::Int32, None),
                    field("note", 2, FieldLabel::Optional, FieldType::String, None),
                    field("loud", 3, FieldLabel::Optional, FieldType::Bool, None),
                    field("mode", 4, FieldLabel::Optional, FieldType::Enum, Some(".demo.Mode")),
                    field("inner", 5, FieldLabel::Optional, FieldType::Message, Some(".demo.Inner")),
                    field("ids", 6, FieldLabel::Repeated, FieldType::Uint32, None),
                ],
            },
        );
        registry
    }

    #[test]
    fn fill_then_extract_round_trips() {
        let registry = demo_registry();
        let descriptor = registry.resolve_message("demo.Request").unwrap();
        let mut tree = build(&registry, &descriptor);

        fill(
            &mut tree,
            &registry,
            &json!({
                "count": "12",
                "note": "hello",
                "loud": true,
                "mode": "LOUD",
                "inner": { "value": "9223372036854775807" },
                "ids": ["1", "0x2", 3]
            }),
        )
        .unwrap();

        let extraction = extract(&tree);
        assert!(extraction.is_clean(), "errors: {:?}", extraction.errors);
        assert_eq!(
            extraction.value,
            json!({
                "count": 12,
                "note": "hello",
                "loud": true,
                "mode": 1,
                "inner": { "value": "9223372036854775807" },
                "ids": [1, 2, 3]
            })
        );
    }

    #[test]
    fn filling_stages_invalid_text_for_extraction_to_flag() {
        let registry = demo_registry();
        let descriptor = registry.resolve_message("demo.Request").unwrap();
        let mut tree = build(&registry, &descriptor);

        fill(&mut tree, &registry, &json!({ "count": "not-a-number" })).unwrap();

        let extraction = extract(&tree);
        assert_eq!(extraction.errors.len(), 1);
        assert_eq!(extraction.errors[0].path, "count");
    }

    #[test]
    fn unknown_keys_are_usage_errors() {
        let registry = demo_registry();
        let descriptor = registry.resolve_message("demo.Request").unwrap();
        let mut tree = build(&registry, &descriptor);

        let err = fill(&mut tree, &registry, &json!({ "bogus": "1" })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.field(), Some("bogus"));

        let err = fill(
            &mut tree,
            &registry,
            &json!({ "inner": { "bogus": "1" } }),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("inner.bogus"));
    }

    #[test]
    fn unknown_enum_variant_names_are_rejected() {
        let registry = demo_registry();
        let descriptor = registry.resolve_message("demo.Request").unwrap();
        let mut tree = build(&registry, &descriptor);

        let err = fill(&mut tree, &registry, &json!({ "mode": "DEAFENING" })).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn null_leaves_a_field_untouched() {
        let registry = demo_registry();
        let descriptor = registry.resolve_message("demo.Request").unwrap();
        let mut tree = build(&registry, &descriptor);

        fill(
            &mut tree,
            &registry,
            &json!({ "count": "1", "note": null }),
        )
        .unwrap();
        let extraction = extract(&tree);
        assert!(extraction.is_clean());
        assert_eq!(extraction.value, json!({ "count": 1 }));
    }
}
