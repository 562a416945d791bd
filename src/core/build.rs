//! Purpose: Construct and grow editable form trees from message descriptors.
//! Exports: `build`, `BuildIssue`, plus the growth operations on `FormTree`
//!          (`expand`, `add_repeated_item`).
//! Role: Applies cardinality rules; the lazy-expansion gate on OPTIONAL
//!       message fields is the only recursion bound for self-referential
//!       schemas.
//! Invariants: An unresolvable type reference abandons only the sub-tree
//!             rooted at that field; sibling fields still build.

use crate::core::descriptor::{FieldDescriptor, FieldLabel, FieldType, MessageDescriptor};
use crate::core::error::{Error, ErrorKind};
use crate::core::node::{FormTree, NodeId, NodeKind, NodeState, Slot};
use crate::core::registry::{Registry, unqualified};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A sub-tree the builder had to abandon because its type reference is not
/// in the registry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BuildIssue {
    pub path: String,
    pub type_name: String,
}

impl fmt::Display for BuildIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: unknown descriptor {}", self.path, self.type_name)
    }
}

/// Build a form tree for a message descriptor. Never fails outright: fields
/// whose type reference cannot be resolved are recorded on the tree's issue
/// list and left as permanently unexpandable placeholders.
pub fn build(registry: &Registry, descriptor: &Arc<MessageDescriptor>) -> FormTree {
    let mut tree = FormTree {
        nodes: Vec::new(),
        root: NodeId(0),
        issues: Vec::new(),
    };
    let root = tree.alloc(NodeState {
        field: None,
        parent: None,
        enabled: true,
        kind: NodeKind::Message {
            children: Vec::new(),
            expanded: true,
        },
    });
    tree.root = root;
    build_children(&mut tree, registry, root, descriptor);
    debug!(
        nodes = tree.nodes.len(),
        issues = tree.issues.len(),
        "built form tree"
    );
    tree
}

impl FormTree {
    /// Build the sub-tree of a MESSAGE field on first use. Idempotent: a
    /// second call is a no-op. This is the caller-driven recursion bound.
    pub fn expand(&mut self, id: NodeId, registry: &Registry) -> Result<(), Error> {
        match &self.nodes[id.0].kind {
            NodeKind::Message { expanded, .. } => {
                if *expanded {
                    return Ok(());
                }
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("not a message field")
                    .with_field(self.full_name(id)));
            }
        }
        let field = match self.nodes[id.0].field.clone() {
            Some(field) => field,
            // The root is allocated expanded, so this arm is unreachable via
            // the idempotence check above.
            None => return Ok(()),
        };
        let descriptor = resolve_field_message(registry, &field)
            .map_err(|err| err.with_field(self.full_name(id)))?;
        build_children(self, registry, id, &descriptor);
        debug!(field = %self.full_name(id), "expanded message field");
        Ok(())
    }

    /// Append one fresh item node to a repeated field. MESSAGE-typed items
    /// are built eagerly (an item inside a repeated field is forced).
    pub fn add_repeated_item(&mut self, id: NodeId, registry: &Registry) -> Result<NodeId, Error> {
        let field = match (&self.nodes[id.0].kind, self.nodes[id.0].field.clone()) {
            (NodeKind::Repeated { .. }, Some(field)) => field,
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("not a repeated field")
                    .with_field(self.full_name(id)));
            }
        };

        let item = if field.field_type == FieldType::Message {
            let descriptor = resolve_field_message(registry, &field)
                .map_err(|err| err.with_field(self.full_name(id)))?;
            let item = self.alloc(NodeState {
                field: Some(field.clone()),
                parent: Some(id),
                enabled: true,
                kind: NodeKind::Message {
                    children: Vec::new(),
                    expanded: false,
                },
            });
            build_children(self, registry, item, &descriptor);
            item
        } else {
            let slot = scalar_slot(registry, &field)
                .map_err(|err| err.with_field(self.full_name(id)))?;
            self.alloc(NodeState {
                field: Some(field.clone()),
                parent: Some(id),
                enabled: true,
                kind: NodeKind::Scalar { slot },
            })
        };

        if let NodeKind::Repeated { items } = &mut self.nodes[id.0].kind {
            items.push(item);
        }
        debug!(field = %self.full_name(id), "added repeated item");
        Ok(item)
    }
}

fn build_children(
    tree: &mut FormTree,
    registry: &Registry,
    parent: NodeId,
    descriptor: &MessageDescriptor,
) {
    let mut children = Vec::with_capacity(descriptor.fields.len());
    for field in &descriptor.fields {
        children.push(build_field_node(tree, registry, parent, field));
    }
    if let NodeKind::Message {
        children: slot,
        expanded,
    } = &mut tree.nodes[parent.0].kind
    {
        *slot = children;
        *expanded = true;
    }
}

fn build_field_node(
    tree: &mut FormTree,
    registry: &Registry,
    parent: NodeId,
    field: &Arc<FieldDescriptor>,
) -> NodeId {
    if field.label == FieldLabel::Repeated {
        return tree.alloc(NodeState {
            field: Some(field.clone()),
            parent: Some(parent),
            enabled: true,
            kind: NodeKind::Repeated { items: Vec::new() },
        });
    }

    if field.field_type == FieldType::Message {
        let required = field.label == FieldLabel::Required;
        let id = tree.alloc(NodeState {
            field: Some(field.clone()),
            parent: Some(parent),
            enabled: required,
            kind: NodeKind::Message {
                children: Vec::new(),
                expanded: false,
            },
        });
        // OPTIONAL message sub-trees stay unbuilt until expand() is called.
        if required {
            match resolve_field_message(registry, field) {
                Ok(descriptor) => build_children(tree, registry, id, &descriptor),
                Err(_) => record_issue(tree, id, field),
            }
        }
        return id;
    }

    let slot = match scalar_slot(registry, field) {
        Ok(slot) => slot,
        Err(_) => {
            let id = tree.alloc(NodeState {
                field: Some(field.clone()),
                parent: Some(parent),
                enabled: field.label == FieldLabel::Required,
                kind: NodeKind::Scalar {
                    slot: Slot::Selected(None),
                },
            });
            record_issue(tree, id, field);
            return id;
        }
    };
    tree.alloc(NodeState {
        field: Some(field.clone()),
        parent: Some(parent),
        enabled: field.label == FieldLabel::Required,
        kind: NodeKind::Scalar { slot },
    })
}

fn record_issue(tree: &mut FormTree, id: NodeId, field: &FieldDescriptor) {
    let issue = BuildIssue {
        path: tree.full_name(id),
        type_name: unqualified(field.type_name.as_deref().unwrap_or("")).to_string(),
    };
    debug!(path = %issue.path, type_name = %issue.type_name, "abandoned sub-tree");
    tree.issues.push(issue);
}

fn resolve_field_message(
    registry: &Registry,
    field: &FieldDescriptor,
) -> Result<Arc<MessageDescriptor>, Error> {
    let type_name = field.type_name.as_deref().ok_or_else(|| {
        Error::new(ErrorKind::Schema).with_message("message field carries no type name")
    })?;
    registry.resolve_message(type_name)
}

/// Initial value holder for a scalar leaf, pre-populated from the field's
/// textual default. Percent-decoding of the default is best-effort: on any
/// decode failure the raw text is kept verbatim.
fn scalar_slot(registry: &Registry, field: &FieldDescriptor) -> Result<Slot, Error> {
    let slot = match field.field_type {
        FieldType::Bool => Slot::Checked(field.default_value.as_deref() == Some("true")),
        FieldType::Enum => {
            let type_name = field.type_name.as_deref().ok_or_else(|| {
                Error::new(ErrorKind::Schema).with_message("enum field carries no type name")
            })?;
            let descriptor = registry.resolve_enum(type_name)?;
            let selected = field
                .default_value
                .as_deref()
                .and_then(|name| descriptor.number_for(name));
            Slot::Selected(selected)
        }
        _ => {
            let raw = field.default_value.clone().unwrap_or_default();
            Slot::Text(percent_decode(&raw).unwrap_or(raw))
        }
    };
    Ok(slot)
}

fn percent_decode(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            if index + 2 >= bytes.len() {
                return None;
            }
            let high = hex_digit(bytes[index + 1])?;
            let low = hex_digit(bytes[index + 2])?;
            decoded.push(high * 16 + low);
            index += 3;
        } else {
            decoded.push(bytes[index]);
            index += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

fn hex_digit(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{build, percent_decode};
    use crate::core::descriptor::{
        EnumDescriptor, EnumValue, FieldDescriptor, FieldLabel, FieldType, MessageDescriptor,
    };
    use crate::core::error::ErrorKind;
    use crate::core::node::Slot;
    use crate::core::registry::Registry;
    use std::sync::Arc;

    fn scalar(name: &str, number: u32, label: FieldLabel, field_type: FieldType) -> Arc<FieldDescriptor> {
        Arc::new(FieldDescriptor {
            name: name.to_string(),
            number,
            label,
            field_type,
            type_name: None,
            default_value: None,
        })
    }

    fn named(
        name: &str,
        number: u32,
        label: FieldLabel,
        field_type: FieldType,
        type_name: &str,
    ) -> Arc<FieldDescriptor> {
        Arc::new(FieldDescriptor {
            name: name.to_string(),
            number,
            label,
            field_type,
            type_name: Some(type_name.to_string()),
            default_value: None,
        })
    }

    fn with_default(field: Arc<FieldDescriptor>, default: &str) -> Arc<FieldDescriptor> {
        let mut inner = (*field).clone();
        inner.default_value = Some(default.to_string());
        Arc::new(inner)
    }

    fn message(fields: Vec<Arc<FieldDescriptor>>) -> Arc<MessageDescriptor> {
        Arc::new(MessageDescriptor {
            prefix_name: None,
            fields,
        })
    }

    #[test]
    fn scalar_defaults_populate_slots() {
        let registry = Registry::new();
        let descriptor = message(vec![
            with_default(scalar("count", 1, FieldLabel::Required, FieldType::Int32), "5"),
            with_default(scalar("label", 2, FieldLabel::Optional, FieldType::String), "a%20b"),
            with_default(scalar("flag", 3, FieldLabel::Optional, FieldType::Bool), "true"),
        ]);
        let tree = build(&registry, &descriptor);
        let children = tree.children(tree.root()).to_vec();

        assert_eq!(tree.slot(children[0]), Some(&Slot::Text("5".to_string())));
        // Percent-decoded default.
        assert_eq!(tree.slot(children[1]), Some(&Slot::Text("a b".to_string())));
        assert_eq!(tree.slot(children[2]), Some(&Slot::Checked(true)));

        assert!(tree.enabled(children[0]));
        assert!(!tree.enabled(children[1]));
        assert!(!tree.enabled(children[2]));
    }

    #[test]
    fn malformed_default_encoding_falls_back_to_raw_text() {
        let registry = Registry::new();
        let descriptor = message(vec![with_default(
            scalar("token", 1, FieldLabel::Optional, FieldType::String),
            "50%zz",
        )]);
        let tree = build(&registry, &descriptor);
        let child = tree.children(tree.root())[0];
        assert_eq!(tree.slot(child), Some(&Slot::Text("50%zz".to_string())));
    }

    #[test]
    fn enum_default_selects_variant_by_name() {
        let mut registry = Registry::new();
        registry.insert_enum(
            "pkg.Color",
            EnumDescriptor {
                variants: vec![
                    EnumValue { name: "RED".to_string(), number: 1 },
                    EnumValue { name: "BLUE".to_string(), number: 4 },
                ],
            },
        );
        let descriptor = message(vec![
            with_default(
                named("color", 1, FieldLabel::Optional, FieldType::Enum, ".pkg.Color"),
                "BLUE",
            ),
            named("shade", 2, FieldLabel::Optional, FieldType::Enum, ".pkg.Color"),
        ]);
        let tree = build(&registry, &descriptor);
        let children = tree.children(tree.root()).to_vec();
        assert_eq!(tree.slot(children[0]), Some(&Slot::Selected(Some(4))));
        assert_eq!(tree.slot(children[1]), Some(&Slot::Selected(None)));
    }

    #[test]
    fn self_referential_message_defers_recursion_to_expand() {
        let mut registry = Registry::new();
        let node_descriptor = MessageDescriptor {
            prefix_name: None,
            fields: vec![named("next", 1, FieldLabel::Optional, FieldType::Message, ".list.Node")],
        };
        registry.insert_message("list.Node", node_descriptor);
        let root = registry.resolve_message("list.Node").unwrap();

        let mut tree = build(&registry, &root);
        let next = tree.children(tree.root())[0];
        assert!(!tree.is_expanded(next));
        assert!(!tree.enabled(next));
        assert!(tree.children(next).is_empty());

        tree.expand(next, &registry).unwrap();
        assert!(tree.is_expanded(next));
        assert_eq!(tree.children(next).len(), 1);

        // Idempotent: no duplicate sub-tree on a second call.
        tree.expand(next, &registry).unwrap();
        assert_eq!(tree.children(next).len(), 1);

        // One more level, still caller-driven.
        let next_next = tree.children(next)[0];
        assert!(!tree.is_expanded(next_next));
    }

    #[test]
    fn required_message_fields_build_eagerly() {
        let mut registry = Registry::new();
        registry.insert_message(
            "pkg.Inner",
            MessageDescriptor {
                prefix_name: None,
                fields: vec![scalar("value", 1, FieldLabel::Required, FieldType::Int32)],
            },
        );
        let descriptor = message(vec![named(
            "inner",
            1,
            FieldLabel::Required,
            FieldType::Message,
            ".pkg.Inner",
        )]);
        let tree = build(&registry, &descriptor);
        let inner = tree.children(tree.root())[0];
        assert!(tree.is_expanded(inner));
        assert!(tree.enabled(inner));
        assert_eq!(tree.children(inner).len(), 1);
    }

    #[test]
    fn unknown_descriptor_abandons_only_that_sub_tree() {
        let registry = Registry::new();
        let descriptor = message(vec![
            named("ghost", 1, FieldLabel::Required, FieldType::Message, ".pkg.Ghost"),
            scalar("kept", 2, FieldLabel::Required, FieldType::Int32),
        ]);
        let tree = build(&registry, &descriptor);
        let children = tree.children(tree.root()).to_vec();

        assert_eq!(tree.issues().len(), 1);
        assert_eq!(tree.issues()[0].path, "ghost");
        assert_eq!(tree.issues()[0].type_name, "pkg.Ghost");
        assert!(!tree.is_expanded(children[0]));
        // The sibling still built.
        assert!(tree.slot(children[1]).is_some());
    }

    #[test]
    fn expanding_an_unresolvable_placeholder_fails_cleanly() {
        let registry = Registry::new();
        let descriptor = message(vec![named(
            "ghost",
            1,
            FieldLabel::Optional,
            FieldType::Message,
            ".pkg.Ghost",
        )]);
        let mut tree = build(&registry, &descriptor);
        assert!(tree.issues().is_empty());

        let ghost = tree.children(tree.root())[0];
        let err = tree.expand(ghost, &registry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownDescriptor);
        assert_eq!(err.field(), Some("ghost"));
    }

    #[test]
    fn repeated_items_grow_and_shrink_by_identity() {
        let registry = Registry::new();
        let descriptor = message(vec![scalar("ids", 1, FieldLabel::Repeated, FieldType::Int32)]);
        let mut tree = build(&registry, &descriptor);
        let container = tree.children(tree.root())[0];

        assert!(!tree.enabled(container));
        let first = tree.add_repeated_item(container, &registry).unwrap();
        let second = tree.add_repeated_item(container, &registry).unwrap();
        let third = tree.add_repeated_item(container, &registry).unwrap();
        assert!(tree.enabled(container));
        assert_eq!(tree.children(container), &[first, second, third]);

        // Removing from the middle keeps survivors in order.
        tree.remove_repeated_item(container, second).unwrap();
        assert_eq!(tree.children(container), &[first, third]);

        let err = tree.remove_repeated_item(container, second).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);

        tree.remove_repeated_item(container, first).unwrap();
        tree.remove_repeated_item(container, third).unwrap();
        assert!(!tree.enabled(container));
    }

    #[test]
    fn repeated_message_items_build_their_sub_tree_eagerly() {
        let mut registry = Registry::new();
        registry.insert_message(
            "pkg.Point",
            MessageDescriptor {
                prefix_name: None,
                fields: vec![
                    scalar("x", 1, FieldLabel::Required, FieldType::Int32),
                    scalar("y", 2, FieldLabel::Required, FieldType::Int32),
                ],
            },
        );
        let descriptor = message(vec![named(
            "points",
            1,
            FieldLabel::Repeated,
            FieldType::Message,
            ".pkg.Point",
        )]);
        let mut tree = build(&registry, &descriptor);
        let container = tree.children(tree.root())[0];
        let item = tree.add_repeated_item(container, &registry).unwrap();
        assert!(tree.is_expanded(item));
        assert_eq!(tree.children(item).len(), 2);
    }

    #[test]
    fn adding_an_item_of_unknown_message_type_fails() {
        let registry = Registry::new();
        let descriptor = message(vec![named(
            "ghosts",
            1,
            FieldLabel::Repeated,
            FieldType::Message,
            ".pkg.Ghost",
        )]);
        let mut tree = build(&registry, &descriptor);
        let container = tree.children(tree.root())[0];
        let err = tree.add_repeated_item(container, &registry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownDescriptor);
    }

    #[test]
    fn percent_decode_handles_utf8_and_rejects_malformed() {
        assert_eq!(percent_decode("plain"), Some("plain".to_string()));
        assert_eq!(percent_decode("a%20b"), Some("a b".to_string()));
        assert_eq!(percent_decode("%E4%B8%AD"), Some("\u{4e2d}".to_string()));
        assert_eq!(percent_decode("%zz"), None);
        assert_eq!(percent_decode("trailing%2"), None);
        // Decodes to invalid UTF-8.
        assert_eq!(percent_decode("%ff"), None);
    }
}
