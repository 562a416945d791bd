//! Purpose: Walk a built tree and assemble the structured output value.
//! Exports: `extract`, `Extraction`, `FieldError`.
//! Role: Final pass before transport; the caller submits only on zero errors.
//! Invariants: Extraction never stops at the first failure. Every enabled
//!             field is visited, every failure is path-qualified, and a
//!             best-effort partial value is still produced.
//! Invariants: Disabled OPTIONAL fields contribute no key at all.

use crate::core::descriptor::FieldType;
use crate::core::node::{FormTree, NodeId};
use crate::core::scalar::{ValueErrorKind, parse_scalar};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// One per-field validation failure, in document order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldError {
    /// Dotted full path of the failing field, e.g. `address.street`.
    pub path: String,
    pub kind: ValueErrorKind,
    pub detail: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.detail)
    }
}

/// Result of one whole-tree pass: the assembled value plus every validation
/// failure encountered along the way.
#[derive(Clone, Debug, PartialEq)]
pub struct Extraction {
    pub value: Value,
    pub errors: Vec<FieldError>,
}

impl Extraction {
    /// True when the value is safe to submit.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Extract the whole tree into a JSON-shaped value. 32-bit integers and
/// floats become numbers, 64-bit integers keep their exact text, enums
/// become their numeric variant value, nested messages become objects.
pub fn extract(tree: &FormTree) -> Extraction {
    let mut errors = Vec::new();
    let value = extract_message(tree, tree.root(), &mut errors);
    debug!(errors = errors.len(), "extracted form tree");
    Extraction { value, errors }
}

fn extract_message(tree: &FormTree, id: NodeId, errors: &mut Vec<FieldError>) -> Value {
    let mut object = Map::new();
    for &child in tree.children(id) {
        if !tree.enabled(child) {
            continue;
        }
        let Some(field) = tree.field(child) else {
            continue;
        };
        let value = if tree.is_repeated(child) {
            let items: Vec<Value> = tree
                .children(child)
                .iter()
                .map(|&item| extract_value(tree, item, errors))
                .collect();
            Value::Array(items)
        } else {
            extract_value(tree, child, errors)
        };
        object.insert(field.name.clone(), value);
    }
    Value::Object(object)
}

fn extract_value(tree: &FormTree, id: NodeId, errors: &mut Vec<FieldError>) -> Value {
    let Some(field) = tree.field(id) else {
        return Value::Null;
    };
    if field.field_type == FieldType::Message {
        return extract_message(tree, id, errors);
    }
    let Some(slot) = tree.slot(id) else {
        return Value::Null;
    };
    match parse_scalar(field.field_type, slot) {
        Ok(value) => value,
        Err(err) => {
            errors.push(FieldError {
                path: tree.full_name(id),
                kind: err.kind,
                detail: err.detail,
            });
            // The failed field still holds a placeholder in the partial value.
            Value::Null
        }
    }
}
