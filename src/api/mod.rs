//! Purpose: Define the stable public Rust API boundary for protoform.
//! Exports: Core types and operations needed by the CLI and embedding callers.
//! Role: Public, additive-only surface over the core form model.
//! Invariants: Rendering and transport collaborators consume only this module.

mod document;
mod fill;

pub use crate::core::build::{BuildIssue, build};
pub use crate::core::descriptor::{
    EnumDescriptor, EnumValue, FieldDescriptor, FieldLabel, FieldType, MessageDescriptor,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::extract::{Extraction, FieldError, extract};
pub use crate::core::node::{FormTree, NodeId, Slot};
pub use crate::core::registry::{Registry, unqualified};
pub use crate::core::scalar::{ScalarError, ValueErrorKind, parse_scalar};
pub use document::{LoadOptions, SchemaDocument};
pub use fill::fill;
