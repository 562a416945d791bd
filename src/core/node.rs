//! Purpose: Arena-backed editable value tree mirroring a message schema.
//! Exports: `FormTree`, `NodeId`, `Slot`.
//! Role: Data model mutated by rendering layers and read by the extractor.
//! Invariants: Parent links are non-owning and used only for path naming.
//! Invariants: `NodeId`s are minted by one tree and are only valid against it.
//! Invariants: Removed repeated items are detached from the parent list; the
//!             arena slot is tombstoned, never reused.

use crate::core::build::BuildIssue;
use crate::core::descriptor::{FieldDescriptor, FieldLabel};
use crate::core::error::{Error, ErrorKind};
use std::sync::Arc;
use tracing::debug;

/// Handle to one node inside a [`FormTree`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) usize);

/// Value holder of a scalar leaf. The variant is fixed by the field type at
/// build time: BOOL gets `Checked`, ENUM gets `Selected`, everything else
/// holds raw text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    Text(String),
    Checked(bool),
    Selected(Option<i64>),
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Scalar { slot: Slot },
    Message { children: Vec<NodeId>, expanded: bool },
    Repeated { items: Vec<NodeId> },
}

#[derive(Debug)]
pub(crate) struct NodeState {
    /// `None` only for the root message node.
    pub(crate) field: Option<Arc<FieldDescriptor>>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) enabled: bool,
    pub(crate) kind: NodeKind,
}

/// Editable tree built from a message descriptor. Single-owner, synchronous;
/// all growth (expand, repeated add) is caller-driven.
#[derive(Debug)]
pub struct FormTree {
    pub(crate) nodes: Vec<NodeState>,
    pub(crate) root: NodeId,
    pub(crate) issues: Vec<BuildIssue>,
}

impl FormTree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Sub-trees the builder had to abandon (unresolvable type references).
    pub fn issues(&self) -> &[BuildIssue] {
        &self.issues
    }

    pub fn field(&self, id: NodeId) -> Option<&Arc<FieldDescriptor>> {
        self.nodes[id.0].field.as_ref()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Message children or repeated items, in order. Empty for scalar leaves.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].kind {
            NodeKind::Message { children, .. } => children,
            NodeKind::Repeated { items } => items,
            NodeKind::Scalar { .. } => &[],
        }
    }

    pub fn is_message(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Message { .. })
    }

    pub fn is_repeated(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Repeated { .. })
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        match &self.nodes[id.0].kind {
            NodeKind::Message { expanded, .. } => *expanded,
            _ => false,
        }
    }

    /// Whether the field is present in extracted output. Repeated fields are
    /// enabled iff they currently own at least one item.
    pub fn enabled(&self, id: NodeId) -> bool {
        match &self.nodes[id.0].kind {
            NodeKind::Repeated { items } => !items.is_empty(),
            _ => self.nodes[id.0].enabled,
        }
    }

    pub fn slot(&self, id: NodeId) -> Option<&Slot> {
        match &self.nodes[id.0].kind {
            NodeKind::Scalar { slot } => Some(slot),
            _ => None,
        }
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<(), Error> {
        let Some(field) = self.nodes[id.0].field.clone() else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("the root message cannot be toggled"));
        };
        match field.label {
            FieldLabel::Repeated => Err(Error::new(ErrorKind::Usage)
                .with_message("repeated fields are enabled by their items")
                .with_field(self.full_name(id))),
            FieldLabel::Required if !enabled => Err(Error::new(ErrorKind::Usage)
                .with_message("required fields are always enabled")
                .with_field(self.full_name(id))),
            _ => {
                self.nodes[id.0].enabled = enabled;
                Ok(())
            }
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), Error> {
        if let NodeKind::Scalar {
            slot: Slot::Text(value),
        } = &mut self.nodes[id.0].kind
        {
            *value = text.into();
            return Ok(());
        }
        Err(self.slot_mismatch(id, "text"))
    }

    pub fn set_checked(&mut self, id: NodeId, checked: bool) -> Result<(), Error> {
        if let NodeKind::Scalar {
            slot: Slot::Checked(value),
        } = &mut self.nodes[id.0].kind
        {
            *value = checked;
            return Ok(());
        }
        Err(self.slot_mismatch(id, "checked"))
    }

    pub fn set_selected(&mut self, id: NodeId, selection: Option<i64>) -> Result<(), Error> {
        if let NodeKind::Scalar {
            slot: Slot::Selected(value),
        } = &mut self.nodes[id.0].kind
        {
            *value = selection;
            return Ok(());
        }
        Err(self.slot_mismatch(id, "selection"))
    }

    /// Detach one item from a repeated field, by identity. Surviving items
    /// keep their order; the detached node is never observed by extraction.
    pub fn remove_repeated_item(&mut self, parent: NodeId, item: NodeId) -> Result<(), Error> {
        let path = self.full_name(parent);
        let NodeKind::Repeated { items } = &mut self.nodes[parent.0].kind else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("not a repeated field")
                .with_field(path));
        };
        let before = items.len();
        items.retain(|&existing| existing != item);
        if items.len() == before {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("item is not attached to this repeated field")
                .with_field(path));
        }
        debug!(field = %path, remaining = items.len(), "removed repeated item");
        Ok(())
    }

    /// Dotted path from the root to this node, for diagnostics. A repeated
    /// item reports its container's path (the item shares the container's
    /// descriptor and contributes no extra segment).
    pub fn full_name(&self, id: NodeId) -> String {
        let mut names: Vec<&str> = Vec::new();
        let mut current = Some(id);
        while let Some(at) = current {
            let state = &self.nodes[at.0];
            if let Some(field) = &state.field {
                // A repeated item shares its container's descriptor; the
                // container contributes the segment.
                let is_repeated_item = state
                    .parent
                    .is_some_and(|parent| matches!(self.nodes[parent.0].kind, NodeKind::Repeated { .. }));
                if !is_repeated_item {
                    names.push(field.name.as_str());
                }
            }
            current = state.parent;
        }
        names.reverse();
        names.join(".")
    }

    pub(crate) fn alloc(&mut self, state: NodeState) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(state);
        id
    }

    fn slot_mismatch(&self, id: NodeId, wanted: &str) -> Error {
        Error::new(ErrorKind::Usage)
            .with_message(format!("field does not take a {wanted} value"))
            .with_field(self.full_name(id))
    }
}
