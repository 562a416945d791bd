//! Purpose: Core form model (descriptors, registry, parsing, tree, extraction).
//! Exports: `descriptor`, `registry`, `scalar`, `node`, `build`, `extract`, `error`.
//! Role: Synchronous, I/O-free walkers over caller-owned trees.
//! Invariants: No shared mutable state crosses operation boundaries.
//! Invariants: Recursion is bounded by the lazy-expansion gate, not by schema shape.

pub mod build;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod node;
pub mod registry;
pub mod scalar;
