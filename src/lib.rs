//! Purpose: Shared library crate backing the `protoform` CLI and tests.
//! Exports: `api` (stable surface), `core` (descriptors, tree, extraction).
//! Role: Descriptor-driven form model; rendering and transport live elsewhere.
//! Invariants: Treat the crate API as internal until a dedicated library release.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
