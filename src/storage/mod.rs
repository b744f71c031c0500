//! Storage backends.
//!
//! The graph facade only talks to [`crate::graph::StorageBackend`]; this
//! module ships the in-process implementation used by embedders and tests.

mod memory;

pub use memory::InMemoryBackend;
