//! Penumbra: a storage-agnostic property-graph core with cell-level visibility.
//!
//! The crate is split along the same seams the engine is reasoned about:
//!
//! * [`security`] evaluates visibility expressions against authorization sets.
//! * [`model`] holds the immutable element snapshots handed back to callers.
//! * [`graph`] is the facade: CRUD, existence checks, batch fetch, related-edge
//!   discovery and path finding, with naive-but-correct fallbacks layered over a
//!   small [`graph::StorageBackend`] contract.
//! * [`search`] and [`query`] compile abstract predicates into a backend search
//!   request and reconcile the results against the graph's security model.
//! * [`storage`] ships an in-memory backend implementing the storage contract.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod query;
pub mod search;
pub mod security;
pub mod storage;

pub use config::{ConfigError, GraphConfig, IdGeneratorKind, SearchConfig};
pub use error::{GraphError, Result};
pub use graph::{EdgeFilter, Graph, GraphEvent, GraphEventListener, ProgressCallback, ProgressStep};
pub use model::{
    Direction, Edge, EdgeInfo, Element, ElementKind, FetchHints, GeoCircle, GeoPoint,
    GraphElement, Metadata, Path, Property, PropertyValue, RelatedEdge, Vertex,
};
pub use query::{
    Compare, Contains, GeoCompare, GraphQuery, HasContainer, Predicate, QueryParameters,
    QueryResults, TextPredicate,
};
pub use security::{Authorizations, Visibility};
pub use storage::InMemoryBackend;
