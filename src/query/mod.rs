#![forbid(unsafe_code)]

//! Query layer.
//!
//! Callers describe what they want with backend-neutral clauses; the compiler
//! turns them into a search request and the executor reconciles the answer
//! against the graph's security model.

/// Per-property aggregation requests.
pub mod aggregation;

/// Translation of clauses into search filters, queries and aggregations.
pub mod compiler;

/// Query builder, execution and result reconciliation.
pub mod graph_query;

/// Immutable query parameters.
pub mod parameters;

/// Predicates, clauses and their in-memory evaluation.
pub mod predicate;

pub use aggregation::{AggregationItem, DEFAULT_GEOHASH_PRECISION};
pub use compiler::{CompiledQuery, QueryCompiler};
pub use graph_query::{GraphQuery, QueryResults};
pub use parameters::{QueryKind, QueryParameters, SimilarToTextParameters};
pub use predicate::{
    query_string_matches, Compare, Contains, GeoCompare, HasContainer, Predicate, QueryValue,
    TextPredicate,
};
