use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::definition::PropertyDefinition;
use super::dsl::{Aggregation, AggregationResults, Filter, Query};
use crate::config::SearchConfig;
use crate::error::GraphError;
use crate::model::{ElementKind, Property};
use crate::security::{Authorizations, Visibility};

/// Failures reported by a search backend.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The targeted index does not exist yet.
    #[error("index '{index}' does not exist")]
    IndexMissing {
        /// Missing index name.
        index: String,
    },
    /// The backend could not be reached or rejected the request.
    #[error("search backend unavailable: {0}")]
    Unavailable(String),
}

impl From<SearchError> for GraphError {
    fn from(err: SearchError) -> Self {
        GraphError::BackendUnavailable(err.to_string())
    }
}

/// One stored property variant dropped by a write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedProperty {
    /// Property key.
    pub key: String,
    /// Property name.
    pub name: String,
    /// Visibility of the dropped variant.
    pub visibility: Visibility,
}

/// An element write forwarded to the index. Property upserts and removals
/// merge into any existing document.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedElement {
    /// Element kind.
    pub kind: ElementKind,
    /// Element id.
    pub id: String,
    /// Element visibility.
    pub visibility: Visibility,
    /// Properties to upsert, on `(key, name, visibility)`.
    pub properties: Vec<Property>,
    /// Property variants to drop, on `(key, name, visibility)`. Only the
    /// variants the writer could read are listed.
    pub removals: Vec<RemovedProperty>,
}

/// A compiled search.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchRequest {
    /// Indices to search.
    pub indices: Vec<String>,
    /// Conjunctive filters.
    pub filters: Vec<Filter>,
    /// Scoring query.
    pub query: Query,
    /// Aggregations computed over every matching document.
    pub aggregations: Vec<Aggregation>,
    /// Hits to skip.
    pub from: u64,
    /// Maximum hits returned.
    pub size: u64,
}

/// One matching document.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchHit {
    /// Element id.
    pub id: String,
    /// Element kind.
    pub kind: ElementKind,
    /// Relevance score.
    pub score: f64,
}

/// Page of hits plus totals.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResponse {
    /// Hits in relevance order.
    pub hits: Vec<SearchHit>,
    /// Number of matching documents before pagination.
    pub total_hits: u64,
    /// Time the backend reported spending.
    pub took: Duration,
    /// Aggregation results by name.
    pub aggregations: AggregationResults,
}

/// Client contract of a search backend.
///
/// The backend has no notion of security. Anything it returns is re-fetched
/// through the graph under the caller's authorizations.
pub trait SearchIndex: Send + Sync {
    /// Adds or merges a document.
    fn add_element(&self, element: &IndexedElement) -> Result<(), SearchError>;

    /// Removes a document.
    fn delete_element(&self, kind: ElementKind, id: &str) -> Result<(), SearchError>;

    /// Runs a search.
    fn execute(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError>;

    /// Deflated fields of `name` readable by `auths`.
    fn matching_property_names(&self, name: &str, auths: &Authorizations) -> Vec<String>;

    /// Visibility hash of a deflated field, `None` for plain fields.
    fn visibility_hash(&self, field: &str) -> Option<String>;

    /// Definition registered for `name`.
    fn property_definition(&self, name: &str) -> Option<PropertyDefinition>;

    /// Registers or replaces a definition.
    fn define_property(&self, definition: PropertyDefinition) -> Result<(), SearchError>;
}

/// Picks the indices a query targets.
pub trait IndexSelectionStrategy: Send + Sync {
    /// Indices to search for a query restricted to `kind` (`None` for mixed
    /// element queries).
    fn indices_to_query(&self, config: &SearchConfig, kind: Option<ElementKind>) -> Vec<String>;
}

/// Targets the single configured index.
#[derive(Debug, Default)]
pub struct DefaultIndexSelection;

impl IndexSelectionStrategy for DefaultIndexSelection {
    fn indices_to_query(&self, config: &SearchConfig, _kind: Option<ElementKind>) -> Vec<String> {
        vec![config.index_name.clone()]
    }
}

/// Rewrites the scoring query before it is sent.
pub trait ScoringStrategy: Send + Sync {
    /// Returns the query to execute.
    fn update_query(&self, query: Query) -> Query;
}

/// Leaves the query untouched.
#[derive(Debug, Default)]
pub struct DefaultScoring;

impl ScoringStrategy for DefaultScoring {
    fn update_query(&self, query: Query) -> Query {
        query
    }
}
