//! Search-side collaborators of the query layer: field naming, the request
//! language, the index client contract and an in-process index.

mod analyzer;
mod definition;
mod deflate;
mod dsl;
mod index;
mod memory;

pub use analyzer::tokenize;
pub use definition::{DataType, PropertyDefinition, TextIndexHint};
pub use deflate::{
    deflate_property_name, visibility_hash, DeflatedNames, ELEMENT_TYPE_FIELD, EXACT_MATCH_SUFFIX,
    GEO_SUFFIX,
};
pub use dsl::{
    Aggregation, AggregationResult, AggregationResults, DateInterval, DateUnit, Filter,
    GeohashBucket, HistogramBucket, MoreLikeThis, Query, RangeBound, TermsBucket, TermsExecution,
};
pub use index::{
    DefaultIndexSelection, DefaultScoring, IndexSelectionStrategy, IndexedElement,
    RemovedProperty, ScoringStrategy, SearchError, SearchHit, SearchIndex, SearchRequest, SearchResponse,
};
pub use memory::{geohash, MemorySearchIndex};
