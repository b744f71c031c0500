//! Query builder and execution.
//!
//! With a search index attached, a query is compiled, executed by the index
//! and reconciled: every hit is re-fetched under the caller's authorizations
//! and, when configured, re-checked in memory. Without an index the graph is
//! scanned and every element is evaluated in memory.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::aggregation::AggregationItem;
use super::compiler::QueryCompiler;
use super::parameters::{QueryKind, QueryParameters, SimilarToTextParameters};
use super::predicate::{query_string_matches, HasContainer, Predicate, QueryValue};
use crate::error::{GraphError, Result};
use crate::graph::{Graph, StorageBackend};
use crate::model::{Edge, Element, ElementKind, FetchHints, GraphElement, PropertyValue, Vertex};
use crate::search::{AggregationResult, AggregationResults, SearchError, SearchRequest};
use crate::security::Authorizations;

/// Lazily materialized query results with search statistics.
pub struct QueryResults<'g, T> {
    items: Box<dyn Iterator<Item = Result<T>> + 'g>,
    total_hits: u64,
    search_time: Duration,
    aggregations: AggregationResults,
}

impl<'g, T: 'g> QueryResults<'g, T> {
    fn empty() -> Self {
        Self {
            items: Box::new(std::iter::empty()),
            total_hits: 0,
            search_time: Duration::ZERO,
            aggregations: AggregationResults::new(),
        }
    }

    fn filter_map_items<U: 'g>(self, mut f: impl FnMut(T) -> Option<U> + 'g) -> QueryResults<'g, U> {
        QueryResults {
            items: Box::new(self.items.filter_map(move |item| match item {
                Ok(value) => f(value).map(Ok),
                Err(err) => Some(Err(err)),
            })),
            total_hits: self.total_hits,
            search_time: self.search_time,
            aggregations: self.aggregations,
        }
    }

    /// Matches reported before pagination and reconciliation.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Time spent searching.
    pub fn search_time(&self) -> Duration {
        self.search_time
    }

    /// Every aggregation result by compiled name.
    pub fn aggregation_results(&self) -> &AggregationResults {
        &self.aggregations
    }

    /// One aggregation result.
    pub fn aggregation(&self, name: &str) -> Option<&AggregationResult> {
        self.aggregations.get(name)
    }
}

impl<T> Iterator for QueryResults<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }
}

impl<T> std::fmt::Debug for QueryResults<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResults")
            .field("total_hits", &self.total_hits)
            .field("search_time", &self.search_time)
            .field("aggregations", &self.aggregations.len())
            .finish()
    }
}

/// A query under construction. Created by [`Graph::query`],
/// [`Graph::query_string`] and [`Graph::query_similar_to`].
pub struct GraphQuery<'g, B: StorageBackend> {
    graph: &'g Graph<B>,
    parameters: QueryParameters,
    aggregations: Vec<AggregationItem>,
}

impl<'g, B: StorageBackend> GraphQuery<'g, B> {
    pub(crate) fn new(
        graph: &'g Graph<B>,
        query: Option<String>,
        authorizations: Authorizations,
    ) -> Self {
        let limit = graph.config().search.default_limit;
        Self {
            graph,
            parameters: QueryParameters::query_string(query, limit, authorizations),
            aggregations: Vec::new(),
        }
    }

    pub(crate) fn similar_to(
        graph: &'g Graph<B>,
        similar: SimilarToTextParameters,
        authorizations: Authorizations,
    ) -> Self {
        let limit = graph.config().search.default_limit;
        Self {
            graph,
            parameters: QueryParameters::similar_to_text(similar, limit, authorizations),
            aggregations: Vec::new(),
        }
    }

    /// Adds a clause comparing `property` with a single value.
    pub fn has(
        mut self,
        property: impl Into<String>,
        predicate: impl Into<Predicate>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.parameters.push_has_container(HasContainer::Value {
            property: property.into(),
            predicate: predicate.into(),
            value: QueryValue::Scalar(value.into()),
        });
        self
    }

    /// Adds a clause comparing `property` with a list of values.
    pub fn has_any<I, V>(
        mut self,
        property: impl Into<String>,
        predicate: impl Into<Predicate>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<PropertyValue>,
    {
        self.parameters.push_has_container(HasContainer::Value {
            property: property.into(),
            predicate: predicate.into(),
            value: QueryValue::List(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    /// Requires a visible value for `property`.
    pub fn has_property(mut self, property: impl Into<String>) -> Self {
        self.parameters.push_has_container(HasContainer::Property {
            property: property.into(),
        });
        self
    }

    /// Requires no visible value for `property`.
    pub fn has_not_property(mut self, property: impl Into<String>) -> Self {
        self.parameters.push_has_container(HasContainer::NotProperty {
            property: property.into(),
        });
        self
    }

    /// Results to skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.parameters.set_skip(skip);
        self
    }

    /// Maximum results.
    pub fn limit(mut self, limit: u64) -> Self {
        self.parameters.set_limit(limit);
        self
    }

    /// Requests an aggregation.
    pub fn aggregation(mut self, item: AggregationItem) -> Self {
        self.aggregations.push(item);
        self
    }

    /// Parameters built so far.
    pub fn parameters(&self) -> &QueryParameters {
        &self.parameters
    }

    /// Matching vertices.
    pub fn vertices(self, hints: FetchHints) -> Result<QueryResults<'g, Vertex>> {
        Ok(self
            .execute(Some(ElementKind::Vertex), hints)?
            .filter_map_items(GraphElement::into_vertex))
    }

    /// Matching edges.
    pub fn edges(self, hints: FetchHints) -> Result<QueryResults<'g, Edge>> {
        Ok(self
            .execute(Some(ElementKind::Edge), hints)?
            .filter_map_items(GraphElement::into_edge))
    }

    /// Matching vertices and edges.
    pub fn elements(self, hints: FetchHints) -> Result<QueryResults<'g, GraphElement>> {
        self.execute(None, hints)
    }

    fn execute(self, kind: Option<ElementKind>, hints: FetchHints) -> Result<QueryResults<'g, GraphElement>> {
        match self.graph.search_index() {
            Some(_) => self.search(kind, hints),
            None => self.scan(kind, hints),
        }
    }

    fn search(self, kind: Option<ElementKind>, hints: FetchHints) -> Result<QueryResults<'g, GraphElement>> {
        let graph = self.graph;
        let Some(index) = graph.search_index() else {
            return Ok(QueryResults::empty());
        };
        let compiled = match QueryCompiler::new(index, &self.parameters).compile(kind, &self.aggregations) {
            Ok(compiled) => compiled,
            Err(GraphError::NoMatchingProperties { property }) => {
                debug!(property = %property, "query.search.no_matching_properties");
                return Ok(QueryResults::empty());
            }
            Err(err) => return Err(err),
        };

        let request = SearchRequest {
            indices: graph
                .index_selection()
                .indices_to_query(&graph.config().search, kind),
            filters: compiled.filters,
            query: graph.scoring().update_query(compiled.query),
            aggregations: compiled.aggregations,
            from: self.parameters.skip(),
            size: self.parameters.limit(),
        };
        if tracing::enabled!(target: "penumbra::query", tracing::Level::TRACE) {
            match serde_json::to_string(&request) {
                Ok(json) => trace!(target: "penumbra::query", request = %json, "query.search.request"),
                Err(err) => trace!(target: "penumbra::query", error = %err, "query.search.request_unserializable"),
            }
        }

        let response = match index.execute(&request) {
            Ok(response) => response,
            Err(SearchError::IndexMissing { index }) => {
                debug!(index = %index, "query.search.index_missing");
                return Ok(QueryResults::empty());
            }
            Err(err) => return Err(err.into()),
        };
        debug!(
            hits = response.hits.len(),
            total_hits = response.total_hits,
            took_us = response.took.as_micros() as u64,
            "query.search.results"
        );

        let search = &graph.config().search;
        let evaluate_containers = search.evaluate_has_containers;
        let evaluate_query = search.evaluate_query_string;
        let fetch_hints = if evaluate_containers || evaluate_query {
            hints.union(FetchHints::PROPERTIES)
        } else {
            hints
        };
        let reconcile = self.parameters.with_skip(0);
        let items = response.hits.into_iter().filter_map(move |hit| {
            let element = match graph.get_element(hit.kind, &hit.id, fetch_hints, None, reconcile.authorizations()) {
                Ok(Some(element)) => element,
                Ok(None) => return None,
                Err(err) => return Some(Err(err)),
            };
            match still_matches(&reconcile, &element, evaluate_containers, evaluate_query) {
                Ok(true) => Some(Ok(element)),
                Ok(false) => {
                    trace!(id = %hit.id, "query.search.false_positive");
                    None
                }
                Err(err) => Some(Err(err)),
            }
        });

        Ok(QueryResults {
            items: Box::new(items),
            total_hits: response.total_hits,
            search_time: response.took,
            aggregations: response.aggregations,
        })
    }

    fn scan(self, kind: Option<ElementKind>, hints: FetchHints) -> Result<QueryResults<'g, GraphElement>> {
        if let QueryKind::SimilarToText(_) = self.parameters.kind() {
            return Err(GraphError::UnsupportedQueryParameterType(
                "similar-to-text requires a search index".into(),
            ));
        }
        if !self.aggregations.is_empty() {
            return Err(GraphError::UnsupportedFeature("aggregations without a search index"));
        }

        let started = Instant::now();
        let kinds: &[ElementKind] = match kind {
            Some(ElementKind::Vertex) => &[ElementKind::Vertex],
            Some(ElementKind::Edge) => &[ElementKind::Edge],
            None => &[ElementKind::Vertex, ElementKind::Edge],
        };
        let auths = self.parameters.authorizations();
        let mut matches = Vec::new();
        for &kind in kinds {
            for element in self
                .graph
                .backend()
                .scan(kind, hints.union(FetchHints::PROPERTIES), None, auths)?
            {
                let element = element?;
                if still_matches(&self.parameters, &element, true, true)? {
                    matches.push(element);
                }
            }
        }

        let total_hits = matches.len() as u64;
        let skip = usize::try_from(self.parameters.skip()).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.parameters.limit()).unwrap_or(usize::MAX);
        debug!(total_hits, skip, limit, "query.scan.results");
        Ok(QueryResults {
            items: Box::new(matches.into_iter().skip(skip).take(limit).map(Ok)),
            total_hits,
            search_time: started.elapsed(),
            aggregations: AggregationResults::new(),
        })
    }
}

fn still_matches(
    parameters: &QueryParameters,
    element: &GraphElement,
    evaluate_containers: bool,
    evaluate_query: bool,
) -> Result<bool> {
    if evaluate_containers {
        for container in parameters.has_containers() {
            if !container.is_match(element)? {
                return Ok(false);
            }
        }
    }
    if evaluate_query && !query_string_matches(parameters.query_text(), element)? {
        return Ok(false);
    }
    Ok(true)
}

impl<B: StorageBackend> std::fmt::Debug for GraphQuery<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQuery")
            .field("parameters", &self.parameters)
            .field("aggregations", &self.aggregations)
            .finish()
    }
}
