#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use penumbra::query::{AggregationItem, SimilarToTextParameters};
use penumbra::search::{
    AggregationResult, IndexSelectionStrategy, IndexedElement, MemorySearchIndex,
    PropertyDefinition, SearchError, SearchIndex, SearchRequest, SearchResponse, TermsBucket,
};
use penumbra::{
    Authorizations, Compare, Element, ElementKind, FetchHints, Graph, GraphConfig, GraphError,
    InMemoryBackend, PropertyValue, Result, SearchConfig, TextPredicate, Vertex,
};

use common::{auths, init_tracing, open_graph, open_search_graph, vis};

fn seed_cities(graph: &Graph<InMemoryBackend>) -> Result<()> {
    let public = auths(&["public"]);
    for (id, name, population) in [("1", "Paris", 2_000_000i64), ("2", "Lyon", 500_000)] {
        graph
            .prepare_vertex(Some(id), None, vis("public"))
            .set_property("name", name, vis("public"))
            .set_property("population", population, vis("public"))
            .save(&public)?;
    }
    Ok(())
}

fn ids(vertices: impl Iterator<Item = Result<Vertex>>) -> Result<Vec<String>> {
    vertices.map(|v| v.map(|v| v.id().to_owned())).collect()
}

fn large_cities(graph: &Graph<InMemoryBackend>, auths: &Authorizations) -> Result<Vec<String>> {
    let results = graph
        .query(auths)
        .has("population", Compare::GreaterThan, 1_000_000i64)
        .vertices(FetchHints::ALL)?;
    ids(results)
}

#[test]
fn population_filter_through_the_index() -> Result<()> {
    let (graph, _index) = open_search_graph();
    seed_cities(&graph)?;

    assert_eq!(large_cities(&graph, &auths(&["public"]))?, vec!["1"]);
    assert!(large_cities(&graph, &auths(&["other"]))?.is_empty());
    Ok(())
}

#[test]
fn population_filter_without_an_index() -> Result<()> {
    let graph = open_graph();
    seed_cities(&graph)?;

    assert_eq!(large_cities(&graph, &auths(&["public"]))?, vec!["1"]);
    assert!(large_cities(&graph, &auths(&["other"]))?.is_empty());
    Ok(())
}

#[test]
fn query_strings_match_indexed_text() -> Result<()> {
    let (graph, _index) = open_search_graph();
    seed_cities(&graph)?;
    let public = auths(&["public"]);

    let results = graph.query_string("lyon", &public).vertices(FetchHints::NONE)?;
    assert_eq!(ids(results)?, vec!["2"]);

    let everything = graph.query_string("*", &public).vertices(FetchHints::NONE)?;
    assert_eq!(everything.total_hits(), 2);
    Ok(())
}

#[test]
fn text_contains_in_both_execution_paths() -> Result<()> {
    let (indexed, _index) = open_search_graph();
    let scanned = open_graph();
    let a = auths(&[]);
    for graph in [&indexed, &scanned] {
        graph
            .prepare_vertex(Some("doc"), None, vis(""))
            .set_property("body", "The quick brown fox", vis(""))
            .save(&a)?;
        let hit = graph
            .query(&a)
            .has("body", TextPredicate::Contains, "QUICK fox")
            .vertices(FetchHints::NONE)?;
        assert_eq!(ids(hit)?, vec!["doc"]);
        let miss = graph
            .query(&a)
            .has("body", TextPredicate::Contains, "quick cat")
            .vertices(FetchHints::NONE)?;
        assert!(ids(miss)?.is_empty());
    }
    Ok(())
}

#[test]
fn hidden_elements_are_dropped_during_reconciliation() -> Result<()> {
    let (graph, _index) = open_search_graph();
    seed_cities(&graph)?;
    let public = auths(&["public"]);
    graph.mark_vertex_hidden("1", &vis("public"), &public)?;

    let results = graph
        .query(&public)
        .has("population", Compare::GreaterThan, 0i64)
        .vertices(FetchHints::NONE)?;
    assert_eq!(results.total_hits(), 2);
    assert_eq!(ids(results)?, vec!["2"]);
    Ok(())
}

#[test]
fn soft_deleted_elements_leave_the_index() -> Result<()> {
    let (graph, index) = open_search_graph();
    seed_cities(&graph)?;
    assert_eq!(index.document_count("penumbra"), Some(2));

    graph.soft_delete_vertex("2", None, &auths(&["public"]))?;
    assert_eq!(index.document_count("penumbra"), Some(1));
    Ok(())
}

/// Index that ignores filters, standing in for a backend with stale or
/// coarser matching than the graph.
struct UnfilteredIndex(MemorySearchIndex);

impl SearchIndex for UnfilteredIndex {
    fn add_element(&self, element: &IndexedElement) -> std::result::Result<(), SearchError> {
        self.0.add_element(element)
    }

    fn delete_element(&self, kind: ElementKind, id: &str) -> std::result::Result<(), SearchError> {
        self.0.delete_element(kind, id)
    }

    fn execute(&self, request: &SearchRequest) -> std::result::Result<SearchResponse, SearchError> {
        let mut loose = request.clone();
        loose.filters.clear();
        self.0.execute(&loose)
    }

    fn matching_property_names(&self, name: &str, auths: &Authorizations) -> Vec<String> {
        self.0.matching_property_names(name, auths)
    }

    fn visibility_hash(&self, field: &str) -> Option<String> {
        self.0.visibility_hash(field)
    }

    fn property_definition(&self, name: &str) -> Option<PropertyDefinition> {
        self.0.property_definition(name)
    }

    fn define_property(&self, definition: PropertyDefinition) -> std::result::Result<(), SearchError> {
        self.0.define_property(definition)
    }
}

fn open_with(index: Arc<dyn SearchIndex>, search: SearchConfig) -> Graph<InMemoryBackend> {
    init_tracing();
    let mut config = GraphConfig::default();
    config.search = search;
    Graph::open(InMemoryBackend::from_config(&config), config)
        .expect("open graph")
        .with_search_index(index)
}

#[test]
fn has_containers_are_re_evaluated_against_fetched_elements() -> Result<()> {
    let graph = open_with(
        Arc::new(UnfilteredIndex(MemorySearchIndex::new("penumbra"))),
        SearchConfig::default(),
    );
    seed_cities(&graph)?;
    assert_eq!(large_cities(&graph, &auths(&["public"]))?, vec!["1"]);
    Ok(())
}

#[test]
fn re_evaluation_can_be_switched_off() -> Result<()> {
    let graph = open_with(
        Arc::new(UnfilteredIndex(MemorySearchIndex::new("penumbra"))),
        SearchConfig {
            evaluate_has_containers: false,
            ..SearchConfig::default()
        },
    );
    seed_cities(&graph)?;
    assert_eq!(large_cities(&graph, &auths(&["public"]))?, vec!["1", "2"]);
    Ok(())
}

#[derive(Debug)]
struct FixedIndices(Vec<String>);

impl IndexSelectionStrategy for FixedIndices {
    fn indices_to_query(&self, _config: &SearchConfig, _kind: Option<ElementKind>) -> Vec<String> {
        self.0.clone()
    }
}

#[test]
fn missing_index_yields_empty_results() -> Result<()> {
    let (graph, _index) = open_search_graph();
    seed_cities(&graph)?;
    let graph = graph.with_index_selection(Arc::new(FixedIndices(vec!["absent".into()])));

    let results = graph
        .query(&auths(&["public"]))
        .has_property("name")
        .vertices(FetchHints::NONE)?;
    assert_eq!(results.total_hits(), 0);
    assert_eq!(results.count(), 0);
    Ok(())
}

#[test]
fn unknown_properties_yield_empty_results() -> Result<()> {
    let (graph, _index) = open_search_graph();
    seed_cities(&graph)?;
    let results = graph
        .query(&auths(&["public"]))
        .has("height", Compare::Equal, 3i64)
        .vertices(FetchHints::NONE)?;
    assert_eq!(results.total_hits(), 0);
    assert_eq!(results.count(), 0);
    Ok(())
}

#[test]
fn skip_and_limit_page_through_hits() -> Result<()> {
    let (indexed, _index) = open_search_graph();
    let scanned = open_graph();
    let a = auths(&[]);
    for graph in [&indexed, &scanned] {
        for id in ["a", "b", "c", "d", "e"] {
            graph
                .prepare_vertex(Some(id), None, vis(""))
                .set_property("n", 1i64, vis(""))
                .save(&a)?;
        }
        let page = graph
            .query(&a)
            .has_property("n")
            .skip(1)
            .limit(2)
            .vertices(FetchHints::NONE)?;
        assert_eq!(page.total_hits(), 5);
        assert_eq!(ids(page)?, vec!["b", "c"]);
    }
    Ok(())
}

#[test]
fn terms_aggregation_counts_values() -> Result<()> {
    let (graph, _index) = open_search_graph();
    let a = auths(&[]);
    for (id, city) in [("1", "Paris"), ("2", "Paris"), ("3", "Lyon")] {
        graph
            .prepare_vertex(Some(id), None, vis(""))
            .set_property("city", city, vis(""))
            .save(&a)?;
    }
    let results = graph
        .query(&a)
        .aggregation(AggregationItem::terms("cities", "city"))
        .vertices(FetchHints::NONE)?;

    assert_eq!(
        results.aggregation("cities"),
        Some(&AggregationResult::Terms(vec![
            TermsBucket {
                key: PropertyValue::from("Paris"),
                count: 2,
            },
            TermsBucket {
                key: PropertyValue::from("Lyon"),
                count: 1,
            },
        ]))
    );
    Ok(())
}

#[test]
fn index_only_features_fail_without_an_index() -> Result<()> {
    let graph = open_graph();
    let a = auths(&[]);

    let err = graph
        .query_similar_to(SimilarToTextParameters::new(["name"], "paris"), &a)
        .vertices(FetchHints::NONE)
        .unwrap_err();
    assert!(matches!(err, GraphError::UnsupportedQueryParameterType(_)));

    let err = graph
        .query(&a)
        .aggregation(AggregationItem::terms("x", "name"))
        .vertices(FetchHints::NONE)
        .unwrap_err();
    assert!(matches!(err, GraphError::UnsupportedFeature(_)));
    Ok(())
}

#[test]
fn similar_to_ranks_related_documents() -> Result<()> {
    let (graph, _index) = open_search_graph();
    let a = auths(&[]);
    for (id, text) in [
        ("1", "graph databases store vertices and edges"),
        ("2", "property graph databases with visibility"),
        ("3", "baking bread at home"),
    ] {
        graph
            .prepare_vertex(Some(id), None, vis(""))
            .set_property("text", text, vis(""))
            .save(&a)?;
    }
    let similar = SimilarToTextParameters::new(["text"], "graph databases")
        .min_term_frequency(1)
        .min_doc_frequency(1);
    let found = ids(graph.query_similar_to(similar, &a).vertices(FetchHints::NONE)?)?;
    assert!(found.contains(&"1".to_owned()));
    assert!(found.contains(&"2".to_owned()));
    assert!(!found.contains(&"3".to_owned()));
    Ok(())
}
