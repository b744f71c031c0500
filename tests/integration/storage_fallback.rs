#![allow(missing_docs)]

mod common;

use penumbra::graph::{ElementIter, ElementMutation, StorageBackend};
use penumbra::{
    Authorizations, Direction, Element, ElementKind, FetchHints, Graph, GraphConfig, GraphElement,
    InMemoryBackend, RelatedEdge, Result,
};

use common::{auths, init_tracing, open_graph, vis};

/// Backend exposing only the three storage primitives, so every bulk read
/// goes through the graph's fallback algorithms.
#[derive(Debug, Default)]
struct ScanOnly(InMemoryBackend);

impl StorageBackend for ScanOnly {
    fn scan(
        &self,
        kind: ElementKind,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Result<ElementIter<'_>> {
        self.0.scan(kind, hints, end_time, auths)
    }

    fn persist(&self, mutation: ElementMutation, auths: &Authorizations) -> Result<Option<GraphElement>> {
        self.0.persist(mutation, auths)
    }

    fn next_id(&self) -> String {
        self.0.next_id()
    }
}

fn open_scan_only() -> Graph<ScanOnly> {
    init_tracing();
    Graph::open(ScanOnly::default(), GraphConfig::default()).expect("open graph")
}

/// A-B, A-C and B-C where C and the edge into it need `secret`.
fn seed<B: StorageBackend>(graph: &Graph<B>) -> Result<()> {
    let writer = auths(&["secret"]);
    graph.add_vertex(Some("A"), vis(""), &writer)?;
    graph.add_vertex(Some("B"), vis(""), &writer)?;
    graph.add_vertex(Some("C"), vis("secret"), &writer)?;
    graph.add_vertex(Some("D1"), vis(""), &writer)?;
    graph.add_edge(Some("ab"), "A", "B", "knows", vis(""), &writer)?;
    graph.add_edge(Some("ac"), "A", "C", "knows", vis(""), &writer)?;
    graph.add_edge(Some("bc"), "B", "C", "knows", vis("secret"), &writer)?;
    Ok(())
}

fn related<B: StorageBackend>(graph: &Graph<B>, ids: &[&str], a: &Authorizations) -> Result<Vec<RelatedEdge>> {
    let ids: Vec<String> = ids.iter().map(|id| (*id).to_owned()).collect();
    let mut edges = graph.find_related_edge_summary(&ids, None, a)?;
    edges.sort_by(|x, y| x.edge_id.cmp(&y.edge_id));
    Ok(edges)
}

#[test]
fn single_and_batch_reads_match_the_indexed_backend() -> Result<()> {
    let fast = open_graph();
    let slow = open_scan_only();
    seed(&fast)?;
    seed(&slow)?;

    for tokens in [&[][..], &["secret"][..]] {
        let a = auths(tokens);
        for id in ["A", "C", "missing"] {
            let fast_edges = fast
                .get_vertex(id, FetchHints::ALL, &a)?
                .map(|v| v.edge_ids(Direction::Both).map(|ids| ids.len()))
                .transpose()?;
            let slow_edges = slow
                .get_vertex(id, FetchHints::ALL, &a)?
                .map(|v| v.edge_ids(Direction::Both).map(|ids| ids.len()))
                .transpose()?;
            assert_eq!(fast_edges, slow_edges);
        }
        let order = ["C", "missing", "B", "A", "B"];
        let fast_ids: Vec<String> = fast
            .get_vertices_in_order(order, FetchHints::NONE, &a)?
            .iter()
            .map(|v| v.id().to_owned())
            .collect();
        let slow_ids: Vec<String> = slow
            .get_vertices_in_order(order, FetchHints::NONE, &a)?
            .iter()
            .map(|v| v.id().to_owned())
            .collect();
        assert_eq!(fast_ids, slow_ids);
        assert_eq!(fast.do_vertices_exist(order, &a)?, slow.do_vertices_exist(order, &a)?);

        let repeated = ["A", "A", "B", "missing", "B"];
        let mut fast_batch = fast
            .get_vertices(repeated, FetchHints::NONE, &a)
            .map(|v| v.map(|v| v.id().to_owned()))
            .collect::<Result<Vec<_>>>()?;
        let mut slow_batch = slow
            .get_vertices(repeated, FetchHints::NONE, &a)
            .map(|v| v.map(|v| v.id().to_owned()))
            .collect::<Result<Vec<_>>>()?;
        fast_batch.sort();
        slow_batch.sort();
        assert_eq!(fast_batch, vec!["A", "B"]);
        assert_eq!(slow_batch, fast_batch);
        assert_eq!(fast.get_vertex_count(&a)?, slow.get_vertex_count(&a)?);
        assert_eq!(fast.get_edge_count(&a)?, slow.get_edge_count(&a)?);
    }
    Ok(())
}

#[test]
fn prefix_scans_match_the_indexed_backend() -> Result<()> {
    let fast = open_graph();
    let slow = open_scan_only();
    seed(&fast)?;
    seed(&slow)?;

    let a = auths(&[]);
    let collect = |vertices: Vec<Result<penumbra::Vertex>>| -> Result<Vec<String>> {
        let mut ids = vertices
            .into_iter()
            .map(|v| v.map(|v| v.id().to_owned()))
            .collect::<Result<Vec<_>>>()?;
        ids.sort();
        Ok(ids)
    };
    let fast_ids = collect(fast.get_vertices_with_prefix("D", FetchHints::NONE, &a)?.collect())?;
    let slow_ids = collect(slow.get_vertices_with_prefix("D", FetchHints::NONE, &a)?.collect())?;
    assert_eq!(fast_ids, vec!["D1"]);
    assert_eq!(slow_ids, fast_ids);
    Ok(())
}

#[test]
fn pairwise_related_edges_match_the_adjacency_walk() -> Result<()> {
    let fast = open_graph();
    let slow = open_scan_only();
    seed(&fast)?;
    seed(&slow)?;

    let public = auths(&[]);
    let secret = auths(&["secret"]);
    for (ids, a) in [
        (&["A", "B"][..], &public),
        (&["A", "B", "C"][..], &public),
        (&["A", "B", "C"][..], &secret),
        (&["B", "C"][..], &secret),
        (&["A", "B", "A"][..], &public),
        (&["C", "A", "B", "C"][..], &secret),
    ] {
        assert_eq!(related(&fast, ids, a)?, related(&slow, ids, a)?);
    }
    assert_eq!(
        related(&slow, &["A", "B", "C"], &secret)?,
        vec![
            RelatedEdge::new("ab", "knows", "A", "B"),
            RelatedEdge::new("ac", "knows", "A", "C"),
            RelatedEdge::new("bc", "knows", "B", "C"),
        ]
    );
    assert_eq!(
        related(&slow, &["A", "B", "C"], &public)?,
        vec![RelatedEdge::new("ab", "knows", "A", "B")]
    );
    assert_eq!(
        related(&slow, &["A", "B", "A"], &public)?,
        vec![RelatedEdge::new("ab", "knows", "A", "B")]
    );
    Ok(())
}

#[test]
fn paths_work_over_the_scan_only_backend() -> Result<()> {
    let slow = open_scan_only();
    seed(&slow)?;
    let secret = auths(&["secret"]);
    let mut paths: Vec<Vec<String>> = slow
        .find_paths("A", "C", 2, &secret)?
        .iter()
        .map(|path| path.vertex_ids().to_vec())
        .collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            vec!["A".to_owned(), "B".to_owned(), "C".to_owned()],
            vec!["A".to_owned(), "C".to_owned()],
        ]
    );
    Ok(())
}
