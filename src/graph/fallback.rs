//! Naive but correct implementations of the bulk storage operations.
//!
//! These only use the backend's primitives, so they behave identically on
//! every backend. Each logs a warning when it runs so slow paths are visible.

use rustc_hash::FxHashSet;
use tracing::warn;

use super::backend::{ElementIter, StorageBackend};
use crate::error::Result;
use crate::model::{Direction, Element, ElementKind, FetchHints, GraphElement, RelatedEdge};
use crate::security::Authorizations;

pub(crate) fn fetch_by_scan<B: StorageBackend + ?Sized>(
    backend: &B,
    kind: ElementKind,
    id: &str,
    hints: FetchHints,
    end_time: Option<i64>,
    auths: &Authorizations,
) -> Result<Option<GraphElement>> {
    warn!(%kind, id, "graph.fetch_element.scan");
    for element in backend.scan(kind, hints, end_time, auths)? {
        let element = element?;
        if element.id() == id {
            return Ok(Some(element));
        }
    }
    Ok(None)
}

pub(crate) fn fetch_one_by_one<'a, B: StorageBackend + ?Sized>(
    backend: &'a B,
    kind: ElementKind,
    ids: Vec<String>,
    hints: FetchHints,
    end_time: Option<i64>,
    auths: &'a Authorizations,
) -> ElementIter<'a> {
    if ids.len() > 1 {
        warn!(%kind, count = ids.len(), "graph.fetch_elements.one_by_one");
    }
    let mut seen = FxHashSet::default();
    let ids: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
    Box::new(ids.into_iter().filter_map(move |id| {
        backend
            .fetch_element(kind, &id, hints, end_time, auths)
            .transpose()
    }))
}

pub(crate) fn scan_with_prefix<'a, B: StorageBackend + ?Sized>(
    backend: &'a B,
    kind: ElementKind,
    prefix: &str,
    hints: FetchHints,
    end_time: Option<i64>,
    auths: &'a Authorizations,
) -> Result<ElementIter<'a>> {
    warn!(%kind, prefix, "graph.fetch_with_prefix.scan");
    let prefix = prefix.to_owned();
    let scan = backend.scan(kind, hints, end_time, auths)?;
    Ok(Box::new(scan.filter(move |element| match element {
        Ok(element) => element.id().starts_with(&prefix),
        Err(_) => true,
    })))
}

pub(crate) fn count_by_scan<B: StorageBackend + ?Sized>(
    backend: &B,
    kind: ElementKind,
    auths: &Authorizations,
) -> Result<u64> {
    warn!(%kind, "graph.count.scan");
    let mut count = 0u64;
    for element in backend.scan(kind, FetchHints::NONE, None, auths)? {
        element?;
        count += 1;
    }
    Ok(count)
}

/// For every ordered pair of fetched vertices, keeps the first vertex's
/// outgoing edge references that land on the second. Edges leading outside
/// the requested set are never reported.
pub(crate) fn related_edges_pairwise<B: StorageBackend + ?Sized>(
    backend: &B,
    vertex_ids: &[String],
    end_time: Option<i64>,
    auths: &Authorizations,
) -> Result<Vec<RelatedEdge>> {
    warn!(count = vertex_ids.len(), "graph.find_related_edge_summary.pairwise");
    let mut vertices = Vec::with_capacity(vertex_ids.len());
    for element in backend.fetch_elements(
        ElementKind::Vertex,
        vertex_ids.to_vec(),
        FetchHints::OUT_EDGE_REFS,
        end_time,
        auths,
    ) {
        if let GraphElement::Vertex(vertex) = element? {
            vertices.push(vertex);
        }
    }

    let mut related = Vec::new();
    for out_vertex in &vertices {
        for in_vertex in &vertices {
            for info in out_vertex.edge_infos(Direction::Out)? {
                if info.vertex_id == in_vertex.id() {
                    related.push(RelatedEdge::new(
                        info.edge_id.clone(),
                        info.label.clone(),
                        out_vertex.id(),
                        in_vertex.id(),
                    ));
                }
            }
        }
    }
    Ok(related)
}
