//! Depth-bounded path search over edge references.

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use super::backend::StorageBackend;
use crate::error::Result;
use crate::model::{Direction, Element, ElementKind, FetchHints, GraphElement, Path, Vertex};
use crate::security::Authorizations;

/// Stage reported to a [`ProgressCallback`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressStep {
    /// Search started.
    FindingPath,
    /// Expanding the `edge_index`-th neighbour of the source out of
    /// `vertex_count`.
    SearchingEdges {
        /// Position of the neighbour being expanded.
        edge_index: usize,
        /// Number of neighbours of the source.
        vertex_count: usize,
    },
    /// Search finished.
    Complete,
}

impl fmt::Display for ProgressStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressStep::FindingPath => f.write_str("finding path"),
            ProgressStep::SearchingEdges {
                edge_index,
                vertex_count,
            } => write!(f, "searching edges {edge_index} of {vertex_count}"),
            ProgressStep::Complete => f.write_str("complete"),
        }
    }
}

/// Observes path-finding progress. Must return quickly; the search waits.
pub trait ProgressCallback {
    /// `percent` is in `0.0..=1.0`.
    fn progress(&mut self, percent: f64, step: ProgressStep);
}

impl<F> ProgressCallback for F
where
    F: FnMut(f64, ProgressStep),
{
    fn progress(&mut self, percent: f64, step: ProgressStep) {
        self(percent, step)
    }
}

/// Callback used when the caller supplies none.
#[derive(Debug, Default)]
pub struct LoggingProgress;

impl ProgressCallback for LoggingProgress {
    fn progress(&mut self, percent: f64, step: ProgressStep) {
        debug!(
            percent = (percent * 100.0) as u32,
            %step,
            "graph.find_paths.progress"
        );
    }
}

pub(crate) struct PathFinder<'a, B: StorageBackend + ?Sized> {
    backend: &'a B,
    auths: &'a Authorizations,
    dest_id: &'a str,
    callback: &'a mut dyn ProgressCallback,
    found: Vec<Path>,
}

impl<'a, B: StorageBackend + ?Sized> PathFinder<'a, B> {
    pub(crate) fn new(
        backend: &'a B,
        dest_id: &'a str,
        callback: &'a mut dyn ProgressCallback,
        auths: &'a Authorizations,
    ) -> Self {
        Self {
            backend,
            auths,
            dest_id,
            callback,
            found: Vec::new(),
        }
    }

    /// Every simple path from `source` to the destination with at most
    /// `max_hops` edges, traversing edges in either direction.
    pub(crate) fn find(mut self, source: &Vertex, max_hops: usize) -> Result<Vec<Path>> {
        self.callback.progress(0.1, ProgressStep::FindingPath);
        let mut on_path = HashSet::new();
        on_path.insert(source.id().to_owned());
        self.explore(source, &Path::start(source.id()), &mut on_path, max_hops, true)?;
        self.callback.progress(1.0, ProgressStep::Complete);
        debug!(paths = self.found.len(), "graph.find_paths.done");
        Ok(self.found)
    }

    fn explore(
        &mut self,
        vertex: &Vertex,
        path: &Path,
        on_path: &mut HashSet<String>,
        hops_remaining: usize,
        first_level: bool,
    ) -> Result<()> {
        if hops_remaining == 0 {
            return Ok(());
        }
        let neighbour_ids: Vec<String> = vertex
            .vertex_ids(Direction::Both)?
            .into_iter()
            .filter(|id| !on_path.contains(*id))
            .map(str::to_owned)
            .collect();
        let mut neighbours = Vec::with_capacity(neighbour_ids.len());
        for element in self.backend.fetch_elements(
            ElementKind::Vertex,
            neighbour_ids.clone(),
            FetchHints::EDGE_REFS,
            None,
            self.auths,
        ) {
            if let GraphElement::Vertex(neighbour) = element? {
                neighbours.push(neighbour);
            }
        }
        neighbours.sort_by_key(|v| neighbour_ids.iter().position(|id| id == v.id()));

        let vertex_count = neighbours.len();
        for (edge_index, neighbour) in neighbours.iter().enumerate() {
            if first_level {
                let percent = 0.1 + 0.9 * edge_index as f64 / vertex_count as f64;
                self.callback.progress(
                    percent,
                    ProgressStep::SearchingEdges {
                        edge_index,
                        vertex_count,
                    },
                );
            }
            if neighbour.id() == self.dest_id {
                self.found.push(path.extended(neighbour.id()));
            } else if hops_remaining > 1 {
                on_path.insert(neighbour.id().to_owned());
                self.explore(
                    neighbour,
                    &path.extended(neighbour.id()),
                    on_path,
                    hops_remaining - 1,
                    false,
                )?;
                on_path.remove(neighbour.id());
            }
        }
        Ok(())
    }
}
