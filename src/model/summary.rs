use std::fmt;

use serde::{Deserialize, Serialize};

/// Summary of an edge discovered between a set of vertices.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelatedEdge {
    /// Edge id.
    pub edge_id: String,
    /// Edge label.
    pub label: String,
    /// Tail vertex id.
    pub out_vertex_id: String,
    /// Head vertex id.
    pub in_vertex_id: String,
}

impl RelatedEdge {
    /// Creates a summary.
    pub fn new(
        edge_id: impl Into<String>,
        label: impl Into<String>,
        out_vertex_id: impl Into<String>,
        in_vertex_id: impl Into<String>,
    ) -> Self {
        Self {
            edge_id: edge_id.into(),
            label: label.into(),
            out_vertex_id: out_vertex_id.into(),
            in_vertex_id: in_vertex_id.into(),
        }
    }
}

/// Sequence of vertex ids from a source to a destination.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(Vec<String>);

impl Path {
    /// A path holding only its starting vertex.
    pub fn start(vertex_id: impl Into<String>) -> Self {
        Path(vec![vertex_id.into()])
    }

    /// Copy of this path extended by one vertex.
    pub fn extended(&self, vertex_id: impl Into<String>) -> Self {
        let mut ids = self.0.clone();
        ids.push(vertex_id.into());
        Path(ids)
    }

    /// Vertex ids in traversal order.
    pub fn vertex_ids(&self) -> &[String] {
        &self.0
    }

    /// Number of vertices on the path.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of hops (edges) on the path.
    pub fn hops(&self) -> usize {
        self.0.len().saturating_sub(1)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" -> "))
    }
}

impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Path(iter.into_iter().map(Into::into).collect())
    }
}
