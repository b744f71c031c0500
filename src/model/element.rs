//! Element snapshots: vertices, edges and the references between them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{FetchHints, Property, PropertyValue};
use crate::error::{GraphError, Result};
use crate::security::Visibility;

/// Which family an element belongs to; ids are unique per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A vertex.
    Vertex,
    /// An edge.
    Edge,
}

impl ElementKind {
    /// Stable lowercase tag, also used as the element-type field value in
    /// search documents.
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Vertex => "vertex",
            ElementKind::Edge => "edge",
        }
    }

    /// Inverse of [`ElementKind::as_str`].
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "vertex" => Some(ElementKind::Vertex),
            "edge" => Some(ElementKind::Edge),
            _ => None,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge direction relative to a vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Edges leaving the vertex.
    Out,
    /// Edges arriving at the vertex.
    In,
    /// Either direction.
    Both,
}

/// Lightweight reference from a vertex to one of its edges.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeInfo {
    /// Edge id.
    pub edge_id: String,
    /// Edge label.
    pub label: String,
    /// Id of the vertex at the other end.
    pub vertex_id: String,
    /// Direction relative to the owning vertex; never [`Direction::Both`].
    pub direction: Direction,
}

/// Capabilities shared by vertices and edges.
pub trait Element {
    /// Element id.
    fn id(&self) -> &str;
    /// Vertex or edge.
    fn kind(&self) -> ElementKind;
    /// Element visibility.
    fn visibility(&self) -> &Visibility;
    /// Write timestamp in milliseconds.
    fn timestamp(&self) -> i64;
    /// Hints the snapshot was fetched with.
    fn fetch_hints(&self) -> FetchHints;
    /// Whether the element is hidden from the reader that fetched it.
    fn is_hidden(&self) -> bool;
    /// Properties visible to the reader that fetched the snapshot.
    fn properties(&self) -> Result<&[Property]>;

    /// Every visible property called `name`.
    fn properties_named(&self, name: &str) -> Result<Vec<&Property>> {
        Ok(self
            .properties()?
            .iter()
            .filter(|p| p.name() == name)
            .collect())
    }

    /// The property identified by `key` and `name`, if visible.
    fn property(&self, key: &str, name: &str) -> Result<Option<&Property>> {
        Ok(self
            .properties()?
            .iter()
            .find(|p| p.key() == key && p.name() == name))
    }

    /// Value of the first visible property called `name`.
    fn property_value(&self, name: &str) -> Result<Option<&PropertyValue>> {
        Ok(self
            .properties()?
            .iter()
            .find(|p| p.name() == name)
            .map(Property::value))
    }
}

/// Fields common to both element kinds, as assembled by a backend.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementParts {
    /// Element id.
    pub id: String,
    /// Element visibility.
    pub visibility: Visibility,
    /// Write timestamp in milliseconds.
    pub timestamp: i64,
    /// Hints the snapshot was produced for.
    pub fetch_hints: FetchHints,
    /// Whether the element is hidden from the reader.
    pub hidden: bool,
    /// Properties already redacted for the reader. Ignored unless the hints
    /// include [`FetchHints::PROPERTIES`].
    pub properties: Vec<Property>,
}

impl ElementParts {
    fn properties(&self) -> Result<&[Property]> {
        if self.fetch_hints.includes_properties() {
            Ok(&self.properties)
        } else {
            Err(GraphError::MissingFetchHint { hint: "PROPERTIES" })
        }
    }
}

/// A vertex snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct Vertex {
    parts: ElementParts,
    out_edges: Vec<EdgeInfo>,
    in_edges: Vec<EdgeInfo>,
}

impl Vertex {
    /// Assembles a vertex. Edge references are only retained for the
    /// directions the hints ask for.
    pub fn from_parts(parts: ElementParts, out_edges: Vec<EdgeInfo>, in_edges: Vec<EdgeInfo>) -> Self {
        let hints = parts.fetch_hints;
        Self {
            out_edges: if hints.contains(FetchHints::OUT_EDGE_REFS) {
                out_edges
            } else {
                Vec::new()
            },
            in_edges: if hints.contains(FetchHints::IN_EDGE_REFS) {
                in_edges
            } else {
                Vec::new()
            },
            parts,
        }
    }

    /// Edge references in `direction`.
    pub fn edge_infos(&self, direction: Direction) -> Result<Vec<&EdgeInfo>> {
        let hints = self.parts.fetch_hints;
        let want_out = matches!(direction, Direction::Out | Direction::Both);
        let want_in = matches!(direction, Direction::In | Direction::Both);
        if want_out && !hints.contains(FetchHints::OUT_EDGE_REFS) {
            return Err(GraphError::MissingFetchHint {
                hint: "OUT_EDGE_REFS",
            });
        }
        if want_in && !hints.contains(FetchHints::IN_EDGE_REFS) {
            return Err(GraphError::MissingFetchHint {
                hint: "IN_EDGE_REFS",
            });
        }
        let mut out = Vec::new();
        if want_out {
            out.extend(self.out_edges.iter());
        }
        if want_in {
            out.extend(self.in_edges.iter());
        }
        Ok(out)
    }

    /// Ids of edges in `direction`.
    pub fn edge_ids(&self, direction: Direction) -> Result<Vec<&str>> {
        Ok(self
            .edge_infos(direction)?
            .into_iter()
            .map(|e| e.edge_id.as_str())
            .collect())
    }

    /// Ids of adjacent vertices in `direction`, deduplicated, in edge order.
    pub fn vertex_ids(&self, direction: Direction) -> Result<Vec<&str>> {
        let mut ids: Vec<&str> = Vec::new();
        for info in self.edge_infos(direction)? {
            if !ids.contains(&info.vertex_id.as_str()) {
                ids.push(&info.vertex_id);
            }
        }
        Ok(ids)
    }
}

impl Element for Vertex {
    fn id(&self) -> &str {
        &self.parts.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Vertex
    }

    fn visibility(&self) -> &Visibility {
        &self.parts.visibility
    }

    fn timestamp(&self) -> i64 {
        self.parts.timestamp
    }

    fn fetch_hints(&self) -> FetchHints {
        self.parts.fetch_hints
    }

    fn is_hidden(&self) -> bool {
        self.parts.hidden
    }

    fn properties(&self) -> Result<&[Property]> {
        self.parts.properties()
    }
}

/// An edge snapshot. Endpoints and label are always materialized.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    parts: ElementParts,
    label: String,
    out_vertex_id: String,
    in_vertex_id: String,
}

impl Edge {
    /// Assembles an edge.
    pub fn from_parts(
        parts: ElementParts,
        label: impl Into<String>,
        out_vertex_id: impl Into<String>,
        in_vertex_id: impl Into<String>,
    ) -> Self {
        Self {
            parts,
            label: label.into(),
            out_vertex_id: out_vertex_id.into(),
            in_vertex_id: in_vertex_id.into(),
        }
    }

    /// Edge label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Id of the tail vertex.
    pub fn out_vertex_id(&self) -> &str {
        &self.out_vertex_id
    }

    /// Id of the head vertex.
    pub fn in_vertex_id(&self) -> &str {
        &self.in_vertex_id
    }

    /// Endpoint opposite to `vertex_id`, if `vertex_id` is an endpoint.
    pub fn other_vertex_id(&self, vertex_id: &str) -> Option<&str> {
        if self.out_vertex_id == vertex_id {
            Some(&self.in_vertex_id)
        } else if self.in_vertex_id == vertex_id {
            Some(&self.out_vertex_id)
        } else {
            None
        }
    }
}

impl Element for Edge {
    fn id(&self) -> &str {
        &self.parts.id
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Edge
    }

    fn visibility(&self) -> &Visibility {
        &self.parts.visibility
    }

    fn timestamp(&self) -> i64 {
        self.parts.timestamp
    }

    fn fetch_hints(&self) -> FetchHints {
        self.parts.fetch_hints
    }

    fn is_hidden(&self) -> bool {
        self.parts.hidden
    }

    fn properties(&self) -> Result<&[Property]> {
        self.parts.properties()
    }
}

/// Either kind of element, as returned by mixed queries.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphElement {
    /// A vertex.
    Vertex(Vertex),
    /// An edge.
    Edge(Edge),
}

impl GraphElement {
    /// Borrows the vertex, if this is one.
    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            GraphElement::Vertex(v) => Some(v),
            GraphElement::Edge(_) => None,
        }
    }

    /// Borrows the edge, if this is one.
    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            GraphElement::Edge(e) => Some(e),
            GraphElement::Vertex(_) => None,
        }
    }

    /// The vertex, if this is one.
    pub fn into_vertex(self) -> Option<Vertex> {
        match self {
            GraphElement::Vertex(v) => Some(v),
            GraphElement::Edge(_) => None,
        }
    }

    /// The edge, if this is one.
    pub fn into_edge(self) -> Option<Edge> {
        match self {
            GraphElement::Edge(e) => Some(e),
            GraphElement::Vertex(_) => None,
        }
    }

    fn inner(&self) -> &dyn Element {
        match self {
            GraphElement::Vertex(v) => v,
            GraphElement::Edge(e) => e,
        }
    }
}

impl Element for GraphElement {
    fn id(&self) -> &str {
        self.inner().id()
    }

    fn kind(&self) -> ElementKind {
        self.inner().kind()
    }

    fn visibility(&self) -> &Visibility {
        self.inner().visibility()
    }

    fn timestamp(&self) -> i64 {
        self.inner().timestamp()
    }

    fn fetch_hints(&self) -> FetchHints {
        self.inner().fetch_hints()
    }

    fn is_hidden(&self) -> bool {
        self.inner().is_hidden()
    }

    fn properties(&self) -> Result<&[Property]> {
        self.inner().properties()
    }
}

impl From<Vertex> for GraphElement {
    fn from(value: Vertex) -> Self {
        GraphElement::Vertex(value)
    }
}

impl From<Edge> for GraphElement {
    fn from(value: Edge) -> Self {
        GraphElement::Edge(value)
    }
}
