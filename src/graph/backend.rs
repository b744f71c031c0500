//! The storage contract consumed by [`crate::Graph`].
//!
//! A backend supplies three primitives (`scan`, `persist`, `next_id`). Every
//! other operation has a provided implementation built from those primitives
//! in [`super::fallback`]; backends with better access paths override them
//! without changing their observable results.

use crate::error::Result;
use crate::model::{ElementKind, FetchHints, GraphElement, Property, RelatedEdge};
use crate::security::{Authorizations, Visibility};

use super::fallback;

/// Lazy sequence of elements produced by a backend.
pub type ElementIter<'a> = Box<dyn Iterator<Item = Result<GraphElement>> + 'a>;

/// Identifies one property for removal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyRemoval {
    /// Property key.
    pub key: String,
    /// Property name.
    pub name: String,
}

/// Staged state of an element being saved.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedElement {
    /// Element id.
    pub id: String,
    /// Element visibility.
    pub visibility: Visibility,
    /// Write timestamp in milliseconds.
    pub timestamp: i64,
    /// Properties to upsert, matched on `(key, name, visibility)`.
    pub properties: Vec<Property>,
    /// Properties to remove, across all visibilities the writer can see.
    pub removals: Vec<PropertyRemoval>,
}

/// A write handed to the backend.
#[derive(Clone, Debug, PartialEq)]
pub enum ElementMutation {
    /// Create or update a vertex.
    SaveVertex(StagedElement),
    /// Create or update an edge between two existing vertices.
    SaveEdge {
        /// Staged element state.
        element: StagedElement,
        /// Edge label.
        label: String,
        /// Tail vertex id.
        out_vertex_id: String,
        /// Head vertex id.
        in_vertex_id: String,
    },
    /// Remove an element and its history. Removing a vertex leaves its
    /// edge records in place.
    Delete {
        /// Element kind.
        kind: ElementKind,
        /// Element id.
        id: String,
    },
    /// Make an element invisible from `timestamp` onward.
    SoftDelete {
        /// Element kind.
        kind: ElementKind,
        /// Element id.
        id: String,
        /// Soft-delete timestamp in milliseconds.
        timestamp: i64,
    },
    /// Hide an element from readers of `visibility`.
    MarkHidden {
        /// Element kind.
        kind: ElementKind,
        /// Element id.
        id: String,
        /// Hiding visibility.
        visibility: Visibility,
    },
    /// Lift a hiding visibility.
    MarkVisible {
        /// Element kind.
        kind: ElementKind,
        /// Element id.
        id: String,
        /// Hiding visibility to lift.
        visibility: Visibility,
    },
}

impl ElementMutation {
    /// Kind of the element the mutation targets.
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementMutation::SaveVertex(_) => ElementKind::Vertex,
            ElementMutation::SaveEdge { .. } => ElementKind::Edge,
            ElementMutation::Delete { kind, .. }
            | ElementMutation::SoftDelete { kind, .. }
            | ElementMutation::MarkHidden { kind, .. }
            | ElementMutation::MarkVisible { kind, .. } => *kind,
        }
    }

    /// Id of the element the mutation targets.
    pub fn id(&self) -> &str {
        match self {
            ElementMutation::SaveVertex(element) | ElementMutation::SaveEdge { element, .. } => {
                &element.id
            }
            ElementMutation::Delete { id, .. }
            | ElementMutation::SoftDelete { id, .. }
            | ElementMutation::MarkHidden { id, .. }
            | ElementMutation::MarkVisible { id, .. } => id,
        }
    }
}

/// Storage primitives plus overridable bulk operations.
///
/// Implementations must apply visibility themselves: anything returned to a
/// caller has already been filtered and redacted for the given
/// authorizations, and absence is indistinguishable from lack of access.
pub trait StorageBackend: Send + Sync {
    /// Every element of `kind` readable by `auths`, as of `end_time` when set.
    fn scan(
        &self,
        kind: ElementKind,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Result<ElementIter<'_>>;

    /// Applies a mutation. Saves return the stored element as the writer
    /// sees it; other mutations return `None`. A save targeting an id held
    /// by an element the writer cannot read fails with
    /// [`GraphError::NotFoundOrUnauthorized`](crate::GraphError) and leaves
    /// that element untouched.
    fn persist(
        &self,
        mutation: ElementMutation,
        auths: &Authorizations,
    ) -> Result<Option<GraphElement>>;

    /// A fresh element id.
    fn next_id(&self) -> String;

    /// Single-id fetch. Defaults to a scan.
    fn fetch_element(
        &self,
        kind: ElementKind,
        id: &str,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Result<Option<GraphElement>> {
        fallback::fetch_by_scan(self, kind, id, hints, end_time, auths)
    }

    /// Bulk fetch. Missing or unreadable ids are skipped and repeated ids
    /// yield one element; order is unspecified. Defaults to one [`StorageBackend::fetch_element`] per id.
    fn fetch_elements<'a>(
        &'a self,
        kind: ElementKind,
        ids: Vec<String>,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &'a Authorizations,
    ) -> ElementIter<'a> {
        fallback::fetch_one_by_one(self, kind, ids, hints, end_time, auths)
    }

    /// Elements whose id starts with `prefix`. Defaults to a filtered scan.
    fn fetch_with_prefix<'a>(
        &'a self,
        kind: ElementKind,
        prefix: &str,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &'a Authorizations,
    ) -> Result<ElementIter<'a>> {
        fallback::scan_with_prefix(self, kind, prefix, hints, end_time, auths)
    }

    /// Number of readable elements of `kind`. Defaults to counting a scan.
    fn count(&self, kind: ElementKind, auths: &Authorizations) -> Result<u64> {
        fallback::count_by_scan(self, kind, auths)
    }

    /// Edges whose endpoints are both in `vertex_ids`. Defaults to the
    /// quadratic pairwise scan.
    fn find_related_edge_summary(
        &self,
        vertex_ids: &[String],
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Result<Vec<RelatedEdge>> {
        fallback::related_edges_pairwise(self, vertex_ids, end_time, auths)
    }

    /// Whether `visibility` is acceptable for a write under `auths`. The
    /// default policy requires the writer to satisfy it.
    fn is_visibility_valid(&self, visibility: &Visibility, auths: &Authorizations) -> bool {
        auths.can_read(visibility)
    }
}
