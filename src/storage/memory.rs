//! In-memory storage backend.
//!
//! Elements keep every property version they were written with, so reads
//! with an `end_time` see the graph as it stood at that instant. Soft
//! deletes record a timestamp instead of erasing anything; hidden marks are
//! a list of hiding visibilities per element.

use std::collections::HashSet;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::graph::{
    id_generator_for, ElementIter, ElementMutation, IdGenerator, SequentialIdGenerator,
    StagedElement, StorageBackend,
};
use crate::model::{
    Direction, Edge, EdgeInfo, ElementKind, ElementParts, FetchHints, GraphElement, Property,
    RelatedEdge, Vertex,
};
use crate::security::{Authorizations, Visibility};

type EdgeIds = SmallVec<[String; 4]>;

#[derive(Clone, Debug)]
struct StoredElement {
    visibility: Visibility,
    created_at: i64,
    updated_at: i64,
    soft_deleted_at: Option<i64>,
    hidden: Vec<Visibility>,
    properties: Vec<Property>,
}

impl StoredElement {
    fn new(staged: &StagedElement) -> Self {
        Self {
            visibility: staged.visibility.clone(),
            created_at: staged.timestamp,
            updated_at: staged.timestamp,
            soft_deleted_at: None,
            hidden: Vec::new(),
            properties: Vec::new(),
        }
    }

    fn apply(&mut self, staged: &StagedElement, auths: &Authorizations) {
        self.visibility = staged.visibility.clone();
        self.updated_at = self.updated_at.max(staged.timestamp);
        if self.soft_deleted_at.is_some_and(|at| at < staged.timestamp) {
            self.soft_deleted_at = None;
        }
        for removal in &staged.removals {
            self.properties.retain(|p| {
                !(p.key() == removal.key && p.name() == removal.name && auths.can_read(p.visibility()))
            });
        }
        for property in &staged.properties {
            self.properties.retain(|p| {
                !(p.is_same(property.key(), property.name(), property.visibility())
                    && p.timestamp() == property.timestamp())
            });
            self.properties.push(property.clone());
        }
    }

    fn exists_at(&self, end_time: Option<i64>) -> bool {
        match end_time {
            Some(at) => self.created_at <= at && self.soft_deleted_at.map_or(true, |deleted| deleted > at),
            None => self.soft_deleted_at.is_none(),
        }
    }

    fn is_hidden_from(&self, auths: &Authorizations) -> bool {
        self.hidden.iter().any(|visibility| auths.can_read(visibility))
    }

    fn readable(&self, hints: FetchHints, end_time: Option<i64>, auths: &Authorizations) -> bool {
        self.exists_at(end_time)
            && auths.can_read(&self.visibility)
            && (hints.includes_hidden() || !self.is_hidden_from(auths))
    }

    /// Latest version of each readable `(key, name, visibility)` as of
    /// `end_time`.
    fn visible_properties(
        &self,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Vec<Property> {
        if !hints.includes_properties() {
            return Vec::new();
        }
        let mut latest: Vec<&Property> = Vec::new();
        for property in &self.properties {
            if !auths.can_read(property.visibility()) || end_time.is_some_and(|at| property.timestamp() > at) {
                continue;
            }
            match latest
                .iter_mut()
                .find(|seen| seen.is_same(property.key(), property.name(), property.visibility()))
            {
                Some(seen) if property.timestamp() >= seen.timestamp() => *seen = property,
                Some(_) => {}
                None => latest.push(property),
            }
        }
        latest
            .into_iter()
            .map(|property| property.redacted(auths, hints.includes_property_metadata()))
            .collect()
    }

    fn parts(&self, id: &str, hints: FetchHints, end_time: Option<i64>, auths: &Authorizations) -> ElementParts {
        ElementParts {
            id: id.to_owned(),
            visibility: self.visibility.clone(),
            timestamp: self.updated_at,
            fetch_hints: hints,
            hidden: self.is_hidden_from(auths),
            properties: self.visible_properties(hints, end_time, auths),
        }
    }
}

#[derive(Clone, Debug)]
struct StoredEdge {
    element: StoredElement,
    label: String,
    out_vertex_id: String,
    in_vertex_id: String,
}

#[derive(Debug, Default)]
struct Tables {
    vertices: FxHashMap<String, StoredElement>,
    edges: FxHashMap<String, StoredEdge>,
    out_edges: FxHashMap<String, EdgeIds>,
    in_edges: FxHashMap<String, EdgeIds>,
}

impl Tables {
    fn element(
        &self,
        kind: ElementKind,
        id: &str,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Option<GraphElement> {
        match kind {
            ElementKind::Vertex => self
                .vertex(id, hints, end_time, auths)
                .map(GraphElement::Vertex),
            ElementKind::Edge => self.edge(id, hints, end_time, auths).map(GraphElement::Edge),
        }
    }

    fn vertex(&self, id: &str, hints: FetchHints, end_time: Option<i64>, auths: &Authorizations) -> Option<Vertex> {
        let stored = self.vertices.get(id).filter(|v| v.readable(hints, end_time, auths))?;
        let parts = stored.parts(id, hints, end_time, auths);
        let out_edges = if hints.contains(FetchHints::OUT_EDGE_REFS) {
            self.edge_infos(id, Direction::Out, hints, end_time, auths)
        } else {
            Vec::new()
        };
        let in_edges = if hints.contains(FetchHints::IN_EDGE_REFS) {
            self.edge_infos(id, Direction::In, hints, end_time, auths)
        } else {
            Vec::new()
        };
        Some(Vertex::from_parts(parts, out_edges, in_edges))
    }

    fn edge(&self, id: &str, hints: FetchHints, end_time: Option<i64>, auths: &Authorizations) -> Option<Edge> {
        let stored = self
            .edges
            .get(id)
            .filter(|e| e.element.readable(hints, end_time, auths))?;
        Some(Edge::from_parts(
            stored.element.parts(id, hints, end_time, auths),
            stored.label.clone(),
            stored.out_vertex_id.clone(),
            stored.in_vertex_id.clone(),
        ))
    }

    fn edge_infos(
        &self,
        vertex_id: &str,
        direction: Direction,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Vec<EdgeInfo> {
        let adjacency = match direction {
            Direction::Out => &self.out_edges,
            _ => &self.in_edges,
        };
        adjacency
            .get(vertex_id)
            .into_iter()
            .flatten()
            .filter_map(|edge_id| {
                let edge = self.edges.get(edge_id)?;
                if !edge.element.readable(hints, end_time, auths) {
                    return None;
                }
                let other = match direction {
                    Direction::Out => &edge.in_vertex_id,
                    _ => &edge.out_vertex_id,
                };
                Some(EdgeInfo {
                    edge_id: edge_id.clone(),
                    label: edge.label.clone(),
                    vertex_id: other.clone(),
                    direction,
                })
            })
            .collect()
    }

    fn link(&mut self, edge_id: &str, out_vertex_id: &str, in_vertex_id: &str) {
        let out = self.out_edges.entry(out_vertex_id.to_owned()).or_default();
        if !out.iter().any(|id| id == edge_id) {
            out.push(edge_id.to_owned());
        }
        let incoming = self.in_edges.entry(in_vertex_id.to_owned()).or_default();
        if !incoming.iter().any(|id| id == edge_id) {
            incoming.push(edge_id.to_owned());
        }
    }

    fn unlink(&mut self, edge_id: &str, out_vertex_id: &str, in_vertex_id: &str) {
        if let Some(out) = self.out_edges.get_mut(out_vertex_id) {
            out.retain(|id| id != edge_id);
        }
        if let Some(incoming) = self.in_edges.get_mut(in_vertex_id) {
            incoming.retain(|id| id != edge_id);
        }
    }

    fn remove_edge(&mut self, edge_id: &str) {
        if let Some(edge) = self.edges.remove(edge_id) {
            self.unlink(edge_id, &edge.out_vertex_id, &edge.in_vertex_id);
        }
    }

    /// Drops the vertex record only. Incident edges stay until deleted on
    /// their own, so edges the deleting caller cannot read survive.
    fn remove_vertex(&mut self, vertex_id: &str) {
        self.vertices.remove(vertex_id);
        for adjacency in [&mut self.out_edges, &mut self.in_edges] {
            if adjacency.get(vertex_id).is_some_and(|ids| ids.is_empty()) {
                adjacency.remove(vertex_id);
            }
        }
    }

    fn stored_mut(&mut self, kind: ElementKind, id: &str) -> Option<&mut StoredElement> {
        match kind {
            ElementKind::Vertex => self.vertices.get_mut(id),
            ElementKind::Edge => self.edges.get_mut(id).map(|edge| &mut edge.element),
        }
    }

    fn sorted_ids(&self, kind: ElementKind) -> Vec<&String> {
        let mut ids: Vec<&String> = match kind {
            ElementKind::Vertex => self.vertices.keys().collect(),
            ElementKind::Edge => self.edges.keys().collect(),
        };
        ids.sort();
        ids
    }
}

/// Process-local [`StorageBackend`] with indexed bulk reads.
pub struct InMemoryBackend {
    tables: RwLock<Tables>,
    ids: Box<dyn IdGenerator>,
}

impl InMemoryBackend {
    /// Empty backend issuing sequential ids.
    pub fn new() -> Self {
        Self::with_id_generator(Box::new(SequentialIdGenerator::default()))
    }

    /// Empty backend using the id generator selected by `config`.
    pub fn from_config(config: &GraphConfig) -> Self {
        Self::with_id_generator(id_generator_for(config.id_generator))
    }

    /// Empty backend drawing ids from `ids`.
    pub fn with_id_generator(ids: Box<dyn IdGenerator>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            ids,
        }
    }

    /// Fails when `id` is already held by an element the writer cannot read.
    fn ensure_writable(
        stored: Option<&StoredElement>,
        kind: ElementKind,
        id: &str,
        auths: &Authorizations,
    ) -> Result<()> {
        match stored {
            Some(existing) if !auths.can_read(&existing.visibility) => {
                warn!(%kind, id, "storage.memory.save.unreadable_target");
                Err(GraphError::not_found(kind, id))
            }
            _ => Ok(()),
        }
    }

    fn save_vertex(tables: &mut Tables, staged: &StagedElement, auths: &Authorizations) -> Result<()> {
        Self::ensure_writable(tables.vertices.get(&staged.id), ElementKind::Vertex, &staged.id, auths)?;
        tables
            .vertices
            .entry(staged.id.clone())
            .or_insert_with(|| StoredElement::new(staged))
            .apply(staged, auths);
        Ok(())
    }

    fn save_edge(
        tables: &mut Tables,
        staged: &StagedElement,
        label: String,
        out_vertex_id: String,
        in_vertex_id: String,
        auths: &Authorizations,
    ) -> Result<()> {
        Self::ensure_writable(
            tables.edges.get(&staged.id).map(|edge| &edge.element),
            ElementKind::Edge,
            &staged.id,
            auths,
        )?;
        for endpoint in [&out_vertex_id, &in_vertex_id] {
            let readable = tables
                .vertices
                .get(endpoint.as_str())
                .is_some_and(|v| v.readable(FetchHints::INCLUDE_HIDDEN, None, auths));
            if !readable {
                return Err(GraphError::not_found(ElementKind::Vertex, endpoint.as_str()));
            }
        }
        if let Some(previous) = tables.edges.get(&staged.id) {
            let (out, incoming) = (previous.out_vertex_id.clone(), previous.in_vertex_id.clone());
            tables.unlink(&staged.id, &out, &incoming);
        }
        tables.link(&staged.id, &out_vertex_id, &in_vertex_id);
        let edge = tables
            .edges
            .entry(staged.id.clone())
            .or_insert_with(|| StoredEdge {
                element: StoredElement::new(staged),
                label: label.clone(),
                out_vertex_id: out_vertex_id.clone(),
                in_vertex_id: in_vertex_id.clone(),
            });
        edge.label = label;
        edge.out_vertex_id = out_vertex_id;
        edge.in_vertex_id = in_vertex_id;
        edge.element.apply(staged, auths);
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("InMemoryBackend")
            .field("vertices", &tables.vertices.len())
            .field("edges", &tables.edges.len())
            .finish()
    }
}

impl StorageBackend for InMemoryBackend {
    fn scan(
        &self,
        kind: ElementKind,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Result<ElementIter<'_>> {
        let tables = self.tables.read();
        let elements: Vec<GraphElement> = tables
            .sorted_ids(kind)
            .into_iter()
            .filter_map(|id| tables.element(kind, id, hints, end_time, auths))
            .collect();
        trace!(%kind, count = elements.len(), "storage.memory.scan");
        Ok(Box::new(elements.into_iter().map(Ok)))
    }

    fn persist(&self, mutation: ElementMutation, auths: &Authorizations) -> Result<Option<GraphElement>> {
        let mut tables = self.tables.write();
        let kind = mutation.kind();
        let id = mutation.id().to_owned();
        match mutation {
            ElementMutation::SaveVertex(staged) => Self::save_vertex(&mut tables, &staged, auths)?,
            ElementMutation::SaveEdge {
                element,
                label,
                out_vertex_id,
                in_vertex_id,
            } => Self::save_edge(&mut tables, &element, label, out_vertex_id, in_vertex_id, auths)?,
            ElementMutation::Delete { kind, id } => {
                match kind {
                    ElementKind::Vertex => tables.remove_vertex(&id),
                    ElementKind::Edge => tables.remove_edge(&id),
                }
                debug!(%kind, id = %id, "storage.memory.delete");
                return Ok(None);
            }
            ElementMutation::SoftDelete { kind, id, timestamp } => {
                if let Some(stored) = tables.stored_mut(kind, &id) {
                    stored.soft_deleted_at = Some(stored.soft_deleted_at.map_or(timestamp, |at| at.min(timestamp)));
                }
                return Ok(None);
            }
            ElementMutation::MarkHidden { kind, id, visibility } => {
                if let Some(stored) = tables.stored_mut(kind, &id) {
                    if !stored.hidden.contains(&visibility) {
                        stored.hidden.push(visibility);
                    }
                }
                return Ok(None);
            }
            ElementMutation::MarkVisible { kind, id, visibility } => {
                if let Some(stored) = tables.stored_mut(kind, &id) {
                    stored.hidden.retain(|hidden| hidden != &visibility);
                }
                return Ok(None);
            }
        }
        Ok(tables.element(kind, &id, FetchHints::ALL_INCLUDING_HIDDEN, None, auths))
    }

    fn next_id(&self) -> String {
        self.ids.next_id()
    }

    fn fetch_element(
        &self,
        kind: ElementKind,
        id: &str,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Result<Option<GraphElement>> {
        Ok(self.tables.read().element(kind, id, hints, end_time, auths))
    }

    fn fetch_elements<'a>(
        &'a self,
        kind: ElementKind,
        ids: Vec<String>,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &'a Authorizations,
    ) -> ElementIter<'a> {
        let tables = self.tables.read();
        let mut seen = HashSet::with_capacity(ids.len());
        let elements: Vec<GraphElement> = ids
            .iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| tables.element(kind, id, hints, end_time, auths))
            .collect();
        Box::new(elements.into_iter().map(Ok))
    }

    fn fetch_with_prefix<'a>(
        &'a self,
        kind: ElementKind,
        prefix: &str,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &'a Authorizations,
    ) -> Result<ElementIter<'a>> {
        let tables = self.tables.read();
        let elements: Vec<GraphElement> = tables
            .sorted_ids(kind)
            .into_iter()
            .filter(|id| id.starts_with(prefix))
            .filter_map(|id| tables.element(kind, id, hints, end_time, auths))
            .collect();
        Ok(Box::new(elements.into_iter().map(Ok)))
    }

    fn count(&self, kind: ElementKind, auths: &Authorizations) -> Result<u64> {
        let tables = self.tables.read();
        let count = match kind {
            ElementKind::Vertex => tables
                .vertices
                .values()
                .filter(|v| v.readable(FetchHints::NONE, None, auths))
                .count(),
            ElementKind::Edge => tables
                .edges
                .values()
                .filter(|e| e.element.readable(FetchHints::NONE, None, auths))
                .count(),
        };
        Ok(count as u64)
    }

    /// Walks the outgoing adjacency of each requested vertex once and keeps
    /// edges landing back inside the set.
    fn find_related_edge_summary(
        &self,
        vertex_ids: &[String],
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Result<Vec<RelatedEdge>> {
        let tables = self.tables.read();
        let readable: HashSet<&str> = vertex_ids
            .iter()
            .map(String::as_str)
            .filter(|id| {
                tables
                    .vertices
                    .get(*id)
                    .is_some_and(|v| v.readable(FetchHints::NONE, end_time, auths))
            })
            .collect();
        let mut related = Vec::new();
        let mut ordered: Vec<&str> = readable.iter().copied().collect();
        ordered.sort_unstable();
        for out_vertex_id in ordered {
            for info in tables.edge_infos(out_vertex_id, Direction::Out, FetchHints::NONE, end_time, auths) {
                if readable.contains(info.vertex_id.as_str()) {
                    related.push(RelatedEdge::new(info.edge_id, info.label, out_vertex_id, info.vertex_id));
                }
            }
        }
        Ok(related)
    }
}
