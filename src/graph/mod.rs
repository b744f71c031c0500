#![forbid(unsafe_code)]

//! Graph facade.
//!
//! [`Graph`] layers element builders, security checks, search indexing and
//! event emission over a [`StorageBackend`]. Reads hand back immutable
//! snapshots already filtered for the caller's authorizations; an element the
//! caller cannot read is reported exactly like one that does not exist.

mod backend;
mod builder;
mod events;
mod fallback;
mod id;
mod metadata;
mod path;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub use backend::{ElementIter, ElementMutation, PropertyRemoval, StagedElement, StorageBackend};
pub use builder::{DefinePropertyBuilder, EdgeBuilder, VertexBuilder};
pub use events::{GraphEvent, GraphEventListener};
pub use id::{id_generator_for, IdGenerator, RandomIdGenerator, SequentialIdGenerator};
pub use metadata::{GraphMetadataEntry, GraphMetadataStore, InMemoryMetadataStore};
pub use path::{LoggingProgress, ProgressCallback, ProgressStep};

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::model::{
    Direction, Edge, Element, ElementKind, FetchHints, GraphElement, Path, PropertyValue,
    RelatedEdge, Vertex,
};
use crate::query::{GraphQuery, SimilarToTextParameters};
use crate::search::{
    DefaultIndexSelection, DefaultScoring, IndexSelectionStrategy, IndexedElement,
    PropertyDefinition, RemovedProperty, ScoringStrategy, SearchIndex,
};
use crate::security::{Authorizations, Visibility};
use events::EventListeners;
use path::PathFinder;

/// Which visibilities of an edge [`Graph::filter_edge_ids_by_authorization`]
/// inspects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeFilter {
    /// The edge's own visibility.
    Edge,
    /// Visibilities of the edge's properties.
    Property,
    /// Visibilities of the edge's property metadata entries.
    PropertyMetadata,
}

impl EdgeFilter {
    /// Every filter.
    pub const ALL: [EdgeFilter; 3] = [EdgeFilter::Edge, EdgeFilter::Property, EdgeFilter::PropertyMetadata];
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn vertices_only<'a>(elements: ElementIter<'a>) -> impl Iterator<Item = Result<Vertex>> + 'a {
    elements.filter_map(|element| element.map(GraphElement::into_vertex).transpose())
}

fn edges_only<'a>(elements: ElementIter<'a>) -> impl Iterator<Item = Result<Edge>> + 'a {
    elements.filter_map(|element| element.map(GraphElement::into_edge).transpose())
}

/// A property graph over a storage backend, optionally mirrored into a
/// search index.
pub struct Graph<B: StorageBackend> {
    backend: B,
    config: GraphConfig,
    search: Option<Arc<dyn SearchIndex>>,
    index_selection: Arc<dyn IndexSelectionStrategy>,
    scoring: Arc<dyn ScoringStrategy>,
    listeners: EventListeners,
    metadata: Box<dyn GraphMetadataStore>,
    definitions: RwLock<FxHashMap<String, PropertyDefinition>>,
}

impl<B: StorageBackend> Graph<B> {
    /// Opens a graph over `backend` after validating `config`.
    pub fn open(backend: B, config: GraphConfig) -> Result<Self> {
        config.validate()?;
        info!(
            index = %config.search.index_name,
            id_generator = ?config.id_generator,
            "graph.open"
        );
        Ok(Self {
            backend,
            config,
            search: None,
            index_selection: Arc::new(DefaultIndexSelection),
            scoring: Arc::new(DefaultScoring),
            listeners: EventListeners::default(),
            metadata: Box::new(InMemoryMetadataStore::default()),
            definitions: RwLock::new(FxHashMap::default()),
        })
    }

    /// Mirrors every write into `index` and routes queries through it.
    pub fn with_search_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.search = Some(index);
        self
    }

    /// Replaces the index selection strategy.
    pub fn with_index_selection(mut self, strategy: Arc<dyn IndexSelectionStrategy>) -> Self {
        self.index_selection = strategy;
        self
    }

    /// Replaces the scoring strategy.
    pub fn with_scoring(mut self, strategy: Arc<dyn ScoringStrategy>) -> Self {
        self.scoring = strategy;
        self
    }

    /// Replaces the graph-level metadata store.
    pub fn with_metadata_store(mut self, store: Box<dyn GraphMetadataStore>) -> Self {
        self.metadata = store;
        self
    }

    /// Storage backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Active configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Attached search index.
    pub fn search_index(&self) -> Option<&dyn SearchIndex> {
        self.search.as_deref()
    }

    pub(crate) fn index_selection(&self) -> &dyn IndexSelectionStrategy {
        self.index_selection.as_ref()
    }

    pub(crate) fn scoring(&self) -> &dyn ScoringStrategy {
        self.scoring.as_ref()
    }

    /// Registers a listener. Listeners run synchronously on the mutating
    /// thread, after the mutation is stored.
    pub fn add_event_listener(&self, listener: Arc<dyn GraphEventListener>) {
        self.listeners.register(listener);
    }

    // ---------------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------------

    /// Stages a vertex. `id` defaults to a backend-generated id and
    /// `timestamp` to now.
    pub fn prepare_vertex(
        &self,
        id: Option<&str>,
        timestamp: Option<i64>,
        visibility: Visibility,
    ) -> VertexBuilder<'_, B> {
        let id = id.map_or_else(|| self.backend.next_id(), str::to_owned);
        VertexBuilder::new(self, id, visibility, timestamp.unwrap_or_else(now_millis))
    }

    /// Creates a vertex without properties.
    pub fn add_vertex(&self, id: Option<&str>, visibility: Visibility, auths: &Authorizations) -> Result<Vertex> {
        self.prepare_vertex(id, None, visibility).save(auths)
    }

    /// Saves every builder in order.
    pub fn add_vertices<'g>(
        &'g self,
        builders: impl IntoIterator<Item = VertexBuilder<'g, B>>,
        auths: &Authorizations,
    ) -> Result<Vec<Vertex>> {
        builders.into_iter().map(|builder| builder.save(auths)).collect()
    }

    /// Stages an edge between two vertex ids.
    pub fn prepare_edge(
        &self,
        id: Option<&str>,
        out_vertex_id: &str,
        in_vertex_id: &str,
        label: &str,
        timestamp: Option<i64>,
        visibility: Visibility,
    ) -> EdgeBuilder<'_, B> {
        let id = id.map_or_else(|| self.backend.next_id(), str::to_owned);
        EdgeBuilder::new(
            self,
            id,
            out_vertex_id.to_owned(),
            in_vertex_id.to_owned(),
            label.to_owned(),
            visibility,
            timestamp.unwrap_or_else(now_millis),
        )
    }

    /// Stages an edge between two fetched vertices.
    pub fn prepare_edge_between(
        &self,
        id: Option<&str>,
        out_vertex: &Vertex,
        in_vertex: &Vertex,
        label: &str,
        visibility: Visibility,
    ) -> EdgeBuilder<'_, B> {
        self.prepare_edge(id, out_vertex.id(), in_vertex.id(), label, None, visibility)
    }

    /// Creates an edge without properties.
    pub fn add_edge(
        &self,
        id: Option<&str>,
        out_vertex_id: &str,
        in_vertex_id: &str,
        label: &str,
        visibility: Visibility,
        auths: &Authorizations,
    ) -> Result<Edge> {
        self.prepare_edge(id, out_vertex_id, in_vertex_id, label, None, visibility)
            .save(auths)
    }

    fn check_visibilities(&self, staged: &StagedElement, auths: &Authorizations) -> Result<()> {
        let property_visibilities = staged.properties.iter().flat_map(|property| {
            let metadata = property
                .metadata()
                .map(|m| m.entries())
                .unwrap_or_default();
            std::iter::once(property.visibility()).chain(metadata.iter().map(|entry| &entry.visibility))
        });
        for visibility in std::iter::once(&staged.visibility).chain(property_visibilities) {
            if !self.backend.is_visibility_valid(visibility, auths) {
                warn!(id = %staged.id, visibility = %visibility, "graph.save.invalid_visibility");
                return Err(GraphError::InvalidVisibility(format!(
                    "'{visibility}' cannot be satisfied by the writer's authorizations"
                )));
            }
        }
        Ok(())
    }

    /// Stored property variants the writer can see that `staged` removes.
    /// Read before persisting, since the save drops them.
    fn removed_properties(
        &self,
        kind: ElementKind,
        staged: &StagedElement,
        auths: &Authorizations,
    ) -> Result<Vec<RemovedProperty>> {
        if self.search.is_none() || staged.removals.is_empty() {
            return Ok(Vec::new());
        }
        let hints = FetchHints::PROPERTIES | FetchHints::INCLUDE_HIDDEN;
        let Some(existing) = self.get_element(kind, &staged.id, hints, None, auths)? else {
            return Ok(Vec::new());
        };
        Ok(existing
            .properties()?
            .iter()
            .filter(|property| {
                staged
                    .removals
                    .iter()
                    .any(|removal| removal.key == property.key() && removal.name == property.name())
            })
            .map(|property| RemovedProperty {
                key: property.key().to_owned(),
                name: property.name().to_owned(),
                visibility: property.visibility().clone(),
            })
            .collect())
    }

    fn index(&self, kind: ElementKind, staged: &StagedElement, removals: Vec<RemovedProperty>) -> Result<()> {
        if let Some(search) = &self.search {
            search.add_element(&IndexedElement {
                kind,
                id: staged.id.clone(),
                visibility: staged.visibility.clone(),
                properties: staged.properties.clone(),
                removals,
            })?;
        }
        Ok(())
    }

    fn unindex(&self, kind: ElementKind, id: &str) -> Result<()> {
        if let Some(search) = &self.search {
            search.delete_element(kind, id)?;
        }
        Ok(())
    }

    fn property_events(kind: ElementKind, staged: &StagedElement) -> Vec<GraphEvent> {
        let removed = staged.removals.iter().map(|removal| GraphEvent::RemoveProperty {
            kind,
            element_id: staged.id.clone(),
            key: removal.key.clone(),
            name: removal.name.clone(),
        });
        let added = staged.properties.iter().map(|property| GraphEvent::AddProperty {
            kind,
            element_id: staged.id.clone(),
            key: property.key().to_owned(),
            name: property.name().to_owned(),
        });
        removed.chain(added).collect()
    }

    pub(crate) fn save_vertex(&self, staged: StagedElement, auths: &Authorizations) -> Result<Vertex> {
        self.check_visibilities(&staged, auths)?;
        let events = self
            .listeners
            .has_listeners()
            .then(|| Self::property_events(ElementKind::Vertex, &staged));
        let removals = self.removed_properties(ElementKind::Vertex, &staged, auths)?;
        let id = staged.id.clone();
        let vertex = self
            .backend
            .persist(ElementMutation::SaveVertex(staged.clone()), auths)?
            .and_then(GraphElement::into_vertex)
            .ok_or_else(|| GraphError::BackendUnavailable(format!("vertex '{id}' was not stored")))?;
        self.index(ElementKind::Vertex, &staged, removals)?;
        debug!(id = %vertex.id(), "graph.save_vertex");
        if let Some(events) = events {
            self.listeners.emit(GraphEvent::AddVertex {
                vertex_id: vertex.id().to_owned(),
            });
            for event in events {
                self.listeners.emit(event);
            }
        }
        Ok(vertex)
    }

    pub(crate) fn save_edge(
        &self,
        staged: StagedElement,
        label: String,
        out_vertex_id: String,
        in_vertex_id: String,
        auths: &Authorizations,
    ) -> Result<Edge> {
        self.check_visibilities(&staged, auths)?;
        let events = self
            .listeners
            .has_listeners()
            .then(|| Self::property_events(ElementKind::Edge, &staged));
        let removals = self.removed_properties(ElementKind::Edge, &staged, auths)?;
        let id = staged.id.clone();
        let stored = self.backend.persist(
            ElementMutation::SaveEdge {
                element: staged.clone(),
                label,
                out_vertex_id,
                in_vertex_id,
            },
            auths,
        )?;
        let edge = stored
            .and_then(GraphElement::into_edge)
            .ok_or_else(|| GraphError::BackendUnavailable(format!("edge '{id}' was not stored")))?;
        self.index(ElementKind::Edge, &staged, removals)?;
        debug!(
            id = %edge.id(),
            label = %edge.label(),
            out_vertex = %edge.out_vertex_id(),
            in_vertex = %edge.in_vertex_id(),
            "graph.save_edge"
        );
        if let Some(events) = events {
            self.listeners.emit(GraphEvent::AddEdge {
                edge_id: edge.id().to_owned(),
                label: edge.label().to_owned(),
                out_vertex_id: edge.out_vertex_id().to_owned(),
                in_vertex_id: edge.in_vertex_id().to_owned(),
            });
            for event in events {
                self.listeners.emit(event);
            }
        }
        Ok(edge)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub(crate) fn get_element(
        &self,
        kind: ElementKind,
        id: &str,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Result<Option<GraphElement>> {
        self.backend.fetch_element(kind, id, hints, end_time, auths)
    }

    /// The vertex `id`, or `None` when it is missing or unreadable.
    pub fn get_vertex(&self, id: &str, hints: FetchHints, auths: &Authorizations) -> Result<Option<Vertex>> {
        self.get_vertex_as_of(id, hints, None, auths)
    }

    /// [`Graph::get_vertex`] as the graph stood at `end_time`.
    pub fn get_vertex_as_of(
        &self,
        id: &str,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Result<Option<Vertex>> {
        Ok(self
            .get_element(ElementKind::Vertex, id, hints, end_time, auths)?
            .and_then(GraphElement::into_vertex))
    }

    /// The edge `id`, or `None` when it is missing or unreadable.
    pub fn get_edge(&self, id: &str, hints: FetchHints, auths: &Authorizations) -> Result<Option<Edge>> {
        self.get_edge_as_of(id, hints, None, auths)
    }

    /// [`Graph::get_edge`] as the graph stood at `end_time`.
    pub fn get_edge_as_of(
        &self,
        id: &str,
        hints: FetchHints,
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Result<Option<Edge>> {
        Ok(self
            .get_element(ElementKind::Edge, id, hints, end_time, auths)?
            .and_then(GraphElement::into_edge))
    }

    /// Readable vertices among `ids`, in no particular order.
    pub fn get_vertices<'a, I, S>(
        &'a self,
        ids: I,
        hints: FetchHints,
        auths: &'a Authorizations,
    ) -> impl Iterator<Item = Result<Vertex>> + 'a
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids.into_iter().map(Into::into).collect();
        vertices_only(
            self.backend
                .fetch_elements(ElementKind::Vertex, ids, hints, None, auths),
        )
    }

    /// Readable edges among `ids`, in no particular order.
    pub fn get_edges<'a, I, S>(
        &'a self,
        ids: I,
        hints: FetchHints,
        auths: &'a Authorizations,
    ) -> impl Iterator<Item = Result<Edge>> + 'a
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids.into_iter().map(Into::into).collect();
        edges_only(
            self.backend
                .fetch_elements(ElementKind::Edge, ids, hints, None, auths),
        )
    }

    /// Readable vertices among `ids`, in input order.
    pub fn get_vertices_in_order<I, S>(
        &self,
        ids: I,
        hints: FetchHints,
        auths: &Authorizations,
    ) -> Result<Vec<Vertex>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let mut position: FxHashMap<&str, usize> = FxHashMap::default();
        for (index, id) in ids.iter().enumerate() {
            position.entry(id.as_str()).or_insert(index);
        }
        let mut vertices = self
            .get_vertices(ids.iter().cloned(), hints, auths)
            .collect::<Result<Vec<_>>>()?;
        vertices.sort_by_key(|vertex| position.get(vertex.id()).copied().unwrap_or(usize::MAX));
        Ok(vertices)
    }

    /// Every readable vertex.
    pub fn get_all_vertices(
        &self,
        hints: FetchHints,
        auths: &Authorizations,
    ) -> Result<impl Iterator<Item = Result<Vertex>> + '_> {
        Ok(vertices_only(self.backend.scan(ElementKind::Vertex, hints, None, auths)?))
    }

    /// Every readable edge.
    pub fn get_all_edges(
        &self,
        hints: FetchHints,
        auths: &Authorizations,
    ) -> Result<impl Iterator<Item = Result<Edge>> + '_> {
        Ok(edges_only(self.backend.scan(ElementKind::Edge, hints, None, auths)?))
    }

    /// Readable vertices whose id starts with `prefix`.
    pub fn get_vertices_with_prefix<'a>(
        &'a self,
        prefix: &str,
        hints: FetchHints,
        auths: &'a Authorizations,
    ) -> Result<impl Iterator<Item = Result<Vertex>> + 'a> {
        Ok(vertices_only(self.backend.fetch_with_prefix(
            ElementKind::Vertex,
            prefix,
            hints,
            None,
            auths,
        )?))
    }

    /// Number of readable vertices.
    pub fn get_vertex_count(&self, auths: &Authorizations) -> Result<u64> {
        self.backend.count(ElementKind::Vertex, auths)
    }

    /// Number of readable edges.
    pub fn get_edge_count(&self, auths: &Authorizations) -> Result<u64> {
        self.backend.count(ElementKind::Edge, auths)
    }

    /// Whether vertex `id` exists and is readable.
    pub fn does_vertex_exist(&self, id: &str, auths: &Authorizations) -> Result<bool> {
        Ok(self.get_vertex(id, FetchHints::NONE, auths)?.is_some())
    }

    /// Whether edge `id` exists and is readable.
    pub fn does_edge_exist(&self, id: &str, auths: &Authorizations) -> Result<bool> {
        Ok(self.get_edge(id, FetchHints::NONE, auths)?.is_some())
    }

    /// Existence of every id in `ids`.
    pub fn do_vertices_exist<I, S>(&self, ids: I, auths: &Authorizations) -> Result<HashMap<String, bool>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.do_elements_exist(ElementKind::Vertex, ids, auths)
    }

    /// Existence of every id in `ids`.
    pub fn do_edges_exist<I, S>(&self, ids: I, auths: &Authorizations) -> Result<HashMap<String, bool>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.do_elements_exist(ElementKind::Edge, ids, auths)
    }

    fn do_elements_exist<I, S>(
        &self,
        kind: ElementKind,
        ids: I,
        auths: &Authorizations,
    ) -> Result<HashMap<String, bool>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let mut exists: HashMap<String, bool> = ids.iter().map(|id| (id.clone(), false)).collect();
        for element in self
            .backend
            .fetch_elements(kind, ids, FetchHints::NONE, None, auths)
        {
            exists.insert(element?.id().to_owned(), true);
        }
        Ok(exists)
    }

    // ---------------------------------------------------------------------
    // Deletes and visibility marks
    // ---------------------------------------------------------------------

    /// Deletes vertex `id` and its readable edges. Unresolvable ids are
    /// ignored.
    pub fn delete_vertex(&self, id: &str, auths: &Authorizations) -> Result<()> {
        let hints = FetchHints::EDGE_REFS | FetchHints::INCLUDE_HIDDEN;
        let Some(vertex) = self.get_vertex(id, hints, auths)? else {
            debug!(id, "graph.delete_vertex.unresolved");
            return Ok(());
        };
        for edge_id in vertex.edge_ids(Direction::Both)? {
            self.delete_edge(edge_id, auths)?;
        }
        self.backend.persist(
            ElementMutation::Delete {
                kind: ElementKind::Vertex,
                id: id.to_owned(),
            },
            auths,
        )?;
        self.unindex(ElementKind::Vertex, id)?;
        debug!(id, "graph.delete_vertex");
        self.listeners.emit(GraphEvent::DeleteVertex {
            vertex_id: id.to_owned(),
        });
        Ok(())
    }

    /// Deletes edge `id`. Unresolvable ids are ignored.
    pub fn delete_edge(&self, id: &str, auths: &Authorizations) -> Result<()> {
        if self.get_edge(id, FetchHints::INCLUDE_HIDDEN, auths)?.is_none() {
            debug!(id, "graph.delete_edge.unresolved");
            return Ok(());
        }
        self.backend.persist(
            ElementMutation::Delete {
                kind: ElementKind::Edge,
                id: id.to_owned(),
            },
            auths,
        )?;
        self.unindex(ElementKind::Edge, id)?;
        debug!(id, "graph.delete_edge");
        self.listeners.emit(GraphEvent::DeleteEdge {
            edge_id: id.to_owned(),
        });
        Ok(())
    }

    /// Hides vertex `id` and its readable edges from `timestamp` (default
    /// now) onward. Earlier snapshots still see them.
    pub fn soft_delete_vertex(&self, id: &str, timestamp: Option<i64>, auths: &Authorizations) -> Result<()> {
        let hints = FetchHints::EDGE_REFS | FetchHints::INCLUDE_HIDDEN;
        let Some(vertex) = self.get_vertex(id, hints, auths)? else {
            debug!(id, "graph.soft_delete_vertex.unresolved");
            return Ok(());
        };
        let timestamp = timestamp.unwrap_or_else(now_millis);
        for edge_id in vertex.edge_ids(Direction::Both)? {
            self.soft_delete_edge(edge_id, Some(timestamp), auths)?;
        }
        self.backend.persist(
            ElementMutation::SoftDelete {
                kind: ElementKind::Vertex,
                id: id.to_owned(),
                timestamp,
            },
            auths,
        )?;
        self.unindex(ElementKind::Vertex, id)?;
        debug!(id, timestamp, "graph.soft_delete_vertex");
        self.listeners.emit(GraphEvent::SoftDeleteVertex {
            vertex_id: id.to_owned(),
            timestamp,
        });
        Ok(())
    }

    /// Hides edge `id` from `timestamp` (default now) onward.
    pub fn soft_delete_edge(&self, id: &str, timestamp: Option<i64>, auths: &Authorizations) -> Result<()> {
        if self.get_edge(id, FetchHints::INCLUDE_HIDDEN, auths)?.is_none() {
            debug!(id, "graph.soft_delete_edge.unresolved");
            return Ok(());
        }
        let timestamp = timestamp.unwrap_or_else(now_millis);
        self.backend.persist(
            ElementMutation::SoftDelete {
                kind: ElementKind::Edge,
                id: id.to_owned(),
                timestamp,
            },
            auths,
        )?;
        self.unindex(ElementKind::Edge, id)?;
        debug!(id, timestamp, "graph.soft_delete_edge");
        self.listeners.emit(GraphEvent::SoftDeleteEdge {
            edge_id: id.to_owned(),
            timestamp,
        });
        Ok(())
    }

    /// Hides vertex `id` and its readable edges from every reader who can
    /// see `visibility`.
    pub fn mark_vertex_hidden(&self, id: &str, visibility: &Visibility, auths: &Authorizations) -> Result<()> {
        self.mark_vertex(id, visibility, true, auths)
    }

    /// Lifts a [`Graph::mark_vertex_hidden`] for `visibility`.
    pub fn mark_vertex_visible(&self, id: &str, visibility: &Visibility, auths: &Authorizations) -> Result<()> {
        self.mark_vertex(id, visibility, false, auths)
    }

    /// Hides edge `id` from every reader who can see `visibility`.
    pub fn mark_edge_hidden(&self, id: &str, visibility: &Visibility, auths: &Authorizations) -> Result<()> {
        self.mark(ElementKind::Edge, id, visibility, true, auths)
    }

    /// Lifts a [`Graph::mark_edge_hidden`] for `visibility`.
    pub fn mark_edge_visible(&self, id: &str, visibility: &Visibility, auths: &Authorizations) -> Result<()> {
        self.mark(ElementKind::Edge, id, visibility, false, auths)
    }

    fn mark_vertex(&self, id: &str, visibility: &Visibility, hidden: bool, auths: &Authorizations) -> Result<()> {
        let hints = FetchHints::EDGE_REFS | FetchHints::INCLUDE_HIDDEN;
        let Some(vertex) = self.get_vertex(id, hints, auths)? else {
            debug!(id, hidden, "graph.mark_vertex.unresolved");
            return Ok(());
        };
        for edge_id in vertex.edge_ids(Direction::Both)? {
            self.mark(ElementKind::Edge, edge_id, visibility, hidden, auths)?;
        }
        self.mark(ElementKind::Vertex, id, visibility, hidden, auths)
    }

    fn mark(
        &self,
        kind: ElementKind,
        id: &str,
        visibility: &Visibility,
        hidden: bool,
        auths: &Authorizations,
    ) -> Result<()> {
        if self
            .get_element(kind, id, FetchHints::INCLUDE_HIDDEN, None, auths)?
            .is_none()
        {
            debug!(%kind, id, hidden, "graph.mark.unresolved");
            return Ok(());
        }
        let (mutation, event) = if hidden {
            (
                ElementMutation::MarkHidden {
                    kind,
                    id: id.to_owned(),
                    visibility: visibility.clone(),
                },
                GraphEvent::MarkHidden {
                    kind,
                    element_id: id.to_owned(),
                    visibility: visibility.clone(),
                },
            )
        } else {
            (
                ElementMutation::MarkVisible {
                    kind,
                    id: id.to_owned(),
                    visibility: visibility.clone(),
                },
                GraphEvent::MarkVisible {
                    kind,
                    element_id: id.to_owned(),
                    visibility: visibility.clone(),
                },
            )
        };
        self.backend.persist(mutation, auths)?;
        debug!(%kind, id, hidden, visibility = %visibility, "graph.mark");
        self.listeners.emit(event);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Traversal
    // ---------------------------------------------------------------------

    /// Edges whose endpoints both lie in `vertex_ids`.
    pub fn find_related_edge_summary(
        &self,
        vertex_ids: &[String],
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Result<Vec<RelatedEdge>> {
        self.backend
            .find_related_edge_summary(vertex_ids, end_time, auths)
    }

    /// Ids of the edges [`Graph::find_related_edge_summary`] reports.
    pub fn find_related_edge_ids(
        &self,
        vertex_ids: &[String],
        end_time: Option<i64>,
        auths: &Authorizations,
    ) -> Result<Vec<String>> {
        Ok(self
            .find_related_edge_summary(vertex_ids, end_time, auths)?
            .into_iter()
            .map(|edge| edge.edge_id)
            .collect())
    }

    /// Every simple undirected path of at most `max_hops` edges between two
    /// vertices. Progress is logged at debug level.
    pub fn find_paths(
        &self,
        source_id: &str,
        dest_id: &str,
        max_hops: usize,
        auths: &Authorizations,
    ) -> Result<Vec<Path>> {
        self.find_paths_with_progress(source_id, dest_id, max_hops, &mut LoggingProgress, auths)
    }

    /// [`Graph::find_paths`] reporting progress to `callback`.
    pub fn find_paths_with_progress(
        &self,
        source_id: &str,
        dest_id: &str,
        max_hops: usize,
        callback: &mut dyn ProgressCallback,
        auths: &Authorizations,
    ) -> Result<Vec<Path>> {
        let source = self.require_vertex(source_id, auths)?;
        let dest = self.require_vertex(dest_id, auths)?;
        PathFinder::new(&self.backend, dest.id(), callback, auths).find(&source, max_hops)
    }

    fn require_vertex(&self, id: &str, auths: &Authorizations) -> Result<Vertex> {
        self.get_vertex(id, FetchHints::EDGE_REFS, auths)?.ok_or_else(|| {
            warn!(id, "graph.find_paths.vertex_not_found");
            GraphError::not_found(ElementKind::Vertex, id)
        })
    }

    // ---------------------------------------------------------------------
    // Security and statistics
    // ---------------------------------------------------------------------

    /// Ids among `edge_ids` whose visibilities selected by `filters` mention
    /// `token` directly.
    pub fn filter_edge_ids_by_authorization<I, S>(
        &self,
        edge_ids: I,
        token: &str,
        filters: &[EdgeFilter],
        auths: &Authorizations,
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut matching = Vec::new();
        for edge in self.get_edges(edge_ids, FetchHints::ALL_INCLUDING_HIDDEN, auths) {
            let edge = edge?;
            if edge_mentions(&edge, token, filters)? {
                matching.push(edge.id().to_owned());
            }
        }
        Ok(matching)
    }

    /// Occurrences of each visible value of `name` across readable vertices.
    /// Strings are counted case-insensitively.
    pub fn get_vertex_property_count_by_value(
        &self,
        name: &str,
        auths: &Authorizations,
    ) -> Result<HashMap<PropertyValue, u64>> {
        let mut counts = HashMap::new();
        for vertex in self.get_all_vertices(FetchHints::PROPERTIES, auths)? {
            let vertex = vertex?;
            for property in vertex.properties_named(name)? {
                *counts.entry(property.value().case_folded()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Authorizations holding `tokens`.
    pub fn create_authorizations<I, S>(&self, tokens: I) -> Authorizations
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Authorizations::new(tokens)
    }

    /// `existing` plus `additional`, without duplicates.
    pub fn create_authorizations_with<I, S>(&self, existing: &Authorizations, additional: I) -> Authorizations
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        existing.union(additional)
    }

    // ---------------------------------------------------------------------
    // Graph metadata and property definitions
    // ---------------------------------------------------------------------

    /// Stores `value` under `key`.
    pub fn set_metadata<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|err| GraphError::InvalidArgument(format!("metadata '{key}': {err}")))?;
        self.metadata.set(key, value);
        Ok(())
    }

    /// Value stored under `key`.
    pub fn get_metadata<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.metadata
            .get(key)
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|err| GraphError::InvalidArgument(format!("metadata '{key}': {err}")))
            })
            .transpose()
    }

    /// Every metadata entry in key order.
    pub fn get_metadata_entries(&self) -> Vec<GraphMetadataEntry> {
        self.metadata.entries()
    }

    /// Metadata entries whose key starts with `prefix`.
    pub fn get_metadata_with_prefix(&self, prefix: &str) -> Vec<GraphMetadataEntry> {
        self.metadata.entries_with_prefix(prefix)
    }

    /// Starts a property definition.
    pub fn define_property(&self, name: &str) -> DefinePropertyBuilder<'_, B> {
        DefinePropertyBuilder::new(self, name.to_owned())
    }

    pub(crate) fn register_property_definition(
        &self,
        definition: PropertyDefinition,
    ) -> Result<PropertyDefinition> {
        if let Some(search) = &self.search {
            search.define_property(definition.clone())?;
        }
        debug!(
            name = %definition.name,
            data_type = ?definition.data_type,
            "graph.define_property"
        );
        self.definitions
            .write()
            .insert(definition.name.clone(), definition.clone());
        Ok(definition)
    }

    /// Definition registered for `name`, falling back to what the search
    /// index inferred.
    pub fn property_definition(&self, name: &str) -> Option<PropertyDefinition> {
        if let Some(definition) = self.definitions.read().get(name) {
            return Some(definition.clone());
        }
        self.search
            .as_ref()
            .and_then(|search| search.property_definition(name))
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// A query matching everything, narrowed with `has` clauses.
    pub fn query(&self, auths: &Authorizations) -> GraphQuery<'_, B> {
        GraphQuery::new(self, None, auths.clone())
    }

    /// A free-text query.
    pub fn query_string(&self, query: &str, auths: &Authorizations) -> GraphQuery<'_, B> {
        GraphQuery::new(self, Some(query.to_owned()), auths.clone())
    }

    /// A similar-to-text query. Needs a search index.
    pub fn query_similar_to(
        &self,
        parameters: SimilarToTextParameters,
        auths: &Authorizations,
    ) -> GraphQuery<'_, B> {
        GraphQuery::similar_to(self, parameters, auths.clone())
    }
}

fn edge_mentions(edge: &Edge, token: &str, filters: &[EdgeFilter]) -> Result<bool> {
    if filters.contains(&EdgeFilter::Edge) && edge.visibility().has_authorization(token) {
        return Ok(true);
    }
    let check_properties = filters.contains(&EdgeFilter::Property);
    let check_metadata = filters.contains(&EdgeFilter::PropertyMetadata);
    if !check_properties && !check_metadata {
        return Ok(false);
    }
    for property in edge.properties()? {
        if check_properties && property.visibility().has_authorization(token) {
            return Ok(true);
        }
        if check_metadata
            && property
                .metadata()?
                .entries()
                .iter()
                .any(|entry| entry.visibility.has_authorization(token))
        {
            return Ok(true);
        }
    }
    Ok(false)
}

impl<B: StorageBackend> std::fmt::Debug for Graph<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("config", &self.config)
            .field("search", &self.search.is_some())
            .finish()
    }
}
