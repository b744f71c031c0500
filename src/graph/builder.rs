use super::backend::{PropertyRemoval, StagedElement, StorageBackend};
use super::Graph;
use crate::error::Result;
use crate::model::{Edge, Metadata, Property, PropertyValue, Vertex, DEFAULT_PROPERTY_KEY};
use crate::search::{DataType, PropertyDefinition, TextIndexHint};
use crate::security::{Authorizations, Visibility};

#[derive(Clone, Debug)]
struct PendingProperty {
    key: String,
    name: String,
    value: PropertyValue,
    visibility: Visibility,
    metadata: Metadata,
    timestamp: Option<i64>,
}

/// Properties and removals staged on a builder.
#[derive(Clone, Debug)]
struct Staging {
    id: String,
    visibility: Visibility,
    timestamp: i64,
    properties: Vec<PendingProperty>,
    removals: Vec<PropertyRemoval>,
}

impl Staging {
    fn new(id: String, visibility: Visibility, timestamp: i64) -> Self {
        Self {
            id,
            visibility,
            timestamp,
            properties: Vec::new(),
            removals: Vec::new(),
        }
    }

    fn add(
        &mut self,
        key: impl Into<String>,
        name: impl Into<String>,
        value: PropertyValue,
        metadata: Metadata,
        timestamp: Option<i64>,
        visibility: Visibility,
    ) {
        let key = key.into();
        let name = name.into();
        self.properties
            .retain(|p| !(p.key == key && p.name == name && p.visibility == visibility));
        self.properties.push(PendingProperty {
            key,
            name,
            value,
            visibility,
            metadata,
            timestamp,
        });
    }

    fn remove(&mut self, key: impl Into<String>, name: impl Into<String>) {
        let removal = PropertyRemoval {
            key: key.into(),
            name: name.into(),
        };
        self.properties
            .retain(|p| !(p.key == removal.key && p.name == removal.name));
        if !self.removals.contains(&removal) {
            self.removals.push(removal);
        }
    }

    fn into_staged(self) -> StagedElement {
        let timestamp = self.timestamp;
        StagedElement {
            id: self.id,
            visibility: self.visibility,
            timestamp,
            properties: self
                .properties
                .into_iter()
                .map(|p| {
                    Property::new(
                        p.key,
                        p.name,
                        p.value,
                        p.visibility,
                        p.timestamp.unwrap_or(timestamp),
                        p.metadata,
                    )
                })
                .collect(),
            removals: self.removals,
        }
    }
}

/// Stages a vertex write; nothing is persisted until [`VertexBuilder::save`].
#[must_use = "builders do nothing until saved"]
pub struct VertexBuilder<'g, B: StorageBackend> {
    graph: &'g Graph<B>,
    staging: Staging,
}

impl<'g, B: StorageBackend> VertexBuilder<'g, B> {
    pub(crate) fn new(graph: &'g Graph<B>, id: String, visibility: Visibility, timestamp: i64) -> Self {
        Self {
            graph,
            staging: Staging::new(id, visibility, timestamp),
        }
    }

    /// Id the vertex will be saved under.
    pub fn id(&self) -> &str {
        &self.staging.id
    }

    /// Sets a property under the default key.
    pub fn set_property(
        self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
        visibility: Visibility,
    ) -> Self {
        self.add_property(DEFAULT_PROPERTY_KEY, name, value, visibility)
    }

    /// Adds a property value disambiguated by `key`.
    pub fn add_property(
        self,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
        visibility: Visibility,
    ) -> Self {
        self.add_property_with_metadata(key, name, value, Metadata::new(), visibility)
    }

    /// Adds a property value carrying metadata.
    pub fn add_property_with_metadata(
        mut self,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
        metadata: Metadata,
        visibility: Visibility,
    ) -> Self {
        self.staging
            .add(key, name, value.into(), metadata, None, visibility);
        self
    }

    /// Adds a property value with its own write timestamp.
    pub fn add_property_at(
        mut self,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
        timestamp: i64,
        visibility: Visibility,
    ) -> Self {
        self.staging.add(
            key,
            name,
            value.into(),
            Metadata::new(),
            Some(timestamp),
            visibility,
        );
        self
    }

    /// Removes every value of `(key, name)` the writer can see.
    pub fn remove_property(mut self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.staging.remove(key, name);
        self
    }

    /// Persists the staged vertex and returns it as the writer sees it.
    pub fn save(self, auths: &Authorizations) -> Result<Vertex> {
        self.graph.save_vertex(self.staging.into_staged(), auths)
    }
}

/// Stages an edge write; nothing is persisted until [`EdgeBuilder::save`].
#[must_use = "builders do nothing until saved"]
pub struct EdgeBuilder<'g, B: StorageBackend> {
    graph: &'g Graph<B>,
    staging: Staging,
    label: String,
    out_vertex_id: String,
    in_vertex_id: String,
}

impl<'g, B: StorageBackend> EdgeBuilder<'g, B> {
    pub(crate) fn new(
        graph: &'g Graph<B>,
        id: String,
        out_vertex_id: String,
        in_vertex_id: String,
        label: String,
        visibility: Visibility,
        timestamp: i64,
    ) -> Self {
        Self {
            graph,
            staging: Staging::new(id, visibility, timestamp),
            label,
            out_vertex_id,
            in_vertex_id,
        }
    }

    /// Id the edge will be saved under.
    pub fn id(&self) -> &str {
        &self.staging.id
    }

    /// Sets a property under the default key.
    pub fn set_property(
        self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
        visibility: Visibility,
    ) -> Self {
        self.add_property(DEFAULT_PROPERTY_KEY, name, value, visibility)
    }

    /// Adds a property value disambiguated by `key`.
    pub fn add_property(
        self,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
        visibility: Visibility,
    ) -> Self {
        self.add_property_with_metadata(key, name, value, Metadata::new(), visibility)
    }

    /// Adds a property value carrying metadata.
    pub fn add_property_with_metadata(
        mut self,
        key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
        metadata: Metadata,
        visibility: Visibility,
    ) -> Self {
        self.staging
            .add(key, name, value.into(), metadata, None, visibility);
        self
    }

    /// Removes every value of `(key, name)` the writer can see.
    pub fn remove_property(mut self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.staging.remove(key, name);
        self
    }

    /// Persists the staged edge and returns it as the writer sees it.
    pub fn save(self, auths: &Authorizations) -> Result<Edge> {
        self.graph.save_edge(
            self.staging.into_staged(),
            self.label,
            self.out_vertex_id,
            self.in_vertex_id,
            auths,
        )
    }
}

/// Declares how a property is indexed.
#[must_use = "definitions do nothing until defined"]
pub struct DefinePropertyBuilder<'g, B: StorageBackend> {
    graph: &'g Graph<B>,
    definition: PropertyDefinition,
}

impl<'g, B: StorageBackend> DefinePropertyBuilder<'g, B> {
    pub(crate) fn new(graph: &'g Graph<B>, name: String) -> Self {
        Self {
            graph,
            definition: PropertyDefinition::new(name, DataType::String),
        }
    }

    /// Value type stored under the property.
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.definition.data_type = data_type;
        self
    }

    /// Replaces the text index hints; only meaningful for string properties.
    pub fn text_index_hints(mut self, hints: impl IntoIterator<Item = TextIndexHint>) -> Self {
        self.definition.text_index_hints.clear();
        for hint in hints {
            if !self.definition.text_index_hints.contains(&hint) {
                self.definition.text_index_hints.push(hint);
            }
        }
        self
    }

    /// Relevance boost applied by the search backend.
    pub fn boost(mut self, boost: f64) -> Self {
        self.definition.boost = Some(boost);
        self
    }

    /// Registers the definition with the graph and its search index.
    pub fn define(self) -> Result<PropertyDefinition> {
        self.graph.register_property_definition(self.definition)
    }
}
