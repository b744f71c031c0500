use serde::{Deserialize, Serialize};

use super::PropertyValue;
use crate::error::{GraphError, Result};
use crate::security::{Authorizations, Visibility};

/// Key used when a property is set without an explicit disambiguator.
pub const DEFAULT_PROPERTY_KEY: &str = "";

/// A single metadata value attached to a property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Metadata key.
    pub key: String,
    /// Metadata value.
    pub value: PropertyValue,
    /// Visibility of this entry, independent of the owning property.
    pub visibility: Visibility,
}

/// Bag of metadata entries, unique by `(key, visibility)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    entries: Vec<MetadataEntry>,
}

impl Metadata {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`Metadata::set`].
    pub fn with(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
        visibility: Visibility,
    ) -> Self {
        self.set(key, value, visibility);
        self
    }

    /// Adds an entry, replacing any entry with the same key and visibility.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
        visibility: Visibility,
    ) {
        let key = key.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|e| e.key == key && e.visibility == visibility)
        {
            Some(existing) => existing.value = value,
            None => self.entries.push(MetadataEntry {
                key,
                value,
                visibility,
            }),
        }
    }

    /// First entry stored under `key`.
    pub fn get(&self, key: &str) -> Option<&MetadataEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[MetadataEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy containing only the entries `auths` may read.
    pub fn visible_to(&self, auths: &Authorizations) -> Metadata {
        Metadata {
            entries: self
                .entries
                .iter()
                .filter(|e| auths.can_read(&e.visibility))
                .cloned()
                .collect(),
        }
    }
}

/// A property value on a vertex or edge.
///
/// Names are not unique on an element: the same name may appear several times,
/// distinguished by `key` and by `visibility`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    key: String,
    name: String,
    value: PropertyValue,
    visibility: Visibility,
    timestamp: i64,
    metadata: Option<Metadata>,
}

impl Property {
    /// Creates a property carrying the given metadata.
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        value: PropertyValue,
        visibility: Visibility,
        timestamp: i64,
        metadata: Metadata,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            value,
            visibility,
            timestamp,
            metadata: Some(metadata),
        }
    }

    /// Disambiguating key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property value.
    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    /// Property visibility.
    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    /// Write timestamp in milliseconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Metadata, available only when fetched with
    /// [`crate::FetchHints::PROPERTY_METADATA`].
    pub fn metadata(&self) -> Result<&Metadata> {
        self.metadata.as_ref().ok_or(GraphError::MissingFetchHint {
            hint: "PROPERTY_METADATA",
        })
    }

    /// Whether `(key, name, visibility)` identifies this property.
    pub fn is_same(&self, key: &str, name: &str, visibility: &Visibility) -> bool {
        self.key == key && self.name == name && &self.visibility == visibility
    }

    /// Snapshot for a reader: metadata restricted to `auths`, or dropped
    /// entirely when it was not requested.
    pub(crate) fn redacted(&self, auths: &Authorizations, with_metadata: bool) -> Property {
        Property {
            key: self.key.clone(),
            name: self.name.clone(),
            value: self.value.clone(),
            visibility: self.visibility.clone(),
            timestamp: self.timestamp,
            metadata: if with_metadata {
                self.metadata.as_ref().map(|m| m.visible_to(auths))
            } else {
                None
            },
        }
    }
}
