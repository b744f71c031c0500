use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A graph-level metadata key and its JSON value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphMetadataEntry {
    /// Metadata key.
    pub key: String,
    /// Stored value.
    pub value: Value,
}

/// Key/value store for graph-wide settings such as schema versions.
pub trait GraphMetadataStore: Send + Sync {
    /// Value stored under `key`.
    fn get(&self, key: &str) -> Option<Value>;
    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value);
    /// Every entry in key order.
    fn entries(&self) -> Vec<GraphMetadataEntry>;

    /// Entries whose key starts with `prefix`.
    fn entries_with_prefix(&self, prefix: &str) -> Vec<GraphMetadataEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.key.starts_with(prefix))
            .collect()
    }
}

/// Process-local [`GraphMetadataStore`].
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl GraphMetadataStore for InMemoryMetadataStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.write().insert(key.to_owned(), value);
    }

    fn entries(&self) -> Vec<GraphMetadataEntry> {
        self.entries
            .read()
            .iter()
            .map(|(key, value)| GraphMetadataEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }

    fn entries_with_prefix(&self, prefix: &str) -> Vec<GraphMetadataEntry> {
        self.entries
            .read()
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| GraphMetadataEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }
}
