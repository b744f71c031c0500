use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::model::ElementKind;
use crate::security::Visibility;

/// Structured notification emitted after a successful mutation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GraphEvent {
    /// A vertex was created or updated.
    AddVertex {
        /// Vertex id.
        vertex_id: String,
    },
    /// An edge was created or updated.
    AddEdge {
        /// Edge id.
        edge_id: String,
        /// Edge label.
        label: String,
        /// Tail vertex id.
        out_vertex_id: String,
        /// Head vertex id.
        in_vertex_id: String,
    },
    /// A property was written on an element.
    AddProperty {
        /// Owning element kind.
        kind: ElementKind,
        /// Owning element id.
        element_id: String,
        /// Property key.
        key: String,
        /// Property name.
        name: String,
    },
    /// A property was removed from an element.
    RemoveProperty {
        /// Owning element kind.
        kind: ElementKind,
        /// Owning element id.
        element_id: String,
        /// Property key.
        key: String,
        /// Property name.
        name: String,
    },
    /// A vertex was deleted.
    DeleteVertex {
        /// Vertex id.
        vertex_id: String,
    },
    /// An edge was deleted.
    DeleteEdge {
        /// Edge id.
        edge_id: String,
    },
    /// A vertex was soft-deleted.
    SoftDeleteVertex {
        /// Vertex id.
        vertex_id: String,
        /// Soft-delete timestamp in milliseconds.
        timestamp: i64,
    },
    /// An edge was soft-deleted.
    SoftDeleteEdge {
        /// Edge id.
        edge_id: String,
        /// Soft-delete timestamp in milliseconds.
        timestamp: i64,
    },
    /// An element was hidden under a hiding visibility.
    MarkHidden {
        /// Element kind.
        kind: ElementKind,
        /// Element id.
        element_id: String,
        /// Hiding visibility.
        visibility: Visibility,
    },
    /// A hiding visibility was lifted from an element.
    MarkVisible {
        /// Element kind.
        kind: ElementKind,
        /// Element id.
        element_id: String,
        /// Hiding visibility that was removed.
        visibility: Visibility,
    },
}

/// Receives graph events synchronously on the mutating thread.
pub trait GraphEventListener: Send + Sync {
    /// Called once per event, in mutation order.
    fn on_event(&self, event: &GraphEvent);
}

impl<F> GraphEventListener for F
where
    F: Fn(&GraphEvent) + Send + Sync,
{
    fn on_event(&self, event: &GraphEvent) {
        self(event)
    }
}

/// Copy-on-write listener list: registration swaps in a new snapshot, emission
/// iterates whatever snapshot it grabbed without holding the lock.
#[derive(Default)]
pub(crate) struct EventListeners {
    snapshot: RwLock<Arc<Vec<Arc<dyn GraphEventListener>>>>,
}

impl EventListeners {
    pub(crate) fn register(&self, listener: Arc<dyn GraphEventListener>) {
        let mut guard = self.snapshot.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(listener);
        *guard = Arc::new(next);
    }

    pub(crate) fn has_listeners(&self) -> bool {
        !self.snapshot.read().is_empty()
    }

    pub(crate) fn emit(&self, event: GraphEvent) {
        let listeners = Arc::clone(&self.snapshot.read());
        for listener in listeners.iter() {
            listener.on_event(&event);
        }
    }
}
