//! Element model: vertices, edges, properties, metadata and fetch hints.
//!
//! Elements are immutable snapshots taken under one authorization set. They
//! only carry what that reader may observe: properties and metadata entries
//! whose visibility the reader cannot satisfy are removed before the snapshot
//! is handed out.

mod element;
mod fetch_hints;
mod property;
mod summary;
mod value;

pub use element::{Direction, Edge, EdgeInfo, Element, ElementKind, ElementParts, GraphElement, Vertex};
pub use fetch_hints::FetchHints;
pub use property::{Metadata, MetadataEntry, Property, DEFAULT_PROPERTY_KEY};
pub use summary::{Path, RelatedEdge};
pub use value::{GeoCircle, GeoPoint, PropertyValue};
