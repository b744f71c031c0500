//! Fetch hints: how much of an element a read materializes.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Set of capabilities requested when fetching an element.
///
/// Hints are an optimization contract: a backend may materialize more than
/// asked, but accessors that depend on a missing hint fail with
/// [`crate::GraphError::MissingFetchHint`] instead of returning partial data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FetchHints(u8);

impl FetchHints {
    /// Identity only; enough for an existence check.
    pub const NONE: FetchHints = FetchHints(0);
    /// Property values.
    pub const PROPERTIES: FetchHints = FetchHints(1 << 0);
    /// Metadata attached to properties.
    pub const PROPERTY_METADATA: FetchHints = FetchHints(1 << 1);
    /// Incoming edge references of a vertex.
    pub const IN_EDGE_REFS: FetchHints = FetchHints(1 << 2);
    /// Outgoing edge references of a vertex.
    pub const OUT_EDGE_REFS: FetchHints = FetchHints(1 << 3);
    /// Return elements even when they are hidden from the caller.
    pub const INCLUDE_HIDDEN: FetchHints = FetchHints(1 << 4);
    /// Both edge reference directions.
    pub const EDGE_REFS: FetchHints = FetchHints(Self::IN_EDGE_REFS.0 | Self::OUT_EDGE_REFS.0);
    /// Everything except hidden elements.
    pub const ALL: FetchHints = FetchHints(
        Self::PROPERTIES.0 | Self::PROPERTY_METADATA.0 | Self::EDGE_REFS.0,
    );
    /// Everything, hidden elements included.
    pub const ALL_INCLUDING_HIDDEN: FetchHints = FetchHints(Self::ALL.0 | Self::INCLUDE_HIDDEN.0);

    /// Whether every hint in `other` is present.
    pub const fn contains(self, other: FetchHints) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of the two sets.
    pub const fn union(self, other: FetchHints) -> FetchHints {
        FetchHints(self.0 | other.0)
    }

    /// Whether no hint is set.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Whether property values are materialized.
    pub const fn includes_properties(self) -> bool {
        self.contains(Self::PROPERTIES)
    }

    /// Whether property metadata is materialized.
    pub const fn includes_property_metadata(self) -> bool {
        self.contains(Self::PROPERTY_METADATA)
    }

    /// Whether hidden elements should be returned.
    pub const fn includes_hidden(self) -> bool {
        self.contains(Self::INCLUDE_HIDDEN)
    }
}

impl BitOr for FetchHints {
    type Output = FetchHints;

    fn bitor(self, rhs: FetchHints) -> FetchHints {
        self.union(rhs)
    }
}

impl BitOrAssign for FetchHints {
    fn bitor_assign(&mut self, rhs: FetchHints) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for FetchHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(FetchHints, &str); 5] = [
            (FetchHints::PROPERTIES, "PROPERTIES"),
            (FetchHints::PROPERTY_METADATA, "PROPERTY_METADATA"),
            (FetchHints::IN_EDGE_REFS, "IN_EDGE_REFS"),
            (FetchHints::OUT_EDGE_REFS, "OUT_EDGE_REFS"),
            (FetchHints::INCLUDE_HIDDEN, "INCLUDE_HIDDEN"),
        ];
        if self.is_none() {
            return f.write_str("FetchHints(NONE)");
        }
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(hint, _)| self.contains(*hint))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "FetchHints({})", names.join(" | "))
    }
}
