/// Default geohash length of a geohash-grid aggregation.
pub const DEFAULT_GEOHASH_PRECISION: u8 = 5;

/// An aggregation requested on a query, expressed over property names.
#[derive(Clone, Debug, PartialEq)]
pub enum AggregationItem {
    /// Count geo points per geohash cell.
    GeohashGrid {
        /// Result name.
        name: String,
        /// Property name.
        property: String,
        /// Geohash length.
        precision: u8,
    },
    /// Count elements per distinct value.
    Terms {
        /// Result name.
        name: String,
        /// Property name.
        property: String,
    },
    /// Count elements per fixed-width bucket. The interval is a number for
    /// numeric properties and a duration such as `1d` for date properties.
    Histogram {
        /// Result name.
        name: String,
        /// Property name.
        property: String,
        /// Bucket width.
        interval: String,
        /// Buckets below this count are dropped.
        min_doc_count: Option<u64>,
    },
}

impl AggregationItem {
    /// Geohash grid with the default precision.
    pub fn geohash(name: impl Into<String>, property: impl Into<String>) -> Self {
        AggregationItem::GeohashGrid {
            name: name.into(),
            property: property.into(),
            precision: DEFAULT_GEOHASH_PRECISION,
        }
    }

    /// Terms buckets.
    pub fn terms(name: impl Into<String>, property: impl Into<String>) -> Self {
        AggregationItem::Terms {
            name: name.into(),
            property: property.into(),
        }
    }

    /// Histogram buckets.
    pub fn histogram(
        name: impl Into<String>,
        property: impl Into<String>,
        interval: impl Into<String>,
    ) -> Self {
        AggregationItem::Histogram {
            name: name.into(),
            property: property.into(),
            interval: interval.into(),
            min_doc_count: None,
        }
    }

    /// Result name.
    pub fn name(&self) -> &str {
        match self {
            AggregationItem::GeohashGrid { name, .. }
            | AggregationItem::Terms { name, .. }
            | AggregationItem::Histogram { name, .. } => name,
        }
    }

    /// Aggregated property.
    pub fn property(&self) -> &str {
        match self {
            AggregationItem::GeohashGrid { property, .. }
            | AggregationItem::Terms { property, .. }
            | AggregationItem::Histogram { property, .. } => property,
        }
    }
}
