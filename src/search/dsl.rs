//! Backend query objects produced by the compiler.
//!
//! These mirror the filter, query and aggregation primitives of a document
//! search engine. They serialize to JSON for request tracing.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::model::{GeoCircle, GeoPoint, PropertyValue};

/// How a terms filter combines its values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermsExecution {
    /// Any value present.
    Or,
    /// Every value present.
    And,
}

/// One side of a range filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeBound {
    /// Bound value.
    pub value: PropertyValue,
    /// Whether the bound itself is included.
    pub inclusive: bool,
}

/// A boolean document filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Field holds `value`.
    Term {
        /// Field name.
        field: String,
        /// Expected value.
        value: PropertyValue,
    },
    /// Field holds the given values, combined per `execution`.
    Terms {
        /// Field name.
        field: String,
        /// Candidate values.
        values: Vec<PropertyValue>,
        /// Combination mode.
        execution: TermsExecution,
    },
    /// Field holds a value inside the bounds.
    Range {
        /// Field name.
        field: String,
        /// Lower bound.
        lower: Option<RangeBound>,
        /// Upper bound.
        upper: Option<RangeBound>,
    },
    /// Field holds any value.
    Exists {
        /// Field name.
        field: String,
    },
    /// Geo-point field lies within `distance_km` of `center`.
    GeoDistance {
        /// Field name.
        field: String,
        /// Circle center.
        center: GeoPoint,
        /// Radius in kilometers.
        distance_km: f64,
    },
    /// Geo-shape field intersects `shape`.
    GeoShape {
        /// Field name.
        field: String,
        /// Query circle.
        shape: GeoCircle,
    },
    /// Negation.
    Not(Box<Filter>),
    /// Disjunction.
    Or(Vec<Filter>),
    /// Conjunction.
    And(Vec<Filter>),
}

impl Filter {
    /// Negates `filter`.
    pub fn not(filter: Filter) -> Filter {
        Filter::Not(Box::new(filter))
    }

    /// Disjunction that collapses to its only member when there is one.
    pub fn any_of(mut filters: Vec<Filter>) -> Filter {
        if filters.len() == 1 {
            filters.remove(0)
        } else {
            Filter::Or(filters)
        }
    }
}

/// Options of a more-like-this query. Unset options use backend defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MoreLikeThis {
    /// Fields to compare against.
    pub fields: Vec<String>,
    /// Reference text.
    pub like_text: String,
    /// Fraction of query terms a document must contain.
    pub percent_terms_to_match: Option<f32>,
    /// Minimum frequency of a term in the reference text.
    pub min_term_frequency: Option<u32>,
    /// Maximum number of query terms kept.
    pub max_query_terms: Option<u32>,
    /// Minimum number of documents a term must appear in.
    pub min_doc_frequency: Option<u32>,
    /// Maximum number of documents a term may appear in.
    pub max_doc_frequency: Option<u32>,
    /// Relevance boost.
    pub boost: Option<f32>,
}

/// A scoring query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// Every document, equal score.
    MatchAll,
    /// Backend-native query string.
    QueryString {
        /// Query text.
        query: String,
    },
    /// Documents similar to a reference text.
    MoreLikeThis(MoreLikeThis),
}

/// Calendar unit of a date histogram interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateUnit {
    /// Seconds.
    Second,
    /// Minutes.
    Minute,
    /// Hours.
    Hour,
    /// Days.
    Day,
    /// Weeks.
    Week,
    /// Months, bucketed as 30 days.
    Month,
    /// Years, bucketed as 365 days.
    Year,
}

impl DateUnit {
    fn millis(self) -> i64 {
        const SECOND: i64 = 1_000;
        match self {
            DateUnit::Second => SECOND,
            DateUnit::Minute => 60 * SECOND,
            DateUnit::Hour => 3_600 * SECOND,
            DateUnit::Day => 86_400 * SECOND,
            DateUnit::Week => 7 * 86_400 * SECOND,
            DateUnit::Month => 30 * 86_400 * SECOND,
            DateUnit::Year => 365 * 86_400 * SECOND,
        }
    }
}

/// Date histogram bucket width, e.g. `1d` or `6h`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateInterval {
    /// Number of units per bucket.
    pub amount: u32,
    /// Unit.
    pub unit: DateUnit,
}

impl DateInterval {
    /// Parses `"<n><unit>"` (units `s m h d w M y`) or a bare unit word such
    /// as `"day"`.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let unit_by_word = match text {
            "second" => Some(DateUnit::Second),
            "minute" => Some(DateUnit::Minute),
            "hour" => Some(DateUnit::Hour),
            "day" => Some(DateUnit::Day),
            "week" => Some(DateUnit::Week),
            "month" => Some(DateUnit::Month),
            "year" => Some(DateUnit::Year),
            _ => None,
        };
        if let Some(unit) = unit_by_word {
            return Ok(DateInterval { amount: 1, unit });
        }
        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| GraphError::InvalidArgument(format!("invalid date interval '{text}'")))?;
        let (amount, unit) = text.split_at(split);
        let amount: u32 = amount
            .parse()
            .map_err(|_| GraphError::InvalidArgument(format!("invalid date interval '{text}'")))?;
        let unit = match unit {
            "s" => DateUnit::Second,
            "m" => DateUnit::Minute,
            "h" => DateUnit::Hour,
            "d" => DateUnit::Day,
            "w" => DateUnit::Week,
            "M" => DateUnit::Month,
            "y" => DateUnit::Year,
            _ => {
                return Err(GraphError::InvalidArgument(format!(
                    "invalid date interval unit '{unit}'"
                )))
            }
        };
        if amount == 0 || i64::from(amount).checked_mul(unit.millis()).is_none() {
            return Err(GraphError::InvalidArgument(format!(
                "invalid date interval '{text}'"
            )));
        }
        Ok(DateInterval { amount, unit })
    }

    /// Bucket width in milliseconds, saturating at `i64::MAX`.
    pub fn millis(&self) -> i64 {
        i64::from(self.amount.max(1)).saturating_mul(self.unit.millis())
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            DateUnit::Second => "s",
            DateUnit::Minute => "m",
            DateUnit::Hour => "h",
            DateUnit::Day => "d",
            DateUnit::Week => "w",
            DateUnit::Month => "M",
            DateUnit::Year => "y",
        };
        write!(f, "{}{unit}", self.amount)
    }
}

/// A bucketing aggregation over one field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Buckets geo points by geohash cell.
    GeohashGrid {
        /// Result name.
        name: String,
        /// Field name.
        field: String,
        /// Geohash length.
        precision: u8,
    },
    /// One bucket per distinct value.
    Terms {
        /// Result name.
        name: String,
        /// Field name.
        field: String,
    },
    /// Fixed-width numeric buckets.
    Histogram {
        /// Result name.
        name: String,
        /// Field name.
        field: String,
        /// Bucket width.
        interval: f64,
        /// Buckets below this count are dropped.
        min_doc_count: Option<u64>,
    },
    /// Fixed-width time buckets.
    DateHistogram {
        /// Result name.
        name: String,
        /// Field name.
        field: String,
        /// Bucket width.
        interval: DateInterval,
        /// Buckets below this count are dropped.
        min_doc_count: Option<u64>,
    },
}

impl Aggregation {
    /// Result name.
    pub fn name(&self) -> &str {
        match self {
            Aggregation::GeohashGrid { name, .. }
            | Aggregation::Terms { name, .. }
            | Aggregation::Histogram { name, .. }
            | Aggregation::DateHistogram { name, .. } => name,
        }
    }

    /// Target field.
    pub fn field(&self) -> &str {
        match self {
            Aggregation::GeohashGrid { field, .. }
            | Aggregation::Terms { field, .. }
            | Aggregation::Histogram { field, .. }
            | Aggregation::DateHistogram { field, .. } => field,
        }
    }
}

/// A terms bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TermsBucket {
    /// Bucket value.
    pub key: PropertyValue,
    /// Documents in the bucket.
    pub count: u64,
}

/// A histogram bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Lower edge of the bucket; milliseconds for date histograms.
    pub key: f64,
    /// Documents in the bucket.
    pub count: u64,
}

/// A geohash cell bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeohashBucket {
    /// Geohash of the cell.
    pub geohash: String,
    /// Points in the cell.
    pub count: u64,
}

/// Buckets computed for one aggregation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationResult {
    /// Terms buckets, largest first.
    Terms(Vec<TermsBucket>),
    /// Histogram buckets in key order.
    Histogram(Vec<HistogramBucket>),
    /// Geohash buckets, largest first.
    GeohashGrid(Vec<GeohashBucket>),
}

/// Aggregation results keyed by aggregation name.
pub type AggregationResults = BTreeMap<String, AggregationResult>;
