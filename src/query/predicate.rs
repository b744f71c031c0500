//! Abstract predicates and their in-memory evaluation.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::model::{Element, PropertyValue};
use crate::search::tokenize;

/// Equality and ordering comparisons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compare {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEqual,
}

/// Set membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contains {
    /// Value is one of the list.
    In,
    /// Value is none of the list.
    NotIn,
}

/// Full-text predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPredicate {
    /// Every token of the value occurs in the property.
    Contains,
}

/// Geospatial predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoCompare {
    /// Property lies within a circle.
    Within,
}

/// Closed set of predicate operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Predicate {
    /// Comparison.
    Compare(Compare),
    /// Containment.
    Contains(Contains),
    /// Text search.
    Text(TextPredicate),
    /// Geospatial containment.
    Geo(GeoCompare),
}

impl From<Compare> for Predicate {
    fn from(value: Compare) -> Self {
        Predicate::Compare(value)
    }
}

impl From<Contains> for Predicate {
    fn from(value: Contains) -> Self {
        Predicate::Contains(value)
    }
}

impl From<TextPredicate> for Predicate {
    fn from(value: TextPredicate) -> Self {
        Predicate::Text(value)
    }
}

impl From<GeoCompare> for Predicate {
    fn from(value: GeoCompare) -> Self {
        Predicate::Geo(value)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare(c) => write!(f, "{c:?}"),
            Predicate::Contains(c) => write!(f, "{c:?}"),
            Predicate::Text(t) => write!(f, "Text{t:?}"),
            Predicate::Geo(g) => write!(f, "Geo{g:?}"),
        }
    }
}

/// Right-hand side of a predicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum QueryValue {
    /// A single value.
    Scalar(PropertyValue),
    /// A list, for containment.
    List(Vec<PropertyValue>),
}

impl QueryValue {
    /// Values as a slice; a scalar is a one-element list.
    pub fn values(&self) -> &[PropertyValue] {
        match self {
            QueryValue::Scalar(value) => std::slice::from_ref(value),
            QueryValue::List(values) => values,
        }
    }
}

impl From<PropertyValue> for QueryValue {
    fn from(value: PropertyValue) -> Self {
        QueryValue::Scalar(value)
    }
}

impl From<Vec<PropertyValue>> for QueryValue {
    fn from(values: Vec<PropertyValue>) -> Self {
        QueryValue::List(values)
    }
}

/// One clause of a query. Clauses in a query are combined with AND.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum HasContainer {
    /// `property <predicate> value`.
    Value {
        /// Property name.
        property: String,
        /// Operator.
        predicate: Predicate,
        /// Operand.
        value: QueryValue,
    },
    /// The element has a visible value for `property`.
    Property {
        /// Property name.
        property: String,
    },
    /// The element has no visible value for `property`.
    NotProperty {
        /// Property name.
        property: String,
    },
}

impl HasContainer {
    /// Property the clause constrains.
    pub fn property(&self) -> &str {
        match self {
            HasContainer::Value { property, .. }
            | HasContainer::Property { property }
            | HasContainer::NotProperty { property } => property,
        }
    }

    /// Evaluates the clause against the properties visible on `element`.
    ///
    /// Negative operators (`NotEqual`, `NotIn`) hold when no visible value
    /// matches, including when the property is absent, which is how the
    /// compiled negated filters behave.
    pub fn is_match(&self, element: &dyn Element) -> Result<bool> {
        let properties = element.properties_named(self.property())?;
        let values: Vec<&PropertyValue> = properties.iter().map(|p| p.value()).collect();
        match self {
            HasContainer::Property { .. } => Ok(!values.is_empty()),
            HasContainer::NotProperty { .. } => Ok(values.is_empty()),
            HasContainer::Value {
                predicate, value, ..
            } => evaluate(*predicate, &values, value),
        }
    }
}

fn evaluate(predicate: Predicate, values: &[&PropertyValue], operand: &QueryValue) -> Result<bool> {
    match predicate {
        Predicate::Compare(compare) => {
            let QueryValue::Scalar(expected) = operand else {
                return Err(GraphError::UnsupportedPredicate(format!(
                    "{compare:?} needs a single value"
                )));
            };
            Ok(match compare {
                Compare::NotEqual => !values.iter().any(|v| v.matches(expected)),
                _ => values.iter().any(|v| {
                    v.compare(expected)
                        .is_some_and(|ordering| compare_holds(compare, ordering))
                }),
            })
        }
        Predicate::Contains(contains) => {
            let candidates = operand.values();
            let any = values
                .iter()
                .any(|v| candidates.iter().any(|c| v.matches(c)));
            Ok(match contains {
                Contains::In => any,
                Contains::NotIn => !any,
            })
        }
        Predicate::Text(TextPredicate::Contains) => {
            let QueryValue::Scalar(expected) = operand else {
                return Err(GraphError::UnsupportedPredicate(
                    "text containment needs a single value".into(),
                ));
            };
            Ok(match expected {
                PropertyValue::String(text) => {
                    let wanted = tokenize(text);
                    values.iter().any(|v| match v.as_str() {
                        Some(haystack) if wanted.is_empty() => {
                            haystack.to_lowercase().contains(&text.to_lowercase())
                        }
                        Some(haystack) => {
                            let present: HashSet<String> = tokenize(haystack).into_iter().collect();
                            wanted.iter().all(|token| present.contains(token))
                        }
                        None => false,
                    })
                }
                other => values.iter().any(|v| v.matches(other)),
            })
        }
        Predicate::Geo(GeoCompare::Within) => {
            let circle = match operand {
                QueryValue::Scalar(PropertyValue::GeoCircle(circle)) => circle,
                _ => {
                    return Err(GraphError::UnsupportedPredicate(
                        "geo within needs a circle".into(),
                    ))
                }
            };
            Ok(values.iter().any(|v| match v {
                PropertyValue::GeoPoint(point) => circle.contains(point),
                PropertyValue::GeoCircle(other) => circle.intersects(other),
                _ => false,
            }))
        }
    }
}

fn compare_holds(compare: Compare, ordering: Ordering) -> bool {
    match compare {
        Compare::Equal => ordering == Ordering::Equal,
        Compare::NotEqual => ordering != Ordering::Equal,
        Compare::GreaterThan => ordering == Ordering::Greater,
        Compare::GreaterThanEqual => ordering != Ordering::Less,
        Compare::LessThan => ordering == Ordering::Less,
        Compare::LessThanEqual => ordering != Ordering::Greater,
    }
}

/// In-memory query-string evaluation: `*` or blank matches everything,
/// otherwise some visible string property must contain the query text,
/// ignoring case.
pub fn query_string_matches(query: Option<&str>, element: &dyn Element) -> Result<bool> {
    let query = match query.map(str::trim) {
        None | Some("") | Some("*") => return Ok(true),
        Some(query) => query.to_lowercase(),
    };
    Ok(element
        .properties()?
        .iter()
        .filter_map(|p| p.value().as_str())
        .any(|text| text.to_lowercase().contains(&query)))
}
