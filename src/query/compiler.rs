//! Translation of query parameters into search requests.
//!
//! Every property name is first expanded into the deflated fields the caller
//! can read. A clause over N fields compiles to the disjunction of N per-field
//! filters, so an element matches when any visibility variant of the property
//! satisfies the clause.

use tracing::trace;

use super::aggregation::AggregationItem;
use super::parameters::{QueryKind, QueryParameters};
use super::predicate::{Compare, Contains, GeoCompare, HasContainer, Predicate, QueryValue, TextPredicate};
use crate::error::{GraphError, Result};
use crate::model::{ElementKind, PropertyValue};
use crate::search::{
    tokenize, Aggregation, DataType, DateInterval, Filter, MoreLikeThis, PropertyDefinition,
    Query, RangeBound, SearchIndex, TermsExecution, ELEMENT_TYPE_FIELD, EXACT_MATCH_SUFFIX,
    GEO_SUFFIX,
};

/// Filters, query and aggregations ready to send.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledQuery {
    /// Conjunctive filters.
    pub filters: Vec<Filter>,
    /// Scoring query.
    pub query: Query,
    /// Aggregations.
    pub aggregations: Vec<Aggregation>,
}

/// Compiles one [`QueryParameters`] against the fields known to an index.
pub struct QueryCompiler<'a> {
    index: &'a dyn SearchIndex,
    parameters: &'a QueryParameters,
}

impl<'a> QueryCompiler<'a> {
    /// A compiler reading field names and definitions from `index`.
    pub fn new(index: &'a dyn SearchIndex, parameters: &'a QueryParameters) -> Self {
        Self { index, parameters }
    }

    /// Compiles everything in one go.
    pub fn compile(
        &self,
        kind: Option<ElementKind>,
        aggregations: &[AggregationItem],
    ) -> Result<CompiledQuery> {
        Ok(CompiledQuery {
            filters: self.compile_filters(kind)?,
            query: self.compile_query()?,
            aggregations: self.compile_aggregations(aggregations)?,
        })
    }

    fn property_names(&self, property: &str) -> Result<Vec<String>> {
        let names = self
            .index
            .matching_property_names(property, self.parameters.authorizations());
        if names.is_empty() {
            return Err(GraphError::NoMatchingProperties {
                property: property.to_owned(),
            });
        }
        trace!(property, fields = ?names, "query.compile.expand");
        Ok(names)
    }

    /// One filter per has-container, plus an element-type filter when
    /// `kind` is set.
    pub fn compile_filters(&self, kind: Option<ElementKind>) -> Result<Vec<Filter>> {
        let mut filters = Vec::with_capacity(self.parameters.has_containers().len() + 1);
        if let Some(kind) = kind {
            filters.push(Filter::Term {
                field: ELEMENT_TYPE_FIELD.to_owned(),
                value: PropertyValue::from(kind.as_str()),
            });
        }
        for container in self.parameters.has_containers() {
            if let Some(filter) = self.compile_container(container)? {
                filters.push(filter);
            }
        }
        Ok(filters)
    }

    fn compile_container(&self, container: &HasContainer) -> Result<Option<Filter>> {
        match container {
            HasContainer::Property { property } => {
                let exists = self
                    .property_names(property)?
                    .into_iter()
                    .map(|field| Filter::Exists { field })
                    .collect();
                Ok(Some(Filter::any_of(exists)))
            }
            HasContainer::NotProperty { property } => {
                let names = self
                    .index
                    .matching_property_names(property, self.parameters.authorizations());
                if names.is_empty() {
                    return Ok(None);
                }
                let exists = names
                    .into_iter()
                    .map(|field| Filter::Exists { field })
                    .collect();
                Ok(Some(Filter::not(Filter::any_of(exists))))
            }
            HasContainer::Value {
                property,
                predicate,
                value,
            } => {
                let definition = self.index.property_definition(property);
                let per_field = self
                    .property_names(property)?
                    .into_iter()
                    .map(|field| value_filter(&field, *predicate, value, definition.as_ref()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(Filter::any_of(per_field)))
            }
        }
    }

    /// The scoring query.
    pub fn compile_query(&self) -> Result<Query> {
        match self.parameters.kind() {
            QueryKind::QueryString(query) => Ok(match query.as_deref().map(str::trim) {
                None | Some("") | Some("*") => Query::MatchAll,
                Some(text) => Query::QueryString {
                    query: text.to_owned(),
                },
            }),
            QueryKind::SimilarToText(similar) => {
                let auths = self.parameters.authorizations();
                let fields: Vec<String> = similar
                    .fields
                    .iter()
                    .flat_map(|field| self.index.matching_property_names(field, auths))
                    .collect();
                if fields.is_empty() {
                    return Err(GraphError::NoMatchingProperties {
                        property: similar.fields.join(","),
                    });
                }
                Ok(Query::MoreLikeThis(MoreLikeThis {
                    fields,
                    like_text: similar.text.clone(),
                    percent_terms_to_match: similar.percent_terms_to_match,
                    min_term_frequency: similar.min_term_frequency,
                    max_query_terms: similar.max_query_terms,
                    min_doc_frequency: similar.min_doc_frequency,
                    max_doc_frequency: similar.max_doc_frequency,
                    boost: similar.boost,
                }))
            }
        }
    }

    /// One backend aggregation per expanded field of each item. Names of
    /// aggregations over visibility-specific fields carry the visibility
    /// hash so their buckets stay apart.
    pub fn compile_aggregations(&self, items: &[AggregationItem]) -> Result<Vec<Aggregation>> {
        let mut aggregations = Vec::new();
        for item in items {
            let definition = self.index.property_definition(item.property());
            for field in self.property_names(item.property())? {
                let name = match self.index.visibility_hash(&field) {
                    Some(hash) => format!("{}_{hash}", item.name()),
                    None => item.name().to_owned(),
                };
                aggregations.push(self.compile_aggregation(item, name, field, definition.as_ref())?);
            }
        }
        Ok(aggregations)
    }

    fn compile_aggregation(
        &self,
        item: &AggregationItem,
        name: String,
        field: String,
        definition: Option<&PropertyDefinition>,
    ) -> Result<Aggregation> {
        match item {
            AggregationItem::GeohashGrid { precision, .. } => Ok(Aggregation::GeohashGrid {
                name,
                field: format!("{field}{GEO_SUFFIX}"),
                precision: *precision,
            }),
            AggregationItem::Terms { .. } => {
                let exact = definition.is_some_and(|d| {
                    d.data_type == DataType::String && d.has_exact_match()
                });
                Ok(Aggregation::Terms {
                    name,
                    field: if exact {
                        format!("{field}{EXACT_MATCH_SUFFIX}")
                    } else {
                        field
                    },
                })
            }
            AggregationItem::Histogram {
                property,
                interval,
                min_doc_count,
                ..
            } => {
                let definition = definition.ok_or_else(|| {
                    GraphError::InvalidArgument(format!(
                        "no property definition for histogram over '{property}'"
                    ))
                })?;
                if definition.data_type.is_date() {
                    Ok(Aggregation::DateHistogram {
                        name,
                        field,
                        interval: DateInterval::parse(interval)?,
                        min_doc_count: *min_doc_count,
                    })
                } else {
                    let width: f64 = interval.trim().parse().map_err(|_| {
                        GraphError::InvalidArgument(format!("invalid histogram interval '{interval}'"))
                    })?;
                    if !(width > 0.0) {
                        return Err(GraphError::InvalidArgument(format!(
                            "invalid histogram interval '{interval}'"
                        )));
                    }
                    Ok(Aggregation::Histogram {
                        name,
                        field,
                        interval: width,
                        min_doc_count: *min_doc_count,
                    })
                }
            }
        }
    }
}

fn exact_field(field: &str) -> String {
    format!("{field}{EXACT_MATCH_SUFFIX}")
}

fn bound(value: &PropertyValue, inclusive: bool) -> Option<RangeBound> {
    Some(RangeBound {
        value: value.clone(),
        inclusive,
    })
}

fn value_filter(
    field: &str,
    predicate: Predicate,
    operand: &QueryValue,
    definition: Option<&PropertyDefinition>,
) -> Result<Filter> {
    match predicate {
        Predicate::Compare(compare) => {
            let QueryValue::Scalar(value) = operand else {
                return Err(GraphError::UnsupportedPredicate(format!(
                    "{predicate} does not accept a list"
                )));
            };
            let field = if value.is_string() {
                exact_field(field)
            } else {
                field.to_owned()
            };
            let range = |lower, upper| Filter::Range {
                field: field.clone(),
                lower,
                upper,
            };
            Ok(match compare {
                Compare::Equal => match value {
                    PropertyValue::DateOnly(_) => range(bound(value, true), bound(value, true)),
                    _ => Filter::Term {
                        field: field.clone(),
                        value: value.clone(),
                    },
                },
                Compare::NotEqual => Filter::not(Filter::Terms {
                    field: field.clone(),
                    values: vec![value.clone()],
                    execution: TermsExecution::Or,
                }),
                Compare::GreaterThan => range(bound(value, false), None),
                Compare::GreaterThanEqual => range(bound(value, true), None),
                Compare::LessThan => range(None, bound(value, false)),
                Compare::LessThanEqual => range(None, bound(value, true)),
            })
        }
        Predicate::Contains(contains) => {
            let values = operand.values().to_vec();
            let field = if values.iter().any(PropertyValue::is_string) {
                exact_field(field)
            } else {
                field.to_owned()
            };
            let terms = Filter::Terms {
                field,
                values,
                execution: TermsExecution::Or,
            };
            Ok(match contains {
                Contains::In => terms,
                Contains::NotIn => Filter::not(terms),
            })
        }
        Predicate::Text(TextPredicate::Contains) => {
            let QueryValue::Scalar(value) = operand else {
                return Err(GraphError::UnsupportedPredicate(format!(
                    "{predicate} does not accept a list"
                )));
            };
            let Some(text) = value.as_str() else {
                return Ok(Filter::Term {
                    field: field.to_owned(),
                    value: value.clone(),
                });
            };
            let lowered = text.to_lowercase();
            let mut terms = tokenize(&lowered);
            Ok(match terms.len() {
                0 => Filter::Term {
                    field: field.to_owned(),
                    value: PropertyValue::String(lowered),
                },
                1 => Filter::Term {
                    field: field.to_owned(),
                    value: PropertyValue::String(terms.remove(0)),
                },
                _ => Filter::Terms {
                    field: field.to_owned(),
                    values: terms.into_iter().map(PropertyValue::String).collect(),
                    execution: TermsExecution::And,
                },
            })
        }
        Predicate::Geo(GeoCompare::Within) => {
            let QueryValue::Scalar(PropertyValue::GeoCircle(circle)) = operand else {
                return Err(GraphError::UnsupportedPredicate(format!(
                    "{predicate} needs a geo circle, got {}",
                    describe(operand)
                )));
            };
            let is_shape = definition.is_some_and(|d| d.data_type == DataType::GeoShape);
            Ok(if is_shape {
                Filter::GeoShape {
                    field: format!("{field}{GEO_SUFFIX}"),
                    shape: *circle,
                }
            } else {
                Filter::GeoDistance {
                    field: format!("{field}{GEO_SUFFIX}"),
                    center: circle.center(),
                    distance_km: circle.radius_km,
                }
            })
        }
    }
}

fn describe(operand: &QueryValue) -> &'static str {
    match operand {
        QueryValue::Scalar(value) => value.type_name(),
        QueryValue::List(_) => "list",
    }
}
