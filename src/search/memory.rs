//! In-process search index.
//!
//! Documents are stored per index name and every request is answered by a
//! linear pass over the targeted indices. Like a real document search engine
//! it applies no security: it stores every property it is given and answers
//! purely on field contents.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::analyzer::tokenize;
use super::definition::{DataType, PropertyDefinition};
use super::deflate::{DeflatedNames, ELEMENT_TYPE_FIELD, EXACT_MATCH_SUFFIX, GEO_SUFFIX};
use super::dsl::{
    Aggregation, AggregationResult, AggregationResults, Filter, GeohashBucket, HistogramBucket,
    MoreLikeThis, Query, RangeBound, TermsBucket, TermsExecution,
};
use super::index::{IndexedElement, SearchError, SearchHit, SearchIndex, SearchRequest, SearchResponse};
use crate::model::{ElementKind, GeoCircle, GeoPoint, Property, PropertyValue};
use crate::security::Authorizations;

const DEFAULT_PERCENT_TERMS_TO_MATCH: f32 = 0.3;
const DEFAULT_MAX_QUERY_TERMS: u32 = 25;
const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Clone, Debug)]
struct Document {
    kind: ElementKind,
    id: String,
    properties: Vec<Property>,
}

#[derive(Default)]
struct IndexState {
    indices: FxHashMap<String, FxHashMap<(ElementKind, String), Document>>,
    names: DeflatedNames,
    definitions: FxHashMap<String, PropertyDefinition>,
}

#[derive(Clone, Copy)]
enum FieldVariant {
    Analyzed,
    Exact,
    Geo,
}

impl IndexState {
    fn resolve<'f>(&self, field: &'f str) -> Option<(&'f str, FieldVariant)> {
        if self.names.inflate(field).is_some() {
            return Some((field, FieldVariant::Analyzed));
        }
        if let Some(base) = field.strip_suffix(EXACT_MATCH_SUFFIX) {
            if self.names.inflate(base).is_some() {
                return Some((base, FieldVariant::Exact));
            }
        }
        if let Some(base) = field.strip_suffix(GEO_SUFFIX) {
            if self.names.inflate(base).is_some() {
                return Some((base, FieldVariant::Geo));
            }
        }
        None
    }

    fn field_values(&self, doc: &Document, field: &str) -> Vec<PropertyValue> {
        if field == ELEMENT_TYPE_FIELD {
            return vec![PropertyValue::from(doc.kind.as_str())];
        }
        let Some((base, variant)) = self.resolve(field) else {
            return Vec::new();
        };
        let Some((name, visibility)) = self.names.inflate(base) else {
            return Vec::new();
        };
        let definition = self.definitions.get(name);
        let full_text = definition.map_or(true, PropertyDefinition::has_full_text);
        let exact = definition.map_or(true, PropertyDefinition::has_exact_match);

        let mut values = Vec::new();
        for property in doc
            .properties
            .iter()
            .filter(|p| p.name() == name && p.visibility() == visibility)
        {
            match (variant, property.value()) {
                (FieldVariant::Analyzed, PropertyValue::String(text)) => {
                    if full_text {
                        values.extend(tokenize(text).into_iter().map(PropertyValue::String));
                    }
                }
                (FieldVariant::Analyzed, PropertyValue::Bytes(_)) => {}
                (FieldVariant::Analyzed, other) => values.push(other.clone()),
                (FieldVariant::Exact, PropertyValue::String(text)) => {
                    if exact {
                        values.push(PropertyValue::String(text.clone()));
                    }
                }
                (FieldVariant::Exact, _) => {}
                (FieldVariant::Geo, value @ (PropertyValue::GeoPoint(_) | PropertyValue::GeoCircle(_))) => {
                    values.push(value.clone())
                }
                (FieldVariant::Geo, _) => {}
            }
        }
        values
    }

    fn all_tokens(&self, doc: &Document) -> HashSet<String> {
        doc.properties
            .iter()
            .filter_map(|p| p.value().as_str())
            .flat_map(tokenize)
            .collect()
    }

    fn field_tokens(&self, doc: &Document, fields: &[String]) -> HashSet<String> {
        fields
            .iter()
            .flat_map(|field| self.field_values(doc, field))
            .filter_map(|value| match value {
                PropertyValue::String(token) => Some(token),
                _ => None,
            })
            .collect()
    }

    fn matches(&self, doc: &Document, filter: &Filter) -> bool {
        match filter {
            Filter::Term { field, value } => self
                .field_values(doc, field)
                .iter()
                .any(|v| v.matches(value)),
            Filter::Terms {
                field,
                values,
                execution,
            } => {
                let present = self.field_values(doc, field);
                let has = |wanted: &PropertyValue| present.iter().any(|v| v.matches(wanted));
                match execution {
                    TermsExecution::Or => values.iter().any(has),
                    TermsExecution::And => values.iter().all(has),
                }
            }
            Filter::Range {
                field,
                lower,
                upper,
            } => self.field_values(doc, field).iter().any(|v| {
                within_bound(v, lower.as_ref(), Ordering::Greater)
                    && within_bound(v, upper.as_ref(), Ordering::Less)
            }),
            Filter::Exists { field } => !self.field_values(doc, field).is_empty(),
            Filter::GeoDistance {
                field,
                center,
                distance_km,
            } => {
                let area = GeoCircle::new(center.latitude, center.longitude, *distance_km);
                self.field_values(doc, field)
                    .iter()
                    .any(|v| geo_overlaps(v, &area))
            }
            Filter::GeoShape { field, shape } => self
                .field_values(doc, field)
                .iter()
                .any(|v| geo_overlaps(v, shape)),
            Filter::Not(inner) => !self.matches(doc, inner),
            Filter::Or(filters) => filters.iter().any(|f| self.matches(doc, f)),
            Filter::And(filters) => filters.iter().all(|f| self.matches(doc, f)),
        }
    }

    fn aggregate(&self, docs: &[&Document], aggregation: &Aggregation) -> AggregationResult {
        match aggregation {
            Aggregation::Terms { field, .. } => {
                let mut counts: FxHashMap<PropertyValue, u64> = FxHashMap::default();
                for doc in docs {
                    let distinct: HashSet<PropertyValue> =
                        self.field_values(doc, field).into_iter().collect();
                    for value in distinct {
                        *counts.entry(value).or_default() += 1;
                    }
                }
                let mut buckets: Vec<TermsBucket> = counts
                    .into_iter()
                    .map(|(key, count)| TermsBucket { key, count })
                    .collect();
                buckets.sort_by(|a, b| {
                    b.count
                        .cmp(&a.count)
                        .then_with(|| a.key.to_string().cmp(&b.key.to_string()))
                });
                AggregationResult::Terms(buckets)
            }
            Aggregation::Histogram {
                field,
                interval,
                min_doc_count,
                ..
            } => {
                let buckets = self.bucketize(docs, field, *min_doc_count, |value| {
                    value.as_f64().map(|v| (v / interval).floor() as i64)
                });
                AggregationResult::Histogram(
                    buckets
                        .into_iter()
                        .map(|(index, count)| HistogramBucket {
                            key: index as f64 * interval,
                            count,
                        })
                        .collect(),
                )
            }
            Aggregation::DateHistogram {
                field,
                interval,
                min_doc_count,
                ..
            } => {
                let width = interval.millis();
                let buckets = self.bucketize(docs, field, *min_doc_count, |value| match value {
                    PropertyValue::DateTime(ms) => Some(ms.div_euclid(width)),
                    PropertyValue::DateOnly(days) => Some(days.saturating_mul(MILLIS_PER_DAY).div_euclid(width)),
                    _ => None,
                });
                AggregationResult::Histogram(
                    buckets
                        .into_iter()
                        .map(|(index, count)| HistogramBucket {
                            key: index as f64 * width as f64,
                            count,
                        })
                        .collect(),
                )
            }
            Aggregation::GeohashGrid {
                field, precision, ..
            } => {
                let mut counts: BTreeMap<String, u64> = BTreeMap::new();
                for doc in docs {
                    for value in self.field_values(doc, field) {
                        if let PropertyValue::GeoPoint(point) = value {
                            *counts.entry(geohash(&point, *precision)).or_default() += 1;
                        }
                    }
                }
                let mut buckets: Vec<GeohashBucket> = counts
                    .into_iter()
                    .map(|(geohash, count)| GeohashBucket { geohash, count })
                    .collect();
                buckets.sort_by(|a, b| b.count.cmp(&a.count));
                AggregationResult::GeohashGrid(buckets)
            }
        }
    }

    fn bucketize(
        &self,
        docs: &[&Document],
        field: &str,
        min_doc_count: Option<u64>,
        bucket_of: impl Fn(&PropertyValue) -> Option<i64>,
    ) -> BTreeMap<i64, u64> {
        let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
        for doc in docs {
            let distinct: HashSet<i64> = self
                .field_values(doc, field)
                .iter()
                .filter_map(&bucket_of)
                .collect();
            for bucket in distinct {
                *counts.entry(bucket).or_default() += 1;
            }
        }
        let min = min_doc_count.unwrap_or(1);
        counts.retain(|_, count| *count >= min);
        counts
    }
}

fn within_bound(value: &PropertyValue, bound: Option<&RangeBound>, side: Ordering) -> bool {
    match bound {
        None => true,
        Some(bound) => match value.compare(&bound.value) {
            Some(Ordering::Equal) => bound.inclusive,
            Some(ordering) => ordering == side,
            None => false,
        },
    }
}

fn geo_overlaps(value: &PropertyValue, area: &GeoCircle) -> bool {
    match value {
        PropertyValue::GeoPoint(point) => area.contains(point),
        PropertyValue::GeoCircle(circle) => area.intersects(circle),
        _ => false,
    }
}

const GEOHASH_ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Standard base-32 geohash of `point` with `precision` characters.
pub fn geohash(point: &GeoPoint, precision: u8) -> String {
    let (mut lat_lo, mut lat_hi) = (-90.0_f64, 90.0_f64);
    let (mut lon_lo, mut lon_hi) = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(usize::from(precision));
    let mut bits = 0usize;
    let mut bit_count = 0;
    let mut even = true;
    while hash.len() < usize::from(precision) {
        let (value, lo, hi) = if even {
            (point.longitude, &mut lon_lo, &mut lon_hi)
        } else {
            (point.latitude, &mut lat_lo, &mut lat_hi)
        };
        let mid = (*lo + *hi) / 2.0;
        if value >= mid {
            bits = (bits << 1) | 1;
            *lo = mid;
        } else {
            bits <<= 1;
            *hi = mid;
        }
        even = !even;
        bit_count += 1;
        if bit_count == 5 {
            hash.push(char::from(GEOHASH_ALPHABET[bits]));
            bits = 0;
            bit_count = 0;
        }
    }
    hash
}

/// More-like-this terms after frequency pruning.
struct SimilarityTerms<'q> {
    options: &'q MoreLikeThis,
    terms: Vec<String>,
}

impl<'q> SimilarityTerms<'q> {
    fn prepare(state: &IndexState, docs: &[&Document], options: &'q MoreLikeThis) -> Self {
        let mut term_frequency: BTreeMap<String, u32> = BTreeMap::new();
        for token in tokenize(&options.like_text) {
            *term_frequency.entry(token).or_default() += 1;
        }
        let min_tf = options.min_term_frequency.unwrap_or(1);
        let mut terms: Vec<(String, u32)> = term_frequency
            .into_iter()
            .filter(|(_, tf)| *tf >= min_tf)
            .collect();

        if options.min_doc_frequency.is_some() || options.max_doc_frequency.is_some() {
            let doc_tokens: Vec<HashSet<String>> = docs
                .iter()
                .map(|doc| state.field_tokens(doc, &options.fields))
                .collect();
            terms.retain(|(term, _)| {
                let df = doc_tokens.iter().filter(|t| t.contains(term)).count() as u32;
                options.min_doc_frequency.map_or(true, |min| df >= min)
                    && options.max_doc_frequency.map_or(true, |max| df <= max)
            });
        }

        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let max_terms = options.max_query_terms.unwrap_or(DEFAULT_MAX_QUERY_TERMS) as usize;
        terms.truncate(max_terms);
        Self {
            options,
            terms: terms.into_iter().map(|(term, _)| term).collect(),
        }
    }

    fn score(&self, state: &IndexState, doc: &Document) -> Option<f64> {
        if self.terms.is_empty() {
            return None;
        }
        let tokens = state.field_tokens(doc, &self.options.fields);
        let matched = self.terms.iter().filter(|t| tokens.contains(*t)).count();
        let percent = self
            .options
            .percent_terms_to_match
            .unwrap_or(DEFAULT_PERCENT_TERMS_TO_MATCH);
        let required = ((percent * self.terms.len() as f32).ceil() as usize).max(1);
        if matched >= required {
            Some(matched as f64 * f64::from(self.options.boost.unwrap_or(1.0)))
        } else {
            None
        }
    }
}

/// Non-secure in-process implementation of [`SearchIndex`].
pub struct MemorySearchIndex {
    write_index: String,
    state: RwLock<IndexState>,
}

impl MemorySearchIndex {
    /// An index writing documents to `index_name`. The index itself is
    /// created lazily by the first write.
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            write_index: index_name.into(),
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Creates an empty index if it does not exist.
    pub fn create_index(&self, name: &str) {
        self.state
            .write()
            .indices
            .entry(name.to_owned())
            .or_default();
    }

    /// Number of documents in `index`, or `None` when it does not exist.
    pub fn document_count(&self, index: &str) -> Option<usize> {
        self.state.read().indices.get(index).map(|docs| docs.len())
    }
}

impl SearchIndex for MemorySearchIndex {
    fn add_element(&self, element: &IndexedElement) -> Result<(), SearchError> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let index = state.indices.entry(self.write_index.clone()).or_default();
        let doc = index
            .entry((element.kind, element.id.clone()))
            .or_insert_with(|| Document {
                kind: element.kind,
                id: element.id.clone(),
                properties: Vec::new(),
            });
        for removal in &element.removals {
            doc.properties
                .retain(|p| !p.is_same(&removal.key, &removal.name, &removal.visibility));
        }
        for property in &element.properties {
            doc.properties
                .retain(|p| !p.is_same(property.key(), property.name(), property.visibility()));
            doc.properties.push(property.clone());
            state.names.register(property.name(), property.visibility());
            state
                .definitions
                .entry(property.name().to_owned())
                .or_insert_with(|| {
                    PropertyDefinition::new(property.name(), DataType::for_value(property.value()))
                });
        }
        debug!(
            index = %self.write_index,
            kind = %element.kind,
            id = %element.id,
            properties = element.properties.len(),
            "search.memory.add_element"
        );
        Ok(())
    }

    fn delete_element(&self, kind: ElementKind, id: &str) -> Result<(), SearchError> {
        let key = (kind, id.to_owned());
        for docs in self.state.write().indices.values_mut() {
            docs.remove(&key);
        }
        Ok(())
    }

    fn execute(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        let state = self.state.read();
        let mut docs: Vec<&Document> = Vec::new();
        for index in &request.indices {
            let Some(index_docs) = state.indices.get(index) else {
                return Err(SearchError::IndexMissing {
                    index: index.clone(),
                });
            };
            docs.extend(index_docs.values());
        }

        let similarity = match &request.query {
            Query::MoreLikeThis(options) => Some(SimilarityTerms::prepare(&state, &docs, options)),
            _ => None,
        };
        let query_terms = match &request.query {
            Query::QueryString { query } => tokenize(query),
            _ => Vec::new(),
        };

        let mut matched: Vec<(&Document, f64)> = docs
            .iter()
            .copied()
            .filter(|doc| request.filters.iter().all(|f| state.matches(doc, f)))
            .filter_map(|doc| {
                let score = match &request.query {
                    Query::MatchAll => Some(1.0),
                    Query::QueryString { .. } if query_terms.is_empty() => Some(1.0),
                    Query::QueryString { .. } => {
                        let tokens = state.all_tokens(doc);
                        let hits = query_terms.iter().filter(|t| tokens.contains(*t)).count();
                        (hits > 0).then_some(hits as f64)
                    }
                    Query::MoreLikeThis(_) => similarity
                        .as_ref()
                        .and_then(|terms| terms.score(&state, doc)),
                };
                score.map(|score| (doc, score))
            })
            .collect();
        matched.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.kind.cmp(&b.kind))
                .then_with(|| a.id.cmp(&b.id))
        });

        let matched_docs: Vec<&Document> = matched.iter().map(|(doc, _)| *doc).collect();
        let aggregations: AggregationResults = request
            .aggregations
            .iter()
            .map(|agg| (agg.name().to_owned(), state.aggregate(&matched_docs, agg)))
            .collect();

        let total_hits = matched.len() as u64;
        let hits: Vec<SearchHit> = matched
            .into_iter()
            .skip(usize::try_from(request.from).unwrap_or(usize::MAX))
            .take(usize::try_from(request.size).unwrap_or(usize::MAX))
            .map(|(doc, score)| SearchHit {
                id: doc.id.clone(),
                kind: doc.kind,
                score,
            })
            .collect();
        debug!(
            indices = ?request.indices,
            total_hits,
            returned = hits.len(),
            "search.memory.execute"
        );
        Ok(SearchResponse {
            hits,
            total_hits,
            took: started.elapsed(),
            aggregations,
        })
    }

    fn matching_property_names(&self, name: &str, auths: &Authorizations) -> Vec<String> {
        self.state.read().names.matching(name, auths)
    }

    fn visibility_hash(&self, field: &str) -> Option<String> {
        self.state.read().names.visibility_hash_of(field)
    }

    fn property_definition(&self, name: &str) -> Option<PropertyDefinition> {
        self.state.read().definitions.get(name).cloned()
    }

    fn define_property(&self, definition: PropertyDefinition) -> Result<(), SearchError> {
        self.state
            .write()
            .definitions
            .insert(definition.name.clone(), definition);
        Ok(())
    }
}

impl std::fmt::Debug for MemorySearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySearchIndex")
            .field("write_index", &self.write_index)
            .finish_non_exhaustive()
    }
}
