use crate::security::Authorizations;

use super::predicate::HasContainer;

/// Options of a similar-to-text query. Unset options use backend defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarToTextParameters {
    /// Property names to compare against.
    pub fields: Vec<String>,
    /// Reference text.
    pub text: String,
    /// Fraction of query terms a match must contain.
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

impl SimilarToTextParameters {
    /// Similarity over `fields` to `text` with backend defaults.
    pub fn new<I, S>(fields: I, text: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            text: text.into(),
            percent_terms_to_match: None,
            min_term_frequency: None,
            max_query_terms: None,
            min_doc_frequency: None,
            max_doc_frequency: None,
            boost: None,
        }
    }

    /// Sets the fraction of terms that must match.
    pub fn percent_terms_to_match(mut self, percent: f32) -> Self {
        self.percent_terms_to_match = Some(percent);
        self
    }

    /// Sets the minimum term frequency.
    pub fn min_term_frequency(mut self, frequency: u32) -> Self {
        self.min_term_frequency = Some(frequency);
        self
    }

    /// Sets the maximum number of query terms.
    pub fn max_query_terms(mut self, terms: u32) -> Self {
        self.max_query_terms = Some(terms);
        self
    }

    /// Sets the minimum document frequency.
    pub fn min_doc_frequency(mut self, frequency: u32) -> Self {
        self.min_doc_frequency = Some(frequency);
        self
    }

    /// Sets the maximum document frequency.
    pub fn max_doc_frequency(mut self, frequency: u32) -> Self {
        self.max_doc_frequency = Some(frequency);
        self
    }

    /// Sets the relevance boost.
    pub fn boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }
}

/// What drives a query's scoring.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryKind {
    /// Free-text query; `None`, blank and `*` match everything.
    QueryString(Option<String>),
    /// Similarity to a reference text.
    SimilarToText(SimilarToTextParameters),
}

/// A query request. Treated as a value: derived variants are new copies and
/// the original is never modified once execution starts.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryParameters {
    kind: QueryKind,
    has_containers: Vec<HasContainer>,
    skip: u64,
    limit: u64,
    authorizations: Authorizations,
}

impl QueryParameters {
    /// Parameters for a query-string query.
    pub fn query_string(query: Option<String>, limit: u64, authorizations: Authorizations) -> Self {
        Self::new(QueryKind::QueryString(query), limit, authorizations)
    }

    /// Parameters for a similar-to-text query.
    pub fn similar_to_text(
        parameters: SimilarToTextParameters,
        limit: u64,
        authorizations: Authorizations,
    ) -> Self {
        Self::new(QueryKind::SimilarToText(parameters), limit, authorizations)
    }

    fn new(kind: QueryKind, limit: u64, authorizations: Authorizations) -> Self {
        Self {
            kind,
            has_containers: Vec::new(),
            skip: 0,
            limit,
            authorizations,
        }
    }

    /// Query kind.
    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    /// The query string, when this is a query-string query.
    pub fn query_text(&self) -> Option<&str> {
        match &self.kind {
            QueryKind::QueryString(query) => query.as_deref(),
            QueryKind::SimilarToText(_) => None,
        }
    }

    /// Clauses, combined with AND.
    pub fn has_containers(&self) -> &[HasContainer] {
        &self.has_containers
    }

    /// Results to skip.
    pub fn skip(&self) -> u64 {
        self.skip
    }

    /// Maximum results.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Caller's authorizations.
    pub fn authorizations(&self) -> &Authorizations {
        &self.authorizations
    }

    /// Appends a clause.
    pub fn push_has_container(&mut self, container: HasContainer) {
        self.has_containers.push(container);
    }

    pub(crate) fn set_skip(&mut self, skip: u64) {
        self.skip = skip;
    }

    pub(crate) fn set_limit(&mut self, limit: u64) {
        self.limit = limit;
    }

    /// Independent copy with a different skip.
    pub fn with_skip(&self, skip: u64) -> QueryParameters {
        let mut copy = self.clone();
        copy.skip = skip;
        copy
    }
}
