//! Crate-wide error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::model::ElementKind;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the graph facade, the query compiler and the backends.
///
/// Absence and lack of authorization are deliberately collapsed into
/// [`GraphError::NotFoundOrUnauthorized`]; the message never reveals which of
/// the two applied.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("{kind} '{id}' not found")]
    NotFoundOrUnauthorized { kind: ElementKind, id: String },
    #[error("invalid visibility: {0}")]
    InvalidVisibility(String),
    #[error("unsupported predicate: {0}")]
    UnsupportedPredicate(String),
    #[error("unsupported query parameter type: {0}")]
    UnsupportedQueryParameterType(String),
    #[error("no indexed properties match '{property}'")]
    NoMatchingProperties { property: String },
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("element was fetched without the {hint} fetch hint")]
    MissingFetchHint { hint: &'static str },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GraphError {
    pub(crate) fn not_found(kind: ElementKind, id: impl Into<String>) -> Self {
        GraphError::NotFoundOrUnauthorized {
            kind,
            id: id.into(),
        }
    }
}
