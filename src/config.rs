//! Graph configuration, loadable from TOML.
//!
//! ```toml
//! id_generator = "sequential"
//!
//! [search]
//! index_name = "penumbra"
//! evaluate_query_string = false
//! evaluate_has_containers = true
//! default_limit = 100
//!
//! [authorizations]
//! default = "public,internal"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::security::Authorizations;

/// Which id generator a graph uses for elements created without an id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdGeneratorKind {
    /// Monotonic decimal ids, unique for the lifetime of the graph.
    #[default]
    Sequential,
    /// Random 128-bit hex ids.
    Random,
}

/// Search-side behaviour of the query layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Index targeted by the default index selection strategy.
    pub index_name: String,
    /// Re-check the query string against fetched elements.
    pub evaluate_query_string: bool,
    /// Re-check has-containers against fetched elements.
    pub evaluate_has_containers: bool,
    /// Page size used when a query sets no limit.
    pub default_limit: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_name: "penumbra".to_string(),
            evaluate_query_string: false,
            evaluate_has_containers: true,
            default_limit: 100,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct AuthorizationsConfig {
    default: String,
}

/// Top-level graph configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Id generator for elements created without an explicit id.
    pub id_generator: IdGeneratorKind,
    /// Query layer settings.
    pub search: SearchConfig,
    authorizations: AuthorizationsConfig,
}

impl GraphConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: GraphConfig =
            toml::from_str(text).map_err(|source| ConfigError::ParseStr { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GraphConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }

    /// Writes the configuration to `path` as TOML.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let serialized = self.to_toml_string()?;
        fs::write(path, serialized).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Sets the id generator.
    pub fn id_generator(mut self, kind: IdGeneratorKind) -> Self {
        self.id_generator = kind;
        self
    }

    /// Sets the index targeted by queries.
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.search.index_name = name.into();
        self
    }

    /// Enables or disables in-memory query-string re-evaluation.
    pub fn evaluate_query_string(mut self, enabled: bool) -> Self {
        self.search.evaluate_query_string = enabled;
        self
    }

    /// Enables or disables in-memory has-container re-evaluation.
    pub fn evaluate_has_containers(mut self, enabled: bool) -> Self {
        self.search.evaluate_has_containers = enabled;
        self
    }

    /// Sets the default page size.
    pub fn default_limit(mut self, limit: u64) -> Self {
        self.search.default_limit = limit;
        self
    }

    /// Sets the comma-separated default authorization tokens.
    pub fn default_authorization_tokens(mut self, tokens: impl Into<String>) -> Self {
        self.authorizations.default = tokens.into();
        self
    }

    /// Authorizations configured as the graph default.
    pub fn default_authorizations(&self) -> Authorizations {
        Authorizations::parse_list(&self.authorizations.default)
    }

    /// Rejects settings no graph can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.index_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "search.index_name",
                value: self.search.index_name.clone(),
            });
        }
        if self.search.default_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "search.default_limit",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Failures while loading or saving a [`GraphConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read graph config {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse graph config {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// In-memory TOML text is not valid for this schema.
    #[error("failed to parse graph config: {source}")]
    ParseStr {
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// The configuration could not be rendered.
    #[error("failed to serialize graph config: {source}")]
    Serialize {
        /// Underlying TOML error.
        source: toml::ser::Error,
    },
    /// The file could not be written.
    #[error("failed to write graph config {path}: {source}")]
    Write {
        /// File that was written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A field holds a value outside its domain.
    #[error("config field '{field}' has invalid value '{value}'")]
    Invalid {
        /// Dotted field path.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}
