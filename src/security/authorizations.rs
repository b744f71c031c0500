use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Visibility;

/// Ordered, deduplicated set of authorization tokens presented by a caller.
///
/// Immutable after construction; merging produces a new set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authorizations {
    tokens: BTreeSet<String>,
}

impl Authorizations {
    /// Builds a set from any collection of tokens. Blank tokens are ignored.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(Into::into)
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// An authorization set holding no tokens.
    pub fn none() -> Self {
        Self::default()
    }

    /// Parses a comma-separated token list such as `"public, analyst"`.
    pub fn parse_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Returns a new set containing the union of `self` and `additional`.
    pub fn union<I, S>(&self, additional: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut merged = self.clone();
        merged.tokens.extend(Authorizations::new(additional).tokens);
        merged
    }

    /// Whether `token` is part of the set.
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Whether the set satisfies `visibility`.
    pub fn can_read(&self, visibility: &Visibility) -> bool {
        visibility.is_visible_to(self)
    }

    /// Tokens in ascending order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the set holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Display for Authorizations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in &self.tokens {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(token)?;
            first = false;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for Authorizations {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Authorizations::new(iter)
    }
}
