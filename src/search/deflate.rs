//! Deflated property names.
//!
//! A property name is indexed once per distinct property visibility, under a
//! field name suffixed with a hash of that visibility. Queries expand a name
//! into the deflated fields the caller is allowed to read.

use rustc_hash::FxHashMap;
use xxhash_rust::xxh64::Xxh64;

use crate::security::{Authorizations, Visibility};

/// Suffix of the untokenized variant of a string field.
pub const EXACT_MATCH_SUFFIX: &str = "_e";
/// Suffix of the geo variant of a field.
pub const GEO_SUFFIX: &str = "_g";
/// Field holding the element kind of each document.
pub const ELEMENT_TYPE_FIELD: &str = "__elementType";

/// Stable 16-hex-digit hash of a visibility expression.
pub fn visibility_hash(visibility: &Visibility) -> String {
    let mut hasher = Xxh64::new(0);
    hasher.update(visibility.as_str().as_bytes());
    hex::encode(hasher.digest().to_be_bytes())
}

/// Field name for `name` stored under `visibility`. The empty visibility
/// keeps the plain name.
pub fn deflate_property_name(name: &str, visibility: &Visibility) -> String {
    if visibility.is_empty() {
        name.to_owned()
    } else {
        format!("{name}_{}", visibility_hash(visibility))
    }
}

#[derive(Clone, Debug)]
struct DeflatedField {
    field: String,
    visibility: Visibility,
}

/// Every deflated field seen so far, keyed by property name.
#[derive(Clone, Debug, Default)]
pub struct DeflatedNames {
    by_name: FxHashMap<String, Vec<DeflatedField>>,
    by_field: FxHashMap<String, (String, Visibility)>,
}

impl DeflatedNames {
    /// Records `(name, visibility)` and returns its field name.
    pub fn register(&mut self, name: &str, visibility: &Visibility) -> String {
        let field = deflate_property_name(name, visibility);
        let variants = self.by_name.entry(name.to_owned()).or_default();
        if !variants.iter().any(|v| v.field == field) {
            variants.push(DeflatedField {
                field: field.clone(),
                visibility: visibility.clone(),
            });
            self.by_field
                .insert(field.clone(), (name.to_owned(), visibility.clone()));
        }
        field
    }

    /// Fields for `name` whose visibility `auths` can read, in registration
    /// order.
    pub fn matching(&self, name: &str, auths: &Authorizations) -> Vec<String> {
        self.by_name
            .get(name)
            .map(|variants| {
                variants
                    .iter()
                    .filter(|v| auths.can_read(&v.visibility))
                    .map(|v| v.field.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Property name and visibility behind a field.
    pub fn inflate(&self, field: &str) -> Option<(&str, &Visibility)> {
        self.by_field
            .get(field)
            .map(|(name, visibility)| (name.as_str(), visibility))
    }

    /// Visibility hash of a field, or `None` for plain (empty visibility)
    /// fields and unknown fields.
    pub fn visibility_hash_of(&self, field: &str) -> Option<String> {
        self.inflate(field)
            .filter(|(_, visibility)| !visibility.is_empty())
            .map(|(_, visibility)| visibility_hash(visibility))
    }
}
