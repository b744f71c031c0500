use serde::{Deserialize, Serialize};

use crate::model::PropertyValue;

/// Declared value type of a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Text.
    String,
    /// Signed integers.
    Integer,
    /// Floating point numbers.
    Float,
    /// Booleans.
    Boolean,
    /// Timestamps and calendar dates.
    Date,
    /// Geographic points.
    GeoPoint,
    /// Geographic shapes (circles).
    GeoShape,
    /// Opaque bytes; stored but not searchable.
    Bytes,
}

impl DataType {
    /// Type inferred from the first value seen for an undeclared property.
    pub fn for_value(value: &PropertyValue) -> DataType {
        match value {
            PropertyValue::String(_) => DataType::String,
            PropertyValue::Int(_) => DataType::Integer,
            PropertyValue::Float(_) => DataType::Float,
            PropertyValue::Bool(_) => DataType::Boolean,
            PropertyValue::DateTime(_) | PropertyValue::DateOnly(_) => DataType::Date,
            PropertyValue::GeoPoint(_) => DataType::GeoPoint,
            PropertyValue::GeoCircle(_) => DataType::GeoShape,
            PropertyValue::Bytes(_) => DataType::Bytes,
        }
    }

    /// Whether histograms over this type bucket by time.
    pub fn is_date(self) -> bool {
        matches!(self, DataType::Date)
    }
}

/// How a string property is indexed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextIndexHint {
    /// Tokenized, case-insensitive field used by text search.
    FullText,
    /// Untokenized field used by equality, containment and terms buckets.
    ExactMatch,
}

impl TextIndexHint {
    /// Both text index variants.
    pub const ALL: [TextIndexHint; 2] = [TextIndexHint::FullText, TextIndexHint::ExactMatch];
}

/// Index-side description of a property name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Property name.
    pub name: String,
    /// Declared value type.
    pub data_type: DataType,
    /// Text index variants; empty for non-string types.
    pub text_index_hints: Vec<TextIndexHint>,
    /// Relevance boost.
    pub boost: Option<f64>,
}

impl PropertyDefinition {
    /// A definition with the default hints for `data_type`.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            text_index_hints: if data_type == DataType::String {
                TextIndexHint::ALL.to_vec()
            } else {
                Vec::new()
            },
            boost: None,
        }
    }

    /// Whether string values get an exact-match field.
    pub fn has_exact_match(&self) -> bool {
        self.text_index_hints.contains(&TextIndexHint::ExactMatch)
    }

    /// Whether string values get a tokenized field.
    pub fn has_full_text(&self) -> bool {
        self.text_index_hints.contains(&TextIndexHint::FullText)
    }
}
