//! Dynamically typed property values.
//!
//! The set of scalar kinds is closed; every comparison rule the query layer
//! relies on is spelled out here instead of being discovered at runtime.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

use crate::error::{GraphError, Result};

const MILLIS_PER_DAY: i64 = 86_400_000;
const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;
const EARTH_RADIUS_KM: f64 = 6_371.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance in kilometers (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// A circle on the earth's surface; radius is in kilometers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoCircle {
    /// Latitude of the center in degrees.
    pub latitude: f64,
    /// Longitude of the center in degrees.
    pub longitude: f64,
    /// Radius in kilometers.
    pub radius_km: f64,
}

impl GeoCircle {
    /// Creates a circle.
    pub fn new(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_km,
        }
    }

    /// Center of the circle.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Whether `point` lies inside or on the circle.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.center().distance_km(point) <= self.radius_km
    }

    /// Whether the two circles overlap.
    pub fn intersects(&self, other: &GeoCircle) -> bool {
        self.center().distance_km(&other.center()) <= self.radius_km + other.radius_km
    }
}

/// Typed property value.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum PropertyValue {
    /// UTF-8 string.
    String(String),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Timestamp in milliseconds since the Unix epoch (UTC).
    DateTime(i64),
    /// Calendar date without a time component, as days since the Unix epoch.
    DateOnly(i64),
    /// Geographic point.
    GeoPoint(GeoPoint),
    /// Geographic circle.
    GeoCircle(GeoCircle),
    /// Opaque bytes.
    Bytes(Vec<u8>),
}

impl PropertyValue {
    /// Builds a [`PropertyValue::DateOnly`] from calendar components.
    pub fn date(year: i32, month: u8, day: u8) -> Result<Self> {
        let month = time::Month::try_from(month)
            .map_err(|err| GraphError::InvalidArgument(format!("invalid month: {err}")))?;
        let date = Date::from_calendar_date(year, month, day)
            .map_err(|err| GraphError::InvalidArgument(format!("invalid date: {err}")))?;
        Ok(PropertyValue::DateOnly(days_from_date(date)))
    }

    /// Parses a `YYYY-MM-DD` string into a [`PropertyValue::DateOnly`].
    pub fn parse_date(text: &str) -> Result<Self> {
        let date = Date::parse(text, format_description!("[year]-[month]-[day]"))
            .map_err(|err| GraphError::InvalidArgument(format!("invalid date '{text}': {err}")))?;
        Ok(PropertyValue::DateOnly(days_from_date(date)))
    }

    /// Short name of the value's kind, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "string",
            PropertyValue::Int(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::DateTime(_) => "datetime",
            PropertyValue::DateOnly(_) => "date",
            PropertyValue::GeoPoint(_) => "geopoint",
            PropertyValue::GeoCircle(_) => "geocircle",
            PropertyValue::Bytes(_) => "bytes",
        }
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value is a string.
    pub fn is_string(&self) -> bool {
        matches!(self, PropertyValue::String(_))
    }

    /// Numeric view used by histograms and range checks.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(v) => Some(*v as f64),
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::DateTime(v) => Some(*v as f64),
            PropertyValue::DateOnly(v) => Some(*v as f64 * MILLIS_PER_DAY as f64),
            _ => None,
        }
    }

    /// Returns the same value with strings lower-cased.
    pub fn case_folded(&self) -> PropertyValue {
        match self {
            PropertyValue::String(s) => PropertyValue::String(s.to_lowercase()),
            other => other.clone(),
        }
    }

    /// Orders two values when they are comparable.
    ///
    /// Integers and floats compare numerically. A timestamp compared with a
    /// date-only value is reduced to its UTC calendar day first, so a date
    /// range `[d, d]` covers every timestamp on that day.
    pub fn compare(&self, other: &PropertyValue) -> Option<Ordering> {
        use PropertyValue::*;
        match (self, other) {
            (String(a), String(b)) => Some(a.cmp(b)),
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            (DateOnly(a), DateOnly(b)) => Some(a.cmp(b)),
            (DateTime(a), DateOnly(b)) => Some(a.div_euclid(MILLIS_PER_DAY).cmp(b)),
            (DateOnly(a), DateTime(b)) => Some(a.cmp(&b.div_euclid(MILLIS_PER_DAY))),
            (Bytes(a), Bytes(b)) => Some(a.cmp(b)),
            (GeoPoint(a), GeoPoint(b)) if a == b => Some(Ordering::Equal),
            (GeoCircle(a), GeoCircle(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// Equality under [`PropertyValue::compare`].
    pub fn matches(&self, other: &PropertyValue) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

fn days_from_date(date: Date) -> i64 {
    i64::from(date.to_julian_day() - UNIX_EPOCH_JULIAN_DAY)
}

fn format_days(days: i64) -> String {
    let julian = i32::try_from(days)
        .ok()
        .and_then(|d| d.checked_add(UNIX_EPOCH_JULIAN_DAY));
    match julian.and_then(|j| Date::from_julian_day(j).ok()) {
        Some(date) => format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            u8::from(date.month()),
            date.day()
        ),
        None => format!("date({days})"),
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        use PropertyValue::*;
        match (self, other) {
            (String(a), String(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Bool(a), Bool(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (DateOnly(a), DateOnly(b)) => a == b,
            (GeoPoint(a), GeoPoint(b)) => {
                a.latitude.to_bits() == b.latitude.to_bits()
                    && a.longitude.to_bits() == b.longitude.to_bits()
            }
            (GeoCircle(a), GeoCircle(b)) => {
                a.latitude.to_bits() == b.latitude.to_bits()
                    && a.longitude.to_bits() == b.longitude.to_bits()
                    && a.radius_km.to_bits() == b.radius_km.to_bits()
            }
            (Bytes(a), Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for PropertyValue {}

impl Hash for PropertyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            PropertyValue::String(v) => v.hash(state),
            PropertyValue::Int(v) | PropertyValue::DateTime(v) | PropertyValue::DateOnly(v) => {
                v.hash(state)
            }
            PropertyValue::Float(v) => v.to_bits().hash(state),
            PropertyValue::Bool(v) => v.hash(state),
            PropertyValue::GeoPoint(p) => {
                p.latitude.to_bits().hash(state);
                p.longitude.to_bits().hash(state);
            }
            PropertyValue::GeoCircle(c) => {
                c.latitude.to_bits().hash(state);
                c.longitude.to_bits().hash(state);
                c.radius_km.to_bits().hash(state);
            }
            PropertyValue::Bytes(v) => v.hash(state),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(v) => write!(f, "{v}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::DateTime(v) => write!(f, "datetime({v})"),
            PropertyValue::DateOnly(v) => f.write_str(&format_days(*v)),
            PropertyValue::GeoPoint(p) => write!(f, "point({}, {})", p.latitude, p.longitude),
            PropertyValue::GeoCircle(c) => write!(
                f,
                "circle({}, {}, {}km)",
                c.latitude, c.longitude, c.radius_km
            ),
            PropertyValue::Bytes(v) => write!(f, "bytes(len={})", v.len()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(i64::from(value))
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<GeoPoint> for PropertyValue {
    fn from(value: GeoPoint) -> Self {
        PropertyValue::GeoPoint(value)
    }
}

impl From<GeoCircle> for PropertyValue {
    fn from(value: GeoCircle) -> Self {
        PropertyValue::GeoCircle(value)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        PropertyValue::Bytes(value)
    }
}
