//! Records and attribute values.

use chrono::{DateTime, Utc};
use geo::Geometry;
use std::collections::BTreeMap;
use std::fmt;

/// An attribute value or filter literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
    /// A time period literal, used by `DURING`.
    Period(DateTime<Utc>, DateTime<Utc>),
    Geometry(Geometry<f64>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_geometry(&self) -> Option<&Geometry<f64>> {
        match self {
            Self::Geometry(g) => Some(g),
            _ => None,
        }
    }

    /// Date value, parsing strings as RFC 3339 or `YYYY-MM-DD`.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            Self::String(s) => parse_date(s),
            Self::Integer(millis) => DateTime::<Utc>::from_timestamp_millis(*millis),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Double(d) => Some(*d),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Double(d) => write!(f, "{}", d),
            Self::String(s) => write!(f, "'{}'", s),
            Self::Date(d) => f.write_str(&d.to_rfc3339()),
            Self::Period(start, end) => write!(f, "{}/{}", start.to_rfc3339(), end.to_rfc3339()),
            Self::Geometry(g) => write!(f, "{:?}", g),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

impl From<Geometry<f64>> for Value {
    fn from(g: Geometry<f64>) -> Self {
        Self::Geometry(g)
    }
}

impl From<geo::Point<f64>> for Value {
    fn from(p: geo::Point<f64>) -> Self {
        Self::Geometry(Geometry::Point(p))
    }
}

impl From<geo::Polygon<f64>> for Value {
    fn from(p: geo::Polygon<f64>) -> Self {
        Self::Geometry(Geometry::Polygon(p))
    }
}

/// A stored record: an id plus named attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub attributes: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Attribute value, `None` if absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_date_formats() {
        let expected = Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2017-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_date("2017-01-01T01:00:00+01:00"), Some(expected));
        assert_eq!(parse_date("2017-01-01"), Some(expected));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from("42").as_i64(), Some(42));
        assert_eq!(Value::from(3i64).as_f64(), Some(3.0));
        assert!(Value::from(true).as_date().is_none());
    }

    #[test]
    fn test_record_builder() {
        let record = Record::new("a").with("name", "alpha").with("count", 2i64);
        assert_eq!(record.get("name"), Some(&Value::from("alpha")));
        assert!(record.get("missing").is_none());
    }
}
