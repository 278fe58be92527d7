//! Dynamically-keyed records returned by every query operation
//!
//! The field set of a response is chosen by the caller at request time, so
//! records are kept as insertion-ordered maps of tagged values instead of
//! fixed structs. Insertion order is the declaration order of the projection
//! or group stage that produced the record, which keeps serialization stable.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::cmp::Ordering;

use crate::time::parse_timestamp;

/// A single decoded document
pub type Document = IndexMap<String, Value>;

/// Field names decoded as dates when stored as strings
pub const DATE_FIELDS: &[&str] = &["date", "last_updated_at"];

/// Tagged field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    Document(Document),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Rank of the value's type in the document store's sort order
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::String(_) => 2,
            Value::Document(_) => 3,
            Value::Array(_) => 4,
            Value::Bool(_) => 5,
            Value::Date(_) => 6,
        }
    }

    /// Total order used by sort stages: type rank first, then value.
    /// Integers and floats compare numerically with each other.
    pub fn compare(&self, other: &Value) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (a @ (Value::Int(_) | Value::Float(_)), b) => {
                let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                a.total_cmp(&b)
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => compare_seq(a.iter(), b.iter()),
            (Value::Document(a), Value::Document(b)) => compare_seq(a.values(), b.values()),
            _ => Ordering::Equal,
        }
    }

    /// Equality used by match stages; `1` and `1.0` are equal
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.compare(other) == Ordering::Equal
            }
            _ => self == other,
        }
    }

    /// Decode a JSON value, turning extended-JSON wrappers into native values.
    ///
    /// `field` is the key the value is stored under; strings under one of
    /// [`DATE_FIELDS`] become dates when they parse.
    pub fn from_json(field: &str, json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => {
                if DATE_FIELDS.contains(&field) {
                    if let Some(date) = parse_timestamp(&s) {
                        return Value::Date(date);
                    }
                }
                Value::String(s)
            }
            serde_json::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| Value::from_json(field, item))
                    .collect(),
            ),
            serde_json::Value::Object(map) => {
                if let Some(value) = decode_extended(&map) {
                    return value;
                }
                Value::Document(
                    map.into_iter()
                        .map(|(key, value)| {
                            let decoded = Value::from_json(&key, value);
                            (key, decoded)
                        })
                        .collect(),
                )
            }
        }
    }
}

fn compare_seq<'a>(
    mut a: impl Iterator<Item = &'a Value>,
    mut b: impl Iterator<Item = &'a Value>,
) -> Ordering {
    loop {
        match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.compare(y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// Extended-JSON wrappers as produced by `mongoexport`
fn decode_extended(map: &serde_json::Map<String, serde_json::Value>) -> Option<Value> {
    if map.len() != 1 {
        return None;
    }
    let (key, inner) = map.iter().next()?;

    match key.as_str() {
        "$date" => match inner {
            serde_json::Value::String(s) => parse_timestamp(s).map(Value::Date),
            serde_json::Value::Number(n) => n.as_i64().and_then(date_from_millis),
            serde_json::Value::Object(nested) => nested
                .get("$numberLong")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(date_from_millis),
            _ => None,
        },
        "$oid" => inner.as_str().map(|s| Value::String(s.to_string())),
        "$numberInt" | "$numberLong" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::Int),
        "$numberDouble" => inner
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .map(Value::Float),
        _ => None,
    }
}

fn date_from_millis(millis: i64) -> Option<Value> {
    Utc.timestamp_millis_opt(millis).single().map(Value::Date)
}

/// Decode a JSON object into a document
pub fn document_from_json(json: serde_json::Value) -> Option<Document> {
    match Value::from_json("", json) {
        Value::Document(doc) => Some(doc),
        _ => None,
    }
}

/// Read a field, treating a missing key as null
pub fn field<'a>(doc: &'a Document, name: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    doc.get(name).unwrap_or(&NULL)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(d) => {
                serializer.serialize_str(&d.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Document(doc) => doc.serialize(serializer),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}
