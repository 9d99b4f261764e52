use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

/// One decoded field value as handed over by the host decoder.
///
/// The wire format is only partially typed: values can be raw bytes, text,
/// numbers, or arbitrarily nested maps and sequences, and map keys are not
/// guaranteed to be text.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<FieldValue>),
    Map(Vec<(FieldValue, FieldValue)>),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

/// Record timestamp as supplied by the host: an explicit time value, a raw
/// epoch-seconds integer, or nothing usable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timestamp {
    Time(DateTime<Utc>),
    EpochSeconds(u64),
    Unknown,
}

impl Timestamp {
    /// Resolves to a wall-clock time, defaulting to now with a logged warning
    /// when the provided value is absent or malformed.
    pub fn resolve(&self) -> DateTime<Utc> {
        match self {
            Timestamp::Time(t) => *t,
            Timestamp::EpochSeconds(secs) => {
                match DateTime::from_timestamp(*secs as i64, 0) {
                    Some(t) => t,
                    None => {
                        warn!(epoch = secs, "time provided invalid, defaulting to now");
                        Utc::now()
                    }
                }
            }
            Timestamp::Unknown => {
                warn!("time provided invalid, defaulting to now");
                Utc::now()
            }
        }
    }
}

/// One record of a flush batch: a timestamp plus the ordered field mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: Timestamp,
    pub fields: Vec<(FieldValue, FieldValue)>,
}

/// A record after normalization: top-level field order is preserved, byte
/// payloads have become text, and nested structures are JSON values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    fields: IndexMap<String, Value>,
}

impl NormalizedRecord {
    /// Recursively normalizes decoded fields into text-safe values.
    ///
    /// Map keys are coerced to text where possible; entries with non-text
    /// keys are dropped rather than erroring.
    pub fn from_fields(fields: &[(FieldValue, FieldValue)]) -> NormalizedRecord {
        let mut out = IndexMap::new();
        for (key, value) in fields {
            if let Some(key) = text_key(key) {
                out.insert(key, normalize_value(value));
            }
        }
        NormalizedRecord { fields: out }
    }

    /// The label value for `name`; a missing field resolves to the empty
    /// string, never an error.
    pub fn label_value(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(display_value)
            .unwrap_or_default()
    }

    /// Generic stringification of the field at `key`, for value extraction.
    pub fn value_text(&self, key: &str) -> String {
        self.label_value(key)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn text_key(key: &FieldValue) -> Option<String> {
    match key {
        FieldValue::Text(s) => Some(s.clone()),
        FieldValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        _ => None,
    }
}

fn normalize_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Int(i) => Value::from(*i),
        FieldValue::Uint(u) => Value::from(*u),
        FieldValue::Float(f) => Value::from(*f),
        FieldValue::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        FieldValue::Map(entries) => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                if let Some(k) = text_key(k) {
                    map.insert(k, normalize_value(v));
                }
            }
            Value::Object(map)
        }
    }
}

/// Text strings render verbatim; everything else renders as JSON, which is
/// close enough to a generic formatter for label values and extraction input.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_become_text() {
        let record = NormalizedRecord::from_fields(&[(
            FieldValue::Text("msg".into()),
            FieldValue::Bytes(b"hello".to_vec()),
        )]);
        assert_eq!(record.label_value("msg"), "hello");
    }

    #[test]
    fn missing_field_is_empty_string() {
        let record = NormalizedRecord::from_fields(&[]);
        assert_eq!(record.label_value("status"), "");
    }

    #[test]
    fn non_text_keys_are_dropped() {
        let record = NormalizedRecord::from_fields(&[
            (FieldValue::Int(1), FieldValue::Text("dropped".into())),
            (FieldValue::Text("kept".into()), FieldValue::Int(2)),
            (
                FieldValue::Bytes(b"raw".to_vec()),
                FieldValue::Text("bytes key ok".into()),
            ),
        ]);
        assert_eq!(record.len(), 2);
        assert_eq!(record.label_value("kept"), "2");
        assert_eq!(record.label_value("raw"), "bytes key ok");
    }

    #[test]
    fn nested_maps_and_arrays_normalize_recursively() {
        let record = NormalizedRecord::from_fields(&[(
            FieldValue::Text("ctx".into()),
            FieldValue::Map(vec![
                (
                    FieldValue::Bytes(b"inner".to_vec()),
                    FieldValue::Array(vec![FieldValue::Bytes(b"x".to_vec()), FieldValue::Int(3)]),
                ),
                (FieldValue::Bool(true), FieldValue::Null),
            ]),
        )]);
        let ctx = record.get("ctx").unwrap();
        assert_eq!(ctx["inner"][0], Value::String("x".into()));
        assert_eq!(ctx["inner"][1], Value::from(3));
        // the bool-keyed entry was dropped
        assert_eq!(ctx.as_object().unwrap().len(), 1);
    }

    #[test]
    fn numeric_fields_stringify_for_extraction() {
        let record = NormalizedRecord::from_fields(&[
            (FieldValue::Text("dur".into()), FieldValue::Float(23.5)),
            (FieldValue::Text("count".into()), FieldValue::Uint(7)),
        ]);
        assert_eq!(record.value_text("dur"), "23.5");
        assert_eq!(record.value_text("count"), "7");
    }

    #[test]
    fn epoch_timestamp_resolves() {
        let ts = Timestamp::EpochSeconds(1_700_000_000);
        assert_eq!(ts.resolve().timestamp(), 1_700_000_000);
    }

    #[test]
    fn unknown_timestamp_falls_back_to_now() {
        let before = Utc::now();
        let resolved = Timestamp::Unknown.resolve();
        assert!(resolved >= before);
    }
}
