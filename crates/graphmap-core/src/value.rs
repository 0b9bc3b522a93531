//! Scalar values stored on nodes and edges.

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};

/// Timestamp layout used for both rendering and stringification.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Runtime type of a [`Value`], matched against a backend's native type set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::Timestamp => "timestamp",
        }
    }
}

/// A scalar attribute or property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<FixedOffset>),
    Text(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Text(_) => ValueKind::Text,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Timestamp(_) => ValueKind::Timestamp,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a scalar JSON value returned by a backend.
    ///
    /// Arrays, objects, and nulls have no scalar counterpart and yield `None`.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(Value::Boolean(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Integer)
                .or_else(|| n.as_f64().map(Value::Float)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Timestamp(ts) => serde_json::Value::String(ts.format(TIMESTAMP_FORMAT).to_string()),
        }
    }
}

/// Plain stringification, used for identity material and for values a
/// backend cannot represent natively.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v.fixed_offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_display_formats() {
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::from(42i64).to_string(), "42");
        assert_eq!(Value::from(2.0).to_string(), "2.0");
        assert_eq!(Value::from(true).to_string(), "true");

        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(Value::from(ts).to_string(), "2024-01-01T00:00:00+0000");
    }

    #[test]
    fn test_from_json_scalars_only() {
        assert_eq!(
            Value::from_json(&serde_json::json!("x")),
            Some(Value::Text("x".to_string()))
        );
        assert_eq!(Value::from_json(&serde_json::json!(7)), Some(Value::Integer(7)));
        assert_eq!(Value::from_json(&serde_json::json!(1.5)), Some(Value::Float(1.5)));
        assert_eq!(Value::from_json(&serde_json::json!(false)), Some(Value::Boolean(false)));
        assert_eq!(Value::from_json(&serde_json::json!([1, 2])), None);
        assert_eq!(Value::from_json(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_timestamp_shaped_text_stays_text() {
        let raw = serde_json::json!("2024-01-01T00:00:00+00:00");
        assert_eq!(
            Value::from_json(&raw),
            Some(Value::Text("2024-01-01T00:00:00+00:00".to_string()))
        );
    }

    #[test]
    fn test_kind() {
        assert_eq!(Value::from("a").kind(), ValueKind::Text);
        assert_eq!(Value::from(1i64).kind(), ValueKind::Integer);
        assert_eq!(Value::from(1.0).kind(), ValueKind::Float);
        assert_eq!(Value::from(true).kind(), ValueKind::Boolean);
        assert_eq!(ValueKind::Timestamp.as_str(), "timestamp");
    }
}
