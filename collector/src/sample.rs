use serde::{
    Serialize,
    Serializer,
};
use std::fmt;

/// Marker stored in place of values whose wire type could not be decoded.
pub const UNDECODED: &str = "undecoded";

/// A decoded scalar. Numbers stay decimal text so 64-bit counters survive transport untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Undecoded,
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Value::Text(text) => text,
            Value::Undecoded => UNDECODED,
        }
    }

    /// Decoded and not blank.
    pub fn is_present(&self) -> bool {
        matches!(self, Value::Text(text) if !text.trim().is_empty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One `(sub-key, label, value)` triple produced by a fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSample {
    pub sub_key: String,
    pub label: String,
    pub value: Value,
}

impl MetricSample {
    pub fn new(sub_key: impl Into<String>, label: impl Into<String>, value: Value) -> Self {
        Self {
            sub_key: sub_key.into(),
            label: label.into(),
            value,
        }
    }
}
