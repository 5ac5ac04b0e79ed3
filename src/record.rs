//! Screener record model: flat, immutable rows of named numeric/text fields.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl FieldValue {
    /// Numeric view of the value. Text is coerced when it parses as a finite number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) if value.is_finite() => Some(*value),
            Self::Text(raw) => raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(raw) => Some(Cow::Borrowed(raw.as_str())),
            Self::Number(value) if value.is_finite() => Some(Cow::Owned(value.to_string())),
            Self::Bool(flag) => Some(Cow::Owned(flag.to_string())),
            Self::Number(_) | Self::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// One screener row (a stock or an expert). Never mutated by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Lenient conversion from an arbitrary JSON object. Nested arrays and
    /// objects are dropped since no view renders them.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let fields = object
            .iter()
            .filter_map(|(key, raw)| {
                let value = match raw {
                    serde_json::Value::Null => FieldValue::Null,
                    serde_json::Value::Bool(flag) => FieldValue::Bool(*flag),
                    serde_json::Value::Number(number) => FieldValue::Number(number.as_f64()?),
                    serde_json::Value::String(text) => FieldValue::Text(text.clone()),
                    serde_json::Value::Array(_) | serde_json::Value::Object(_) => return None,
                };
                Some((key.clone(), value))
            })
            .collect();

        Some(Self { fields })
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).filter(|value| !value.is_null())
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_number)
    }

    pub fn text(&self, field: &str) -> Option<Cow<'_, str>> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn ticker(&self) -> Option<&str> {
        match self.fields.get("ticker") {
            Some(FieldValue::Text(ticker)) => Some(ticker.as_str()),
            _ => None,
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
