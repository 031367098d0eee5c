//! Columnar-to-row transposition.
//!
//! A walk yields one value sequence per column. [`TableAssembler`] turns
//! those sequences into one [`Record`] per table row:
//!
//! - the first configured column that was walked drives the row count;
//! - a column shorter than that gets [`DEFAULT_VALUE`] in the missing rows;
//! - values made only of ASCII digits become integers, everything else stays text.

use std::collections::BTreeMap;

use serde::Serialize;

use super::table::ColumnarResult;

/// Substituted for values a column did not return.
pub const DEFAULT_VALUE: FieldValue = FieldValue::Integer(0);

/// A single record field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(u64),
    Float(f64),
    Text(String),
    /// Configured value carried as-is (signed numbers, lists, maps, null).
    Json(serde_json::Value),
}

impl FieldValue {
    /// Coerce a raw walked value.
    ///
    /// Digit-only values that overflow `u64` are kept as text.
    pub fn coerce(raw: &str) -> Self {
        if !raw.is_empty()
            && raw.bytes().all(|b| b.is_ascii_digit())
            && let Ok(n) = raw.parse::<u64>()
        {
            return Self::Integer(n);
        }
        Self::Text(raw.to_string())
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

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Bool(b) => Self::Bool(b),
            Value::String(s) => Self::Text(s),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Self::Integer(u)
                } else if n.is_f64()
                    && let Some(f) = n.as_f64()
                {
                    Self::Float(f)
                } else {
                    Self::Json(Value::Number(n))
                }
            }
            other => Self::Json(other),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Field name to value mapping; one per table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Move every field of `other` into this record, overwriting on collision.
    pub fn append(&mut self, mut other: Record) {
        self.fields.append(&mut other.fields);
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Transposes a [`ColumnarResult`] into row records.
pub struct TableAssembler;

impl TableAssembler {
    /// Build one record per row, keyed by every alias in `aliases`.
    ///
    /// `aliases` must be the configured column order so that the row-count
    /// driver is the same on every cycle.
    pub fn assemble(aliases: &[String], result: &ColumnarResult) -> Vec<Record> {
        let rows = aliases
            .iter()
            .find_map(|alias| result.column(alias))
            .map_or(0, <[String]>::len);

        (0..rows)
            .map(|i| {
                aliases
                    .iter()
                    .map(|alias| {
                        let value = result
                            .column(alias)
                            .and_then(|values| values.get(i))
                            .map_or(DEFAULT_VALUE, |raw| FieldValue::coerce(raw));
                        (alias.clone(), value)
                    })
                    .collect::<Record>()
            })
            .collect()
    }
}
