use crate::domain::chat::errors::DomainError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Raw field map of a stored document, without its id.
pub type Fields = Map<String, Value>;

/// Field name the document id is exposed under when a document is decoded
/// into a typed record.
pub const ID_FIELD: &str = "id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Decodes the document into a typed record, exposing the id as `id`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, DomainError> {
        let mut object = self.fields;
        object.insert(ID_FIELD.to_string(), Value::String(self.id));
        serde_json::from_value(Value::Object(object)).map_err(|e| {
            DomainError::Serialization(format!("failed to decode document: {}", e))
        })
    }
}

/// Timestamps written by the store are fixed-width RFC 3339 strings so that
/// lexicographic order equals chronological order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A single field mutation. Every variant is applied atomically by the store
/// together with the other writes of the same call.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite {
    Set(Value),
    ServerTimestamp,
    Increment(i64),
    /// Increments the field only if an earlier write of the same call
    /// changed the watched field.
    IncrementOnChange { by: i64, watched: String },
    ArrayUnion(Vec<Value>),
    ArrayRemove(Vec<Value>),
}

/// Ordered list of field writes for one create or update call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldWrites(Vec<(String, FieldWrite)>);

impl FieldWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((field.into(), FieldWrite::Set(value.into())));
        self
    }

    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.0.push((field.into(), FieldWrite::ServerTimestamp));
        self
    }

    pub fn increment(mut self, field: impl Into<String>, by: i64) -> Self {
        self.0.push((field.into(), FieldWrite::Increment(by)));
        self
    }

    pub fn increment_on_change(
        mut self,
        field: impl Into<String>,
        by: i64,
        watched: impl Into<String>,
    ) -> Self {
        self.0.push((
            field.into(),
            FieldWrite::IncrementOnChange {
                by,
                watched: watched.into(),
            },
        ));
        self
    }

    pub fn array_union(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.0.push((field.into(), FieldWrite::ArrayUnion(values)));
        self
    }

    pub fn array_remove(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.0.push((field.into(), FieldWrite::ArrayRemove(values)));
        self
    }

    /// Sets every entry of `fields`, in map order.
    pub fn set_all(mut self, fields: Fields) -> Self {
        for (field, value) in fields {
            self.0.push((field, FieldWrite::Set(value)));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, FieldWrite)> {
        self.0.iter()
    }

    pub fn get(&self, field: &str) -> Option<&FieldWrite> {
        self.0.iter().rev().find(|(f, _)| f == field).map(|(_, w)| w)
    }

    /// Applies the writes in order onto `target`. Later writes to the same
    /// field win.
    pub fn apply(&self, target: &mut Fields, now: DateTime<Utc>) {
        let mut changed: HashSet<&str> = HashSet::new();
        for (field, write) in &self.0 {
            let current = target.get(field);
            let next = match write {
                FieldWrite::Set(value) => value.clone(),
                FieldWrite::ServerTimestamp => Value::String(format_timestamp(now)),
                FieldWrite::Increment(by) => increment(current, *by),
                FieldWrite::IncrementOnChange { by, watched } => {
                    if !changed.contains(watched.as_str()) {
                        continue;
                    }
                    increment(current, *by)
                }
                FieldWrite::ArrayUnion(values) => array_union(current, values),
                FieldWrite::ArrayRemove(values) => array_remove(current, values),
            };
            let modified = match write {
                // A missing array and an empty one hold the same members.
                FieldWrite::ArrayUnion(_) | FieldWrite::ArrayRemove(_) => {
                    items(current) != items(Some(&next))
                }
                _ => current != Some(&next),
            };
            if modified {
                changed.insert(field.as_str());
            }
            target.insert(field.clone(), next);
        }
    }
}

// Non-numeric or missing fields count as zero.
fn increment(current: Option<&Value>, by: i64) -> Value {
    match current {
        Some(Value::Number(n)) if n.is_i64() => {
            Value::from(n.as_i64().unwrap_or_default().saturating_add(by))
        }
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(|f| serde_json::Number::from_f64(f + by as f64))
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(by)),
        _ => Value::from(by),
    }
}

fn items(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

fn array_union(current: Option<&Value>, values: &[Value]) -> Value {
    let mut items = match current {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    for value in values {
        if !items.contains(value) {
            items.push(value.clone());
        }
    }
    Value::Array(items)
}

fn array_remove(current: Option<&Value>, values: &[Value]) -> Value {
    match current {
        Some(Value::Array(items)) => Value::Array(
            items
                .iter()
                .filter(|item| !values.contains(item))
                .cloned()
                .collect(),
        ),
        _ => Value::Array(Vec::new()),
    }
}
