//! A JSON document: an object of arbitrary fields plus its string `id`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One document stored at `{collection}/{id}/data.json`.
///
/// On the wire the `id` sits alongside the other fields, so
/// `{"id": "u1", "title": "A"}` round-trips through this type unchanged.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Document {
    /// Document identifier. `None` (or empty) asks the store to generate one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Every other top-level field, stored verbatim.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Build a document from a JSON object, lifting out its `id` field.
    ///
    /// Returns `None` when `value` is not an object or its `id` is present
    /// but not a string.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(mut fields) => {
                let id = match fields.remove("id") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(id)) => Some(id),
                    Some(_) => return None,
                };
                Some(Self { id, fields })
            }
            _ => None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The id if it is present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn into_value(self) -> Value {
        let mut fields = self.fields;
        if let Some(id) = self.id {
            fields.insert("id".into(), Value::String(id));
        }
        Value::Object(fields)
    }
}
