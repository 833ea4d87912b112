//! Frames: the ordered records that flow through a pipeline

pub mod value;

pub use value::{parse_date, FieldType, FieldValue};

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};

/// An ordered mapping of field name to typed value
///
/// Field names are unique. Setting an existing name replaces the value and
/// keeps the field's position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    fields: IndexMap<String, FieldValue>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with<K: Into<String>, V: Into<FieldValue>>(mut self, name: K, value: V) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, returning the previous value if the name already existed
    pub fn set<K: Into<String>, V: Into<FieldValue>>(
        &mut self,
        name: K,
        value: V,
    ) -> Option<FieldValue> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Remove a field, preserving the order of the remaining ones
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Build a frame from a JSON object; `None` when the value is not an object
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        value.as_object().map(Self::from_json_object)
    }

    pub fn from_json_object(object: &JsonMap<String, JsonValue>) -> Self {
        object
            .iter()
            .map(|(name, value)| (name.clone(), FieldValue::from_json(value)))
            .collect()
    }

    pub fn to_json(&self) -> JsonValue {
        let object: JsonMap<String, JsonValue> = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        JsonValue::Object(object)
    }
}

impl FromIterator<(String, FieldValue)> for Frame {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Frame {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = indexmap::map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
