//! Default field values for a profile record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use turbo_cache::Record;

/// Default values describing the expected shape of a record.
///
/// Defaults are cloned into records, never shared with them.
///
/// # Example
///
/// ```rust,ignore
/// let template = Template::new()
///     .with_field("gold", json!(0))
///     .with_field("inventory", json!({}));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template {
    fields: Map<String, Value>,
}

impl Template {
    /// Create an empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field default.
    pub fn with_field(mut self, field: impl Into<String>, default: Value) -> Self {
        self.fields.insert(field.into(), default);
        self
    }

    /// Get the default for a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Iterate over field names and defaults.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the template has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy the default of every template field missing from `record` into it.
    ///
    /// Returns the names of the filled fields. Existing fields are never
    /// touched, so a second call returns nothing.
    pub fn fill_missing(&self, record: &mut Record) -> Vec<String> {
        let mut filled = Vec::new();
        for (field, default) in &self.fields {
            if !record.contains_key(field) {
                record.insert(field.clone(), default.clone());
                filled.push(field.clone());
            }
        }
        filled
    }
}

impl From<Map<String, Value>> for Template {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}
