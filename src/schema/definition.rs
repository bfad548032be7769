//! Named collections of field definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::field::FieldDefinition;
use crate::schema::rules::CrossFieldRule;

/// A mapping from field name to definition, plus cross-field rules.
///
/// Fields are kept in a `BTreeMap` so iteration order, and therefore
/// serialization, docs output, and the compiler's cache key, never depends
/// on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    fields: BTreeMap<String, FieldDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    rules: Vec<CrossFieldRule>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. A later field with the same name replaces the earlier one.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, definition: impl Into<FieldDefinition>) -> Self {
        self.fields.insert(name.into(), definition.into());
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: CrossFieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldDefinition> {
        &self.fields
    }

    pub fn rules(&self) -> &[CrossFieldRule] {
        &self.rules
    }

    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of top-level fields whose values must never be logged.
    pub fn sensitive_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, def)| def.is_sensitive())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl<K, F> FromIterator<(K, F)> for Schema
where
    K: Into<String>,
    F: Into<FieldDefinition>,
{
    fn from_iter<I: IntoIterator<Item = (K, F)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, f)| (k.into(), f.into()))
                .collect(),
            rules: Vec::new(),
        }
    }
}

/// The two schemas owned by a tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub input: Schema,
    #[serde(default)]
    pub config: Schema,
}

impl ToolSchema {
    pub fn new(input: Schema, config: Schema) -> Self {
        Self { input, config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builder::{api_key_field, number_field, string_field};

    #[test]
    fn test_field_order_is_canonical() {
        let a = Schema::new()
            .field("zeta", string_field())
            .field("alpha", number_field());
        let b = Schema::new()
            .field("alpha", number_field())
            .field("zeta", string_field());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(a.fields().keys().collect::<Vec<_>>(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_sensitive_fields() {
        let schema: Schema = [
            ("token", api_key_field().build()),
            ("note", string_field().sensitive().build()),
            ("name", string_field().build()),
        ]
        .into_iter()
        .collect();
        assert_eq!(schema.sensitive_fields(), vec!["note", "token"]);
    }
}
