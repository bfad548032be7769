//! Cross-field validation rules.
//!
//! Rules are data, not closures: a [`Condition`] tree evaluated against the
//! validated input. This keeps schemas serializable and hashable for the
//! compiled-schema cache, and lets docs describe them.
//!
//! Paths use dots to reach into nested objects (`auth.mode`). `null` is
//! treated the same as a missing value everywhere.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A predicate over the input document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    /// Value at `field` equals `value`.
    Equals { field: String, value: Value },
    /// Value at `field` is present and differs from `value`.
    NotEquals { field: String, value: Value },
    /// `field` is present and not null.
    Exists { field: String },
    /// `field` is absent or null.
    Missing { field: String },
    /// Value at `field` is one of `values`.
    In { field: String, values: Vec<Value> },
    /// Numeric value at `field` is strictly greater than `value`.
    GreaterThan { field: String, value: f64 },
    /// Numeric value at `field` is strictly less than `value`.
    LessThan { field: String, value: f64 },
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
}

impl Condition {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::NotEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    pub fn one_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn greater_than(field: impl Into<String>, value: impl Into<f64>) -> Self {
        Self::GreaterThan {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn less_than(field: impl Into<String>, value: impl Into<f64>) -> Self {
        Self::LessThan {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::All {
            conditions: conditions.into_iter().collect(),
        }
    }

    pub fn any(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::Any {
            conditions: conditions.into_iter().collect(),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: Condition) -> Self {
        Self::Not {
            condition: Box::new(condition),
        }
    }

    /// Evaluate against an input document.
    pub fn evaluate(&self, data: &Value) -> bool {
        match self {
            Self::Equals { field, value } => lookup(data, field) == Some(value),
            Self::NotEquals { field, value } => {
                lookup(data, field).is_some_and(|found| found != value)
            }
            Self::Exists { field } => lookup(data, field).is_some(),
            Self::Missing { field } => lookup(data, field).is_none(),
            Self::In { field, values } => {
                lookup(data, field).is_some_and(|found| values.contains(found))
            }
            Self::GreaterThan { field, value } => lookup(data, field)
                .and_then(Value::as_f64)
                .is_some_and(|n| n > *value),
            Self::LessThan { field, value } => lookup(data, field)
                .and_then(Value::as_f64)
                .is_some_and(|n| n < *value),
            // Empty `All` is vacuously true, empty `Any` is false.
            Self::All { conditions } => conditions.iter().all(|c| c.evaluate(data)),
            Self::Any { conditions } => conditions.iter().any(|c| c.evaluate(data)),
            Self::Not { condition } => !condition.evaluate(data),
        }
    }

    /// Every path this condition reads.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Equals { field, .. }
            | Self::NotEquals { field, .. }
            | Self::Exists { field }
            | Self::Missing { field }
            | Self::In { field, .. }
            | Self::GreaterThan { field, .. }
            | Self::LessThan { field, .. } => out.push(field),
            Self::All { conditions } | Self::Any { conditions } => {
                for c in conditions {
                    c.collect_fields(out);
                }
            }
            Self::Not { condition } => condition.collect_fields(out),
        }
    }
}

/// Resolve a dotted path. `null` resolves to `None`.
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

/// "When `condition` holds, these fields must (or must not) be present."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossFieldRule {
    pub condition: Condition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forbids: Vec<String>,
    pub message: String,
}

impl CrossFieldRule {
    /// Start a rule triggered by `condition`.
    pub fn when(condition: Condition) -> Self {
        Self {
            condition,
            requires: Vec::new(),
            forbids: Vec::new(),
            message: String::new(),
        }
    }

    #[must_use]
    pub fn requires<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn forbids<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbids.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Whether `data` violates this rule.
    pub fn is_violated(&self, data: &Value) -> bool {
        if !self.condition.evaluate(data) {
            return false;
        }
        self.requires.iter().any(|f| lookup(data, f).is_none())
            || self.forbids.iter().any(|f| lookup(data, f).is_some())
    }

    /// Every path the rule touches.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut fields = self.condition.referenced_fields();
        fields.extend(self.requires.iter().map(String::as_str));
        fields.extend(self.forbids.iter().map(String::as_str));
        fields
    }
}
