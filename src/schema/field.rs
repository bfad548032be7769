//! Field definitions: plain data describing one input or config value.
//!
//! A [`FieldDefinition`] is produced by the builders in
//! [`builder`](crate::schema::builder) and is immutable afterwards: its
//! fields are private and only exposed through shared references.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known string formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringFormat {
    Email,
    Url,
    Uuid,
    Ipv4,
    Ipv6,
    Hostname,
    Date,
    Datetime,
    Phone,
}

impl StringFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Url => "url",
            Self::Uuid => "uuid",
            Self::Ipv4 => "ipv4",
            Self::Ipv6 => "ipv6",
            Self::Hostname => "hostname",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Phone => "phone",
        }
    }
}

impl std::fmt::Display for StringFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string transformation applied after a value passes validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Trim,
    Lowercase,
    Uppercase,
    CollapseWhitespace,
    Capitalize,
    StripControl,
}

/// Policy for object keys that are not declared as properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionalProperties {
    /// Keep undeclared keys as-is.
    #[default]
    Allow,
    /// Drop undeclared keys from the output.
    Strip,
    /// Report undeclared keys as `UNEXPECTED_FIELDS`.
    Reject,
}

/// How datetime values must express their timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimezonePolicy {
    /// Any RFC 3339 offset. Values without one are read as UTC.
    #[default]
    Any,
    /// An explicit offset must be present.
    RequireOffset,
    /// Only `Z` or `+00:00`.
    UtcOnly,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StringConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<StringFormat>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NumberConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default)]
    pub integer: bool,
    /// Maximum number of decimal places.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnumConstraints {
    pub values: Vec<String>,
    /// Display labels keyed by value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayConstraints {
    pub items: Box<FieldDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectConstraints {
    #[serde(default)]
    pub properties: BTreeMap<String, FieldDefinition>,
    #[serde(default)]
    pub additional_properties: AdditionalProperties,
}

impl ObjectConstraints {
    /// Names of properties that must be present.
    pub fn required_properties(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, def)| def.is_required())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DateConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DateTimeConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timezone: TimezonePolicy,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileConstraints {
    /// Allowed MIME types. Entries may end in `/*` to allow a whole family.
    /// Empty allows any type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_mime_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyConstraints {
    #[serde(default = "default_api_key_min_length")]
    pub min_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

fn default_api_key_min_length() -> usize {
    8
}

impl Default for ApiKeyConstraints {
    fn default() -> Self {
        Self {
            min_length: default_api_key_min_length(),
            prefix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlConstraints {
    #[serde(default = "default_url_schemes")]
    pub schemes: Vec<String>,
}

fn default_url_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

impl Default for UrlConstraints {
    fn default() -> Self {
        Self {
            schemes: default_url_schemes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JsonConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

/// The type of a field together with its kind-specific constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    String(StringConstraints),
    Number(NumberConstraints),
    Boolean,
    Enum(EnumConstraints),
    Array(ArrayConstraints),
    Object(ObjectConstraints),
    Date(DateConstraints),
    Datetime(DateTimeConstraints),
    File(FileConstraints),
    ApiKey(ApiKeyConstraints),
    Url(UrlConstraints),
    Json(JsonConstraints),
}

impl FieldKind {
    /// The type tag, as used in serialized schemas.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Boolean => "boolean",
            Self::Enum(_) => "enum",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Date(_) => "date",
            Self::Datetime(_) => "datetime",
            Self::File(_) => "file",
            Self::ApiKey(_) => "api_key",
            Self::Url(_) => "url",
            Self::Json(_) => "json",
        }
    }
}

/// Human-facing documentation for a field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldDocs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FieldDocs {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.example.is_none() && self.label.is_none()
    }
}

/// Complete description of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    kind: FieldKind,
    #[serde(default)]
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(default, skip_serializing_if = "FieldDocs::is_empty")]
    docs: FieldDocs,
    #[serde(default)]
    sanitize: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    transforms: Vec<Transform>,
    #[serde(default)]
    sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    env_var: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    priority: Option<i32>,
}

impl FieldDefinition {
    /// Used by the builders; the only way to assemble a definition in code.
    pub(crate) fn from_parts(parts: FieldParts) -> Self {
        Self {
            kind: parts.kind,
            required: parts.required,
            default: parts.default,
            docs: parts.docs,
            sanitize: parts.sanitize,
            transforms: parts.transforms,
            sensitive: parts.sensitive,
            env_var: parts.env_var,
            category: parts.category,
            priority: parts.priority,
        }
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn docs(&self) -> &FieldDocs {
        &self.docs
    }

    pub fn description(&self) -> Option<&str> {
        self.docs.description.as_deref()
    }

    pub fn example(&self) -> Option<&Value> {
        self.docs.example.as_ref()
    }

    pub fn label(&self) -> Option<&str> {
        self.docs.label.as_deref()
    }

    pub fn sanitize(&self) -> bool {
        self.sanitize
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive || matches!(self.kind, FieldKind::ApiKey(_))
    }

    /// Environment variable consulted when a config value is not supplied.
    pub fn env_var(&self) -> Option<&str> {
        self.env_var.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }
}

/// Mutable staging area shared by all builders.
#[derive(Debug, Clone)]
pub(crate) struct FieldParts {
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<Value>,
    pub docs: FieldDocs,
    pub sanitize: bool,
    pub transforms: Vec<Transform>,
    pub sensitive: bool,
    pub env_var: Option<String>,
    pub category: Option<String>,
    pub priority: Option<i32>,
}

impl FieldParts {
    pub fn new(kind: FieldKind) -> Self {
        let sensitive = matches!(kind, FieldKind::ApiKey(_));
        Self {
            kind,
            // Fields are required unless marked otherwise.
            required: true,
            default: None,
            docs: FieldDocs::default(),
            sanitize: false,
            transforms: Vec::new(),
            sensitive,
            env_var: None,
            category: None,
            priority: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builder::{api_key_field, enum_field, number_field, string_field};

    #[test]
    fn test_kind_names() {
        assert_eq!(string_field().build().kind().name(), "string");
        assert_eq!(api_key_field().build().kind().name(), "api_key");
        assert_eq!(FieldKind::Boolean.name(), "boolean");
    }

    #[test]
    fn test_serialized_shape_uses_type_tag() {
        let def = number_field().min(1).max(10).integer().build();
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["kind"]["type"], "number");
        assert_eq!(json["kind"]["min"], 1.0);
        assert_eq!(json["kind"]["integer"], true);
        assert_eq!(json["required"], true);
    }

    #[test]
    fn test_definition_round_trips_through_json() {
        let def = enum_field(["basic", "advanced"])
            .label_for("basic", "Basic mode")
            .default("basic")
            .description("Operating mode")
            .build();
        let json = serde_json::to_value(&def).unwrap();
        let back: FieldDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn test_api_key_always_sensitive() {
        let def = api_key_field().build();
        assert!(def.is_sensitive());
        let json = serde_json::json!({"kind": {"type": "api_key"}, "required": true});
        let parsed: FieldDefinition = serde_json::from_value(json).unwrap();
        assert!(parsed.is_sensitive());
    }
}
