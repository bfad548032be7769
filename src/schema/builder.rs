//! Fluent field builders.
//!
//! Each constructor returns a builder restricted to the constraints that make
//! sense for its kind, so `string_field().min(3)` does not compile while
//! `string_field().min_length(3)` does. Builders are values: every mutator
//! consumes `self` and returns the updated builder. `build()` takes `&self`
//! and returns a fresh [`FieldDefinition`], so building twice yields two
//! independent definitions and nothing can reach back into one already built.
//!
//! ```
//! use toolsmith::schema::{number_field, string_field, Transform};
//!
//! let email = string_field()
//!     .email()
//!     .transform(Transform::Lowercase)
//!     .description("Where to send the report")
//!     .build();
//! assert!(email.is_required());
//!
//! let count = number_field().integer().range(1, 10).default(1).build();
//! assert!(!count.is_required());
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::schema::field::{
    AdditionalProperties, ApiKeyConstraints, ArrayConstraints, DateConstraints,
    DateTimeConstraints, EnumConstraints, FieldDefinition, FieldKind, FieldParts,
    FileConstraints, JsonConstraints, NumberConstraints, ObjectConstraints, StringConstraints,
    StringFormat, TimezonePolicy, Transform, UrlConstraints,
};

/// Mutators available on every builder.
macro_rules! common_builder_methods {
    () => {
        /// Mark the field as required. Overrides an earlier `optional()`.
        #[must_use]
        pub fn required(mut self) -> Self {
            self.parts.required = true;
            self
        }

        /// Mark the field as optional. Overrides an earlier `required()`.
        #[must_use]
        pub fn optional(mut self) -> Self {
            self.parts.required = false;
            self
        }

        /// Set a default value. Also marks the field optional.
        #[must_use]
        pub fn default(mut self, value: impl Into<Value>) -> Self {
            self.parts.default = Some(value.into());
            self.parts.required = false;
            self
        }

        #[must_use]
        pub fn description(mut self, description: impl Into<String>) -> Self {
            self.parts.docs.description = Some(description.into());
            self
        }

        #[must_use]
        pub fn example(mut self, example: impl Into<Value>) -> Self {
            self.parts.docs.example = Some(example.into());
            self
        }

        /// Human-readable label for forms and docs.
        #[must_use]
        pub fn label(mut self, label: impl Into<String>) -> Self {
            self.parts.docs.label = Some(label.into());
            self
        }

        /// Redact this field's value from logs, metrics, and error details.
        #[must_use]
        pub fn sensitive(mut self) -> Self {
            self.parts.sensitive = true;
            self
        }

        /// Config fields only: environment variable used when no value is supplied.
        #[must_use]
        pub fn env_var(mut self, name: impl Into<String>) -> Self {
            self.parts.env_var = Some(name.into());
            self
        }

        /// Config fields only: grouping used by generated docs.
        #[must_use]
        pub fn category(mut self, category: impl Into<String>) -> Self {
            self.parts.category = Some(category.into());
            self
        }

        /// Config fields only: ordering hint within a category.
        #[must_use]
        pub fn priority(mut self, priority: i32) -> Self {
            self.parts.priority = Some(priority);
            self
        }
    };
}

/// Implements `build()` by snapshotting the staged parts with the
/// kind-specific constraints assembled by the given closure.
macro_rules! impl_build {
    ($builder:ty, |$this:ident| $kind:expr) => {
        impl $builder {
            /// Snapshot the builder into an immutable definition.
            pub fn build(&self) -> FieldDefinition {
                let $this = self;
                let mut parts = $this.parts.clone();
                parts.kind = $kind;
                FieldDefinition::from_parts(parts)
            }
        }

        impl From<$builder> for FieldDefinition {
            fn from(builder: $builder) -> Self {
                builder.build()
            }
        }
    };
}

// --- String ---

#[derive(Debug, Clone)]
pub struct StringFieldBuilder {
    parts: FieldParts,
    constraints: StringConstraints,
}

/// Start a string field.
pub fn string_field() -> StringFieldBuilder {
    StringFieldBuilder {
        parts: FieldParts::new(FieldKind::String(StringConstraints::default())),
        constraints: StringConstraints::default(),
    }
}

impl StringFieldBuilder {
    common_builder_methods!();

    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.constraints.min_length = Some(min);
        self
    }

    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.constraints.max_length = Some(max);
        self
    }

    #[must_use]
    pub fn length(self, min: usize, max: usize) -> Self {
        self.min_length(min).max_length(max)
    }

    /// Regular expression the value must match (`regex` crate syntax, unanchored).
    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.constraints.pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn format(mut self, format: StringFormat) -> Self {
        self.constraints.format = Some(format);
        self
    }

    #[must_use]
    pub fn email(self) -> Self {
        self.format(StringFormat::Email)
    }

    #[must_use]
    pub fn uuid(self) -> Self {
        self.format(StringFormat::Uuid)
    }

    /// Append a transformation. Transformations run in the order added.
    #[must_use]
    pub fn transform(mut self, transform: Transform) -> Self {
        self.parts.transforms.push(transform);
        self
    }

    #[must_use]
    pub fn trim(self) -> Self {
        self.transform(Transform::Trim)
    }

    /// Strip markup and control characters from the value.
    #[must_use]
    pub fn sanitize(mut self) -> Self {
        self.parts.sanitize = true;
        self
    }
}

impl_build!(StringFieldBuilder, |b| FieldKind::String(b.constraints.clone()));

// --- Number ---

#[derive(Debug, Clone)]
pub struct NumberFieldBuilder {
    parts: FieldParts,
    constraints: NumberConstraints,
}

/// Start a number field.
pub fn number_field() -> NumberFieldBuilder {
    NumberFieldBuilder {
        parts: FieldParts::new(FieldKind::Number(NumberConstraints::default())),
        constraints: NumberConstraints::default(),
    }
}

impl NumberFieldBuilder {
    common_builder_methods!();

    #[must_use]
    pub fn min(mut self, min: impl Into<f64>) -> Self {
        self.constraints.min = Some(min.into());
        self
    }

    #[must_use]
    pub fn max(mut self, max: impl Into<f64>) -> Self {
        self.constraints.max = Some(max.into());
        self
    }

    #[must_use]
    pub fn range(self, min: impl Into<f64>, max: impl Into<f64>) -> Self {
        self.min(min).max(max)
    }

    #[must_use]
    pub fn integer(mut self) -> Self {
        self.constraints.integer = true;
        self
    }

    /// Maximum number of decimal places.
    #[must_use]
    pub fn precision(mut self, places: u32) -> Self {
        self.constraints.precision = Some(places);
        self
    }
}

impl_build!(NumberFieldBuilder, |b| FieldKind::Number(b.constraints.clone()));

// --- Boolean ---

#[derive(Debug, Clone)]
pub struct BooleanFieldBuilder {
    parts: FieldParts,
}

/// Start a boolean field.
pub fn boolean_field() -> BooleanFieldBuilder {
    BooleanFieldBuilder {
        parts: FieldParts::new(FieldKind::Boolean),
    }
}

impl BooleanFieldBuilder {
    common_builder_methods!();
}

impl_build!(BooleanFieldBuilder, |_b| FieldKind::Boolean);

// --- Enum ---

#[derive(Debug, Clone)]
pub struct EnumFieldBuilder {
    parts: FieldParts,
    constraints: EnumConstraints,
}

/// Start an enum field with the given allowed values.
pub fn enum_field<I, S>(values: I) -> EnumFieldBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let constraints = EnumConstraints {
        values: values.into_iter().map(Into::into).collect(),
        labels: BTreeMap::new(),
    };
    EnumFieldBuilder {
        parts: FieldParts::new(FieldKind::Enum(constraints.clone())),
        constraints,
    }
}

impl EnumFieldBuilder {
    common_builder_methods!();

    /// Display label for one of the allowed values.
    #[must_use]
    pub fn label_for(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.constraints.labels.insert(value.into(), label.into());
        self
    }
}

impl_build!(EnumFieldBuilder, |b| FieldKind::Enum(b.constraints.clone()));

// --- Array ---

#[derive(Debug, Clone)]
pub struct ArrayFieldBuilder {
    parts: FieldParts,
    items: FieldDefinition,
    min_items: Option<usize>,
    max_items: Option<usize>,
    unique: bool,
}

/// Start an array field whose elements must satisfy `items`.
pub fn array_field(items: impl Into<FieldDefinition>) -> ArrayFieldBuilder {
    let items = items.into();
    ArrayFieldBuilder {
        parts: FieldParts::new(FieldKind::Array(ArrayConstraints {
            items: Box::new(items.clone()),
            min_items: None,
            max_items: None,
            unique: false,
        })),
        items,
        min_items: None,
        max_items: None,
        unique: false,
    }
}

impl ArrayFieldBuilder {
    common_builder_methods!();

    #[must_use]
    pub fn min_items(mut self, min: usize) -> Self {
        self.min_items = Some(min);
        self
    }

    #[must_use]
    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Reject arrays containing duplicate elements.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

impl_build!(ArrayFieldBuilder, |b| FieldKind::Array(ArrayConstraints {
    items: Box::new(b.items.clone()),
    min_items: b.min_items,
    max_items: b.max_items,
    unique: b.unique,
}));

// --- Object ---

#[derive(Debug, Clone)]
pub struct ObjectFieldBuilder {
    parts: FieldParts,
    constraints: ObjectConstraints,
}

/// Start an object field with the given properties.
///
/// Which properties are required is taken from each property's own
/// `required()`/`optional()` setting.
pub fn object_field<I, K, F>(properties: I) -> ObjectFieldBuilder
where
    I: IntoIterator<Item = (K, F)>,
    K: Into<String>,
    F: Into<FieldDefinition>,
{
    let constraints = ObjectConstraints {
        properties: properties
            .into_iter()
            .map(|(k, f)| (k.into(), f.into()))
            .collect(),
        additional_properties: AdditionalProperties::default(),
    };
    ObjectFieldBuilder {
        parts: FieldParts::new(FieldKind::Object(constraints.clone())),
        constraints,
    }
}

impl ObjectFieldBuilder {
    common_builder_methods!();

    /// Add or replace a property.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, field: impl Into<FieldDefinition>) -> Self {
        self.constraints
            .properties
            .insert(name.into(), field.into());
        self
    }

    #[must_use]
    pub fn additional_properties(mut self, policy: AdditionalProperties) -> Self {
        self.constraints.additional_properties = policy;
        self
    }

    /// Shorthand for rejecting undeclared keys.
    #[must_use]
    pub fn strict(self) -> Self {
        self.additional_properties(AdditionalProperties::Reject)
    }
}

impl_build!(ObjectFieldBuilder, |b| FieldKind::Object(b.constraints.clone()));

// --- Date ---

#[derive(Debug, Clone)]
pub struct DateFieldBuilder {
    parts: FieldParts,
    constraints: DateConstraints,
}

/// Start a calendar date field (`YYYY-MM-DD`).
pub fn date_field() -> DateFieldBuilder {
    DateFieldBuilder {
        parts: FieldParts::new(FieldKind::Date(DateConstraints::default())),
        constraints: DateConstraints::default(),
    }
}

impl DateFieldBuilder {
    common_builder_methods!();

    #[must_use]
    pub fn min_date(mut self, min: NaiveDate) -> Self {
        self.constraints.min = Some(min);
        self
    }

    #[must_use]
    pub fn max_date(mut self, max: NaiveDate) -> Self {
        self.constraints.max = Some(max);
        self
    }
}

impl_build!(DateFieldBuilder, |b| FieldKind::Date(b.constraints.clone()));

// --- Datetime ---

#[derive(Debug, Clone)]
pub struct DateTimeFieldBuilder {
    parts: FieldParts,
    constraints: DateTimeConstraints,
}

/// Start an RFC 3339 datetime field.
pub fn datetime_field() -> DateTimeFieldBuilder {
    DateTimeFieldBuilder {
        parts: FieldParts::new(FieldKind::Datetime(DateTimeConstraints::default())),
        constraints: DateTimeConstraints::default(),
    }
}

impl DateTimeFieldBuilder {
    common_builder_methods!();

    #[must_use]
    pub fn min_datetime(mut self, min: DateTime<Utc>) -> Self {
        self.constraints.min = Some(min);
        self
    }

    #[must_use]
    pub fn max_datetime(mut self, max: DateTime<Utc>) -> Self {
        self.constraints.max = Some(max);
        self
    }

    #[must_use]
    pub fn timezone(mut self, policy: TimezonePolicy) -> Self {
        self.constraints.timezone = policy;
        self
    }

    #[must_use]
    pub fn utc_only(self) -> Self {
        self.timezone(TimezonePolicy::UtcOnly)
    }
}

impl_build!(DateTimeFieldBuilder, |b| FieldKind::Datetime(b.constraints.clone()));

// --- File ---

#[derive(Debug, Clone)]
pub struct FileFieldBuilder {
    parts: FieldParts,
    constraints: FileConstraints,
}

/// Start a file field.
///
/// Values are objects: `{ "name": "...", "mime_type"?: "...", "size"?: n,
/// "content"?: "<base64>" }`.
pub fn file_field() -> FileFieldBuilder {
    FileFieldBuilder {
        parts: FieldParts::new(FieldKind::File(FileConstraints::default())),
        constraints: FileConstraints::default(),
    }
}

impl FileFieldBuilder {
    common_builder_methods!();

    /// Allow a MIME type. `image/*` style wildcards are accepted.
    #[must_use]
    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.constraints.allowed_mime_types.push(mime.into());
        self
    }

    #[must_use]
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.constraints.max_size_bytes = Some(bytes);
        self
    }
}

impl_build!(FileFieldBuilder, |b| FieldKind::File(b.constraints.clone()));

// --- API key / secret ---

#[derive(Debug, Clone)]
pub struct ApiKeyFieldBuilder {
    parts: FieldParts,
    constraints: ApiKeyConstraints,
}

/// Start an API key field. Always sensitive.
pub fn api_key_field() -> ApiKeyFieldBuilder {
    ApiKeyFieldBuilder {
        parts: FieldParts::new(FieldKind::ApiKey(ApiKeyConstraints::default())),
        constraints: ApiKeyConstraints::default(),
    }
}

/// Start a generic secret field: an API key field with no length floor.
pub fn secret_field() -> ApiKeyFieldBuilder {
    api_key_field().min_length(1)
}

impl ApiKeyFieldBuilder {
    common_builder_methods!();

    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.constraints.min_length = min;
        self
    }

    /// Required key prefix, e.g. `sk-`.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.constraints.prefix = Some(prefix.into());
        self
    }
}

impl_build!(ApiKeyFieldBuilder, |b| FieldKind::ApiKey(b.constraints.clone()));

// --- URL ---

#[derive(Debug, Clone)]
pub struct UrlFieldBuilder {
    parts: FieldParts,
    constraints: UrlConstraints,
}

/// Start a URL field. Accepts `http` and `https` unless `schemes()` says otherwise.
pub fn url_field() -> UrlFieldBuilder {
    UrlFieldBuilder {
        parts: FieldParts::new(FieldKind::Url(UrlConstraints::default())),
        constraints: UrlConstraints::default(),
    }
}

impl UrlFieldBuilder {
    common_builder_methods!();

    /// Replace the allowed scheme list.
    #[must_use]
    pub fn schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints.schemes = schemes
            .into_iter()
            .map(|s| s.into().to_ascii_lowercase())
            .collect();
        self
    }
}

impl_build!(UrlFieldBuilder, |b| FieldKind::Url(b.constraints.clone()));

// --- JSON ---

#[derive(Debug, Clone)]
pub struct JsonFieldBuilder {
    parts: FieldParts,
    constraints: JsonConstraints,
}

/// Start a free-form JSON field.
pub fn json_field() -> JsonFieldBuilder {
    JsonFieldBuilder {
        parts: FieldParts::new(FieldKind::Json(JsonConstraints::default())),
        constraints: JsonConstraints::default(),
    }
}

impl JsonFieldBuilder {
    common_builder_methods!();

    /// Maximum nesting depth of arrays and objects.
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.constraints.max_depth = Some(depth);
        self
    }
}

impl_build!(JsonFieldBuilder, |b| FieldKind::Json(b.constraints.clone()));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_required_by_default() {
        assert!(string_field().build().is_required());
        assert!(boolean_field().build().is_required());
    }

    #[test]
    fn test_default_implies_optional() {
        let def = number_field().default(5).build();
        assert!(!def.is_required());
        assert_eq!(def.default_value(), Some(&serde_json::json!(5)));
    }

    #[test]
    fn test_last_required_call_wins() {
        assert!(!string_field().required().optional().build().is_required());
        assert!(string_field().optional().required().build().is_required());
        // required() after default() keeps the default but flips the flag back.
        let def = string_field().default("x").required().build();
        assert!(def.is_required());
        assert!(def.default_value().is_some());
    }

    #[test]
    fn test_build_snapshots_are_independent() {
        let builder = string_field().min_length(2);
        let first = builder.build();
        let second = builder.clone().max_length(5).build();

        match first.kind() {
            FieldKind::String(c) => assert_eq!(c.max_length, None),
            other => panic!("unexpected kind {other:?}"),
        }
        match second.kind() {
            FieldKind::String(c) => {
                assert_eq!(c.min_length, Some(2));
                assert_eq!(c.max_length, Some(5));
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(builder.build(), first);
    }

    #[test]
    fn test_nested_object_and_array() {
        let address = object_field([
            ("street", string_field().build()),
            ("zip", string_field().optional().build()),
        ]);
        let def = array_field(address).min_items(1).unique().build();

        let FieldKind::Array(array) = def.kind() else {
            panic!("expected array");
        };
        assert_eq!(array.min_items, Some(1));
        assert!(array.unique);
        let FieldKind::Object(object) = array.items.kind() else {
            panic!("expected object items");
        };
        assert_eq!(object.required_properties(), vec!["street"]);
    }

    #[test]
    fn test_transforms_keep_order() {
        let def = string_field()
            .trim()
            .transform(Transform::Lowercase)
            .build();
        assert_eq!(def.transforms(), &[Transform::Trim, Transform::Lowercase]);
    }

    #[test]
    fn test_config_metadata() {
        let def = api_key_field()
            .env_var("SERVICE_API_KEY")
            .category("auth")
            .priority(1)
            .build();
        assert_eq!(def.env_var(), Some("SERVICE_API_KEY"));
        assert_eq!(def.category(), Some("auth"));
        assert_eq!(def.priority(), Some(1));
        assert!(def.is_sensitive());
    }

    #[test]
    fn test_url_schemes_lowercased() {
        let def = url_field().schemes(["HTTPS", "ftp"]).build();
        let FieldKind::Url(c) = def.kind() else {
            panic!("expected url");
        };
        assert_eq!(c.schemes, vec!["https", "ftp"]);
    }

    #[test]
    fn test_secret_field_has_no_length_floor() {
        let FieldKind::ApiKey(c) = secret_field().build().kind().clone() else {
            panic!("expected api key");
        };
        assert_eq!(c.min_length, 1);
    }
}
