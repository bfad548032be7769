//! Schema definition: field model, builder DSL, cross-field rules.

pub mod builder;
pub mod definition;
pub mod field;
pub mod rules;

pub use builder::{
    ApiKeyFieldBuilder, ArrayFieldBuilder, BooleanFieldBuilder, DateFieldBuilder,
    DateTimeFieldBuilder, EnumFieldBuilder, FileFieldBuilder, JsonFieldBuilder,
    NumberFieldBuilder, ObjectFieldBuilder, StringFieldBuilder, UrlFieldBuilder, api_key_field,
    array_field, boolean_field, date_field, datetime_field, enum_field, file_field, json_field,
    number_field, object_field, secret_field, string_field, url_field,
};
pub use definition::{Schema, ToolSchema};
pub use field::{
    AdditionalProperties, ApiKeyConstraints, ArrayConstraints, DateConstraints,
    DateTimeConstraints, EnumConstraints, FieldDefinition, FieldDocs, FieldKind, FileConstraints,
    JsonConstraints, NumberConstraints, ObjectConstraints, StringConstraints, StringFormat,
    TimezonePolicy, Transform, UrlConstraints,
};
pub use rules::{Condition, CrossFieldRule};
