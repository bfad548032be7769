//! Validation engine.
//!
//! Runs compiled validators against input. Per field, in order:
//!
//! 1. absent (or `null`) with a default: inject the default, stop
//! 2. absent and required: `REQUIRED_FIELD_MISSING`, stop
//! 3. wrong JSON type: `INVALID_TYPE`, stop
//! 4. every kind-specific constraint, collecting all violations
//! 5. sanitize and transform, only if the field produced no errors
//!
//! Cross-field rules run afterwards and only when no field failed.
//! Ordinary invalid input never produces an `Err`; that is reserved for
//! schemas that fail to compile.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Instant;

use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CompileError;
use crate::schema::{
    AdditionalProperties, ApiKeyConstraints, DateConstraints, DateTimeConstraints,
    EnumConstraints, FileConstraints, JsonConstraints, NumberConstraints, Schema,
    StringConstraints, TimezonePolicy, UrlConstraints,
};
use crate::validation::compiler::{CompiledField, CompiledSchema, SchemaCompiler, Validator};
use crate::validation::error::{FieldError, FieldErrorCode, PathSegment};
use crate::validation::formats::matches_format;
use crate::validation::metrics::{ValidationMetrics, ValidationRecorder};
use crate::validation::transform;

/// What to do with top-level keys the schema does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFields {
    /// Drop them from the output.
    #[default]
    Strip,
    /// Report each one as `UNEXPECTED_FIELDS`.
    Reject,
}

/// Per-call validation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    pub unknown_fields: UnknownFields,
    /// Apply `sanitize` on fields that request it.
    pub sanitize: bool,
    /// Apply each field's transformations.
    pub transform: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            unknown_fields: UnknownFields::Strip,
            sanitize: true,
            transform: true,
        }
    }
}

impl ValidationOptions {
    /// Options that reject unknown top-level fields.
    pub fn strict() -> Self {
        Self {
            unknown_fields: UnknownFields::Reject,
            ..Self::default()
        }
    }
}

/// Result of validating one document.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Defaults injected, unknown fields handled, transformations applied.
    Valid { data: Value },
    /// Every error found, in field order.
    Invalid { errors: Vec<FieldError> },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn errors(&self) -> &[FieldError] {
        match self {
            Self::Valid { .. } => &[],
            Self::Invalid { errors } => errors,
        }
    }

    pub fn into_result(self) -> Result<Value, Vec<FieldError>> {
        match self {
            Self::Valid { data } => Ok(data),
            Self::Invalid { errors } => Err(errors),
        }
    }
}

/// Validates documents against schemas, compiling through a shared cache.
#[derive(Debug, Default)]
pub struct ValidationEngine {
    compiler: SchemaCompiler,
    recorder: ValidationRecorder,
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compiler(compiler: SchemaCompiler) -> Self {
        Self {
            compiler,
            recorder: ValidationRecorder::default(),
        }
    }

    pub fn compiler(&self) -> &SchemaCompiler {
        &self.compiler
    }

    /// Compile (or fetch from cache) and validate.
    pub fn validate(
        &self,
        schema: &Schema,
        data: &Value,
        options: &ValidationOptions,
    ) -> Result<ValidationOutcome, CompileError> {
        let started = Instant::now();
        let (compiled, cache_hit) = self.compiler.compile_tracked(schema)?;
        let outcome = validate_document(&compiled, data, options);
        self.recorder.record(started.elapsed(), !outcome.is_valid());
        tracing::trace!(
            cache_hit,
            valid = outcome.is_valid(),
            errors = outcome.errors().len(),
            "Validated document"
        );
        Ok(outcome)
    }

    /// Validate against an already compiled schema.
    pub fn validate_compiled(
        &self,
        compiled: &CompiledSchema,
        data: &Value,
        options: &ValidationOptions,
    ) -> ValidationOutcome {
        let started = Instant::now();
        let outcome = validate_document(compiled, data, options);
        self.recorder.record(started.elapsed(), !outcome.is_valid());
        outcome
    }

    pub fn get_metrics(&self) -> ValidationMetrics {
        self.recorder.snapshot(self.compiler.cache_stats())
    }
}

fn validate_document(
    compiled: &CompiledSchema,
    data: &Value,
    options: &ValidationOptions,
) -> ValidationOutcome {
    let empty = Map::new();
    let input = match data {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return ValidationOutcome::Invalid {
                errors: vec![FieldError::new(
                    FieldErrorCode::InvalidType,
                    &[],
                    format!("expected an object, got {}", json_type(other)),
                )],
            };
        }
    };

    let mut errors = Vec::new();
    let mut output = Map::new();
    let mut path = Vec::new();

    for (name, field) in compiled.fields() {
        path.push(PathSegment::Key(name.clone()));
        if let Some(value) = validate_field(field, input.get(name), &mut path, options, &mut errors)
        {
            output.insert(name.clone(), value);
        }
        path.pop();
    }

    for key in input.keys() {
        if compiled.fields().contains_key(key) {
            continue;
        }
        match options.unknown_fields {
            UnknownFields::Strip => {}
            UnknownFields::Reject => errors.push(FieldError::new(
                FieldErrorCode::UnexpectedFields,
                &[PathSegment::Key(key.clone())],
                "field is not declared in the schema",
            )),
        }
    }

    if !errors.is_empty() {
        return ValidationOutcome::Invalid { errors };
    }

    let output = Value::Object(output);
    let rule_errors: Vec<FieldError> = compiled
        .rules()
        .iter()
        .filter(|rule| rule.is_violated(&output))
        .map(|rule| {
            FieldError::new(
                FieldErrorCode::CrossFieldValidationFailed,
                &[],
                rule.message.clone(),
            )
        })
        .collect();

    if rule_errors.is_empty() {
        ValidationOutcome::Valid { data: output }
    } else {
        ValidationOutcome::Invalid {
            errors: rule_errors,
        }
    }
}

/// Validate a present value with no transformations, returning its errors.
pub(crate) fn check_value(field: &CompiledField, value: &Value) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let options = ValidationOptions {
        sanitize: false,
        transform: false,
        ..ValidationOptions::default()
    };
    validate_field(field, Some(value), &mut Vec::new(), &options, &mut errors);
    errors
}

/// Returns the output value, or `None` when the field is absent from the
/// output (optional without default) or failed.
fn validate_field(
    field: &CompiledField,
    value: Option<&Value>,
    path: &mut Vec<PathSegment>,
    options: &ValidationOptions,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        if let Some(default) = &field.default {
            return Some(default.clone());
        }
        if field.required {
            errors.push(FieldError::new(
                FieldErrorCode::RequiredFieldMissing,
                path,
                "field is required",
            ));
        }
        return None;
    };

    let before = errors.len();
    let checked = check_validator(&field.validator, value, path, options, errors);
    if errors.len() > before {
        return None;
    }

    match checked {
        Some(Value::String(s)) if field.sanitize || !field.transforms.is_empty() => {
            let mut s = s;
            if options.sanitize && field.sanitize {
                s = transform::sanitize(&s);
            }
            if options.transform {
                s = transform::apply_all(&field.transforms, &s);
            }
            Some(Value::String(s))
        }
        other => other,
    }
}

fn check_validator(
    validator: &Validator,
    value: &Value,
    path: &mut Vec<PathSegment>,
    options: &ValidationOptions,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    match validator {
        Validator::String {
            constraints,
            pattern,
        } => {
            let s = expect_str(value, "string", path, errors)?;
            check_string(s, constraints, pattern.as_ref(), path, errors);
        }
        Validator::Number(constraints) => {
            let Value::Number(n) = value else {
                errors.push(type_error("number", value, path));
                return None;
            };
            check_number(n, constraints, path, errors);
        }
        Validator::Boolean => {
            if !value.is_boolean() {
                errors.push(type_error("boolean", value, path));
                return None;
            }
        }
        Validator::Enum(constraints) => {
            let s = expect_str(value, "string", path, errors)?;
            check_enum(s, constraints, path, errors);
        }
        Validator::Array {
            items,
            min_items,
            max_items,
            unique,
        } => {
            let Value::Array(elements) = value else {
                errors.push(type_error("array", value, path));
                return None;
            };
            return check_array(
                elements, items, *min_items, *max_items, *unique, path, options, errors,
            );
        }
        Validator::Object {
            properties,
            additional,
        } => {
            let Value::Object(map) = value else {
                errors.push(type_error("object", value, path));
                return None;
            };
            return check_object(map, properties, *additional, path, options, errors);
        }
        Validator::Date(constraints) => {
            let s = expect_str(value, "date string", path, errors)?;
            check_date(s, constraints, path, errors);
        }
        Validator::Datetime(constraints) => {
            let s = expect_str(value, "datetime string", path, errors)?;
            check_datetime(s, constraints, path, errors);
        }
        Validator::File(constraints) => {
            let Value::Object(map) = value else {
                errors.push(type_error("file object", value, path));
                return None;
            };
            check_file(map, constraints, path, errors);
        }
        Validator::ApiKey(constraints) => {
            let s = expect_str(value, "string", path, errors)?;
            check_api_key(s, constraints, path, errors);
        }
        Validator::Url(constraints) => {
            let s = expect_str(value, "string", path, errors)?;
            check_url(s, constraints, path, errors);
        }
        Validator::Json(constraints) => check_json(value, constraints, path, errors),
    }
    Some(value.clone())
}

fn expect_str<'a>(
    value: &'a Value,
    expected: &str,
    path: &[PathSegment],
    errors: &mut Vec<FieldError>,
) -> Option<&'a str> {
    match value.as_str() {
        Some(s) => Some(s),
        None => {
            errors.push(type_error(expected, value, path));
            None
        }
    }
}

fn type_error(expected: &str, value: &Value, path: &[PathSegment]) -> FieldError {
    FieldError::new(
        FieldErrorCode::InvalidType,
        path,
        format!("expected {expected}, got {}", json_type(value)),
    )
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_string(
    s: &str,
    c: &StringConstraints,
    pattern: Option<&regex::Regex>,
    path: &[PathSegment],
    errors: &mut Vec<FieldError>,
) {
    let len = s.chars().count();
    if let Some(min) = c.min_length
        && len < min
    {
        errors.push(FieldError::new(
            FieldErrorCode::TooSmall,
            path,
            format!("must be at least {min} characters"),
        ));
    }
    if let Some(max) = c.max_length
        && len > max
    {
        errors.push(FieldError::new(
            FieldErrorCode::TooBig,
            path,
            format!("must be at most {max} characters"),
        ));
    }
    if let Some(re) = pattern
        && !re.is_match(s)
    {
        errors.push(FieldError::new(
            FieldErrorCode::PatternMismatch,
            path,
            format!("must match pattern {}", re.as_str()),
        ));
    }
    if let Some(format) = c.format
        && !matches_format(format, s)
    {
        errors.push(FieldError::new(
            FieldErrorCode::InvalidFormat,
            path,
            format!("must be a valid {format}"),
        ));
    }
}

fn check_number(
    n: &serde_json::Number,
    c: &NumberConstraints,
    path: &[PathSegment],
    errors: &mut Vec<FieldError>,
) {
    let Some(value) = n.as_f64() else {
        errors.push(FieldError::new(
            FieldErrorCode::InvalidType,
            path,
            "number is not representable",
        ));
        return;
    };

    if c.integer && value.fract() != 0.0 {
        errors.push(FieldError::new(
            FieldErrorCode::NotInteger,
            path,
            "must be an integer",
        ));
    }
    if let Some(min) = c.min
        && value < min
    {
        errors.push(FieldError::new(
            FieldErrorCode::TooSmall,
            path,
            format!("must be at least {min}"),
        ));
    }
    if let Some(max) = c.max
        && value > max
    {
        errors.push(FieldError::new(
            FieldErrorCode::TooBig,
            path,
            format!("must be at most {max}"),
        ));
    }
    if let Some(places) = c.precision
        && decimal_places(n).is_some_and(|scale| scale > places)
    {
        errors.push(FieldError::new(
            FieldErrorCode::PrecisionExceeded,
            path,
            format!("must have at most {places} decimal places"),
        ));
    }
}

/// Decimal places in the number's JSON text, ignoring trailing zeros.
fn decimal_places(n: &serde_json::Number) -> Option<u32> {
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
        .map(|d| d.normalize().scale())
}

fn check_enum(
    s: &str,
    c: &EnumConstraints,
    path: &[PathSegment],
    errors: &mut Vec<FieldError>,
) {
    if !c.values.iter().any(|v| v == s) {
        errors.push(FieldError::new(
            FieldErrorCode::InvalidEnumValue,
            path,
            format!("must be one of: {}", c.values.join(", ")),
        ));
    }
}

#[allow(clippy::too_many_arguments)]
fn check_array(
    elements: &[Value],
    items: &CompiledField,
    min_items: Option<usize>,
    max_items: Option<usize>,
    unique: bool,
    path: &mut Vec<PathSegment>,
    options: &ValidationOptions,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    let before = errors.len();
    let mut output = Vec::with_capacity(elements.len());

    for (index, element) in elements.iter().enumerate() {
        path.push(PathSegment::Index(index));
        let item = validate_field(items, Some(element), path, options, errors);
        output.push(item.unwrap_or(Value::Null));
        path.pop();
    }

    if let Some(min) = min_items
        && elements.len() < min
    {
        errors.push(FieldError::new(
            FieldErrorCode::TooSmall,
            path,
            format!("must contain at least {min} items"),
        ));
    }
    if let Some(max) = max_items
        && elements.len() > max
    {
        errors.push(FieldError::new(
            FieldErrorCode::TooBig,
            path,
            format!("must contain at most {max} items"),
        ));
    }
    if unique && has_duplicates(elements) {
        errors.push(FieldError::new(
            FieldErrorCode::DuplicateItems,
            path,
            "items must be unique",
        ));
    }

    (errors.len() == before).then_some(Value::Array(output))
}

// Object keys serialize sorted, so equal values share one canonical string.
fn has_duplicates(elements: &[Value]) -> bool {
    let mut seen = HashSet::with_capacity(elements.len());
    elements
        .iter()
        .any(|item| !seen.insert(serde_json::to_string(item).unwrap_or_default()))
}

fn check_object(
    map: &Map<String, Value>,
    properties: &std::collections::BTreeMap<String, CompiledField>,
    additional: AdditionalProperties,
    path: &mut Vec<PathSegment>,
    options: &ValidationOptions,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    let before = errors.len();
    let mut output = Map::new();

    for (name, property) in properties {
        path.push(PathSegment::Key(name.clone()));
        if let Some(value) = validate_field(property, map.get(name), path, options, errors) {
            output.insert(name.clone(), value);
        }
        path.pop();
    }

    for (key, value) in map {
        if properties.contains_key(key) {
            continue;
        }
        match additional {
            AdditionalProperties::Allow => {
                output.insert(key.clone(), value.clone());
            }
            AdditionalProperties::Strip => {}
            AdditionalProperties::Reject => {
                path.push(PathSegment::Key(key.clone()));
                errors.push(FieldError::new(
                    FieldErrorCode::UnexpectedFields,
                    path,
                    "field is not declared in the schema",
                ));
                path.pop();
            }
        }
    }

    (errors.len() == before).then_some(Value::Object(output))
}

fn check_date(s: &str, c: &DateConstraints, path: &[PathSegment], errors: &mut Vec<FieldError>) {
    let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") else {
        errors.push(FieldError::new(
            FieldErrorCode::InvalidDate,
            path,
            "must be a date in YYYY-MM-DD format",
        ));
        return;
    };
    if let Some(min) = c.min
        && date < min
    {
        errors.push(FieldError::new(
            FieldErrorCode::TooSmall,
            path,
            format!("must be on or after {min}"),
        ));
    }
    if let Some(max) = c.max
        && date > max
    {
        errors.push(FieldError::new(
            FieldErrorCode::TooBig,
            path,
            format!("must be on or before {max}"),
        ));
    }
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

fn check_datetime(
    s: &str,
    c: &DateTimeConstraints,
    path: &[PathSegment],
    errors: &mut Vec<FieldError>,
) {
    let instant = if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        if c.timezone == TimezonePolicy::UtcOnly && parsed.offset().local_minus_utc() != 0 {
            errors.push(FieldError::new(
                FieldErrorCode::InvalidTimezone,
                path,
                "must be expressed in UTC",
            ));
        }
        parsed.with_timezone(&Utc)
    } else if let Some(naive) = parse_naive_datetime(s) {
        // No offset given: read as UTC, but only where the policy allows it.
        if c.timezone != TimezonePolicy::Any {
            errors.push(FieldError::new(
                FieldErrorCode::InvalidTimezone,
                path,
                "must include a timezone offset",
            ));
        }
        naive.and_utc()
    } else {
        errors.push(FieldError::new(
            FieldErrorCode::InvalidDate,
            path,
            "must be an RFC 3339 datetime",
        ));
        return;
    };
    if let Some(min) = c.min
        && instant < min
    {
        errors.push(FieldError::new(
            FieldErrorCode::TooSmall,
            path,
            format!("must be at or after {}", min.to_rfc3339()),
        ));
    }
    if let Some(max) = c.max
        && instant > max
    {
        errors.push(FieldError::new(
            FieldErrorCode::TooBig,
            path,
            format!("must be at or before {}", max.to_rfc3339()),
        ));
    }
}

fn check_file(
    map: &Map<String, Value>,
    c: &FileConstraints,
    path: &mut Vec<PathSegment>,
    errors: &mut Vec<FieldError>,
) {
    let name = map.get("name").and_then(Value::as_str).filter(|n| !n.is_empty());
    let Some(name) = name else {
        path.push(PathSegment::Key("name".to_string()));
        errors.push(FieldError::new(
            FieldErrorCode::RequiredFieldMissing,
            path,
            "file name is required",
        ));
        path.pop();
        return;
    };

    if !c.allowed_mime_types.is_empty() {
        let mime = map
            .get("mime_type")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase)
            .or_else(|| mime_guess::from_path(name).first_raw().map(str::to_string));
        let allowed = mime
            .as_deref()
            .is_some_and(|m| c.allowed_mime_types.iter().any(|a| mime_matches(a, m)));
        if !allowed {
            errors.push(FieldError::new(
                FieldErrorCode::InvalidMimeType,
                path,
                format!("type must be one of: {}", c.allowed_mime_types.join(", ")),
            ));
        }
    }

    let size = match (map.get("size").and_then(Value::as_u64), map.get("content")) {
        (Some(size), _) => Some(size),
        (None, Some(Value::String(content))) => {
            match base64::engine::general_purpose::STANDARD.decode(content) {
                Ok(bytes) => Some(bytes.len() as u64),
                Err(_) => {
                    path.push(PathSegment::Key("content".to_string()));
                    errors.push(FieldError::new(
                        FieldErrorCode::InvalidFormat,
                        path,
                        "content must be base64",
                    ));
                    path.pop();
                    None
                }
            }
        }
        _ => None,
    };
    if let (Some(max), Some(size)) = (c.max_size_bytes, size)
        && size > max
    {
        errors.push(FieldError::new(
            FieldErrorCode::FileTooLarge,
            path,
            format!("file must be at most {max} bytes"),
        ));
    }
}

fn mime_matches(allowed: &str, actual: &str) -> bool {
    let allowed = allowed.to_ascii_lowercase();
    match allowed.strip_suffix("/*") {
        Some(family) => actual
            .split_once('/')
            .is_some_and(|(top, _)| top == family),
        None => allowed == actual,
    }
}

fn check_api_key(
    s: &str,
    c: &ApiKeyConstraints,
    path: &[PathSegment],
    errors: &mut Vec<FieldError>,
) {
    if s.chars().count() < c.min_length {
        errors.push(FieldError::new(
            FieldErrorCode::TooSmall,
            path,
            format!("must be at least {} characters", c.min_length),
        ));
    }
    if let Some(prefix) = &c.prefix
        && !s.starts_with(prefix.as_str())
    {
        errors.push(FieldError::new(
            FieldErrorCode::InvalidFormat,
            path,
            format!("must start with '{prefix}'"),
        ));
    }
}

fn check_url(s: &str, c: &UrlConstraints, path: &[PathSegment], errors: &mut Vec<FieldError>) {
    match url::Url::parse(s) {
        Ok(parsed) if c.schemes.iter().any(|scheme| scheme == parsed.scheme()) => {}
        Ok(_) => errors.push(FieldError::new(
            FieldErrorCode::InvalidUrl,
            path,
            format!("scheme must be one of: {}", c.schemes.join(", ")),
        )),
        Err(e) => errors.push(FieldError::new(
            FieldErrorCode::InvalidUrl,
            path,
            format!("must be a valid URL: {e}"),
        )),
    }
}

fn check_json(
    value: &Value,
    c: &JsonConstraints,
    path: &[PathSegment],
    errors: &mut Vec<FieldError>,
) {
    if let Some(max) = c.max_depth
        && depth(value) > max
    {
        errors.push(FieldError::new(
            FieldErrorCode::MaxDepthExceeded,
            path,
            format!("nesting must not exceed depth {max}"),
        ));
    }
}

fn depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}
