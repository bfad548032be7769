//! OpenAPI generation and example payloads.
//!
//! Everything here is a pure function of its inputs. `serde_json::Map` keeps
//! keys sorted, so the same schema always renders byte-identical output.

use serde_json::{Map, Value, json};

use crate::schema::{
    AdditionalProperties, FieldDefinition, FieldKind, Schema, StringFormat, ToolSchema,
};
use crate::tools::ToolMetadata;

/// Placeholder shown instead of sensitive example values.
pub const MASK: &str = "********";

const OPENAPI_VERSION: &str = "3.0.3";

/// OpenAPI schema fragment for one field.
pub fn field_schema(def: &FieldDefinition) -> Value {
    let mut out = kind_schema(def.kind());

    if let Some(description) = def.description() {
        out.insert("description".to_string(), json!(description));
    }
    if let Some(label) = def.label() {
        out.insert("title".to_string(), json!(label));
    }
    if let Some(default) = def.default_value() {
        let default = if def.is_sensitive() {
            json!(MASK)
        } else {
            default.clone()
        };
        out.insert("default".to_string(), default);
    }
    if let Some(example) = def.example() {
        let example = if def.is_sensitive() {
            json!(MASK)
        } else {
            example.clone()
        };
        out.insert("example".to_string(), example);
    }
    if def.is_sensitive() {
        out.insert("writeOnly".to_string(), json!(true));
        out.insert("x-sensitive".to_string(), json!(true));
    }
    if let Some(env_var) = def.env_var() {
        out.insert("x-env-var".to_string(), json!(env_var));
    }
    if let Some(category) = def.category() {
        out.insert("x-category".to_string(), json!(category));
    }
    if let Some(priority) = def.priority() {
        out.insert("x-priority".to_string(), json!(priority));
    }
    if !def.transforms().is_empty() {
        out.insert("x-transforms".to_string(), json!(def.transforms()));
    }

    Value::Object(out)
}

fn kind_schema(kind: &FieldKind) -> Map<String, Value> {
    let mut out = Map::new();
    match kind {
        FieldKind::String(c) => {
            out.insert("type".into(), json!("string"));
            if let Some(min) = c.min_length {
                out.insert("minLength".into(), json!(min));
            }
            if let Some(max) = c.max_length {
                out.insert("maxLength".into(), json!(max));
            }
            if let Some(pattern) = &c.pattern {
                out.insert("pattern".into(), json!(pattern));
            }
            if let Some(format) = c.format {
                out.insert("format".into(), json!(openapi_format(format)));
            }
        }
        FieldKind::Number(c) => {
            let ty = if c.integer { "integer" } else { "number" };
            out.insert("type".into(), json!(ty));
            if let Some(min) = c.min {
                out.insert("minimum".into(), number(min));
            }
            if let Some(max) = c.max {
                out.insert("maximum".into(), number(max));
            }
            if let Some(precision) = c.precision {
                out.insert("x-precision".into(), json!(precision));
            }
        }
        FieldKind::Boolean => {
            out.insert("type".into(), json!("boolean"));
        }
        FieldKind::Enum(c) => {
            out.insert("type".into(), json!("string"));
            out.insert("enum".into(), json!(c.values));
            if !c.labels.is_empty() {
                out.insert("x-enum-labels".into(), json!(c.labels));
            }
        }
        FieldKind::Array(c) => {
            out.insert("type".into(), json!("array"));
            out.insert("items".into(), field_schema(&c.items));
            if let Some(min) = c.min_items {
                out.insert("minItems".into(), json!(min));
            }
            if let Some(max) = c.max_items {
                out.insert("maxItems".into(), json!(max));
            }
            if c.unique {
                out.insert("uniqueItems".into(), json!(true));
            }
        }
        FieldKind::Object(c) => {
            out = object_schema(c.properties.iter(), &[]);
            match c.additional_properties {
                AdditionalProperties::Allow => {
                    out.insert("additionalProperties".into(), json!(true));
                }
                AdditionalProperties::Strip => {
                    out.insert("additionalProperties".into(), json!(true));
                    out.insert("x-additional-properties".into(), json!("strip"));
                }
                AdditionalProperties::Reject => {
                    out.insert("additionalProperties".into(), json!(false));
                }
            }
        }
        FieldKind::Date(c) => {
            out.insert("type".into(), json!("string"));
            out.insert("format".into(), json!("date"));
            if let Some(min) = c.min {
                out.insert("x-minimum".into(), json!(min.to_string()));
            }
            if let Some(max) = c.max {
                out.insert("x-maximum".into(), json!(max.to_string()));
            }
        }
        FieldKind::Datetime(c) => {
            out.insert("type".into(), json!("string"));
            out.insert("format".into(), json!("date-time"));
            if let Some(min) = c.min {
                out.insert("x-minimum".into(), json!(min.to_rfc3339()));
            }
            if let Some(max) = c.max {
                out.insert("x-maximum".into(), json!(max.to_rfc3339()));
            }
            out.insert("x-timezone".into(), json!(c.timezone));
        }
        FieldKind::File(c) => {
            out.insert("type".into(), json!("object"));
            out.insert(
                "properties".into(),
                json!({
                    "name": { "type": "string" },
                    "mime_type": { "type": "string" },
                    "size": { "type": "integer", "minimum": 0 },
                    "content": { "type": "string", "format": "byte" }
                }),
            );
            out.insert("required".into(), json!(["name"]));
            if !c.allowed_mime_types.is_empty() {
                out.insert("x-allowed-mime-types".into(), json!(c.allowed_mime_types));
            }
            if let Some(max) = c.max_size_bytes {
                out.insert("x-max-size-bytes".into(), json!(max));
            }
        }
        FieldKind::ApiKey(c) => {
            out.insert("type".into(), json!("string"));
            out.insert("format".into(), json!("password"));
            out.insert("minLength".into(), json!(c.min_length));
            if let Some(prefix) = &c.prefix {
                out.insert("x-prefix".into(), json!(prefix));
            }
        }
        FieldKind::Url(c) => {
            out.insert("type".into(), json!("string"));
            out.insert("format".into(), json!("uri"));
            out.insert("x-schemes".into(), json!(c.schemes));
        }
        FieldKind::Json(c) => {
            if let Some(depth) = c.max_depth {
                out.insert("x-max-depth".into(), json!(depth));
            }
        }
    }
    out
}

fn object_schema<'a>(
    fields: impl Iterator<Item = (&'a String, &'a FieldDefinition)>,
    rules: &[Value],
) -> Map<String, Value> {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for (name, def) in fields {
        properties.insert(name.clone(), field_schema(def));
        if def.is_required() {
            required.push(json!(name));
        }
    }

    let mut out = Map::new();
    out.insert("type".into(), json!("object"));
    out.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        out.insert("required".into(), Value::Array(required));
    }
    if !rules.is_empty() {
        out.insert("x-cross-field-rules".into(), Value::Array(rules.to_vec()));
    }
    out
}

/// OpenAPI object schema for a whole [`Schema`], cross-field rules included.
pub fn schema_object(schema: &Schema) -> Value {
    let rules: Vec<Value> = schema
        .rules()
        .iter()
        .filter_map(|rule| serde_json::to_value(rule).ok())
        .collect();
    Value::Object(object_schema(schema.fields().iter(), &rules))
}

fn openapi_format(format: StringFormat) -> &'static str {
    match format {
        StringFormat::Url => "uri",
        StringFormat::Datetime => "date-time",
        other => other.as_str(),
    }
}

/// Integral floats render without a trailing `.0`.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

/// Example value for one field: its `example`, else its default, else one
/// synthesized from its constraints.
pub fn example_value(def: &FieldDefinition) -> Value {
    if def.is_sensitive() {
        return json!(MASK);
    }
    if let Some(example) = def.example() {
        return example.clone();
    }
    if let Some(default) = def.default_value() {
        return default.clone();
    }
    synthesize(def.kind())
}

fn synthesize(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::String(c) => {
            if let Some(format) = c.format {
                return json!(format_sample(format));
            }
            let mut s = "example".to_string();
            if let Some(min) = c.min_length
                && s.chars().count() < min
            {
                s.extend(std::iter::repeat_n('x', min - s.chars().count()));
            }
            if let Some(max) = c.max_length {
                s = s.chars().take(max).collect();
            }
            json!(s)
        }
        FieldKind::Number(c) => {
            let value = match (c.min, c.max) {
                (Some(min), Some(max)) => min + (max - min) / 2.0,
                (Some(min), None) => min,
                (None, Some(max)) => max.min(0.0),
                (None, None) => 0.0,
            };
            if c.integer {
                let floored = value.floor();
                let value = match c.min {
                    Some(min) if floored < min => min.ceil(),
                    _ => floored,
                };
                json!(value as i64)
            } else {
                number(value)
            }
        }
        FieldKind::Boolean => json!(true),
        FieldKind::Enum(c) => c.values.first().map(|v| json!(v)).unwrap_or(Value::Null),
        FieldKind::Array(c) => {
            let item = example_value(&c.items);
            let count = if c.unique {
                1
            } else {
                c.min_items.unwrap_or(1).max(1)
            };
            let count = c.max_items.map_or(count, |max| count.min(max));
            Value::Array(vec![item; count])
        }
        FieldKind::Object(c) => Value::Object(
            c.properties
                .iter()
                .map(|(name, def)| (name.clone(), example_value(def)))
                .collect(),
        ),
        FieldKind::Date(c) => json!(c.min.map_or_else(|| "2024-01-01".to_string(), |d| d.to_string())),
        FieldKind::Datetime(c) => json!(
            c.min
                .map_or_else(|| "2024-01-01T00:00:00Z".to_string(), |d| d.to_rfc3339())
        ),
        FieldKind::File(c) => {
            let mime = c
                .allowed_mime_types
                .iter()
                .find(|m| !m.ends_with("/*"))
                .cloned()
                .unwrap_or_else(|| "application/pdf".to_string());
            json!({ "name": "document", "mime_type": mime })
        }
        FieldKind::ApiKey(c) => {
            let prefix = c.prefix.clone().unwrap_or_default();
            json!(format!("{prefix}{}", "x".repeat(c.min_length)))
        }
        FieldKind::Url(c) => {
            let scheme = c.schemes.first().map(String::as_str).unwrap_or("https");
            json!(format!("{scheme}://example.com"))
        }
        FieldKind::Json(_) => json!({}),
    }
}

fn format_sample(format: StringFormat) -> &'static str {
    match format {
        StringFormat::Email => "user@example.com",
        StringFormat::Url => "https://example.com",
        StringFormat::Uuid => "00000000-0000-4000-8000-000000000000",
        StringFormat::Ipv4 => "192.0.2.1",
        StringFormat::Ipv6 => "2001:db8::1",
        StringFormat::Hostname => "example.com",
        StringFormat::Date => "2024-01-01",
        StringFormat::Datetime => "2024-01-01T00:00:00Z",
        StringFormat::Phone => "+15555550100",
    }
}

/// Example document for a schema: one entry per field.
pub fn schema_example(schema: &Schema) -> Value {
    Value::Object(
        schema
            .fields()
            .iter()
            .map(|(name, def)| (name.clone(), example_value(def)))
            .collect(),
    )
}

/// Example `POST /api/execute` body. Sensitive values are masked.
pub fn example_request(schema: &ToolSchema) -> Value {
    let mut body = Map::new();
    body.insert("input_data".into(), schema_example(&schema.input));
    if !schema.config.is_empty() {
        body.insert("config".into(), schema_example(&schema.config));
    }
    Value::Object(body)
}

/// Full OpenAPI 3.0.3 document for a tool.
pub fn openapi_document(metadata: &ToolMetadata, schema: &ToolSchema) -> Value {
    let mut schemas = Map::new();
    schemas.insert("Input".into(), schema_object(&schema.input));
    schemas.insert("Config".into(), schema_object(&schema.config));
    schemas.insert(
        "ExecuteRequest".into(),
        json!({
            "type": "object",
            "properties": {
                "input_data": { "$ref": "#/components/schemas/Input" },
                "config": { "$ref": "#/components/schemas/Config" }
            },
            "required": ["input_data"]
        }),
    );
    schemas.insert(
        "ExecutionError".into(),
        json!({
            "type": "object",
            "properties": {
                "code": { "type": "string" },
                "message": { "type": "string" },
                "type": {
                    "type": "string",
                    "enum": [
                        "validation_error", "configuration_error", "execution_error",
                        "network_error", "timeout_error", "client_error",
                        "server_error", "system_error"
                    ]
                },
                "retryable": { "type": "boolean" },
                "retry_after_ms": { "type": "integer" },
                "details": {}
            },
            "required": ["code", "message", "type", "retryable"]
        }),
    );
    schemas.insert(
        "ExecuteResponse".into(),
        json!({
            "type": "object",
            "properties": {
                "execution_id": { "type": "string", "format": "uuid" },
                "status": { "type": "string", "enum": ["success", "error", "timeout", "cancelled"] },
                "output_data": {},
                "error_code": { "type": "string" },
                "error_message": { "type": "string" },
                "error_details": {},
                "error": { "$ref": "#/components/schemas/ExecutionError" },
                "execution_time_ms": { "type": "integer", "minimum": 0 },
                "timestamp": { "type": "string", "format": "date-time" },
                "warnings": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["execution_id", "status", "execution_time_ms", "timestamp"]
        }),
    );
    schemas.insert(
        "HealthResponse".into(),
        json!({
            "type": "object",
            "properties": {
                "status": { "type": "string", "enum": ["healthy", "degraded", "unhealthy"] },
                "state": { "type": "string" },
                "version": { "type": "string" },
                "tool_metadata": { "type": "object" },
                "capabilities": { "type": "array", "items": { "type": "string" } },
                "uptime_seconds": { "type": "integer" },
                "timestamp": { "type": "string", "format": "date-time" }
            },
            "required": ["status", "version"]
        }),
    );
    schemas.insert(
        "MetricsSnapshot".into(),
        json!({
            "type": "object",
            "properties": {
                "totalExecutions": { "type": "integer" },
                "successfulExecutions": { "type": "integer" },
                "failedExecutions": { "type": "integer" },
                "averageExecutionTimeMs": { "type": "number" },
                "errorRatePercent": { "type": "number" },
                "requestsPerMinute": { "type": "integer" },
                "uptimeSeconds": { "type": "integer" },
                "recentErrors": { "type": "array", "items": { "type": "object" } },
                "errorCounts": { "type": "object", "additionalProperties": { "type": "integer" } }
            }
        }),
    );

    let error_response = |description: &str| {
        json!({
            "description": description,
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/ExecuteResponse" }
                }
            }
        })
    };
    let json_response = |description: &str, schema_ref: &str| {
        json!({
            "description": description,
            "content": {
                "application/json": {
                    "schema": { "$ref": format!("#/components/schemas/{schema_ref}") }
                }
            }
        })
    };

    let mut info = Map::new();
    info.insert("title".into(), json!(metadata.name));
    info.insert("version".into(), json!(metadata.version));
    if !metadata.description.is_empty() {
        info.insert("description".into(), json!(metadata.description));
    }
    if !metadata.capabilities.is_empty() {
        info.insert("x-capabilities".into(), json!(metadata.capabilities));
    }
    if !metadata.tags.is_empty() {
        info.insert("x-tags".into(), json!(metadata.tags));
    }

    json!({
        "openapi": OPENAPI_VERSION,
        "info": info,
        "paths": {
            "/api/execute": {
                "post": {
                    "operationId": "execute",
                    "summary": format!("Execute {}", metadata.name),
                    "security": [{ "ApiKeyAuth": [] }, { "BearerAuth": [] }],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/ExecuteRequest" },
                                "example": example_request(schema)
                            }
                        }
                    },
                    "responses": {
                        "200": json_response("Execution succeeded", "ExecuteResponse"),
                        "400": error_response("Invalid JSON or validation failure"),
                        "401": error_response("Missing or invalid API key"),
                        "429": error_response("Rate limit exceeded"),
                        "500": error_response("Execution or internal failure"),
                        "503": error_response("Tool is not running"),
                        "504": error_response("Execution timed out")
                    }
                }
            },
            "/health": {
                "get": {
                    "operationId": "health",
                    "responses": { "200": json_response("Health report", "HealthResponse") }
                }
            },
            "/ready": {
                "get": {
                    "operationId": "ready",
                    "responses": {
                        "200": { "description": "Tool is running" },
                        "503": { "description": "Tool is not running" }
                    }
                }
            },
            "/schema": {
                "get": {
                    "operationId": "schema",
                    "responses": { "200": { "description": "This document" } }
                }
            },
            "/metrics": {
                "get": {
                    "operationId": "metrics",
                    "responses": { "200": json_response("Metrics snapshot", "MetricsSnapshot") }
                }
            }
        },
        "components": {
            "schemas": schemas,
            "securitySchemes": {
                "ApiKeyAuth": { "type": "apiKey", "in": "header", "name": "x-api-key" },
                "BearerAuth": { "type": "http", "scheme": "bearer" }
            }
        }
    })
}
