//! Redaction of sensitive values before they reach logs or error details.
//!
//! Three layers:
//! - key heuristics (`authorization`, `*token*`, ...) for arbitrary JSON
//! - schema flags: any field marked `sensitive` (API key fields always are)
//! - literal scrubbing of known secret strings out of free text

use serde_json::{Map, Value};

use crate::schema::{FieldDefinition, FieldKind, Schema};

pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_EXACT: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "api-key",
    "api_key",
    "apikey",
    "access_token",
    "refresh_token",
    "id_token",
    "token",
    "password",
    "passwd",
    "secret",
    "client_secret",
    "private_key",
];
const SENSITIVE_SUBSTRINGS: &[&str] = &["token", "secret", "password", "credential", "auth"];

/// Secrets shorter than this are not scrubbed from text; they would match
/// ordinary words.
const MIN_SCRUB_LEN: usize = 4;

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    if SENSITIVE_EXACT.contains(&lower.as_str()) {
        return true;
    }
    SENSITIVE_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

fn redact_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => redact_object(map),
        Value::Array(items) => {
            for item in items {
                redact_in_place(item);
            }
        }
        _ => {}
    }
}

fn redact_object(map: &mut Map<String, Value>) {
    for (key, val) in map {
        if is_sensitive_key(key) {
            *val = Value::String(REDACTED.to_string());
        } else {
            redact_in_place(val);
        }
    }
}

/// Redact every field the schema marks sensitive, recursing into nested
/// objects and arrays, then apply the key heuristics to the rest.
pub fn redact_with_schema(value: &Value, schema: &Schema) -> Value {
    let mut cloned = value.clone();
    if let Value::Object(map) = &mut cloned {
        for (name, def) in schema.fields() {
            if let Some(field) = map.get_mut(name) {
                redact_field(field, def);
            }
        }
    }
    redact_in_place(&mut cloned);
    cloned
}

fn redact_field(value: &mut Value, def: &FieldDefinition) {
    if value.is_null() {
        return;
    }
    if def.is_sensitive() {
        *value = Value::String(REDACTED.to_string());
        return;
    }
    match (def.kind(), value) {
        (FieldKind::Object(c), Value::Object(map)) => {
            for (name, prop) in &c.properties {
                if let Some(inner) = map.get_mut(name) {
                    redact_field(inner, prop);
                }
            }
        }
        (FieldKind::Array(c), Value::Array(items)) => {
            for item in items {
                redact_field(item, &c.items);
            }
        }
        _ => {}
    }
}

/// Keep the keys of a config object but hide every value.
pub fn redact_all_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.keys()
                .map(|k| (k.clone(), Value::String(REDACTED.to_string())))
                .collect(),
        ),
        Value::Null => Value::Null,
        _ => Value::String(REDACTED.to_string()),
    }
}

/// Every string leaf in `value` that is long enough to scrub.
pub fn collect_secret_strings(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_strings(value, &mut out);
    into_scrub_list(out)
}

/// String leaves under every field the schema marks sensitive, recursing
/// into nested objects and arrays the same way [`redact_with_schema`] does.
pub fn collect_sensitive_strings(value: &Value, schema: &Schema) -> Vec<String> {
    let mut out = Vec::new();
    if let Value::Object(map) = value {
        for (name, def) in schema.fields() {
            if let Some(field) = map.get(name) {
                collect_sensitive_field(field, def, &mut out);
            }
        }
    }
    into_scrub_list(out)
}

fn collect_sensitive_field(value: &Value, def: &FieldDefinition, out: &mut Vec<String>) {
    if def.is_sensitive() {
        collect_strings(value, out);
        return;
    }
    match (def.kind(), value) {
        (FieldKind::Object(c), Value::Object(map)) => {
            for (name, prop) in &c.properties {
                if let Some(inner) = map.get(name) {
                    collect_sensitive_field(inner, prop, out);
                }
            }
        }
        (FieldKind::Array(c), Value::Array(items)) => {
            for item in items {
                collect_sensitive_field(item, &c.items, out);
            }
        }
        _ => {}
    }
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

fn into_scrub_list(mut out: Vec<String>) -> Vec<String> {
    out.retain(|s| s.len() >= MIN_SCRUB_LEN);
    out.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    out.dedup();
    out
}

/// Replace each occurrence of any secret in `text`.
///
/// Longest secrets go first so one containing another is replaced whole.
pub fn scrub_text(text: &str, secrets: &[String]) -> String {
    let mut ordered: Vec<&String> = secrets
        .iter()
        .filter(|s| s.len() >= MIN_SCRUB_LEN)
        .collect();
    ordered.sort_by(|a, b| b.len().cmp(&a.len()));
    ordered
        .into_iter()
        .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{api_key_field, array_field, object_field, string_field};
    use serde_json::json;

    #[test]
    fn redacts_exact_sensitive_keys() {
        let input = json!({
            "headers": {
                "Authorization": "Bearer abc",
                "x-api-key": "k-123",
                "content-type": "application/json"
            },
            "password": "p@ss"
        });
        let out = redact_with_schema(&input, &Schema::new());
        assert_eq!(out["headers"]["Authorization"], "[REDACTED]");
        assert_eq!(out["headers"]["x-api-key"], "[REDACTED]");
        assert_eq!(out["headers"]["content-type"], "application/json");
        assert_eq!(out["password"], "[REDACTED]");
    }

    #[test]
    fn redacts_schema_flagged_fields() {
        let schema = Schema::new()
            .field("name", string_field())
            .field("key", api_key_field())
            .field(
                "accounts",
                array_field(object_field([
                    ("login", string_field().build()),
                    ("pin", string_field().sensitive().build()),
                ])),
            );
        let input = json!({
            "name": "ada",
            "key": "sk-live-123456",
            "accounts": [{"login": "a", "pin": "1234"}]
        });
        let out = redact_with_schema(&input, &schema);
        assert_eq!(out["name"], "ada");
        assert_eq!(out["key"], REDACTED);
        assert_eq!(out["accounts"][0]["login"], "a");
        assert_eq!(out["accounts"][0]["pin"], REDACTED);
    }

    #[test]
    fn redacts_every_config_value() {
        let out = redact_all_values(&json!({"region": "eu", "limit": 5}));
        assert_eq!(out, json!({"region": REDACTED, "limit": REDACTED}));
    }

    #[test]
    fn scrubs_secrets_from_text() {
        let secrets = collect_secret_strings(&json!({"apiKey": "sk-abcdef", "mode": "on"}));
        assert_eq!(secrets, vec!["sk-abcdef"]);
        assert_eq!(
            scrub_text("upstream rejected key sk-abcdef", &secrets),
            "upstream rejected key [REDACTED]"
        );
    }

    #[test]
    fn collects_sensitive_input_values() {
        let schema = Schema::new()
            .field("query", string_field())
            .field("token", api_key_field())
            .field(
                "accounts",
                array_field(object_field([
                    ("login", string_field().build()),
                    ("pin", string_field().sensitive().build()),
                ])),
            );
        let input = json!({
            "query": "weather",
            "token": "sk-live-SUPERSECRET",
            "accounts": [{"login": "ada", "pin": "9876"}, {"login": "bob", "pin": "5432"}]
        });

        let secrets = collect_sensitive_strings(&input, &schema);
        assert_eq!(secrets, vec!["sk-live-SUPERSECRET", "5432", "9876"]);
    }

    #[test]
    fn scrubs_longest_secret_first() {
        let secrets = vec!["abcd".to_string(), "xxabcdyy".to_string()];
        assert_eq!(scrub_text("key=xxabcdyy", &secrets), "key=[REDACTED]");
    }
}
