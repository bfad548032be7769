//! Schema compiler with a structural-shape cache.
//!
//! Compiling turns a [`Schema`] into a tree of [`Validator`] nodes with regexes
//! precompiled and every constraint checked for sanity. Results are cached in
//! an LRU keyed by a blake3 hash of the schema's canonical JSON, so two
//! schemas with the same shape share one compiled artifact no matter where
//! they came from.
//!
//! The canonical form is plain `serde_json` output: field maps are
//! `BTreeMap`s, JSON objects inside defaults/examples are sorted maps, and
//! struct fields serialize in declaration order. Insertion order never
//! leaks into the key.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use regex::Regex;
use serde_json::Value;

use crate::error::CompileError;
use crate::schema::{
    AdditionalProperties, ApiKeyConstraints, CrossFieldRule, DateConstraints,
    DateTimeConstraints, EnumConstraints, FieldDefinition, FieldKind, FileConstraints,
    JsonConstraints, NumberConstraints, Schema, StringConstraints, Transform, UrlConstraints,
};
use crate::validation::engine;
use crate::validation::metrics::CacheStats;

/// Default number of compiled schemas kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Type tags accepted by [`SchemaCompiler::compile_json`].
const KNOWN_KINDS: [&str; 12] = [
    "string", "number", "boolean", "enum", "array", "object", "date", "datetime", "file",
    "api_key", "url", "json",
];

/// Executable form of one field.
#[derive(Debug)]
pub(crate) struct CompiledField {
    pub required: bool,
    pub default: Option<Value>,
    pub sanitize: bool,
    pub transforms: Vec<Transform>,
    pub validator: Validator,
}

/// Kind-specific validator node.
#[derive(Debug)]
pub(crate) enum Validator {
    String {
        constraints: StringConstraints,
        pattern: Option<Regex>,
    },
    Number(NumberConstraints),
    Boolean,
    Enum(EnumConstraints),
    Array {
        items: Box<CompiledField>,
        min_items: Option<usize>,
        max_items: Option<usize>,
        unique: bool,
    },
    Object {
        properties: BTreeMap<String, CompiledField>,
        additional: AdditionalProperties,
    },
    Date(DateConstraints),
    Datetime(DateTimeConstraints),
    File(FileConstraints),
    ApiKey(ApiKeyConstraints),
    Url(UrlConstraints),
    Json(JsonConstraints),
}

/// A schema ready for validation.
#[derive(Debug)]
pub struct CompiledSchema {
    key: String,
    fields: BTreeMap<String, CompiledField>,
    rules: Vec<CrossFieldRule>,
}

impl CompiledSchema {
    /// The structural cache key this schema was compiled under.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub(crate) fn fields(&self) -> &BTreeMap<String, CompiledField> {
        &self.fields
    }

    pub(crate) fn rules(&self) -> &[CrossFieldRule] {
        &self.rules
    }
}

/// Compiles schemas and memoizes the result by shape.
pub struct SchemaCompiler {
    cache: Mutex<LruCache<String, Arc<CompiledSchema>>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for SchemaCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCompiler")
            .field("capacity", &self.capacity)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for SchemaCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaCompiler {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// A compiler whose cache holds at most `capacity` schemas (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            capacity: capacity.get(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Compile a schema, reusing a cached artifact for an identical shape.
    pub fn compile(&self, schema: &Schema) -> Result<Arc<CompiledSchema>, CompileError> {
        self.compile_tracked(schema).map(|(compiled, _)| compiled)
    }

    /// Compile a serialized schema.
    ///
    /// Field kinds are checked before deserializing so an unknown `type`
    /// tag reports as [`CompileError::UnknownKind`] rather than a generic
    /// parse failure.
    pub fn compile_json(&self, value: &Value) -> Result<Arc<CompiledSchema>, CompileError> {
        let fields = value
            .get("fields")
            .and_then(Value::as_object)
            .ok_or_else(|| CompileError::Malformed("schema must have a 'fields' object".into()))?;
        for (name, def) in fields {
            check_kind_tags(name, def)?;
        }
        let schema: Schema = serde_json::from_value(value.clone())
            .map_err(|e| CompileError::Malformed(e.to_string()))?;
        self.compile(&schema)
    }

    /// Compile and report whether the cache was hit.
    pub(crate) fn compile_tracked(
        &self,
        schema: &Schema,
    ) -> Result<(Arc<CompiledSchema>, bool), CompileError> {
        let key = shape_key(schema)?;

        if let Some(hit) = self.lock_cache().get(&key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((hit, true));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = Arc::new(compile_schema(key.clone(), schema)?);
        tracing::debug!(key = %&key[..16], fields = compiled.fields.len(), "Compiled schema");
        self.lock_cache().put(key, Arc::clone(&compiled));
        Ok((compiled, false))
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.lock_cache().len(),
            capacity: self.capacity,
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, LruCache<String, Arc<CompiledSchema>>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Schema cache lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Deterministic structural key for a schema.
pub fn shape_key(schema: &Schema) -> Result<String, CompileError> {
    let canonical =
        serde_json::to_vec(schema).map_err(|e| CompileError::Malformed(e.to_string()))?;
    Ok(blake3::hash(&canonical).to_hex().to_string())
}

fn check_kind_tags(path: &str, def: &Value) -> Result<(), CompileError> {
    let kind = def
        .get("kind")
        .ok_or_else(|| CompileError::Malformed(format!("field '{path}' has no kind")))?;
    let tag = kind
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| CompileError::Malformed(format!("field '{path}' has no type tag")))?;
    if !KNOWN_KINDS.contains(&tag) {
        return Err(CompileError::UnknownKind(tag.to_string()));
    }

    if let Some(items) = kind.get("items") {
        check_kind_tags(&format!("{path}[]"), items)?;
    }
    if let Some(properties) = kind.get("properties").and_then(Value::as_object) {
        for (name, prop) in properties {
            check_kind_tags(&format!("{path}.{name}"), prop)?;
        }
    }
    Ok(())
}

fn compile_schema(key: String, schema: &Schema) -> Result<CompiledSchema, CompileError> {
    let mut fields = BTreeMap::new();
    for (name, def) in schema.fields() {
        fields.insert(name.clone(), compile_field(name, def)?);
    }
    for (index, rule) in schema.rules().iter().enumerate() {
        check_rule(index, rule, schema)?;
    }
    Ok(CompiledSchema {
        key,
        fields,
        rules: schema.rules().to_vec(),
    })
}

fn compile_field(path: &str, def: &FieldDefinition) -> Result<CompiledField, CompileError> {
    let validator = match def.kind() {
        FieldKind::String(c) => {
            check_range(path, c.min_length, c.max_length, "min_length", "max_length")?;
            let pattern = c
                .pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| CompileError::InvalidPattern {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
            Validator::String {
                constraints: c.clone(),
                pattern,
            }
        }
        FieldKind::Number(c) => {
            check_range(path, c.min, c.max, "min", "max")?;
            if c.integer && c.precision.is_some() {
                return Err(CompileError::InvalidRange {
                    path: path.to_string(),
                    detail: "precision cannot be combined with integer".to_string(),
                });
            }
            Validator::Number(c.clone())
        }
        FieldKind::Boolean => Validator::Boolean,
        FieldKind::Enum(c) => {
            if c.values.is_empty() {
                return Err(CompileError::EmptyEnum {
                    path: path.to_string(),
                });
            }
            let mut seen = HashSet::new();
            for value in &c.values {
                if !seen.insert(value.as_str()) {
                    return Err(CompileError::DuplicateEnumValue {
                        path: path.to_string(),
                        value: value.clone(),
                    });
                }
            }
            if let Some(orphan) = c.labels.keys().find(|k| !seen.contains(k.as_str())) {
                return Err(CompileError::Malformed(format!(
                    "enum field '{path}' has a label for unknown value '{orphan}'"
                )));
            }
            Validator::Enum(c.clone())
        }
        FieldKind::Array(c) => {
            check_range(path, c.min_items, c.max_items, "min_items", "max_items")?;
            Validator::Array {
                items: Box::new(compile_field(&format!("{path}[]"), &c.items)?),
                min_items: c.min_items,
                max_items: c.max_items,
                unique: c.unique,
            }
        }
        FieldKind::Object(c) => {
            let mut properties = BTreeMap::new();
            for (name, prop) in &c.properties {
                properties.insert(name.clone(), compile_field(&format!("{path}.{name}"), prop)?);
            }
            Validator::Object {
                properties,
                additional: c.additional_properties,
            }
        }
        FieldKind::Date(c) => {
            check_range(path, c.min, c.max, "min", "max")?;
            Validator::Date(c.clone())
        }
        FieldKind::Datetime(c) => {
            check_range(path, c.min, c.max, "min", "max")?;
            Validator::Datetime(c.clone())
        }
        FieldKind::File(c) => Validator::File(c.clone()),
        FieldKind::ApiKey(c) => Validator::ApiKey(c.clone()),
        FieldKind::Url(c) => {
            if c.schemes.is_empty() {
                return Err(CompileError::Malformed(format!(
                    "url field '{path}' allows no schemes"
                )));
            }
            Validator::Url(c.clone())
        }
        FieldKind::Json(c) => Validator::Json(c.clone()),
    };

    let field = CompiledField {
        required: def.is_required(),
        default: def.default_value().cloned(),
        sanitize: def.sanitize(),
        transforms: def.transforms().to_vec(),
        validator,
    };

    if let Some(default) = &field.default
        && let Some(first) = engine::check_value(&field, default).first()
    {
        return Err(CompileError::InvalidDefault {
            path: path.to_string(),
            message: first.message.clone(),
        });
    }

    Ok(field)
}

fn check_range<T: PartialOrd + Display>(
    path: &str,
    min: Option<T>,
    max: Option<T>,
    min_name: &str,
    max_name: &str,
) -> Result<(), CompileError> {
    if let (Some(min), Some(max)) = (min, max)
        && min > max
    {
        return Err(CompileError::InvalidRange {
            path: path.to_string(),
            detail: format!("{min_name} ({min}) is greater than {max_name} ({max})"),
        });
    }
    Ok(())
}

fn check_rule(index: usize, rule: &CrossFieldRule, schema: &Schema) -> Result<(), CompileError> {
    let invalid = |message: String| CompileError::InvalidRule { index, message };

    if rule.message.trim().is_empty() {
        return Err(invalid("message must not be empty".to_string()));
    }
    if rule.requires.is_empty() && rule.forbids.is_empty() {
        return Err(invalid(
            "rule must require or forbid at least one field".to_string(),
        ));
    }
    for path in rule.referenced_fields() {
        let root = path.split('.').next().unwrap_or(path);
        if schema.get(root).is_none() {
            return Err(invalid(format!("references unknown field '{path}'")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        Condition, array_field, enum_field, number_field, object_field, string_field,
    };
    use serde_json::json;

    fn sample() -> Schema {
        Schema::new()
            .field("name", string_field().min_length(2))
            .field("count", number_field().range(1, 10).default(1))
    }

    #[test]
    fn test_same_shape_hits_cache() {
        let compiler = SchemaCompiler::new();
        let first = compiler.compile(&sample()).unwrap();
        let second = compiler.compile(&sample()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = compiler.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_key_ignores_insertion_order() {
        let a = Schema::new()
            .field("a", string_field())
            .field("b", number_field());
        let b = Schema::new()
            .field("b", number_field())
            .field("a", string_field());
        assert_eq!(shape_key(&a).unwrap(), shape_key(&b).unwrap());
        assert_ne!(
            shape_key(&a).unwrap(),
            shape_key(&a.clone().field("c", string_field())).unwrap()
        );
    }

    #[test]
    fn test_lru_eviction() {
        let compiler = SchemaCompiler::with_capacity(1);
        let first = compiler.compile(&sample()).unwrap();
        compiler
            .compile(&Schema::new().field("other", string_field()))
            .unwrap();
        let again = compiler.compile(&sample()).unwrap();

        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(compiler.cache_stats().misses, 3);
        assert_eq!(compiler.cache_stats().size, 1);
    }

    #[test]
    fn test_malformed_constraints_fail_eagerly() {
        let compiler = SchemaCompiler::new();

        let empty_enum = Schema::new().field("mode", enum_field(Vec::<String>::new()));
        assert!(matches!(
            compiler.compile(&empty_enum),
            Err(CompileError::EmptyEnum { .. })
        ));

        let bad_range = Schema::new().field("name", string_field().min_length(5).max_length(2));
        assert!(matches!(
            compiler.compile(&bad_range),
            Err(CompileError::InvalidRange { .. })
        ));

        let bad_pattern = Schema::new().field("name", string_field().pattern("(unclosed"));
        assert!(matches!(
            compiler.compile(&bad_pattern),
            Err(CompileError::InvalidPattern { .. })
        ));

        let dup = Schema::new().field("mode", enum_field(["a", "a"]));
        assert!(matches!(
            compiler.compile(&dup),
            Err(CompileError::DuplicateEnumValue { .. })
        ));

        let precision = Schema::new().field("n", number_field().integer().precision(2));
        assert!(matches!(
            compiler.compile(&precision),
            Err(CompileError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_nested_errors_report_path() {
        let schema = Schema::new().field(
            "items",
            array_field(object_field([("tag", enum_field(Vec::<String>::new()))])),
        );
        let err = SchemaCompiler::new().compile(&schema).unwrap_err();
        assert_eq!(
            err,
            CompileError::EmptyEnum {
                path: "items[].tag".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_default_rejected() {
        let schema = Schema::new().field("count", number_field().range(1, 10).default(50));
        assert!(matches!(
            SchemaCompiler::new().compile(&schema),
            Err(CompileError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn test_rule_checks() {
        let compiler = SchemaCompiler::new();
        let unknown = sample().rule(
            CrossFieldRule::when(Condition::exists("ghost"))
                .requires(["name"])
                .message("x"),
        );
        assert!(matches!(
            compiler.compile(&unknown),
            Err(CompileError::InvalidRule { index: 0, .. })
        ));

        let empty = sample().rule(CrossFieldRule::when(Condition::exists("name")).message("x"));
        assert!(matches!(
            compiler.compile(&empty),
            Err(CompileError::InvalidRule { .. })
        ));
    }

    #[test]
    fn test_compile_json_unknown_kind() {
        let compiler = SchemaCompiler::new();
        let json = json!({"fields": {"when": {"kind": {"type": "timestamp"}, "required": true}}});
        assert_eq!(
            compiler.compile_json(&json).unwrap_err(),
            CompileError::UnknownKind("timestamp".to_string())
        );

        let nested = json!({"fields": {"list": {"kind": {"type": "array", "items": {"kind": {"type": "blob"}}}}}});
        assert_eq!(
            compiler.compile_json(&nested).unwrap_err(),
            CompileError::UnknownKind("blob".to_string())
        );
    }

    #[test]
    fn test_compile_json_matches_builder_shape() {
        let compiler = SchemaCompiler::new();
        let from_builder = compiler.compile(&sample()).unwrap();
        let json = serde_json::to_value(sample()).unwrap();
        let from_json = compiler.compile_json(&json).unwrap();
        assert!(Arc::ptr_eq(&from_builder, &from_json));
    }
}
