//! Schema and validation behavior exercised through the public API.

use pretty_assertions::assert_eq;
use serde_json::json;

use toolsmith::docs;
use toolsmith::schema::{
    Condition, CrossFieldRule, Schema, ToolSchema, Transform, array_field, enum_field, json_field,
    number_field, object_field, string_field,
};
use toolsmith::validation::{
    FieldErrorCode, PathSegment, SchemaCompiler, ValidationEngine, ValidationOptions,
};

fn codes(errors: &[toolsmith::validation::FieldError]) -> Vec<FieldErrorCode> {
    errors.iter().map(|e| e.code).collect()
}

#[test]
fn compiling_the_same_shape_twice_hits_the_cache() {
    let compiler = SchemaCompiler::new();
    let build = || {
        Schema::new()
            .field("name", string_field().required().min_length(2))
            .field("age", number_field().integer().min(0))
    };

    let first = compiler.compile(&build()).unwrap();
    let second = compiler.compile(&build()).unwrap();

    assert_eq!(first.key(), second.key());
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    let stats = compiler.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.size, 1);
}

#[test]
fn compiled_behavior_is_identical_across_cache_hits() {
    let engine = ValidationEngine::new();
    let schema = Schema::new().field("code", string_field().required().pattern("^[A-Z]{3}$"));
    let options = ValidationOptions::default();

    let a = engine.validate(&schema, &json!({"code": "abc"}), &options).unwrap();
    let b = engine.validate(&schema, &json!({"code": "abc"}), &options).unwrap();
    assert_eq!(a, b);

    let metrics = engine.get_metrics();
    assert_eq!(metrics.total_validations, 2);
    assert_eq!(metrics.failed_validations, 2);
    assert_eq!(metrics.cache_hits, 1);
    assert_eq!(metrics.cache_misses, 1);
}

#[test]
fn omitted_optional_field_takes_its_default() {
    let engine = ValidationEngine::new();
    let schema = Schema::new()
        .field("message", string_field().required())
        .field("count", number_field().range(1, 10).default(1))
        .field("mode", enum_field(["fast", "slow"]).default("fast"))
        .field("note", string_field().optional());

    let data = engine
        .validate(&schema, &json!({"message": "hi"}), &ValidationOptions::default())
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(data, json!({"message": "hi", "count": 1, "mode": "fast"}));
}

#[test]
fn null_is_treated_as_absent() {
    let engine = ValidationEngine::new();
    let schema = Schema::new()
        .field("count", number_field().default(3))
        .field("name", string_field().required());

    let errors = engine
        .validate(
            &schema,
            &json!({"count": null, "name": null}),
            &ValidationOptions::default(),
        )
        .unwrap()
        .into_result()
        .unwrap_err();

    assert_eq!(codes(&errors), vec![FieldErrorCode::RequiredFieldMissing]);
    assert_eq!(errors[0].path, vec![PathSegment::from("name")]);
}

#[test]
fn every_violation_on_a_field_is_reported() {
    let engine = ValidationEngine::new();
    let schema = Schema::new().field(
        "name",
        string_field().required().min_length(2).pattern("^[a-z]+$"),
    );

    let errors = engine
        .validate(&schema, &json!({"name": ""}), &ValidationOptions::default())
        .unwrap()
        .into_result()
        .unwrap_err();

    let found = codes(&errors);
    assert!(found.contains(&FieldErrorCode::TooSmall), "{found:?}");
    assert!(found.contains(&FieldErrorCode::PatternMismatch), "{found:?}");
}

#[test]
fn type_mismatch_stops_further_checks() {
    let engine = ValidationEngine::new();
    let schema = Schema::new().field(
        "name",
        string_field().required().min_length(2).pattern("^[a-z]+$"),
    );

    let errors = engine
        .validate(&schema, &json!({"name": 42}), &ValidationOptions::default())
        .unwrap()
        .into_result()
        .unwrap_err();

    assert_eq!(codes(&errors), vec![FieldErrorCode::InvalidType]);
}

#[test]
fn errors_from_several_fields_come_back_together() {
    let engine = ValidationEngine::new();
    let schema = Schema::new()
        .field("a", string_field().required())
        .field("b", number_field().max(5))
        .field("c", string_field().email());

    let errors = engine
        .validate(
            &schema,
            &json!({"b": 9, "c": "not-an-email"}),
            &ValidationOptions::default(),
        )
        .unwrap()
        .into_result()
        .unwrap_err();

    assert_eq!(
        codes(&errors),
        vec![
            FieldErrorCode::RequiredFieldMissing,
            FieldErrorCode::TooBig,
            FieldErrorCode::InvalidFormat,
        ]
    );
}

#[test]
fn transform_applies_only_to_valid_values() {
    let engine = ValidationEngine::new();
    let schema = Schema::new().field(
        "email",
        string_field()
            .required()
            .email()
            .transform(Transform::Lowercase),
    );
    let options = ValidationOptions::default();

    let data = engine
        .validate(&schema, &json!({"email": "USER@EXAMPLE.COM"}), &options)
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(data["email"], "user@example.com");

    let errors = engine
        .validate(&schema, &json!({"email": "NOT AN EMAIL"}), &options)
        .unwrap()
        .into_result()
        .unwrap_err();
    assert_eq!(codes(&errors), vec![FieldErrorCode::InvalidFormat]);
}

#[test]
fn nested_errors_carry_the_full_path() {
    let engine = ValidationEngine::new();
    let user = object_field([
        ("name", string_field().required().build()),
        ("age", number_field().integer().build()),
    ])
    .required();
    let schema = Schema::new().field("user", user);

    let errors = engine
        .validate(
            &schema,
            &json!({"user": {"age": 30}}),
            &ValidationOptions::default(),
        )
        .unwrap()
        .into_result()
        .unwrap_err();

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, FieldErrorCode::RequiredFieldMissing);
    assert_eq!(
        errors[0].path,
        vec![PathSegment::from("user"), PathSegment::from("name")]
    );
    assert_eq!(errors[0].path_string(), "user.name");
}

#[test]
fn array_item_errors_include_the_index() {
    let engine = ValidationEngine::new();
    let schema = Schema::new().field(
        "tags",
        array_field(string_field().max_length(3)).max_items(5),
    );

    let errors = engine
        .validate(
            &schema,
            &json!({"tags": ["ok", "too long"]}),
            &ValidationOptions::default(),
        )
        .unwrap()
        .into_result()
        .unwrap_err();

    assert_eq!(errors[0].path_string(), "tags[1]");
    assert_eq!(errors[0].code, FieldErrorCode::TooBig);
}

#[test]
fn cross_field_rule_gates_on_its_condition() {
    let engine = ValidationEngine::new();
    let schema = Schema::new()
        .field("type", enum_field(["basic", "advanced"]).required())
        .field("advancedOptions", json_field().optional())
        .rule(
            CrossFieldRule::when(Condition::equals("type", "advanced"))
                .requires(["advancedOptions"])
                .message("advancedOptions is required for advanced mode"),
        );
    let options = ValidationOptions::default();

    let basic = engine
        .validate(&schema, &json!({"type": "basic"}), &options)
        .unwrap();
    assert!(basic.is_valid());

    let errors = engine
        .validate(&schema, &json!({"type": "advanced"}), &options)
        .unwrap()
        .into_result()
        .unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, FieldErrorCode::CrossFieldValidationFailed);
    assert!(errors[0].path.is_empty());
    assert_eq!(errors[0].message, "advancedOptions is required for advanced mode");

    let full = engine
        .validate(
            &schema,
            &json!({"type": "advanced", "advancedOptions": {"depth": 2}}),
            &options,
        )
        .unwrap();
    assert!(full.is_valid());
}

#[test]
fn cross_field_rules_wait_for_field_errors() {
    let engine = ValidationEngine::new();
    let schema = Schema::new()
        .field("type", enum_field(["basic", "advanced"]).required())
        .field("limit", number_field().max(10))
        .field("advancedOptions", json_field().optional())
        .rule(
            CrossFieldRule::when(Condition::equals("type", "advanced"))
                .requires(["advancedOptions"])
                .message("missing options"),
        );

    let errors = engine
        .validate(
            &schema,
            &json!({"type": "advanced", "limit": 99}),
            &ValidationOptions::default(),
        )
        .unwrap()
        .into_result()
        .unwrap_err();
    assert_eq!(codes(&errors), vec![FieldErrorCode::TooBig]);
}

#[test]
fn strict_mode_rejects_unknown_fields_and_default_strips_them() {
    let engine = ValidationEngine::new();
    let schema = Schema::new().field("a", string_field().optional());
    let input = json!({"a": "x", "extra": 1});

    let stripped = engine
        .validate(&schema, &input, &ValidationOptions::default())
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(stripped, json!({"a": "x"}));

    let errors = engine
        .validate(&schema, &input, &ValidationOptions::strict())
        .unwrap()
        .into_result()
        .unwrap_err();
    assert_eq!(codes(&errors), vec![FieldErrorCode::UnexpectedFields]);
    assert_eq!(errors[0].path_string(), "extra");
}

#[test]
fn documentation_is_deterministic() {
    let schema = ToolSchema::new(
        Schema::new()
            .field("message", string_field().required().min_length(1).max_length(280))
            .field("count", number_field().integer().range(1, 10).default(1))
            .field("mode", enum_field(["a", "b"]).optional()),
        Schema::new(),
    );

    let first = serde_json::to_string(&docs::schema_object(&schema.input)).unwrap();
    let second = serde_json::to_string(&docs::schema_object(&schema.input)).unwrap();
    assert_eq!(first, second);

    let fragment = docs::schema_object(&schema.input);
    assert_eq!(fragment["required"], json!(["message"]));
    assert_eq!(fragment["properties"]["count"]["type"], "integer");
    assert_eq!(fragment["properties"]["count"]["minimum"], json!(1));
    assert_eq!(fragment["properties"]["message"]["maxLength"], json!(280));

    let example = docs::example_request(&schema);
    assert_eq!(example["input_data"]["mode"], "a");
    assert_eq!(example["input_data"]["count"], json!(1));
}
