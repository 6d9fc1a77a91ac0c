//! Structural schema validation for task input and output.
//!
//! Schemas are plain JSON Schema documents, which is also what `schemars`
//! emits for typed tasks. Validation is done by the `jsonschema` crate; this
//! module turns its errors into a [`SchemaError`] whose path points into the
//! checked value (`$.all[1].step`) or, for broken schemas, into the schema
//! itself (`#/properties/x`).

use jsonschema::error::ValidationErrorKind;
use jsonschema::ValidationError;
use serde_json::Value;
use thiserror::Error;

/// A value (or a schema) failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{path}: {violation}")]
pub struct SchemaError {
    /// Location of the failure: `$.field[0]` for values, `#/properties/x`
    /// for schemas.
    pub path: String,
    /// What went wrong at `path`.
    pub violation: Violation,
}

impl SchemaError {
    fn new(path: impl Into<String>, violation: Violation) -> Self {
        Self {
            path: path.into(),
            violation,
        }
    }
}

/// The specific rule that was broken.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },

    #[error("unexpected field '{0}'")]
    UnexpectedField(String),

    #[error("value is not one of the allowed values")]
    NotInEnum,

    #[error("value does not equal the required constant")]
    ConstMismatch,

    #[error("{value} is less than the minimum {limit}")]
    BelowMinimum { value: f64, limit: f64 },

    #[error("{value} is greater than the maximum {limit}")]
    AboveMaximum { value: f64, limit: f64 },

    #[error("value matches none of the allowed shapes")]
    NoVariantMatched,

    #[error("no value is allowed here")]
    Rejected,

    /// Any other keyword, with the validator's own message.
    #[error("{0}")]
    Constraint(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Check `value` against `schema`. Reports the first failure found.
pub fn validate(schema: &Value, value: &Value) -> Result<(), SchemaError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| invalid_schema(&e))?;
    let result = match validator.iter_errors(value).next() {
        None => Ok(()),
        Some(error) => Err(value_error(schema, value, &error)),
    };
    result
}

/// Check that `schema` itself is usable: it conforms to its meta-schema and
/// every `$ref` resolves.
pub fn check_schema(schema: &Value) -> Result<(), SchemaError> {
    jsonschema::validator_for(schema)
        .map(|_| ())
        .map_err(|e| invalid_schema(&e))
}

/// JSON type name of a value, as used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid_schema(error: &ValidationError<'_>) -> SchemaError {
    let pointer = error.instance_path.to_string();
    SchemaError::new(
        format!("#{pointer}"),
        Violation::InvalidSchema(error.to_string()),
    )
}

fn value_error(schema: &Value, value: &Value, error: &ValidationError<'_>) -> SchemaError {
    let (mut path, node) = value_path(value, &error.instance_path.to_string());

    let violation = match &error.kind {
        ValidationErrorKind::Required { property } => {
            let field = property
                .as_str()
                .map_or_else(|| property.to_string(), str::to_string);
            path = format!("{path}.{field}");
            Violation::MissingField(field)
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            if let Some(first) = unexpected.first() {
                path = format!("{path}.{first}");
            }
            Violation::UnexpectedField(unexpected.join(", "))
        }
        ValidationErrorKind::Type { .. } => Violation::TypeMismatch {
            expected: expected_type(schema, &error.schema_path.to_string()),
            found: node.map_or("nothing", type_name),
        },
        ValidationErrorKind::Enum { .. } => Violation::NotInEnum,
        ValidationErrorKind::Constant { .. } => Violation::ConstMismatch,
        ValidationErrorKind::Minimum { limit } => Violation::BelowMinimum {
            value: node.and_then(Value::as_f64).unwrap_or(f64::NAN),
            limit: limit.as_f64().unwrap_or(f64::NAN),
        },
        ValidationErrorKind::Maximum { limit } => Violation::AboveMaximum {
            value: node.and_then(Value::as_f64).unwrap_or(f64::NAN),
            limit: limit.as_f64().unwrap_or(f64::NAN),
        },
        ValidationErrorKind::AnyOf { .. } | ValidationErrorKind::OneOfNotValid { .. } => {
            Violation::NoVariantMatched
        }
        ValidationErrorKind::FalseSchema { .. } => Violation::Rejected,
        _ => Violation::Constraint(error.to_string()),
    };

    SchemaError::new(path, violation)
}

/// Turn a JSON pointer into the checked value into a `$.a[0].b` path, and
/// return the value it points at.
fn value_path<'v>(root: &'v Value, pointer: &str) -> (String, Option<&'v Value>) {
    let mut path = String::from("$");
    let mut node = Some(root);

    for segment in pointer.split('/').skip(1).map(unescape) {
        node = match node {
            Some(Value::Array(items)) => {
                path.push_str(&format!("[{segment}]"));
                segment.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            other => {
                path.push('.');
                path.push_str(&segment);
                other.and_then(|v| v.get(segment.as_str()))
            }
        };
    }

    (path, node)
}

/// The `type` keyword a type error came from, found by walking the keyword
/// location through the schema and following local `$ref`s on the way.
fn expected_type(schema: &Value, keyword_location: &str) -> String {
    let mut node = Some(schema);

    for segment in keyword_location.split('/').skip(1).map(unescape) {
        node = node.and_then(|current| {
            let next = match current {
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => current.get(segment.as_str()),
            };
            match (segment.as_str(), next) {
                ("$ref", Some(Value::String(reference))) => resolve_local(schema, reference),
                (_, next) => next,
            }
        });
    }

    match node {
        Some(Value::String(name)) => name.clone(),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        _ => "a different type".to_string(),
    }
}

fn resolve_local<'s>(schema: &'s Value, reference: &str) -> Option<&'s Value> {
    reference
        .strip_prefix('#')
        .and_then(|pointer| schema.pointer(pointer))
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addition_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "num1": { "type": "number" },
                "num2": { "type": "number" }
            },
            "required": ["num1", "num2"]
        })
    }

    #[test]
    fn test_accepts_conforming_value() {
        assert!(validate(&addition_schema(), &json!({"num1": 2, "num2": 3.5})).is_ok());
    }

    #[test]
    fn test_missing_required_field_is_named() {
        let err = validate(&addition_schema(), &json!({"num1": 2})).unwrap_err();
        assert_eq!(err.path, "$.num2");
        assert_eq!(err.violation, Violation::MissingField("num2".to_string()));
    }

    #[test]
    fn test_string_where_number_expected() {
        let err = validate(&addition_schema(), &json!({"num1": "2", "num2": 3})).unwrap_err();
        assert_eq!(err.path, "$.num1");
        assert_eq!(
            err.violation,
            Violation::TypeMismatch {
                expected: "number".to_string(),
                found: "string",
            }
        );
        assert_eq!(err.to_string(), "$.num1: expected number, found string");
    }

    #[test]
    fn test_integer_and_minimum() {
        let schema = json!({"type": "integer", "minimum": 0});
        assert!(validate(&schema, &json!(3)).is_ok());
        assert!(validate(&schema, &json!(3.5)).is_err());

        let err = validate(&schema, &json!(-1)).unwrap_err();
        assert_eq!(
            err.violation,
            Violation::BelowMinimum {
                value: -1.0,
                limit: 0.0
            }
        );
    }

    #[test]
    fn test_nullable_and_ref() {
        let schema = json!({
            "type": "object",
            "properties": {
                "first": { "anyOf": [{ "$ref": "#/$defs/Step" }, { "type": "null" }] },
                "all": { "type": "array", "items": { "$ref": "#/$defs/Step" } }
            },
            "$defs": {
                "Step": {
                    "type": "object",
                    "properties": { "step": { "type": "integer" } },
                    "required": ["step"]
                }
            }
        });

        assert!(validate(&schema, &json!({"first": null, "all": []})).is_ok());
        assert!(validate(&schema, &json!({"first": {"step": 1}, "all": [{"step": 2}]})).is_ok());

        let err = validate(&schema, &json!({"all": [{"step": 1}, {"step": "x"}]})).unwrap_err();
        assert_eq!(err.path, "$.all[1].step");
        assert!(matches!(err.violation, Violation::TypeMismatch { found: "string", .. }));

        let err = validate(&schema, &json!({"first": {}})).unwrap_err();
        assert_eq!(err.path, "$.first");
        assert_eq!(err.violation, Violation::NoVariantMatched);
    }

    #[test]
    fn test_additional_properties_false() {
        let schema = json!({
            "type": "object",
            "properties": { "id": { "type": "string" } },
            "additionalProperties": false
        });
        let err = validate(&schema, &json!({"id": "7", "extra": true})).unwrap_err();
        assert_eq!(err.path, "$.extra");
        assert_eq!(err.violation, Violation::UnexpectedField("extra".to_string()));
    }

    #[test]
    fn test_enum_and_boolean_schemas() {
        let schema = json!({"enum": ["metric", "imperial"]});
        assert!(validate(&schema, &json!("metric")).is_ok());
        assert_eq!(
            validate(&schema, &json!("kelvin")).unwrap_err().violation,
            Violation::NotInEnum
        );

        assert!(validate(&json!(true), &json!({"anything": 1})).is_ok());
        assert_eq!(
            validate(&json!(false), &json!(1)).unwrap_err().violation,
            Violation::Rejected
        );
    }

    #[test]
    fn test_check_schema_accepts_generated_shape() {
        let schema = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "title": "Input",
            "type": "object",
            "properties": {
                "steps": { "type": "integer", "format": "uint32", "minimum": 0, "default": 5 },
                "note": { "type": ["string", "null"] }
            }
        });
        assert!(check_schema(&schema).is_ok());
    }

    #[test]
    fn test_check_schema_rejects_bad_schemas() {
        let err = check_schema(&json!({"type": "float"})).unwrap_err();
        assert!(matches!(err.violation, Violation::InvalidSchema(_)));
        assert!(err.path.starts_with('#'));

        assert!(check_schema(&json!({"required": "num1"})).is_err());
        assert!(check_schema(&json!(42)).is_err());
    }

    #[test]
    fn test_value_path_escapes_and_indexes() {
        let value = json!({"a/b": [{"c": 1}]});
        let (path, node) = value_path(&value, "/a~1b/0/c");
        assert_eq!(path, "$.a/b[0].c");
        assert_eq!(node, Some(&json!(1)));
    }

    #[test]
    fn test_expected_type_follows_refs() {
        let schema = json!({
            "properties": { "s": { "$ref": "#/$defs/S" } },
            "$defs": { "S": { "type": ["string", "null"] } }
        });
        assert_eq!(
            expected_type(&schema, "/properties/s/$ref/type"),
            "string or null"
        );
        assert_eq!(expected_type(&schema, "/nowhere/type"), "a different type");
    }
}
