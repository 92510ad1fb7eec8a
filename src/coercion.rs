//! Parameter coercion
//!
//! Converts untyped JSON inputs into driver-bindable values according to
//! each parameter's declared type family. Count and type validation happen
//! here, before any statement is built, so a rejected request never
//! touches the database.

use std::collections::HashMap;
use std::sync::OnceLock;

use duckdb::types::Value;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::catalog::MacroDescriptor;
use crate::errors::{MacroError, MacroResult};
use crate::observability::Logger;

/// Coerced parameters keyed by declared name; values may be `Null` when a
/// blank or sentinel input was supplied explicitly.
pub type CoercedParameters = HashMap<String, Value>;

/// Declared type families, matched case-insensitively with any `(...)`
/// suffix stripped (so `DECIMAL(18,3)` lands in Floating).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeFamily {
    Integer,
    Floating,
    Text,
    Boolean,
    DateTime,
    Json,
    Unknown,
}

impl TypeFamily {
    fn of(type_tag: &str) -> Self {
        let tag = type_tag.trim().to_uppercase();
        let base = tag.split('(').next().unwrap_or("").trim();
        match base {
            "INTEGER" | "BIGINT" | "INT" | "SMALLINT" | "TINYINT" => Self::Integer,
            "DOUBLE" | "REAL" | "FLOAT" | "DECIMAL" | "NUMERIC" => Self::Floating,
            "VARCHAR" | "TEXT" | "STRING" | "CHAR" => Self::Text,
            "BOOLEAN" => Self::Boolean,
            "DATE" | "TIMESTAMP" | "TIME" => Self::DateTime,
            "JSON" | "ARRAY" => Self::Json,
            _ => Self::Unknown,
        }
    }
}

/// Validate count and convert every supplied value to its declared family.
///
/// - more non-null values than declared parameters is a parameter error;
/// - undeclared keys are ignored;
/// - a declared parameter absent from the input is simply omitted from the
///   coerced map, no default is synthesized.
pub fn coerce_parameters(
    descriptor: &MacroDescriptor,
    raw: &HashMap<String, JsonValue>,
) -> MacroResult<CoercedParameters> {
    let provided = raw.values().filter(|v| !v.is_null()).count();
    if provided > descriptor.arity() {
        return Err(MacroError::parameter(format!(
            "Too many parameters. Expected {}, got {}",
            descriptor.arity(),
            provided
        )));
    }

    let mut coerced = CoercedParameters::new();
    for (name, type_tag) in descriptor
        .parameters
        .iter()
        .zip(descriptor.parameter_types.iter())
    {
        let value = match raw.get(name) {
            Some(v) if !v.is_null() => v,
            _ => continue,
        };
        let converted = coerce_value(value, type_tag).map_err(|reason| {
            MacroError::conversion(name, type_tag, compact(value), reason)
        })?;
        coerced.insert(name.clone(), converted);
    }

    Ok(coerced)
}

/// Convert one value to its declared family. Errors are reasons only; the
/// caller attaches parameter name, expected type and offending value.
fn coerce_value(value: &JsonValue, type_tag: &str) -> Result<Value, String> {
    // Blank strings are null in every family
    if let JsonValue::String(s) = value {
        if s.trim().is_empty() {
            return Ok(Value::Null);
        }
    }

    match TypeFamily::of(type_tag) {
        TypeFamily::Integer => coerce_integer(value),
        TypeFamily::Floating => coerce_floating(value),
        TypeFamily::Text => Ok(Value::Text(stringify(value))),
        TypeFamily::Boolean => coerce_boolean(value),
        TypeFamily::DateTime => coerce_datetime(value, type_tag),
        TypeFamily::Json => coerce_json(value),
        TypeFamily::Unknown => Ok(coerce_unknown(value, type_tag)),
    }
}

fn is_null_sentinel(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "" | "null" | "none")
}

fn coerce_integer(value: &JsonValue) -> Result<Value, String> {
    match value {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::BigInt(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::BigInt(f.trunc() as i64))
            } else {
                Err(format!("cannot convert '{}' to integer", n))
            }
        }
        JsonValue::Bool(b) => Ok(Value::BigInt(i64::from(*b))),
        JsonValue::String(s) => {
            let s = s.trim();
            if is_null_sentinel(s) {
                return Ok(Value::Null);
            }
            // Parse through floating first so "1.0" -> 1
            s.parse::<f64>()
                .map(|f| Value::BigInt(f.trunc() as i64))
                .map_err(|_| format!("cannot convert '{}' to integer", s))
        }
        other => Err(format!("cannot convert '{}' to integer", compact(other))),
    }
}

fn coerce_floating(value: &JsonValue) -> Result<Value, String> {
    match value {
        JsonValue::Number(n) => n
            .as_f64()
            .map(Value::Double)
            .ok_or_else(|| format!("cannot convert '{}' to double", n)),
        JsonValue::Bool(b) => Ok(Value::Double(if *b { 1.0 } else { 0.0 })),
        JsonValue::String(s) => {
            let s = s.trim();
            if is_null_sentinel(s) {
                return Ok(Value::Null);
            }
            s.parse::<f64>()
                .map(Value::Double)
                .map_err(|_| format!("cannot convert '{}' to double", s))
        }
        other => Err(format!("cannot convert '{}' to double", compact(other))),
    }
}

fn coerce_boolean(value: &JsonValue) -> Result<Value, String> {
    match value {
        JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "t" | "y" => Ok(Value::Boolean(true)),
            "false" | "0" | "no" | "off" | "f" | "n" => Ok(Value::Boolean(false)),
            other => Err(format!("cannot convert '{}' to boolean", other)),
        },
        other => Err(format!("cannot convert '{}' to boolean", compact(other))),
    }
}

/// Date/time values are passed through as text for the engine's own parser;
/// DATE additionally gets a textual shape check here.
fn coerce_datetime(value: &JsonValue, type_tag: &str) -> Result<Value, String> {
    static DATE_SHAPE: OnceLock<Regex> = OnceLock::new();

    let text = stringify(value);
    let text = text.trim();
    if is_null_sentinel(text) {
        return Ok(Value::Null);
    }

    if type_tag.trim().to_uppercase().starts_with("DATE") {
        let shape = DATE_SHAPE.get_or_init(|| {
            Regex::new(r"^(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{4})")
                .expect("date pattern is valid")
        });
        if !shape.is_match(text) {
            return Err(format!(
                "invalid date format: {}. Expected YYYY-MM-DD or MM/DD/YYYY",
                text
            ));
        }
    }

    Ok(Value::Text(text.to_string()))
}

/// Structured input passes through unchanged; string input must parse as
/// JSON. Either way the value is bound as canonical JSON text and cast by
/// the engine.
fn coerce_json(value: &JsonValue) -> Result<Value, String> {
    match value {
        JsonValue::Object(_) | JsonValue::Array(_) => Ok(Value::Text(value.to_string())),
        JsonValue::String(s) => {
            let parsed: JsonValue = serde_json::from_str(s)
                .map_err(|_| format!("invalid JSON format: {}", s))?;
            Ok(Value::Text(parsed.to_string()))
        }
        other => Ok(Value::Text(other.to_string())),
    }
}

/// Unknown families sniff numeric shapes out of strings and otherwise pass
/// the raw value through with a non-fatal warning.
fn coerce_unknown(value: &JsonValue, type_tag: &str) -> Value {
    if let JsonValue::String(s) = value {
        let s = s.trim();
        let digits = s.strip_prefix('-').unwrap_or(s);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(i) = s.parse::<i64>() {
                return Value::BigInt(i);
            }
        }
        if s.contains('.') || s.to_ascii_lowercase().contains('e') {
            if let Ok(f) = s.parse::<f64>() {
                return Value::Double(f);
            }
        }
    }

    Logger::warn(
        "UNKNOWN_PARAMETER_TYPE",
        &[("type", type_tag), ("value", compact(value).as_str())],
    );
    passthrough(value)
}

/// Generic JSON-to-driver mapping for pass-through values
fn passthrough(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::BigInt(i)
            } else {
                Value::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        JsonValue::String(s) => Value::Text(s.clone()),
        structured => Value::Text(structured.to_string()),
    }
}

/// Stringify as-is: bare strings keep their content, everything else is
/// rendered as JSON text.
fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Short rendering of an offending value for error details
fn compact(value: &JsonValue) -> String {
    let mut rendered = stringify(value);
    if rendered.len() > 120 {
        rendered.truncate(120);
        rendered.push_str("...");
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MacroDescriptor;
    use serde_json::json;

    fn descriptor(params: &[(&str, &str)]) -> MacroDescriptor {
        MacroDescriptor::from_catalog_row(
            "m".to_string(),
            params.iter().map(|(n, _)| n.to_string()).collect(),
            params.iter().map(|(_, t)| t.to_string()).collect(),
            None,
            None,
            Some("macro".to_string()),
        )
    }

    fn raw(pairs: &[(&str, JsonValue)]) -> HashMap<String, JsonValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_string_is_null_for_every_family() {
        for family in ["INTEGER", "DOUBLE", "VARCHAR", "BOOLEAN", "DATE", "JSON", "BLOB"] {
            let desc = descriptor(&[("p", family)]);
            let coerced = coerce_parameters(&desc, &raw(&[("p", json!("  "))])).unwrap();
            assert_eq!(coerced.get("p"), Some(&Value::Null), "family {}", family);
        }
    }

    #[test]
    fn test_float_string_truncates_to_integer() {
        let desc = descriptor(&[("n", "INTEGER")]);
        let coerced = coerce_parameters(&desc, &raw(&[("n", json!("1.0"))])).unwrap();
        assert_eq!(coerced.get("n"), Some(&Value::BigInt(1)));
    }

    #[test]
    fn test_integer_rejects_garbage() {
        let desc = descriptor(&[("n", "INTEGER")]);
        let err = coerce_parameters(&desc, &raw(&[("n", json!("abc"))])).unwrap_err();
        match err {
            MacroError::Parameter {
                parameter,
                expected_type,
                value,
                ..
            } => {
                assert_eq!(parameter.as_deref(), Some("n"));
                assert_eq!(expected_type.as_deref(), Some("INTEGER"));
                assert_eq!(value.as_deref(), Some("abc"));
            }
            other => panic!("expected Parameter error, got {:?}", other),
        }
    }

    #[test]
    fn test_null_sentinels() {
        let desc = descriptor(&[("n", "BIGINT")]);
        for sentinel in ["null", "None", " NULL "] {
            let coerced = coerce_parameters(&desc, &raw(&[("n", json!(sentinel))])).unwrap();
            assert_eq!(coerced.get("n"), Some(&Value::Null));
        }
    }

    #[test]
    fn test_decimal_with_precision_is_floating() {
        let desc = descriptor(&[("x", "DECIMAL(18,3)")]);
        let coerced = coerce_parameters(&desc, &raw(&[("x", json!("2.5"))])).unwrap();
        assert_eq!(coerced.get("x"), Some(&Value::Double(2.5)));
    }

    #[test]
    fn test_boolean_token_sets() {
        let desc = descriptor(&[("b", "BOOLEAN")]);
        for truthy in ["true", "1", "YES", "on", "T", "y"] {
            let coerced = coerce_parameters(&desc, &raw(&[("b", json!(truthy))])).unwrap();
            assert_eq!(coerced.get("b"), Some(&Value::Boolean(true)), "{}", truthy);
        }
        for falsy in ["false", "0", "No", "off", "f", "N"] {
            let coerced = coerce_parameters(&desc, &raw(&[("b", json!(falsy))])).unwrap();
            assert_eq!(coerced.get("b"), Some(&Value::Boolean(false)), "{}", falsy);
        }
        assert!(coerce_parameters(&desc, &raw(&[("b", json!("maybe"))])).is_err());
        assert!(coerce_parameters(&desc, &raw(&[("b", json!(3))])).is_err());
    }

    #[test]
    fn test_date_shape_checked() {
        let desc = descriptor(&[("d", "DATE")]);
        assert!(coerce_parameters(&desc, &raw(&[("d", json!("2024-01-15"))])).is_ok());
        assert!(coerce_parameters(&desc, &raw(&[("d", json!("1/15/2024"))])).is_ok());
        assert!(coerce_parameters(&desc, &raw(&[("d", json!("January 15"))])).is_err());
    }

    #[test]
    fn test_timestamp_passes_through_as_text() {
        let desc = descriptor(&[("t", "TIMESTAMP")]);
        let coerced =
            coerce_parameters(&desc, &raw(&[("t", json!("2024-01-15 10:30:00"))])).unwrap();
        assert_eq!(
            coerced.get("t"),
            Some(&Value::Text("2024-01-15 10:30:00".to_string()))
        );
    }

    #[test]
    fn test_json_family() {
        let desc = descriptor(&[("j", "JSON")]);
        let coerced =
            coerce_parameters(&desc, &raw(&[("j", json!({"a": 1}))])).unwrap();
        assert_eq!(coerced.get("j"), Some(&Value::Text("{\"a\":1}".to_string())));

        let coerced = coerce_parameters(&desc, &raw(&[("j", json!("[1,2]"))])).unwrap();
        assert_eq!(coerced.get("j"), Some(&Value::Text("[1,2]".to_string())));

        assert!(coerce_parameters(&desc, &raw(&[("j", json!("{not json"))])).is_err());
    }

    #[test]
    fn test_unknown_family_sniffs_numbers() {
        let desc = descriptor(&[("u", "UNKNOWN")]);
        let coerced = coerce_parameters(&desc, &raw(&[("u", json!("42"))])).unwrap();
        assert_eq!(coerced.get("u"), Some(&Value::BigInt(42)));

        let coerced = coerce_parameters(&desc, &raw(&[("u", json!("-7"))])).unwrap();
        assert_eq!(coerced.get("u"), Some(&Value::BigInt(-7)));

        let coerced = coerce_parameters(&desc, &raw(&[("u", json!("3.14"))])).unwrap();
        assert_eq!(coerced.get("u"), Some(&Value::Double(3.14)));

        let coerced = coerce_parameters(&desc, &raw(&[("u", json!("plain"))])).unwrap();
        assert_eq!(coerced.get("u"), Some(&Value::Text("plain".to_string())));
    }

    #[test]
    fn test_too_many_parameters_rejected() {
        let desc = descriptor(&[("only", "VARCHAR")]);
        let err = coerce_parameters(
            &desc,
            &raw(&[("only", json!("a")), ("extra", json!("b"))]),
        )
        .unwrap_err();
        assert_eq!(err.code(), "PARAMETER_ERROR");
    }

    #[test]
    fn test_null_values_do_not_count_and_are_omitted() {
        let desc = descriptor(&[("a", "VARCHAR")]);
        let coerced = coerce_parameters(
            &desc,
            &raw(&[("a", json!("x")), ("ignored", JsonValue::Null)]),
        )
        .unwrap();
        assert_eq!(coerced.len(), 1);
    }

    #[test]
    fn test_omitted_parameter_not_synthesized() {
        let desc = descriptor(&[("a", "VARCHAR"), ("b", "VARCHAR")]);
        let coerced = coerce_parameters(&desc, &raw(&[("a", json!("x"))])).unwrap();
        assert!(coerced.contains_key("a"));
        assert!(!coerced.contains_key("b"));
    }
}
