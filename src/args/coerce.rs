//! Type coercion for resolved argument values.
//!
//! Scalars coerce by declared type; structured values are walked recursively
//! and each leaf coerced by its own shape. String leaves from stringly
//! sources (path, query, header) are additionally sniffed, so `"2"` becomes
//! the number 2 and `"true"` the boolean, matching how URL-encoded input is
//! expected to behave. JSON bodies arrive typed and are never sniffed.

use crate::registry::ArgType;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Number, Value};

/// Coerce one raw value to its declared type. `sniff` is set for values that
/// arrived as URL-encoded strings. Errors carry a bare mismatch description;
/// the resolver wraps them with the argument name.
pub(crate) fn coerce(value: Value, ty: ArgType, sniff: bool) -> Result<Value, String> {
    match ty {
        ArgType::Any => Ok(coerce_deep(value, sniff)),
        ArgType::String => coerce_string(value),
        ArgType::Number => coerce_number(value),
        ArgType::Boolean => Ok(coerce_boolean(value)),
        ArgType::Object => match value {
            Value::Object(map) => match unwrap_typed(&map) {
                Some(unwrapped) => unwrapped,
                None => Ok(coerce_deep(Value::Object(map), sniff)),
            },
            other => Err(format!("expected an object, got {}", kind_of(&other))),
        },
        ArgType::Array => match value {
            Value::Array(items) => Ok(coerce_deep(Value::Array(items), sniff)),
            other => Err(format!("expected an array, got {}", kind_of(&other))),
        },
        ArgType::Date => coerce_date(value),
        ArgType::Buffer => coerce_buffer(value),
    }
}

fn coerce_string(value: Value) -> Result<Value, String> {
    match value {
        Value::String(_) => Ok(value),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        other => Err(format!("expected a string, got {}", kind_of(&other))),
    }
}

fn coerce_number(value: Value) -> Result<Value, String> {
    match value {
        Value::Number(_) => Ok(value),
        Value::String(s) => parse_number(&s)
            .ok_or_else(|| format!("`{}` is not a numeric literal", s))
            .map(Value::Number),
        Value::Bool(b) => Ok(Value::Number(Number::from(i64::from(b)))),
        other => Err(format!("expected a number, got {}", kind_of(&other))),
    }
}

/// Booleans are permissive: `"true"`/`"false"` and numeric strings coerce by
/// value, numbers by zero-ness, and anything else passes through untouched.
fn coerce_boolean(value: Value) -> Value {
    match value {
        Value::Bool(_) => value,
        Value::String(ref s) => match s.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => match parse_number(other) {
                Some(n) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
                None => value,
            },
        },
        Value::Number(ref n) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
        other => other,
    }
}

fn coerce_date(value: Value) -> Result<Value, String> {
    match value {
        Value::String(s) => normalize_date(&s),
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .ok_or_else(|| format!("`{}` is not a millisecond timestamp", n))?;
            match Utc.timestamp_millis_opt(millis) {
                chrono::LocalResult::Single(dt) => Ok(Value::String(dt.to_rfc3339())),
                _ => Err(format!("timestamp {} is out of range", millis)),
            }
        }
        Value::Object(map) => match unwrap_typed(&map) {
            Some(unwrapped) => unwrapped,
            None => Err("expected a date string or a $type:date wrapper".to_string()),
        },
        other => Err(format!("expected a date, got {}", kind_of(&other))),
    }
}

fn coerce_buffer(value: Value) -> Result<Value, String> {
    match value {
        Value::String(s) => normalize_base64(&s),
        Value::Object(map) => match unwrap_typed(&map) {
            Some(unwrapped) => unwrapped,
            None => Err("expected a base64 string or a $type:base64 wrapper".to_string()),
        },
        other => Err(format!("expected a buffer, got {}", kind_of(&other))),
    }
}

/// Recursive leaf-shape pass over a structured value. `$type` wrappers whose
/// data validates are normalized in place; invalid wrappers are left as-is
/// (the declared-type path reports those as errors).
pub(crate) fn coerce_deep(value: Value, sniff: bool) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(Ok(unwrapped)) = unwrap_typed(&map) {
                return unwrapped;
            }
            let coerced: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, coerce_deep(v, sniff)))
                .collect();
            Value::Object(coerced)
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| coerce_deep(v, sniff)).collect())
        }
        Value::String(s) if sniff => sniff_string(s),
        other => other,
    }
}

/// Recognize the `{"$type": …, "$data": …}` transport wrapper. Returns `None`
/// for plain objects, `Some(Err)` when the wrapper's data does not validate.
fn unwrap_typed(map: &Map<String, Value>) -> Option<Result<Value, String>> {
    if map.len() != 2 {
        return None;
    }
    let ty = map.get("$type")?.as_str()?;
    let data = map.get("$data")?.as_str()?;
    match ty {
        "date" => Some(normalize_date(data)),
        "base64" => Some(normalize_base64(data)),
        _ => None,
    }
}

fn normalize_date(s: &str) -> Result<Value, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| Value::String(dt.with_timezone(&Utc).to_rfc3339()))
        .map_err(|_| format!("`{}` is not an ISO-8601 date", s))
}

fn normalize_base64(s: &str) -> Result<Value, String> {
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map(|_| Value::String(s.to_string()))
        .map_err(|_| "invalid base64 payload".to_string())
}

/// URL-encoded values arrive as strings; recover the JSON shape the sender
/// meant. Anything that is not a full boolean or numeric literal stays a
/// string.
fn sniff_string(s: String) -> Value {
    match s.as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    match parse_number(&s) {
        Some(n) => Value::Number(n),
        None => Value::String(s),
    }
}

/// Human-readable kind name for coercion error messages.
fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_number(s: &str) -> Option<Number> {
    if s.is_empty() {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    // Reject the non-finite and exotic spellings f64::from_str accepts.
    if s.parse::<f64>().is_ok() && s.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c)) {
        return s.parse::<f64>().ok().and_then(Number::from_f64);
    }
    None
}
