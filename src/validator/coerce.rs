//! Conversion of raw request values into the types their schemas declare.
//!
//! Query strings, headers and form fields always arrive as text. Before a
//! value is checked against its schema it is cast to the declared `type`, so
//! that `?limit=10` satisfies `{"type": "integer"}`.

use super::error::TypeCoercionError;
use crate::spec::{schema_is_nullable, ParameterMeta};
use serde_json::{Map, Number, Value};

/// True for JSON `null` and for the strings `"null"` / `"None"` (trimmed).
pub fn is_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => matches!(s.trim(), "null" | "None"),
        _ => false,
    }
}

/// `nullable` on the parameter schema or `x-nullable` on the descriptor.
pub fn is_nullable(param: &ParameterMeta) -> bool {
    param.nullable || schema_is_nullable(&param.schema)
}

/// Cast `value` to the type declared by `schema`.
///
/// Returns a new value; the schema is never touched. Already-typed values
/// come back unchanged. Array items and object leaves that cannot be
/// converted are kept as they are so schema validation can report them.
pub fn coerce_type(
    schema: &Value,
    value: &Value,
    location: &str,
    name: &str,
) -> Result<Value, TypeCoercionError> {
    if value.is_null() || (schema_is_nullable(schema) && is_null(value)) {
        return Ok(Value::Null);
    }
    let Some(declared) = schema.get("type").and_then(Value::as_str) else {
        return Ok(value.clone());
    };
    let fail = || TypeCoercionError {
        value: value.clone(),
        expected: declared.to_string(),
        location: location.to_string(),
        name: name.to_string(),
    };

    match declared {
        "integer" => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(Value::from(f as i64))
                }
                _ => Err(fail()),
            },
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| fail()),
            _ => Err(fail()),
        },
        "number" => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(fail),
            _ => Err(fail()),
        },
        "boolean" => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(fail()),
        },
        "string" => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(fail()),
        },
        "array" => {
            let items: Vec<Value> = match value {
                Value::Array(items) => items.clone(),
                Value::String(s) => s.split(',').map(|p| Value::String(p.to_string())).collect(),
                _ => return Err(fail()),
            };
            let Some(item_schema) = schema.get("items") else {
                return Ok(Value::Array(items));
            };
            Ok(Value::Array(
                items
                    .into_iter()
                    .map(|item| coerce_type(item_schema, &item, location, name).unwrap_or(item))
                    .collect(),
            ))
        }
        "object" => {
            let object = match value {
                Value::Object(map) => map.clone(),
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(Value::Object(map)) => map,
                    _ => return Err(fail()),
                },
                _ => return Err(fail()),
            };
            match schema.get("properties").and_then(Value::as_object) {
                Some(properties) => Ok(Value::Object(cast_leaves(properties, object, location))),
                None => Ok(Value::Object(object)),
            }
        }
        _ => Ok(value.clone()),
    }
}

fn cast_leaves(properties: &Map<String, Value>, object: Map<String, Value>, location: &str) -> Map<String, Value> {
    object
        .into_iter()
        .map(|(key, leaf)| {
            let cast = match properties.get(&key) {
                Some(prop_schema) => coerce_type(prop_schema, &leaf, location, &key).unwrap_or(leaf),
                None => leaf,
            };
            (key, cast)
        })
        .collect()
}
