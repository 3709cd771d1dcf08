//! Schema-directed parsing of attribute values.
//!
//! Values arrive either as raw text from a flag string ([`parse_str`]) or
//! as already-typed values from a config map ([`parse_value`]). Both
//! recurse through arrays and nested targets; only the typed path accepts
//! maps. Errors raised for an array element or map entry are re-raised
//! with the index or key attached and their kind unchanged.

use crate::config::TargetSource;
use crate::error::{Result, TargetError};
use crate::quote::{interpret, split_string};
use crate::schema::ValueType;
use crate::target::Target;
use crate::value::Value;

/// Parse an attribute value from its raw, possibly quoted, text.
pub fn parse_str(raw: &str, ty: &ValueType) -> Result<Value> {
    let text = interpret(raw)?;
    match ty {
        ValueType::Int => parse_integer(&text).map(Value::Int),
        ValueType::Bool => parse_integer(&text).map(|v| Value::Bool(v != 0)),
        ValueType::Str => Ok(Value::Str(text.trim_matches(' ').to_string())),
        ValueType::Target => Target::parse(&text).map(Value::Target),
        ValueType::Array(elem) => {
            let mut items = Vec::new();
            for (index, token) in split_string(&text, ',').iter().enumerate() {
                let item = parse_str(token, elem).map_err(|e| e.with_suffix(format!("[{index}]")))?;
                items.push(item);
            }
            Ok(Value::Array(items))
        }
        ValueType::Map(..) => Err(TargetError::type_error(format!(
            "Unsupported type \"{ty}\" for parsing from string: {text}"
        ))),
    }
}

/// Integers, with case-insensitive `true`/`false` accepted as 1/0.
fn parse_integer(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(v);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => Ok(1),
        "false" => Ok(0),
        _ => Err(TargetError::value_error(format!(
            "Cannot parse integer from string: {text}"
        ))),
    }
}

/// Check an already-typed value against `ty`.
///
/// Scalars must carry exactly the expected type. Nested targets may be
/// given as a [`Target`], a target string or a config map.
pub fn parse_value(value: &Value, ty: &ValueType) -> Result<Value> {
    match ty {
        ValueType::Int => expect_type(value, ty, matches!(value, Value::Int(_))),
        ValueType::Bool => expect_type(value, ty, matches!(value, Value::Bool(_))),
        ValueType::Str => expect_type(value, ty, matches!(value, Value::Str(_))),
        ValueType::Target => {
            let source = TargetSource::try_from(value.clone())?;
            Target::build(source).map(Value::Target)
        }
        ValueType::Array(elem) => {
            let Value::Array(items) = value else {
                return Err(type_mismatch(value, ty));
            };
            let mut result = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let parsed = parse_value(item, elem).map_err(|e| e.with_prefix(format!("[{index}]")))?;
                result.push(parsed);
            }
            Ok(Value::Array(result))
        }
        ValueType::Map(key_ty, val_ty) => {
            let Value::Map(entries) = value else {
                return Err(type_mismatch(value, ty));
            };
            let mut result: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                let key = parse_value(k, key_ty)
                    .map_err(|e| e.with_suffix(", during parse key of map"))?;
                let val = parse_value(v, val_ty)
                    .map_err(|e| e.with_suffix(format!(", during parsing value of map[{key}]")))?;
                match result.iter_mut().find(|(existing, _)| *existing == key) {
                    Some(slot) => slot.1 = val,
                    None => result.push((key, val)),
                }
            }
            Ok(Value::Map(result))
        }
    }
}

fn expect_type(value: &Value, ty: &ValueType, ok: bool) -> Result<Value> {
    if ok {
        Ok(value.clone())
    } else {
        Err(type_mismatch(value, ty))
    }
}

fn type_mismatch(value: &Value, ty: &ValueType) -> TargetError {
    TargetError::type_error(format!(
        "Expects type \"{ty}\", but gets \"{}\" for object: {value}",
        value.type_name()
    ))
}
