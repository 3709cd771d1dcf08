//! Canonical flag-string rendering of attribute values.
//!
//! Rendering is the inverse of [`crate::parse::parse_str`]: every value is
//! escaped and quoted exactly enough that the raw-string parser reads it
//! back unchanged. Array elements are escaped and comma-quoted first, then
//! the joined list is escaped and space-quoted like any string.

use crate::kind::TargetKind;
use crate::quote::{join_string, quote, uninterpret};
use crate::value::{ConfigMap, Value};

/// Text that one round of interpretation must produce for `value`.
///
/// Undefined and map values have no flag-string form.
fn logical_text(value: &Value) -> Option<String> {
    match value {
        Value::None | Value::Map(_) => None,
        Value::Bool(v) => Some(if *v { "1" } else { "0" }.to_string()),
        Value::Int(v) => Some(v.to_string()),
        Value::Str(s) => Some(s.clone()),
        Value::Target(t) => Some(t.str().to_string()),
        Value::Array(items) => {
            let elements: Vec<String> = items
                .iter()
                .filter_map(logical_text)
                .map(|text| {
                    let u = uninterpret(&text);
                    if u.contains(',') {
                        quote(&u)
                    } else {
                        u
                    }
                })
                .collect();
            Some(join_string(&elements, ','))
        }
    }
}

/// Render one attribute value as it appears after `-key=`.
pub fn stringify_value(value: &Value) -> Option<String> {
    logical_text(value).map(|text| {
        let u = uninterpret(&text);
        if u.contains(' ') {
            quote(&u)
        } else {
            u
        }
    })
}

/// Render an attribute map as sorted `-key=value` flags.
///
/// Undefined values and values rendering to an empty string are omitted.
pub fn stringify_attrs(attrs: &ConfigMap) -> String {
    let flags: Vec<String> = attrs
        .iter()
        .filter_map(|(key, value)| {
            let text = stringify_value(value)?;
            (!text.is_empty()).then(|| format!("-{key}={text}"))
        })
        .collect();
    join_string(&flags, ' ')
}

/// `<kind> [-keys=k1,k2,...] [-attr=value ...]`.
pub(crate) fn stringify_target(kind: &TargetKind, keys: &[String], attrs: &ConfigMap) -> String {
    let mut out = kind.name().to_string();
    if !keys.is_empty() {
        let keys = Value::Array(keys.iter().cloned().map(Value::Str).collect());
        if let Some(text) = stringify_value(&keys) {
            out.push_str(" -keys=");
            out.push_str(&text);
        }
    }
    let flags = stringify_attrs(attrs);
    if !flags.is_empty() {
        out.push(' ');
        out.push_str(&flags);
    }
    out
}
