//! Dynamically typed attribute values.
//!
//! Attribute maps, raw configs and feature maps all hold [`Value`]s. The
//! variant set is closed, so schema dispatch is exhaustive matching.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::target::Target;

/// A loose `{key: value}` configuration, or a validated attribute map.
pub type ConfigMap = BTreeMap<String, Value>;

/// A dynamically typed attribute value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Undefined. Skipped when stringifying.
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Target(Target),
    Array(Vec<Value>),
    /// Entries in insertion order; keys are unique. Order is ignored by
    /// equality and hashing.
    Map(Vec<(Value, Value)>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Target(a), Value::Target(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.iter().any(|(bk, bv)| k == bk && v == bv))
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Value::None => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Target(t) => t.hash(state),
            Value::Array(items) => items.hash(state),
            Value::Map(entries) => {
                // Commutative combine so entry order does not matter.
                let mut combined = 0u64;
                for (k, v) in entries {
                    let mut entry = DefaultHasher::new();
                    k.hash(&mut entry);
                    v.hash(&mut entry);
                    combined = combined.wrapping_add(entry.finish());
                }
                entries.len().hash(state);
                combined.hash(state);
            }
        }
    }
}

impl Value {
    /// Printable name of the variant, used in type errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "str",
            Value::Target(_) => "Target",
            Value::Array(_) => "Array",
            Value::Map(_) => "Map",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Target(t) => Some(t),
            _ => None,
        }
    }

    /// Build a map value from string keys.
    pub fn map<K, V, I>(entries: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Str(k.into()), v.into()))
                .collect(),
        )
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Target> for Value {
    fn from(v: Target) -> Self {
        Value::Target(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Target(t) => write!(f, "{t}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Conversion out of a [`Value`] for the typed attribute getters.
pub trait FromValue: Sized {
    /// Name of the expected type, used in mismatch messages.
    fn expected() -> String;

    /// `None` if `value` does not hold this type.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn expected() -> String {
        "Any".into()
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for i64 {
    fn expected() -> String {
        "int".into()
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for bool {
    fn expected() -> String {
        "bool".into()
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for String {
    fn expected() -> String {
        "str".into()
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for Target {
    fn expected() -> String {
        "Target".into()
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_target().cloned()
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn expected() -> String {
        format!("Array<{}>", T::expected())
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_array()?.iter().map(T::from_value).collect()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_none(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Target(t) => t.export().serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                // Sorted by key so equal maps export identically.
                let mut sorted: Vec<&(Value, Value)> = entries.iter().collect();
                sorted.sort_by_cached_key(|(k, _)| k.to_string());
                let mut map = serializer.serialize_map(Some(sorted.len()))?;
                for (k, v) in sorted {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a bool, integer, string, array or table")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| E::custom(format!("integer {v} does not fit in int64")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Err(E::custom(format!(
            "floating point value {v} is not a supported attribute type"
        )))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::Str(v))
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::None)
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Value, D::Error> {
        Value::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut entries: Vec<(Value, Value)> = Vec::new();
        while let Some((k, v)) = map.next_entry::<Value, Value>()? {
            match entries.iter_mut().find(|(existing, _)| *existing == k) {
                Some(slot) => slot.1 = v,
                None => entries.push((k, v)),
            }
        }
        Ok(Value::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        let v = Value::from(vec!["a", "b"]);
        assert_eq!(v.to_string(), r#"["a", "b"]"#);
        assert_eq!(Value::Int(3).to_string(), "3");
        assert_eq!(Value::map([("k", 1)]).to_string(), r#"{"k": 1}"#);
    }

    #[test]
    fn typed_extraction() {
        let v = Value::from(vec![1i64, 2, 3]);
        assert_eq!(Vec::<i64>::from_value(&v), Some(vec![1, 2, 3]));
        assert_eq!(Vec::<String>::from_value(&v), None);
        assert_eq!(String::from_value(&Value::from("x")), Some("x".into()));
        assert_eq!(Vec::<String>::expected(), "Array<str>");
    }

    #[test]
    fn deserialize_json_config() {
        let config: ConfigMap = serde_json::from_str(
            r#"{"kind": "llvm", "keys": ["cpu"], "num-cores": 4, "host": {"kind": "c"}, "x": null}"#,
        )
        .unwrap();
        assert_eq!(config["kind"], Value::from("llvm"));
        assert_eq!(config["keys"], Value::from(vec!["cpu"]));
        assert_eq!(config["num-cores"], Value::Int(4));
        assert_eq!(config["host"], Value::map([("kind", "c")]));
        assert!(config["x"].is_none());
    }

    fn hash_of(v: &Value) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[test]
    fn map_equality_ignores_entry_order() {
        let a = Value::map([("threads", 8), ("blocks", 2)]);
        let b = Value::map([("blocks", 2), ("threads", 8)]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        assert_ne!(a, Value::map([("threads", 8), ("blocks", 3)]));
        assert_ne!(a, Value::map([("threads", 8)]));
        assert_ne!(Value::from(vec![1, 2]), Value::from(vec![2, 1]));
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn deserialize_rejects_floats() {
        assert!(serde_json::from_str::<ConfigMap>(r#"{"kind": 1.5}"#).is_err());
    }

    #[test]
    fn serialize_json() {
        let v = Value::map([("a", Value::from(vec![true, false]))]);
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"a":[true,false]}"#);
    }
}
