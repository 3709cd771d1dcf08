//! The [`Target`] object.
//!
//! A target is an immutable, reference-counted description of a compilation
//! target: a kind, an optional host target, a tag, capability keys, typed
//! attributes and parser-derived features. Cloning a `Target` shares the
//! same underlying object; [`Target::same_as`] tests that identity, while
//! `==` compares structure.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use serde::{Serialize, Serializer};

use crate::config::{self, TargetSource};
use crate::error::{Result, TargetError};
use crate::hash::fingerprint_export;
use crate::kind::TargetKind;
use crate::stringify::stringify_target;
use crate::value::{ConfigMap, FromValue, Value};

/// A validated compilation target.
#[derive(Clone)]
pub struct Target(Arc<TargetNode>);

#[derive(Clone)]
struct TargetNode {
    kind: Arc<TargetKind>,
    host: Option<Target>,
    tag: String,
    keys: Vec<String>,
    attrs: ConfigMap,
    features: ConfigMap,
    repr: OnceLock<String>,
}

impl Target {
    /// Build a target from a tag name, a raw flag string or a JSON config.
    ///
    /// Errors keep their kind and carry the input string as context.
    pub fn parse(s: &str) -> Result<Target> {
        config::from_string(s)
            .map_err(|e| e.with_suffix(format!(". Target creation from string failed: {s}")))
    }

    /// Build a target from a loose config map.
    pub fn from_config(config: ConfigMap) -> Result<Target> {
        let original = config.clone();
        config::from_config(config).map_err(|e| {
            let shown = Value::map(original);
            e.with_suffix(format!(". Target creation from config dict failed: {shown}"))
        })
    }

    /// Build a target from any source, without wrapping errors.
    ///
    /// This is the recursive entry point used for hosts and nested target
    /// attributes; an existing target is returned as is.
    pub fn build(source: impl Into<TargetSource>) -> Result<Target> {
        match source.into() {
            TargetSource::Str(s) => config::from_string(&s),
            TargetSource::Config(c) => config::from_config(c),
            TargetSource::Target(t) => Ok(t),
        }
    }

    pub(crate) fn from_parts(
        kind: Arc<TargetKind>,
        host: Option<Target>,
        tag: String,
        keys: Vec<String>,
        attrs: ConfigMap,
        features: ConfigMap,
    ) -> Target {
        Target(Arc::new(TargetNode {
            kind,
            host,
            tag,
            keys,
            attrs,
            features,
            repr: OnceLock::new(),
        }))
    }

    pub fn kind(&self) -> &Arc<TargetKind> {
        &self.0.kind
    }

    pub fn host(&self) -> Option<&Target> {
        self.0.host.as_ref()
    }

    /// The tag this target was registered under, or `""`.
    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    pub fn keys(&self) -> &[String] {
        &self.0.keys
    }

    pub fn attrs(&self) -> &ConfigMap {
        &self.0.attrs
    }

    /// Features derived by the kind's target parser.
    pub fn features(&self) -> &ConfigMap {
        &self.0.features
    }

    /// The canonical flag string, computed on first use.
    ///
    /// Covers the kind, keys and attributes. Tag and host are not part of
    /// the canonical string.
    pub fn str(&self) -> &str {
        self.0
            .repr
            .get_or_init(|| stringify_target(&self.0.kind, &self.0.keys, &self.0.attrs))
    }

    /// A plain config map that rebuilds an equal target.
    pub fn export(&self) -> ConfigMap {
        let mut out = ConfigMap::new();
        out.insert("kind".into(), Value::from(self.kind().name()));
        out.insert("tag".into(), Value::from(self.tag()));
        out.insert("keys".into(), Value::from(self.keys().to_vec()));
        if let Some(host) = self.host() {
            out.insert("host".into(), Value::map(host.export()));
        }
        for (key, value) in self.attrs() {
            if !value.is_none() {
                out.insert(key.clone(), value.clone());
            }
        }
        out
    }

    /// A copy of this target with `host` attached.
    pub fn with_host(&self, host: Target) -> Target {
        let mut node = (*self.0).clone();
        node.host = Some(host);
        Target(Arc::new(node))
    }

    /// A copy without a host, or this same object if it has none.
    pub fn without_host(&self) -> Target {
        if self.0.host.is_none() {
            return self.clone();
        }
        let mut node = (*self.0).clone();
        node.host = None;
        Target(Arc::new(node))
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.0.keys.iter().any(|k| k == key)
    }

    /// Typed attribute lookup. Undefined attributes read as `None`.
    ///
    /// # Panics
    ///
    /// Panics if the stored value does not have type `T`.
    pub fn get_attr<T: FromValue>(&self, key: &str) -> Option<T> {
        typed_lookup(&self.0.attrs, "Attribute", key)
    }

    pub fn get_attr_or<T: FromValue>(&self, key: &str, default: T) -> T {
        self.get_attr(key).unwrap_or(default)
    }

    /// Like [`Target::get_attr`], returning a type error on mismatch.
    pub fn try_get_attr<T: FromValue>(&self, key: &str) -> Result<Option<T>> {
        try_typed_lookup(&self.0.attrs, "Attribute", key)
    }

    /// Typed feature lookup.
    ///
    /// # Panics
    ///
    /// Panics if the stored value does not have type `T`.
    pub fn get_feature<T: FromValue>(&self, key: &str) -> Option<T> {
        typed_lookup(&self.0.features, "Feature", key)
    }

    pub fn get_feature_or<T: FromValue>(&self, key: &str, default: T) -> T {
        self.get_feature(key).unwrap_or(default)
    }

    /// `target_device_type` if set, else the kind's default device type.
    pub fn device_type(&self) -> i32 {
        self.get_attr::<i64>("target_device_type")
            .and_then(|code| i32::try_from(code).ok())
            .unwrap_or_else(|| self.kind().default_device_type())
    }

    /// Entries of the `libs` attribute.
    pub fn libs(&self) -> BTreeSet<String> {
        self.get_attr::<Vec<String>>("libs")
            .unwrap_or_default()
            .into_iter()
            .collect()
    }

    /// Number of hosts below this target.
    pub fn host_depth(&self) -> usize {
        self.host().map_or(0, |host| 1 + host.host_depth())
    }

    /// Identity comparison: both handles point at the same object.
    pub fn same_as(&self, other: &Target) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// SHA-256 hex digest of the exported description.
    pub fn fingerprint(&self) -> Result<String> {
        fingerprint_export(&self.export())
    }

    /// Verbose diagnostic form, including object identity and the host.
    pub fn to_debug_string(&self) -> String {
        let mut out = format!(
            "Target(id={:x}, kind='{}'",
            Arc::as_ptr(&self.0) as usize,
            self.kind().name()
        );
        if !self.tag().is_empty() {
            out.push_str(&format!(", tag='{}'", self.tag()));
        }
        if !self.keys().is_empty() {
            let keys: Vec<String> = self.keys().iter().map(|k| format!("'{k}'")).collect();
            out.push_str(&format!(", keys={{{}}}", keys.join(", ")));
        }
        if !self.attrs().is_empty() {
            let attrs: Vec<String> = self
                .attrs()
                .iter()
                .map(|(k, v)| format!("'{k}': {v}"))
                .collect();
            out.push_str(&format!(", attrs={{{}}}", attrs.join(", ")));
        }
        if let Some(host) = self.host() {
            out.push_str(&format!(", host={}", host.to_debug_string()));
        }
        out.push(')');
        out
    }
}

fn try_typed_lookup<T: FromValue>(map: &ConfigMap, what: &str, key: &str) -> Result<Option<T>> {
    match map.get(key) {
        None | Some(Value::None) => Ok(None),
        Some(value) => T::from_value(value).map(Some).ok_or_else(|| {
            TargetError::type_error(format!(
                "{what} \"{key}\" has type {}, not {}",
                value.type_name(),
                T::expected()
            ))
        }),
    }
}

fn typed_lookup<T: FromValue>(map: &ConfigMap, what: &str, key: &str) -> Option<T> {
    match try_typed_lookup(map, what, key) {
        Ok(value) => value,
        Err(e) => panic!("{e}"),
    }
}

/// Attach `host` to `target`, or adopt the target's own host when `host`
/// is unset, so that both agree afterwards.
pub fn check_and_update_host_consistency(target: &mut Target, host: &mut Option<Target>) {
    if let Some(h) = host.take() {
        *target = target.with_host(h);
    }
    *host = target.host().cloned();
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
            || (self.kind().name() == other.kind().name()
                && self.tag() == other.tag()
                && self.keys() == other.keys()
                && self.attrs() == other.attrs()
                && self.features() == other.features()
                && self.host() == other.host())
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().name().hash(state);
        self.tag().hash(state);
        self.keys().hash(state);
        self.attrs().hash(state);
        self.host().hash(state);
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("kind", &self.kind().name())
            .field("tag", &self.tag())
            .field("keys", &self.keys())
            .field("attrs", self.attrs())
            .field("host", &self.host())
            .finish()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.str())
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        Target::parse(s)
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.export().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(t: &Target) -> u64 {
        let mut h = DefaultHasher::new();
        t.hash(&mut h);
        h.finish()
    }

    #[test]
    fn canonical_string() {
        let t = Target::parse("llvm -mcpu=cortex-a72 -keys=cpu,arm -num-cores=4").unwrap();
        assert_eq!(
            t.str(),
            "llvm -keys=cpu,arm -link-params=0 -mcpu=cortex-a72 -num-cores=4"
        );
        assert_eq!(t.to_string(), t.str());
        assert!(!t.str().ends_with(' '));
    }

    #[test]
    fn canonical_string_reparses_equal() {
        let t = Target::parse("cuda -mcpu=sm_80 -libs=cublas,cudnn -model='a b'").unwrap();
        let again = Target::parse(t.str()).unwrap();
        assert_eq!(t, again);
        assert_eq!(hash_of(&t), hash_of(&again));
        assert!(!t.same_as(&again));
    }

    #[test]
    fn parse_errors_keep_kind_and_input() {
        let err = Target::parse("llvm -bogus=1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(err
            .to_string()
            .ends_with(". Target creation from string failed: llvm -bogus=1"));

        let mut config = ConfigMap::new();
        config.insert("tag".into(), Value::from("x"));
        let err = Target::from_config(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert!(err
            .to_string()
            .ends_with(r#". Target creation from config dict failed: {"tag": "x"}"#));
    }

    #[test]
    fn from_str_trait() {
        let t: Target = "c -mcpu=x".parse().unwrap();
        assert_eq!(t.kind().name(), "c");
    }

    #[test]
    fn export_rebuilds_equal_target() {
        let t = Target::parse("cuda -device=gpu0 -host='llvm -mtriple=aarch64-linux-gnu'").unwrap();
        let exported = t.export();
        assert_eq!(exported["kind"], Value::from("cuda"));
        assert_eq!(exported["keys"], Value::from(vec!["cuda", "gpu", "gpu0"]));
        assert!(matches!(exported["host"], Value::Map(_)));
        let rebuilt = Target::from_config(exported).unwrap();
        assert_eq!(rebuilt, t);
        assert_eq!(rebuilt.host().unwrap().features(), t.host().unwrap().features());
    }

    #[test]
    fn with_host_copies() {
        let t = Target::parse("cuda").unwrap();
        let h = Target::parse("llvm").unwrap();
        let t2 = t.with_host(h.clone());
        assert!(t.host().is_none());
        assert!(t2.host().unwrap().same_as(&h));
        assert_eq!(t2.without_host(), t);
        assert_eq!(t2.attrs(), t.attrs());
    }

    #[test]
    fn without_host_reuses_object() {
        let t = Target::parse("c").unwrap();
        assert!(t.without_host().same_as(&t));
    }

    #[test]
    fn keys_and_typed_getters() {
        let t = Target::parse("llvm -keys=cpu,arm -num-cores=4 -mattr=+neon,+v8").unwrap();
        assert!(t.has_key("arm"));
        assert!(!t.has_key("gpu"));
        assert_eq!(t.get_attr::<i64>("num-cores"), Some(4));
        assert_eq!(t.get_attr::<String>("mcpu"), None);
        assert_eq!(t.get_attr_or("mcpu", "generic".to_string()), "generic");
        assert_eq!(
            t.get_attr::<Vec<String>>("mattr"),
            Some(vec!["+neon".to_string(), "+v8".to_string()])
        );
        assert!(t.get_feature::<bool>("has_neon").unwrap());
        assert!(!t.get_feature_or("has_avx2", true));
    }

    #[test]
    #[should_panic(expected = "has type int, not str")]
    fn typed_getter_mismatch_panics() {
        let t = Target::parse("llvm -num-cores=4").unwrap();
        let _ = t.get_attr::<String>("num-cores");
    }

    #[test]
    fn try_getter_reports_mismatch() {
        let t = Target::parse("llvm -num-cores=4").unwrap();
        let err = t.try_get_attr::<bool>("num-cores").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn device_type_and_libs() {
        let t = Target::parse("cuda -libs=cudnn,cublas,cudnn").unwrap();
        assert_eq!(t.device_type(), crate::device::DeviceType::Cuda.code());
        assert_eq!(
            t.libs().into_iter().collect::<Vec<_>>(),
            vec!["cublas".to_string(), "cudnn".to_string()]
        );
        let t = Target::parse("llvm -target_device_type=12").unwrap();
        assert_eq!(t.device_type(), 12);
    }

    #[test]
    fn debug_string() {
        let t = Target::parse("cuda -mcpu=sm_80 -host=c").unwrap();
        let s = t.to_debug_string();
        assert!(s.starts_with("Target(id="));
        assert!(s.contains("kind='cuda'"));
        assert!(s.contains("keys={'cuda', 'gpu'}"));
        assert!(s.contains(r#"'mcpu': "sm_80""#));
        assert!(s.contains("host=Target(id="));
        assert!(s.ends_with("))"));
    }

    #[test]
    fn fingerprint_is_structural() {
        let a = Target::parse("llvm -mcpu=x").unwrap();
        let b = Target::parse("llvm  -mcpu=x").unwrap();
        let c = Target::parse("llvm -mcpu=y").unwrap();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);
    }

    #[test]
    fn host_consistency() {
        let mut target = Target::parse("cuda").unwrap();
        let mut host = Some(Target::parse("llvm").unwrap());
        check_and_update_host_consistency(&mut target, &mut host);
        assert!(target.host().unwrap().same_as(host.as_ref().unwrap()));

        let mut none = None;
        check_and_update_host_consistency(&mut target, &mut none);
        assert_eq!(none.unwrap().kind().name(), "llvm");
    }

    #[test]
    fn serialize_as_export_map() {
        let t = Target::parse("c -mcpu=x").unwrap();
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["kind"], "c");
        assert_eq!(json["mcpu"], "x");
        assert_eq!(json["keys"], serde_json::json!(["cpu"]));
    }
}
