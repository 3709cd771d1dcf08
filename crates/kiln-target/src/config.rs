//! Target assembly from strings and config maps.
//!
//! Every way of describing a target ends up in [`from_config`]:
//!
//! 1. A registered tag name resolves to the tag's pre-built target.
//! 2. A string starting with `{` is loaded as a JSON config map.
//! 3. Any other string is tokenized as `<kind> -key=value ...`, each value
//!    being parsed against the kind's schema as it is read.
//!
//! Assembly then resolves the kind (running its target parser, if any),
//! the tag, the keys, the host and the attributes, merges queried device
//! attributes, applies defaults and finally runs the kind's preprocessor.

use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::device;
use crate::error::{Result, TargetError};
use crate::flags::{parse_kv_pair, strip_dashes};
use crate::kind::TargetKind;
use crate::loader::load_config_dict;
use crate::parse::{parse_str, parse_value};
use crate::quote::split_string;
use crate::tag::TargetTag;
use crate::target::Target;
use crate::value::{ConfigMap, Value};

/// Deepest allowed chain of `host` targets.
pub const MAX_HOST_DEPTH: usize = 8;

const KIND: &str = "kind";
const TAG: &str = "tag";
const KEYS: &str = "keys";
const DEVICE: &str = "device";
const HOST: &str = "host";
const FEATURES: &str = "features";
const FROM_DEVICE: &str = "from_device";
const TARGET_DEVICE_TYPE: &str = "target_device_type";

/// Config keys that are never filled from a device query.
const NOT_QUERIED: [&str; 6] = [TAG, KEYS, HOST, FROM_DEVICE, TARGET_DEVICE_TYPE, DEVICE];

/// Anything a target can be built from.
#[derive(Debug, Clone)]
pub enum TargetSource {
    /// A tag name, a raw flag string or a brace-delimited JSON config.
    Str(String),
    /// A loose `{key: value}` config.
    Config(ConfigMap),
    /// An existing target, used as is.
    Target(Target),
}

impl From<&str> for TargetSource {
    fn from(s: &str) -> Self {
        TargetSource::Str(s.to_string())
    }
}

impl From<String> for TargetSource {
    fn from(s: String) -> Self {
        TargetSource::Str(s)
    }
}

impl From<ConfigMap> for TargetSource {
    fn from(config: ConfigMap) -> Self {
        TargetSource::Config(config)
    }
}

impl From<Target> for TargetSource {
    fn from(target: Target) -> Self {
        TargetSource::Target(target)
    }
}

impl TryFrom<Value> for TargetSource {
    type Error = TargetError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Target(t) => Ok(TargetSource::Target(t)),
            Value::Str(s) => Ok(TargetSource::Str(s)),
            Value::Map(entries) => map_to_config(entries).map(TargetSource::Config),
            other => Err(TargetError::type_error(format!(
                "Expect type 'dict' or 'str' to construct Target, but get: {}",
                other.type_name()
            ))),
        }
    }
}

/// Convert map entries to a config, requiring string keys.
pub(crate) fn map_to_config(entries: Vec<(Value, Value)>) -> Result<ConfigMap> {
    entries
        .into_iter()
        .map(|(k, v)| match k {
            Value::Str(key) => Ok((key, v)),
            other => Err(TargetError::type_error(format!(
                "Target object requires key of dict to be str, but get: {}",
                other.type_name()
            ))),
        })
        .collect()
}

/// Tag name, JSON config literal or raw flag string.
pub(crate) fn from_string(s: &str) -> Result<Target> {
    if let Some(target) = TargetTag::get(s) {
        trace!(tag = s, "resolved target from tag");
        return Ok(target);
    }
    if s.starts_with('{') {
        return from_config(load_config_dict(s)?);
    }
    from_raw_string(s)
}

/// `<kind> [-key=value | -key value | -flag]*`.
pub(crate) fn from_raw_string(target_str: &str) -> Result<Target> {
    let options = split_string(target_str, ' ');
    let Some(name) = options.first() else {
        return Err(TargetError::value_error("Cannot parse empty target string"));
    };
    let kind = TargetKind::require(name)?;

    let mut config = ConfigMap::new();
    config.insert(KIND.into(), Value::Str(name.clone()));

    let mut iter = 1;
    while iter < options.len() {
        let next = options.get(iter + 1).map(String::as_str).unwrap_or("");
        let pair = strip_dashes(&options[iter])
            .and_then(|s| parse_kv_pair(s, next))
            .map_err(|e| e.with_suffix(format!(", during parsing target `{target_str}`")))?;
        iter += pair.consumed;

        let value = parse_raw_attr(&config, &kind, &pair.key, &pair.value)
            .map_err(|e| e.with_suffix(format!(", during parsing target[\"{}\"]", pair.key)))?;
        config.insert(pair.key, value);
    }
    from_config(config)
}

fn parse_raw_attr(config: &ConfigMap, kind: &TargetKind, key: &str, raw: &str) -> Result<Value> {
    if config.contains_key(key) {
        return Err(TargetError::value_error(format!(
            "The key \"{key}\" appears more than once"
        )));
    }
    parse_str(raw, kind.attr_type(key)?)
}

/// Assemble a validated target from a loose config.
pub(crate) fn from_config(mut config: ConfigMap) -> Result<Target> {
    if config.contains_key(FEATURES) {
        return Err(TargetError::value_error(
            "Target features should be generated by the target parser",
        ));
    }

    let kind = resolve_kind(&config)?;
    if kind.preprocessor().is_some() && kind.target_parser().is_some() {
        return Err(TargetError::type_error(format!(
            "Target kind \"{}\" cannot define both an attrs preprocessor and a target parser",
            kind.name()
        )));
    }

    let mut features = ConfigMap::new();
    if let Some(parser) = kind.target_parser() {
        debug!(kind = kind.name(), "running target parser");
        config = parser(config)?;
        if let Some(value) = config.remove(FEATURES) {
            features = match value {
                Value::Map(entries) => map_to_config(entries)?,
                other => {
                    return Err(TargetError::type_error(format!(
                        "Target parser for \"{}\" produced features of type {}, expected Map",
                        kind.name(),
                        other.type_name()
                    )))
                }
            };
        }
    }
    config.remove(KIND);

    let tag = match config.remove(TAG) {
        None | Some(Value::None) => String::new(),
        Some(Value::Str(tag)) => tag,
        Some(other) => {
            return Err(TargetError::type_error(format!(
                "Expect type of field \"tag\" is String, but get type: {}",
                other.type_name()
            )))
        }
    };

    let keys = resolve_keys(&kind, config.remove(KEYS), config.get(DEVICE))?;

    let host = match config.remove(HOST) {
        None | Some(Value::None) => None,
        Some(value) => {
            let host = Target::build(TargetSource::try_from(value)?)
                .map_err(|e| e.with_suffix(format!(", during parsing target[\"{HOST}\"]")))?;
            if host.host_depth() + 1 > MAX_HOST_DEPTH {
                return Err(TargetError::value_error(format!(
                    "Target host nesting exceeds the maximum depth of {MAX_HOST_DEPTH}"
                )));
            }
            Some(host)
        }
    };

    let mut attrs = ConfigMap::new();
    for (key, value) in config {
        if value.is_none() {
            continue;
        }
        let parsed = kind
            .attr_type(&key)
            .and_then(|ty| parse_value(&value, ty))
            .map_err(|e| e.with_suffix(format!(", during parsing target[\"{key}\"]")))?;
        attrs.insert(key, parsed);
    }

    if let Some(value) = attrs.remove(FROM_DEVICE) {
        let device_id = value.as_int().unwrap_or_default();
        let device_type = attrs
            .get(TARGET_DEVICE_TYPE)
            .and_then(Value::as_int)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or_else(|| kind.default_device_type());
        let queried = query_device(&kind, device_type, device_id)
            .map_err(|e| e.with_suffix(format!(", during parsing target[\"{FROM_DEVICE}\"]")))?;
        for (key, value) in queried {
            attrs.entry(key).or_insert(value);
        }
    }

    for (key, default) in kind.defaults() {
        attrs
            .entry(key.clone())
            .or_insert_with(|| default.clone());
    }

    if let Some(preprocessor) = kind.preprocessor() {
        debug!(kind = kind.name(), "running attrs preprocessor");
        attrs = preprocessor(attrs)?;
    }

    Ok(Target::from_parts(kind, host, tag, keys, attrs, features))
}

fn resolve_kind(config: &ConfigMap) -> Result<Arc<TargetKind>> {
    match config.get(KIND) {
        Some(Value::Str(name)) => TargetKind::require(name),
        Some(other) => Err(TargetError::type_error(format!(
            "Expect type of field \"kind\" is String, but get type: {}",
            other.type_name()
        ))),
        None => Err(TargetError::value_error("Field \"kind\" is not found")),
    }
}

/// Explicit keys (or the kind's defaults), then the device name, deduplicated.
fn resolve_keys(kind: &TargetKind, explicit: Option<Value>, device: Option<&Value>) -> Result<Vec<String>> {
    let mut keys = match explicit {
        None | Some(Value::None) => kind.default_keys().to_vec(),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Str(key) => Ok(key),
                other => Err(TargetError::type_error(format!(
                    "Expect 'keys' to be an array of strings, but it contains an element of type: {}",
                    other.type_name()
                ))),
            })
            .collect::<Result<Vec<_>>>()?,
        Some(other) => {
            return Err(TargetError::type_error(format!(
                "Expect type of field \"keys\" is Array, but get type: {}",
                other.type_name()
            )))
        }
    };
    if let Some(Value::Str(device)) = device {
        keys.push(device.clone());
    }
    Ok(dedup_keys(keys))
}

/// Remove repeated keys, keeping the first occurrence.
fn dedup_keys(keys: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(keys.len());
    for key in keys {
        if !out.contains(&key) {
            out.push(key);
        }
    }
    out
}

/// Attributes reported by the live device, typed against the kind's schema.
fn query_device(kind: &TargetKind, device_type: i32, device_id: i64) -> Result<ConfigMap> {
    let mut output = ConfigMap::new();

    let Some(api) = device::device_api(device_type) else {
        info!(
            kind = kind.name(),
            device_id,
            device_type,
            "no device API registered for this device type; using default target parameters"
        );
        return Ok(output);
    };

    if !api.exists(device_id) {
        return Err(TargetError::value_error(format!(
            "Requested reading the parameters for {} from device_id {device_id}, \
             but device_id {device_id} doesn't exist",
            kind.name()
        )));
    }

    for (key, ty) in kind.schema() {
        if NOT_QUERIED.contains(&key.as_str()) {
            continue;
        }
        if let Some(value) = api.target_property(device_id, key) {
            let parsed = parse_value(&value, ty)
                .map_err(|e| e.with_suffix(format!(", reported by device for \"{key}\"")))?;
            output.insert(key.clone(), parsed);
        }
    }
    Ok(output)
}
