//! Target kinds: attribute schemas, defaults and parsing hooks.
//!
//! A kind names a family of targets (a backend) and declares which
//! attributes its targets accept, their value types and defaults, the
//! device type and default keys, and at most one of two hooks:
//!
//! - a **preprocessor**, run over the final attribute map, and
//! - a **target parser**, run over the whole loose config before
//!   attributes are validated, which may also emit a `features` map.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::device::DeviceType;
use crate::error::{Result, TargetError};
use crate::schema::ValueType;
use crate::value::{ConfigMap, Value};

/// A config-rewriting hook.
pub type ConfigHook = Arc<dyn Fn(ConfigMap) -> Result<ConfigMap> + Send + Sync>;

/// A registered target kind.
#[derive(Clone)]
pub struct TargetKind {
    name: String,
    default_device_type: i32,
    default_keys: Vec<String>,
    schema: BTreeMap<String, ValueType>,
    defaults: BTreeMap<String, Value>,
    preprocessor: Option<ConfigHook>,
    target_parser: Option<ConfigHook>,
}

impl TargetKind {
    /// Start a kind definition with the attribute options every kind shares.
    pub fn builder(name: impl Into<String>) -> TargetKindBuilder {
        TargetKindBuilder::new(name.into())
    }

    /// Look up a registered kind.
    pub fn get(name: &str) -> Option<Arc<TargetKind>> {
        registry()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Look up a registered kind, failing with a type error if unknown.
    pub fn require(name: &str) -> Result<Arc<TargetKind>> {
        Self::get(name).ok_or_else(|| {
            TargetError::type_error(format!("Target kind \"{name}\" is not defined"))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_device_type(&self) -> i32 {
        self.default_device_type
    }

    pub fn default_keys(&self) -> &[String] {
        &self.default_keys
    }

    /// Declared attributes and their value types.
    pub fn schema(&self) -> &BTreeMap<String, ValueType> {
        &self.schema
    }

    /// Default values for declared attributes.
    pub fn defaults(&self) -> &BTreeMap<String, Value> {
        &self.defaults
    }

    pub fn preprocessor(&self) -> Option<&ConfigHook> {
        self.preprocessor.as_ref()
    }

    pub fn target_parser(&self) -> Option<&ConfigHook> {
        self.target_parser.as_ref()
    }

    /// The schema of `key`, or a type error listing the valid candidates.
    pub fn attr_type(&self, key: &str) -> Result<&ValueType> {
        self.schema.get(key).ok_or_else(|| {
            let candidates: Vec<&str> = self.schema.keys().map(String::as_str).collect();
            TargetError::type_error(format!(
                ": Cannot recognize '{key}'. Candidates are: {}",
                candidates.join(", ")
            ))
        })
    }
}

impl fmt::Debug for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetKind")
            .field("name", &self.name)
            .field("default_device_type", &self.default_device_type)
            .field("default_keys", &self.default_keys)
            .field("schema", &self.schema)
            .field("defaults", &self.defaults)
            .field("preprocessor", &self.preprocessor.is_some())
            .field("target_parser", &self.target_parser.is_some())
            .finish()
    }
}

/// Builder for [`TargetKind`].
pub struct TargetKindBuilder {
    kind: TargetKind,
}

impl TargetKindBuilder {
    fn new(name: String) -> Self {
        let kind = TargetKind {
            name,
            default_device_type: DeviceType::Cpu.code(),
            default_keys: Vec::new(),
            schema: BTreeMap::new(),
            defaults: BTreeMap::new(),
            preprocessor: None,
            target_parser: None,
        };
        Self { kind }
            .attr("tag", ValueType::Str)
            .attr("keys", ValueType::array(ValueType::Str))
            .attr("device", ValueType::Str)
            .attr("model", ValueType::Str)
            .attr("libs", ValueType::array(ValueType::Str))
            .attr("host", ValueType::Target)
            .attr("from_device", ValueType::Int)
            .attr("target_device_type", ValueType::Int)
    }

    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.kind.default_device_type = device_type.code();
        self
    }

    /// Use a raw device type code not covered by [`DeviceType`].
    pub fn device_type_code(mut self, code: i32) -> Self {
        self.kind.default_device_type = code;
        self
    }

    pub fn default_keys(mut self, keys: &[&str]) -> Self {
        self.kind.default_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Declare an attribute without a default.
    pub fn attr(mut self, name: &str, ty: ValueType) -> Self {
        self.kind.schema.insert(name.to_string(), ty);
        self
    }

    /// Declare an attribute with a default value.
    pub fn attr_with_default(mut self, name: &str, ty: ValueType, default: impl Into<Value>) -> Self {
        self.kind.schema.insert(name.to_string(), ty);
        self.kind.defaults.insert(name.to_string(), default.into());
        self
    }

    pub fn preprocessor<F>(mut self, hook: F) -> Self
    where
        F: Fn(ConfigMap) -> Result<ConfigMap> + Send + Sync + 'static,
    {
        self.kind.preprocessor = Some(Arc::new(hook));
        self
    }

    pub fn target_parser<F>(mut self, hook: F) -> Self
    where
        F: Fn(ConfigMap) -> Result<ConfigMap> + Send + Sync + 'static,
    {
        self.kind.target_parser = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> TargetKind {
        self.kind
    }

    /// Build and register, replacing any kind of the same name.
    pub fn register(self) -> Arc<TargetKind> {
        register_kind(self.build())
    }
}

type KindTable = RwLock<HashMap<String, Arc<TargetKind>>>;

fn registry() -> &'static KindTable {
    static KINDS: OnceLock<KindTable> = OnceLock::new();
    KINDS.get_or_init(|| {
        let table = builtin_kinds()
            .into_iter()
            .map(|k| (k.name.clone(), Arc::new(k)))
            .collect();
        RwLock::new(table)
    })
}

/// Register `kind`, replacing any kind of the same name.
pub fn register_kind(kind: TargetKind) -> Arc<TargetKind> {
    let kind = Arc::new(kind);
    registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(kind.name.clone(), Arc::clone(&kind));
    kind
}

/// Names of all registered kinds, sorted.
pub fn list_kinds() -> Vec<String> {
    let mut names: Vec<String> = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}

fn str_array() -> ValueType {
    ValueType::array(ValueType::Str)
}

fn builtin_kinds() -> Vec<TargetKind> {
    vec![
        TargetKind::builder("llvm")
            .device_type(DeviceType::Cpu)
            .default_keys(&["cpu"])
            .attr("mattr", str_array())
            .attr("mcpu", ValueType::Str)
            .attr("mtriple", ValueType::Str)
            .attr("mfloat-abi", ValueType::Str)
            .attr("mabi", ValueType::Str)
            .attr("num-cores", ValueType::Int)
            .attr("opt-level", ValueType::Int)
            .attr("vector-width", ValueType::Int)
            .attr("cl-opt", str_array())
            .attr("fast-math", ValueType::Bool)
            .attr("system-lib", ValueType::Bool)
            .attr("runtime", ValueType::Str)
            .attr("interface-api", ValueType::Str)
            .attr_with_default("link-params", ValueType::Bool, false)
            .target_parser(llvm_target_parser)
            .build(),
        TargetKind::builder("c")
            .device_type(DeviceType::Cpu)
            .default_keys(&["cpu"])
            .attr("mcpu", ValueType::Str)
            .attr("march", ValueType::Str)
            .attr("workspace-byte-alignment", ValueType::Int)
            .attr("constants-byte-alignment", ValueType::Int)
            .build(),
        TargetKind::builder("cuda")
            .device_type(DeviceType::Cuda)
            .default_keys(&["cuda", "gpu"])
            .attr("mcpu", ValueType::Str)
            .attr("arch", ValueType::Str)
            .attr("max_shared_memory_per_block", ValueType::Int)
            .attr("registers_per_block", ValueType::Int)
            .attr("l2_cache_size_bytes", ValueType::Int)
            .attr_with_default("max_threads_per_block", ValueType::Int, 1024)
            .attr_with_default("max_num_threads", ValueType::Int, 1024)
            .attr_with_default("thread_warp_size", ValueType::Int, 32)
            .preprocessor(cuda_preprocessor)
            .build(),
        TargetKind::builder("rocm")
            .device_type(DeviceType::Rocm)
            .default_keys(&["rocm", "gpu"])
            .attr("mcpu", ValueType::Str)
            .attr("mtriple", ValueType::Str)
            .attr("mattr", str_array())
            .attr_with_default("max_num_threads", ValueType::Int, 256)
            .attr_with_default("max_threads_per_block", ValueType::Int, 256)
            .attr_with_default("max_shared_memory_per_block", ValueType::Int, 65536)
            .attr_with_default("thread_warp_size", ValueType::Int, 64)
            .build(),
        TargetKind::builder("opencl")
            .device_type(DeviceType::OpenCL)
            .default_keys(&["opencl", "gpu"])
            .attr_with_default("max_threads_per_block", ValueType::Int, 256)
            .attr_with_default("max_num_threads", ValueType::Int, 256)
            .attr_with_default("thread_warp_size", ValueType::Int, 1)
            .attr_with_default("texture_spatial_limit", ValueType::Int, 16384)
            .build(),
        TargetKind::builder("vulkan")
            .device_type(DeviceType::Vulkan)
            .default_keys(&["vulkan", "gpu"])
            .attr("device_name", ValueType::Str)
            .attr("driver_version", ValueType::Int)
            .attr("vulkan_api_version", ValueType::Int)
            .attr_with_default("supports_float16", ValueType::Bool, false)
            .attr_with_default("supports_int8", ValueType::Bool, false)
            .attr_with_default("supports_int64", ValueType::Bool, false)
            .attr_with_default("max_num_threads", ValueType::Int, 256)
            .attr_with_default("max_shared_memory_per_block", ValueType::Int, 32768)
            .attr_with_default("thread_warp_size", ValueType::Int, 1)
            .build(),
        TargetKind::builder("metal")
            .device_type(DeviceType::Metal)
            .default_keys(&["metal", "gpu"])
            .attr_with_default("max_num_threads", ValueType::Int, 256)
            .attr_with_default("max_threads_per_block", ValueType::Int, 256)
            .attr_with_default("max_shared_memory_per_block", ValueType::Int, 32768)
            .attr_with_default("thread_warp_size", ValueType::Int, 16)
            .attr_with_default("max_function_args", ValueType::Int, 31)
            .build(),
        TargetKind::builder("hexagon")
            .device_type(DeviceType::Hexagon)
            .default_keys(&["hexagon"])
            .attr("mattr", str_array())
            .attr("mcpu", ValueType::Str)
            .attr("mtriple", ValueType::Str)
            .attr("llvm-options", str_array())
            .attr("num-cores", ValueType::Int)
            .attr_with_default("vtcm-capacity", ValueType::Int, 0)
            .build(),
        TargetKind::builder("ext_dev")
            .device_type(DeviceType::ExtDev)
            .default_keys(&["ext_dev"])
            .build(),
        TargetKind::builder("composite")
            .device_type(DeviceType::Cpu)
            .default_keys(&["composite"])
            .attr("devices", ValueType::array(ValueType::Target))
            .build(),
    ]
}

/// Derive CPU feature flags from `mtriple` and `mattr`.
fn llvm_target_parser(mut config: ConfigMap) -> Result<ConfigMap> {
    let triple = config.get("mtriple").and_then(Value::as_str).unwrap_or("");
    let arch = triple.split('-').next().unwrap_or("").to_string();
    let mattr: Vec<&str> = config
        .get("mattr")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let is_aarch64 = arch.starts_with("aarch64") || arch.starts_with("arm64");
    let mut features: Vec<(&str, Value)> = Vec::new();
    if !arch.is_empty() {
        features.push(("arch", Value::Str(arch.clone())));
    }
    features.push(("is_aarch64", Value::Bool(is_aarch64)));
    features.push(("has_neon", Value::Bool(is_aarch64 || mattr.contains(&"+neon"))));
    features.push(("has_avx2", Value::Bool(mattr.contains(&"+avx2"))));
    features.push(("has_avx512", Value::Bool(mattr.contains(&"+avx512f"))));

    config.insert("features".into(), Value::map(features));
    Ok(config)
}

/// `arch` falls back to `mcpu` (e.g. `sm_80`).
fn cuda_preprocessor(mut attrs: ConfigMap) -> Result<ConfigMap> {
    if !attrs.contains_key("arch") {
        if let Some(mcpu) = attrs.get("mcpu").cloned() {
            attrs.insert("arch".into(), mcpu);
        }
    }
    Ok(attrs)
}
