//! Named, pre-built targets.
//!
//! A tag maps a short name such as `nvidia/nvidia-a100` to a fully built
//! target. Tag names are checked before any other interpretation of a
//! target string.

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use tracing::warn;

use crate::error::Result;
use crate::target::Target;
use crate::value::{ConfigMap, Value};

/// Lookup into the tag registry.
pub struct TargetTag;

impl TargetTag {
    /// The target registered under `name`.
    pub fn get(name: &str) -> Option<Target> {
        registry()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

type TagTable = RwLock<HashMap<String, Target>>;

fn registry() -> &'static TagTable {
    static TAGS: OnceLock<TagTable> = OnceLock::new();
    TAGS.get_or_init(|| RwLock::new(builtin_tags()))
}

fn build_tag(name: &str, mut config: ConfigMap) -> Result<Target> {
    config
        .entry("tag".into())
        .or_insert_with(|| Value::from(name));
    Target::from_config(config)
}

/// Build the target for `config` and register it under `name`.
///
/// The target's `tag` is `name` unless `config` sets one. Registering an
/// existing name replaces it.
pub fn register_tag(name: &str, config: ConfigMap) -> Result<Target> {
    let target = build_tag(name, config)?;
    registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name.to_string(), target.clone());
    Ok(target)
}

/// Names of all registered tags, sorted.
pub fn list_tags() -> Vec<String> {
    let mut names: Vec<String> = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}

fn config<const N: usize>(entries: [(&str, Value); N]) -> ConfigMap {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn builtin_tags() -> HashMap<String, Target> {
    let raspberry_pi = || {
        Value::map([
            ("kind", Value::from("llvm")),
            ("mtriple", Value::from("aarch64-linux-gnu")),
            ("mcpu", Value::from("cortex-a72")),
            ("mattr", Value::from(vec!["+neon"])),
            ("num-cores", Value::from(4)),
        ])
    };
    let definitions = [
        (
            "nvidia/nvidia-a100",
            config([
                ("kind", Value::from("cuda")),
                ("arch", Value::from("sm_80")),
                ("max_shared_memory_per_block", Value::from(49152)),
                ("max_threads_per_block", Value::from(1024)),
                ("thread_warp_size", Value::from(32)),
                ("registers_per_block", Value::from(65536)),
                ("l2_cache_size_bytes", Value::from(41_943_040)),
            ]),
        ),
        (
            "nvidia/geforce-rtx-3080",
            config([
                ("kind", Value::from("cuda")),
                ("arch", Value::from("sm_86")),
                ("max_shared_memory_per_block", Value::from(49152)),
                ("max_threads_per_block", Value::from(1024)),
                ("thread_warp_size", Value::from(32)),
                ("registers_per_block", Value::from(65536)),
            ]),
        ),
        (
            "nvidia/jetson-agx-xavier",
            config([
                ("kind", Value::from("cuda")),
                ("arch", Value::from("sm_72")),
                ("max_shared_memory_per_block", Value::from(49152)),
                ("max_threads_per_block", Value::from(1024)),
                ("thread_warp_size", Value::from(32)),
                ("registers_per_block", Value::from(65536)),
                (
                    "host",
                    Value::map([
                        ("kind", Value::from("llvm")),
                        ("mtriple", Value::from("aarch64-linux-gnu")),
                        ("mcpu", Value::from("carmel")),
                        ("num-cores", Value::from(8)),
                    ]),
                ),
            ]),
        ),
        (
            "raspberry-pi/4b-aarch64",
            config([
                ("kind", Value::from("llvm")),
                ("mtriple", Value::from("aarch64-linux-gnu")),
                ("mcpu", Value::from("cortex-a72")),
                ("mattr", Value::from(vec!["+neon"])),
                ("num-cores", Value::from(4)),
            ]),
        ),
        (
            "raspberry-pi/4b-vulkan",
            config([
                ("kind", Value::from("vulkan")),
                ("max_num_threads", Value::from(256)),
                ("max_shared_memory_per_block", Value::from(16384)),
                ("thread_warp_size", Value::from(16)),
                ("supports_float16", Value::from(true)),
                ("host", raspberry_pi()),
            ]),
        ),
    ];

    let mut table = HashMap::new();
    for (name, config) in definitions {
        match build_tag(name, config) {
            Ok(target) => {
                table.insert(name.to_string(), target);
            }
            Err(e) => warn!(tag = name, error = %e, "skipping built-in tag"),
        }
    }
    table
}
