//! Compilation target descriptions for the Kiln compiler.
//!
//! A [`Target`] names a backend kind (`llvm`, `cuda`, ...) together with
//! capability keys, typed attributes and an optional host target. Targets
//! are built from:
//!
//! - raw flag strings: `llvm -mcpu=cortex-a72 -mattr=+neon,+v8 -num-cores=4`
//! - config maps, given directly, as JSON literals or as `.target.toml` files
//! - registered tag names such as `nvidia/nvidia-a100`
//!
//! Every target has a canonical flag string ([`Target::str`]) that parses
//! back to an equal target, and an export map ([`Target::export`]) that
//! rebuilds it including tag and host.
//!
//! Attribute schemas, defaults and parsing hooks come from the
//! [`TargetKind`] registry. The per-thread stack in [`context`] tracks the
//! target currently being compiled for.

pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod flags;
pub mod hash;
pub mod kind;
pub mod loader;
pub mod parse;
pub mod quote;
pub mod schema;
pub mod stringify;
pub mod tag;
pub mod target;
pub mod value;

pub use config::{TargetSource, MAX_HOST_DEPTH};
pub use context::{with_target, TargetScope};
pub use device::{register_device_api, DeviceApi, DeviceType};
pub use error::{ErrorKind, Result, TargetError};
pub use kind::{list_kinds, register_kind, TargetKind, TargetKindBuilder};
pub use loader::{
    discover_targets, load_target_toml, parse_target_toml, target_to_json, target_to_toml,
};
pub use schema::ValueType;
pub use tag::{list_tags, register_tag, TargetTag};
pub use target::{check_and_update_host_consistency, Target};
pub use value::{ConfigMap, FromValue, Value};
