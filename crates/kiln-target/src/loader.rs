//! Loading and writing target definitions as JSON and TOML.
//!
//! Target definitions on disk are `.target.toml` files holding a config
//! map, stored in the `targets/` directory of a project. A target is
//! written out as its export map, which loads back into an equal target.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, TargetError};
use crate::target::Target;
use crate::value::ConfigMap;

/// Decode a brace-delimited JSON config literal.
pub fn load_config_dict(s: &str) -> Result<ConfigMap> {
    serde_json::from_str(s).map_err(|e| {
        TargetError::value_error(format!("Cannot load config dict with JSON loader: {e}"))
    })
}

/// Load a target from a `.target.toml` file.
pub fn load_target_toml(path: &Path) -> Result<Target> {
    if !path.exists() {
        return Err(TargetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_target_toml(&content)
}

/// Parse a target from a TOML config document.
pub fn parse_target_toml(toml_str: &str) -> Result<Target> {
    let config: ConfigMap = toml::from_str(toml_str)?;
    Target::from_config(config)
}

/// Serialize a target's export map to pretty TOML.
pub fn target_to_toml(target: &Target) -> Result<String> {
    let toml_str = toml::to_string_pretty(target)?;
    Ok(toml_str)
}

/// Serialize a target's export map to pretty JSON.
pub fn target_to_json(target: &Target) -> Result<String> {
    let json = serde_json::to_string_pretty(target)?;
    Ok(json)
}

/// File suffix of on-disk target definitions.
pub const TARGET_FILE_SUFFIX: &str = ".target.toml";

/// Find the target definitions of a project, keyed by target name.
///
/// A definition is a regular file `<project>/targets/<name>.target.toml`;
/// `<name>` is what `kiln target list` shows. A project without a
/// `targets/` directory has none.
pub fn discover_targets(project_dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let targets_dir = project_dir.join("targets");
    if !targets_dir.is_dir() {
        return Ok(BTreeMap::new());
    }

    let mut found = BTreeMap::new();
    for entry in std::fs::read_dir(&targets_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(TARGET_FILE_SUFFIX)) else {
            continue;
        };
        if !name.is_empty() {
            found.insert(name.to_string(), entry.path());
        }
    }
    Ok(found)
}
