//! `kiln target`: target parsing, description, export and registry listings.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use kiln_target::{
    discover_targets, list_kinds, list_tags, load_target_toml, stringify::stringify_value,
    target_to_json, target_to_toml, DeviceType, Target, TargetKind, TargetTag,
};
use tracing::debug;

/// Output format for `kiln target export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Toml,
}

fn resolve(spec: &str) -> Result<Target> {
    debug!(spec, "resolving target");
    Target::parse(spec).with_context(|| format!("invalid target '{spec}'"))
}

fn device_name(code: i32) -> String {
    match DeviceType::from_code(code) {
        Some(device) => format!("{device} ({code})"),
        None => code.to_string(),
    }
}

/// Print the canonical string of a target.
pub fn parse(spec: &str) -> Result<()> {
    println!("{}", resolve(spec)?);
    Ok(())
}

/// Print a human-readable description of a target.
pub fn describe(spec: &str) -> Result<()> {
    let target = resolve(spec)?;
    print!("{}", describe_text(&target)?);
    Ok(())
}

fn describe_text(target: &Target) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "=== Target: {} ===", target.kind().name())?;
    writeln!(out, "Canonical:   {target}")?;
    if !target.tag().is_empty() {
        writeln!(out, "Tag:         {}", target.tag())?;
    }
    writeln!(out, "Device type: {}", device_name(target.device_type()))?;
    writeln!(out, "Keys:        {}", target.keys().join(", "))?;
    writeln!(out, "Fingerprint: {}", target.fingerprint()?)?;
    writeln!(out)?;

    writeln!(out, "--- Attributes ---")?;
    for (key, value) in target.attrs() {
        writeln!(out, "  {key:<28} {value}")?;
    }
    if !target.features().is_empty() {
        writeln!(out)?;
        writeln!(out, "--- Features ---")?;
        for (key, value) in target.features() {
            writeln!(out, "  {key:<28} {value}")?;
        }
    }
    if let Some(host) = target.host() {
        writeln!(out)?;
        writeln!(out, "--- Host ---")?;
        writeln!(out, "  {host}")?;
    }
    writeln!(out)?;
    writeln!(out, "Debug: {}", target.to_debug_string())?;
    Ok(out)
}

/// Print the export map of a target as JSON or TOML.
pub fn export(spec: &str, format: ExportFormat) -> Result<()> {
    let target = resolve(spec)?;
    println!("{}", export_text(&target, format)?);
    Ok(())
}

fn export_text(target: &Target, format: ExportFormat) -> Result<String> {
    let text = match format {
        ExportFormat::Json => target_to_json(target)?,
        ExportFormat::Toml => target_to_toml(target)?,
    };
    Ok(text)
}

/// Build a target from a `.target.toml` file and print its canonical string.
pub fn load(path: &Path) -> Result<()> {
    let target =
        load_target_toml(path).with_context(|| format!("failed to load {}", path.display()))?;
    println!("{target}");
    Ok(())
}

/// List the `.target.toml` files of a project.
pub fn list(project_dir: &Path) -> Result<()> {
    let found = discover_targets(project_dir)?;
    if found.is_empty() {
        println!("No target definitions in {}", project_dir.join("targets").display());
        return Ok(());
    }
    println!("Project targets:");
    println!();
    for (name, path) in found {
        match load_target_toml(&path) {
            Ok(target) => println!("  {name:<25} {target}"),
            Err(e) => println!("  {name:<25} (invalid: {e})"),
        }
    }
    Ok(())
}

/// List all registered target kinds.
pub fn kinds() -> Result<()> {
    print!("{}", kinds_text());
    Ok(())
}

fn kinds_text() -> String {
    let mut out = String::from("Registered kinds:\n\n");
    for name in list_kinds() {
        let Some(kind) = TargetKind::get(&name) else {
            continue;
        };
        let keys = stringify_value(&kind.default_keys().to_vec().into()).unwrap_or_default();
        out.push_str(&format!(
            "  {name:<12} {:<16} keys: {keys}\n",
            device_name(kind.default_device_type())
        ));
    }
    out
}

/// List all registered tags with their canonical strings.
pub fn tags() -> Result<()> {
    println!("Registered tags:");
    println!();
    for name in list_tags() {
        if let Some(target) = TargetTag::get(&name) {
            println!("  {name:<28} {target}");
        }
    }
    println!();
    println!("Use 'kiln target describe <tag>' for details.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_and_unknown() {
        assert!(parse("llvm -mcpu=cortex-a72").is_ok());
        assert!(parse("nvidia/nvidia-a100").is_ok());
        let err = parse("nonexistent -x=1").unwrap_err();
        assert!(format!("{err:#}").contains("invalid target 'nonexistent -x=1'"));
    }

    #[test]
    fn describe_shows_features_and_host() {
        let target = Target::parse("cuda -mcpu=sm_80 -host='llvm -mtriple=aarch64-linux-gnu'").unwrap();
        let text = describe_text(&target).unwrap();
        assert!(text.contains("Device type: cuda (2)"));
        assert!(text.contains("Keys:        cuda, gpu"));
        assert!(text.contains("--- Host ---"));
        assert!(text.contains("llvm -keys=cpu"));

        let host = target.host().unwrap();
        assert!(describe_text(host).unwrap().contains("--- Features ---"));
    }

    #[test]
    fn export_formats_reload() {
        let target = Target::parse("raspberry-pi/4b-aarch64").unwrap();
        let json = export_text(&target, ExportFormat::Json).unwrap();
        assert_eq!(Target::parse(&json).unwrap(), target);

        let toml = export_text(&target, ExportFormat::Toml).unwrap();
        assert_eq!(kiln_target::parse_target_toml(&toml).unwrap(), target);
    }

    #[test]
    fn kinds_listing() {
        let text = kinds_text();
        assert!(text.contains("llvm"));
        assert!(text.contains("keys: cuda,gpu"));
    }

    #[test]
    fn load_and_list_project_targets() {
        let dir = tempfile::tempdir().unwrap();
        let targets = dir.path().join("targets");
        std::fs::create_dir(&targets).unwrap();
        let file = targets.join("board.target.toml");
        std::fs::write(&file, "kind = \"c\"\nmcpu = \"cortex-m4\"\n").unwrap();

        assert!(load(&file).is_ok());
        assert!(load(&targets.join("missing.target.toml")).is_err());
        assert!(list(dir.path()).is_ok());
    }
}
