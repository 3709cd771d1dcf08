//! Kiln CLI: inspect, canonicalize and export compilation targets.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::target::ExportFormat;

#[derive(Parser)]
#[command(name = "kiln", version, about = "Kiln compilation target tools")]
struct Cli {
    /// Log target parser hooks and device queries
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work with compilation targets
    Target {
        #[command(subcommand)]
        action: TargetAction,
    },
}

#[derive(Subcommand)]
enum TargetAction {
    /// Print the canonical string of a target
    Parse {
        /// Tag name, raw target string (e.g. "llvm -mcpu=cortex-a72") or JSON config
        target: String,
    },
    /// Show kind, keys, attributes, features and host of a target
    Describe {
        /// Tag name, raw target string or JSON config
        target: String,
    },
    /// Print the export map of a target
    Export {
        /// Tag name, raw target string or JSON config
        target: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },
    /// Build a target from a .target.toml file
    Load {
        /// Path to the .target.toml file
        file: PathBuf,
    },
    /// List .target.toml files in a project's targets/ directory
    List {
        /// Project directory (default: current directory)
        dir: Option<PathBuf>,
    },
    /// List registered target kinds
    Kinds,
    /// List registered target tags
    Tags,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug over warn.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Target { action } => match action {
            TargetAction::Parse { target } => commands::target::parse(&target),
            TargetAction::Describe { target } => commands::target::describe(&target),
            TargetAction::Export { target, format } => commands::target::export(&target, format),
            TargetAction::Load { file } => commands::target::load(&file),
            TargetAction::List { dir } => {
                let dir = match dir {
                    Some(dir) => dir,
                    None => std::env::current_dir()?,
                };
                commands::target::list(&dir)
            }
            TargetAction::Kinds => commands::target::kinds(),
            TargetAction::Tags => commands::target::tags(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_export_format() {
        let cli = Cli::try_parse_from(["kiln", "target", "export", "llvm", "--format", "toml"]).unwrap();
        match cli.command {
            Commands::Target {
                action: TargetAction::Export { target, format },
            } => {
                assert_eq!(target, "llvm");
                assert_eq!(format, ExportFormat::Toml);
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn target_with_flags_is_one_argument() {
        let cli = Cli::try_parse_from(["kiln", "-v", "target", "parse", "llvm -mcpu=x"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Target {
                action: TargetAction::Parse { .. }
            }
        ));
    }
}
