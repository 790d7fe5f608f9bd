//! Library interface for the `shipgate` CLI.
//!
//! Exposes the argument parser and command implementations so they can be
//! tested without spawning the binary. The entry point is in `main.rs`.
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`Commands`] - Available subcommands
//! - [`commands`] - Command implementations

pub mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Set the global color override. Call once at startup.
    pub fn apply(self) {
        match self {
            Self::Auto => {}
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG                 Log filter (e.g., debug, shipgate_core=trace)
    SHIPGATE_LOG_PATH        Explicit log file path
    SHIPGATE_LOG_DIR         Log directory
    SHIPGATE_<SECTION>__<KEY>
                             Override a config value
                             (e.g., SHIPGATE_CONTAINER__ENGINE=podman)
";

/// Command-line interface definition for shipgate.
#[derive(Parser)]
#[command(name = "shipgate")]
#[command(
    about = "Checks that a release is ahead everywhere it ships, then publishes it",
    long_about = None
)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Show the latest version known to every source
    Status(commands::status::StatusArgs),

    /// Decide whether the current version can be released
    Check(commands::check::CheckArgs),

    /// Check, then publish to the registry, git remote and container registry
    Publish(commands::publish::PublishArgs),

    /// Diagnose configuration and environment
    Doctor(commands::doctor::DoctorArgs),
}

/// The clap command, for help rendering in tests.
pub fn command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn publish_flags_parse() {
        let cli = Cli::try_parse_from(["shipgate", "publish", "--dry-run", "-y", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Publish(args) => {
                assert!(args.dry_run);
                assert!(args.yes);
            }
            _ => panic!("expected publish"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["shipgate", "status", "-vv", "-C", "/tmp"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.chdir.as_deref(), Some(std::path::Path::new("/tmp")));
    }
}
