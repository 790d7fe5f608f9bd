//! Doctor command: diagnose configuration, credentials and tools.

use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use shipgate_core::config::{self, Config};
use shipgate_core::git;
use shipgate_core::process::{self, SystemRunner};

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport<'a> {
    config: ConfigStatus<'a>,
    directories: DirectoryPaths,
    tools: Vec<Tool>,
    environment: EnvironmentInfo,
}

#[derive(Serialize)]
struct ConfigStatus<'a> {
    /// Project config file, if one was discovered.
    file: Option<String>,
    found: bool,
    /// Token file, when configured.
    token_file: Option<TokenFile>,
    /// The merged configuration in effect.
    effective: &'a Config,
}

#[derive(Serialize)]
struct TokenFile {
    path: String,
    exists: bool,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    cache: Option<String>,
    data: Option<String>,
}

#[derive(Serialize)]
struct Tool {
    name: String,
    purpose: &'static str,
    path: Option<String>,
}

#[derive(Serialize)]
struct EnvironmentInfo {
    cwd: String,
    /// Whether `cwd` is inside a git work tree.
    git_repository: bool,
    env_vars: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    value: Option<String>,
    description: &'static str,
}

const WATCHED_VARS: &[(&str, &str)] = &[
    ("SHIPGATE_LOG_PATH", "Explicit log file path"),
    ("SHIPGATE_LOG_DIR", "Log directory override"),
    ("RUST_LOG", "Log filter directive"),
    ("XDG_CONFIG_HOME", "Override config directory"),
    ("XDG_CACHE_HOME", "Override cache directory"),
    ("XDG_DATA_HOME", "Override data directory"),
];

impl<'a> DoctorReport<'a> {
    fn gather(config: &'a Config, cwd: &Utf8Path) -> Self {
        let config_file = config::find_project_config(cwd);
        let token_file = config.remote.token_file.as_ref().map(|path| {
            let full = cwd.join(path);
            TokenFile {
                exists: full.is_file(),
                path: full.to_string(),
            }
        });

        let registry_program = config
            .registry
            .publish_command
            .split_whitespace()
            .next()
            .unwrap_or("cargo")
            .to_string();
        let tools = [
            ("git".to_string(), "local tags and pushes"),
            (registry_program, "registry publish"),
            (config.container.engine.clone(), "container images"),
        ]
        .into_iter()
        .map(|(name, purpose)| Tool {
            path: process::find_program(&name).map(|p| p.to_string()),
            name,
            purpose,
        })
        .collect();

        Self {
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
                token_file,
                effective: config,
            },
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                cache: config::user_cache_dir().map(|p| p.to_string()),
                data: config::user_data_dir().map(|p| p.to_string()),
            },
            tools,
            environment: EnvironmentInfo {
                cwd: cwd.to_string(),
                git_repository: git::is_inside_repo(&SystemRunner).unwrap_or(false),
                env_vars: WATCHED_VARS
                    .iter()
                    .map(|&(name, description)| EnvVar {
                        name,
                        value: std::env::var(name).ok(),
                        description,
                    })
                    .collect(),
            },
        }
    }
}

/// Run diagnostics and report configuration status.
///
/// Missing tools are reported, not treated as errors.
#[instrument(name = "cmd_doctor", skip_all)]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let report = DoctorReport::gather(config, cwd);

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Configuration".bold().underline());
    match report.config.file.as_deref() {
        Some(file) => println!("  {} Config file: {}", "✓".green(), file.cyan()),
        None => println!("  {} No config file found, using defaults", "○".yellow()),
    }
    match &report.config.token_file {
        Some(token) if token.exists => {
            println!("  {} Token file: {}", "✓".green(), token.path.cyan());
        }
        Some(token) => println!("  {} Token file missing: {}", "✗".red(), token.path.cyan()),
        None => println!("  {} No token file, API requests are anonymous", "○".yellow()),
    }
    println!();

    println!("{}", "Tools".bold().underline());
    for tool in &report.tools {
        match &tool.path {
            Some(path) => println!(
                "  {} {:<10} {} {}",
                "✓".green(),
                tool.name,
                path.cyan(),
                format!("({})", tool.purpose).dimmed()
            ),
            None => println!(
                "  {} {:<10} {} {}",
                "✗".red(),
                tool.name,
                "not found on PATH".red(),
                format!("({})", tool.purpose).dimmed()
            ),
        }
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Cache", report.directories.cache.as_deref());
    print_dir("  Data", report.directories.data.as_deref());
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), cwd.cyan());
    if !report.environment.git_repository {
        println!("  {} Not inside a git repository", "✗".red());
    }

    let set_vars: Vec<_> = report
        .environment
        .env_vars
        .iter()
        .filter(|v| v.value.is_some())
        .collect();
    if set_vars.is_empty() {
        println!("  {} No XDG/logging overrides set", "○".dimmed());
    } else {
        for var in set_vars {
            println!(
                "  {}: {}",
                var.name.dimmed(),
                var.value.as_deref().unwrap_or("").cyan()
            );
        }
    }

    Ok(())
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}
