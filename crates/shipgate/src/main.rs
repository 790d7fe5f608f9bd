//! shipgate CLI
#![deny(unsafe_code)]

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use shipgate::{Cli, Commands, commands};
use shipgate_core::config::ConfigLoader;
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = Utf8PathBuf::try_from(cwd)
        .map_err(|e| anyhow::anyhow!("current directory is not valid UTF-8: {}", e.into_path_buf().display()))?;

    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref path) = cli.config {
        let path = Utf8PathBuf::try_from(path.clone())
            .map_err(|e| anyhow::anyhow!("config path is not valid UTF-8: {}", e.into_path_buf().display()))?;
        loader = loader.with_file(path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let log_settings = observability::LogSettings::new(config.log_dir.clone());
    let filter = observability::filter_for(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init(&log_settings, filter).context("failed to initialize logging")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        "CLI initialized"
    );

    let output = commands::Output {
        json: cli.json,
        quiet: cli.quiet,
    };
    let result = match cli.command {
        Commands::Status(args) => commands::status::cmd_status(args, output, &config, &cwd),
        Commands::Check(args) => commands::check::cmd_check(args, output, &config, &cwd),
        Commands::Publish(args) => commands::publish::cmd_publish(args, output, &config, &cwd),
        Commands::Doctor(args) => commands::doctor::cmd_doctor(args, cli.json, &config, &cwd),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}
