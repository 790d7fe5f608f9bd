//! Status command: show what every version source currently reports.

use camino::Utf8Path;
use clap::Args;
use serde::Serialize;
use tracing::instrument;

use shipgate_core::aggregate::SourceEntry;
use shipgate_core::config::Config;
use shipgate_core::context::Identifiers;

use super::{Output, report};

/// Arguments for the `status` subcommand.
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// List the tags each source ignored
    #[arg(long)]
    pub show_ignored: bool,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    #[serde(flatten)]
    identifiers: &'a Identifiers,
    sources: Vec<SourceEntry<'a>>,
}

/// Show the latest version of every source.
///
/// # Errors
///
/// Fails when the context cannot be built or any source fails.
#[instrument(name = "cmd_status", skip_all)]
pub fn cmd_status(
    args: StatusArgs,
    output: Output,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let context = super::build_context(config, cwd)?;
    let sources = super::resolve_sources(&context, output);

    if output.json {
        let out = StatusReport {
            identifiers: context.identifiers(),
            sources: sources.json_entries(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        report::print_identifiers(context.identifiers());
        report::print_sources(&sources);

        if args.show_ignored {
            for (kind, result) in sources.entries() {
                let Ok(resolved) = result else { continue };
                if resolved.skipped.is_empty() {
                    continue;
                }
                println!("{} ignored by {}:", resolved.skipped.len(), kind.label());
                for name in &resolved.skipped {
                    println!("  {name}");
                }
            }
        }
    }

    let failures = sources.failures();
    if failures.is_empty() {
        return Ok(());
    }
    if !output.json {
        report::print_failures(&failures);
    }
    anyhow::bail!("{} version source(s) failed", failures.len())
}
