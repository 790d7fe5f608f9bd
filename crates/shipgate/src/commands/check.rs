//! Check command: decide whether the manifest version can be released.

use camino::Utf8Path;
use clap::Args;
use serde::Serialize;
use tracing::{info, instrument};

use shipgate_core::aggregate::SourceFailure;
use shipgate_core::config::Config;
use shipgate_core::context::{Identifiers, ReleaseContext};
use shipgate_core::decision::{self, Decision, ReleaseState};
use shipgate_core::http::Transport;
use shipgate_core::process::CommandRunner;

use super::{Output, report};

/// Arguments for the `check` subcommand.
#[derive(Args, Debug, Default)]
pub struct CheckArgs {}

#[derive(Serialize)]
struct CheckReport<'a> {
    #[serde(flatten)]
    identifiers: &'a Identifiers,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a ReleaseState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<&'a Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failures: Option<&'a [SourceFailure]>,
}

/// Resolve every source and decide. Prints the outcome.
///
/// Returns the state and decision, or an error when any source failed.
/// `publish` builds on this.
pub(crate) fn evaluate<R, T>(
    context: &ReleaseContext<R, T>,
    output: Output,
) -> anyhow::Result<(ReleaseState, Decision)>
where
    R: CommandRunner + Clone,
    T: Transport + Clone,
{
    let sources = super::resolve_sources(context, output);
    if !output.json {
        report::print_identifiers(context.identifiers());
        report::print_sources(&sources);
    }

    match sources.into_state() {
        Err(failures) => {
            if output.json {
                let out = CheckReport {
                    identifiers: context.identifiers(),
                    state: None,
                    decision: None,
                    failures: Some(&failures),
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                report::print_failures(&failures);
            }
            anyhow::bail!("{} version source(s) failed", failures.len())
        }
        Ok(state) => {
            let decision = decision::decide(&state);
            info!(proceed = decision.plan().is_some(), "release decided");
            if !output.json {
                report::print_decision(&decision);
            }
            Ok((state, decision))
        }
    }
}

/// Decide whether to release. A blocked release is not an error.
///
/// # Errors
///
/// Fails when the context cannot be built or any source fails.
#[instrument(name = "cmd_check", skip_all)]
pub fn cmd_check(
    _args: CheckArgs,
    output: Output,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let context = super::build_context(config, cwd)?;
    run_check(&context, output)
}

pub(crate) fn run_check<R, T>(context: &ReleaseContext<R, T>, output: Output) -> anyhow::Result<()>
where
    R: CommandRunner + Clone,
    T: Transport + Clone,
{
    let (state, decision) = evaluate(context, output)?;

    if output.json {
        let out = CheckReport {
            identifiers: context.identifiers(),
            state: Some(&state),
            decision: Some(&decision),
            failures: None,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    Ok(())
}
