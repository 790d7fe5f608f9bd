//! Publish command: thin CLI layer over `shipgate_core::publish`.

use std::time::Duration;

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use shipgate_core::config::Config;
use shipgate_core::context::{Identifiers, ReleaseContext};
use shipgate_core::decision::{Decision, TransitionPlan};
use shipgate_core::http::Transport;
use shipgate_core::process::CommandRunner;
use shipgate_core::publish::{PublishDriver, PublishEvent, PublishOutcome, StepStatus};

use super::{Output, check, report};

/// Arguments for the `publish` subcommand.
#[derive(Args, Debug, Default)]
pub struct PublishArgs {
    /// Show the commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Serialize)]
struct PublishReport<'a> {
    #[serde(flatten)]
    identifiers: &'a Identifiers,
    decision: &'a Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a PublishOutcome>,
}

/// Check, then publish when the release can proceed.
///
/// # Errors
///
/// Fails when a source fails or a publish step fails. A blocked
/// release or a declined prompt is not an error.
#[instrument(name = "cmd_publish", skip_all)]
pub fn cmd_publish(
    args: PublishArgs,
    output: Output,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json = output.json, dry_run = args.dry_run, "executing publish command");

    let context = super::build_context(config, cwd)?;
    let ask = config.publish.confirm && !args.yes && !args.dry_run && !output.json;
    run_publish(&context, &args, output, ask).map(|_| ())
}

/// Returns the outcome, or `None` when nothing was published.
pub(crate) fn run_publish<R, T>(
    context: &ReleaseContext<R, T>,
    args: &PublishArgs,
    output: Output,
    ask: bool,
) -> anyhow::Result<Option<PublishOutcome>>
where
    R: CommandRunner + Clone,
    T: Transport + Clone,
{
    let json = output.json;
    let (_, decision) = check::evaluate(context, output)?;

    let Some(plan) = decision.plan() else {
        if json {
            let out = PublishReport {
                identifiers: context.identifiers(),
                decision: &decision,
                outcome: None,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            println!("\n{}", "Nothing published.".yellow());
        }
        return Ok(None);
    };

    if args.dry_run && !json {
        println!("\n{}", "DRY RUN: no commands will be executed".yellow().bold());
    }

    if ask && !confirm(plan)? {
        println!("{}", "Publish cancelled.".yellow());
        return Ok(None);
    }

    if !json {
        println!();
    }
    let driver = PublishDriver::new(context.runner(), context.publish_settings().clone());
    let progress = output.progress();
    let mut spinner: Option<ProgressBar> = None;
    let outcome = driver
        .execute(plan, args.dry_run, |event| {
            if !json {
                handle_event(event, progress, &mut spinner);
            }
        })
        .inspect_err(|_| {
            if let Some(bar) = spinner.take() {
                bar.abandon();
            }
        })
        .context("publish failed")?;

    if json {
        let out = PublishReport {
            identifiers: context.identifiers(),
            decision: &decision,
            outcome: Some(&outcome),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if outcome.dry_run {
        println!(
            "\n{} Dry run complete, {} steps previewed",
            "✓".green(),
            outcome.steps.len()
        );
    } else {
        println!(
            "\n{} Published {}",
            "✓".green().bold(),
            plan.registry.new.to_string().green().bold()
        );
    }
    Ok(Some(outcome))
}

fn confirm(plan: &TransitionPlan) -> anyhow::Result<bool> {
    println!();
    report::print_plan(plan);
    println!();
    Confirm::new("Publish this release?")
        .with_default(true)
        .prompt()
        .context("confirmation prompt failed")
}

fn handle_event(event: PublishEvent, progress: bool, spinner: &mut Option<ProgressBar>) {
    match event {
        PublishEvent::StepStarted(_) if !progress => {}
        PublishEvent::StepStarted(step) => {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
                bar.set_style(style.tick_strings(super::SPINNER_TICKS));
            }
            bar.set_message(format!("{}...", step.name));
            bar.enable_steady_tick(Duration::from_millis(80));
            *spinner = Some(bar);
        }
        PublishEvent::StepFinished(step, status) => {
            if let Some(bar) = spinner.take() {
                bar.finish_and_clear();
            }
            let prefix = match status {
                StepStatus::Done => "✓",
                StepStatus::Skipped => "○",
            };
            println!(
                "  {} {:<14} {}",
                prefix.green(),
                step.name.bold(),
                step.command_line().dimmed(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures;

    const QUIET: Output = Output {
        json: false,
        quiet: true,
    };

    fn confirmed() -> PublishArgs {
        PublishArgs {
            dry_run: false,
            yes: true,
        }
    }

    #[test]
    fn blocked_release_runs_no_publish_step() {
        let (_dir, root, config) = fixtures::project();
        let runner = fixtures::runner();
        let api = fixtures::api_with_remote_tag("v1.2.0");
        let context = fixtures::context(&config, &root, &runner, &api);

        let outcome = run_publish(&context, &confirmed(), QUIET, false).unwrap();
        assert!(outcome.is_none());
        assert_eq!(runner.calls(), vec!["git tag", "docker images"]);
    }

    #[test]
    fn dry_run_reports_steps_without_running_them() {
        let (_dir, root, config) = fixtures::project();
        let runner = fixtures::runner();
        let api = fixtures::api_with_remote_tag("v1.1.0");
        let context = fixtures::context(&config, &root, &runner, &api);
        let args = PublishArgs {
            dry_run: true,
            yes: false,
        };

        let outcome = run_publish(&context, &args, QUIET, false).unwrap().unwrap();
        assert!(outcome.dry_run);
        assert_eq!(outcome.steps.len(), 8);
        assert!(outcome.steps.iter().all(|s| s.status == StepStatus::Skipped));
        assert_eq!(runner.calls(), vec!["git tag", "docker images"]);
    }

    #[test]
    fn proceeding_release_runs_every_step_in_order() {
        let (_dir, root, config) = fixtures::project();
        let runner = fixtures::runner();
        let api = fixtures::api_with_remote_tag("v1.1.0");
        let context = fixtures::context(&config, &root, &runner, &api);

        let outcome = run_publish(&context, &confirmed(), QUIET, false).unwrap().unwrap();
        assert!(!outcome.dry_run);
        assert_eq!(
            runner.calls(),
            vec![
                "git tag",
                "docker images",
                "cargo publish",
                "git push origin main",
                "git push origin --tags",
                "docker build -t shipgate:scripted .",
                "docker tag shipgate:scripted octo/kojamp:1.2.0",
                "docker push octo/kojamp:1.2.0",
                "docker tag shipgate:scripted octo/kojamp:latest",
                "docker push octo/kojamp:latest",
            ]
        );
    }

    #[test]
    fn failing_step_stops_publish() {
        let (_dir, root, config) = fixtures::project();
        let runner = fixtures::runner()
            .ok("")
            .fail(101, "crate already uploaded");
        let api = fixtures::api_with_remote_tag("v1.1.0");
        let context = fixtures::context(&config, &root, &runner, &api);

        let err = run_publish(&context, &confirmed(), QUIET, false).unwrap_err();
        assert!(format!("{err:#}").contains("publish package"));
        assert_eq!(runner.calls().len(), 3);
    }
}
