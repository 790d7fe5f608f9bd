//! Terminal rendering shared by the release commands.

use owo_colors::OwoColorize;
use shipgate_core::aggregate::{SourceFailure, SourceReport};
use shipgate_core::context::Identifiers;
use shipgate_core::decision::{Decision, Transition, TransitionPlan};
use shipgate_core::error::SourceError;

/// What the user can do about a source error.
pub fn explain(error: &SourceError) -> &'static str {
    match error {
        SourceError::FileNotFound { .. } => {
            "Run shipgate from the repository root. The file may not exist on this \
             branch, or it cannot be read."
        }
        SourceError::FieldMissing { .. } => {
            "The file or response was read, but the expected field is missing."
        }
        SourceError::InvalidVersionFormat { .. } => {
            "Versions must look like 1.2.3, optionally with a prefix such as v."
        }
        SourceError::HttpError {
            status: Some(403 | 429),
            ..
        } => "The API refused the request, probably a rate limit. Set remote.token_file.",
        SourceError::HttpError { status: Some(404), .. } => {
            "Nothing at that URL. Check the repository, package and image names."
        }
        SourceError::HttpError { .. } => {
            "Probably a non-200 status code or no network access."
        }
        SourceError::CommandFailed { args, .. } if args.iter().eq(["images"]) => {
            "The container engine isn't running (probably)."
        }
        SourceError::CommandFailed { .. } => {
            "The command returned a non-zero status. Check that the program exists \
             and is on PATH."
        }
        SourceError::EmptyVersionSet => {
            "Nothing has been published here yet. Release a first version by hand."
        }
    }
}

/// Print package, repository and image names.
pub fn print_identifiers(ids: &Identifiers) {
    println!(
        "{} {}  {} {}  {} {}",
        "package".dimmed(),
        ids.package.cyan(),
        "repository".dimmed(),
        ids.repository.cyan(),
        "image".dimmed(),
        ids.image.cyan(),
    );
    println!();
}

/// Print one line per source, version or error.
pub fn print_sources(report: &SourceReport) {
    println!("{}", "Sources".bold().underline());
    for (kind, result) in report.entries() {
        match result {
            Ok(resolved) => {
                let skipped = if resolved.skipped.is_empty() {
                    String::new()
                } else {
                    format!(" ({} ignored)", resolved.skipped.len())
                };
                println!(
                    "  {} {:<20} {}{}",
                    "✓".green(),
                    kind.label(),
                    resolved.version.to_string().bold(),
                    skipped.dimmed(),
                );
            }
            Err(e) => {
                println!("  {} {:<20} {}", "✗".red(), kind.label(), e.to_string().red());
            }
        }
    }
    println!();
}

/// Print every failure with an explanation.
pub fn print_failures(failures: &[SourceFailure]) {
    println!(
        "{}",
        format!("{} source(s) failed", failures.len()).red().bold()
    );
    for failure in failures {
        println!("  {} {}: {}", "✗".red(), failure.kind.label().bold(), failure.error);
        println!("    {}", explain(&failure.error).dimmed());
    }
}

fn print_transition(label: &str, t: &Transition) {
    println!(
        "  {:<12} {} {} {}",
        label,
        t.old.to_string().dimmed(),
        "→".dimmed(),
        t.new.to_string().green().bold(),
    );
}

/// Print the transition plan.
pub fn print_plan(plan: &TransitionPlan) {
    print_transition("git", &plan.vcs);
    print_transition("registry", &plan.registry);
    print_transition("container", &plan.container);
}

/// Print the decision: the plan, or why the release is blocked.
pub fn print_decision(decision: &Decision) {
    match decision {
        Decision::Proceed(plan) => {
            println!("{} {}", "✓".green().bold(), "Ready to release".green().bold());
            print_plan(plan);
        }
        Decision::Blocked {
            reason,
            offending: (left, right),
        } => {
            println!("{} {}", "✗".yellow().bold(), "Release blocked".yellow().bold());
            println!("  {} ({} vs {})", reason, left.to_string().bold(), right.to_string().bold());
        }
    }
}
