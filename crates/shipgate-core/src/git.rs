//! Git operations.
//!
//! Shells out to `git` through a [`CommandRunner`]. This inherits the user's
//! SSH keys, credential helpers, and hooks for the push steps.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::process::CommandRunner;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "tag").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// List every local tag name, one per entry, in `git tag` order.
#[instrument(skip(runner))]
pub fn list_tags(runner: &impl CommandRunner) -> GitResult<Vec<String>> {
    let output = git(runner, &["tag"])?;
    let tags: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    debug!(count = tags.len(), "local tags");
    Ok(tags)
}

/// Get the URL of a named remote, `None` if it does not exist.
#[instrument(skip(runner))]
pub fn remote_url(runner: &impl CommandRunner, remote: &str) -> GitResult<Option<String>> {
    match git(runner, &["remote", "get-url", remote]) {
        Ok(url) => {
            let url = url.trim().to_string();
            debug!(%remote, %url, "remote URL");
            Ok(Some(url))
        }
        Err(GitError::Command { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if we're inside a git repository.
#[instrument(skip(runner))]
pub fn is_inside_repo(runner: &impl CommandRunner) -> GitResult<bool> {
    match git(runner, &["rev-parse", "--is-inside-work-tree"]) {
        Ok(output) => Ok(output.trim() == "true"),
        Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Parse owner and repo from a git remote URL.
///
/// Handles both HTTPS and SSH formats:
/// - `https://github.com/owner/repo.git`
/// - `git@github.com:owner/repo.git`
///
/// Returns `None` if the URL cannot be parsed.
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let path = url.strip_prefix("git@").map_or_else(
        || {
            url.split("//")
                .nth(1)
                .and_then(|after_scheme| after_scheme.split_once('/').map(|(_, path)| path))
        },
        |rest| rest.split_once(':').map(|(_, path)| path),
    )?;

    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }

    Some((owner.to_string(), repo.to_string()))
}

/// Run a git command and return its stdout.
fn git(runner: &impl CommandRunner, args: &[&str]) -> GitResult<String> {
    let output = runner.run("git", args)?;

    if output.success() {
        return Ok(output.stdout);
    }

    if output.stderr.contains("not a git repository") {
        return Err(GitError::NotARepo);
    }

    Err(GitError::Command {
        command: args.first().unwrap_or(&"").to_string(),
        stderr: output.stderr,
    })
}
