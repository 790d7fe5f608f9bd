//! Publishing a release that passed the checks.
//!
//! Steps run strictly in order: registry upload, then git pushes, then the
//! container image build and pushes. The first failing step aborts the rest.
//! Nothing is retried and nothing already done is rolled back.

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::decision::TransitionPlan;
use crate::error::{PublishError, PublishResult};
use crate::process::{CommandRunner, SystemRunner};

// ──────────────────────────────────────────────
// Settings
// ──────────────────────────────────────────────

/// Everything the driver needs to know about the publish targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    /// Registry upload command line (e.g., `cargo publish`).
    pub registry_command: String,
    /// Git remote to push to.
    pub git_remote: String,
    /// Branch to push.
    pub branch: String,
    /// Container engine binary.
    pub engine: String,
    /// Local tag for the freshly built image.
    pub build_tag: String,
    /// Remote image repository (`namespace/name`).
    pub image: String,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            registry_command: "cargo publish".into(),
            git_remote: "origin".into(),
            branch: "main".into(),
            engine: "docker".into(),
            build_tag: "shipgate:scripted".into(),
            image: String::new(),
        }
    }
}

// ──────────────────────────────────────────────
// Steps and events
// ──────────────────────────────────────────────

/// Which publish target a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishTarget {
    /// Package registry.
    Registry,
    /// Git remote.
    Vcs,
    /// Container registry.
    Container,
}

impl std::fmt::Display for PublishTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry => write!(f, "registry"),
            Self::Vcs => write!(f, "vcs"),
            Self::Container => write!(f, "container"),
        }
    }
}

/// A single external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishStep {
    /// Target this step publishes to.
    pub target: PublishTarget,
    /// Short description for progress output.
    pub name: String,
    /// Program to run.
    pub program: String,
    /// Its arguments.
    pub args: Vec<String>,
}

impl PublishStep {
    fn new(target: PublishTarget, name: impl Into<String>, program: &str, args: &[&str]) -> Self {
        Self {
            target,
            name: name.into(),
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// The command line as typed in a shell.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Progress notifications from [`PublishDriver::execute`].
#[derive(Debug, Clone)]
pub enum PublishEvent {
    /// A step is about to run (or would run, in dry-run mode).
    StepStarted(PublishStep),
    /// A step finished.
    StepFinished(PublishStep, StepStatus),
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The command exited successfully.
    Done,
    /// Dry run; the command was not executed.
    Skipped,
}

/// A step and how it ended.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// The step.
    #[serde(flatten)]
    pub step: PublishStep,
    /// Its status.
    pub status: StepStatus,
}

/// Outcome of a full publish run.
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    /// Every step, in execution order.
    pub steps: Vec<StepRecord>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

// ──────────────────────────────────────────────
// Driver
// ──────────────────────────────────────────────

/// Runs the publish steps for a [`TransitionPlan`].
#[derive(Debug, Clone)]
pub struct PublishDriver<R = SystemRunner> {
    runner: R,
    settings: PublishSettings,
}

impl<R: CommandRunner> PublishDriver<R> {
    /// Driver running commands through `runner`.
    pub const fn new(runner: R, settings: PublishSettings) -> Self {
        Self { runner, settings }
    }

    /// The settings in use.
    pub const fn settings(&self) -> &PublishSettings {
        &self.settings
    }

    /// The ordered steps that publish `plan`.
    pub fn plan_steps(&self, plan: &TransitionPlan) -> Vec<PublishStep> {
        use PublishTarget::{Container, Registry, Vcs};

        let s = &self.settings;
        let mut registry = s.registry_command.split_whitespace();
        let program = registry.next().unwrap_or("cargo");
        let registry_args: Vec<&str> = registry.collect();

        let versioned = format!("{}:{}", s.image, plan.container.new.without_prefix());
        let latest = format!("{}:latest", s.image);
        let engine = s.engine.as_str();

        vec![
            PublishStep::new(Registry, "publish package", program, &registry_args),
            PublishStep::new(Vcs, "push branch", "git", &["push", &s.git_remote, &s.branch]),
            PublishStep::new(Vcs, "push tags", "git", &["push", &s.git_remote, "--tags"]),
            PublishStep::new(Container, "build image", engine, &["build", "-t", &s.build_tag, "."]),
            PublishStep::new(Container, "tag version", engine, &["tag", &s.build_tag, &versioned]),
            PublishStep::new(Container, "push version", engine, &["push", &versioned]),
            PublishStep::new(Container, "tag latest", engine, &["tag", &s.build_tag, &latest]),
            PublishStep::new(Container, "push latest", engine, &["push", &latest]),
        ]
    }

    /// Run every step for `plan`, stopping at the first failure.
    ///
    /// With `dry_run`, steps are reported through `on_event` but not run.
    ///
    /// # Errors
    ///
    /// The first step that could not be spawned or exited non-zero.
    #[instrument(skip(self, plan, on_event), fields(version = %plan.registry.new))]
    pub fn execute(
        &self,
        plan: &TransitionPlan,
        dry_run: bool,
        mut on_event: impl FnMut(PublishEvent),
    ) -> PublishResult<PublishOutcome> {
        let mut steps = Vec::new();

        for step in self.plan_steps(plan) {
            on_event(PublishEvent::StepStarted(step.clone()));

            let status = if dry_run {
                debug!(command = %step.command_line(), "dry run, not executing");
                StepStatus::Skipped
            } else {
                self.run_step(&step)?;
                StepStatus::Done
            };

            on_event(PublishEvent::StepFinished(step.clone(), status));
            steps.push(StepRecord { step, status });
        }

        info!(steps = steps.len(), dry_run, "publish finished");
        Ok(PublishOutcome { steps, dry_run })
    }

    fn run_step(&self, step: &PublishStep) -> PublishResult<()> {
        debug!(command = %step.command_line(), "running");
        let args: Vec<&str> = step.args.iter().map(String::as_str).collect();

        let output = self
            .runner
            .run(&step.program, &args)
            .map_err(|source| PublishError::Spawn {
                step: step.name.clone(),
                command: step.program.clone(),
                source,
            })?;

        if !output.success() {
            return Err(PublishError::StepFailed {
                step: step.name.clone(),
                command: step.program.clone(),
                args: step.args.clone(),
                stderr: output.stderr,
                exit_code: output.code,
            });
        }
        Ok(())
    }
}
