//! Command implementations

pub mod check;

pub mod doctor;

pub mod publish;

pub mod report;

pub mod status;

use std::time::Duration;

use anyhow::Context;
use camino::Utf8Path;
use indicatif::{ProgressBar, ProgressStyle};
use shipgate_core::aggregate::SourceReport;
use shipgate_core::config::Config;
use shipgate_core::context::ReleaseContext;
use shipgate_core::http::Transport;
use shipgate_core::process::CommandRunner;

pub(crate) const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// How a command renders its results.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    /// Print a JSON document instead of text (`--json`).
    pub json: bool,
    /// No progress indicators (`--quiet`).
    pub quiet: bool,
}

impl Output {
    /// Whether spinners may be drawn.
    pub const fn progress(self) -> bool {
        !self.json && !self.quiet
    }
}

/// Build the release context for the project at `cwd`.
pub fn build_context(config: &Config, cwd: &Utf8Path) -> anyhow::Result<ReleaseContext> {
    ReleaseContext::from_config(config, cwd).context("could not determine what to release")
}

/// Resolve every source, with a spinner on stderr when `output` allows it.
pub fn resolve_sources<R, T>(context: &ReleaseContext<R, T>, output: Output) -> SourceReport
where
    R: CommandRunner + Clone,
    T: Transport + Clone,
{
    if !output.progress() {
        return context.resolve_all();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style.tick_strings(SPINNER_TICKS));
    }
    spinner.set_message("Querying version sources (this can take a while)...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    let report = context.resolve_all();
    spinner.finish_and_clear();
    report
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! A project on disk wired to scripted seams.

    use camino::Utf8PathBuf;
    use shipgate_core::config::Config;
    use shipgate_core::context::ReleaseContext;
    use shipgate_core::http::testing::FakeTransport;
    use shipgate_core::process::testing::ScriptedRunner;
    use tempfile::TempDir;

    pub const REMOTE_TAGS: &str = "https://api.test/repos/octo/kojamp/tags";
    pub const REGISTRY_FILE: &str = "https://index.test/contents/ko/ja/mp/kojamp";
    pub const CONTAINER_TAGS: &str = "https://hub.test/v2/repositories/octo/kojamp/tags";

    /// `{"vers":"1.1.0"}` as the index serves it.
    pub const REGISTRY_BODY: &str = r#"{"content":"eyJ2ZXJzIjoiMS4xLjAifQo="}"#;

    /// Manifest at 1.2.0; registry and container at 1.1.0; remote tag as given.
    pub fn api_with_remote_tag(remote: &str) -> FakeTransport {
        FakeTransport::new()
            .json(REMOTE_TAGS, &format!(r#"[{{"name":"{remote}"}}]"#))
            .json(REGISTRY_FILE, REGISTRY_BODY)
            .json(CONTAINER_TAGS, r#"{"results":[{"name":"1.1.0"},{"name":"latest"}],"next":null}"#)
    }

    /// Runner whose `git tag` lists v1.1.0 and v1.2.0.
    pub fn runner() -> ScriptedRunner {
        ScriptedRunner::new().ok("v1.1.0\nv1.2.0\n")
    }

    pub fn project() -> (TempDir, Utf8PathBuf, Config) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        std::fs::write(
            root.join("Cargo.toml"),
            "[package]\nname = \"kojamp\"\nversion = \"1.2.0\"\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.remote.api_url = "https://api.test/repos".into();
        config.remote.repository = Some("octo/kojamp".into());
        config.registry.index_url = "https://index.test".into();
        config.container.api_url = "https://hub.test/v2/repositories".into();
        (dir, root, config)
    }

    pub fn context<'a>(
        config: &Config,
        root: &Utf8PathBuf,
        runner: &'a ScriptedRunner,
        api: &'a FakeTransport,
    ) -> ReleaseContext<&'a ScriptedRunner, &'a FakeTransport> {
        ReleaseContext::with_parts(config, root, runner, api, api).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_and_json_suppress_progress() {
        assert!(Output::default().progress());
        let quiet = Output {
            json: false,
            quiet: true,
        };
        assert!(!quiet.progress());
        let json = Output {
            json: true,
            quiet: false,
        };
        assert!(!json.progress());
    }
}
