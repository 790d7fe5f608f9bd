//! Version-shaped tags in the container image registry.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{Resolved, SourceKind, VersionSource, latest_of};
use crate::error::{SourceError, SourceResult};
use crate::http::{ReqwestTransport, Transport, get_ok};
use crate::process::{CommandRunner, SystemRunner};

static VERSION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").expect("static regex is valid"));

#[derive(Debug, Deserialize)]
struct TagPage {
    results: Vec<TagEntry>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Latest version among an image's registry tags.
///
/// Floating tags such as `latest` are ignored; only tags that contain a
/// `major.minor.patch` triplet are compared.
#[derive(Debug, Clone)]
pub struct ContainerSource<R = SystemRunner, T = ReqwestTransport> {
    runner: R,
    transport: T,
    engine: String,
    tags_url: String,
}

impl<R: CommandRunner, T: Transport> ContainerSource<R, T> {
    /// Source for `image` (`namespace/name`) under `api_url`, checking that
    /// `engine` responds before querying the registry.
    pub fn new(runner: R, transport: T, engine: &str, api_url: &str, image: &str) -> Self {
        Self {
            runner,
            transport,
            engine: engine.to_string(),
            tags_url: format!("{}/{image}/tags", api_url.trim_end_matches('/')),
        }
    }

    /// First page URL.
    pub fn tags_url(&self) -> &str {
        &self.tags_url
    }

    /// Run `<engine> images` and require it to succeed.
    ///
    /// # Errors
    ///
    /// [`SourceError::CommandFailed`] if the engine is missing or not running.
    pub fn check_engine(&self) -> SourceResult<()> {
        let failed = || SourceError::command_failed(&self.engine, &["images"]);
        match self.runner.run(&self.engine, &["images"]) {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => {
                debug!(engine = %self.engine, code = ?output.code, stderr = %output.stderr, "engine check failed");
                Err(failed())
            }
            Err(e) => {
                debug!(engine = %self.engine, error = %e, "engine not runnable");
                Err(failed())
            }
        }
    }

    fn fetch_names(&self) -> SourceResult<Vec<String>> {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(self.tags_url.clone());

        while let Some(url) = next.take() {
            if !seen.insert(url.clone()) {
                debug!(%url, "page already fetched, stopping");
                break;
            }
            let response = get_ok(&self.transport, &url)?;
            let page: TagPage = serde_json::from_str(&response.body)
                .map_err(|_| SourceError::field_missing(url.as_str(), "results"))?;
            names.extend(page.results.into_iter().map(|t| t.name));
            next = page.next;
        }

        Ok(names)
    }
}

impl<R: CommandRunner, T: Transport> VersionSource for ContainerSource<R, T> {
    fn kind(&self) -> SourceKind {
        SourceKind::Container
    }

    #[instrument(name = "container", skip(self), fields(url = %self.tags_url))]
    fn resolve_latest(&self) -> SourceResult<Resolved> {
        self.check_engine()?;

        let (versioned, floating): (Vec<String>, Vec<String>) = self
            .fetch_names()?
            .into_iter()
            .partition(|name| VERSION_TAG.is_match(name));
        if !floating.is_empty() {
            debug!(tags = ?floating, "ignored floating tags");
        }

        let mut resolved = latest_of(SourceKind::Container, versioned)?;
        resolved.considered += floating.len();
        resolved.skipped.splice(0..0, floating);
        Ok(resolved)
    }
}
