//! Collecting source results before a decision is made.
//!
//! Sources never short-circuit each other: every one of them is resolved and
//! every failure is kept, so a single run reports all the problems at once.

use serde::Serialize;

use crate::decision::ReleaseState;
use crate::error::{SourceError, SourceResult};
use crate::source::{Resolved, SourceKind};
use crate::version::ReleaseVersion;

/// Every error among `results`, in input order, or `None` if all succeeded.
pub fn aggregate<'a, T, I>(results: I) -> Option<Vec<SourceError>>
where
    T: 'a,
    I: IntoIterator<Item = &'a SourceResult<T>>,
{
    let errors: Vec<SourceError> = results
        .into_iter()
        .filter_map(|r| r.as_ref().err().cloned())
        .collect();
    (!errors.is_empty()).then_some(errors)
}

/// A source that failed, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    /// Which source.
    pub kind: SourceKind,
    /// What went wrong.
    #[serde(serialize_with = "error_message")]
    pub error: SourceError,
}

fn error_message<S: serde::Serializer>(error: &SourceError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// The outcome of resolving every source once.
#[derive(Debug, Clone)]
pub struct SourceReport {
    /// Manifest result.
    pub manifest: SourceResult<Resolved>,
    /// Local tag result.
    pub local_tag: SourceResult<Resolved>,
    /// Remote tag result.
    pub remote_tag: SourceResult<Resolved>,
    /// Registry result.
    pub registry: SourceResult<Resolved>,
    /// Container registry result.
    pub container: SourceResult<Resolved>,
}

impl SourceReport {
    /// Results labelled by kind, in [`SourceKind::ALL`] order.
    pub fn entries(&self) -> [(SourceKind, &SourceResult<Resolved>); 5] {
        [
            (SourceKind::Manifest, &self.manifest),
            (SourceKind::LocalTag, &self.local_tag),
            (SourceKind::RemoteTag, &self.remote_tag),
            (SourceKind::Registry, &self.registry),
            (SourceKind::Container, &self.container),
        ]
    }

    /// Whether any source failed.
    pub fn has_failures(&self) -> bool {
        aggregate(self.entries().map(|(_, r)| r)).is_some()
    }

    /// Every failure, labelled by source.
    pub fn failures(&self) -> Vec<SourceFailure> {
        self.entries()
            .into_iter()
            .filter_map(|(kind, result)| {
                result.as_ref().err().map(|error| SourceFailure {
                    kind,
                    error: error.clone(),
                })
            })
            .collect()
    }

    /// Build the decision input, or return every failure.
    ///
    /// # Errors
    ///
    /// All failed sources, in report order. A partial state is never built.
    pub fn into_state(self) -> Result<ReleaseState, Vec<SourceFailure>> {
        if self.has_failures() {
            return Err(self.failures());
        }

        match (
            self.manifest,
            self.local_tag,
            self.remote_tag,
            self.registry,
            self.container,
        ) {
            (Ok(manifest), Ok(local_tag), Ok(remote_tag), Ok(registry), Ok(container)) => {
                Ok(ReleaseState {
                    manifest: manifest.version,
                    local_tag: local_tag.version,
                    remote_tag: remote_tag.version,
                    registry: registry.version,
                    container: container.version,
                })
            }
            _ => Err(Vec::new()),
        }
    }
}

/// JSON view of one source result for `--json` output.
#[derive(Debug, Serialize)]
pub struct SourceEntry<'a> {
    /// Which source.
    pub kind: SourceKind,
    /// The latest version, when resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'a ReleaseVersion>,
    /// Ignored entries, when resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<&'a [String]>,
    /// The error message, when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceReport {
    /// One serializable entry per source, in report order.
    pub fn json_entries(&self) -> Vec<SourceEntry<'_>> {
        self.entries()
            .into_iter()
            .map(|(kind, result)| match result {
                Ok(resolved) => SourceEntry {
                    kind,
                    version: Some(&resolved.version),
                    skipped: Some(&resolved.skipped),
                    error: None,
                },
                Err(e) => SourceEntry {
                    kind,
                    version: None,
                    skipped: None,
                    error: Some(e.to_string()),
                },
            })
            .collect()
    }
}
