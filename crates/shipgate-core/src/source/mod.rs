//! Version sources.
//!
//! Each source wraps one external system and reports the latest version it
//! knows about:
//!
//! - [`ManifestSource`] - `package.version` in the local manifest
//! - [`LocalTagSource`] - `git tag` in the working copy
//! - [`RemoteTagSource`] - tags on the VCS hosting API
//! - [`RegistrySource`] - versions in the package registry index
//! - [`ContainerSource`] - version-shaped tags in the container registry
//!
//! Sources share no state and can be resolved in any order.

mod container;
mod local_tag;
mod manifest;
mod registry;
mod remote_tag;

pub use container::ContainerSource;
pub use local_tag::LocalTagSource;
pub use manifest::{Manifest, ManifestSource};
pub use registry::{RegistrySource, shard_candidates};
pub use remote_tag::RemoteTagSource;

use serde::Serialize;
use tracing::debug;

use crate::error::SourceResult;
use crate::version::{ReleaseVersion, max_version};

/// Which external system a version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The local package manifest.
    Manifest,
    /// Tags in the local git repository.
    LocalTag,
    /// Tags on the remote hosting service.
    RemoteTag,
    /// The package registry.
    Registry,
    /// The container registry.
    Container,
}

impl SourceKind {
    /// All kinds, in resolution and report order.
    pub const ALL: &'static [Self] = &[
        Self::Manifest,
        Self::LocalTag,
        Self::RemoteTag,
        Self::Registry,
        Self::Container,
    ];

    /// Human-readable label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::LocalTag => "local tag",
            Self::RemoteTag => "remote tag",
            Self::Registry => "registry",
            Self::Container => "container registry",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The latest version a source found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    /// The greatest version seen.
    pub version: ReleaseVersion,
    /// How many candidate entries the source looked at.
    pub considered: usize,
    /// Entries that were ignored because they do not hold a version.
    pub skipped: Vec<String>,
}

impl Resolved {
    /// A single, directly-read version (nothing to skip).
    pub const fn single(version: ReleaseVersion) -> Self {
        Self {
            version,
            considered: 1,
            skipped: Vec::new(),
        }
    }
}

/// Something that can report the latest version of the package.
pub trait VersionSource {
    /// Which system this source reads.
    fn kind(&self) -> SourceKind;

    /// Find the latest version.
    ///
    /// # Errors
    ///
    /// Returns the [`SourceError`](crate::error::SourceError) describing why
    /// no version could be produced.
    fn resolve_latest(&self) -> SourceResult<Resolved>;
}

/// Parse every name, keep the ones that hold a version, and take the max.
///
/// Names that do not parse are returned in [`Resolved::skipped`] instead of
/// failing the whole source.
pub(crate) fn latest_of<I, S>(kind: SourceKind, names: I) -> SourceResult<Resolved>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut considered = 0;
    let mut skipped = Vec::new();
    let mut versions = Vec::new();

    for name in names {
        let name = name.as_ref();
        considered += 1;
        match ReleaseVersion::parse(name) {
            Ok(version) => versions.push(version),
            Err(_) => skipped.push(name.to_string()),
        }
    }

    if !skipped.is_empty() {
        debug!(source = %kind, skipped = skipped.len(), names = ?skipped, "ignored entries without a version");
    }

    let version = max_version(versions)?;
    debug!(source = %kind, %version, considered, "resolved latest version");
    Ok(Resolved {
        version,
        considered,
        skipped,
    })
}
