//! The local package manifest (`Cargo.toml`).

use camino::{Utf8Path, Utf8PathBuf};
use toml::Table;
use tracing::{debug, instrument};

use super::{Resolved, SourceKind, VersionSource};
use crate::error::{SourceError, SourceResult};
use crate::version::ReleaseVersion;

const VERSION_FIELD: &str = "package.version";

/// A manifest file that has been read and parsed.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Where it was read from.
    pub path: Utf8PathBuf,
    /// Raw file content.
    pub content: String,
    table: Table,
}

impl Manifest {
    /// `package.name`, if declared as a string.
    pub fn package_name(&self) -> Option<&str> {
        self.package_str("name")
    }

    /// `package.version` as a raw string, if declared as one.
    pub fn raw_version(&self) -> Option<&str> {
        self.package_str("version")
    }

    fn package_str(&self, key: &str) -> Option<&str> {
        self.table.get("package")?.get(key)?.as_str()
    }
}

/// Reads the authoritative version from the manifest's `[package]` table.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    path: Utf8PathBuf,
}

impl ManifestSource {
    /// Source reading the manifest at `path`.
    pub fn new(path: impl AsRef<Utf8Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the manifest file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Read and parse the manifest.
    ///
    /// # Errors
    ///
    /// [`SourceError::FileNotFound`] if the file cannot be read, and
    /// [`SourceError::FieldMissing`] if it is not valid TOML.
    #[instrument(skip(self), fields(path = %self.path))]
    pub fn read(&self) -> SourceResult<Manifest> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            debug!(error = %e, "manifest unreadable");
            SourceError::FileNotFound {
                path: self.path.to_string(),
            }
        })?;

        let table: Table = content.parse().map_err(|e: toml::de::Error| {
            debug!(error = %e, "manifest is not valid TOML");
            SourceError::field_missing(self.path.as_str(), VERSION_FIELD)
        })?;

        Ok(Manifest {
            path: self.path.clone(),
            content,
            table,
        })
    }
}

impl VersionSource for ManifestSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Manifest
    }

    fn resolve_latest(&self) -> SourceResult<Resolved> {
        let manifest = self.read()?;
        let raw = manifest
            .raw_version()
            .ok_or_else(|| SourceError::field_missing(self.path.as_str(), VERSION_FIELD))?;
        let version = ReleaseVersion::parse(raw)?;
        debug!(%version, "manifest version");
        Ok(Resolved::single(version))
    }
}
