//! Release version parsing and ordering.
//!
//! A release version is `<prefix><major>.<minor>.<patch>`, where the prefix
//! is optional (`v`, `kojamp-v`, ...). Pre-release and build metadata are not
//! understood; a string like `1.2.3-rc.1` parses as `1.2.3`.
//!
//! The prefix is carried for display only. Two versions that differ only in
//! prefix compare equal, so a `v1.2.0` git tag matches a `1.2.0` manifest.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::{SourceError, SourceResult};

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<prefix>[A-Za-z][A-Za-z-]*)?(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)")
        .expect("version pattern is valid")
});

/// A parsed `<prefix>?major.minor.patch` version.
#[derive(Debug, Clone)]
pub struct ReleaseVersion {
    prefix: Option<String>,
    major: u64,
    minor: u64,
    patch: u64,
}

impl ReleaseVersion {
    /// Create a version without a prefix.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            prefix: None,
            major,
            minor,
            patch,
        }
    }

    /// Attach a display prefix (e.g., `"v"`).
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Parse the single version contained in `raw`.
    ///
    /// `raw` must contain exactly one match of the version pattern; zero or
    /// several matches are rejected, as is a component that overflows `u64`.
    pub fn parse(raw: &str) -> SourceResult<Self> {
        let invalid = || SourceError::InvalidVersionFormat {
            input: raw.to_string(),
        };

        let mut matches = VERSION_PATTERN.captures_iter(raw);
        let caps = matches.next().ok_or_else(invalid)?;
        if matches.next().is_some() {
            return Err(invalid());
        }

        let component = |name: &str| caps[name].parse::<u64>().map_err(|_| invalid());
        Ok(Self {
            prefix: caps.name("prefix").map(|m| m.as_str().to_string()),
            major: component("major")?,
            minor: component("minor")?,
            patch: component("patch")?,
        })
    }

    /// The display prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// `(major, minor, patch)`.
    pub const fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    /// The same version with the prefix dropped.
    #[must_use]
    pub const fn without_prefix(&self) -> Self {
        Self::new(self.major, self.minor, self.patch)
    }
}

/// Order two versions by `(major, minor, patch)`, ignoring prefixes.
pub fn compare(a: &ReleaseVersion, b: &ReleaseVersion) -> Ordering {
    a.triple().cmp(&b.triple())
}

/// Pick the greatest version; on ties the first occurrence wins.
///
/// # Errors
///
/// Returns [`SourceError::EmptyVersionSet`] when `versions` yields nothing.
pub fn max_version<I>(versions: I) -> SourceResult<ReleaseVersion>
where
    I: IntoIterator<Item = ReleaseVersion>,
{
    versions
        .into_iter()
        .reduce(|best, candidate| {
            if compare(&candidate, &best) == Ordering::Greater {
                candidate
            } else {
                best
            }
        })
        .ok_or(SourceError::EmptyVersionSet)
}

impl PartialEq for ReleaseVersion {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Equal
    }
}

impl Eq for ReleaseVersion {}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            f.write_str(prefix)?;
        }
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for ReleaseVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
