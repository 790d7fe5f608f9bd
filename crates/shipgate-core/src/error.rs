//! Error types for shipgate-core

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// A required identifier could not be resolved from config, manifest, or git.
    #[error("could not determine `{key}`; set it in .shipgate.toml")]
    Missing {
        /// Dotted config key (e.g., `remote.repository`).
        key: &'static str,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a single version source could not produce a version.
///
/// Carries structured data only; turning these into colored, human-readable
/// explanations is the CLI's job.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// A local file does not exist.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was looked up.
        path: String,
    },

    /// A file or response was read but the expected field is absent.
    #[error("field `{field}` missing in {location}")]
    FieldMissing {
        /// File path or URL that was inspected.
        location: String,
        /// The field that could not be located.
        field: String,
    },

    /// A string does not contain exactly one version.
    #[error("invalid version format: {input:?}")]
    InvalidVersionFormat {
        /// The raw input.
        input: String,
    },

    /// An HTTP request failed or returned a non-2xx status.
    #[error("request to {url} failed{}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// Response status, `None` on transport failure.
        status: Option<u16>,
    },

    /// An external command could not be run or exited non-zero.
    #[error("`{command} {}` failed", .args.join(" "))]
    CommandFailed {
        /// Program name.
        command: String,
        /// Arguments passed to it.
        args: Vec<String>,
    },

    /// There were no versions to choose the latest from.
    #[error("no versions found")]
    EmptyVersionSet,
}

impl SourceError {
    /// Build a [`SourceError::CommandFailed`] from borrowed parts.
    pub fn command_failed(command: &str, args: &[&str]) -> Self {
        Self::CommandFailed {
            command: command.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// Build a [`SourceError::FieldMissing`] from borrowed parts.
    pub fn field_missing(location: impl Into<String>, field: &str) -> Self {
        Self::FieldMissing {
            location: location.into(),
            field: field.to_string(),
        }
    }
}

/// Result alias for version sources.
pub type SourceResult<T> = Result<T, SourceError>;

/// A publish step could not be completed.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The program could not be started at all.
    #[error("{step}: could not run `{command}`: {source}")]
    Spawn {
        /// Human-readable step name.
        step: String,
        /// Program that failed to start.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The program ran and exited non-zero.
    #[error("{step}: `{command} {}` exited with {}", .args.join(" "), .exit_code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    StepFailed {
        /// Human-readable step name.
        step: String,
        /// Program name.
        command: String,
        /// Arguments passed to it.
        args: Vec<String>,
        /// Captured stderr, trimmed.
        stderr: String,
        /// Exit code, `None` if killed by a signal.
        exit_code: Option<i32>,
    },
}

/// Result alias for publishing.
pub type PublishResult<T> = Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_display_with_and_without_status() {
        let with = SourceError::HttpError {
            url: "https://example.test/tags".into(),
            status: Some(404),
        };
        assert_eq!(
            with.to_string(),
            "request to https://example.test/tags failed with status 404"
        );

        let without = SourceError::HttpError {
            url: "https://example.test/tags".into(),
            status: None,
        };
        assert_eq!(without.to_string(), "request to https://example.test/tags failed");
    }

    #[test]
    fn command_failed_display_joins_args() {
        let err = SourceError::command_failed("docker", &["images"]);
        assert_eq!(err.to_string(), "`docker images` failed");
    }

    #[test]
    fn missing_config_names_the_key() {
        let err = ConfigError::Missing {
            key: "remote.repository",
        };
        assert!(err.to_string().contains("remote.repository"));
    }

    #[test]
    fn step_failed_display() {
        let err = PublishError::StepFailed {
            step: "push tags".into(),
            command: "git".into(),
            args: vec!["push".into(), "origin".into(), "--tags".into()],
            stderr: "rejected".into(),
            exit_code: Some(1),
        };
        assert_eq!(
            err.to_string(),
            "push tags: `git push origin --tags` exited with status 1"
        );
    }
}
