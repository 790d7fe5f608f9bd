//! Tags in the local git repository.

use tracing::{debug, instrument};

use super::{Resolved, SourceKind, VersionSource, latest_of};
use crate::error::{SourceError, SourceResult};
use crate::git;
use crate::process::{CommandRunner, SystemRunner};

/// Latest version among the local `git tag` list.
#[derive(Debug, Clone, Default)]
pub struct LocalTagSource<R = SystemRunner> {
    runner: R,
}

impl<R: CommandRunner> LocalTagSource<R> {
    /// Source that lists tags through `runner`.
    pub const fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> VersionSource for LocalTagSource<R> {
    fn kind(&self) -> SourceKind {
        SourceKind::LocalTag
    }

    #[instrument(name = "local_tag", skip(self))]
    fn resolve_latest(&self) -> SourceResult<Resolved> {
        let tags = git::list_tags(&self.runner).map_err(|e| {
            debug!(error = %e, "git tag failed");
            SourceError::command_failed("git", &["tag"])
        })?;
        latest_of(SourceKind::LocalTag, tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::ScriptedRunner;
    use crate::version::ReleaseVersion;

    #[test]
    fn picks_greatest_tag() {
        let runner = ScriptedRunner::new().ok("v0.1.0\nv0.10.0\nv0.9.3\n");
        let resolved = LocalTagSource::new(&runner).resolve_latest().unwrap();
        assert_eq!(resolved.version, ReleaseVersion::new(0, 10, 0));
        assert_eq!(resolved.version.to_string(), "v0.10.0");
        assert_eq!(runner.calls(), vec!["git tag"]);
    }

    #[test]
    fn records_skipped_tags() {
        let runner = ScriptedRunner::new().ok("v1.0.0\nbefore-rewrite\nv1.1.0\n");
        let resolved = LocalTagSource::new(&runner).resolve_latest().unwrap();
        assert_eq!(resolved.version, ReleaseVersion::new(1, 1, 0));
        assert_eq!(resolved.skipped, vec!["before-rewrite"]);
        assert_eq!(resolved.considered, 3);
    }

    #[test]
    fn git_failure_is_command_failed() {
        let runner = ScriptedRunner::new().fail(128, "fatal: not a git repository");
        let err = LocalTagSource::new(&runner).resolve_latest().unwrap_err();
        assert_eq!(err, SourceError::command_failed("git", &["tag"]));
    }

    #[test]
    fn missing_git_is_command_failed() {
        let runner = ScriptedRunner::new().missing();
        assert!(matches!(
            LocalTagSource::new(&runner).resolve_latest(),
            Err(SourceError::CommandFailed { .. })
        ));
    }

    #[test]
    fn no_tags_is_empty_set() {
        let runner = ScriptedRunner::new().ok("");
        assert_eq!(
            LocalTagSource::new(&runner).resolve_latest().unwrap_err(),
            SourceError::EmptyVersionSet
        );
    }
}
