//! The release decision.
//!
//! Given the latest version from every source, [`decide`] checks that the
//! release is ahead everywhere it is about to be shipped. The checks run in
//! a fixed order and the first failure wins:
//!
//! 1. manifest == local tag
//! 2. local tag > remote tag
//! 3. manifest > registry
//! 4. local tag > container registry
//!
//! When every check passes the result is a [`TransitionPlan`] describing
//! what each publish target moves from and to.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::version::ReleaseVersion;

/// The latest version known to each source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseState {
    /// `package.version` in the manifest.
    pub manifest: ReleaseVersion,
    /// Greatest local git tag.
    pub local_tag: ReleaseVersion,
    /// Greatest tag on the remote.
    pub remote_tag: ReleaseVersion,
    /// Greatest version in the package registry.
    pub registry: ReleaseVersion,
    /// Greatest version-shaped container tag.
    pub container: ReleaseVersion,
}

/// Why a release cannot go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The manifest and the local tag disagree.
    ManifestLocalMismatch,
    /// The local tag has already been pushed, or the remote is ahead.
    LocalNotAheadOfRemote,
    /// The manifest version has already been published.
    ManifestNotAheadOfRegistry,
    /// The container registry already has this version or a later one.
    LocalNotAheadOfContainer,
}

impl BlockReason {
    /// Fixed message for this reason.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ManifestLocalMismatch => "manifest/local-tag mismatch",
            Self::LocalNotAheadOfRemote => "local tag not ahead of remote",
            Self::ManifestNotAheadOfRegistry => "manifest version not ahead of registry",
            Self::LocalNotAheadOfContainer => "local version not ahead of container registry",
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One publish target moving from `old` to `new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// What the target has today.
    pub old: ReleaseVersion,
    /// What it will have after publishing.
    pub new: ReleaseVersion,
}

impl Transition {
    fn between(old: &ReleaseVersion, new: &ReleaseVersion) -> Self {
        Self {
            old: old.clone(),
            new: new.clone(),
        }
    }
}

/// What publishing will change on each target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionPlan {
    /// Remote tag to local tag.
    pub vcs: Transition,
    /// Registry version to manifest version.
    pub registry: Transition,
    /// Container tag to manifest version.
    pub container: Transition,
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Decision {
    /// A check failed; nothing should be published.
    Blocked {
        /// The first check that failed.
        reason: BlockReason,
        /// The two compared versions, left operand first.
        offending: (ReleaseVersion, ReleaseVersion),
    },
    /// Every check passed.
    Proceed(TransitionPlan),
}

impl Decision {
    /// The plan, if the release may proceed.
    pub const fn plan(&self) -> Option<&TransitionPlan> {
        match self {
            Self::Proceed(plan) => Some(plan),
            Self::Blocked { .. } => None,
        }
    }
}

/// Run the release checks against `state`.
#[instrument(skip_all)]
pub fn decide(state: &ReleaseState) -> Decision {
    let blocked = |reason: BlockReason, left: &ReleaseVersion, right: &ReleaseVersion| {
        debug!(%reason, %left, %right, "release blocked");
        Decision::Blocked {
            reason,
            offending: (left.clone(), right.clone()),
        }
    };

    if state.manifest != state.local_tag {
        return blocked(
            BlockReason::ManifestLocalMismatch,
            &state.manifest,
            &state.local_tag,
        );
    }
    if state.local_tag <= state.remote_tag {
        return blocked(
            BlockReason::LocalNotAheadOfRemote,
            &state.local_tag,
            &state.remote_tag,
        );
    }
    if state.manifest <= state.registry {
        return blocked(
            BlockReason::ManifestNotAheadOfRegistry,
            &state.manifest,
            &state.registry,
        );
    }
    if state.local_tag <= state.container {
        return blocked(
            BlockReason::LocalNotAheadOfContainer,
            &state.local_tag,
            &state.container,
        );
    }

    debug!(version = %state.manifest, "release may proceed");
    Decision::Proceed(TransitionPlan {
        vcs: Transition::between(&state.remote_tag, &state.local_tag),
        registry: Transition::between(&state.registry, &state.manifest),
        container: Transition::between(&state.container, &state.manifest),
    })
}
