//! Resolved identifiers and the sources built from them.
//!
//! [`ReleaseContext`] is built once per run from [`Config`]. It fills in the
//! identifiers the config leaves unset (package name from the manifest,
//! repository from the git remote, image from both) and owns one instance
//! of each version source.
//!
//! Git and the container engine run in the process working directory; the
//! project root is only used to locate the manifest and the token file.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::aggregate::SourceReport;
use crate::config::Config;
use crate::error::ConfigError;
use crate::git;
use crate::http::{ReqwestTransport, Transport, TransportError, read_token};
use crate::process::{CommandRunner, SystemRunner};
use crate::publish::PublishSettings;
use crate::source::{
    ContainerSource, LocalTagSource, ManifestSource, RegistrySource, RemoteTagSource,
    VersionSource,
};

/// Errors building a [`ReleaseContext`].
#[derive(Error, Debug)]
pub enum ContextError {
    /// An identifier could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be created.
    #[error("failed to set up HTTP client: {0}")]
    Http(#[from] TransportError),
}

/// Identifiers every source and publish step agrees on.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Identifiers {
    /// Package name in the registry.
    pub package: String,
    /// `owner/repo` on the VCS host.
    pub repository: String,
    /// `namespace/name` in the container registry.
    pub image: String,
}

/// Everything needed to resolve versions and publish.
#[derive(Debug)]
pub struct ReleaseContext<R = SystemRunner, T = ReqwestTransport> {
    root: Utf8PathBuf,
    ids: Identifiers,
    manifest: ManifestSource,
    local_tag: LocalTagSource<R>,
    remote_tag: RemoteTagSource<T>,
    registry: RegistrySource<T>,
    container: ContainerSource<R, T>,
    settings: PublishSettings,
    runner: R,
}

impl ReleaseContext {
    /// Build the production context for the project at `root`.
    ///
    /// The VCS API and registry index share one client carrying the token
    /// from `remote.token_file`; the container registry is queried
    /// anonymously.
    ///
    /// # Errors
    ///
    /// [`ContextError::Config`] with [`ConfigError::Missing`] when the package
    /// name or repository cannot be determined, or [`ContextError::Http`] if
    /// the HTTP client cannot be built.
    #[instrument(skip(config), fields(%root))]
    pub fn from_config(config: &Config, root: &Utf8Path) -> Result<Self, ContextError> {
        let token = config
            .remote
            .token_file
            .as_ref()
            .and_then(|file| read_token(&root.join(file)));
        debug!(authenticated = token.is_some(), "API credentials");

        let api = ReqwestTransport::new(token.as_deref())?;
        let anonymous = ReqwestTransport::new(None)?;
        Self::with_parts(config, root, SystemRunner, api, anonymous)
    }
}

impl<R, T> ReleaseContext<R, T>
where
    R: CommandRunner + Clone,
    T: Transport + Clone,
{
    /// Build a context on explicit command and HTTP seams.
    ///
    /// `api` serves the VCS and registry index requests; `container_api`
    /// serves the container registry.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] when an identifier cannot be resolved.
    pub fn with_parts(
        config: &Config,
        root: &Utf8Path,
        runner: R,
        api: T,
        container_api: T,
    ) -> Result<Self, ContextError> {
        let manifest = ManifestSource::new(root.join(&config.package.manifest));
        let ids = resolve_identifiers(config, &manifest, &runner)?;
        info!(
            package = %ids.package,
            repository = %ids.repository,
            image = %ids.image,
            "release identifiers"
        );

        let settings = PublishSettings {
            registry_command: config.registry.publish_command.clone(),
            git_remote: config.remote.git_remote.clone(),
            branch: config.publish.branch.clone(),
            engine: config.container.engine.clone(),
            build_tag: config.container.build_tag.clone(),
            image: ids.image.clone(),
        };

        Ok(Self {
            root: root.to_path_buf(),
            local_tag: LocalTagSource::new(runner.clone()),
            remote_tag: RemoteTagSource::new(api.clone(), &config.remote.api_url, &ids.repository),
            registry: RegistrySource::new(api, &config.registry.index_url, ids.package.clone()),
            container: ContainerSource::new(
                runner.clone(),
                container_api,
                &config.container.engine,
                &config.container.api_url,
                &ids.image,
            ),
            manifest,
            ids,
            settings,
            runner,
        })
    }

    /// Project root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Resolved package, repository and image names.
    pub const fn identifiers(&self) -> &Identifiers {
        &self.ids
    }

    /// Settings for the publish driver.
    pub const fn publish_settings(&self) -> &PublishSettings {
        &self.settings
    }

    /// The runner the sources use, for building a publish driver.
    pub fn runner(&self) -> R {
        self.runner.clone()
    }

    /// Resolve every source once, in report order.
    ///
    /// A failing source does not stop the others.
    #[instrument(skip(self))]
    pub fn resolve_all(&self) -> SourceReport {
        let report = SourceReport {
            manifest: self.manifest.resolve_latest(),
            local_tag: self.local_tag.resolve_latest(),
            remote_tag: self.remote_tag.resolve_latest(),
            registry: self.registry.resolve_latest(),
            container: self.container.resolve_latest(),
        };
        info!(failed = report.failures().len(), "sources resolved");
        report
    }
}

fn resolve_identifiers(
    config: &Config,
    manifest: &ManifestSource,
    runner: &impl CommandRunner,
) -> Result<Identifiers, ConfigError> {
    let package = match &config.package.name {
        Some(name) => name.clone(),
        None => manifest
            .read()
            .ok()
            .and_then(|m| m.package_name().map(str::to_string))
            .ok_or(ConfigError::Missing { key: "package.name" })?,
    };

    let repository = match &config.remote.repository {
        Some(repository) => repository.clone(),
        None => git::remote_url(runner, &config.remote.git_remote)
            .ok()
            .flatten()
            .as_deref()
            .and_then(git::parse_owner_repo)
            .map(|(owner, repo)| format!("{owner}/{repo}"))
            .ok_or(ConfigError::Missing {
                key: "remote.repository",
            })?,
    };

    let image = match &config.container.image {
        Some(image) => image.clone(),
        None => {
            let owner = repository
                .split_once('/')
                .map(|(owner, _)| owner)
                .filter(|owner| !owner.is_empty())
                .ok_or(ConfigError::Missing {
                    key: "container.image",
                })?;
            format!("{owner}/{package}")
        }
    };

    Ok(Identifiers {
        package,
        repository,
        image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::FakeTransport;
    use crate::process::testing::ScriptedRunner;
    use crate::source::SourceKind;
    use crate::version::ReleaseVersion;
    use base64::Engine as _;
    use std::fs;
    use tempfile::TempDir;

    fn project(manifest: &str) -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        fs::write(root.join("Cargo.toml"), manifest).unwrap();
        (tmp, root)
    }

    const MANIFEST: &str = "[package]\nname = \"kojamp\"\nversion = \"0.2.0\"\n";

    #[test]
    fn identifiers_from_manifest_and_remote() {
        let (_tmp, root) = project(MANIFEST);
        let runner = ScriptedRunner::new().ok("git@github.com:nasccped/kojamp.git\n");
        let transport = FakeTransport::new();
        let ctx = ReleaseContext::with_parts(
            &Config::default(),
            &root,
            &runner,
            &transport,
            &transport,
        )
        .unwrap();

        assert_eq!(
            ctx.identifiers(),
            &Identifiers {
                package: "kojamp".into(),
                repository: "nasccped/kojamp".into(),
                image: "nasccped/kojamp".into(),
            }
        );
        assert_eq!(runner.calls(), vec!["git remote get-url origin"]);
        assert_eq!(ctx.publish_settings().image, "nasccped/kojamp");
    }

    #[test]
    fn config_identifiers_skip_discovery() {
        let (_tmp, root) = project("not even toml");
        let mut config = Config::default();
        config.package.name = Some("kojamp".into());
        config.remote.repository = Some("someone/kojamp-src".into());
        config.container.image = Some("registry/kojamp".into());

        let runner = ScriptedRunner::new();
        let transport = FakeTransport::new();
        let ctx =
            ReleaseContext::with_parts(&config, &root, &runner, &transport, &transport).unwrap();

        assert_eq!(ctx.identifiers().image, "registry/kojamp");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn missing_package_name() {
        let (_tmp, root) = project("[package]\nversion = \"0.1.0\"\n");
        let runner = ScriptedRunner::new();
        let transport = FakeTransport::new();
        let err = ReleaseContext::with_parts(
            &Config::default(),
            &root,
            &runner,
            &transport,
            &transport,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ContextError::Config(ConfigError::Missing { key: "package.name" })
        ));
    }

    #[test]
    fn missing_remote() {
        let (_tmp, root) = project(MANIFEST);
        let runner = ScriptedRunner::new().fail(2, "error: No such remote 'origin'");
        let transport = FakeTransport::new();
        let err = ReleaseContext::with_parts(
            &Config::default(),
            &root,
            &runner,
            &transport,
            &transport,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ContextError::Config(ConfigError::Missing {
                key: "remote.repository"
            })
        ));
    }

    #[test]
    fn resolve_all_reports_every_source() {
        let (_tmp, root) = project(MANIFEST);
        let mut config = Config::default();
        config.remote.repository = Some("nasccped/kojamp".into());
        config.remote.api_url = "https://api.test/repos".into();
        config.registry.index_url = "https://api.test/repos/index".into();
        config.container.api_url = "https://hub.test/v2/repositories".into();

        let registry_body = serde_json::json!({
            "content": base64::engine::general_purpose::STANDARD
                .encode("{\"vers\":\"0.1.0\"}\n{\"vers\":\"0.1.9\"}\n")
        })
        .to_string();
        let api = FakeTransport::new()
            .json(
                "https://api.test/repos/nasccped/kojamp/tags",
                r#"[{"name":"v0.1.9"}]"#,
            )
            .json(
                "https://api.test/repos/index/contents/ko/ja/mp/kojamp",
                &registry_body,
            );
        let hub = FakeTransport::new().json(
            "https://hub.test/v2/repositories/nasccped/kojamp/tags",
            r#"{"results":[{"name":"latest"},{"name":"0.1.9"}],"next":null}"#,
        );
        // git tag, then docker images
        let runner = ScriptedRunner::new().ok("v0.1.9\nv0.2.0\n").ok("");

        let ctx = ReleaseContext::with_parts(&config, &root, &runner, &api, &hub).unwrap();
        let state = ctx.resolve_all().into_state().unwrap();

        assert_eq!(state.manifest, ReleaseVersion::new(0, 2, 0));
        assert_eq!(state.local_tag, ReleaseVersion::new(0, 2, 0));
        assert_eq!(state.remote_tag, ReleaseVersion::new(0, 1, 9));
        assert_eq!(state.registry, ReleaseVersion::new(0, 1, 9));
        assert_eq!(state.container, ReleaseVersion::new(0, 1, 9));
        assert_eq!(runner.calls(), vec!["git tag", "docker images"]);
    }

    #[test]
    fn resolve_all_keeps_going_after_failures() {
        let (_tmp, root) = project(MANIFEST);
        let mut config = Config::default();
        config.remote.repository = Some("nasccped/kojamp".into());

        let runner = ScriptedRunner::new()
            .fail(128, "fatal: not a git repository")
            .missing();
        let transport = FakeTransport::new();
        let ctx =
            ReleaseContext::with_parts(&config, &root, &runner, &transport, &transport).unwrap();

        let report = ctx.resolve_all();
        assert!(report.manifest.is_ok());
        let failed: Vec<SourceKind> = report.failures().iter().map(|f| f.kind).collect();
        assert_eq!(
            failed,
            vec![
                SourceKind::LocalTag,
                SourceKind::RemoteTag,
                SourceKind::Registry,
                SourceKind::Container,
            ]
        );
    }

    #[test]
    fn token_file_is_relative_to_root() {
        let (_tmp, root) = project(MANIFEST);
        fs::write(root.join(".token"), "ghp_example\n").unwrap();
        let mut config = Config::default();
        config.package.name = Some("kojamp".into());
        config.remote.repository = Some("nasccped/kojamp".into());
        config.remote.token_file = Some(".token".into());

        let ctx = ReleaseContext::from_config(&config, &root).unwrap();
        assert_eq!(ctx.root(), root.as_path());
    }
}
