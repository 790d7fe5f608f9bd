//! Configuration loading and discovery.
//!
//! Every setting has a default that matches a crate published to crates.io,
//! tagged on GitHub and shipped as a Docker Hub image, so a config file is
//! only needed to override identifiers or endpoints.
//!
//! # Sources (highest precedence first)
//!
//! 1. `SHIPGATE_*` environment variables (`__` separates sections, e.g.
//!    `SHIPGATE_CONTAINER__ENGINE=podman`)
//! 2. Explicit files added with [`ConfigLoader::with_file`]
//! 3. `.shipgate.<ext>` or `shipgate.<ext>` in the search root or a parent,
//!    stopping at the enclosing `.git` directory
//! 4. `~/.config/shipgate/config.<ext>`
//! 5. Defaults
//!
//! `<ext>` is one of `toml`, `yaml`, `yml`, `json`.
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use shipgate_core::config::ConfigLoader;
//!
//! let cwd = Utf8PathBuf::try_from(std::env::current_dir().unwrap()).unwrap();
//! let config = ConfigLoader::new().with_project_search(&cwd).load().unwrap();
//! println!("publishing to {}", config.container.engine);
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{ConfigError, ConfigResult};

/// Application name used for config file names and platform directories.
pub const APP_NAME: &str = "shipgate";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "SHIPGATE_";

const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// The configuration for shipgate.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level (`debug`, `info`, `warn`, `error`).
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// The package being released.
    pub package: PackageConfig,
    /// Remote VCS hosting.
    pub remote: RemoteConfig,
    /// Package registry.
    pub registry: RegistryConfig,
    /// Container registry and engine.
    pub container: ContainerConfig,
    /// Publish behavior.
    pub publish: PublishConfig,
}

/// The package being released.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PackageConfig {
    /// Package name; read from the manifest when unset.
    pub name: Option<String>,
    /// Manifest path, relative to the project root.
    pub manifest: Utf8PathBuf,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            name: None,
            manifest: Utf8PathBuf::from("Cargo.toml"),
        }
    }
}

/// Remote VCS hosting.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the repositories API.
    pub api_url: String,
    /// `owner/repo`; parsed from the git remote URL when unset.
    pub repository: Option<String>,
    /// Git remote to read the URL from and to push to.
    pub git_remote: String,
    /// File holding an API token. Requests are anonymous without one.
    pub token_file: Option<Utf8PathBuf>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com/repos".into(),
            repository: None,
            git_remote: "origin".into(),
            token_file: None,
        }
    }
}

/// Package registry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Repository API URL of the registry index.
    pub index_url: String,
    /// Command line that uploads the package.
    pub publish_command: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            index_url: "https://api.github.com/repos/rust-lang/crates.io-index".into(),
            publish_command: "cargo publish".into(),
        }
    }
}

/// Container registry and engine.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContainerConfig {
    /// Base URL of the registry's repositories API.
    pub api_url: String,
    /// `namespace/name`; defaults to `{owner}/{package}`.
    pub image: Option<String>,
    /// Engine binary (`docker`, `podman`, ...).
    pub engine: String,
    /// Local tag given to the freshly built image.
    pub build_tag: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://hub.docker.com/v2/repositories".into(),
            image: None,
            engine: "docker".into(),
            build_tag: format!("{APP_NAME}:scripted"),
        }
    }
}

/// Publish behavior.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PublishConfig {
    /// Branch pushed to the git remote.
    pub branch: String,
    /// Ask before publishing. `--yes` overrides this at runtime.
    pub confirm: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            branch: "main".into(),
            confirm: true,
        }
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Potential problems.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// The level as a lowercase filter directive.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Builder for loading configuration from multiple sources.
#[derive(Debug)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    include_env: bool,
    boundary_marker: Option<String>,
    explicit_files: Vec<Utf8PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader with user config and environment overrides enabled, stopping
    /// the project search at `.git`.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            include_env: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Walk up from `path` looking for a project config file.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Whether to read `~/.config/shipgate/config.<ext>`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Whether `SHIPGATE_*` environment variables override file values.
    pub const fn with_env(mut self, include: bool) -> Self {
        self.include_env = include;
        self
    }

    /// Search all the way to the filesystem root.
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file. Later files take precedence.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging every source.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Deserialize`] if a file cannot be parsed or a value
    /// has the wrong type.
    #[instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = find_user_config()
        {
            debug!(path = %user_config, "user config");
            figment = merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            debug!(path = %project_config, "project config");
            figment = merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            figment = merge_file(figment, file);
        }

        if self.include_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        info!(log_level = config.log_level.as_str(), "configuration loaded");
        Ok(config)
    }

    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        for dir in start.ancestors() {
            if let Some(found) = config_file_in(dir) {
                return Some(found);
            }

            // The directory holding the marker is searched, its parents are not.
            if let Some(ref marker) = self.boundary_marker
                && dir.join(marker).exists()
            {
                break;
            }
        }
        None
    }
}

/// The first `.shipgate.<ext>` or `shipgate.<ext>` in `dir`, dotfile first.
fn config_file_in(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    CONFIG_EXTENSIONS.iter().find_map(|ext| {
        [format!(".{APP_NAME}.{ext}"), format!("{APP_NAME}.{ext}")]
            .into_iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    })
}

fn find_user_config() -> Option<Utf8PathBuf> {
    let dir = user_config_dir()?;
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("config.{ext}")))
        .find(|path| path.is_file())
}

fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
    match path.extension() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
        Some("json") => figment.merge(Json::file_exact(path.as_str())),
        _ => figment.merge(Toml::file_exact(path.as_str())),
    }
}

/// Find the project config file without loading it, ignoring `.git`
/// boundaries.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new()
        .without_boundary_marker()
        .find_project_config(start.as_ref())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// `~/.config/shipgate/` or the platform equivalent.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.config_dir().to_path_buf()).ok()
}

/// `~/.cache/shipgate/` or the platform equivalent.
pub fn user_cache_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.cache_dir().to_path_buf()).ok()
}

/// `~/.local/share/shipgate/` or the platform equivalent.
pub fn user_data_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.data_dir().to_path_buf()).ok()
}
