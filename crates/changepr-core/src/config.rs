//! Layered changepr settings.
//!
//! Defaults sit at the bottom, then `~/.config/changepr/config.<ext>`, then
//! the nearest `.changepr.<ext>` or `changepr.<ext>` found walking up from
//! the working directory (the dotfile wins when both exist), then any file
//! passed with `--config`. The upward walk ends at the directory holding
//! `.git`. Files may be TOML, YAML (`.yaml`/`.yml`) or JSON.
//!
//! ```no_run
//! use changepr_core::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_project_search("/srv/monorepo")
//!     .load()?;
//! println!("release branch prefix: {}", config.pull_request.branch_prefix());
//! # Ok::<(), changepr_core::ConfigError>(())
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Default pull request title and commit message.
pub const DEFAULT_TITLE: &str = "Version Packages";

/// Default prefix of the release branch name.
pub const DEFAULT_BRANCH_PREFIX: &str = "changeset-release/";

/// Default git remote.
pub const DEFAULT_REMOTE: &str = "origin";

/// The configuration for changepr.
///
/// Every section is optional; command-line flags override anything set here.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files. No file log is written when unset.
    pub log_dir: Option<Utf8PathBuf>,
    /// Version and publish commands.
    pub commands: CommandsConfig,
    /// Release pull request settings.
    pub pull_request: PullRequestConfig,
    /// Git identity and remote.
    pub git: GitConfig,
    /// Bitbucket connection settings.
    pub bitbucket: BitbucketConfig,
    /// npm registry settings.
    pub npm: NpmConfig,
}

/// External commands run by the release workflow.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandsConfig {
    /// Command that consumes changesets and bumps versions.
    ///
    /// Defaults to the installed `@changesets/cli`.
    pub version: Option<String>,
    /// Command that publishes unpublished packages.
    ///
    /// When unset, merging the release PR does not publish.
    pub publish: Option<String>,
}

/// Release pull request settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PullRequestConfig {
    /// Open a pull request (default) or push the version commit straight
    /// to the base branch.
    pub enabled: Option<bool>,
    /// Pull request title.
    pub title: Option<String>,
    /// Version commit message.
    pub commit_message: Option<String>,
    /// Prefix for the release branch, followed by the base branch name.
    pub branch_prefix: Option<String>,
}

impl PullRequestConfig {
    /// Whether to open a pull request.
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Title, falling back to [`DEFAULT_TITLE`].
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    /// Commit message, falling back to [`DEFAULT_TITLE`].
    pub fn commit_message(&self) -> &str {
        self.commit_message.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    /// Release branch prefix, falling back to [`DEFAULT_BRANCH_PREFIX`].
    pub fn branch_prefix(&self) -> &str {
        self.branch_prefix.as_deref().unwrap_or(DEFAULT_BRANCH_PREFIX)
    }
}

/// Git identity and remote.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    /// Committer name for the version commit.
    pub user_name: Option<String>,
    /// Committer email for the version commit.
    pub user_email: Option<String>,
    /// Remote to push to.
    pub remote: Option<String>,
}

impl GitConfig {
    /// Remote, falling back to [`DEFAULT_REMOTE`].
    pub fn remote(&self) -> &str {
        self.remote.as_deref().unwrap_or(DEFAULT_REMOTE)
    }
}

/// Bitbucket connection settings.
///
/// Credentials are never read from config files; they come from
/// `BITBUCKET_CLIENT_ID` and `BITBUCKET_CLIENT_SECRET`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BitbucketConfig {
    /// REST API root.
    pub api_base: Option<String>,
    /// OAuth token endpoint.
    pub token_url: Option<String>,
    /// `workspace/repo` slug; defaults to `BITBUCKET_REPO_FULL_NAME`.
    pub repository: Option<String>,
}

/// npm registry settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct NpmConfig {
    /// Registry host for the `.npmrc` auth line.
    pub registry: Option<String>,
}

impl NpmConfig {
    /// Registry, falling back to the public npm registry.
    pub fn registry(&self) -> &str {
        self.registry
            .as_deref()
            .unwrap_or(crate::npm::DEFAULT_REGISTRY)
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for directory lookup and config file names.
const APP_NAME: &str = "changepr";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    /// Stop searching when a parent directory contains this entry.
    boundary_marker: Option<String>,
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Walk up from `path` looking for a project config file.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/changepr/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Stop the upward search at a directory containing `marker`.
    /// Default is `.git`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
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

    /// Config files that [`load`](Self::load) will merge, lowest
    /// precedence first: user config, nearest project config, then explicit
    /// files in the order they were added.
    pub fn sources(&self) -> Vec<Utf8PathBuf> {
        let user = if self.include_user_config {
            self.find_user_config()
        } else {
            None
        };
        let project = self
            .project_search_root
            .as_deref()
            .and_then(|root| self.find_project_config(root));
        user.into_iter()
            .chain(project)
            .chain(self.explicit_files.iter().cloned())
            .collect()
    }

    /// Merge every source over the built-in defaults.
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        let sources = self.sources();
        tracing::debug!(?sources, "loading configuration");
        let config: Config = sources
            .iter()
            .fold(
                Figment::from(Serialized::defaults(Config::default())),
                |figment, path| Self::merge_file(figment, path),
            )
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::debug!(
            log_level = config.log_level.as_str(),
            pull_requests = config.pull_request.enabled(),
            "configuration loaded"
        );
        Ok(config)
    }

    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        for dir in start.ancestors() {
            let found = CONFIG_EXTENSIONS.iter().find_map(|ext| {
                [format!(".{APP_NAME}.{ext}"), format!("{APP_NAME}.{ext}")]
                    .into_iter()
                    .map(|name| dir.join(name))
                    .find(|path| path.is_file())
            });
            if found.is_some() {
                return found;
            }

            // The directory holding the marker is the last one searched.
            if self
                .boundary_marker
                .as_ref()
                .is_some_and(|marker| dir.join(marker).exists())
            {
                break;
            }
        }

        None
    }

    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Find the project config file path without loading it.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new()
        .with_project_search(start.as_ref())
        .find_project_config(start.as_ref())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// The user config directory (`~/.config/changepr/` on Linux).
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// The user cache directory (`~/.cache/changepr/` on Linux).
pub fn user_cache_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.cache_dir().to_path_buf()).ok()
}

/// The user data directory (`~/.local/share/changepr/` on Linux).
pub fn user_data_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_dir().to_path_buf()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
        Utf8PathBuf::try_from(path).unwrap()
    }

    fn load_file(name: &str, body: &str) -> Config {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(name);
        fs::write(&path, body).unwrap();
        ConfigLoader::new()
            .with_user_config(false)
            .with_file(utf8(path))
            .load()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_dir.is_none());
        assert!(config.commands.publish.is_none());
        assert!(config.pull_request.enabled());
        assert_eq!(config.pull_request.title(), "Version Packages");
        assert_eq!(config.pull_request.commit_message(), "Version Packages");
        assert_eq!(config.pull_request.branch_prefix(), "changeset-release/");
        assert_eq!(config.git.remote(), "origin");
        assert_eq!(config.npm.registry(), "registry.npmjs.org");
    }

    #[test]
    fn test_loader_builds_with_defaults() {
        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_toml_sections() {
        let config = load_file(
            "config.toml",
            r#"
log_level = "debug"
log_dir = "/tmp/changepr"

[commands]
publish = "pnpm release"

[pull_request]
enabled = false
title = "Release"

[git]
user_name = "bot"
remote = "upstream"

[bitbucket]
repository = "team/repo"
"#,
        );
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.log_dir.as_deref().map(Utf8Path::as_str), Some("/tmp/changepr"));
        assert_eq!(config.commands.publish.as_deref(), Some("pnpm release"));
        assert!(!config.pull_request.enabled());
        assert_eq!(config.pull_request.title(), "Release");
        assert_eq!(config.pull_request.commit_message(), "Version Packages");
        assert_eq!(config.git.user_name.as_deref(), Some("bot"));
        assert_eq!(config.git.remote(), "upstream");
        assert_eq!(config.bitbucket.repository.as_deref(), Some("team/repo"));
    }

    #[test]
    fn test_yaml_and_json_formats() {
        let yaml = load_file("config.yaml", "commands:\n  version: yarn version-packages\n");
        assert_eq!(yaml.commands.version.as_deref(), Some("yarn version-packages"));

        let json = load_file("config.json", r#"{"npm": {"registry": "npm.example.com"}}"#);
        assert_eq!(json.npm.registry(), "npm.example.com");
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("base.toml");
        fs::write(&base, "[pull_request]\ntitle = \"base\"\n").unwrap();
        let over = tmp.path().join("override.toml");
        fs::write(&over, "[pull_request]\ntitle = \"override\"\n").unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(utf8(base))
            .with_file(utf8(over))
            .load()
            .unwrap();
        assert_eq!(config.pull_request.title(), "override");
    }

    #[test]
    fn test_project_config_discovery() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("project");
        let sub_dir = project_dir.join("packages").join("a");
        fs::create_dir_all(&sub_dir).unwrap();
        fs::write(project_dir.join(".changepr.toml"), r#"log_level = "debug""#).unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(utf8(sub_dir))
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_boundary_marker_stops_search() {
        let tmp = TempDir::new().unwrap();
        let parent = tmp.path().join("parent");
        let child = parent.join("child");
        let work = child.join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(parent.join(".changepr.toml"), r#"log_level = "warn""#).unwrap();
        fs::create_dir(child.join(".git")).unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_boundary_marker(".git")
            .with_project_search(utf8(work.clone()))
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Info);

        fs::write(child.join("changepr.yaml"), "log_level: error\n").unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(utf8(work))
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn test_explicit_file_overrides_project_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("changepr.toml"), r#"log_level = "warn""#).unwrap();
        let over = tmp.path().join("override.toml");
        fs::write(&over, r#"log_level = "error""#).unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(utf8(tmp.path().to_path_buf()))
            .with_file(utf8(over))
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn sources_are_ordered_by_precedence() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("changepr.json"), "{}").unwrap();
        let ci = utf8(tmp.path().join("ci.yaml"));
        let sources = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(utf8(tmp.path().to_path_buf()))
            .with_file(&ci)
            .sources();
        assert_eq!(sources.len(), 2);
        assert!(sources[0].as_str().ends_with("changepr.json"));
        assert_eq!(sources[1], ci);
    }

    #[test]
    fn no_sources_without_files() {
        let tmp = TempDir::new().unwrap();
        let sources = ConfigLoader::new()
            .with_user_config(false)
            .with_boundary_marker("Cargo.toml")
            .with_project_search(utf8(tmp.path().to_path_buf()))
            .sources();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_invalid_value_is_deserialize_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[pull_request]\nenabled = \"sometimes\"\n").unwrap();
        let result = ConfigLoader::new()
            .with_user_config(false)
            .with_file(utf8(path))
            .load();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn test_find_project_config_returns_path() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("changepr.yaml"), "log_level: warn\n").unwrap();
        let found = find_project_config(utf8(tmp.path().to_path_buf())).unwrap();
        assert!(found.as_str().ends_with("changepr.yaml"));
    }

    #[test]
    fn test_user_config_dir() {
        if let Some(path) = user_config_dir() {
            assert!(path.as_str().contains("changepr"));
        }
    }
}
