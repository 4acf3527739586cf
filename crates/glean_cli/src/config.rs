//! Configuration file support for glean.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags (`--token`)
//! 2. Environment variables (`GLEAN_GITLAB_TOKEN`, `GLEAN_GITLAB_HOST`, or any
//!    key spelled with `__` between sections, e.g. `GLEAN_READER__PROJECT_ID_CACHE_MAX_SIZE`)
//! 3. Config file (./glean.toml, then ~/.config/glean/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [gitlab]
//! host = "gitlab.com"
//! token = "glpat-..."  # or use GLEAN_GITLAB_TOKEN env var
//!
//! [[integrations]]
//! host = "example.com"
//! base_url = "https://example.com/gitlab"  # instance served under /gitlab
//! token = "glpat-..."
//!
//! [reader]
//! project_id_cache_ttl_ms = 600000
//! project_id_cache_max_size = 1000
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use glean::{GITLAB_COM_HOST, GitLabIntegrationConfig, ReaderOptions};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Primary GitLab instance.
    pub gitlab: GitLabConfig,
    /// Additional GitLab instances, tried after the primary one.
    pub integrations: Vec<GitLabIntegrationConfig>,
    /// Project id cache tuning.
    pub reader: ReaderOptions,
}

/// Primary GitLab instance. Every field is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitLabConfig {
    /// GitLab host (e.g., "gitlab.com" or "https://gitlab.example.com").
    pub host: String,
    pub api_base_url: Option<String>,
    pub base_url: Option<String>,
    /// Personal access token.
    /// Can also be set via GLEAN_GITLAB_TOKEN environment variable.
    pub token: Option<String>,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            host: GITLAB_COM_HOST.to_string(),
            api_base_url: None,
            base_url: None,
            token: None,
        }
    }
}

impl From<&GitLabConfig> for GitLabIntegrationConfig {
    fn from(config: &GitLabConfig) -> Self {
        let mut integration = GitLabIntegrationConfig::new(config.host.as_str());
        integration.api_base_url = config.api_base_url.clone();
        integration.base_url = config.base_url.clone();
        integration.token = config.token.clone();
        integration
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Falls back to defaults (with a warning) when the sources cannot be
    /// merged.
    pub fn load() -> Self {
        match Self::build() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}", e);
                Config::default()
            }
        }
    }

    fn build() -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // Local config file (higher priority than XDG)
        let local_config = PathBuf::from("glean.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./glean.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // GLEAN_READER__PROJECT_ID_CACHE_TTL_MS -> reader.project_id_cache_ttl_ms
        builder = builder.add_source(
            Environment::with_prefix("GLEAN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Short forms for the common case.
        builder = builder
            .set_override_option("gitlab.host", std::env::var("GLEAN_GITLAB_HOST").ok())?
            .set_override_option("gitlab.token", std::env::var("GLEAN_GITLAB_TOKEN").ok())?;

        builder.build()?.try_deserialize()
    }

    /// All configured instances, primary first.
    ///
    /// Per-call tokens are applied by the reader, not here.
    pub fn integrations(&self) -> Vec<GitLabIntegrationConfig> {
        std::iter::once(GitLabIntegrationConfig::from(&self.gitlab))
            .chain(self.integrations.iter().cloned())
            .collect()
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "glean").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
