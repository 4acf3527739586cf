//! Integration and reader configuration.
//!
//! Values are resolved once when a reader is constructed; nothing here is
//! re-read per call.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{ReaderError, Result};

/// Default GitLab host.
pub const GITLAB_COM_HOST: &str = "gitlab.com";

/// Default lifetime of a cached project id (10 minutes).
pub const DEFAULT_PROJECT_ID_CACHE_TTL_MS: u64 = 10 * 60 * 1000;

/// Default number of cached project ids.
pub const DEFAULT_PROJECT_ID_CACHE_MAX_SIZE: usize = 1000;

/// One GitLab instance the reader may talk to.
///
/// Only `host` is required. The API and web base URLs default to
/// `https://{host}/api/v4` and `https://{host}`. A `base_url` with a path
/// component (e.g. `https://example.com/gitlab`) marks a self-hosted
/// instance served under a relative path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitLabIntegrationConfig {
    /// Host name, without scheme (e.g. "gitlab.com").
    pub host: String,
    /// REST API root, e.g. "https://gitlab.example.com/api/v4".
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Web root, e.g. "https://gitlab.example.com" or "https://example.com/gitlab".
    #[serde(default)]
    pub base_url: Option<String>,
    /// Personal or project access token sent as `PRIVATE-TOKEN`.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for GitLabIntegrationConfig {
    fn default() -> Self {
        Self::new(GITLAB_COM_HOST)
    }
}

impl GitLabIntegrationConfig {
    /// Create a configuration for `host` with derived URLs and no token.
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        let host = host
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        Self {
            host,
            api_base_url: None,
            base_url: None,
            token: None,
        }
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// REST API root without a trailing slash.
    pub fn api_base_url(&self) -> String {
        match &self.api_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("{}/api/v4", self.base_url()),
        }
    }

    /// Web root without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", self.host),
        }
    }

    /// Path prefix under which the instance is served, or "" at the root.
    ///
    /// `https://example.com/gitlab` yields `/gitlab`.
    pub fn relative_path(&self) -> Result<String> {
        let base = self.base_url();
        let parsed = Url::parse(&base)
            .map_err(|e| ReaderError::Config(format!("invalid base_url {}: {}", base, e)))?;
        Ok(parsed.path().trim_end_matches('/').to_string())
    }

    /// Check that the derived URLs parse.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(ReaderError::Config("integration host is empty".to_string()));
        }
        let api = self.api_base_url();
        Url::parse(&api)
            .map_err(|e| ReaderError::Config(format!("invalid api_base_url {}: {}", api, e)))?;
        self.relative_path().map(|_| ())
    }
}

/// Reader-wide options with documented defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Lifetime of a cached project id, in milliseconds.
    pub project_id_cache_ttl_ms: u64,
    /// Maximum number of cached project ids.
    pub project_id_cache_max_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            project_id_cache_ttl_ms: DEFAULT_PROJECT_ID_CACHE_TTL_MS,
            project_id_cache_max_size: DEFAULT_PROJECT_ID_CACHE_MAX_SIZE,
        }
    }
}

impl ReaderOptions {
    /// Cache entry lifetime.
    #[inline]
    pub fn project_id_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.project_id_cache_ttl_ms)
    }
}
