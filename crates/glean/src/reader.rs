//! The public reader facade.
//!
//! [`GitLabUrlReader`] ties one integration to a transport and a project-id
//! cache and exposes the three read operations. [`GitLabUrlReaders`] picks
//! the reader for a URL when several GitLab instances are configured.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::{LruTtlCache, ProjectIdCache};
use crate::client::GitLabApi;
use crate::conditional::Validators;
use crate::config::{GitLabIntegrationConfig, ReaderOptions};
use crate::error::{ReaderError, Result};
use crate::http::HttpTransport;
use crate::resolver::UrlResolver;
use crate::search::{SearchEngine, SearchResponse};
use crate::target::authority;
use crate::tree::{ReadTreeResponse, TreeRetriever};

/// Request timeout of the default transport.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Predicate over tree-relative POSIX paths; `false` drops the file.
pub type PathFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Options for [`GitLabUrlReader::read_url`].
#[derive(Debug, Clone, Default)]
pub struct ReadUrlOptions {
    /// Sent as `If-None-Match`.
    pub etag: Option<String>,
    /// Sent as `If-Modified-Since`.
    pub last_modified_after: Option<DateTime<Utc>>,
    /// Overrides the integration token for this call.
    pub token: Option<String>,
}

/// Options for [`GitLabUrlReader::read_tree`].
#[derive(Clone, Default)]
pub struct ReadTreeOptions {
    /// Commit id from a previous read.
    pub etag: Option<String>,
    pub last_modified_after: Option<DateTime<Utc>>,
    pub token: Option<String>,
    pub filter: Option<PathFilter>,
}

impl ReadTreeOptions {
    #[must_use]
    pub fn with_filter(mut self, filter: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for ReadTreeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadTreeOptions")
            .field("etag", &self.etag)
            .field("last_modified_after", &self.last_modified_after)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// Options for [`GitLabUrlReader::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub etag: Option<String>,
    pub token: Option<String>,
}

/// Result of [`GitLabUrlReader::read_url`].
#[derive(Debug, Clone)]
pub struct ReadUrlResponse {
    buffer: Arc<[u8]>,
    /// Server ETag of the file, if sent.
    pub etag: Option<String>,
    /// Parsed `Last-Modified` of the file, if sent.
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl ReadUrlResponse {
    pub fn new(
        buffer: impl Into<Arc<[u8]>>,
        etag: Option<String>,
        last_modified_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            buffer: buffer.into(),
            etag,
            last_modified_at,
        }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer_arc(&self) -> Arc<[u8]> {
        Arc::clone(&self.buffer)
    }
}

/// Reads files, trees and glob searches from one GitLab instance.
///
/// Cloning is cheap; clones share the transport and the project-id cache.
#[derive(Clone)]
pub struct GitLabUrlReader {
    resolver: UrlResolver,
    options: ReaderOptions,
}

impl GitLabUrlReader {
    /// Create a reader with the default HTTP transport.
    #[cfg(feature = "reqwest")]
    pub fn new(integration: GitLabIntegrationConfig, options: ReaderOptions) -> Result<Self> {
        let transport =
            crate::http::reqwest_transport::ReqwestTransport::with_timeout(DEFAULT_REQUEST_TIMEOUT)?;
        Self::with_transport(integration, options, Arc::new(transport))
    }

    /// Create a reader over an explicit transport.
    pub fn with_transport(
        integration: GitLabIntegrationConfig,
        options: ReaderOptions,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let cache: Arc<dyn ProjectIdCache> = Arc::new(LruTtlCache::from_options(&options));
        Self::build(integration, options, transport, cache)
    }

    fn build(
        integration: GitLabIntegrationConfig,
        options: ReaderOptions,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<dyn ProjectIdCache>,
    ) -> Result<Self> {
        integration.validate()?;
        let api = GitLabApi::new(
            &integration.api_base_url(),
            integration.token.clone(),
            transport,
        );
        Ok(Self {
            resolver: UrlResolver::new(integration, api, cache),
            options,
        })
    }

    /// Replace the project-id cache, e.g. to share one between readers.
    #[must_use]
    pub fn with_cache(self, cache: Arc<dyn ProjectIdCache>) -> Self {
        let Self { resolver, options } = self;
        Self {
            resolver: UrlResolver::new(resolver.integration().clone(), resolver.api().clone(), cache),
            options,
        }
    }

    pub fn integration(&self) -> &GitLabIntegrationConfig {
        self.resolver.integration()
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Whether this reader serves `url`'s host.
    pub fn handles(&self, url: &str) -> bool {
        url::Url::parse(url)
            .ok()
            .and_then(|u| authority(&u))
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.integration().host))
    }

    /// Read a single blob or job artifact.
    #[tracing::instrument(skip_all, fields(url = %url))]
    pub async fn read_url(&self, url: &str, options: &ReadUrlOptions) -> Result<ReadUrlResponse> {
        let target = self.resolver.parse(url)?;
        let validators = Validators {
            etag: options.etag.as_deref(),
            last_modified_after: options.last_modified_after,
        };
        TreeRetriever::new(&self.resolver)
            .read_file(&target, validators, options.token.as_deref())
            .await
    }

    /// Read a directory (or a single file as a one-node tree).
    #[tracing::instrument(skip_all, fields(url = %url))]
    pub async fn read_tree(&self, url: &str, options: &ReadTreeOptions) -> Result<ReadTreeResponse> {
        let target = self.resolver.parse(url)?;
        TreeRetriever::new(&self.resolver).fetch(&target, options).await
    }

    /// Find files matching the glob in `url`.
    #[tracing::instrument(skip_all, fields(url = %url))]
    pub async fn search(&self, url: &str, options: &SearchOptions) -> Result<SearchResponse> {
        SearchEngine::new(&self.resolver).search(url, options).await
    }
}

impl fmt::Display for GitLabUrlReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let integration = self.integration();
        write!(
            f,
            "gitlab{{host={},authed={}}}",
            integration.host,
            self.resolver.api().has_token()
        )
    }
}

/// Readers for several GitLab instances, selected by URL host.
#[derive(Clone, Default)]
pub struct GitLabUrlReaders {
    readers: Vec<GitLabUrlReader>,
}

impl GitLabUrlReaders {
    /// Build one reader per integration over the default transport.
    ///
    /// All readers share a single project-id cache; entries are keyed by API
    /// root so instances never collide.
    #[cfg(feature = "reqwest")]
    pub fn from_config(
        integrations: &[GitLabIntegrationConfig],
        options: ReaderOptions,
    ) -> Result<Self> {
        let transport =
            crate::http::reqwest_transport::ReqwestTransport::with_timeout(DEFAULT_REQUEST_TIMEOUT)?;
        Self::with_transport(integrations, options, Arc::new(transport))
    }

    pub fn with_transport(
        integrations: &[GitLabIntegrationConfig],
        options: ReaderOptions,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let cache: Arc<dyn ProjectIdCache> = Arc::new(LruTtlCache::from_options(&options));
        let readers = integrations
            .iter()
            .map(|integration| {
                GitLabUrlReader::build(
                    integration.clone(),
                    options,
                    Arc::clone(&transport),
                    Arc::clone(&cache),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { readers })
    }

    pub fn readers(&self) -> &[GitLabUrlReader] {
        &self.readers
    }

    /// The reader whose integration host matches `url`.
    pub fn reader_for(&self, url: &str) -> Result<&GitLabUrlReader> {
        self.readers
            .iter()
            .find(|reader| reader.handles(url))
            .ok_or_else(|| ReaderError::Config(format!("no GitLab integration for {}", url)))
    }
}

impl fmt::Display for GitLabUrlReaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, reader) in self.readers.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", reader)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockTransport};

    fn reader(transport: &MockTransport, integration: GitLabIntegrationConfig) -> GitLabUrlReader {
        GitLabUrlReader::with_transport(
            integration,
            ReaderOptions::default(),
            Arc::new(transport.clone()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_read_url_sends_validators_and_token() {
        let transport = MockTransport::new();
        transport.push_json(
            "https://gitlab.com/api/v4/projects/g%2Fp",
            serde_json::json!({ "id": 7 }),
        );
        let raw = "https://gitlab.com/api/v4/projects/7/repository/files/a.txt/raw?ref=main";
        transport.push_response(
            raw,
            HttpResponse {
                status: 200,
                headers: vec![
                    ("ETag".to_string(), "\"v2\"".to_string()),
                    (
                        "Last-Modified".to_string(),
                        "Sun, 06 Nov 1994 08:49:37 GMT".to_string(),
                    ),
                ],
                body: b"hello".to_vec(),
            },
        );
        let reader = reader(
            &transport,
            GitLabIntegrationConfig::new("gitlab.com").with_token("integration"),
        );

        let options = ReadUrlOptions {
            etag: Some("\"v1\"".to_string()),
            token: Some("per-call".to_string()),
            ..Default::default()
        };
        let response = reader
            .read_url("https://gitlab.com/g/p/-/blob/main/a.txt", &options)
            .await
            .unwrap();

        assert_eq!(response.buffer(), b"hello");
        assert_eq!(response.etag.as_deref(), Some("\"v2\""));
        assert!(response.last_modified_at.is_some());

        let requests = transport.requests();
        let file_request = requests.iter().find(|r| r.url == raw).unwrap();
        assert_eq!(file_request.header("If-None-Match"), Some("\"v1\""));
        assert_eq!(file_request.header("PRIVATE-TOKEN"), Some("per-call"));
    }

    #[tokio::test]
    async fn test_read_url_not_modified() {
        let transport = MockTransport::new();
        transport.push_json(
            "https://gitlab.com/api/v4/projects/g%2Fp",
            serde_json::json!({ "id": 7 }),
        );
        transport.push_status(
            "https://gitlab.com/api/v4/projects/7/repository/files/a.txt/raw?ref=main",
            304,
        );
        let reader = reader(&transport, GitLabIntegrationConfig::new("gitlab.com"));

        let err = reader
            .read_url(
                "https://gitlab.com/g/p/-/blob/main/a.txt",
                &ReadUrlOptions {
                    etag: Some("\"v1\"".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_not_modified());
    }

    #[tokio::test]
    async fn test_read_url_rejects_tree_urls() {
        let transport = MockTransport::new();
        let reader = reader(&transport, GitLabIntegrationConfig::new("gitlab.com"));
        let err = reader
            .read_url("https://gitlab.com/g/p/-/tree/main/docs", &ReadUrlOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::Parse { .. }));
    }

    #[test]
    fn test_reader_for_selects_by_host() {
        let transport = MockTransport::new();
        let readers = GitLabUrlReaders::with_transport(
            &[
                GitLabIntegrationConfig::new("gitlab.com"),
                GitLabIntegrationConfig::new("git.example.com:8443").with_token("t"),
            ],
            ReaderOptions::default(),
            Arc::new(transport),
        )
        .unwrap();

        let reader = readers
            .reader_for("https://git.example.com:8443/g/p/-/blob/main/a.txt")
            .unwrap();
        assert_eq!(reader.integration().host, "git.example.com:8443");
        assert!(matches!(
            readers.reader_for("https://github.com/o/r"),
            Err(ReaderError::Config(_))
        ));
        assert_eq!(
            readers.to_string(),
            "gitlab{host=gitlab.com,authed=false}, gitlab{host=git.example.com:8443,authed=true}"
        );
    }

    #[test]
    fn test_invalid_integration_is_rejected() {
        let result = GitLabUrlReader::with_transport(
            GitLabIntegrationConfig::new("gitlab.com").with_api_base_url("not a url"),
            ReaderOptions::default(),
            Arc::new(MockTransport::new()),
        );
        assert!(matches!(result, Err(ReaderError::Config(_))));
    }

    #[test]
    fn test_tree_options_debug_redacts_token() {
        let options = ReadTreeOptions {
            token: Some("secret".to_string()),
            ..Default::default()
        }
        .with_filter(|p| p.ends_with(".md"));
        let debug = format!("{:?}", options);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("filter: true"));
    }
}
