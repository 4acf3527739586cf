//! URL resolution: web URL → target → API endpoint.

use std::sync::Arc;

use crate::cache::{CacheKey, ProjectIdCache};
use crate::client::{GitLabApi, job_artifact_url, raw_file_url};
use crate::config::GitLabIntegrationConfig;
use crate::error::{ReaderError, Result};
use crate::target::{GitLabTarget, RouteKind, parse_target};

/// Maps GitLab web URLs onto REST endpoints for one integration.
///
/// Project ids are read through the shared [`ProjectIdCache`].
#[derive(Clone)]
pub struct UrlResolver {
    integration: GitLabIntegrationConfig,
    api: GitLabApi,
    cache: Arc<dyn ProjectIdCache>,
}

impl UrlResolver {
    pub fn new(
        integration: GitLabIntegrationConfig,
        api: GitLabApi,
        cache: Arc<dyn ProjectIdCache>,
    ) -> Self {
        Self {
            integration,
            api,
            cache,
        }
    }

    pub fn integration(&self) -> &GitLabIntegrationConfig {
        &self.integration
    }

    pub fn api(&self) -> &GitLabApi {
        &self.api
    }

    /// Parse `url` against this resolver's integration.
    pub fn parse(&self, url: &str) -> Result<GitLabTarget> {
        parse_target(url, &self.integration)
    }

    /// Resolve the numeric project id for `target`.
    ///
    /// Issues at most one `GET /projects/:path` on a cache miss.
    pub async fn project_id(&self, target: &GitLabTarget, token: Option<&str>) -> Result<u64> {
        let key = CacheKey::new(target.api_base_url.as_str(), target.repository_path.as_str());
        if let Some(id) = self.cache.get(&key) {
            tracing::debug!(path = %target.repository_path, id, "Project id cache hit");
            return Ok(id);
        }

        tracing::debug!(path = %target.repository_path, "Project id cache miss");
        let project = self.api.project(&target.repository_path, token).await?;
        self.cache.set(key, project.id);
        Ok(project.id)
    }

    /// API URL returning the raw bytes of a single-file target.
    ///
    /// Tree targets have no single-file endpoint and fail with
    /// [`ReaderError::Parse`].
    pub async fn file_fetch_url(&self, target: &GitLabTarget, token: Option<&str>) -> Result<String> {
        let (Some(git_ref), Some(file_path)) = (&target.git_ref, &target.file_path) else {
            return Err(ReaderError::parse(
                &target.url,
                "URL does not point at a single file",
            ));
        };

        match target.route_kind {
            RouteKind::ScopedBlob | RouteKind::UnscopedBlob => {
                let id = self.project_id(target, token).await?;
                Ok(raw_file_url(&target.api_base_url, id, file_path, git_ref))
            }
            RouteKind::JobArtifact => {
                let id = self.project_id(target, token).await?;
                let query = target.query.as_deref().unwrap_or_default();
                Ok(job_artifact_url(&target.api_base_url, id, git_ref, file_path, query))
            }
            RouteKind::Tree => Err(ReaderError::parse(
                &target.url,
                "tree URLs cannot be read as a single file",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::LruTtlCache;
    use crate::http::MockTransport;

    const PROJECT_URL: &str =
        "https://gitlab.com/api/v4/projects/groupA%2Fteams%2FteamA%2FsubgroupA%2FrepoA";

    fn resolver(transport: &MockTransport, cache: Arc<dyn ProjectIdCache>) -> UrlResolver {
        let integration = GitLabIntegrationConfig::new("gitlab.com");
        let api = GitLabApi::new(
            &integration.api_base_url(),
            None,
            Arc::new(transport.clone()),
        );
        UrlResolver::new(integration, api, cache)
    }

    #[tokio::test]
    async fn test_scoped_blob_fetch_url() {
        let transport = MockTransport::new();
        transport.push_json(PROJECT_URL, serde_json::json!({ "id": 12345 }));
        let resolver = resolver(&transport, Arc::new(LruTtlCache::new(Duration::from_secs(60), 10)));

        let target = resolver
            .parse("https://gitlab.com/groupA/teams/teamA/subgroupA/repoA/-/blob/branch/my/path/to/file.yaml")
            .unwrap();
        let url = resolver.file_fetch_url(&target, None).await.unwrap();
        assert_eq!(
            url,
            "https://gitlab.com/api/v4/projects/12345/repository/files/my%2Fpath%2Fto%2Ffile.yaml/raw?ref=branch"
        );
    }

    #[tokio::test]
    async fn test_job_artifact_fetch_url() {
        let transport = MockTransport::new();
        transport.push_json(PROJECT_URL, serde_json::json!({ "id": 12345 }));
        let resolver = resolver(&transport, Arc::new(LruTtlCache::new(Duration::from_secs(60), 10)));

        let target = resolver
            .parse("https://gitlab.com/groupA/teams/teamA/subgroupA/repoA/-/jobs/artifacts/branch/raw/my/path/to/file.yaml?job=myJob")
            .unwrap();
        let url = resolver.file_fetch_url(&target, None).await.unwrap();
        assert_eq!(
            url,
            "https://gitlab.com/api/v4/projects/12345/jobs/artifacts/branch/raw/my/path/to/file.yaml?job=myJob"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_project_id_is_cached_until_ttl() {
        let transport = MockTransport::new();
        transport.push_json(PROJECT_URL, serde_json::json!({ "id": 12345 }));
        transport.push_json(PROJECT_URL, serde_json::json!({ "id": 12345 }));
        let resolver = resolver(&transport, Arc::new(LruTtlCache::new(Duration::from_secs(60), 10)));
        let target = resolver
            .parse("https://gitlab.com/groupA/teams/teamA/subgroupA/repoA/-/blob/main/a.txt")
            .unwrap();

        assert_eq!(resolver.project_id(&target, None).await.unwrap(), 12345);
        assert_eq!(resolver.project_id(&target, None).await.unwrap(), 12345);
        assert_eq!(transport.count(PROJECT_URL), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(resolver.project_id(&target, None).await.unwrap(), 12345);
        assert_eq!(transport.count(PROJECT_URL), 2);
    }

    #[tokio::test]
    async fn test_unknown_project_is_not_found_and_not_cached() {
        let transport = MockTransport::new();
        transport.push_status(PROJECT_URL, 404);
        let cache = Arc::new(LruTtlCache::new(Duration::from_secs(60), 10));
        let resolver = resolver(&transport, cache.clone());
        let target = resolver
            .parse("https://gitlab.com/groupA/teams/teamA/subgroupA/repoA/-/blob/main/a.txt")
            .unwrap();

        let err = resolver.project_id(&target, None).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_tree_target_has_no_file_url() {
        let transport = MockTransport::new();
        let resolver = resolver(&transport, Arc::new(LruTtlCache::new(Duration::from_secs(60), 10)));
        let target = resolver.parse("https://gitlab.com/g/p/-/tree/main/docs").unwrap();

        let err = resolver.file_fetch_url(&target, None).await.unwrap_err();
        assert!(matches!(err, ReaderError::Parse { .. }));
        assert!(transport.requests().is_empty());
    }
}
