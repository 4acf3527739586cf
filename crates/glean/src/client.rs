//! Thin GitLab REST client over the transport boundary.
//!
//! Issues exactly the read endpoints the reader needs. URL construction is
//! kept in free functions so it can be checked without a transport.

use std::sync::Arc;

use crate::error::{ReaderError, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::types::{GitLabCommit, GitLabProject};

/// Header GitLab reads personal and project access tokens from.
pub const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// GitLab REST client bound to one API root.
#[derive(Clone)]
pub struct GitLabApi {
    transport: Arc<dyn HttpTransport>,
    api_base_url: String,
    token: Option<String>,
}

impl GitLabApi {
    /// Create a client for `api_base_url` (e.g. "https://gitlab.com/api/v4").
    pub fn new(
        api_base_url: &str,
        token: Option<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// API root this client talks to.
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Whether a default token is configured.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Build a `GET` request, attaching the per-call token or the default one.
    pub fn request(&self, url: impl Into<String>, token: Option<&str>) -> HttpRequest {
        let request = HttpRequest::get(url);
        match token.or(self.token.as_deref()) {
            Some(token) => request.with_header(PRIVATE_TOKEN_HEADER, token),
            None => request,
        }
    }

    /// Send a request and return the raw response, whatever its status.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        tracing::debug!(url = %request.url, "GitLab API request");
        let response = self.transport.send(request).await?;
        tracing::debug!(status = response.status, "GitLab API response");
        Ok(response)
    }

    /// Send a request and fail on any non-2xx status.
    ///
    /// `what` names the resource for [`ReaderError::NotFound`].
    pub async fn send_ok(&self, request: HttpRequest, what: &str) -> Result<HttpResponse> {
        let path = self.path_of(&request.url).to_string();
        let response = self.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ReaderError::from_status(
                response.status,
                &path,
                &response.text_lossy(),
                what,
            ))
        }
    }

    /// `GET /projects/:urlEncodedPath`
    pub async fn project(
        &self,
        repository_path: &str,
        token: Option<&str>,
    ) -> Result<GitLabProject> {
        let url = project_url(&self.api_base_url, repository_path);
        let response = self
            .send_ok(
                self.request(url, token),
                &format!("project {}", repository_path),
            )
            .await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// `GET /projects/:id`
    pub async fn project_by_id(&self, project_id: u64, token: Option<&str>) -> Result<GitLabProject> {
        let url = project_url(&self.api_base_url, &project_id.to_string());
        let response = self
            .send_ok(self.request(url, token), &format!("project {}", project_id))
            .await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// `GET /projects/:id/repository/commits?ref_name=:ref[&path=:path]`
    ///
    /// Most recent commit first.
    pub async fn commits(
        &self,
        project_id: u64,
        git_ref: &str,
        path: Option<&str>,
        token: Option<&str>,
    ) -> Result<Vec<GitLabCommit>> {
        let url = commits_url(&self.api_base_url, project_id, git_ref, path);
        let response = self
            .send_ok(
                self.request(url, token),
                &format!("branch {} (branch not found)", git_ref),
            )
            .await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// `GET /projects/:id/repository/archive?sha=:ref[&path=:path]`
    pub async fn archive(
        &self,
        project_id: u64,
        git_ref: &str,
        path: Option<&str>,
        token: Option<&str>,
    ) -> Result<HttpResponse> {
        let url = archive_url(&self.api_base_url, project_id, git_ref, path);
        self.send_ok(
            self.request(url, token),
            &format!("archive of {} at {}", project_id, git_ref),
        )
        .await
    }

    fn path_of<'a>(&self, url: &'a str) -> &'a str {
        url.strip_prefix(self.api_base_url.as_str()).unwrap_or(url)
    }
}

/// `{api}/projects/{encoded id or path}`
pub fn project_url(api_base_url: &str, id_or_path: &str) -> String {
    format!("{}/projects/{}", api_base_url, urlencoding::encode(id_or_path))
}

/// `{api}/projects/{id}/repository/files/{encoded path}/raw?ref={ref}`
pub fn raw_file_url(api_base_url: &str, project_id: u64, file_path: &str, git_ref: &str) -> String {
    format!(
        "{}/projects/{}/repository/files/{}/raw?ref={}",
        api_base_url,
        project_id,
        urlencoding::encode(file_path),
        urlencoding::encode(git_ref)
    )
}

/// `{api}/projects/{id}/jobs/artifacts/{ref}/raw/{path}?{query}`
///
/// The artifact path keeps its slashes; the input query string (which
/// carries `job=`) is passed through unchanged.
pub fn job_artifact_url(
    api_base_url: &str,
    project_id: u64,
    git_ref: &str,
    file_path: &str,
    query: &str,
) -> String {
    let path = file_path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!(
        "{}/projects/{}/jobs/artifacts/{}/raw/{}?{}",
        api_base_url,
        project_id,
        urlencoding::encode(git_ref),
        path,
        query
    )
}

/// `{api}/projects/{id}/repository/archive?sha={ref}[&path={path}]`
pub fn archive_url(api_base_url: &str, project_id: u64, git_ref: &str, path: Option<&str>) -> String {
    let mut url = format!(
        "{}/projects/{}/repository/archive?sha={}",
        api_base_url,
        project_id,
        urlencoding::encode(git_ref)
    );
    if let Some(path) = path {
        url.push_str("&path=");
        url.push_str(&urlencoding::encode(path));
    }
    url
}

/// `{api}/projects/{id}/repository/commits?ref_name={ref}[&path={path}]`
pub fn commits_url(api_base_url: &str, project_id: u64, git_ref: &str, path: Option<&str>) -> String {
    let mut url = format!(
        "{}/projects/{}/repository/commits?ref_name={}",
        api_base_url,
        project_id,
        urlencoding::encode(git_ref)
    );
    if let Some(path) = path {
        url.push_str("&path=");
        url.push_str(&urlencoding::encode(path));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;

    const API: &str = "https://gitlab.com/api/v4";

    #[test]
    fn test_project_url_encodes_path() {
        assert_eq!(
            project_url(API, "groupA/teams/repoA"),
            "https://gitlab.com/api/v4/projects/groupA%2Fteams%2FrepoA"
        );
        assert_eq!(project_url(API, "12345"), "https://gitlab.com/api/v4/projects/12345");
    }

    #[test]
    fn test_raw_file_url() {
        assert_eq!(
            raw_file_url(API, 12345, "my/path/to/file.yaml", "branch"),
            "https://gitlab.com/api/v4/projects/12345/repository/files/my%2Fpath%2Fto%2Ffile.yaml/raw?ref=branch"
        );
        assert_eq!(
            raw_file_url(API, 1, "a.txt", "feature/x"),
            "https://gitlab.com/api/v4/projects/1/repository/files/a.txt/raw?ref=feature%2Fx"
        );
    }

    #[test]
    fn test_job_artifact_url_keeps_slashes_and_query() {
        assert_eq!(
            job_artifact_url(API, 12345, "branch", "my/path/to/file.yaml", "job=myJob"),
            "https://gitlab.com/api/v4/projects/12345/jobs/artifacts/branch/raw/my/path/to/file.yaml?job=myJob"
        );
    }

    #[test]
    fn test_archive_and_commit_urls() {
        assert_eq!(
            archive_url(API, 7, "main", None),
            "https://gitlab.com/api/v4/projects/7/repository/archive?sha=main"
        );
        assert_eq!(
            archive_url(API, 7, "main", Some("docs/guide")),
            "https://gitlab.com/api/v4/projects/7/repository/archive?sha=main&path=docs%2Fguide"
        );
        assert_eq!(
            commits_url(API, 7, "main", Some("docs")),
            "https://gitlab.com/api/v4/projects/7/repository/commits?ref_name=main&path=docs"
        );
    }

    #[test]
    fn test_request_token_precedence() {
        let api = GitLabApi::new(API, Some("default".to_string()), Arc::new(MockTransport::new()));
        let req = api.request("https://x", None);
        assert_eq!(req.header(PRIVATE_TOKEN_HEADER), Some("default"));
        let req = api.request("https://x", Some("override"));
        assert_eq!(req.header(PRIVATE_TOKEN_HEADER), Some("override"));

        let anonymous = GitLabApi::new(API, None, Arc::new(MockTransport::new()));
        assert!(!anonymous.has_token());
        assert_eq!(anonymous.request("https://x", None).header(PRIVATE_TOKEN_HEADER), None);
    }

    #[tokio::test]
    async fn test_project_lookup() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{}/projects/g%2Fp", API),
            serde_json::json!({ "id": 99, "default_branch": "trunk" }),
        );
        let api = GitLabApi::new(API, None, Arc::new(transport));

        let project = api.project("g/p", None).await.unwrap();
        assert_eq!(project.id, 99);
        assert_eq!(project.default_branch.as_deref(), Some("trunk"));
    }

    #[tokio::test]
    async fn test_project_lookup_not_found_and_unauthorized() {
        let transport = MockTransport::new();
        let url = format!("{}/projects/g%2Fp", API);
        transport.push_status(&url, 404);
        transport.push_status(&url, 401);
        let api = GitLabApi::new(API, None, Arc::new(transport));

        let err = api.project("g/p", None).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("g/p"));

        let err = api.project("g/p", None).await.unwrap_err();
        match err {
            ReaderError::Authorization { status, path } => {
                assert_eq!(status, 401);
                assert_eq!(path, "/projects/g%2Fp");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upstream_error_carries_body() {
        let transport = MockTransport::new();
        transport.push_response(
            commits_url(API, 3, "main", None),
            HttpResponse {
                status: 500,
                headers: Vec::new(),
                body: b"boom".to_vec(),
            },
        );
        let api = GitLabApi::new(API, None, Arc::new(transport));

        let err = api.commits(3, "main", None, None).await.unwrap_err();
        assert!(matches!(
            err,
            ReaderError::Upstream { status: 500, ref body, .. } if body == "boom"
        ));
    }

    #[tokio::test]
    async fn test_malformed_json_is_reported() {
        let transport = MockTransport::new();
        transport.push_response(
            format!("{}/projects/g%2Fp", API),
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: b"<html>".to_vec(),
            },
        );
        let api = GitLabApi::new(API, None, Arc::new(transport));
        assert!(matches!(
            api.project("g/p", None).await,
            Err(ReaderError::Json(_))
        ));
    }
}
