//! Conditional fetching with ETags and modification times.
//!
//! Two mechanisms are used:
//!
//! - Single files are revalidated by the server: the caller's ETag and
//!   timestamp are sent as `If-None-Match` / `If-Modified-Since` and a
//!   `304 Not Modified` short-circuits the read.
//! - Trees have no server-side validator, so [`ConditionalFetchGuard`] asks
//!   the commits API for the latest commit touching the ref (and sub-path)
//!   and compares it against the caller's token before any archive download.

use chrono::{DateTime, Utc};

use crate::client::GitLabApi;
use crate::error::Result;
use crate::http::HttpRequest;
use crate::types::GitLabCommit;

/// Outcome of a freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// The caller's copy is current; skip the download.
    NotModified,
    /// The caller's copy is stale or unknown; download and tag the result.
    Modified {
        /// Latest commit id, used as the tree ETag.
        current_etag: Option<String>,
        /// Commit date of the latest commit.
        last_modified_at: Option<DateTime<Utc>>,
    },
}

impl Freshness {
    /// Returns true if the caller's copy is current.
    #[inline]
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Freshness::NotModified)
    }

    /// ETag to report for a fresh download.
    pub fn current_etag(&self) -> Option<&str> {
        match self {
            Freshness::NotModified => None,
            Freshness::Modified { current_etag, .. } => current_etag.as_deref(),
        }
    }
}

/// Caller-supplied validators.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validators<'a> {
    pub etag: Option<&'a str>,
    pub last_modified_after: Option<DateTime<Utc>>,
}

/// Decide freshness from the most recent commit.
///
/// With no commit there is nothing to compare against, so the caller must
/// fetch. A mismatching ETag never yields [`Freshness::NotModified`].
pub fn evaluate(latest: Option<&GitLabCommit>, validators: Validators<'_>) -> Freshness {
    let Some(commit) = latest else {
        return Freshness::Modified {
            current_etag: None,
            last_modified_at: None,
        };
    };

    if validators.etag == Some(commit.id.as_str()) {
        return Freshness::NotModified;
    }

    if let (Some(after), Some(committed)) = (validators.last_modified_after, commit.committed_date)
        && committed <= after
    {
        return Freshness::NotModified;
    }

    Freshness::Modified {
        current_etag: Some(commit.id.clone()),
        last_modified_at: commit.committed_date,
    }
}

/// Pre-download freshness check for repository trees.
pub struct ConditionalFetchGuard<'a> {
    api: &'a GitLabApi,
}

impl<'a> ConditionalFetchGuard<'a> {
    pub fn new(api: &'a GitLabApi) -> Self {
        Self { api }
    }

    /// Look up the latest commit for `git_ref` (restricted to `path` when
    /// given) and compare it with the caller's validators.
    pub async fn check(
        &self,
        project_id: u64,
        git_ref: &str,
        path: Option<&str>,
        validators: Validators<'_>,
        token: Option<&str>,
    ) -> Result<Freshness> {
        let commits = self.api.commits(project_id, git_ref, path, token).await?;
        if commits.is_empty() {
            tracing::debug!(project_id, git_ref, ?path, "No commits found, cannot check freshness");
        }
        Ok(evaluate(commits.first(), validators))
    }
}

/// Attach `If-None-Match` / `If-Modified-Since` for server-side revalidation.
pub fn with_conditional_headers(mut request: HttpRequest, validators: Validators<'_>) -> HttpRequest {
    if let Some(etag) = validators.etag {
        request = request.with_header("If-None-Match", etag);
    }
    if let Some(after) = validators.last_modified_after {
        request = request.with_header("If-Modified-Since", format_http_date(after));
    }
    request
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date header. Unparseable values are ignored.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
