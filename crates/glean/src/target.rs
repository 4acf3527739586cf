//! Parsing GitLab web URLs into structured targets.
//!
//! GitLab paths do not syntactically separate groups, subgroups and the
//! project: `group/subgroup/project/-/blob/main/a.txt` and
//! `group/project/-/blob/main/a.txt` look alike. The repository path is
//! therefore everything before the first route marker segment, and the ref
//! plus file path is everything after it.
//!
//! Recognized markers:
//!
//! | Marker               | Route                      |
//! |----------------------|----------------------------|
//! | `-/blob`             | [`RouteKind::ScopedBlob`]  |
//! | `-/tree`             | [`RouteKind::Tree`]        |
//! | `-/jobs/artifacts`   | [`RouteKind::JobArtifact`] |
//! | `blob`               | [`RouteKind::UnscopedBlob`]|
//! | `tree`               | [`RouteKind::Tree`]        |
//!
//! A `-` segment is looked for first. Without one, the first `blob` or
//! `tree` segment wins, so a namespace or project literally named `blob`
//! cannot be expressed with the legacy unscoped form. A path with no marker
//! is a bare repository root.

use std::fmt;

use url::Url;

use crate::config::GitLabIntegrationConfig;
use crate::error::{ReaderError, Result};

/// Minimum number of segments in a repository path (`namespace/project`).
const MIN_REPOSITORY_SEGMENTS: usize = 2;

/// The route shape a URL was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    /// `.../-/blob/<ref>/<path>`
    ScopedBlob,
    /// `.../blob/<ref>/<path>` (legacy form)
    UnscopedBlob,
    /// `.../-/jobs/artifacts/<ref>/raw/<path>?job=<name>`
    JobArtifact,
    /// `.../tree/<ref>/<path>`, `.../-/tree/...` or a bare repository root.
    Tree,
}

impl RouteKind {
    /// True for routes that address a single file.
    #[inline]
    pub fn is_single_file(self) -> bool {
        !matches!(self, RouteKind::Tree)
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RouteKind::ScopedBlob => "scoped blob",
            RouteKind::UnscopedBlob => "unscoped blob",
            RouteKind::JobArtifact => "job artifact",
            RouteKind::Tree => "tree",
        };
        f.write_str(name)
    }
}

/// A parsed GitLab URL. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitLabTarget {
    /// The URL as given.
    pub url: String,
    /// Host (with port when non-default) the URL points at.
    pub host: String,
    /// API root of the matching integration.
    pub api_base_url: String,
    /// Namespace segments in order, excluding the project.
    pub group_path: Vec<String>,
    /// Full `group/.../project` path.
    pub repository_path: String,
    /// Branch, tag or commit. `None` means the default branch.
    pub git_ref: Option<String>,
    /// Path inside the repository.
    pub file_path: Option<String>,
    pub route_kind: RouteKind,
    /// Job name for artifact routes.
    pub job: Option<String>,
    /// Raw query string of the input URL.
    pub query: Option<String>,
}

impl GitLabTarget {
    /// Project slug (last segment of the repository path).
    pub fn project(&self) -> &str {
        self.repository_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.repository_path)
    }
}

/// Parse `url` against the integration that serves its host.
pub fn parse_target(url: &str, integration: &GitLabIntegrationConfig) -> Result<GitLabTarget> {
    parse_with(url, integration, false)
}

/// Parse `url` as a directory in the repository.
///
/// Blob routes are reinterpreted as trees and may omit the file path, so
/// `.../-/blob/main/docs` and `.../-/blob/main` both name directories.
/// Job artifact routes have no tree form.
pub fn parse_tree_target(
    url: &str,
    integration: &GitLabIntegrationConfig,
) -> Result<GitLabTarget> {
    parse_with(url, integration, true)
}

fn parse_with(
    url: &str,
    integration: &GitLabIntegrationConfig,
    as_tree: bool,
) -> Result<GitLabTarget> {
    let parsed = Url::parse(url).map_err(|e| ReaderError::parse(url, e.to_string()))?;

    let host = authority(&parsed).ok_or_else(|| ReaderError::parse(url, "URL has no host"))?;
    if !host.eq_ignore_ascii_case(&integration.host) {
        return Err(ReaderError::parse(
            url,
            format!("host {} is not served by integration {}", host, integration.host),
        ));
    }

    let relative = integration.relative_path()?;
    let path = parsed.path();
    let path = match path.strip_prefix(relative.as_str()) {
        Some(rest) if relative.is_empty() || rest.is_empty() || rest.starts_with('/') => rest,
        _ => {
            return Err(ReaderError::parse(
                url,
                format!("path is outside the instance base path {}", relative),
            ));
        }
    };

    let segments = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|d| d.into_owned())
                .map_err(|e| ReaderError::parse(url, e.to_string()))
        })
        .collect::<Result<Vec<String>>>()?;

    let mut route = find_route(&segments).map_err(|reason| ReaderError::parse(url, reason))?;
    if as_tree {
        match route.kind {
            RouteKind::ScopedBlob | RouteKind::UnscopedBlob => route.kind = RouteKind::Tree,
            RouteKind::JobArtifact => {
                return Err(ReaderError::parse(url, "job artifacts cannot be listed"));
            }
            RouteKind::Tree => {}
        }
    }
    let repo_segments = &segments[..route.marker_at];
    let rest = &segments[route.rest_at..];

    let mut repo_segments: Vec<String> = repo_segments.to_vec();
    if route.marker_at == segments.len()
        && let Some(last) = repo_segments.last_mut()
        && let Some(stripped) = last.strip_suffix(".git")
    {
        *last = stripped.to_string();
    }

    let (git_ref, file_path, job) = match route.kind {
        RouteKind::ScopedBlob | RouteKind::UnscopedBlob => {
            let (git_ref, file_path) = split_ref_and_path(rest);
            let git_ref = git_ref.ok_or_else(|| ReaderError::parse(url, "blob URL has no ref"))?;
            let file_path =
                file_path.ok_or_else(|| ReaderError::parse(url, "blob URL has no file path"))?;
            (Some(git_ref), Some(file_path), None)
        }
        RouteKind::JobArtifact => {
            let (git_ref, raw_path) = split_ref_and_path(rest);
            let git_ref =
                git_ref.ok_or_else(|| ReaderError::parse(url, "artifact URL has no ref"))?;
            let file_path = raw_path
                .as_deref()
                .and_then(|p| p.strip_prefix("raw/"))
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ReaderError::parse(url, "artifact URL must contain raw/<path>"))?;
            let job = parsed
                .query_pairs()
                .find(|(k, _)| k == "job")
                .map(|(_, v)| v.into_owned())
                .ok_or_else(|| ReaderError::parse(url, "artifact URL has no job parameter"))?;
            (Some(git_ref), Some(file_path), Some(job))
        }
        RouteKind::Tree => {
            let (git_ref, file_path) = split_ref_and_path(rest);
            (git_ref, file_path, None)
        }
    };

    let repository_path = repo_segments.join("/");
    let group_path = repo_segments[..repo_segments.len() - 1].to_vec();

    Ok(GitLabTarget {
        url: url.to_string(),
        host,
        api_base_url: integration.api_base_url(),
        group_path,
        repository_path,
        git_ref,
        file_path,
        route_kind: route.kind,
        job,
        query: parsed.query().map(str::to_string),
    })
}

struct Route {
    kind: RouteKind,
    /// Index of the first marker segment (end of repository path).
    marker_at: usize,
    /// Index of the first segment after the marker.
    rest_at: usize,
}

fn find_route(segments: &[String]) -> std::result::Result<Route, String> {
    let at = |i: usize| segments.get(i).map(String::as_str);
    let unscoped = |i: usize| match at(i) {
        Some("blob") => Some(RouteKind::UnscopedBlob),
        Some("tree") => Some(RouteKind::Tree),
        _ => None,
    };
    let first_unscoped = (MIN_REPOSITORY_SEGMENTS..segments.len()).find(|&i| unscoped(i).is_some());

    // Namespaces cannot be named `-`, so a scoped route wins over any earlier
    // segment that merely looks like an unscoped marker.
    for i in (MIN_REPOSITORY_SEGMENTS..segments.len()).filter(|&i| at(i) == Some("-")) {
        let scoped = match (at(i + 1), at(i + 2)) {
            (Some("blob"), _) => Some((RouteKind::ScopedBlob, i + 2)),
            (Some("tree"), _) => Some((RouteKind::Tree, i + 2)),
            (Some("jobs"), Some("artifacts")) => Some((RouteKind::JobArtifact, i + 3)),
            _ => None,
        };
        match scoped {
            Some((kind, rest_at)) => {
                return Ok(Route {
                    kind,
                    marker_at: i,
                    rest_at,
                });
            }
            // A `-` directory inside an unscoped file path.
            None if first_unscoped.is_some_and(|m| m < i) => {}
            None => {
                return Err(format!("unsupported route -/{}", at(i + 1).unwrap_or_default()));
            }
        }
    }

    if let Some(i) = first_unscoped
        && let Some(kind) = unscoped(i)
    {
        return Ok(Route {
            kind,
            marker_at: i,
            rest_at: i + 1,
        });
    }

    if segments.len() >= MIN_REPOSITORY_SEGMENTS {
        Ok(Route {
            kind: RouteKind::Tree,
            marker_at: segments.len(),
            rest_at: segments.len(),
        })
    } else {
        Err("path has no repository".to_string())
    }
}

/// First segment is the ref, the remainder joined is the path.
fn split_ref_and_path(rest: &[String]) -> (Option<String>, Option<String>) {
    match rest.split_first() {
        None => (None, None),
        Some((git_ref, path)) if path.is_empty() => (Some(git_ref.clone()), None),
        Some((git_ref, path)) => (Some(git_ref.clone()), Some(path.join("/"))),
    }
}

pub(crate) fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
