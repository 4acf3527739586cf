//! Tree retrieval: archive download, extraction and sub-path scoping.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};

use crate::archive::{self, ArchiveEntry, ArchiveFormat};
use crate::conditional::{
    ConditionalFetchGuard, Freshness, Validators, parse_http_date, with_conditional_headers,
};
use crate::error::{ReaderError, Result};
use crate::http::HttpResponse;
use crate::reader::{PathFilter, ReadTreeOptions, ReadUrlResponse};
use crate::resolver::UrlResolver;
use crate::target::GitLabTarget;

/// One file of a retrieved tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    path: String,
    content: Arc<[u8]>,
}

impl TreeNode {
    pub fn new(path: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// POSIX path relative to the tree root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Shared handle to the content; cloning does not copy the bytes.
    pub fn content_arc(&self) -> Arc<[u8]> {
        Arc::clone(&self.content)
    }
}

/// A downloaded repository archive. Owned by one retrieval.
#[derive(Debug, Clone)]
pub struct ArchiveHandle {
    pub bytes: Vec<u8>,
    /// Latest commit at download time; becomes the tree ETag.
    pub commit_id: Option<String>,
    pub content_type: Option<String>,
    /// Suggested filename from `Content-Disposition`.
    pub filename: Option<String>,
    pub git_ref: String,
}

impl ArchiveHandle {
    pub fn from_response(
        response: HttpResponse,
        git_ref: impl Into<String>,
        commit_id: Option<String>,
    ) -> Self {
        let content_type = response.header("content-type").map(str::to_string);
        let filename = response
            .header("content-disposition")
            .and_then(archive::disposition_filename)
            .map(str::to_string);
        Self {
            bytes: response.body,
            commit_id,
            content_type,
            filename,
            git_ref: git_ref.into(),
        }
    }

    pub fn format(&self) -> Result<ArchiveFormat> {
        let content_type = self.content_type.as_deref();
        let filename = self.filename.as_deref();
        ArchiveFormat::detect(content_type, filename, &self.bytes)
            .ok_or_else(|| archive::unknown_format(content_type, filename))
    }

    pub fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        archive::decode(self.format()?, &self.bytes)
    }
}

struct PendingArchive {
    handle: ArchiveHandle,
    scope: Option<String>,
    filter: Option<PathFilter>,
}

/// Result of [`crate::GitLabUrlReader::read_tree`].
///
/// Archive members are decoded on first access and the extracted nodes are
/// shared by [`files`](Self::files) and [`dir`](Self::dir).
pub struct ReadTreeResponse {
    pending: Option<PendingArchive>,
    nodes: OnceLock<Vec<TreeNode>>,
    /// Commit id of the tree, when known.
    pub etag: Option<String>,
    pub last_modified_at: Option<DateTime<Utc>>,
    /// Ref the tree was read at, after default branch resolution.
    pub git_ref: Option<String>,
}

impl ReadTreeResponse {
    fn from_archive(
        handle: ArchiveHandle,
        scope: Option<String>,
        filter: Option<PathFilter>,
        last_modified_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            etag: handle.commit_id.clone(),
            last_modified_at,
            git_ref: Some(handle.git_ref.clone()),
            pending: Some(PendingArchive {
                handle,
                scope,
                filter,
            }),
            nodes: OnceLock::new(),
        }
    }

    /// Build a response over already materialized nodes.
    pub fn from_nodes(
        nodes: Vec<TreeNode>,
        etag: Option<String>,
        last_modified_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            pending: None,
            nodes: OnceLock::from(nodes),
            etag,
            last_modified_at,
            git_ref: None,
        }
    }

    /// Files in archive member order.
    pub fn files(&self) -> Result<&[TreeNode]> {
        if let Some(nodes) = self.nodes.get() {
            return Ok(nodes);
        }
        let nodes = match &self.pending {
            Some(pending) => extract_nodes(
                pending.handle.entries()?,
                pending.scope.as_deref(),
                pending.filter.as_ref(),
            ),
            None => Vec::new(),
        };
        Ok(self.nodes.get_or_init(|| nodes))
    }

    /// Write every file under `target_dir` and return the directory.
    ///
    /// Without a target a fresh temporary directory is created and left in
    /// place for the caller to remove.
    pub async fn dir(&self, target_dir: Option<&Path>) -> Result<PathBuf> {
        let nodes = self.files()?;
        let root = match target_dir {
            Some(dir) => dir.to_path_buf(),
            None => tempfile::Builder::new().prefix("glean-").tempdir()?.keep(),
        };

        tokio::fs::create_dir_all(&root).await?;
        for node in nodes {
            let dest = root.join(node.path());
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&dest, node.content()).await?;
        }
        tracing::debug!(dir = %root.display(), files = nodes.len(), "Tree written to disk");
        Ok(root)
    }
}

impl fmt::Debug for ReadTreeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadTreeResponse")
            .field("etag", &self.etag)
            .field("last_modified_at", &self.last_modified_at)
            .field("git_ref", &self.git_ref)
            .field("extracted", &self.nodes.get().map(Vec::len))
            .finish()
    }
}

/// Downloads trees and single files for parsed targets.
pub struct TreeRetriever<'a> {
    resolver: &'a UrlResolver,
}

impl<'a> TreeRetriever<'a> {
    pub fn new(resolver: &'a UrlResolver) -> Self {
        Self { resolver }
    }

    /// Retrieve `target` as a tree.
    ///
    /// Blob and artifact targets yield a single node named after the file.
    pub async fn fetch(
        &self,
        target: &GitLabTarget,
        options: &ReadTreeOptions,
    ) -> Result<ReadTreeResponse> {
        let validators = Validators {
            etag: options.etag.as_deref(),
            last_modified_after: options.last_modified_after,
        };
        let token = options.token.as_deref();

        if target.route_kind.is_single_file() {
            return self.fetch_single(target, validators, options.filter.as_ref(), token).await;
        }

        let api = self.resolver.api();
        let project_id = self.resolver.project_id(target, token).await?;
        let git_ref = self.resolve_ref(target, project_id, token).await?;
        let scope = target.file_path.as_deref();

        let freshness = ConditionalFetchGuard::new(api)
            .check(project_id, &git_ref, scope, validators, token)
            .await?;
        let (commit_id, last_modified_at) = match freshness {
            Freshness::NotModified => return Err(ReaderError::not_modified(&target.url)),
            Freshness::Modified {
                current_etag,
                last_modified_at,
            } => (current_etag, last_modified_at),
        };

        let response = api.archive(project_id, &git_ref, scope, token).await?;
        tracing::debug!(
            project_id,
            git_ref = %git_ref,
            bytes = response.body.len(),
            "Archive downloaded"
        );
        let handle = ArchiveHandle::from_response(response, git_ref, commit_id);

        Ok(ReadTreeResponse::from_archive(
            handle,
            scope.map(str::to_string),
            options.filter.clone(),
            last_modified_at,
        ))
    }

    /// Read a blob or job artifact with server-side revalidation.
    pub async fn read_file(
        &self,
        target: &GitLabTarget,
        validators: Validators<'_>,
        token: Option<&str>,
    ) -> Result<ReadUrlResponse> {
        let api = self.resolver.api();
        let url = self.resolver.file_fetch_url(target, token).await?;
        let request = with_conditional_headers(api.request(url, token), validators);
        let response = api.send_ok(request, &target.url).await?;

        let etag = response.header("etag").map(str::to_string);
        let last_modified_at = response.header("last-modified").and_then(parse_http_date);
        Ok(ReadUrlResponse::new(response.body, etag, last_modified_at))
    }

    async fn fetch_single(
        &self,
        target: &GitLabTarget,
        validators: Validators<'_>,
        filter: Option<&PathFilter>,
        token: Option<&str>,
    ) -> Result<ReadTreeResponse> {
        let file = self.read_file(target, validators, token).await?;
        let name = target
            .file_path
            .as_deref()
            .and_then(|p| p.rsplit('/').next())
            .unwrap_or_default();

        let mut nodes = Vec::with_capacity(1);
        if filter.is_none_or(|keep| keep(name)) {
            nodes.push(TreeNode::new(name, file.buffer_arc()));
        }
        let mut response = ReadTreeResponse::from_nodes(nodes, file.etag, file.last_modified_at);
        response.git_ref = target.git_ref.clone();
        Ok(response)
    }

    async fn resolve_ref(
        &self,
        target: &GitLabTarget,
        project_id: u64,
        token: Option<&str>,
    ) -> Result<String> {
        if let Some(git_ref) = &target.git_ref {
            return Ok(git_ref.clone());
        }

        let branch_not_found =
            || ReaderError::not_found(format!("{} (branch not found)", target.repository_path));
        let project = self
            .resolver
            .api()
            .project_by_id(project_id, token)
            .await
            .map_err(|e| if e.is_not_found() { branch_not_found() } else { e })?;
        let branch = project.default_branch.ok_or_else(branch_not_found)?;
        tracing::debug!(project_id, branch = %branch, "Resolved default branch");
        Ok(branch)
    }
}

/// Turn archive members into tree nodes.
///
/// The single top-level directory GitLab wraps archives in is removed, then
/// nodes are rebased onto `scope` (anything outside it is dropped) and
/// passed through `filter`. Member order is preserved.
pub(crate) fn extract_nodes(
    entries: Vec<ArchiveEntry>,
    scope: Option<&str>,
    filter: Option<&PathFilter>,
) -> Vec<TreeNode> {
    let root = common_root(&entries).map(str::to_string);
    let scope = scope
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty());

    entries
        .into_iter()
        .filter(|entry| !entry.is_directory)
        .filter_map(|entry| {
            let name = entry.name.trim_start_matches("./");
            let relative = match root.as_deref() {
                Some(root) => name.strip_prefix(root)?.strip_prefix('/')?,
                None => name,
            };
            let relative = match scope {
                Some(scope) => relative.strip_prefix(scope)?.strip_prefix('/')?,
                None => relative,
            };
            let relative = relative.trim_start_matches('/');
            if relative.is_empty() || relative.split('/').any(|s| s == "..") {
                return None;
            }
            if let Some(keep) = filter
                && !keep(relative)
            {
                return None;
            }
            Some(TreeNode::new(relative, entry.content))
        })
        .collect()
}

/// The first path segment shared by every member, if all live under one.
fn common_root(entries: &[ArchiveEntry]) -> Option<&str> {
    let mut root: Option<&str> = None;
    for entry in entries {
        let name = entry.name.trim_start_matches("./");
        let (first, rest) = name.split_once('/')?;
        if rest.is_empty() && !entry.is_directory {
            return None;
        }
        match root {
            None => root = Some(first),
            Some(existing) if existing == first => {}
            Some(_) => return None,
        }
    }
    root
}
