//! Glob search rooted at a GitLab URL.
//!
//! `https://gitlab.com/g/p/-/blob/main/docs/**/*.md` is split at the last
//! `/` before the first glob character: the prefix names the tree to fetch
//! and the remainder is matched against paths relative to it.

use std::sync::Arc;

use glob::{MatchOptions, Pattern};

use crate::conditional::Validators;
use crate::config::GitLabIntegrationConfig;
use crate::error::{ReaderError, Result};
use crate::reader::{ReadTreeOptions, SearchOptions};
use crate::resolver::UrlResolver;
use crate::target::{GitLabTarget, parse_tree_target};
use crate::tree::TreeRetriever;

// `?` is absent: in a URL it always starts the query string.
const GLOB_CHARS: [char; 3] = ['*', '[', '{'];

// `*` stays within one directory; `**` spans directories.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// One matched file.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Web URL of the file.
    pub url: String,
    content: Arc<[u8]>,
}

impl SearchResult {
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

/// Result of [`crate::GitLabUrlReader::search`].
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub files: Vec<SearchResult>,
    pub etag: Option<String>,
}

/// Split `url` into the static tree URL and the glob relative to it.
///
/// Only the path is scanned, so query parameters such as an artifact's
/// `?job=build` never turn a literal URL into a search. The raw text is
/// used rather than [`url::Url::path`], which would percent-encode braces.
/// Returns `None` when the path contains no glob characters.
pub fn split_glob(url: &str) -> Option<(&str, &str)> {
    let path = url.find(['?', '#']).map_or(url, |end| &url[..end]);
    let first = path.find(GLOB_CHARS)?;
    let slash = path[..first].rfind('/')?;
    Some((&path[..slash], &path[slash + 1..]))
}

/// Web URL prefix under which the files of `target` live as blobs.
fn blob_root(integration: &GitLabIntegrationConfig, target: &GitLabTarget, git_ref: &str) -> String {
    let mut root = format!(
        "{}/{}/-/blob/{}",
        integration.base_url(),
        target.repository_path,
        git_ref
    );
    if let Some(scope) = target.file_path.as_deref().map(|p| p.trim_matches('/'))
        && !scope.is_empty()
    {
        root.push('/');
        root.push_str(scope);
    }
    root
}

/// A compiled glob, with `{a,b}` alternatives expanded up front.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    patterns: Vec<Pattern>,
}

impl GlobMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let patterns = expand_braces(pattern)
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| ReaderError::Glob {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(path, MATCH_OPTIONS))
    }
}

/// Expand the first top-level `{...}` group and recurse.
///
/// Unbalanced braces are left for the glob compiler to reject.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0usize;
    let mut close = None;
    let mut splits = Vec::new();
    for (i, c) in pattern[open..].char_indices() {
        let i = open + i;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            ',' if depth == 1 => splits.push(i),
            _ => {}
        }
    }
    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut bounds = vec![open];
    bounds.extend(splits);
    bounds.push(close);

    bounds
        .windows(2)
        .flat_map(|w| {
            let alternative = &pattern[w[0] + 1..w[1]];
            expand_braces(&format!("{}{}{}", prefix, alternative, suffix))
        })
        .collect()
}

/// Runs glob searches through one resolver.
pub struct SearchEngine<'a> {
    resolver: &'a UrlResolver,
}

impl<'a> SearchEngine<'a> {
    pub fn new(resolver: &'a UrlResolver) -> Self {
        Self { resolver }
    }

    /// Find every file under the URL's static prefix matching its glob.
    ///
    /// A URL without glob characters is read directly and returned as the
    /// only result, under its original URL.
    pub async fn search(&self, url: &str, options: &SearchOptions) -> Result<SearchResponse> {
        let retriever = TreeRetriever::new(self.resolver);
        let token = options.token.as_deref();

        let Some((root, pattern)) = split_glob(url) else {
            let target = self.resolver.parse(url)?;
            let validators = Validators {
                etag: options.etag.as_deref(),
                last_modified_after: None,
            };
            let file = retriever.read_file(&target, validators, token).await?;
            return Ok(SearchResponse {
                files: vec![SearchResult {
                    url: url.to_string(),
                    content: file.buffer_arc(),
                }],
                etag: file.etag,
            });
        };

        let matcher = GlobMatcher::new(pattern)?;
        let target = parse_tree_target(root, self.resolver.integration())?;
        let tree_options = ReadTreeOptions {
            etag: options.etag.clone(),
            token: options.token.clone(),
            ..Default::default()
        };
        let tree = retriever.fetch(&target, &tree_options).await?;

        let git_ref = tree.git_ref.as_deref().unwrap_or_default();
        let root = blob_root(self.resolver.integration(), &target, git_ref);
        let files: Vec<SearchResult> = tree
            .files()?
            .iter()
            .filter(|node| matcher.matches(node.path()))
            .map(|node| SearchResult {
                url: format!("{}/{}", root, node.path()),
                content: node.content_arc(),
            })
            .collect();
        tracing::debug!(pattern, matches = files.len(), "Search complete");

        Ok(SearchResponse {
            files,
            etag: tree.etag.clone(),
        })
    }
}
