//! Glean - read files and trees from GitLab by web URL.
//!
//! Given any GitLab web URL (blob, tree, job artifact, scoped or legacy,
//! gitlab.com or self-hosted under a relative path) the reader resolves the
//! matching REST endpoint, caches the path → project id lookup, and returns
//! file bytes or an extracted repository tree. ETags and modification times
//! are honored so unchanged content is never downloaded twice.
//!
//! # Features
//!
//! - `reqwest` (default) - Provides [`http::reqwest_transport::ReqwestTransport`]
//!   and the transport-less constructors [`GitLabUrlReader::new`] and
//!   [`GitLabUrlReaders::from_config`].
//!
//! # Example
//!
//! ```ignore
//! use glean::{GitLabIntegrationConfig, GitLabUrlReader, ReadTreeOptions, ReaderOptions};
//!
//! let reader = GitLabUrlReader::new(GitLabIntegrationConfig::new("gitlab.com"), ReaderOptions::default())?;
//! let tree = reader
//!     .read_tree("https://gitlab.com/group/project/-/tree/main/docs", &ReadTreeOptions::default())
//!     .await?;
//! for file in tree.files()? {
//!     println!("{} ({} bytes)", file.path(), file.content().len());
//! }
//! ```

pub mod archive;
pub mod cache;
pub mod client;
pub mod conditional;
pub mod config;
pub mod error;
pub mod http;
pub mod reader;
pub mod resolver;
pub mod search;
pub mod target;
pub mod tree;
pub mod types;

pub use cache::{CacheKey, LruTtlCache, ProjectIdCache, ProjectIdCacheEntry};
pub use config::{GITLAB_COM_HOST, GitLabIntegrationConfig, ReaderOptions};
pub use error::{ReaderError, Result};
pub use http::{HttpError, HttpRequest, HttpResponse, HttpTransport};
pub use reader::{
    GitLabUrlReader, GitLabUrlReaders, PathFilter, ReadTreeOptions, ReadUrlOptions,
    ReadUrlResponse, SearchOptions,
};
pub use search::{SearchResponse, SearchResult};
pub use target::{GitLabTarget, RouteKind, parse_target};
pub use tree::{ReadTreeResponse, TreeNode};
