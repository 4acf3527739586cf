//! Error types for GitLab URL reading.

use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur when resolving or reading a GitLab URL.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The URL does not match any recognized GitLab route shape.
    #[error("Unable to parse GitLab URL {url}: {reason}")]
    Parse { url: String, reason: String },

    /// Repository, project, branch or file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The resource has not changed since the caller's ETag or timestamp.
    ///
    /// This is a control-flow signal, not a failure.
    #[error("Not modified: {0}")]
    NotModified(String),

    /// The API rejected the credentials (401 or 403).
    #[error("Authorization failed ({status}) for {path}")]
    Authorization { status: u16, path: String },

    /// Any other non-success API response.
    #[error("GitLab API error ({status}) for {path}: {body}")]
    Upstream {
        status: u16,
        path: String,
        body: String,
    },

    /// The transport failed before a response was received.
    #[error("HTTP error: {0}")]
    Transport(#[from] HttpError),

    /// An API response could not be deserialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A downloaded archive could not be decoded or written.
    #[error("Archive error: {0}")]
    Archive(String),

    /// A search pattern is not a valid glob.
    #[error("Invalid glob pattern {pattern}: {message}")]
    Glob { pattern: String, message: String },

    /// No integration is configured for the URL's host.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ReaderError {
    /// Create a parse error for `url`.
    #[inline]
    pub fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a not modified signal.
    #[inline]
    pub fn not_modified(resource: impl Into<String>) -> Self {
        Self::NotModified(resource.into())
    }

    /// Create an archive error.
    #[inline]
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive(message.into())
    }

    /// Classify a non-success HTTP status and response body into a typed error.
    ///
    /// `path` is the failing request path, kept for diagnosis. 404 maps to
    /// [`ReaderError::NotFound`] with `what` as the missing resource.
    pub fn from_status(status: u16, path: &str, body: &str, what: &str) -> Self {
        match status {
            304 => Self::NotModified(what.to_string()),
            401 | 403 => Self::Authorization {
                status,
                path: path.to_string(),
            },
            404 => Self::NotFound(what.to_string()),
            _ => Self::Upstream {
                status,
                path: path.to_string(),
                body: body.to_string(),
            },
        }
    }

    /// Returns true for the conditional-fetch short-circuit.
    #[inline]
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::NotModified(_))
    }

    /// Returns true when the resource does not exist.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for ReaderError {
    fn from(err: std::io::Error) -> Self {
        Self::Archive(err.to_string())
    }
}

impl From<zip::result::ZipError> for ReaderError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;
