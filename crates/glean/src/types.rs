//! GitLab API data types.
//!
//! Only the fields the reader uses are declared; everything else in the
//! responses is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Project metadata from `GET /projects/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabProject {
    /// Numeric project ID.
    pub id: u64,
    /// Default branch name (absent for empty repositories).
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// Commit summary from `GET /projects/:id/repository/commits`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabCommit {
    /// Full commit SHA.
    pub id: String,
    /// When the commit was committed.
    #[serde(default)]
    pub committed_date: Option<DateTime<Utc>>,
}
