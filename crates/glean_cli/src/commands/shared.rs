use chrono::{DateTime, Utc};
use console::Term;
use glean::{GitLabUrlReader, GitLabUrlReaders, ReaderError};

/// Flags shared by `read`, `tree` and `search`.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct FetchArgs {
    /// GitLab web URL
    pub(crate) url: String,

    /// ETag (or commit id) from a previous read; unchanged content is skipped
    #[arg(short, long)]
    pub(crate) etag: Option<String>,

    /// Token for this call, overriding the configured one
    #[arg(short, long, env = "GLEAN_TOKEN", hide_env_values = true)]
    pub(crate) token: Option<String>,
}

/// `--since` for commands that support modification-time checks.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SinceArg {
    /// Skip the download unless modified after this RFC 3339 timestamp
    #[arg(short, long, value_parser = parse_since)]
    pub(crate) since: Option<DateTime<Utc>>,
}

fn parse_since(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

pub(crate) fn reader_for<'a>(
    readers: &'a GitLabUrlReaders,
    url: &str,
) -> Result<&'a GitLabUrlReader, ReaderError> {
    let reader = readers.reader_for(url)?;
    tracing::debug!(reader = %reader, "Selected reader");
    Ok(reader)
}

/// Turn the not-modified signal into a notice; pass everything else on.
///
/// Returns `Ok(None)` when the caller should stop quietly.
pub(crate) fn unless_not_modified<T>(
    result: Result<T, ReaderError>,
    url: &str,
) -> Result<Option<T>, ReaderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_modified() => {
            let _ = Term::stderr().write_line(&format!("Not modified: {}", url));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

pub(crate) fn report_etag(etag: Option<&str>) {
    if let Some(etag) = etag {
        let _ = Term::stderr().write_line(&format!("ETag: {}", etag));
    }
}
