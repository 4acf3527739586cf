use glean::{GitLabUrlReaders, SearchOptions};

use super::shared::{FetchArgs, reader_for, report_etag, unless_not_modified};

/// Print the URL of every file matching the glob.
pub(crate) async fn handle_search(
    readers: &GitLabUrlReaders,
    args: FetchArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = reader_for(readers, &args.url)?;
    let options = SearchOptions {
        etag: args.etag,
        token: args.token,
    };

    let Some(response) = unless_not_modified(reader.search(&args.url, &options).await, &args.url)?
    else {
        return Ok(());
    };

    report_etag(response.etag.as_deref());
    if response.files.is_empty() {
        tracing::info!(url = %args.url, "No files matched");
    }
    for file in &response.files {
        println!("{}", file.url);
    }
    Ok(())
}
