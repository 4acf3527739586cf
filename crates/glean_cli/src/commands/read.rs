use std::io::Write;

use glean::{GitLabUrlReaders, ReadUrlOptions};

use super::shared::{FetchArgs, SinceArg, reader_for, report_etag, unless_not_modified};

/// Write the raw bytes of a blob or job artifact to stdout.
pub(crate) async fn handle_read(
    readers: &GitLabUrlReaders,
    args: FetchArgs,
    since: SinceArg,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = reader_for(readers, &args.url)?;
    let options = ReadUrlOptions {
        etag: args.etag,
        last_modified_after: since.since,
        token: args.token,
    };

    let Some(response) = unless_not_modified(reader.read_url(&args.url, &options).await, &args.url)?
    else {
        return Ok(());
    };

    report_etag(response.etag.as_deref());
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(response.buffer())?;
    stdout.flush()?;
    Ok(())
}
