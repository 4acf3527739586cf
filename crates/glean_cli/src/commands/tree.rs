use std::path::PathBuf;

use console::style;
use glean::{GitLabUrlReaders, ReadTreeOptions};

use super::shared::{FetchArgs, SinceArg, reader_for, report_etag, unless_not_modified};

/// List a tree, or write it to `out` when given.
pub(crate) async fn handle_tree(
    readers: &GitLabUrlReaders,
    args: FetchArgs,
    since: SinceArg,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = reader_for(readers, &args.url)?;
    let options = ReadTreeOptions {
        etag: args.etag,
        last_modified_after: since.since,
        token: args.token,
        filter: None,
    };

    let Some(tree) = unless_not_modified(reader.read_tree(&args.url, &options).await, &args.url)?
    else {
        return Ok(());
    };
    report_etag(tree.etag.as_deref());

    match out {
        Some(dir) => {
            let written = tree.dir(Some(dir.as_path())).await?;
            println!(
                "Wrote {} files to {}",
                tree.files()?.len(),
                written.display()
            );
        }
        None => {
            for file in tree.files()? {
                println!(
                    "{}  {}",
                    style(format!("{:>10}", file.content().len())).dim(),
                    file.path()
                );
            }
        }
    }
    Ok(())
}
