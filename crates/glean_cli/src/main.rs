//! Glean CLI - read files and trees from GitLab web URLs.

mod commands;
mod config;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::Term;
use glean::GitLabUrlReaders;
use tracing_subscriber::EnvFilter;

use crate::commands::shared::{FetchArgs, SinceArg};

#[derive(Parser)]
#[command(name = "glean")]
#[command(version)]
#[command(about = "Read files, trees and glob searches from GitLab web URLs")]
#[command(
    long_about = "Glean resolves GitLab web URLs (blob, tree, job artifact, gitlab.com or \
self-hosted) into API calls and prints the file, tree or search results. Pass the ETag \
printed by a previous run to skip unchanged content."
)]
#[command(after_long_help = r#"EXAMPLES
    Print a file:
        $ glean read https://gitlab.com/group/project/-/blob/main/README.md

    List a directory:
        $ glean tree https://gitlab.com/group/project/-/tree/main/docs

    Download a directory:
        $ glean tree https://gitlab.com/group/project/-/tree/main/docs --out ./docs

    Find Markdown files:
        $ glean search 'https://gitlab.com/group/project/-/tree/main/**/*.md'

    Re-read only if changed:
        $ glean tree https://gitlab.com/group/project --etag 0f1e2d3c...

CONFIGURATION
    Glean reads configuration from:
      1. ~/.config/glean/config.toml (or $XDG_CONFIG_HOME/glean/config.toml)
      2. ./glean.toml
      3. Environment variables (GLEAN_* prefix)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    GLEAN_GITLAB_HOST     Primary GitLab host (default: gitlab.com)
    GLEAN_GITLAB_TOKEN    Personal access token for the primary host
    GLEAN_TOKEN           Token for a single invocation (same as --token)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the contents of a blob or job artifact
    Read {
        #[command(flatten)]
        fetch: FetchArgs,

        #[command(flatten)]
        since: SinceArg,
    },
    /// List or download a repository tree
    Tree {
        #[command(flatten)]
        fetch: FetchArgs,

        #[command(flatten)]
        since: SinceArg,

        /// Write the files into this directory instead of listing them
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print URLs of files matching a glob URL
    Search {
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Structured logging only when not attached to a terminal
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("glean=info,glean_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();

    let readers = match &cli.command {
        Commands::Completions { shell } => return commands::meta::handle_completions(*shell),
        Commands::Man { output } => return commands::meta::handle_man(output.clone()),
        _ => {
            let config = config::Config::load();
            GitLabUrlReaders::from_config(&config.integrations(), config.reader)?
        }
    };

    shutdown::run_interruptible(async {
        match cli.command {
            Commands::Read { fetch, since } => {
                commands::read::handle_read(&readers, fetch, since).await
            }
            Commands::Tree { fetch, since, out } => {
                commands::tree::handle_tree(&readers, fetch, since, out).await
            }
            Commands::Search { fetch } => commands::search::handle_search(&readers, fetch).await,
            Commands::Completions { .. } | Commands::Man { .. } => Ok(()),
        }
    })
    .await
}
