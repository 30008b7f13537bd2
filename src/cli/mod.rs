//! Command-line interface for mdxdb.
//!
//! The CLI is a thin surface over [`SyncEngine`](crate::sync::SyncEngine).
//! Every command opens the project at `--root` (default: the current
//! directory), loads `mdxdb.toml` and backs the engine with an in-process
//! [`MemoryStore`](crate::store::MemoryStore).
//!
//! # Commands
//!
//! - `sync` - upsert every instance and render every output once
//! - `watch` - sync, then keep outputs and sources in step until Ctrl-C
//! - `render <FILE>` - print the rendered text of one instance
//! - `deps` - print which outputs depend on which types
//! - `types` - list registered types and their relationships
//!
//! ```bash
//! mdxdb --root ./content --namespace blog sync
//! mdxdb -v watch
//! mdxdb render posts/hello.mdx
//! ```

mod common;
mod deps;
mod render;
mod sync;
mod types;
mod watch;

pub use common::ProjectArgs;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root command and global options.
#[derive(Parser, Debug)]
#[command(
    name = "mdxdb",
    about = "Render MDX content databases and sync edits back to their sources",
    version,
    long_about = "mdxdb renders output documents from typed MDX templates and live queries, \
                  re-renders exactly the outputs a change affects, and merges edits made to \
                  rendered files back into their source frontmatter."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Project root containing the content tree (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Namespace for instances without `$ns` (overrides mdxdb.toml and MDXDB_NAMESPACE)
    #[arg(long, global = true, value_name = "NS")]
    namespace: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upsert every instance and render every output once.
    Sync(sync::SyncCommand),

    /// Sync, then watch the tree until interrupted.
    Watch(watch::WatchCommand),

    /// Print the rendered text of one instance without writing it.
    Render(render::RenderCommand),

    /// Show which rendered outputs depend on which types.
    Deps(deps::DepsCommand),

    /// List registered types and their relationships.
    Types(types::TypesCommand),
}

impl Cli {
    /// Log filter implied by `--verbose`/`--quiet`.
    ///
    /// `None` means "use `RUST_LOG`, else info".
    #[must_use]
    pub fn log_level(&self) -> Option<&'static str> {
        if self.verbose {
            Some("debug")
        } else if self.quiet {
            Some("warn")
        } else {
            None
        }
    }

    /// Run the selected command.
    pub async fn execute(self) -> Result<()> {
        let project = ProjectArgs {
            root: self.root,
            namespace: self.namespace,
        };

        match self.command {
            Commands::Sync(cmd) => cmd.execute(&project).await,
            Commands::Watch(cmd) => cmd.execute(&project).await,
            Commands::Render(cmd) => cmd.execute(&project).await,
            Commands::Deps(cmd) => cmd.execute(&project).await,
            Commands::Types(cmd) => cmd.execute(&project).await,
        }
    }
}
