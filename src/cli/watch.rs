//! `mdxdb watch`: sync once, then follow the tree until Ctrl-C.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use tracing::warn;

use super::common::ProjectArgs;
use super::sync::print_report;
use crate::sync::WatchSession;
use crate::utils::fs::display_relative;

/// Keep outputs and sources in step as files change.
#[derive(Args, Debug)]
pub struct WatchCommand {
    /// Coalescing window for edits to rendered files (overrides mdxdb.toml)
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,
}

impl WatchCommand {
    /// Run the initial sync, then watch until interrupted.
    pub async fn execute(self, project: &ProjectArgs) -> Result<()> {
        let mut config = project.config().await?;
        if let Some(ms) = self.debounce_ms {
            config.debounce_ms = ms;
        }
        let engine = Arc::new(project.engine(config)?);

        let report = engine.full_sync().await;
        print_report(&report, |p| display_relative(engine.root(), p));
        println!("{} {} (Ctrl-C to stop)", "Watching".cyan().bold(), engine.root().display());

        let (session, shutdown) = WatchSession::new(Arc::clone(&engine));
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => shutdown.shutdown(),
                Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
            }
        });

        let stats = session.run().await.context("Failed to watch the content tree")?;
        println!(
            "{} {} events, {} outputs written, {} edits merged, {} self-writes ignored",
            "Stopped".yellow().bold(),
            stats.events,
            stats.written,
            stats.merged,
            stats.echoes
        );
        Ok(())
    }
}
