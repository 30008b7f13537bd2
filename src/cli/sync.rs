//! `mdxdb sync`: one full pass over the content tree.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

use super::common::ProjectArgs;
use crate::sync::SyncReport;
use crate::utils::fs::display_relative;

/// Upsert every instance and render every output.
#[derive(Args, Debug)]
pub struct SyncCommand {
    /// Exit with an error if any document failed to sync
    #[arg(long)]
    pub strict: bool,
}

impl SyncCommand {
    /// Run the sync and print a summary.
    pub async fn execute(self, project: &ProjectArgs) -> Result<()> {
        let engine = project.open().await?;
        let report = engine.full_sync().await;
        print_report(&report, |p| display_relative(engine.root(), p));

        if self.strict && !report.is_clean() {
            bail!("{} document(s) failed to sync", report.failures.len());
        }
        Ok(())
    }
}

pub(super) fn print_report(report: &SyncReport, rel: impl Fn(&std::path::Path) -> String) {
    println!(
        "{} {} instances of {} types: {} written, {} unchanged",
        "Synced".green().bold(),
        report.instances,
        report.types,
        report.written,
        report.unchanged
    );
    if report.removed > 0 {
        println!("  {} stale instances removed", report.removed);
    }
    for (path, reason) in &report.failures {
        println!("  {} {}: {reason}", "✗".red(), rel(path));
    }
}
