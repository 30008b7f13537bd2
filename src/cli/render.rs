//! `mdxdb render <FILE>`: print one instance's output.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use super::common::ProjectArgs;

/// Render a source document to stdout.
#[derive(Args, Debug)]
pub struct RenderCommand {
    /// Source document to render, relative to the current directory
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

impl RenderCommand {
    /// Index the tree so queries see every instance, then render `file`.
    pub async fn execute(self, project: &ProjectArgs) -> Result<()> {
        let engine = project.open().await?;
        let file = std::fs::canonicalize(&self.file)
            .with_context(|| format!("Source document not found: {}", self.file.display()))?;

        let (report, _) = engine.index().await;
        if let Some((_, reason)) = report.failures.iter().find(|(path, _)| *path == file) {
            anyhow::bail!("{reason}");
        }

        let text = engine
            .preview(&file)
            .await
            .with_context(|| format!("Failed to render {}", self.file.display()))?;
        print!("{text}");
        Ok(())
    }
}
