//! `mdxdb deps`: the type → rendered output dependency map.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::collections::BTreeMap;

use super::common::ProjectArgs;
use crate::utils::fs::display_relative;

/// Show which rendered outputs re-render when a type changes.
#[derive(Args, Debug)]
pub struct DepsCommand {
    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

impl DepsCommand {
    /// Index the tree and print dependency edges.
    pub async fn execute(self, project: &ProjectArgs) -> Result<()> {
        let engine = project.open().await?;
        engine.index().await;

        let edges: BTreeMap<String, Vec<String>> = engine
            .deps()
            .snapshot()
            .into_iter()
            .map(|(type_name, paths)| {
                let paths = paths.iter().map(|p| display_relative(engine.root(), p)).collect();
                (type_name, paths)
            })
            .collect();

        if self.format == "json" {
            println!("{}", serde_json::to_string_pretty(&edges)?);
            return Ok(());
        }

        if edges.is_empty() {
            println!("No rendered output depends on any type.");
            return Ok(());
        }
        for (type_name, paths) in &edges {
            println!("{}", type_name.bold());
            for path in paths {
                println!("  └─ {path}");
            }
        }
        Ok(())
    }
}
