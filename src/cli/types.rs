//! `mdxdb types`: registered types and their relationships.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;

use super::common::ProjectArgs;
use crate::registry::format_cycle;
use crate::utils::fs::display_relative;

/// List registered type definitions.
#[derive(Args, Debug)]
pub struct TypesCommand {
    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

impl TypesCommand {
    /// Print every type, its output mode and relationships.
    pub async fn execute(self, project: &ProjectArgs) -> Result<()> {
        let engine = project.open().await?;
        let registry = engine.registry();

        if self.format == "json" {
            let types: Vec<_> = registry
                .iter()
                .map(|def| {
                    json!({
                        "name": def.name,
                        "path": display_relative(engine.root(), &def.source_path),
                        "generatesOutput": def.generates_output,
                        "namespace": def.namespace,
                        "relationships": def.relationships.iter().map(|r| json!({
                            "field": r.field,
                            "target": r.target_type,
                            "cardinality": r.cardinality.to_string(),
                            "reverse": r.reverse_field,
                        })).collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&types)?);
            return Ok(());
        }

        if registry.is_empty() {
            println!("No type definitions found.");
            return Ok(());
        }
        for def in registry.iter() {
            let mode = if def.generates_output { "renders" } else { "data only" };
            println!(
                "{} ({mode}) {}",
                def.name.bold(),
                display_relative(engine.root(), &def.source_path).dimmed()
            );
            for rel in &def.relationships {
                let reverse = rel.reverse_field.as_deref().map(|f| format!(" via {f}")).unwrap_or_default();
                println!("  {} → {} [{}]{reverse}", rel.field, rel.target_type, rel.cardinality);
            }
        }
        if let Some(cycle) = registry.graph().find_cycle() {
            println!("\n{} {}", "Cycle:".yellow(), format_cycle(&cycle));
        }
        Ok(())
    }
}
