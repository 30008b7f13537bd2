//! Shared project setup for CLI commands.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::SyncConfig;
use crate::store::MemoryStore;
use crate::sync::SyncEngine;

/// Project selection shared by every command.
#[derive(Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Project root; the current directory when unset.
    pub root: Option<PathBuf>,
    /// Namespace from `--namespace`.
    pub namespace: Option<String>,
}

impl ProjectArgs {
    /// Resolve the project root.
    pub fn root(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir().context("Failed to determine the current directory"),
        }
    }

    /// Load `mdxdb.toml` and apply the command-line namespace.
    pub async fn config(&self) -> Result<SyncConfig> {
        let root = self.root()?;
        let config = SyncConfig::load(&root).await?;
        Ok(config.with_namespace(self.namespace.clone()))
    }

    /// Open an engine over the project with `config`.
    pub fn engine(&self, config: SyncConfig) -> Result<SyncEngine<MemoryStore>> {
        let root = self.root()?;
        SyncEngine::new(&root, config, Arc::new(MemoryStore::new()))
            .with_context(|| format!("Failed to open project at {}", root.display()))
    }

    /// Load the configuration and open an engine.
    pub async fn open(&self) -> Result<SyncEngine<MemoryStore>> {
        let config = self.config().await?;
        self.engine(config)
    }
}
