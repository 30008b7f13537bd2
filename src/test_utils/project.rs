//! Temporary content trees.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::config::SyncConfig;
use crate::store::MemoryStore;
use crate::sync::SyncEngine;

/// Namespace used by [`TestProject::engine`].
pub const TEST_NAMESPACE: &str = "test";

/// A content tree in a temporary directory, removed on drop.
pub struct TestProject {
    _temp_dir: TempDir,
    root: PathBuf,
}

impl TestProject {
    /// Create an empty project.
    pub fn new() -> Result<Self> {
        super::init_test_logging(None);

        let temp_dir = TempDir::new()?;
        // Canonical so paths compare equal to the engine's
        let root = fs::canonicalize(temp_dir.path())?;
        Ok(Self {
            _temp_dir: temp_dir,
            root,
        })
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `relative`.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Read `relative` as a string.
    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.path(relative);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }

    /// Remove the file at `relative`.
    pub fn remove(&self, relative: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        Ok(path)
    }

    /// Whether `relative` exists.
    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// Engine over this project with the [`TEST_NAMESPACE`] namespace.
    pub fn engine(&self) -> Result<SyncEngine<MemoryStore>> {
        self.engine_with(SyncConfig {
            namespace: Some(TEST_NAMESPACE.into()),
            ..SyncConfig::default()
        })
    }

    /// Engine over this project with `config`.
    pub fn engine_with(&self, config: SyncConfig) -> Result<SyncEngine<MemoryStore>> {
        Ok(SyncEngine::new(&self.root, config, Arc::new(MemoryStore::new()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_remove() {
        let project = TestProject::new().unwrap();
        project.write("a/b.mdx", "hello").unwrap();
        assert_eq!(project.read("a/b.mdx").unwrap(), "hello");
        project.remove("a/b.mdx").unwrap();
        assert!(!project.exists("a/b.mdx"));
    }
}
