//! Project configuration for mdxdb.
//!
//! Settings live in `mdxdb.toml` at the project root. Every key is optional:
//!
//! ```toml
//! namespace = "blog"            # store partition for instances without $ns
//! source_extension = "mdx"      # structured sources
//! output_extension = "md"       # rendered outputs
//! debounce_ms = 150             # coalescing window for edits to outputs
//! confidence_threshold = 0.5    # minimum anchor match before merging an edit
//! ignore = ["**/.git/**", "**/node_modules/**", "**/target/**"]
//! ```
//!
//! # Precedence
//!
//! The namespace is resolved, from lowest to highest priority, from the
//! config file, the `MDXDB_NAMESPACE` environment variable and the
//! `--namespace` command-line flag. Per document, `$ns` on the instance or
//! its type definition still wins over all of them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_DEBOUNCE_MS, DEFAULT_IGNORE_PATTERNS,
    DEFAULT_OUTPUT_EXTENSION, DEFAULT_SOURCE_EXTENSION, NAMESPACE_ENV_VAR,
};
use crate::core::SyncError;

fn default_source_extension() -> String {
    DEFAULT_SOURCE_EXTENSION.to_string()
}

fn default_output_extension() -> String {
    DEFAULT_OUTPUT_EXTENSION.to_string()
}

const fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

const fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS.iter().map(|p| (*p).to_string()).collect()
}

/// Settings for one content tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Default namespace for instances without `$ns`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Extension of structured source documents.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Extension of rendered output documents.
    #[serde(default = "default_output_extension")]
    pub output_extension: String,

    /// Debounce window for external edits to rendered files, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Minimum extraction confidence required to merge an edit.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Glob patterns, relative to the root, that the engine never touches.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            source_extension: default_source_extension(),
            output_extension: default_output_extension(),
            debounce_ms: default_debounce_ms(),
            confidence_threshold: default_confidence_threshold(),
            ignore: default_ignore(),
        }
    }
}

impl SyncConfig {
    /// Path of the config file for a project root.
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE_NAME)
    }

    /// Load `mdxdb.toml` from `root`, falling back to defaults, then apply
    /// the environment override.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting settings are invalid.
    pub async fn load(root: &Path) -> Result<Self> {
        let path = Self::path_for(root);
        let mut config = if path.exists() {
            Self::load_from(&path).await?
        } else {
            Self::default()
        };
        config.apply_namespace_env(std::env::var(NAMESPACE_ENV_VAR).ok());
        config.validate(&path)?;
        Ok(config)
    }

    /// Load settings from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Write settings as pretty TOML, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Apply the value of `MDXDB_NAMESPACE`, if set and non-empty.
    pub fn apply_namespace_env(&mut self, value: Option<String>) {
        if let Some(ns) = value.filter(|v| !v.trim().is_empty()) {
            self.namespace = Some(ns);
        }
    }

    /// Override the namespace from the command line.
    #[must_use]
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        if namespace.is_some() {
            self.namespace = namespace;
        }
        self
    }

    /// Debounce window as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Check value ranges.
    pub fn validate(&self, file: &Path) -> Result<(), SyncError> {
        let invalid = |reason: String| SyncError::Config {
            file: file.display().to_string(),
            reason,
        };

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid(format!(
                "confidence_threshold must be between 0 and 1, got {}",
                self.confidence_threshold
            )));
        }
        if self.source_extension.is_empty() || self.output_extension.is_empty() {
            return Err(invalid("extensions must not be empty".into()));
        }
        if self.source_extension.eq_ignore_ascii_case(&self.output_extension) {
            return Err(invalid(format!(
                "source and output extensions must differ (both are '{}')",
                self.source_extension
            )));
        }
        self.ignore_matcher(file)?;
        Ok(())
    }

    /// Compile the ignore patterns.
    pub fn ignore_matcher(&self, file: &Path) -> Result<IgnoreMatcher, SyncError> {
        let patterns = self
            .ignore
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| SyncError::Config {
                    file: file.display().to_string(),
                    reason: format!("invalid ignore pattern '{p}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IgnoreMatcher {
            patterns,
        })
    }
}

/// Compiled ignore globs.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    patterns: Vec<glob::Pattern>,
}

impl IgnoreMatcher {
    /// Whether `relative` (a path relative to the project root) is ignored.
    pub fn is_ignored(&self, relative: &Path) -> bool {
        self.patterns.iter().any(|p| p.matches_path(relative))
    }
}
