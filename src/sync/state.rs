//! Per-path sync state and self-write suppression.
//!
//! Each rendered path moves through two independent cycles:
//!
//! ```text
//! Clean -> Rendering -> WrittenSelf -> Clean        (engine writes output)
//! Clean -> ExternalEditPending -> Reconciling -> Clean   (someone edits output)
//! ```
//!
//! Suppression is by content hash, never by timer: the hash of every byte
//! sequence the engine writes is recorded before the write, and a later
//! filesystem event carrying those exact bytes is recognised as an echo no
//! matter how late it arrives. A genuine edit always has a different hash.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Lifecycle state of a rendered path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    /// No pending work.
    Clean,
    /// Render in progress.
    Rendering,
    /// Written by the engine; waiting for the echo event.
    WrittenSelf,
    /// External edit seen, waiting out the debounce window.
    ExternalEditPending,
    /// Extraction in progress.
    Reconciling,
}

#[derive(Debug, Clone)]
struct Entry {
    state: PathState,
    last_written_hash: Option<String>,
    last_reconciled_hash: Option<String>,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            state: PathState::Clean,
            last_written_hash: None,
            last_reconciled_hash: None,
        }
    }
}

/// Suppression markers and lifecycle state for every path the engine touches.
#[derive(Debug, Default)]
pub struct SyncState {
    rendered: DashMap<PathBuf, Entry>,
    sources: DashMap<PathBuf, String>,
    echoes: AtomicU64,
}

impl SyncState {
    /// Create empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a rendered path.
    pub fn state(&self, path: &Path) -> PathState {
        self.rendered.get(path).map_or(PathState::Clean, |e| e.state)
    }

    /// Move a rendered path to `state`.
    pub fn transition(&self, path: &Path, state: PathState) {
        let mut entry = self.rendered.entry(path.to_path_buf()).or_default();
        trace!("{}: {:?} -> {:?}", path.display(), entry.state, state);
        entry.state = state;
    }

    /// Record the hash of output bytes about to be written (or found already
    /// on disk) for `path`.
    pub fn record_written(&self, path: &Path, hash: &str, wrote: bool) {
        let mut entry = self.rendered.entry(path.to_path_buf()).or_default();
        entry.last_written_hash = Some(hash.to_string());
        entry.state = if wrote { PathState::WrittenSelf } else { PathState::Clean };
    }

    /// Whether `hash` is the content the engine last produced for `path`.
    ///
    /// A match moves the path back to [`PathState::Clean`].
    pub fn is_self_echo(&self, path: &Path, hash: &str) -> bool {
        let Some(mut entry) = self.rendered.get_mut(path) else {
            return false;
        };
        if entry.last_written_hash.as_deref() != Some(hash) {
            return false;
        }
        entry.state = PathState::Clean;
        self.echoes.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Remember the hash of an edit that was reconciled (merged or not).
    pub fn record_reconciled(&self, path: &Path, hash: &str) {
        self.rendered.entry(path.to_path_buf()).or_default().last_reconciled_hash =
            Some(hash.to_string());
    }

    /// Whether an edit with `hash` was already reconciled.
    pub fn was_reconciled(&self, path: &Path, hash: &str) -> bool {
        self.rendered.get(path).is_some_and(|e| e.last_reconciled_hash.as_deref() == Some(hash))
    }

    /// Record the hash of a source document the engine has synced.
    pub fn record_source(&self, path: &Path, hash: &str) {
        self.sources.insert(path.to_path_buf(), hash.to_string());
    }

    /// Whether a source with `hash` was already synced.
    pub fn source_unchanged(&self, path: &Path, hash: &str) -> bool {
        self.sources.get(path).is_some_and(|h| h.as_str() == hash)
    }

    /// Forget a rendered path.
    pub fn forget_rendered(&self, path: &Path) {
        self.rendered.remove(path);
    }

    /// Forget a source path.
    pub fn forget_source(&self, path: &Path) {
        self.sources.remove(path);
    }

    /// Number of self-echo events suppressed so far.
    pub fn echoes_suppressed(&self) -> u64 {
        self.echoes.load(Ordering::Relaxed)
    }
}
