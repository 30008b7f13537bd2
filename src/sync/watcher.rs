//! Bridge from `notify` into the async engine.
//!
//! The `notify` callback runs on the watcher's own thread; events are
//! reduced to [`FsEvent`]s and forwarded over an unbounded tokio channel.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{debug, warn};

use crate::core::SyncError;

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// Created or modified.
    Changed,
    /// Removed or renamed away.
    Removed,
}

/// A change to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    /// What happened.
    pub kind: FsEventKind,
    /// Affected path.
    pub path: PathBuf,
}

impl FsEvent {
    /// A create or modify event.
    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FsEventKind::Changed,
            path: path.into(),
        }
    }

    /// A removal event.
    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FsEventKind::Removed,
            path: path.into(),
        }
    }
}

/// Reduce a `notify` event to per-path changes.
///
/// Whether a path was removed is decided by its existence now, which also
/// covers both halves of a rename.
pub fn translate(event: &Event) -> Vec<FsEvent> {
    match event.kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Remove(_) => event.paths.iter().map(FsEvent::removed).collect(),
        _ => event
            .paths
            .iter()
            .filter(|path| !path.is_dir())
            .map(|path| {
                if path.exists() {
                    FsEvent::changed(path)
                } else {
                    FsEvent::removed(path)
                }
            })
            .collect(),
    }
}

/// Watch `root` recursively.
///
/// The returned watcher must be kept alive for events to keep flowing.
pub fn watch(root: &Path) -> Result<(RecommendedWatcher, UnboundedReceiver<FsEvent>), SyncError> {
    let (tx, rx) = unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| match result {
        Ok(event) => {
            for fs_event in translate(&event) {
                if tx.send(fs_event).is_err() {
                    debug!("Watch channel closed, dropping event");
                    return;
                }
            }
        }
        Err(e) => warn!("File watcher error: {e}"),
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    debug!("Watching {}", root.display());

    Ok((watcher, rx))
}
