//! Coalescing of repeated events for the same path.
//!
//! Every event for a path pushes its deadline back by the debounce window;
//! the path becomes due once no event has arrived for a full window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Pending paths and their deadlines.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    /// Create a debouncer with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Record an event for `path` at `now`.
    pub fn push(&mut self, path: &Path, now: Instant) {
        self.pending.insert(path.to_path_buf(), now + self.window);
    }

    /// Drop a pending path.
    pub fn cancel(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    /// Remove and return every path due at `now`, sorted.
    pub fn due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut ready: Vec<PathBuf> =
            self.pending.iter().filter(|(_, deadline)| **deadline <= now).map(|(p, _)| p.clone()).collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
