//! Long-running watch loop.
//!
//! Events are applied as they arrive, except external edits to rendered
//! files: those wait in a [`Debouncer`] until the path has been quiet for the
//! configured window, then go through [`SyncEngine::reconcile`].

use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::debounce::Debouncer;
use super::engine::{EventOutcome, ReconcileOutcome, SyncEngine};
use super::watcher::{self, FsEvent};
use crate::core::SyncError;
use crate::store::Store;

/// Counters for a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Filesystem events received.
    pub events: usize,
    /// Self-write echoes suppressed.
    pub echoes: usize,
    /// Outputs written.
    pub written: usize,
    /// Edits reconciled.
    pub reconciled: usize,
    /// Edits merged into sources.
    pub merged: usize,
    /// Events or reconciliations that failed.
    pub errors: usize,
}

/// Stops a running [`WatchSession`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Ask the session to stop after the event in progress.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Drives a [`SyncEngine`] from filesystem events.
pub struct WatchSession<S: Store> {
    engine: Arc<SyncEngine<S>>,
    shutdown: watch::Receiver<bool>,
}

impl<S: Store> WatchSession<S> {
    /// Create a session and the handle that stops it.
    pub fn new(engine: Arc<SyncEngine<S>>) -> (Self, ShutdownHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                engine,
                shutdown: rx,
            },
            ShutdownHandle {
                tx,
            },
        )
    }

    /// Watch the engine's root until shut down.
    ///
    /// # Errors
    ///
    /// Fails only when the watcher cannot be attached; per-event failures
    /// are logged and counted.
    pub async fn run(self) -> Result<SessionStats, SyncError> {
        let (_watcher, events) = watcher::watch(self.engine.root())?;
        info!("Watching {} for changes", self.engine.root().display());
        Ok(self.run_with(events).await)
    }

    /// Process events from `events` until shut down or the channel closes.
    pub async fn run_with(mut self, mut events: UnboundedReceiver<FsEvent>) -> SessionStats {
        let mut stats = SessionStats::default();
        let mut pending = Debouncer::new(self.engine.config().debounce());

        loop {
            let deadline = pending.next_deadline().map(Instant::from_std);
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        debug!("Shutdown requested");
                        break;
                    }
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Event channel closed");
                        break;
                    };
                    stats.events += 1;
                    self.dispatch(&event, &mut pending, &mut stats).await;
                }
                () = sleep_until(deadline) => {
                    for path in pending.due(std::time::Instant::now()) {
                        self.reconcile(&path, &mut stats).await;
                    }
                }
            }
        }

        // Edits still inside their window are reconciled before exit
        for path in pending.due(std::time::Instant::now() + self.engine.config().debounce()) {
            self.reconcile(&path, &mut stats).await;
        }

        info!(
            "Watch stopped: {} events, {} outputs written, {} edits merged, {} errors",
            stats.events, stats.written, stats.merged, stats.errors
        );
        stats
    }

    async fn dispatch(&self, event: &FsEvent, pending: &mut Debouncer, stats: &mut SessionStats) {
        match self.engine.handle_event(event).await {
            Ok(EventOutcome::ExternalEdit(path)) => pending.push(&path, std::time::Instant::now()),
            Ok(EventOutcome::SelfEcho) => {
                stats.echoes += 1;
                pending.cancel(&event.path);
            }
            Ok(
                EventOutcome::SourceSynced {
                    written,
                }
                | EventOutcome::SourceRemoved {
                    written,
                }
                | EventOutcome::TypesReloaded {
                    written,
                    ..
                },
            ) => stats.written += written.len(),
            Ok(EventOutcome::Ignored) => {}
            Err(e) => {
                stats.errors += 1;
                error!("Failed to process {}: {e}", event.path.display());
            }
        }
    }

    async fn reconcile(&self, path: &Path, stats: &mut SessionStats) {
        match self.engine.reconcile(path).await {
            Ok(ReconcileOutcome::Merged {
                ..
            }) => {
                stats.reconciled += 1;
                stats.merged += 1;
            }
            Ok(ReconcileOutcome::NoChanges | ReconcileOutcome::LowConfidence { .. }) => {
                stats.reconciled += 1;
            }
            Ok(ReconcileOutcome::Skipped) => {}
            Err(e) => {
                stats.errors += 1;
                error!("Failed to reconcile {}: {e}", path.display());
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
