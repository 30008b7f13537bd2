//! Reactive synchronization between source documents and rendered outputs.
//!
//! - [`engine`] applies individual events: upsert, render, fan-out, reconcile
//! - [`session`] runs the watch loop and debounces external edits
//! - [`state`] tracks per-path lifecycle and self-write suppression
//! - [`watcher`] adapts `notify` events
//! - [`debounce`] coalesces bursts of edits to one path

pub mod debounce;
pub mod engine;
pub mod session;
pub mod state;
pub mod watcher;

pub use debounce::Debouncer;
pub use engine::{EventOutcome, ReconcileOutcome, SyncEngine, SyncReport};
pub use session::{SessionStats, ShutdownHandle, WatchSession};
pub use state::{PathState, SyncState};
pub use watcher::{FsEvent, FsEventKind};
