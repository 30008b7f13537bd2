//! File system operations with atomic writes and content hashing.
//!
//! Rendered outputs and merged sources are always written with
//! [`atomic_write`], so a watcher never observes a half-written file, and the
//! bytes are fingerprinted with [`content_hash`] for self-write suppression.

pub mod atomic;
pub mod dirs;
pub mod hash;
pub mod paths;

pub use atomic::atomic_write;
pub use dirs::ensure_dir;
pub use hash::content_hash;
pub use paths::{display_relative, normalize_path, relative_link};
