//! File system helpers shared by the sync engine and the CLI.
//!
//! - [`fs`] - atomic writes, directory creation, content hashing and path helpers

pub mod fs;

pub use fs::{atomic_write, content_hash, display_relative, ensure_dir, normalize_path, relative_link};
