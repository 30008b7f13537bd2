//! Integration test suite for mdxdb
//!
//! End-to-end tests over real temporary content trees.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **render**: full sync, table/list layouts, inline error markers
//! - **sync_loop**: event handling, fan-out, self-write suppression, deletes
//! - **reconcile**: merging edits to rendered outputs back into sources
//! - **watch**: the debounced watch loop over an injected event channel
//! - **cli**: the `mdxdb` binary

mod common;

mod cli;
mod reconcile;
mod render;
mod sync_loop;
mod watch;
