//! mdxdb - reactive rendering and bidirectional sync for MDX content databases
//!
//! A content tree holds structured source documents (`.mdx` with YAML
//! frontmatter) and type definitions (`[TypeName].mdx`) whose body is a
//! template. mdxdb renders an output document (`.md`) for every instance,
//! keeps those outputs current as data changes, and merges edits made
//! directly to an output back into its source.
//!
//! # Architecture Overview
//!
//! ```text
//!  fs events ──► sync::WatchSession ──► sync::SyncEngine
//!                                          │  upsert / soft-delete ──► store::Store
//!                                          │  render ──► template::Renderer ──► store::Store (query)
//!                                          │  edges  ──► deps::DependencyTracker
//!                                          └  reconcile ──► extract
//! ```
//!
//! - A source change upserts the instance, re-renders its own output, then
//!   re-renders every output whose template queries that type.
//! - The engine's own writes are recognised by content hash and ignored.
//! - An external edit to an output is debounced, matched against the
//!   template's literal anchors and, when confident, merged into the source
//!   frontmatter.
//!
//! # Core Modules
//!
//! - [`registry`] - type definitions, relationships and instances
//! - [`template`] - placeholder substitution and query components
//! - [`store`] - the storage trait, query filters and the in-memory store
//! - [`deps`] - rendered path ↔ type dependency edges
//! - [`extract`] - reverse extraction of edited outputs
//! - [`sync`] - the engine, the watch loop and suppression state
//! - [`markdown`] - documents and frontmatter
//!
//! ## Supporting Modules
//! - [`cli`] - command-line interface
//! - [`config`] - `mdxdb.toml` project settings
//! - [`core`] - error types and user-facing error formatting
//! - [`constants`] - defaults and naming tables
//! - [`utils`] - atomic writes, hashing and path helpers
//!
//! # Template Example
//!
//! `topics/[Topic].mdx`:
//!
//! ```text
//! ---
//! title: Untitled
//! ---
//! # {data.title}
//!
//! <Posts orderBy="date desc" fields="title,date" />
//! ```
//!
//! Every `topics/<id>.mdx` renders to `topics/<id>.md` with a table of the
//! posts that reference that topic.

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod deps;
pub mod extract;
pub mod markdown;
pub mod registry;
pub mod store;
pub mod sync;
pub mod template;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
