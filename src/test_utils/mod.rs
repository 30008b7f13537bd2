//! Test utilities for mdxdb
//!
//! Helpers for unit and integration tests: a temporary content tree with
//! file helpers, canned type definitions, and opt-in logging.
//!
//! # Example
//!
//! ```rust,no_run
//! use mdxdb::test_utils::{TestProject, fixtures};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let project = TestProject::new()?;
//! fixtures::blog(&project)?;
//! let engine = project.engine()?;
//! engine.full_sync().await;
//! assert!(project.exists("topics/rust.md"));
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod project;

pub use project::TestProject;

use std::io::Write;
use std::sync::{Arc, Mutex, Once, PoisonError};
use tracing::Level;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// With `Some(level)` that level is used; otherwise `RUST_LOG` is honoured
/// when set, and nothing is logged when it is not.
///
/// ```bash
/// RUST_LOG=mdxdb=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// In-memory log sink for asserting on emitted events.
///
/// ```rust,no_run
/// use mdxdb::test_utils::LogCapture;
///
/// let logs = LogCapture::default();
/// let _guard = logs.install(tracing::Level::WARN);
/// tracing::warn!("low confidence");
/// assert!(logs.contents().contains("low confidence"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route events at `level` and above on the current thread into this
    /// capture until the guard is dropped.
    ///
    /// Async tests must run on a current-thread runtime (the `#[tokio::test]`
    /// default) so every poll sees the subscriber.
    pub fn install(&self, level: Level) -> DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(level.to_string()))
            .with_ansi(false)
            .with_target(false)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Everything logged so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap_or_else(PoisonError::into_inner)).into_owned()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
