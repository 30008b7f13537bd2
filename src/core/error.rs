//! Error handling for mdxdb
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** at component seams ([`SyncError`]), so callers
//!    can decide whether a failure is per-path, per-component or fatal
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!    ([`ErrorContext`], [`user_friendly_error`])
//!
//! # Error taxonomy
//!
//! | Variant | Scope | Handling |
//! |---------|-------|----------|
//! | [`SyncError::Parse`] | one document | skipped and logged |
//! | [`SyncError::Query`] | one component | inline error marker, render continues |
//! | [`SyncError::NamespaceMissing`] | one sync operation | operation aborted, process continues |
//! | [`SyncError::TypeNotFound`] | one document | skipped and logged |
//! | [`SyncError::Watch`] | watch session | fatal only during start-up |
//!
//! A low-confidence extraction is not an error: it is reported as
//! [`crate::sync::ReconcileOutcome::LowConfidence`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use mdxdb::core::{SyncError, user_friendly_error};
//!
//! let err = anyhow::Error::from(SyncError::NamespaceMissing {
//!     path: "posts/hello.mdx".to_string(),
//! });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for mdxdb operations.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// A document could not be parsed (malformed frontmatter, unknown type, ...).
    #[error("Failed to parse '{path}': {reason}")]
    Parse {
        /// Path of the offending document
        path: String,
        /// Human-readable parse failure
        reason: String,
    },

    /// The store rejected or failed a query.
    #[error("Query failed: {message}")]
    Query {
        /// Store-provided failure message
        message: String,
    },

    /// No namespace could be resolved for an instance.
    #[error("No namespace configured for '{path}'")]
    NamespaceMissing {
        /// Document whose sync operation was aborted
        path: String,
    },

    /// A document names a type that is not registered.
    #[error("Type '{name}' is not registered")]
    TypeNotFound {
        /// Requested type name
        name: String,
    },

    /// File system operation failed.
    #[error("File system error during {operation} on '{path}': {message}")]
    Io {
        /// Operation that failed (read, write, remove, ...)
        operation: String,
        /// Path the operation touched
        path: String,
        /// Underlying I/O message
        message: String,
    },

    /// Invalid project configuration.
    #[error("Invalid configuration in '{file}': {reason}")]
    Config {
        /// Configuration file
        file: String,
        /// What is wrong with it
        reason: String,
    },

    /// The file watcher could not be created or attached.
    #[error("File watcher error: {message}")]
    Watch {
        /// Watcher failure message
        message: String,
    },

    /// Any other failure, carrying its full context chain.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl SyncError {
    /// Build a [`SyncError::Parse`] from any displayable reason.
    pub fn parse(path: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Parse {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Build a [`SyncError::Query`] from any displayable message.
    pub fn query(message: impl fmt::Display) -> Self {
        Self::Query {
            message: message.to_string(),
        }
    }

    /// Build a [`SyncError::Io`] from an I/O error.
    pub fn io(operation: &str, path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.to_string(),
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<notify::Error> for SyncError {
    fn from(err: notify::Error) -> Self {
        Self::Watch {
            message: err.to_string(),
        }
    }
}

/// Error wrapper carrying a suggestion and extra details for terminal output.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: SyncError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: SyncError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colours.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

fn create_error_context(error: SyncError) -> ErrorContext {
    match &error {
        SyncError::NamespaceMissing {
            ..
        } => ErrorContext::new(error)
            .with_suggestion(
                "Set `namespace` in mdxdb.toml, export MDXDB_NAMESPACE, or pass --namespace",
            )
            .with_details("Every instance is stored under a namespace; none is inferred"),
        SyncError::Parse {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the YAML frontmatter between the `---` delimiters"),
        SyncError::TypeNotFound {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Create a `[TypeName].mdx` definition next to the instance or fix its `$type`",
        ),
        SyncError::Config {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the TOML syntax and field names in mdxdb.toml"),
        SyncError::Watch {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check that the project directory exists and is readable")
            .with_details("On Linux, large trees may exceed fs.inotify.max_user_watches"),
        SyncError::Query {
            ..
        }
        | SyncError::Io {
            ..
        }
        | SyncError::Other {
            ..
        } => ErrorContext::new(error),
    }
}

/// Convert any error into an [`ErrorContext`] suitable for CLI display.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(sync_error) = error.downcast_ref::<SyncError>() {
        return create_error_context(sync_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        let ctx = ErrorContext::new(SyncError::Other {
            message: format!("{error:#}"),
        });
        return match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                ctx.with_suggestion("Check file ownership and permissions")
            }
            std::io::ErrorKind::NotFound => {
                ctx.with_suggestion("Check that the file or directory exists")
            }
            _ => ctx,
        };
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return create_error_context(SyncError::Config {
            file: crate::constants::CONFIG_FILE_NAME.to_string(),
            reason: toml_error.to_string(),
        });
    }

    // Keep the full anyhow chain in the details for anything else
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    let ctx = ErrorContext::new(SyncError::Other {
        message: error.to_string(),
    });
    if chain.is_empty() {
        ctx
    } else {
        ctx.with_details(chain.join("\n  caused by: "))
    }
}
