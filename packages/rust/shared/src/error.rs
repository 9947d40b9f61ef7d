//! Error types for docharvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::TaskId;

/// Top-level error type for all docharvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// A seed or candidate URL could not be parsed as an absolute URL.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A single page could not be fetched (transport error, timeout, non-2xx).
    #[error("failed to fetch {url}: {message}")]
    PageFetch { url: String, message: String },

    /// A fetched page could not be parsed or was not HTML.
    #[error("failed to parse {url}: {message}")]
    PageParse { url: String, message: String },

    /// No task is registered under the given identifier.
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// The task exists but has not reached a terminal state.
    #[error("task {0} is not finished yet")]
    NotReady(TaskId),

    /// The task was cancelled by its caller.
    #[error("task was cancelled")]
    TaskCancelled,

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Archive packaging error.
    #[error("archive error: {0}")]
    Archive(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a page fetch error.
    pub fn fetch(url: impl std::fmt::Display, msg: impl Into<String>) -> Self {
        Self::PageFetch {
            url: url.to_string(),
            message: msg.into(),
        }
    }

    /// Create a page parse error.
    pub fn parse(url: impl std::fmt::Display, msg: impl Into<String>) -> Self {
        Self::PageParse {
            url: url.to_string(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is scoped to a single page and must not abort a crawl.
    pub fn is_page_level(&self) -> bool {
        matches!(
            self,
            Self::PageFetch { .. } | Self::PageParse { .. } | Self::Conversion(_)
        )
    }
}
