//! Error types for the reportlayout library.
//!
//! [`Error`] covers the failures a caller has to handle: I/O, JSON, a rejected
//! configuration, or a token source that cannot be read at all. Everything that
//! can go wrong *inside* a page is non-fatal and is recorded as a [`PageIssue`]
//! on that page's report instead.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for reportlayout operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can surface to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed JSON input or a serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The layout configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The upstream token source failed.
    #[error("Upstream extraction error: {0}")]
    Upstream(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// The page worker pool could not be created.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Error during rendering (Markdown, text, JSON).
    #[error("Rendering error: {0}")]
    Render(String),
}

/// A non-fatal condition recorded against a single page.
///
/// None of these abort document processing. Tokens that fail validation are
/// dropped and counted, ambiguous table candidates fall back to text, and pages
/// whose source fails or times out become empty degraded pages.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageIssue {
    /// A token was dropped during normalization.
    #[error("malformed token {text:?} dropped: {reason}")]
    MalformedToken {
        /// Token text as received (possibly empty)
        text: String,
        /// Why the token was rejected
        reason: String,
    },

    /// A column pattern was found over fewer rows than a table needs.
    #[error("column pattern over {rows} rows is below the table minimum; kept as text")]
    AmbiguousTableBoundary {
        /// Number of rows in the rejected run
        rows: usize,
    },

    /// The page produced no usable tokens.
    #[error("page has no usable tokens")]
    EmptyPage,

    /// The token source failed for this page.
    #[error("upstream extraction failed: {message}")]
    UpstreamExtractionFailure {
        /// Error reported by the source
        message: String,
    },

    /// The page did not finish within the configured timeout.
    #[error("page processing exceeded {timeout_ms} ms")]
    Timeout {
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// The page worker panicked.
    #[error("page worker panicked: {message}")]
    WorkerPanic {
        /// Panic payload, if it was a string
        message: String,
    },
}

impl PageIssue {
    /// Whether this issue makes the whole page degraded.
    pub fn degrades_page(&self) -> bool {
        matches!(
            self,
            PageIssue::EmptyPage
                | PageIssue::UpstreamExtractionFailure { .. }
                | PageIssue::Timeout { .. }
                | PageIssue::WorkerPanic { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidConfig("min_table_rows must be at least 2".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: min_table_rows must be at least 2"
        );

        let err = Error::PageOutOfRange(10, 5);
        assert_eq!(
            err.to_string(),
            "Page 10 is out of range (document has 5 pages)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_page_issue_degrades() {
        assert!(PageIssue::EmptyPage.degrades_page());
        assert!(PageIssue::Timeout { timeout_ms: 50 }.degrades_page());
        assert!(!PageIssue::AmbiguousTableBoundary { rows: 2 }.degrades_page());
        assert!(!PageIssue::MalformedToken {
            text: String::new(),
            reason: "empty text".to_string()
        }
        .degrades_page());
    }

    #[test]
    fn test_page_issue_serialization() {
        let issue = PageIssue::AmbiguousTableBoundary { rows: 2 };
        let json = serde_json::to_string(&issue).unwrap();
        assert_eq!(json, r#"{"kind":"ambiguous_table_boundary","rows":2}"#);
        let back: PageIssue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, issue);
    }
}
