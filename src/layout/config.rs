//! Layout configuration.
//!
//! Every tolerance and threshold used by the pipeline lives here. Stages take
//! a `&LayoutConfig` and never embed their own numbers.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tolerances, thresholds and worker settings for layout reconstruction.
///
/// Deserializing fills missing fields with their defaults, so a config file
/// only needs to list what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Max vertical distance from a row's reference Y for a token to join it
    pub y_tolerance: f64,

    /// Max horizontal distance from a column anchor for an X start to join it
    pub x_tolerance: f64,

    /// Max left-margin difference for two rows to continue a paragraph
    pub margin_tolerance: f64,

    /// Vertical gap (difference of row Y) at or above which a new block starts
    pub line_gap_threshold: f64,

    /// Minimum consecutive aligned rows for a table
    pub min_table_rows: usize,

    /// Fraction of a row's tokens that must start on a column for the row to align
    pub column_match_fraction: f64,

    /// Paragraphs shorter than this many characters are dropped as noise
    pub min_paragraph_chars: usize,

    /// Minimum number of distinct rows an X anchor needs to count as a column
    pub min_column_support: usize,

    /// Runs with more columns than this are treated as word-level noise
    pub max_table_columns: usize,

    /// Max vertical distance between a caption row and the table below it
    pub caption_max_gap: f64,

    /// Font size ratio to the page median at which a line reads as a header
    pub header_font_ratio: f64,

    /// Lines longer than this are never treated as headers
    pub max_header_chars: usize,

    /// Whether to process pages on several workers
    pub parallel: bool,

    /// Worker count (0 = available parallelism)
    pub workers: usize,

    /// Per-page processing timeout in milliseconds (none = wait indefinitely)
    pub page_timeout_ms: Option<u64>,
}

impl LayoutConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row clustering tolerance.
    pub fn with_y_tolerance(mut self, tolerance: f64) -> Self {
        self.y_tolerance = tolerance;
        self
    }

    /// Set the column anchor tolerance.
    pub fn with_x_tolerance(mut self, tolerance: f64) -> Self {
        self.x_tolerance = tolerance;
        self
    }

    /// Set the paragraph margin tolerance.
    pub fn with_margin_tolerance(mut self, tolerance: f64) -> Self {
        self.margin_tolerance = tolerance;
        self
    }

    /// Set the paragraph line gap threshold.
    pub fn with_line_gap_threshold(mut self, threshold: f64) -> Self {
        self.line_gap_threshold = threshold;
        self
    }

    /// Set the minimum table row count.
    pub fn with_min_table_rows(mut self, rows: usize) -> Self {
        self.min_table_rows = rows;
        self
    }

    /// Set the column alignment fraction.
    pub fn with_column_match_fraction(mut self, fraction: f64) -> Self {
        self.column_match_fraction = fraction;
        self
    }

    /// Set the minimum paragraph length.
    pub fn with_min_paragraph_chars(mut self, chars: usize) -> Self {
        self.min_paragraph_chars = chars;
        self
    }

    /// Enable or disable parallel page processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Process pages on a single worker.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the per-page timeout.
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Per-page timeout, if configured.
    pub fn page_timeout(&self) -> Option<Duration> {
        self.page_timeout_ms.map(Duration::from_millis)
    }

    /// Number of workers the engine should start.
    pub fn worker_count(&self) -> usize {
        if !self.parallel {
            return 1;
        }
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Load a configuration from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LayoutConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check that every setting is usable.
    ///
    /// This runs before any page is processed; an invalid configuration is the
    /// only error that stops a document outright.
    pub fn validate(&self) -> Result<()> {
        let tolerances = [
            ("y_tolerance", self.y_tolerance),
            ("x_tolerance", self.x_tolerance),
            ("margin_tolerance", self.margin_tolerance),
            ("caption_max_gap", self.caption_max_gap),
        ];
        for (name, value) in tolerances {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a finite non-negative number (got {})",
                    name, value
                )));
            }
        }
        if !self.line_gap_threshold.is_finite() || self.line_gap_threshold <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "line_gap_threshold must be positive (got {})",
                self.line_gap_threshold
            )));
        }
        if self.min_table_rows < 2 {
            return Err(Error::InvalidConfig(format!(
                "min_table_rows must be at least 2 (got {})",
                self.min_table_rows
            )));
        }
        if !(self.column_match_fraction > 0.0 && self.column_match_fraction <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "column_match_fraction must be in (0, 1] (got {})",
                self.column_match_fraction
            )));
        }
        if self.min_column_support < 1 {
            return Err(Error::InvalidConfig(
                "min_column_support must be at least 1".to_string(),
            ));
        }
        if self.max_table_columns < 2 {
            return Err(Error::InvalidConfig(format!(
                "max_table_columns must be at least 2 (got {})",
                self.max_table_columns
            )));
        }
        if !self.header_font_ratio.is_finite() || self.header_font_ratio < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "header_font_ratio must be at least 1.0 (got {})",
                self.header_font_ratio
            )));
        }
        if self.page_timeout_ms == Some(0) {
            return Err(Error::InvalidConfig(
                "page_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            y_tolerance: 3.0,
            x_tolerance: 8.0,
            margin_tolerance: 10.0,
            line_gap_threshold: 15.0,
            min_table_rows: 3,
            column_match_fraction: 0.5,
            min_paragraph_chars: 12,
            min_column_support: 2,
            max_table_columns: 12,
            caption_max_gap: 30.0,
            header_font_ratio: 1.2,
            max_header_chars: 120,
            parallel: true,
            workers: 0,
            page_timeout_ms: None,
        }
    }
}
