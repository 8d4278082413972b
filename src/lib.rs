//! # reportlayout
//!
//! Page layout reconstruction for technical PDF reports.
//!
//! Given the positioned text tokens of each page (from a PDF text layer or
//! OCR), this library recovers the structure a reader sees: tables, multi-line
//! paragraphs, section headers and list items. Every block carries a
//! confidence score and a link to the header that governs it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use reportlayout::{analyze_file, render};
//!
//! fn main() -> reportlayout::Result<()> {
//!     // Token records exported by the PDF/OCR backend
//!     let doc = analyze_file("report.tokens.json")?;
//!
//!     let options = render::RenderOptions::default();
//!     let markdown = render::to_markdown(&doc, &options)?;
//!     println!("{}", markdown);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Table recovery**: grid and field/value tables from column alignment
//! - **Paragraph merging**: margin and line-gap rules with de-hyphenation
//! - **Ranked classification**: headers, lists and paragraphs with confidence
//! - **Section links**: every block points at its governing header
//! - **Parallel processing**: pages run on a Rayon pool with per-page timeouts
//! - **Graceful degradation**: failing pages become empty, flagged results

pub mod error;
pub mod layout;
pub mod model;
pub mod render;
pub mod source;

// Re-export commonly used types
pub use error::{Error, PageIssue, Result};
pub use layout::{CoordinateOrigin, LayoutConfig, LayoutEngine, SpanRecord};
pub use model::{
    BBox, Block, BlockKind, Document, FieldValue, Outline, OutlineItem, PageRange, PageReport,
    PageStatus, Payload, Table, TableLayout, TableRow, Token,
};
pub use render::{DocumentStats, JsonFormat, PageSelection, RenderOptions};
pub use source::{MemorySource, TokenSource};

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Analyze a token file with the default configuration.
///
/// # Arguments
///
/// * `path` - Path to a JSON token file
///
/// # Example
///
/// ```no_run
/// use reportlayout::analyze_file;
///
/// let doc = analyze_file("report.tokens.json").unwrap();
/// println!("Blocks: {}", doc.blocks.len());
/// ```
pub fn analyze_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    analyze_file_with_config(path, LayoutConfig::default())
}

/// Analyze a token file with a custom configuration.
///
/// # Example
///
/// ```no_run
/// use reportlayout::{analyze_file_with_config, LayoutConfig};
///
/// let config = LayoutConfig::new()
///     .with_line_gap_threshold(18.0)
///     .sequential();
/// let doc = analyze_file_with_config("report.tokens.json", config).unwrap();
/// ```
pub fn analyze_file_with_config<P: AsRef<Path>>(path: P, config: LayoutConfig) -> Result<Document> {
    let source = MemorySource::from_path(path)?;
    let engine = LayoutEngine::new(config)?;
    Ok(engine.process(Arc::new(source)))
}

/// Analyze token records given as a JSON string.
pub fn analyze_json_str(json: &str) -> Result<Document> {
    let source = MemorySource::from_json_str(json)?;
    let engine = LayoutEngine::new(LayoutConfig::default())?;
    Ok(engine.process(Arc::new(source)))
}

/// Analyze token records read from a reader.
///
/// # Example
///
/// ```no_run
/// use reportlayout::analyze_reader;
/// use std::fs::File;
///
/// let file = File::open("report.tokens.json").unwrap();
/// let doc = analyze_reader(file).unwrap();
/// ```
pub fn analyze_reader<R: Read>(reader: R) -> Result<Document> {
    let source = MemorySource::from_reader(reader)?;
    let engine = LayoutEngine::new(LayoutConfig::default())?;
    Ok(engine.process(Arc::new(source)))
}

/// Extract plain text from a token file.
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let doc = analyze_file(path)?;
    Ok(doc.plain_text())
}

/// Convert a token file to Markdown.
///
/// # Example
///
/// ```no_run
/// use reportlayout::to_markdown;
///
/// let markdown = to_markdown("report.tokens.json").unwrap();
/// std::fs::write("report.md", markdown).unwrap();
/// ```
pub fn to_markdown<P: AsRef<Path>>(path: P) -> Result<String> {
    let doc = analyze_file(path)?;
    render::to_markdown(&doc, &RenderOptions::default())
}

/// Convert a token file to the JSON block format.
pub fn to_json<P: AsRef<Path>>(path: P, format: JsonFormat) -> Result<String> {
    let doc = analyze_file(path)?;
    render::to_json(&doc, format)
}

/// Builder for analyzing and rendering a report.
///
/// # Example
///
/// ```no_run
/// use reportlayout::ReportLayout;
/// use std::time::Duration;
///
/// let markdown = ReportLayout::new()
///     .with_workers(4)
///     .with_page_timeout(Duration::from_secs(5))
///     .with_page_markers()
///     .analyze("report.tokens.json")?
///     .to_markdown()?;
/// # Ok::<(), reportlayout::Error>(())
/// ```
pub struct ReportLayout {
    config: LayoutConfig,
    render_options: RenderOptions,
}

impl ReportLayout {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: LayoutConfig::default(),
            render_options: RenderOptions::default(),
        }
    }

    /// Replace the layout configuration.
    pub fn with_config(mut self, config: LayoutConfig) -> Self {
        self.config = config;
        self
    }

    /// Process pages one at a time.
    pub fn sequential(mut self) -> Self {
        self.config = self.config.sequential();
        self
    }

    /// Set the number of page workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config = self.config.with_workers(workers);
        self
    }

    /// Abandon pages that take longer than this.
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_page_timeout(timeout);
        self
    }

    /// Set page selection for rendering.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.render_options = self.render_options.with_pages(pages);
        self
    }

    /// Mark page starts in Markdown output.
    pub fn with_page_markers(mut self) -> Self {
        self.render_options = self.render_options.with_page_markers(true);
        self
    }

    /// Leave out blocks below a confidence when rendering.
    pub fn with_min_confidence(mut self, confidence: f64) -> Self {
        self.render_options = self.render_options.with_min_confidence(confidence);
        self
    }

    /// Analyze a token file.
    pub fn analyze<P: AsRef<Path>>(self, path: P) -> Result<LayoutResult> {
        let source = MemorySource::from_path(path)?;
        self.analyze_source(Arc::new(source))
    }

    /// Analyze pages from any token source.
    pub fn analyze_source<S>(self, source: Arc<S>) -> Result<LayoutResult>
    where
        S: TokenSource + ?Sized + 'static,
    {
        let engine = LayoutEngine::new(self.config)?;
        Ok(LayoutResult {
            document: engine.process(source),
            render_options: self.render_options,
        })
    }

    /// Analyze span records already in memory.
    pub fn analyze_records(self, records: Vec<SpanRecord>) -> Result<LayoutResult> {
        self.analyze_source(Arc::new(MemorySource::from_records(records)))
    }
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self::new()
    }
}

/// A reconstructed document together with its render settings.
pub struct LayoutResult {
    /// The reconstructed document
    pub document: Document,
    /// Render options to use
    render_options: RenderOptions,
}

impl LayoutResult {
    /// Convert to Markdown.
    pub fn to_markdown(&self) -> Result<String> {
        render::to_markdown(&self.document, &self.render_options)
    }

    /// Convert to plain text.
    pub fn to_text(&self) -> Result<String> {
        render::to_text(&self.document, &self.render_options)
    }

    /// Convert to JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        render::to_json(&self.document, format)
    }

    /// Get plain text of all blocks.
    pub fn plain_text(&self) -> String {
        self.document.plain_text()
    }

    /// Document statistics.
    pub fn stats(&self) -> DocumentStats {
        DocumentStats::from_document(&self.document)
    }

    /// Get the document.
    pub fn document(&self) -> &Document {
        &self.document
    }
}
