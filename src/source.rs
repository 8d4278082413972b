//! Token sources: where span records come from.
//!
//! The engine never decodes PDFs or runs OCR itself. It pulls span records
//! page by page from a [`TokenSource`]; decoding backends implement the trait,
//! and [`MemorySource`] covers records already extracted to JSON.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::layout::{CoordinateOrigin, SpanRecord};

/// Abstract interface for per-page token extraction.
///
/// Implementations must be shareable across the page workers. A failing
/// `page_spans` call degrades only that page.
pub trait TokenSource: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Span records for one page (1-indexed).
    fn page_spans(&self, page: u32) -> Result<Vec<SpanRecord>>;

    /// Coordinate system of the boxes this source returns.
    fn origin(&self) -> CoordinateOrigin {
        CoordinateOrigin::TopLeft
    }
}

/// On-disk token file: a bare record array or an object with a page count.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenFile {
    Bare(Vec<SpanRecord>),
    Wrapped {
        #[serde(default)]
        page_count: Option<u32>,
        #[serde(default)]
        origin: CoordinateOrigin,
        tokens: Vec<SpanRecord>,
    },
}

/// Span records held in memory, grouped by page.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pages: BTreeMap<u32, Vec<SpanRecord>>,
    page_count: u32,
    origin: CoordinateOrigin,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Group records by their page number.
    ///
    /// The page count is the highest page number seen; pages in between with
    /// no records are empty. Records numbered page 0 are filed under page 1,
    /// where normalization rejects and counts them.
    pub fn from_records(records: impl IntoIterator<Item = SpanRecord>) -> Self {
        let mut pages: BTreeMap<u32, Vec<SpanRecord>> = BTreeMap::new();
        for record in records {
            pages.entry(record.page_number.max(1)).or_default().push(record);
        }
        let page_count = pages.keys().next_back().copied().unwrap_or(0);
        Self {
            pages,
            page_count,
            origin: CoordinateOrigin::TopLeft,
        }
    }

    /// Declare the page count explicitly (for trailing empty pages).
    pub fn with_page_count(mut self, page_count: u32) -> Self {
        self.page_count = self.page_count.max(page_count);
        self
    }

    /// Set the coordinate origin of the records.
    pub fn with_origin(mut self, origin: CoordinateOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Add records for a page.
    pub fn add_page(&mut self, page: u32, records: Vec<SpanRecord>) {
        let page = page.max(1);
        self.page_count = self.page_count.max(page);
        self.pages.entry(page).or_default().extend(records);
    }

    /// Parse a token file from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: TokenFile = serde_json::from_str(json)?;
        Ok(Self::from_file(file))
    }

    /// Read a token file from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let file: TokenFile = serde_json::from_reader(reader)?;
        Ok(Self::from_file(file))
    }

    /// Read a token file from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    fn from_file(file: TokenFile) -> Self {
        match file {
            TokenFile::Bare(records) => Self::from_records(records),
            TokenFile::Wrapped {
                page_count,
                origin,
                tokens,
            } => Self::from_records(tokens)
                .with_page_count(page_count.unwrap_or(0))
                .with_origin(origin),
        }
    }

    /// Total number of records across pages.
    pub fn record_count(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }
}

impl TokenSource for MemorySource {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_spans(&self, page: u32) -> Result<Vec<SpanRecord>> {
        if page == 0 || page > self.page_count {
            return Err(Error::PageOutOfRange(page, self.page_count));
        }
        Ok(self.pages.get(&page).cloned().unwrap_or_default())
    }

    fn origin(&self) -> CoordinateOrigin {
        self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_records_groups_pages() {
        let source = MemorySource::from_records(vec![
            SpanRecord::new("a", [0.0, 0.0, 1.0, 1.0], 1),
            SpanRecord::new("b", [0.0, 0.0, 1.0, 1.0], 3),
            SpanRecord::new("c", [0.0, 0.0, 1.0, 1.0], 1),
        ]);
        assert_eq!(source.page_count(), 3);
        assert_eq!(source.page_spans(1).unwrap().len(), 2);
        assert!(source.page_spans(2).unwrap().is_empty());
        assert!(matches!(
            source.page_spans(4),
            Err(Error::PageOutOfRange(4, 3))
        ));
    }

    #[test]
    fn test_page_zero_records_are_kept_for_validation() {
        let source = MemorySource::from_json_str(
            r#"[{"text": "sin página", "bbox": [50, 100, 110, 110], "page_number": 0}]"#,
        )
        .unwrap();
        assert_eq!(source.page_count(), 1);
        assert_eq!(source.record_count(), 1);
        assert_eq!(source.page_spans(1).unwrap()[0].page_number, 0);
    }

    #[test]
    fn test_bare_json_array() {
        let json = r#"[
            {"text": "Fecha", "bbox": [50, 100, 90, 110], "font_size": 10, "font_name": "Arial", "is_bold": false, "page_number": 1},
            {"text": "25-02-2025", "bbox": [200, 100, 260, 110], "page_number": 2}
        ]"#;
        let source = MemorySource::from_json_str(json).unwrap();
        assert_eq!(source.page_count(), 2);
        assert_eq!(source.record_count(), 2);
        assert_eq!(source.origin(), CoordinateOrigin::TopLeft);
    }

    #[test]
    fn test_wrapped_json_with_page_count() {
        let json = r#"{
            "page_count": 5,
            "origin": {"kind": "bottom_left", "page_height": 842.0},
            "tokens": [{"text": "x", "bbox": [0, 0, 1, 1], "page_number": 2}]
        }"#;
        let source = MemorySource::from_json_str(json).unwrap();
        assert_eq!(source.page_count(), 5);
        assert!(source.page_spans(5).unwrap().is_empty());
        assert_eq!(
            source.origin(),
            CoordinateOrigin::BottomLeft { page_height: 842.0 }
        );
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            MemorySource::from_json_str("{\"nope\": 1}"),
            Err(Error::Json(_))
        ));
    }
}
