//! Blocks, the durable output unit of layout reconstruction.

use serde::{Deserialize, Serialize};

use super::{BBox, Table};

/// A classified, confidence-scored content unit.
///
/// `section_id` is a weak reference to the governing header block: it holds
/// an id that is resolved through [`Document::block`](super::Document::block),
/// never an owning pointer, so blocks stay acyclic and serialize independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Document-wide id, assigned in reading order starting at 1
    pub id: u64,

    /// Block type
    #[serde(rename = "type")]
    pub kind: BlockKind,

    /// Pages covered by the block
    pub page_range: PageRange,

    /// Union of the member tokens' boxes
    pub bbox: BBox,

    /// Text or table content
    #[serde(flatten)]
    pub payload: Payload,

    /// Classification confidence in `[0, 0.99]`
    pub confidence: f64,

    /// Id of the nearest governing header block
    pub section_id: Option<u64>,

    /// Section depth for header blocks (1 = top level)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

impl Block {
    /// Create a text block. The id is assigned later by the document assembler.
    pub fn text(kind: BlockKind, page: u32, bbox: BBox, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind,
            page_range: PageRange::single(page),
            bbox,
            payload: Payload::Text(text.into()),
            confidence: 0.0,
            section_id: None,
            level: None,
        }
    }

    /// Create a table block.
    pub fn table(page: u32, bbox: BBox, table: Table) -> Self {
        Self {
            id: 0,
            kind: BlockKind::Table,
            page_range: PageRange::single(page),
            bbox,
            payload: Payload::Table(table),
            confidence: 0.0,
            section_id: None,
            level: None,
        }
    }

    /// Check if this block is a header.
    pub fn is_header(&self) -> bool {
        self.kind == BlockKind::Header
    }

    /// Check if this block is a table.
    pub fn is_table(&self) -> bool {
        self.kind == BlockKind::Table
    }

    /// The table payload, if any.
    pub fn as_table(&self) -> Option<&Table> {
        match &self.payload {
            Payload::Table(t) => Some(t),
            Payload::Text(_) => None,
        }
    }

    /// The text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(s) => Some(s),
            Payload::Table(_) => None,
        }
    }

    /// Get plain text content (tables are tab-separated).
    pub fn plain_text(&self) -> String {
        match &self.payload {
            Payload::Text(s) => s.clone(),
            Payload::Table(t) => t.plain_text(),
        }
    }

    /// First page of the block.
    pub fn page(&self) -> u32 {
        self.page_range.start
    }
}

/// Type of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// A section header
    Header,
    /// A paragraph of narrative text
    Paragraph,
    /// A table
    Table,
    /// A list item
    List,
}

impl BlockKind {
    /// Lowercase name as used in JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Header => "header",
            BlockKind::Paragraph => "paragraph",
            BlockKind::Table => "table",
            BlockKind::List => "list",
        }
    }
}

/// Content of a block, serialized as either a `text` or a `table` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Free text (header, paragraph, list)
    Text(String),
    /// Table content
    Table(Table),
}

/// Inclusive range of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    /// First page (1-indexed)
    pub start: u32,
    /// Last page (1-indexed)
    pub end: u32,
}

impl PageRange {
    /// A range covering one page.
    pub fn single(page: u32) -> Self {
        Self {
            start: page,
            end: page,
        }
    }

    /// Check if the range covers a page.
    pub fn contains(&self, page: u32) -> bool {
        page >= self.start && page <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableRow;

    #[test]
    fn test_text_block_json_shape() {
        let mut block = Block::text(
            BlockKind::Paragraph,
            1,
            BBox::new(0.0, 0.0, 10.0, 10.0),
            "Hello",
        );
        block.id = 7;
        block.confidence = 0.75;

        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["type"], "paragraph");
        assert_eq!(json["text"], "Hello");
        assert!(json["section_id"].is_null());
        assert!(json.get("table").is_none());
        assert!(json.get("level").is_none());
    }

    #[test]
    fn test_table_block_round_trip() {
        let mut table = Table::new();
        table.add_row(TableRow::from_strings(["a", "b"]));
        let mut block = Block::table(3, BBox::new(1.0, 2.0, 3.0, 4.0), table);
        block.id = 2;
        block.section_id = Some(1);

        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"table\""));
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
        assert!(back.as_table().is_some());
    }

    #[test]
    fn test_page_range() {
        let r = PageRange::single(4);
        assert!(r.contains(4));
        assert!(!r.contains(5));
    }
}
