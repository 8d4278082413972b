//! Rendering result with document statistics.

use serde::{Deserialize, Serialize};

use crate::model::{Block, BlockKind, Document};

/// Result of rendering a document, including content and statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResult {
    /// The rendered content (Markdown, text, etc.)
    pub content: String,

    /// Statistics over the rendered blocks
    pub stats: DocumentStats,
}

impl RenderResult {
    /// Create a new render result.
    pub fn new(content: String, stats: DocumentStats) -> Self {
        Self { content, stats }
    }

    /// Create a simple result with just content.
    pub fn content_only(content: String) -> Self {
        Self {
            content,
            stats: DocumentStats::default(),
        }
    }

    /// Get the content length in bytes.
    pub fn content_len(&self) -> usize {
        self.content.len()
    }
}

/// Counts describing a reconstructed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStats {
    /// Pages declared by the source
    pub page_count: u32,

    /// Pages that produced an empty degraded result
    pub degraded_page_count: u32,

    /// Header blocks
    pub header_count: u32,

    /// Paragraph blocks
    pub paragraph_count: u32,

    /// List item blocks
    pub list_item_count: u32,

    /// Table blocks
    pub table_count: u32,

    /// Body rows across all tables
    pub table_row_count: u32,

    /// Tokens dropped during normalization
    pub malformed_token_count: u32,

    /// Approximate word count (whitespace-separated tokens)
    pub word_count: u32,

    /// Character count (excluding whitespace)
    pub char_count: u32,

    /// Sum of block confidences, for the mean
    #[serde(skip)]
    confidence_sum: f64,
}

impl DocumentStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics for a whole document.
    pub fn from_document(doc: &Document) -> Self {
        let mut stats = Self {
            page_count: doc.page_count,
            degraded_page_count: doc.degraded_pages.len() as u32,
            malformed_token_count: doc.pages.iter().map(|p| p.malformed_tokens as u32).sum(),
            ..Default::default()
        };
        for block in &doc.blocks {
            stats.add_block(block);
            stats.count_text(&block.plain_text());
        }
        stats
    }

    /// Count one block by kind.
    pub fn add_block(&mut self, block: &Block) {
        match block.kind {
            BlockKind::Header => self.header_count += 1,
            BlockKind::Paragraph => self.paragraph_count += 1,
            BlockKind::List => self.list_item_count += 1,
            BlockKind::Table => {
                self.table_count += 1;
                self.table_row_count += block.as_table().map_or(0, |t| t.row_count() as u32);
            }
        }
        self.confidence_sum += block.confidence;
    }

    /// Total number of blocks counted.
    pub fn block_count(&self) -> u32 {
        self.header_count + self.paragraph_count + self.list_item_count + self.table_count
    }

    /// Mean block confidence, or 0 when there are no blocks.
    pub fn mean_confidence(&self) -> f64 {
        match self.block_count() {
            0 => 0.0,
            n => self.confidence_sum / n as f64,
        }
    }

    /// Add word and character counts from text.
    pub fn count_text(&mut self, text: &str) {
        self.word_count += text.split_whitespace().count() as u32;
        self.char_count += text.chars().filter(|c| !c.is_whitespace()).count() as u32;
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &DocumentStats) {
        self.page_count += other.page_count;
        self.degraded_page_count += other.degraded_page_count;
        self.header_count += other.header_count;
        self.paragraph_count += other.paragraph_count;
        self.list_item_count += other.list_item_count;
        self.table_count += other.table_count;
        self.table_row_count += other.table_row_count;
        self.malformed_token_count += other.malformed_token_count;
        self.word_count += other.word_count;
        self.char_count += other.char_count;
        self.confidence_sum += other.confidence_sum;
    }
}
