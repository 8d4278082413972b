//! Document-level types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Block, BlockKind};
use crate::error::PageIssue;

/// A reconstructed document: blocks in reading order plus per-page reports.
///
/// A document is built once per processing run and not patched afterwards;
/// re-running a page produces a new document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    /// Blocks in reading order (page, then Y, then X)
    pub blocks: Vec<Block>,

    /// Number of pages the source declared
    pub page_count: u32,

    /// Pages that contributed an empty result because they failed, timed out or were empty
    pub degraded_pages: Vec<u32>,

    /// Per-page processing reports, in page order
    #[serde(default)]
    pub pages: Vec<PageReport>,

    /// Index from block id to the id of its governing header
    #[serde(default)]
    pub sections: BTreeMap<u64, u64>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the document has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Look up a block by id.
    pub fn block(&self, id: u64) -> Option<&Block> {
        self.blocks
            .binary_search_by_key(&id, |b| b.id)
            .ok()
            .map(|idx| &self.blocks[idx])
    }

    /// Resolve the header governing a block.
    pub fn section_of(&self, id: u64) -> Option<&Block> {
        self.sections.get(&id).and_then(|sid| self.block(*sid))
    }

    /// Blocks located on a page.
    pub fn blocks_on_page(&self, page: u32) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(move |b| b.page_range.contains(page))
    }

    /// Blocks of a given kind.
    pub fn blocks_of_kind(&self, kind: BlockKind) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(move |b| b.kind == kind)
    }

    /// Report for a page.
    pub fn page_report(&self, page: u32) -> Option<&PageReport> {
        self.pages.iter().find(|p| p.page_number == page)
    }

    /// Check if a page is degraded.
    pub fn is_degraded(&self, page: u32) -> bool {
        self.degraded_pages.contains(&page)
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Build the section outline from header blocks.
    pub fn outline(&self) -> Outline {
        let mut outline = Outline::new();
        // Path of open items by level; children are attached when a shallower or equal
        // header closes them.
        let mut stack: Vec<OutlineItem> = Vec::new();

        for block in self.blocks.iter().filter(|b| b.is_header()) {
            let level = block.level.unwrap_or(1);
            let item = OutlineItem::new(block.id, block.plain_text(), block.page(), level);

            while stack.last().is_some_and(|open| open.level >= level) {
                close_outline_item(&mut stack, &mut outline);
            }
            stack.push(item);
        }
        while !stack.is_empty() {
            close_outline_item(&mut stack, &mut outline);
        }

        outline
    }
}

fn close_outline_item(stack: &mut Vec<OutlineItem>, outline: &mut Outline) {
    if let Some(done) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.add_child(done),
            None => outline.add_item(done),
        }
    }
}

/// Outcome of processing one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    /// Page number (1-indexed)
    pub page_number: u32,

    /// Whether the page produced normal output
    pub status: PageStatus,

    /// Tokens dropped by validation
    pub malformed_tokens: usize,

    /// Blocks contributed to the document
    pub block_count: usize,

    /// Non-fatal issues encountered on the page
    #[serde(default)]
    pub issues: Vec<PageIssue>,
}

impl PageReport {
    /// Create a report for a page that processed normally.
    pub fn ok(page_number: u32) -> Self {
        Self {
            page_number,
            status: PageStatus::Ok,
            malformed_tokens: 0,
            block_count: 0,
            issues: Vec::new(),
        }
    }

    /// Create a report for a degraded page.
    pub fn degraded(page_number: u32, issue: PageIssue) -> Self {
        Self {
            page_number,
            status: PageStatus::Degraded,
            malformed_tokens: 0,
            block_count: 0,
            issues: vec![issue],
        }
    }

    /// Check if the page is degraded.
    pub fn is_degraded(&self) -> bool {
        self.status == PageStatus::Degraded
    }
}

/// Page processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    /// Normal output
    Ok,
    /// Empty but valid output after a failure
    Degraded,
}

/// Section outline built from header blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    /// Top-level outline items
    pub items: Vec<OutlineItem>,
}

impl Outline {
    /// Create a new empty outline.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add an item to the outline.
    pub fn add_item(&mut self, item: OutlineItem) {
        self.items.push(item);
    }

    /// Check if the outline is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the total number of items (including nested).
    pub fn total_items(&self) -> usize {
        fn count_items(items: &[OutlineItem]) -> usize {
            items
                .iter()
                .map(|item| 1 + count_items(&item.children))
                .sum()
        }
        count_items(&self.items)
    }
}

/// A single outline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineItem {
    /// Header block id
    pub block_id: u64,

    /// Header text
    pub title: String,

    /// Page the header is on
    pub page: u32,

    /// Section depth (1 = top level)
    pub level: u8,

    /// Child sections
    pub children: Vec<OutlineItem>,
}

impl OutlineItem {
    /// Create a new outline item.
    pub fn new(block_id: u64, title: impl Into<String>, page: u32, level: u8) -> Self {
        Self {
            block_id,
            title: title.into(),
            page,
            level,
            children: Vec::new(),
        }
    }

    /// Add a child item.
    pub fn add_child(&mut self, child: OutlineItem) {
        self.children.push(child);
    }
}
