//! Section association: links blocks to their governing header.

use std::collections::BTreeMap;

use crate::model::Block;

/// Assigns `section_id` to every block in one pass over reading order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionAssociator;

impl SectionAssociator {
    /// Create an associator.
    pub fn new() -> Self {
        Self
    }

    /// Link blocks to headers and return the `block_id -> header_id` index.
    ///
    /// A non-header block points at the last header seen before it. A header
    /// points at the nearest preceding header with a smaller level, which
    /// yields the section hierarchy. Blocks before the first header have no
    /// section. Ids must already be assigned.
    pub fn associate(&self, blocks: &mut [Block]) -> BTreeMap<u64, u64> {
        let mut index = BTreeMap::new();
        // Open headers as (level, id), shallowest first
        let mut open: Vec<(u8, u64)> = Vec::new();

        for block in blocks.iter_mut() {
            if block.is_header() {
                let level = block.level.unwrap_or(1);
                while open.last().is_some_and(|(l, _)| *l >= level) {
                    open.pop();
                }
                block.section_id = open.last().map(|(_, id)| *id);
                open.push((level, block.id));
            } else {
                block.section_id = open.last().map(|(_, id)| *id);
            }

            if let Some(section) = block.section_id {
                index.insert(block.id, section);
            }
        }

        index
    }
}
