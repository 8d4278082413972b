//! Plain text rendering for reconstructed documents.

use crate::error::Result;
use crate::model::{Document, Payload};

use super::RenderOptions;

/// Convert a document to plain text.
///
/// Blocks are separated by blank lines. Key-value tables render as
/// `field: value` lines, grid tables as tab-separated rows.
pub fn to_text(doc: &Document, options: &RenderOptions) -> Result<String> {
    let parts: Vec<String> = doc
        .blocks
        .iter()
        .filter(|b| options.includes(b))
        .map(|block| match &block.payload {
            Payload::Table(table) if table.is_key_value() => {
                let mut lines: Vec<String> = table.title.iter().cloned().collect();
                lines.extend(
                    table
                        .pairs()
                        .into_iter()
                        .map(|pair| format!("{}: {}", pair.field, pair.value)),
                );
                lines.join("\n")
            }
            _ => block.plain_text(),
        })
        .collect();

    Ok(parts.join("\n\n").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, Block, BlockKind, Table, TableLayout, TableRow};

    #[test]
    fn test_to_text() {
        let mut doc = Document::new();
        let mut table = Table::new();
        table.layout = TableLayout::KeyValue;
        table.add_row(TableRow::from_strings(["Potencia", "150 MW"]));
        doc.blocks = vec![
            Block::text(BlockKind::Header, 1, BBox::default(), "Datos de placa"),
            Block::table(1, BBox::default(), table),
            Block::text(BlockKind::Paragraph, 2, BBox::default(), "Second paragraph."),
        ];

        let result = to_text(&doc, &RenderOptions::default()).unwrap();
        assert_eq!(result, "Datos de placa\n\nPotencia: 150 MW\n\nSecond paragraph.");

        let page_one = to_text(&doc, &RenderOptions::default().with_page_list(vec![1])).unwrap();
        assert!(!page_one.contains("Second"));
    }
}
