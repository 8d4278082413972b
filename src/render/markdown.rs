//! Markdown rendering for reconstructed documents.

use crate::error::Result;
use crate::layout::{list_marker, ListMarker};
use crate::model::{Block, BlockKind, Document, Payload, Table};

use super::{DocumentStats, RenderOptions, RenderResult};

/// Convert a document to Markdown.
pub fn to_markdown(doc: &Document, options: &RenderOptions) -> Result<String> {
    let renderer = MarkdownRenderer::new(options.clone());
    renderer.render(doc)
}

/// Convert a document to Markdown with statistics.
pub fn to_markdown_with_stats(doc: &Document, options: &RenderOptions) -> Result<RenderResult> {
    let renderer = MarkdownRenderer::new(options.clone());
    renderer.render_with_stats(doc)
}

/// Markdown renderer.
pub struct MarkdownRenderer {
    options: RenderOptions,
    stats: DocumentStats,
}

impl MarkdownRenderer {
    /// Create a new Markdown renderer.
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            stats: DocumentStats::new(),
        }
    }

    /// Render a document to Markdown.
    pub fn render(mut self, doc: &Document) -> Result<String> {
        self.render_internal(doc)
    }

    /// Render a document to Markdown with statistics over the rendered blocks.
    pub fn render_with_stats(mut self, doc: &Document) -> Result<RenderResult> {
        self.options.collect_stats = true;
        self.stats.page_count = doc.page_count;
        self.stats.degraded_page_count = doc.degraded_pages.len() as u32;
        let content = self.render_internal(doc)?;
        self.stats.count_text(&content);
        Ok(RenderResult::new(content, self.stats))
    }

    fn render_internal(&mut self, doc: &Document) -> Result<String> {
        let mut output = String::new();
        let mut current_page = 0;
        let mut previous: Option<BlockKind> = None;

        let blocks: Vec<&Block> = doc
            .blocks
            .iter()
            .filter(|b| self.options.includes(b))
            .collect();

        for block in blocks {
            if self.options.page_markers && block.page() != current_page {
                current_page = block.page();
                output.push_str(&format!("<!-- page {} -->\n\n", current_page));
                previous = None;
            }
            if block.kind == BlockKind::List && previous == Some(BlockKind::List) {
                // Consecutive items stay in one list
                output.pop();
            }
            previous = Some(block.kind);
            if self.options.collect_stats {
                self.stats.add_block(block);
            }
            self.render_block(&mut output, block);
        }

        Ok(output.trim().to_string())
    }

    fn render_block(&self, output: &mut String, block: &Block) {
        match (&block.payload, block.kind) {
            (Payload::Table(table), _) => self.render_table(output, table),
            (Payload::Text(text), BlockKind::Header) => {
                let level = block
                    .level
                    .unwrap_or(1)
                    .min(self.options.max_heading_level)
                    .max(1);
                output.push_str(&"#".repeat(level as usize));
                output.push(' ');
                output.push_str(&self.escape(text));
                output.push_str("\n\n");
            }
            (Payload::Text(text), BlockKind::List) => {
                self.render_list_item(output, text);
                // A following non-list block needs a blank line
                output.push('\n');
            }
            (Payload::Text(text), _) => {
                output.push_str(&self.escape(text));
                output.push_str("\n\n");
            }
        }
    }

    fn render_list_item(&self, output: &mut String, text: &str) {
        match list_marker(text) {
            Some(ListMarker::Bullet) => {
                let body = text.chars().skip(1).collect::<String>();
                output.push(self.options.list_marker);
                output.push(' ');
                output.push_str(&self.escape(body.trim_start()));
            }
            _ => {
                output.push_str(&self.escape(text));
            }
        }
        output.push('\n');
    }

    fn render_table(&self, output: &mut String, table: &Table) {
        if table.is_empty() {
            return;
        }

        if self.options.table_titles {
            if let Some(ref title) = table.title {
                output.push_str(&format!("**{}**\n\n", self.escape(title)));
            }
        }

        if table.is_key_value() {
            for pair in table.pairs() {
                output.push_str(&format!(
                    "{} **{}**: {}\n",
                    self.options.list_marker,
                    self.escape(&pair.field),
                    self.escape(&pair.value)
                ));
            }
            output.push('\n');
            return;
        }

        let col_count = table.column_count();
        if col_count == 0 {
            return;
        }

        // Without a detected header row, the first body row takes its place
        let (header, body) = if table.headers.is_empty() {
            (&table.rows[0].cells, &table.rows[1..])
        } else {
            (&table.headers, &table.rows[..])
        };

        self.render_table_row(output, header, col_count);
        output.push('|');
        for _ in 0..col_count {
            output.push_str(" --- |");
        }
        output.push('\n');
        for row in body {
            self.render_table_row(output, &row.cells, col_count);
        }
        output.push('\n');
    }

    fn render_table_row(&self, output: &mut String, cells: &[String], col_count: usize) {
        output.push('|');
        for i in 0..col_count {
            let content = cells.get(i).map(String::as_str).unwrap_or("");
            let content = escape_markdown(&content.replace('\n', " "));
            output.push_str(&format!(" {} |", content.trim()));
        }
        output.push('\n');
    }

    fn escape(&self, text: &str) -> String {
        if self.options.escape_special_chars {
            escape_markdown(text)
        } else {
            text.to_string()
        }
    }
}

/// Escape special Markdown characters.
/// Only escape characters that could be misinterpreted as Markdown syntax.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '`' | '*' | '_' | '[' | ']' | '|' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, TableLayout, TableRow};

    fn text_block(kind: BlockKind, page: u32, text: &str) -> Block {
        let mut b = Block::text(kind, page, BBox::default(), text);
        b.confidence = 0.8;
        b
    }

    fn doc(blocks: Vec<Block>) -> Document {
        let mut doc = Document::new();
        doc.page_count = blocks.iter().map(|b| b.page()).max().unwrap_or(0);
        doc.blocks = blocks;
        doc
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("Hello *world*"), "Hello \\*world\\*");
        assert_eq!(escape_markdown("[link]"), "\\[link\\]");
    }

    #[test]
    fn test_render_heading_and_paragraph() {
        let mut header = text_block(BlockKind::Header, 1, "2.1 Alcance");
        header.level = Some(2);
        let doc = doc(vec![
            header,
            text_block(BlockKind::Paragraph, 1, "El ensayo se realizó en servicio."),
        ]);

        let result = to_markdown(&doc, &RenderOptions::new()).unwrap();
        assert_eq!(result, "## 2.1 Alcance\n\nEl ensayo se realizó en servicio.");

        let capped = to_markdown(&doc, &RenderOptions::new().with_max_heading(1)).unwrap();
        assert!(capped.starts_with("# 2.1 Alcance"));
    }

    #[test]
    fn test_render_list_items() {
        let doc = doc(vec![
            text_block(BlockKind::List, 1, "• Inspección visual"),
            text_block(BlockKind::List, 1, "• Medición de aislamiento"),
            text_block(BlockKind::Paragraph, 1, "Fin de la lista de tareas."),
        ]);

        let result = to_markdown(&doc, &RenderOptions::new()).unwrap();
        assert_eq!(
            result,
            "- Inspección visual\n- Medición de aislamiento\n\nFin de la lista de tareas."
        );
    }

    #[test]
    fn test_render_grid_table() {
        let mut table = Table::new();
        table.title = Some("Tabla 1. Resultados".to_string());
        table.headers = vec!["Fase".to_string(), "Valor".to_string()];
        table.add_row(TableRow::from_strings(["R", "1,2"]));
        table.add_row(TableRow::from_strings(["S"]));
        let doc = doc(vec![Block::table(1, BBox::default(), table)]);

        let result = to_markdown(&doc, &RenderOptions::new()).unwrap();
        assert_eq!(
            result,
            "**Tabla 1. Resultados**\n\n| Fase | Valor |\n| --- | --- |\n| R | 1,2 |\n| S |  |"
        );
    }

    #[test]
    fn test_render_key_value_table() {
        let mut table = Table::new();
        table.layout = TableLayout::KeyValue;
        table.add_row(TableRow::from_strings(["Fecha", "25-02-2025"]));
        table.add_row(TableRow::from_strings(["Hora", "15:16"]));
        let doc = doc(vec![Block::table(1, BBox::default(), table)]);

        let result = to_markdown(&doc, &RenderOptions::new()).unwrap();
        assert_eq!(result, "- **Fecha**: 25-02-2025\n- **Hora**: 15:16");
    }

    #[test]
    fn test_page_markers_and_filters() {
        let mut weak = text_block(BlockKind::Paragraph, 2, "Texto de baja confianza.");
        weak.confidence = 0.3;
        let doc = doc(vec![
            text_block(BlockKind::Paragraph, 1, "Primera página del informe."),
            weak,
            text_block(BlockKind::Paragraph, 2, "Segunda página del informe."),
        ]);

        let options = RenderOptions::new()
            .with_page_markers(true)
            .with_min_confidence(0.5);
        let result = to_markdown(&doc, &options).unwrap();
        assert_eq!(
            result,
            "<!-- page 1 -->\n\nPrimera página del informe.\n\n<!-- page 2 -->\n\nSegunda página del informe."
        );
    }

    #[test]
    fn test_render_with_stats() {
        let doc = doc(vec![
            text_block(BlockKind::Header, 1, "Resumen"),
            text_block(BlockKind::Paragraph, 1, "Dos palabras."),
        ]);
        let result = to_markdown_with_stats(&doc, &RenderOptions::new()).unwrap();
        assert_eq!(result.stats.header_count, 1);
        assert_eq!(result.stats.paragraph_count, 1);
        assert_eq!(result.stats.page_count, 1);
    }
}
