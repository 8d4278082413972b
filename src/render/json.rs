//! JSON rendering for reconstructed documents.

use crate::error::{Error, Result};
use crate::model::Document;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Convert a document to JSON.
pub fn to_json(doc: &Document, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(doc),
        JsonFormat::Compact => serde_json::to_string(doc),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

/// Read a document back from its JSON form.
pub fn from_json(json: &str) -> Result<Document> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageIssue;
    use crate::model::{BBox, Block, BlockKind, PageReport};

    fn sample() -> Document {
        let mut doc = Document::new();
        doc.page_count = 2;
        let mut header = Block::text(BlockKind::Header, 1, BBox::new(50.0, 80.0, 200.0, 96.0), "1 Objeto");
        header.id = 1;
        header.level = Some(1);
        header.confidence = 0.9;
        let mut para = Block::text(BlockKind::Paragraph, 1, BBox::new(50.0, 100.0, 400.0, 122.5), "Texto.");
        para.id = 2;
        para.section_id = Some(1);
        para.confidence = 0.65;
        doc.blocks = vec![header, para];
        doc.sections.insert(2, 1);
        doc.pages = vec![PageReport::ok(1), PageReport::degraded(2, PageIssue::EmptyPage)];
        doc.degraded_pages = vec![2];
        doc
    }

    #[test]
    fn test_to_json_pretty() {
        let json = to_json(&sample(), JsonFormat::Pretty).unwrap();
        assert!(json.contains("\"type\": \"header\""));
        assert!(json.contains("\"degraded_pages\""));
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_to_json_compact() {
        let json = to_json(&sample(), JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_round_trip() {
        let doc = sample();
        let back = from_json(&to_json(&doc, JsonFormat::Compact).unwrap()).unwrap();
        assert_eq!(back, doc);
    }
}
