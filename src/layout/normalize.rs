//! Token normalization: maps raw span records onto canonical tokens.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::PageIssue;
use crate::model::{BBox, Token};

/// A positioned text span as produced by a PDF text layer or OCR backend.
///
/// This is the input record format; optional font metadata may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    /// Text content
    pub text: String,
    /// Bounding box `[x0, y0, x1, y1]`
    pub bbox: [f64; 4],
    /// Font size in points (0 = unknown)
    #[serde(default)]
    pub font_size: f64,
    /// Font name
    #[serde(default)]
    pub font_name: String,
    /// Whether the backend reported the span as bold
    #[serde(default)]
    pub is_bold: bool,
    /// Page number (1-indexed)
    #[serde(default = "default_page_number")]
    pub page_number: u32,
}

fn default_page_number() -> u32 {
    1
}

impl SpanRecord {
    /// Create a record with text and box only.
    pub fn new(text: impl Into<String>, bbox: [f64; 4], page_number: u32) -> Self {
        Self {
            text: text.into(),
            bbox,
            font_size: 0.0,
            font_name: String::new(),
            is_bold: false,
            page_number,
        }
    }

    /// Set font name and size.
    pub fn with_font(mut self, name: impl Into<String>, size: f64) -> Self {
        self.font_name = name.into();
        self.font_size = size;
        self
    }

    /// Mark the span as bold.
    pub fn bold(mut self) -> Self {
        self.is_bold = true;
        self
    }
}

/// Vertical origin of the backend's coordinate system.
///
/// The engine works top-down; PDF user space grows upward and is flipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoordinateOrigin {
    /// Y grows downward from the top of the page
    #[default]
    TopLeft,
    /// Y grows upward from the bottom of a page of the given height
    BottomLeft {
        /// Page height in the same units as the boxes
        page_height: f64,
    },
}

/// Tokens for one page plus what was dropped on the way.
#[derive(Debug, Clone, Default)]
pub struct NormalizedPage {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Valid tokens sorted by `(y0, x0)`
    pub tokens: Vec<Token>,
    /// Number of records that failed validation
    pub malformed: usize,
    /// One issue per dropped record
    pub issues: Vec<PageIssue>,
}

/// Validates span records and converts them to tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenNormalizer {
    origin: CoordinateOrigin,
}

impl TokenNormalizer {
    /// Create a normalizer for top-left coordinates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the coordinate origin of incoming boxes.
    pub fn with_origin(mut self, origin: CoordinateOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Normalize one page of records.
    ///
    /// Text is trimmed, NFC-normalized and has internal whitespace collapsed.
    /// Records with empty text, page number 0, non-finite coordinates or a
    /// zero-area box are dropped and counted. Inverted boxes are reordered.
    pub fn normalize(&self, page_number: u32, records: Vec<SpanRecord>) -> NormalizedPage {
        let mut page = NormalizedPage {
            page_number,
            ..Default::default()
        };

        for record in records {
            match self.to_token(page_number, record) {
                Ok(token) => page.tokens.push(token),
                Err(issue) => {
                    page.malformed += 1;
                    page.issues.push(issue);
                }
            }
        }

        if page.malformed > 0 {
            log::warn!(
                "page {}: dropped {} malformed token(s)",
                page_number,
                page.malformed
            );
        }

        page.tokens.sort_by(|a, b| {
            a.y0()
                .total_cmp(&b.y0())
                .then_with(|| a.x0().total_cmp(&b.x0()))
        });
        page
    }

    fn to_token(&self, page_number: u32, record: SpanRecord) -> Result<Token, PageIssue> {
        let text = clean_text(&record.text);
        let malformed = |reason: &str| PageIssue::MalformedToken {
            text: record.text.clone(),
            reason: reason.to_string(),
        };

        if text.is_empty() {
            return Err(malformed("empty text"));
        }
        if record.page_number == 0 {
            return Err(malformed("page number out of range"));
        }

        let [x0, y0, x1, y1] = record.bbox;
        let mut bbox = BBox::new(x0, y0, x1, y1);
        if !bbox.is_finite() {
            return Err(malformed("non-finite coordinates"));
        }
        if let CoordinateOrigin::BottomLeft { page_height } = self.origin {
            bbox = BBox::new(x0, page_height - y0, x1, page_height - y1);
        }
        let bbox = bbox.normalized();
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(malformed("zero-area bounding box"));
        }

        let font_size = if record.font_size.is_finite() && record.font_size > 0.0 {
            record.font_size
        } else {
            bbox.height()
        };
        let is_bold = record.is_bold || is_bold_font_name(&record.font_name);

        Ok(Token {
            text,
            bbox,
            font_size,
            font_name: record.font_name,
            is_bold,
            page_number,
        })
    }
}

/// Trim, compose and collapse whitespace runs to single spaces.
fn clean_text(text: &str) -> String {
    let composed: String = text
        .nfc()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    composed.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_bold_font_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("bold") || lower.contains("black") || lower.contains("heavy")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_malformed_records() {
        let records = vec![
            SpanRecord::new("ok", [10.0, 10.0, 30.0, 20.0], 1),
            SpanRecord::new("   ", [10.0, 30.0, 30.0, 40.0], 1),
            SpanRecord::new("nan", [f64::NAN, 30.0, 30.0, 40.0], 1),
            SpanRecord::new("flat", [10.0, 50.0, 30.0, 50.0], 1),
        ];

        let page = TokenNormalizer::new().normalize(1, records);
        assert_eq!(page.tokens.len(), 1);
        assert_eq!(page.malformed, 3);
        assert_eq!(page.issues.len(), 3);
        assert!(matches!(
            &page.issues[0],
            PageIssue::MalformedToken { reason, .. } if reason == "empty text"
        ));
    }

    #[test]
    fn test_page_zero_record_is_malformed() {
        let page = TokenNormalizer::new().normalize(
            1,
            vec![
                SpanRecord::new("válido", [10.0, 10.0, 50.0, 20.0], 1),
                SpanRecord::new("huérfano", [10.0, 30.0, 60.0, 40.0], 0),
            ],
        );
        assert_eq!(page.tokens.len(), 1);
        assert_eq!(page.malformed, 1);
        assert!(matches!(
            &page.issues[0],
            PageIssue::MalformedToken { text, reason }
                if text == "huérfano" && reason == "page number out of range"
        ));
    }

    #[test]
    fn test_sorts_and_repairs_boxes() {
        let records = vec![
            SpanRecord::new("second", [50.0, 100.0, 90.0, 110.0], 1),
            SpanRecord::new("first", [40.0, 20.0, 10.0, 10.0], 1),
        ];
        let page = TokenNormalizer::new().normalize(1, records);
        assert_eq!(page.tokens[0].text, "first");
        assert_eq!(page.tokens[0].bbox, BBox::new(10.0, 10.0, 40.0, 20.0));
    }

    #[test]
    fn test_font_fallbacks() {
        let records = vec![
            SpanRecord::new("Título", [10.0, 10.0, 60.0, 24.0], 1).with_font("Arial-BoldMT", 0.0),
            SpanRecord::new("body", [10.0, 40.0, 60.0, 50.0], 1).with_font("Arial", 10.0),
        ];
        let page = TokenNormalizer::new().normalize(2, records);
        assert_eq!(page.tokens[0].font_size, 14.0);
        assert!(page.tokens[0].is_bold);
        assert!(!page.tokens[1].is_bold);
        assert_eq!(page.tokens[1].page_number, 2);
    }

    #[test]
    fn test_text_cleanup() {
        let records = vec![SpanRecord::new(
            "  Potencia\u{00A0} nominal\t ",
            [0.0, 0.0, 10.0, 10.0],
            1,
        )];
        let page = TokenNormalizer::new().normalize(1, records);
        assert_eq!(page.tokens[0].text, "Potencia nominal");

        // Decomposed "é" is composed
        let page = TokenNormalizer::new().normalize(
            1,
            vec![SpanRecord::new("Me\u{0301}xico", [0.0, 0.0, 10.0, 10.0], 1)],
        );
        assert_eq!(page.tokens[0].text, "México");
    }

    #[test]
    fn test_bottom_left_origin_is_flipped() {
        let normalizer = TokenNormalizer::new().with_origin(CoordinateOrigin::BottomLeft {
            page_height: 800.0,
        });
        let page = normalizer.normalize(
            1,
            vec![
                SpanRecord::new("top", [10.0, 780.0, 50.0, 790.0], 1),
                SpanRecord::new("bottom", [10.0, 20.0, 50.0, 30.0], 1),
            ],
        );
        assert_eq!(page.tokens[0].text, "top");
        assert_eq!(page.tokens[0].bbox, BBox::new(10.0, 10.0, 50.0, 20.0));
    }

    #[test]
    fn test_record_defaults_from_json() {
        let record: SpanRecord =
            serde_json::from_str(r#"{"text": "x", "bbox": [0, 0, 1, 1]}"#).unwrap();
        assert_eq!(record.page_number, 1);
        assert_eq!(record.font_size, 0.0);
        assert!(!record.is_bold);
    }
}
