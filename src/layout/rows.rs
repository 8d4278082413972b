//! Row clustering: groups a page's tokens into horizontal rows.

use std::cmp::Ordering;

use crate::model::{BBox, Token};

use super::config::LayoutConfig;
use super::signals::is_spaceless_script_char;

/// Tokens sharing a Y band, ordered left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Tokens sorted by X
    pub tokens: Vec<Token>,
    /// Reference Y: top edge of the token that opened the row
    pub y: f64,
    /// Union of the tokens' boxes
    pub bbox: BBox,
}

impl Row {
    /// Build a row from tokens. The reference Y is the smallest top edge.
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        tokens.sort_by(|a, b| a.x0().partial_cmp(&b.x0()).unwrap_or(Ordering::Equal));
        let y = tokens
            .iter()
            .map(|t| t.y0())
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .unwrap_or(0.0);
        let bbox = BBox::union_all(tokens.iter().map(|t| &t.bbox)).unwrap_or_default();
        Self { tokens, y, bbox }
    }

    /// Left edge of the row.
    pub fn left(&self) -> f64 {
        self.bbox.x0
    }

    /// Check if the row has no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Combined text of the row.
    ///
    /// Tokens are joined with a single space, except between two characters
    /// of a script written without word spaces.
    pub fn text(&self) -> String {
        let mut result = String::new();
        let mut prev_last: Option<char> = None;

        for token in &self.tokens {
            let first = token.text.chars().next();
            if let (Some(prev), Some(curr)) = (prev_last, first) {
                let spaceless = is_spaceless_script_char(prev) && is_spaceless_script_char(curr);
                if !spaceless && !prev.is_whitespace() && !curr.is_whitespace() {
                    result.push(' ');
                }
            }
            result.push_str(&token.text);
            prev_last = token.text.chars().last().or(prev_last);
        }

        result
    }

    /// Dominant font size (weighted by character count).
    pub fn font_size(&self) -> f64 {
        let total_chars: usize = self.tokens.iter().map(|t| t.char_count()).sum();
        if total_chars == 0 {
            return self.tokens.first().map(|t| t.font_size).unwrap_or(0.0);
        }
        let weighted: f64 = self
            .tokens
            .iter()
            .map(|t| t.font_size * t.char_count() as f64)
            .sum();
        weighted / total_chars as f64
    }

    /// Check if the row is predominantly bold.
    pub fn is_bold(&self) -> bool {
        let bold_chars: usize = self
            .tokens
            .iter()
            .filter(|t| t.is_bold)
            .map(|t| t.char_count())
            .sum();
        let total_chars = self.char_count();
        total_chars > 0 && bold_chars as f64 / total_chars as f64 > 0.5
    }

    /// Check if every token in the row is bold.
    pub fn is_all_bold(&self) -> bool {
        !self.tokens.is_empty() && self.tokens.iter().all(|t| t.is_bold)
    }

    /// Total characters across tokens.
    pub fn char_count(&self) -> usize {
        self.tokens.iter().map(|t| t.char_count()).sum()
    }
}

/// Groups tokens into rows with a single sweep by ascending Y.
#[derive(Debug, Clone)]
pub struct RowClusterer<'a> {
    config: &'a LayoutConfig,
}

impl<'a> RowClusterer<'a> {
    /// Create a clusterer using the configured Y tolerance.
    pub fn new(config: &'a LayoutConfig) -> Self {
        Self { config }
    }

    /// Partition tokens into rows ordered top to bottom.
    ///
    /// A token joins the current row when its top edge is within `y_tolerance`
    /// of the row's reference Y (the first token's top edge); otherwise the row
    /// is closed and a new one starts. Every token lands in exactly one row.
    pub fn cluster(&self, mut tokens: Vec<Token>) -> Vec<Row> {
        tokens.sort_by(|a, b| {
            a.y0()
                .total_cmp(&b.y0())
                .then_with(|| a.x0().total_cmp(&b.x0()))
        });

        let mut rows: Vec<Row> = Vec::new();
        let mut current: Vec<Token> = Vec::new();
        let mut reference_y: Option<f64> = None;

        for token in tokens {
            match reference_y {
                Some(y) if (token.y0() - y).abs() <= self.config.y_tolerance => {
                    current.push(token);
                }
                _ => {
                    if !current.is_empty() {
                        rows.push(Row::from_tokens(std::mem::take(&mut current)));
                    }
                    reference_y = Some(token.y0());
                    current.push(token);
                }
            }
        }

        if !current.is_empty() {
            rows.push(Row::from_tokens(current));
        }

        log::trace!("RowClusterer: {} rows", rows.len());
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(text: &str, x: f64, y: f64) -> Token {
        Token::new(text, BBox::new(x, y, x + 6.0 * text.len() as f64, y + 10.0), 1)
    }

    #[test]
    fn test_cluster_groups_by_y() {
        let config = LayoutConfig::default();
        let rows = RowClusterer::new(&config).cluster(vec![
            tok("B1", 60.0, 101.0),
            tok("A2", 10.0, 120.0),
            tok("A1", 10.0, 100.0),
            tok("B2", 60.0, 122.5),
        ]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text(), "A1 B1");
        assert_eq!(rows[0].y, 100.0);
        assert_eq!(rows[1].text(), "A2 B2");
    }

    #[test]
    fn test_tolerance_is_measured_from_reference() {
        let config = LayoutConfig::default().with_y_tolerance(3.0);
        // 102.5 joins the row opened at 100; 104.0 is 4 units away and starts a new one
        let rows = RowClusterer::new(&config).cluster(vec![
            tok("a", 10.0, 100.0),
            tok("b", 30.0, 102.5),
            tok("c", 50.0, 104.0),
        ]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tokens.len(), 2);
        assert_eq!(rows[1].text(), "c");
    }

    #[test]
    fn test_recluster_row_is_idempotent() {
        let config = LayoutConfig::default();
        let clusterer = RowClusterer::new(&config);
        let rows = clusterer.cluster(vec![
            tok("x", 40.0, 52.0),
            tok("y", 10.0, 50.0),
            tok("z", 70.0, 53.0),
            tok("w", 10.0, 80.0),
        ]);

        for row in &rows {
            let again = clusterer.cluster(row.tokens.clone());
            assert_eq!(again.len(), 1);
            assert_eq!(&again[0], row);
        }
    }

    #[test]
    fn test_row_text_cjk_spacing() {
        let row = Row::from_tokens(vec![tok("日本", 10.0, 0.0), tok("語", 30.0, 0.0), tok("ok", 50.0, 0.0)]);
        assert_eq!(row.text(), "日本語 ok");
    }

    #[test]
    fn test_row_font_and_bold() {
        let row = Row::from_tokens(vec![
            tok("abcd", 10.0, 0.0).with_font("Arial-Bold", 12.0).bold(),
            tok("ef", 50.0, 0.0).with_font("Arial", 6.0),
        ]);
        assert!(row.is_bold());
        assert!(!row.is_all_bold());
        assert_eq!(row.font_size(), 10.0);
        assert_eq!(row.char_count(), 6);
    }
}
