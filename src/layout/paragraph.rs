//! Paragraph assembly from rows not claimed by a table.

use std::collections::HashSet;

use crate::model::BBox;

use super::config::LayoutConfig;
use super::rows::Row;
use super::signals::{self, HeaderSignal, ListMarker, PageStyle};
use super::table::CandidateRow;

/// What the assembler took a draft to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftHint {
    /// A single header line
    Header(HeaderSignal),
    /// A list item and its indented continuation lines
    ListItem(ListMarker),
    /// One or more `label: value` lines
    LabelValue,
    /// Narrative text
    Narrative,
}

/// A run of rows merged into one text unit, awaiting classification.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDraft {
    /// Routing decision of the assembler
    pub hint: DraftHint,
    /// Member rows, top to bottom
    pub rows: Vec<Row>,
    /// Joined text
    pub text: String,
    /// Union of the rows' boxes
    pub bbox: BBox,
    /// Whether any row came from a rejected table candidate
    pub reverted_table: bool,
    /// Dominant font size of the first row
    pub font_size: f64,
    /// Whether the first row is predominantly bold
    pub bold: bool,
}

impl TextDraft {
    fn open(hint: DraftHint, candidate: CandidateRow) -> Self {
        let text = candidate.row.text();
        Self {
            hint,
            bbox: candidate.row.bbox,
            font_size: candidate.row.font_size(),
            bold: candidate.row.is_bold(),
            reverted_table: candidate.reverted_table,
            rows: vec![candidate.row],
            text,
        }
    }

    fn push(&mut self, candidate: CandidateRow) {
        join_line(&mut self.text, &candidate.row.text());
        self.bbox = self.bbox.union(&candidate.row.bbox);
        self.reverted_table |= candidate.reverted_table;
        self.rows.push(candidate.row);
    }

    /// Text of the first row.
    pub fn first_line(&self) -> String {
        self.rows.first().map(Row::text).unwrap_or_default()
    }

    /// Number of rows merged into the draft.
    pub fn line_count(&self) -> usize {
        self.rows.len()
    }

    fn last_row(&self) -> &Row {
        // A draft is never empty: it is opened with one row
        &self.rows[self.rows.len() - 1]
    }
}

/// Drafts for one page plus the number of rows filtered as noise.
#[derive(Debug, Clone, Default)]
pub struct ParagraphAssembly {
    /// Drafts in top-to-bottom order
    pub drafts: Vec<TextDraft>,
    /// Rows and short paragraphs dropped as non-narrative fragments
    pub discarded: usize,
}

/// Two consecutive rows continue one paragraph.
///
/// Requires the same left margin within `margin_tolerance` and a vertical gap
/// (difference of reference Y) strictly below `line_gap_threshold`.
pub fn continues_paragraph(prev: &Row, next: &Row, config: &LayoutConfig) -> bool {
    (next.left() - prev.left()).abs() <= config.margin_tolerance
        && next.y - prev.y < config.line_gap_threshold
}

/// Merges leftover rows into headers, list items and paragraphs.
#[derive(Debug, Clone)]
pub struct ParagraphAssembler<'a> {
    config: &'a LayoutConfig,
    style: &'a PageStyle,
}

impl<'a> ParagraphAssembler<'a> {
    /// Create an assembler for a page.
    pub fn new(config: &'a LayoutConfig, style: &'a PageStyle) -> Self {
        Self { config, style }
    }

    /// Route and merge rows in reading order.
    ///
    /// Header lines, list markers and `label: value` lines are split off
    /// before narrative merging. Bare dates, percentages, page numbers and
    /// repeats of a header already seen on the page are dropped. Anything
    /// ambiguous is kept as narrative.
    pub fn assemble(&self, rows: Vec<CandidateRow>) -> ParagraphAssembly {
        let mut out = ParagraphAssembly::default();
        let mut open: Option<TextDraft> = None;
        let mut headers_seen: HashSet<String> = HashSet::new();

        for candidate in rows {
            let row = &candidate.row;
            let text = row.text();

            if signals::is_non_narrative_fragment(&text) || headers_seen.contains(&text) {
                log::trace!("ParagraphAssembler: dropping fragment {:?}", text);
                out.discarded += 1;
                continue;
            }

            // A wrapped line that happens to open with a number stays in its paragraph
            let wrapped = open.as_ref().is_some_and(|draft| self.is_wrapped_line(draft, row));

            if !wrapped {
                if let Some(signal) = signals::header_signal(
                    &text,
                    row.font_size(),
                    row.is_bold(),
                    self.style,
                    self.config,
                ) {
                    self.flush(&mut open, &mut out);
                    headers_seen.insert(text);
                    out.drafts
                        .push(TextDraft::open(DraftHint::Header(signal), candidate));
                    continue;
                }
            }

            let numbered = if wrapped {
                None
            } else {
                signals::numbering(&text).map(|_| ListMarker::Numbered)
            };
            let marker = signals::list_marker(&text).or(numbered);
            if let Some(marker) = marker {
                self.flush(&mut open, &mut out);
                open = Some(TextDraft::open(DraftHint::ListItem(marker), candidate));
                continue;
            }

            let hint = if signals::label_value(&text).is_some() {
                DraftHint::LabelValue
            } else {
                DraftHint::Narrative
            };

            let extends = open.as_ref().is_some_and(|draft| self.extends(draft, hint, row));
            if extends {
                if let Some(draft) = open.as_mut() {
                    draft.push(candidate);
                }
            } else {
                self.flush(&mut open, &mut out);
                open = Some(TextDraft::open(hint, candidate));
            }
        }

        self.flush(&mut open, &mut out);
        out
    }

    /// Whether a row continues the open draft.
    fn extends(&self, draft: &TextDraft, hint: DraftHint, row: &Row) -> bool {
        let last = draft.last_row();
        match (draft.hint, hint) {
            (DraftHint::Narrative, DraftHint::Narrative)
            | (DraftHint::LabelValue, DraftHint::LabelValue) => {
                continues_paragraph(last, row, self.config)
            }
            // Hanging indent under the item's marker
            (DraftHint::ListItem(_), DraftHint::Narrative) => {
                let first = &draft.rows[0];
                row.left() > first.left() + self.config.margin_tolerance
                    && row.y - last.y < self.config.line_gap_threshold
            }
            _ => false,
        }
    }

    /// A plain-type row continuing an unfinished narrative sentence.
    fn is_wrapped_line(&self, draft: &TextDraft, row: &Row) -> bool {
        let last = draft.last_row();
        draft.hint == DraftHint::Narrative
            && continues_paragraph(last, row, self.config)
            && !signals::ends_with_terminal_punctuation(&last.text())
            && !self.style.is_large(row.font_size(), self.config)
            && !(row.is_bold() && !self.style.body_bold)
    }

    fn flush(&self, open: &mut Option<TextDraft>, out: &mut ParagraphAssembly) {
        let Some(draft) = open.take() else {
            return;
        };
        // Rows of a rejected table always survive as text
        if draft.hint == DraftHint::Narrative
            && !draft.reverted_table
            && draft.text.chars().count() < self.config.min_paragraph_chars
        {
            log::trace!("ParagraphAssembler: dropping short paragraph {:?}", draft.text);
            out.discarded += 1;
            return;
        }
        out.drafts.push(draft);
    }
}

/// Append a line to paragraph text, re-joining words hyphenated across lines.
fn join_line(text: &mut String, line: &str) {
    let hyphenated = text.ends_with('-')
        && text
            .chars()
            .rev()
            .nth(1)
            .is_some_and(|c| c.is_alphabetic())
        && line.chars().next().is_some_and(|c| c.is_lowercase());

    if hyphenated {
        text.pop();
    } else if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(line);
}
