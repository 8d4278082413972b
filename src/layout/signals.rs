//! Weak textual and typographic signals shared by the text stages.
//!
//! Everything here is a pure predicate over a line of text or a set of rows.
//! The paragraph assembler uses these to route rows; the classifier uses the
//! same predicates to score the resulting drafts, so the two never disagree on
//! what a numbering prefix or a bullet looks like.

use std::cmp::Ordering;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use super::config::LayoutConfig;
use super::rows::Row;

/// Compiled patterns, built once per process.
struct Lexicon {
    numbering: Regex,
    roman: Regex,
    keyword: Regex,
    bullet: Regex,
    ordinal: Regex,
    percentage: Regex,
    page_number: Regex,
    label_value: Regex,
    caption: Regex,
}

impl Lexicon {
    fn new() -> Self {
        Self {
            numbering: Regex::new(r"^(\d{1,2}(?:\.\d{1,2}){0,4})(\.?)\s+(\S.*)$").unwrap(),
            roman: Regex::new(r"^([IVXLC]{1,6})[.)]\s+(\S.*)$").unwrap(),
            keyword: Regex::new(
                r"(?i)^(cap[ií]tulo|anexo|ap[eé]ndice|secci[oó]n|chapter|section|appendix|annex|parte?)\s+(\d{1,3}|[IVXLC]{1,6}|[A-Z])\b",
            )
            .unwrap(),
            bullet: Regex::new(r"^(?:[•·▪◦▸▹►■●○□◆◇▶▷➤➜※☞]\s*|[-–—*]\s+)\S").unwrap(),
            ordinal: Regex::new(r"^(?:\(?[a-zA-Z]\)|\(?[ivx]{1,5}\)|\(\d{1,2}\)|\d{1,2}\))\s*\S")
                .unwrap(),
            percentage: Regex::new(r"^[+-]?\d{1,3}(?:[.,]\d+)?\s?%$").unwrap(),
            page_number: Regex::new(
                r"(?i)^(?:(?:p[aá]g(?:ina)?\.?|page)\s*\d{1,4}(?:\s*(?:de|of|/)\s*\d{1,4})?|[-–—]?\s*\d{1,4}\s*[-–—]?)$",
            )
            .unwrap(),
            label_value: Regex::new(r"^([\p{L}][\p{L}\p{N} ./()-]{0,40}?)\s*:\s+(\S.*)$").unwrap(),
            caption: Regex::new(r"(?i)^(?:tabla|table|cuadro|figura|figure|fig\.)\s*(?:n[º°o]\.?\s*)?\d+")
                .unwrap(),
        }
    }
}

fn lexicon() -> &'static Lexicon {
    static LEXICON: OnceLock<Lexicon> = OnceLock::new();
    LEXICON.get_or_init(Lexicon::new)
}

/// A leading section number such as `2`, `3.1` or `4.2.1.`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Numbering {
    /// Number of dotted components (1 for `3`, 3 for `4.2.1`)
    pub depth: u8,
    /// Whether the number is followed by a dot (`3.`)
    pub trailing_dot: bool,
}

/// Parse a leading section number.
pub fn numbering(text: &str) -> Option<Numbering> {
    let lex = lexicon();
    if let Some(caps) = lex.numbering.captures(text) {
        let depth = caps[1].split('.').count() as u8;
        return Some(Numbering {
            depth,
            trailing_dot: !caps[2].is_empty(),
        });
    }
    if lex.roman.is_match(text) {
        return Some(Numbering {
            depth: 1,
            trailing_dot: true,
        });
    }
    None
}

/// Whether the text opens with a section keyword (`Capítulo 2`, `Annex A`).
pub fn is_keyword_header(text: &str) -> bool {
    lexicon().keyword.is_match(text)
}

/// Kind of list marker at the start of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMarker {
    /// Graphic bullet or dash
    Bullet,
    /// Letter, roman or parenthesized ordinal
    Ordinal,
    /// Section-style number used as an enumeration (`1. Revisar el equipo`)
    Numbered,
}

/// Detect a list marker at the start of a line.
pub fn list_marker(text: &str) -> Option<ListMarker> {
    let lex = lexicon();
    if lex.bullet.is_match(text) {
        Some(ListMarker::Bullet)
    } else if lex.ordinal.is_match(text) {
        Some(ListMarker::Ordinal)
    } else {
        None
    }
}

/// Whether a whole line is a bare date, percentage or page number.
pub fn is_non_narrative_fragment(text: &str) -> bool {
    let lex = lexicon();
    is_bare_date(text) || lex.percentage.is_match(text) || lex.page_number.is_match(text)
}

/// Whether a whole line parses as a calendar date.
pub fn is_bare_date(text: &str) -> bool {
    const FORMATS: [&str; 6] = ["%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%Y-%m-%d", "%d-%m-%y", "%d/%m/%y"];
    let text = text.trim();
    FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(text, fmt).is_ok())
}

/// Split a `label: value` line, as left behind by a field/value table.
///
/// The label is limited to four words and the whole line to 60 characters;
/// longer lines with a colon are ordinary sentences.
pub fn label_value(text: &str) -> Option<(&str, &str)> {
    if text.chars().count() > 60 {
        return None;
    }
    let caps = lexicon().label_value.captures(text)?;
    let label = caps.get(1)?.as_str().trim();
    let value = caps.get(2)?.as_str().trim();
    if label.split_whitespace().count() > 4 {
        return None;
    }
    Some((label, value))
}

/// Whether the line is a table or figure caption.
pub fn is_caption(text: &str) -> bool {
    lexicon().caption.is_match(text)
}

/// Whether the text ends a sentence.
pub fn ends_with_terminal_punctuation(text: &str) -> bool {
    text.trim_end()
        .chars()
        .last()
        .map(|c| matches!(c, '.' | '!' | '?' | ';' | '。' | '！' | '？'))
        .unwrap_or(false)
}

/// Whether all letters in the text are uppercase.
pub fn is_uppercase(text: &str) -> bool {
    let mut letters = text.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(|c| c.is_uppercase())
}

/// Check if text is a bullet marker (•, -, etc.).
pub fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "▹" | "►" | "■" | "●" | "※" | "□" | "◆" | "◇" | "▶" | "▷" | "☞" | "➤" | "➜"
    )
}

/// Check if text is a number-style list marker (1., 2), a., etc.).
pub fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let (prefix, suffix) = cleaned.split_at(pos);
        if !prefix.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }

    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    let chars: Vec<char> = cleaned.chars().collect();
    chars.len() == 2 && chars[0].is_alphabetic() && (chars[1] == '.' || chars[1] == ')')
}

/// Check if character is from a script that doesn't use word spaces.
///
/// Chinese and Japanese don't use spaces between words; Korean does.
pub fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        // Hiragana, Katakana
        || (0x3040..=0x30FF).contains(&code)
        // CJK symbols and punctuation
        || (0x3000..=0x303F).contains(&code)
}

/// Font statistics for one page, used for header detection.
#[derive(Debug, Clone, PartialEq)]
pub struct PageStyle {
    /// Median font size over all tokens
    pub median_font_size: f64,
    /// Distinct sizes noticeably larger than the median, largest first
    pub heading_sizes: Vec<f64>,
    /// Whether most of the page's text is bold
    pub body_bold: bool,
}

impl Default for PageStyle {
    fn default() -> Self {
        Self {
            median_font_size: 12.0,
            heading_sizes: Vec::new(),
            body_bold: false,
        }
    }
}

impl PageStyle {
    /// Compute statistics from a page's rows.
    pub fn from_rows(rows: &[Row]) -> Self {
        let mut sizes: Vec<f64> = rows
            .iter()
            .flat_map(|r| r.tokens.iter())
            .map(|t| t.font_size)
            .filter(|s| s.is_finite() && *s > 0.0)
            .collect();
        if sizes.is_empty() {
            return Self::default();
        }
        sizes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let median_font_size = sizes[sizes.len() / 2];

        let mut heading_sizes: Vec<f64> = Vec::new();
        for size in sizes.iter().rev().copied() {
            if size <= median_font_size + 0.5 {
                break;
            }
            if heading_sizes.last().map_or(true, |last| last - size > 0.5) {
                heading_sizes.push(size);
            }
        }

        let (bold_chars, total_chars) = rows
            .iter()
            .flat_map(|r| r.tokens.iter())
            .fold((0usize, 0usize), |(bold, total), t| {
                let n = t.char_count();
                (bold + if t.is_bold { n } else { 0 }, total + n)
            });

        Self {
            median_font_size,
            heading_sizes,
            body_bold: total_chars > 0 && bold_chars * 2 > total_chars,
        }
    }

    /// Whether a font size is large enough to read as a header.
    pub fn is_large(&self, font_size: f64, config: &LayoutConfig) -> bool {
        font_size >= self.median_font_size * config.header_font_ratio
    }

    /// Heading level for a font size (1-6, or 0 for body text).
    pub fn heading_level(&self, font_size: f64) -> u8 {
        for (i, &heading_size) in self.heading_sizes.iter().enumerate() {
            if font_size >= heading_size - 0.5 {
                return (i + 1).min(6) as u8;
            }
        }
        0
    }
}

/// Why a line reads as a section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSignal {
    /// Leading section number; level is the numbering depth
    Numbered { level: u8 },
    /// Section keyword such as `Anexo B`
    Keyword,
    /// Larger or bold type on its own line
    Styled { level: u8 },
}

impl HeaderSignal {
    /// Section depth implied by the signal.
    pub fn level(&self) -> u8 {
        match *self {
            HeaderSignal::Numbered { level } | HeaderSignal::Styled { level } => level,
            HeaderSignal::Keyword => 1,
        }
    }
}

/// Decide whether a single line reads as a header.
///
/// `1.2 Alcance` and `3 RESULTADOS` are numbered headers. `1. Revisar el equipo`
/// is a numbered list item unless it is set in larger, bold or uppercase type.
pub fn header_signal(
    text: &str,
    font_size: f64,
    bold: bool,
    style: &PageStyle,
    config: &LayoutConfig,
) -> Option<HeaderSignal> {
    if text.chars().count() > config.max_header_chars || ends_with_terminal_punctuation(text) {
        return None;
    }

    let large = style.is_large(font_size, config);
    let emphasized = large || (bold && !style.body_bold) || is_uppercase(text);

    if let Some(num) = numbering(text) {
        if num.depth > 1 || !num.trailing_dot || emphasized {
            return Some(HeaderSignal::Numbered {
                level: num.depth.min(6),
            });
        }
        return None;
    }

    if is_keyword_header(text) {
        return Some(HeaderSignal::Keyword);
    }

    if list_marker(text).is_some() {
        return None;
    }

    if large || (bold && !style.body_bold) {
        let level = match style.heading_level(font_size) {
            0 => 2,
            n => n,
        };
        return Some(HeaderSignal::Styled { level });
    }

    None
}
