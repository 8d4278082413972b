//! Content classification: assigns each candidate a block type and confidence.
//!
//! Classification is a ranked rule table. Every rule is evaluated against a
//! draft; each match proposes a block kind with a base strength. A match gains
//! a bonus for every other rule that agrees on the same kind and loses a
//! penalty when its rows came from a rejected table. The strongest match wins,
//! ties going to the rule listed first in [`RULES`].

use crate::model::{Block, BlockKind};

use super::config::LayoutConfig;
use super::paragraph::{DraftHint, TextDraft};
use super::signals::{self, HeaderSignal, ListMarker, PageStyle};
use super::table::AssembledTable;

/// Bonus per additional rule agreeing on the winning kind.
const AGREEMENT_BONUS: f64 = 0.08;

/// Penalty for rows that were a rejected table candidate.
const REVERTED_TABLE_PENALTY: f64 = 0.15;

/// Upper bound on any heuristic confidence.
const MAX_CONFIDENCE: f64 = 0.99;

/// Header rule variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRule {
    /// Leading section number
    Numbered,
    /// Section keyword
    Keyword,
    /// Larger or bold type
    Styled,
}

/// List rule variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListRule {
    /// Graphic bullet or dash
    Bullet,
    /// Letter, roman or numeric enumeration
    Ordinal,
}

/// A classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Tables from the table assembler keep their type
    TablePassthrough,
    /// Header evidence
    Header(HeaderRule),
    /// List item evidence
    List(ListRule),
    /// `label: value` remnant of a table, kept as a weak paragraph
    TableFragment,
    /// Fallback narrative text
    Paragraph,
}

/// Rules in priority order.
pub const RULES: [Rule; 8] = [
    Rule::TablePassthrough,
    Rule::Header(HeaderRule::Numbered),
    Rule::Header(HeaderRule::Keyword),
    Rule::Header(HeaderRule::Styled),
    Rule::List(ListRule::Bullet),
    Rule::List(ListRule::Ordinal),
    Rule::TableFragment,
    Rule::Paragraph,
];

/// A rule that fired on a draft.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMatch {
    /// The rule
    pub rule: Rule,
    /// Proposed block kind
    pub kind: BlockKind,
    /// Base strength before agreement and penalties
    pub strength: f64,
    /// Section level, for header rules
    pub level: Option<u8>,
}

/// The winning rule and the final confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Winning match
    pub matched: RuleMatch,
    /// Confidence in `[0, 0.99]`
    pub confidence: f64,
}

/// A candidate produced by the table or paragraph assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    /// An assembled table
    Table(AssembledTable),
    /// A text draft
    Text(TextDraft),
}

impl Candidate {
    /// Top edge, for reading order.
    pub fn top(&self) -> f64 {
        match self {
            Candidate::Table(t) => t.bbox.y0,
            Candidate::Text(d) => d.bbox.y0,
        }
    }

    /// Left edge, for reading order.
    pub fn left(&self) -> f64 {
        match self {
            Candidate::Table(t) => t.bbox.x0,
            Candidate::Text(d) => d.bbox.x0,
        }
    }
}

/// Classifies candidates on one page.
#[derive(Debug, Clone)]
pub struct ContentClassifier<'a> {
    config: &'a LayoutConfig,
    style: &'a PageStyle,
}

impl<'a> ContentClassifier<'a> {
    /// Create a classifier for a page.
    pub fn new(config: &'a LayoutConfig, style: &'a PageStyle) -> Self {
        Self { config, style }
    }

    /// Turn a candidate into a typed, scored block.
    pub fn classify(&self, page: u32, candidate: Candidate) -> Block {
        match candidate {
            Candidate::Table(assembled) => {
                let mut block = Block::table(page, assembled.bbox, assembled.table);
                block.confidence = assembled.confidence.clamp(0.0, MAX_CONFIDENCE);
                block
            }
            Candidate::Text(draft) => {
                let result = self.score(&draft);
                let mut block = Block::text(result.matched.kind, page, draft.bbox, draft.text);
                block.confidence = result.confidence;
                block.level = result.matched.level;
                block
            }
        }
    }

    /// Evaluate every rule and pick the strongest match.
    pub fn score(&self, draft: &TextDraft) -> Classification {
        let matches: Vec<RuleMatch> = RULES
            .iter()
            .filter_map(|rule| self.evaluate(*rule, draft))
            .collect();

        let mut best: Option<Classification> = None;
        for m in &matches {
            let agreeing = matches
                .iter()
                .filter(|other| other.rule != m.rule && other.kind == m.kind)
                .count();
            let mut confidence = m.strength + AGREEMENT_BONUS * agreeing as f64;
            if draft.reverted_table {
                confidence -= REVERTED_TABLE_PENALTY;
            }
            let confidence = confidence.clamp(0.0, MAX_CONFIDENCE);

            if best.map_or(true, |b| confidence > b.confidence) {
                best = Some(Classification {
                    matched: *m,
                    confidence,
                });
            }
        }

        // The paragraph rule always fires, so `best` is set
        best.unwrap_or(Classification {
            matched: RuleMatch {
                rule: Rule::Paragraph,
                kind: BlockKind::Paragraph,
                strength: 0.0,
                level: None,
            },
            confidence: 0.0,
        })
    }

    fn evaluate(&self, rule: Rule, draft: &TextDraft) -> Option<RuleMatch> {
        let single = draft.line_count() == 1;
        let first = draft.first_line();
        let found = |kind: BlockKind, strength: f64, level: Option<u8>| {
            Some(RuleMatch {
                rule,
                kind,
                strength,
                level,
            })
        };

        match rule {
            Rule::TablePassthrough => None,

            Rule::Header(HeaderRule::Numbered) => {
                match signals::header_signal(&first, draft.font_size, draft.bold, self.style, self.config) {
                    Some(HeaderSignal::Numbered { level }) => {
                        found(BlockKind::Header, if single { 0.9 } else { 0.5 }, Some(level))
                    }
                    _ => None,
                }
            }

            Rule::Header(HeaderRule::Keyword) => {
                if signals::is_keyword_header(&first) {
                    found(BlockKind::Header, if single { 0.8 } else { 0.45 }, Some(1))
                } else {
                    None
                }
            }

            Rule::Header(HeaderRule::Styled) => {
                if !single
                    || first.chars().count() > self.config.max_header_chars
                    || signals::ends_with_terminal_punctuation(&first)
                    || signals::list_marker(&first).is_some()
                {
                    return None;
                }
                let large = self.style.is_large(draft.font_size, self.config);
                let emphasized = draft.bold && !self.style.body_bold;
                if !large && !emphasized {
                    return None;
                }
                let strength = 0.55 + if large && emphasized { 0.1 } else { 0.0 };
                let level = match draft.hint {
                    DraftHint::Header(signal) => signal.level(),
                    _ => match self.style.heading_level(draft.font_size) {
                        0 => 2,
                        n => n,
                    },
                };
                found(BlockKind::Header, strength, Some(level))
            }

            Rule::List(ListRule::Bullet) => match signals::list_marker(&first) {
                Some(ListMarker::Bullet) => found(BlockKind::List, 0.85, None),
                _ => None,
            },

            Rule::List(ListRule::Ordinal) => {
                let ordinal = matches!(signals::list_marker(&first), Some(ListMarker::Ordinal))
                    || draft.hint == DraftHint::ListItem(ListMarker::Numbered);
                if ordinal {
                    found(BlockKind::List, 0.75, None)
                } else {
                    None
                }
            }

            Rule::TableFragment => {
                let fragment = draft.hint == DraftHint::LabelValue
                    || (single && signals::label_value(&first).is_some());
                if fragment {
                    found(BlockKind::Paragraph, 0.45, None)
                } else {
                    None
                }
            }

            Rule::Paragraph => {
                let mut strength = 0.55;
                if !single {
                    strength += 0.1;
                }
                if signals::ends_with_terminal_punctuation(&draft.text) {
                    strength += 0.1;
                }
                found(BlockKind::Paragraph, strength, None)
            }
        }
    }
}
