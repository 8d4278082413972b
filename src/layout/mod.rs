//! Page layout reconstruction.
//!
//! Each page runs through the same sequence of pure stages:
//!
//! 1. [`TokenNormalizer`]: span records to validated tokens
//! 2. [`RowClusterer`]: tokens to rows by vertical position
//! 3. [`ColumnDetector`]: stable X anchors across rows
//! 4. [`TableAssembler`]: column-aligned row runs to tables
//! 5. [`ParagraphAssembler`]: remaining rows to headers, list items and paragraphs
//! 6. [`ContentClassifier`]: typed, confidence-scored blocks
//!
//! [`LayoutEngine`] runs the stages per page on a worker pool, merges the
//! pages in order and links every block to its section with
//! [`SectionAssociator`].

mod classify;
mod columns;
mod config;
mod engine;
mod normalize;
mod paragraph;
mod rows;
mod sections;
mod signals;
mod table;

pub use classify::{
    Candidate, Classification, ContentClassifier, HeaderRule, ListRule, Rule, RuleMatch, RULES,
};
pub use columns::{locate, Column, ColumnDetector};
pub use config::LayoutConfig;
pub use engine::{analyze_page, assemble_document, LayoutEngine, PageOutcome};
pub use normalize::{CoordinateOrigin, NormalizedPage, SpanRecord, TokenNormalizer};
pub use paragraph::{continues_paragraph, DraftHint, ParagraphAssembler, ParagraphAssembly, TextDraft};
pub use rows::{Row, RowClusterer};
pub use sections::SectionAssociator;
pub use signals::{list_marker, HeaderSignal, ListMarker, Numbering, PageStyle};
pub use table::{AssembledTable, CandidateRow, TableAssembler, TableAssembly, TableState};
