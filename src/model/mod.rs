//! Document model types for reconstructed page content.
//!
//! Tokens are the engine's input; blocks, tables and the document are its
//! durable output. Everything here is serde-serializable so a document can be
//! written to JSON and read back unchanged.

mod block;
mod document;
mod table;
mod token;

pub use block::{Block, BlockKind, PageRange, Payload};
pub use document::{Document, Outline, OutlineItem, PageReport, PageStatus};
pub use table::{FieldValue, Table, TableLayout, TableRow};
pub use token::{BBox, Token};
