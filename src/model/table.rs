//! Table types.

use serde::{Deserialize, Serialize};

/// A table recovered from column-aligned rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    /// Caption found directly above the table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Grid or field/value layout
    #[serde(default)]
    pub layout: TableLayout,

    /// Header cells (empty when no header row was detected)
    #[serde(default)]
    pub headers: Vec<String>,

    /// Body rows
    pub rows: Vec<TableRow>,

    /// Column anchors (X positions) the grid was built from
    #[serde(default)]
    pub columns: Vec<f64>,
}

impl Table {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row to the table.
    pub fn add_row(&mut self, row: TableRow) {
        self.rows.push(row);
    }

    /// Get the number of body rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns (widest of header and rows).
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.cells.len())
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the rows read as field/value pairs.
    pub fn is_key_value(&self) -> bool {
        self.layout == TableLayout::KeyValue
    }

    /// Rows as `{field, value}` pairs.
    ///
    /// Empty for grid tables.
    pub fn pairs(&self) -> Vec<FieldValue> {
        if !self.is_key_value() {
            return Vec::new();
        }
        self.rows
            .iter()
            .map(|row| FieldValue {
                field: row.cells.first().cloned().unwrap_or_default(),
                value: row.cells.get(1).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Get plain text representation of the table.
    pub fn plain_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(ref title) = self.title {
            lines.push(title.clone());
        }
        if !self.headers.is_empty() {
            lines.push(self.headers.join("\t"));
        }
        lines.extend(self.rows.iter().map(|row| row.plain_text()));
        lines.join("\n")
    }
}

/// How the rows of a table should be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableLayout {
    /// Generic grid of cells
    #[default]
    Grid,
    /// Two columns read as field and value
    KeyValue,
}

/// A table row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableRow {
    /// Cell texts aligned to the table's columns
    pub cells: Vec<String>,
}

impl TableRow {
    /// Create a new row with cells.
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    /// Create a row from text values.
    pub fn from_strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::new(values.into_iter().map(Into::into).collect())
    }

    /// Number of non-empty cells.
    pub fn filled_cells(&self) -> usize {
        self.cells.iter().filter(|c| !c.trim().is_empty()).count()
    }

    /// Get plain text representation.
    pub fn plain_text(&self) -> String {
        self.cells.join("\t")
    }
}

/// A field/value pair read from a two-column table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    /// Left-hand label
    pub field: String,
    /// Right-hand value
    pub value: String,
}
