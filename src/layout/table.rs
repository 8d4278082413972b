//! Table assembly from column-aligned row runs.
//!
//! Rows are scanned top to bottom. A window of `min_table_rows` rows seeds a
//! candidate when it shows at least two shared columns (`Scanning` ->
//! `Matching`). The run is extended greedily while the next row still aligns.
//! When extension fails, the run's columns are recomputed and only its ragged
//! ends are trimmed; the run either becomes a table (`TableClosed`) or its rows
//! go back to the text stages (`Reverted`).
//!
//! Interior rows are never re-validated after the run closes. A single odd row
//! in the middle of a table therefore corrupts at most its own cells instead of
//! splitting the table in two.

use std::collections::BTreeSet;

use crate::error::PageIssue;
use crate::model::{BBox, Table, TableLayout, TableRow, Token};

use super::columns::{locate, Column, ColumnDetector};
use super::config::LayoutConfig;
use super::rows::Row;
use super::signals::{is_bullet_marker, is_caption, is_number_marker};

/// A table recovered from a page, with its geometry and score.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTable {
    /// The table content
    pub table: Table,
    /// Union of the boxes of the tokens placed in the table (and its caption)
    pub bbox: BBox,
    /// Alignment-based confidence
    pub confidence: f64,
}

/// A row left for the text stages.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRow {
    /// The row
    pub row: Row,
    /// Whether the row belonged to a column pattern that was rejected as a table
    pub reverted_table: bool,
}

impl CandidateRow {
    fn plain(row: Row) -> Self {
        Self {
            row,
            reverted_table: false,
        }
    }

    fn reverted(row: Row) -> Self {
        Self {
            row,
            reverted_table: true,
        }
    }
}

/// Output of table assembly for one page.
#[derive(Debug, Clone, Default)]
pub struct TableAssembly {
    /// Tables in top-to-bottom order
    pub tables: Vec<AssembledTable>,
    /// Rows not claimed by any table, top to bottom
    pub leftover: Vec<CandidateRow>,
    /// Ambiguous boundaries encountered
    pub issues: Vec<PageIssue>,
}

/// States of the row scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// Looking for a window that seeds a table
    Scanning,
    /// Extending a seeded run
    Matching,
    /// The run became a table
    TableClosed,
    /// The run's rows were returned to the text stages
    Reverted,
}

/// How well one row lines up with a set of columns.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RowFit {
    /// Fraction of tokens starting inside some column band
    aligned_fraction: f64,
    /// Number of distinct columns hit
    distinct_columns: usize,
    /// Whether some token runs across a column anchor
    spanning: bool,
}

impl RowFit {
    fn aligns(&self, config: &LayoutConfig) -> bool {
        self.aligned_fraction >= config.column_match_fraction && !self.spanning
    }
}

/// Finds and builds tables from a page's rows.
#[derive(Debug, Clone)]
pub struct TableAssembler<'a> {
    config: &'a LayoutConfig,
    columns: ColumnDetector<'a>,
}

impl<'a> TableAssembler<'a> {
    /// Create an assembler for a configuration.
    pub fn new(config: &'a LayoutConfig) -> Self {
        Self {
            config,
            columns: ColumnDetector::new(config),
        }
    }

    /// Split rows into tables and leftover rows.
    pub fn assemble(&self, rows: Vec<Row>) -> TableAssembly {
        let mut out = TableAssembly::default();
        let mut i = 0;

        while i < rows.len() {
            // Scanning
            let Some(seed_columns) = self.seed(&rows[i..], self.config.min_table_rows) else {
                if let Some(k) = self.short_run(&rows[i..]) {
                    log::debug!(
                        "TableAssembler: {:?} column run of {} rows at y={:.1}",
                        TableState::Reverted,
                        k,
                        rows[i].y
                    );
                    out.issues.push(PageIssue::AmbiguousTableBoundary { rows: k });
                    out.leftover
                        .extend(rows[i..i + k].iter().cloned().map(CandidateRow::reverted));
                    i += k;
                } else {
                    out.leftover.push(CandidateRow::plain(rows[i].clone()));
                    i += 1;
                }
                continue;
            };

            // Matching
            let end = self.extend(&rows, i, &seed_columns);
            log::debug!(
                "TableAssembler: {:?} rows {}..{} with {} seed columns",
                TableState::Matching,
                i,
                end,
                seed_columns.len()
            );

            self.close_run(&rows[i..end], &mut out);
            i = end;
        }

        out.leftover
            .sort_by(|a, b| a.row.y.total_cmp(&b.row.y));
        out
    }

    /// Columns for a seed window, if the first `size` rows form one.
    fn seed(&self, rows: &[Row], size: usize) -> Option<Vec<Column>> {
        if rows.len() < size {
            return None;
        }
        let window = &rows[..size];
        let columns = self.columns.detect(window);
        if columns.len() < 2 || columns.len() > self.config.max_table_columns {
            return None;
        }

        let seeds = window.iter().all(|row| {
            let fit = self.fit(row, &columns);
            fit.aligns(self.config) && fit.distinct_columns >= 2
        });
        seeds.then_some(columns)
    }

    /// Length of a column pattern too short to be a table.
    fn short_run(&self, rows: &[Row]) -> Option<usize> {
        (2..self.config.min_table_rows)
            .rev()
            .find(|&k| self.seed(rows, k).is_some())
    }

    /// Greedily extend a seeded run. Returns the exclusive end index.
    fn extend(&self, rows: &[Row], start: usize, columns: &[Column]) -> usize {
        let mut end = start + self.config.min_table_rows;
        let seed_pitch = rows[start..end]
            .windows(2)
            .map(|w| w[1].y - w[0].y)
            .fold(0.0_f64, f64::max);

        while end < rows.len() {
            let row = &rows[end];
            let fit = self.fit(row, columns);
            // A row hitting a single column only continues the table at normal row pitch
            let in_pitch = row.y - rows[end - 1].y <= seed_pitch + self.config.y_tolerance;
            if !fit.aligns(self.config) || (fit.distinct_columns < 2 && !in_pitch) {
                break;
            }
            end += 1;
        }
        end
    }

    /// Re-validate a run and emit it as a table or revert it.
    fn close_run(&self, run: &[Row], out: &mut TableAssembly) {
        let columns = self.columns.detect(run);
        if columns.len() < 2 || columns.len() > self.config.max_table_columns {
            log::debug!(
                "TableAssembler: {:?} ({} columns after re-validation)",
                TableState::Reverted,
                columns.len()
            );
            out.issues
                .push(PageIssue::AmbiguousTableBoundary { rows: run.len() });
            out.leftover
                .extend(run.iter().cloned().map(CandidateRow::reverted));
            return;
        }

        // Trim ragged ends only
        let mut lo = 0;
        let mut hi = run.len();
        while lo < hi && !self.fit(&run[lo], &columns).aligns(self.config) {
            lo += 1;
        }
        while hi > lo && !self.fit(&run[hi - 1], &columns).aligns(self.config) {
            hi -= 1;
        }
        out.leftover
            .extend(run[..lo].iter().cloned().map(CandidateRow::plain));
        out.leftover
            .extend(run[hi..].iter().cloned().map(CandidateRow::plain));
        let body = &run[lo..hi];

        if body.len() < self.config.min_table_rows {
            log::debug!(
                "TableAssembler: {:?} (run shrank to {} rows)",
                TableState::Reverted,
                body.len()
            );
            out.issues
                .push(PageIssue::AmbiguousTableBoundary { rows: body.len() });
            out.leftover
                .extend(body.iter().cloned().map(CandidateRow::reverted));
            return;
        }

        if is_list_pattern(body, &columns) {
            log::debug!("TableAssembler: skipping run, detected as list pattern");
            out.leftover
                .extend(body.iter().cloned().map(CandidateRow::plain));
            return;
        }

        let (mut assembled, residual) = self.build_table(body, &columns);
        out.leftover
            .extend(residual.into_iter().map(CandidateRow::plain));

        if let Some(caption) = self.take_caption(body, out) {
            assembled.bbox = assembled.bbox.union(&caption.bbox);
            assembled.table.title = Some(caption.text());
        }

        log::debug!(
            "TableAssembler: {:?} {}x{} table ({:?})",
            TableState::TableClosed,
            assembled.table.row_count(),
            assembled.table.column_count(),
            assembled.table.layout
        );
        out.tables.push(assembled);
    }

    /// Remove and return a caption row sitting directly above the table.
    fn take_caption(&self, body: &[Row], out: &mut TableAssembly) -> Option<Row> {
        let top = body.first()?.bbox.y0;
        let candidate = out
            .leftover
            .iter()
            .enumerate()
            .filter(|(_, c)| c.row.bbox.y1 <= top)
            .max_by(|(_, a), (_, b)| a.row.y.total_cmp(&b.row.y));

        let (idx, row) = candidate?;
        let is_title = !row.reverted_table
            && top - row.row.bbox.y1 <= self.config.caption_max_gap
            && is_caption(&row.row.text());
        if !is_title {
            return None;
        }
        Some(out.leftover.remove(idx).row)
    }

    fn fit(&self, row: &Row, columns: &[Column]) -> RowFit {
        if row.tokens.is_empty() {
            return RowFit {
                aligned_fraction: 0.0,
                distinct_columns: 0,
                spanning: false,
            };
        }

        let tolerance = self.config.x_tolerance;
        let mut hit = BTreeSet::new();
        let mut aligned = 0usize;
        let mut spanning = false;

        for token in &row.tokens {
            if let Some(c) = locate(columns, token.x0()) {
                aligned += 1;
                hit.insert(c);
            }
            spanning |= columns
                .iter()
                .any(|c| token.x0() + tolerance < c.anchor && token.x1() > c.anchor + tolerance);
        }

        RowFit {
            aligned_fraction: aligned as f64 / row.tokens.len() as f64,
            distinct_columns: hit.len(),
            spanning,
        }
    }

    /// Place each token of each row into a cell.
    ///
    /// Returns the table and any tokens that matched no column, regrouped
    /// into rows at their original height.
    fn build_table(&self, body: &[Row], columns: &[Column]) -> (AssembledTable, Vec<Row>) {
        let tolerance = self.config.x_tolerance;
        let mut grid: Vec<Vec<String>> = Vec::with_capacity(body.len());
        let mut placed: Vec<&Token> = Vec::new();
        let mut residual: Vec<Row> = Vec::new();
        let mut fraction_sum = 0.0;

        for row in body {
            fraction_sum += self.fit(row, columns).aligned_fraction;

            let mut cells: Vec<Vec<&str>> = vec![Vec::new(); columns.len()];
            let mut cell_ends: Vec<Option<f64>> = vec![None; columns.len()];
            let mut unmatched: Vec<Token> = Vec::new();

            for token in &row.tokens {
                let x = token.x0();
                let column = locate(columns, x).or_else(|| {
                    // Next word of a cell already started in this row
                    let c = columns.iter().rposition(|c| c.anchor <= x)?;
                    let limit = columns
                        .get(c + 1)
                        .map(|next| next.anchor - tolerance)
                        .unwrap_or(f64::INFINITY);
                    let adjacent = cell_ends[c].is_some_and(|end| x - end <= tolerance);
                    (adjacent && x < limit).then_some(c)
                });

                match column {
                    Some(c) => {
                        cells[c].push(token.text.as_str());
                        cell_ends[c] = Some(token.x1());
                        placed.push(token);
                    }
                    None => unmatched.push(token.clone()),
                }
            }

            grid.push(cells.into_iter().map(|c| c.join(" ")).collect());
            if !unmatched.is_empty() {
                residual.push(Row::from_tokens(unmatched));
            }
        }

        let mut anchors: Vec<f64> = columns.iter().map(|c| c.anchor).collect();

        // Header row: every token bold while the body is not
        let promote_header = body.len() > 1
            && body[0].is_all_bold()
            && body[1..].iter().any(|r| r.tokens.iter().any(|t| !t.is_bold));
        let mut headers = if promote_header {
            grid.remove(0)
        } else {
            Vec::new()
        };

        // Field/value reading when exactly two columns carry content
        let filled: Vec<usize> = (0..anchors.len())
            .filter(|&c| grid.iter().any(|cells| !cells[c].trim().is_empty()))
            .collect();
        let key_value = filled.len() == 2
            && grid.iter().all(|cells| !cells[filled[0]].trim().is_empty());
        let layout = if key_value {
            let keep = |cells: &[String]| -> Vec<String> {
                filled.iter().map(|&c| cells[c].clone()).collect()
            };
            grid = grid.iter().map(|cells| keep(cells.as_slice())).collect();
            if !headers.is_empty() {
                headers = keep(headers.as_slice());
            }
            anchors = filled.iter().map(|&c| anchors[c]).collect();
            TableLayout::KeyValue
        } else {
            TableLayout::Grid
        };

        let mut table = Table::new();
        table.layout = layout;
        table.headers = headers;
        table.columns = anchors;
        for cells in grid {
            table.add_row(TableRow::new(cells));
        }

        let bbox = BBox::union_all(placed.iter().map(|t| &t.bbox)).unwrap_or_default();
        let mean_fraction = fraction_sum / body.len() as f64;
        let confidence = (0.5 + 0.45 * mean_fraction).min(0.95);

        (
            AssembledTable {
                table,
                bbox,
                confidence,
            },
            residual,
        )
    }
}

/// Check if aligned rows actually represent a numbered or bulleted list.
///
/// A list like "1. Item" often arrives as separate marker and text tokens at
/// two X positions, which looks like a two-column table.
fn is_list_pattern(rows: &[Row], columns: &[Column]) -> bool {
    if columns.len() < 2 || rows.is_empty() {
        return false;
    }

    let mut bullet_count = 0;
    let mut number_count = 0;
    for row in rows {
        if let Some(first) = row.tokens.first() {
            let text = first.text.trim();
            if is_bullet_marker(text) {
                bullet_count += 1;
            } else if is_number_marker(text) && text.ends_with(|c| c == '.' || c == ')') {
                // A bare integer is as likely an item number in a real table
                number_count += 1;
            }
        }
    }

    let bullet_ratio = bullet_count as f64 / rows.len() as f64;
    let total_ratio = (bullet_count + number_count) as f64 / rows.len() as f64;

    // Bullet markers are almost never real table data
    if bullet_ratio >= 0.5 {
        return true;
    }

    // Numbered first columns are common in real tables with three or more columns
    columns.len() == 2 && total_ratio >= 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::rows::RowClusterer;

    fn tok(text: &str, x: f64, y: f64) -> Token {
        sized(text, x, y, 40.0)
    }

    fn sized(text: &str, x: f64, y: f64, width: f64) -> Token {
        Token::new(text, BBox::new(x, y, x + width, y + 10.0), 1).with_font("Arial", 10.0)
    }

    fn rows_of(config: &LayoutConfig, tokens: Vec<Token>) -> Vec<Row> {
        RowClusterer::new(config).cluster(tokens)
    }

    fn grid_tokens(n: usize, m: usize, top: f64) -> Vec<Token> {
        let mut tokens = Vec::new();
        for r in 0..n {
            for c in 0..m {
                tokens.push(tok(
                    &format!("r{}c{}", r, c),
                    50.0 + 100.0 * c as f64,
                    top + 18.0 * r as f64,
                ));
            }
        }
        tokens
    }

    #[test]
    fn test_grid_recovered() {
        let config = LayoutConfig::default();
        let rows = rows_of(&config, grid_tokens(4, 3, 100.0));
        let out = TableAssembler::new(&config).assemble(rows);

        assert_eq!(out.tables.len(), 1);
        assert!(out.leftover.is_empty());
        let table = &out.tables[0].table;
        assert_eq!(table.layout, TableLayout::Grid);
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.rows[2].cells[1], "r2c1");
        assert!((out.tables[0].confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_key_value_table() {
        let config = LayoutConfig::default();
        let tokens = vec![
            tok("Fecha", 50.0, 100.0),
            tok("25-02-2025", 200.0, 100.0),
            tok("Hora", 50.0, 118.0),
            tok("15:16", 200.0, 118.0),
            tok("Potencia", 50.0, 136.0),
            tok("150 MW", 200.0, 136.0),
        ];
        let out = TableAssembler::new(&config).assemble(rows_of(&config, tokens));

        assert_eq!(out.tables.len(), 1);
        let pairs = out.tables[0].table.pairs();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].field, "Fecha");
        assert_eq!(pairs[0].value, "25-02-2025");
        assert_eq!(pairs[2].value, "150 MW");
    }

    #[test]
    fn test_two_row_pattern_reverts() {
        let config = LayoutConfig::default();
        let tokens = vec![
            tok("Fecha", 50.0, 100.0),
            tok("25-02-2025", 200.0, 100.0),
            tok("Hora", 50.0, 118.0),
            tok("15:16", 200.0, 118.0),
        ];
        let out = TableAssembler::new(&config).assemble(rows_of(&config, tokens));

        assert!(out.tables.is_empty());
        assert_eq!(out.leftover.len(), 2);
        assert!(out.leftover.iter().all(|c| c.reverted_table));
        assert_eq!(out.issues, vec![PageIssue::AmbiguousTableBoundary { rows: 2 }]);
    }

    #[test]
    fn test_list_pattern_is_not_a_table() {
        let config = LayoutConfig::default();
        let mut tokens = Vec::new();
        for (i, text) in ["Revisión", "Ensayo", "Informe"].iter().enumerate() {
            let y = 100.0 + 18.0 * i as f64;
            tokens.push(sized(&format!("{}.", i + 1), 50.0, y, 10.0));
            tokens.push(tok(text, 80.0, y));
        }
        let out = TableAssembler::new(&config).assemble(rows_of(&config, tokens));
        assert!(out.tables.is_empty());
        assert_eq!(out.leftover.len(), 3);
        assert!(out.leftover.iter().all(|c| !c.reverted_table));
    }

    #[test]
    fn test_item_number_column_is_a_table() {
        let config = LayoutConfig::default();
        let mut tokens = Vec::new();
        for (i, text) in ["Transformador T1", "Transformador T2", "Reactor R1"]
            .iter()
            .enumerate()
        {
            let y = 100.0 + 18.0 * i as f64;
            tokens.push(sized(&format!("{}", i + 1), 50.0, y, 8.0));
            tokens.push(sized(text, 200.0, y, 90.0));
        }
        let out = TableAssembler::new(&config).assemble(rows_of(&config, tokens));

        assert_eq!(out.tables.len(), 1);
        let table = &out.tables[0].table;
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows[2].cells, vec!["3", "Reactor R1"]);
    }

    #[test]
    fn test_interior_anomaly_does_not_split() {
        let config = LayoutConfig::default();
        let mut tokens = grid_tokens(5, 3, 100.0);
        // Row 2 loses its middle cell and gains a stray token between columns
        tokens.retain(|t| t.text != "r2c1");
        tokens.push(tok("x", 110.0, 136.0));
        let out = TableAssembler::new(&config).assemble(rows_of(&config, tokens));

        assert_eq!(out.tables.len(), 1);
        assert_eq!(out.tables[0].table.row_count(), 5);
        assert_eq!(out.tables[0].table.rows[2].cells[1], "");
        // The stray token is re-queued for the text stages
        assert_eq!(out.leftover.len(), 1);
        assert_eq!(out.leftover[0].row.text(), "x");
    }

    #[test]
    fn test_paragraph_after_table_is_not_absorbed() {
        let config = LayoutConfig::default();
        let mut tokens = grid_tokens(3, 3, 100.0);
        tokens.push(Token::new(
            "A long narrative sentence spanning every column of the page.",
            BBox::new(50.0, 170.0, 400.0, 180.0),
            1,
        ));
        let out = TableAssembler::new(&config).assemble(rows_of(&config, tokens));

        assert_eq!(out.tables.len(), 1);
        assert_eq!(out.tables[0].table.row_count(), 3);
        assert_eq!(out.leftover.len(), 1);
    }

    #[test]
    fn test_bold_header_and_caption() {
        let config = LayoutConfig::default();
        let mut tokens = vec![
            tok("Tabla 2. Resultados", 50.0, 70.0),
            tok("Unidad", 50.0, 90.0).bold(),
            tok("Potencia", 150.0, 90.0).bold(),
            tok("Estado", 250.0, 90.0).bold(),
        ];
        tokens.extend(grid_tokens(3, 3, 108.0));
        let out = TableAssembler::new(&config).assemble(rows_of(&config, tokens));

        assert_eq!(out.tables.len(), 1);
        let table = &out.tables[0].table;
        assert_eq!(table.title.as_deref(), Some("Tabla 2. Resultados"));
        assert_eq!(table.headers, vec!["Unidad", "Potencia", "Estado"]);
        assert_eq!(table.row_count(), 3);
        assert!(out.leftover.is_empty());
        assert_eq!(out.tables[0].bbox.y0, 70.0);
    }

    #[test]
    fn test_multi_token_cells_are_joined() {
        let config = LayoutConfig::default();
        let rows = [
            ("Potencia", ("150", 21.0), ("MW", 224.0)),
            ("Tensión", ("75", 10.0), ("kV", 213.0)),
            ("Velocidad", ("1.200", 32.0), ("rpm", 235.0)),
        ];
        let mut tokens = Vec::new();
        for (r, (field, (number, width), (unit, unit_x))) in rows.iter().enumerate() {
            let y = 100.0 + 18.0 * r as f64;
            tokens.push(sized(field, 50.0, y, 50.0));
            tokens.push(sized(number, 200.0, y, *width));
            tokens.push(sized(unit, *unit_x, y, 12.0));
        }
        let out = TableAssembler::new(&config).assemble(rows_of(&config, tokens));

        assert_eq!(out.tables.len(), 1);
        assert!(out.leftover.is_empty());
        let pairs = out.tables[0].table.pairs();
        assert_eq!(pairs[0].value, "150 MW");
        assert_eq!(pairs[1].value, "75 kV");
        assert_eq!(pairs[2].value, "1.200 rpm");
    }
}
