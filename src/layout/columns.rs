//! Column detection from shared X start positions.

use std::cmp::Ordering;

use super::config::LayoutConfig;
use super::rows::Row;

/// A stable horizontal anchor shared by tokens across several rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    /// X position of the column start
    pub anchor: f64,
    /// Half-width of the tolerance band around the anchor
    pub tolerance: f64,
    /// Number of distinct rows with a token starting in the band
    pub support: usize,
}

impl Column {
    /// Check if an X start falls within this column's band.
    pub fn contains(&self, x: f64) -> bool {
        (x - self.anchor).abs() <= self.tolerance
    }
}

/// Index of the column whose band contains `x`, preferring the nearest anchor.
pub fn locate(columns: &[Column], x: f64) -> Option<usize> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.contains(x))
        .min_by(|(_, a), (_, b)| {
            (x - a.anchor)
                .abs()
                .partial_cmp(&(x - b.anchor).abs())
                .unwrap_or(Ordering::Equal)
        })
        .map(|(i, _)| i)
}

/// Finds column anchors over a window of rows.
#[derive(Debug, Clone)]
pub struct ColumnDetector<'a> {
    config: &'a LayoutConfig,
}

impl<'a> ColumnDetector<'a> {
    /// Create a detector using the configured X tolerance.
    pub fn new(config: &'a LayoutConfig) -> Self {
        Self { config }
    }

    /// Detect columns over a window of rows.
    ///
    /// Every token's X start is collected and the values are merged greedily
    /// in ascending order: a value within `x_tolerance` of the current anchor
    /// joins it, otherwise it opens a new column anchored at itself. Anchors
    /// are therefore strictly increasing. Columns supported by fewer than
    /// `min_column_support` distinct rows are dropped.
    pub fn detect(&self, rows: &[Row]) -> Vec<Column> {
        let mut starts: Vec<(f64, usize)> = rows
            .iter()
            .enumerate()
            .flat_map(|(row_idx, row)| row.tokens.iter().map(move |t| (t.x0(), row_idx)))
            .collect();
        starts.sort_by(|a, b| a.0.total_cmp(&b.0));

        let tolerance = self.config.x_tolerance;
        let mut groups: Vec<(f64, Vec<usize>)> = Vec::new();

        for (x, row_idx) in starts {
            match groups.last_mut() {
                Some((anchor, members)) if x - *anchor <= tolerance => {
                    if !members.contains(&row_idx) {
                        members.push(row_idx);
                    }
                }
                _ => groups.push((x, vec![row_idx])),
            }
        }

        let columns: Vec<Column> = groups
            .into_iter()
            .filter(|(_, members)| members.len() >= self.config.min_column_support)
            .map(|(anchor, members)| Column {
                anchor,
                tolerance,
                support: members.len(),
            })
            .collect();

        log::trace!(
            "ColumnDetector: {} rows -> anchors {:?}",
            rows.len(),
            columns.iter().map(|c| c.anchor).collect::<Vec<_>>()
        );
        columns
    }
}
