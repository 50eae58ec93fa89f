//! Domain models for the listener-export pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Cell`] - A single table value (text, number, or empty)
//! - [`Table`] - Ordered headers plus row-major cells
//! - [`fields`] - Canonical field names every yearly table is normalized into
//!
//! Raw, canonical, and stacked tables are all [`Table`] values; the aliases
//! below name the pipeline stage a value belongs to.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

// =============================================================================
// Canonical Fields
// =============================================================================

/// Canonical field names.
pub mod fields {
    /// Program name, the join key across years.
    pub const PROGRAM: &str = "program";
    /// Items selected on one row.
    pub const ITEMS_SELECTED: &str = "items_selected";
    /// Program total for the reporting period.
    pub const TOTAL_ITEMS_SELECTED: &str = "total_items_selected";
    /// Program total on the on-demand channel.
    pub const ON_DEMAND_ITEMS_SELECTED: &str = "on_demand_items_selected";
    /// Share of station plays, 0-100 when upstream data is sane.
    pub const PERCENT_OF_TOTAL: &str = "percent_of_total";
    /// Distribution channel.
    pub const CHANNEL: &str = "channel";
    /// Piece title.
    pub const TITLE: &str = "title";
    /// Legacy program identifier.
    pub const PN: &str = "pn";
    /// Upstream record identifier.
    pub const RECORD_ID: &str = "record_id";
    /// Year tag added when stacking.
    pub const YEAR: &str = "year";

    /// Canonical output order.
    pub const CANONICAL: [&str; 9] = [
        PROGRAM,
        ITEMS_SELECTED,
        TOTAL_ITEMS_SELECTED,
        ON_DEMAND_ITEMS_SELECTED,
        PERCENT_OF_TOTAL,
        CHANNEL,
        TITLE,
        PN,
        RECORD_ID,
    ];
}

// =============================================================================
// Cell
// =============================================================================

/// A single table value.
///
/// Serializes as a JSON string, number, or `null`.
///
/// [`Cell::Empty`] is the one representation of an empty text value: the
/// empty string is never stored as `Text("")`. It renders as `""` through
/// [`Cell::as_text`] and CSV output, and as `null` in JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Numeric value.
    Number(f64),
    /// Free text, as read from the source.
    Text(String),
    /// Missing value.
    #[default]
    Empty,
}

impl Cell {
    /// Build a text cell, mapping the empty string to [`Cell::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Text rendering. Whole numbers drop their fractional part.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
            Cell::Number(n) => Cow::Owned(format_number(*n)),
            Cell::Empty => Cow::Borrowed(""),
        }
    }

    /// Numeric value if this is a number cell.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::text(s)
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::text(s)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// =============================================================================
// Table
// =============================================================================

/// Ordered headers plus row-major cells.
///
/// Every row holds exactly one cell per header.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Table as read from the source, headers untouched.
pub type RawTable = Table;

/// Table whose headers were mapped onto [`fields::CANONICAL`].
pub type CanonicalTable = Table;

/// Canonical tables of all years with a trailing [`fields::YEAR`] column.
pub type StackedTable = Table;

impl Table {
    /// Create an empty table with the given headers.
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table from headers and rows. Ragged rows are padded with
    /// [`Cell::Empty`] or truncated to the header width.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Self::new(headers);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::Empty);
        self.rows.push(row);
    }

    /// Index of the first column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of the first column named `name`, in row order.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Cell> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Cell at `row` in the first column named `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Cell> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Rename the column at `idx`.
    pub fn rename_at(&mut self, idx: usize, name: impl Into<String>) {
        if let Some(header) = self.headers.get_mut(idx) {
            *header = name.into();
        }
    }

    /// Append a column holding `fill` on every row.
    pub fn add_column(&mut self, name: impl Into<String>, fill: Cell) {
        self.headers.push(name.into());
        for row in &mut self.rows {
            row.push(fill.clone());
        }
    }

    /// Rewrite every cell of column `idx` in place.
    pub fn map_column(&mut self, idx: usize, mut f: impl FnMut(&Cell) -> Cell) {
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(idx) {
                *cell = f(cell);
            }
        }
    }

    /// Reorder columns by index. `order` must be a permutation of column
    /// indices; indices out of range are ignored.
    pub fn reorder(&mut self, order: &[usize]) {
        let width = self.headers.len();
        let order: Vec<usize> = order.iter().copied().filter(|&i| i < width).collect();
        self.headers = order.iter().map(|&i| self.headers[i].clone()).collect();
        for row in &mut self.rows {
            *row = order.iter().map(|&i| row[i].clone()).collect();
        }
    }

    /// New table with the same headers and the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }
}
