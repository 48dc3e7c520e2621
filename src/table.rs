//! In-memory string table shared by the classification sheet, the data sheet
//! and the result table
//!
//! All cells are plain, whitespace-trimmed strings. Row order is the order of
//! the source sheet and is never changed.

use crate::error::{Error, Result};

/// A header row plus data rows of string cells
///
/// Every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, trimming every cell and padding/truncating rows to the header width
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|row| {
                let mut row: Vec<String> = row
                    .into_iter()
                    .take(width)
                    .map(|cell| clean_cell(&cell))
                    .collect();
                row.resize(width, String::new());
                row
            })
            .collect();

        Self { headers, rows }
    }

    /// Column headers in sheet order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows in sheet order
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first column named `name`
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name.trim())
    }

    /// Like [`column_index`](Self::column_index) but fails with
    /// [`Error::ColumnNotFound`] naming `sheet`
    pub fn require_column(&self, name: &str, sheet: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| Error::ColumnNotFound {
            column: name.to_string(),
            sheet: sheet.to_string(),
        })
    }

    /// Resolve several column names at once
    pub fn require_columns(&self, names: &[String], sheet: &str) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| self.require_column(name, sheet))
            .collect()
    }

    /// Position of column `name`, appending an empty column when absent
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.headers.push(name.trim().to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    /// Cell at `(row, col)`; empty for out-of-range coordinates
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Overwrite the cell at `(row, col)`; out-of-range coordinates are ignored
    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = value.into();
        }
    }

    /// Cells of `cols` in `row`, joined with single spaces
    pub fn joined(&self, row: usize, cols: &[usize]) -> String {
        cols.iter()
            .map(|&col| self.cell(row, col))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether `row` already carries a classification in `id_col`
    pub fn is_done(&self, row: usize, id_col: usize) -> bool {
        !self.cell(row, id_col).trim().is_empty()
    }

    /// Indices of rows whose `id_col` is still empty, in order
    pub fn pending_rows(&self, id_col: usize) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&row| !self.is_done(row, id_col))
            .collect()
    }

    /// Number of rows whose `id_col` is filled
    pub fn done_count(&self, id_col: usize) -> usize {
        (0..self.rows.len())
            .filter(|&row| self.is_done(row, id_col))
            .count()
    }

    /// Append rows `from_row..` of `source`, matching cells by header name
    ///
    /// Columns of `self` that `source` lacks are left empty. Returns the number
    /// of rows appended.
    pub fn extend_from(&mut self, source: &Table, from_row: usize) -> usize {
        let mapping: Vec<Option<usize>> = self
            .headers
            .iter()
            .map(|h| source.column_index(h))
            .collect();

        let before = self.rows.len();
        for row in from_row..source.len() {
            let cells = mapping
                .iter()
                .map(|col| col.map(|c| source.cell(row, c).to_string()).unwrap_or_default())
                .collect();
            self.rows.push(cells);
        }
        self.rows.len() - before
    }

    /// Release spare capacity held by the row buffers
    pub fn shrink_to_fit(&mut self) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                cell.shrink_to_fit();
            }
            row.shrink_to_fit();
        }
        self.rows.shrink_to_fit();
    }
}

/// Trim a cell and treat lone whitespace as empty
fn clean_cell(cell: &str) -> String {
    cell.trim().to_string()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    fn sample() -> Table {
        Table::new(
            s(&["Text", "Extra", "OutId", "OutName"]),
            vec![
                s(&["  printer jammed ", "floor 2", "", ""]),
                s(&["no internet", "", "7", "Network"]),
                s(&["invoice wrong"]),
            ],
        )
    }

    #[test]
    fn new_trims_and_pads_rows() {
        let table = sample();
        assert_eq!(table.cell(0, 0), "printer jammed");
        assert_eq!(table.rows()[2].len(), 4);
        assert_eq!(table.cell(2, 3), "");
    }

    #[test]
    fn overlong_rows_are_truncated() {
        let table = Table::new(s(&["A"]), vec![s(&["1", "2", "3"])]);
        assert_eq!(table.rows()[0], s(&["1"]));
    }

    #[test]
    fn pending_rows_use_trimmed_id() {
        let mut table = sample();
        table.set_cell(2, 2, "   ");
        assert_eq!(table.pending_rows(2), vec![0, 2]);
        assert_eq!(table.done_count(2), 1);
    }

    #[test]
    fn joined_uses_single_spaces_in_column_order() {
        let table = sample();
        assert_eq!(table.joined(0, &[0, 1]), "printer jammed floor 2");
        assert_eq!(table.joined(1, &[1, 0]), " no internet");
        assert_eq!(table.joined(0, &[]), "");
    }

    #[test]
    fn ensure_column_appends_only_when_missing() {
        let mut table = sample();
        assert_eq!(table.ensure_column("OutId"), 2);
        let idx = table.ensure_column("Confidence");
        assert_eq!(idx, 4);
        assert_eq!(table.headers().len(), 5);
        assert!(table.rows().iter().all(|r| r.len() == 5));
    }

    #[test]
    fn require_column_reports_sheet() {
        let table = sample();
        let err = table.require_column("Missing", "data sheet").unwrap_err();
        assert!(err.to_string().contains("data sheet"));
        assert_eq!(table.require_columns(&s(&["Text", "OutName"]), "x").unwrap(), vec![0, 3]);
    }

    #[test]
    fn extend_from_maps_columns_by_name() {
        let mut output = Table::new(
            s(&["Text", "OutId"]),
            vec![s(&["first", "1"])],
        );
        let data = Table::new(
            s(&["Other", "Text"]),
            vec![s(&["x", "first"]), s(&["y", "second"]), s(&["z", "third"])],
        );

        let appended = output.extend_from(&data, 1);

        assert_eq!(appended, 2);
        assert_eq!(output.len(), 3);
        assert_eq!(output.rows()[1], s(&["second", ""]));
        assert_eq!(output.rows()[2], s(&["third", ""]));
    }

    #[test]
    fn out_of_range_access_is_harmless() {
        let mut table = sample();
        assert_eq!(table.cell(99, 0), "");
        table.set_cell(99, 0, "ignored");
        assert_eq!(table.len(), 3);
    }
}
