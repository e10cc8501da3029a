//! The flat record store backing a document.
//!
//! A [`RowTable`] is an ordered sequence of fixed-width rows of strings,
//! one row per ID. Cells are addressed by `(row, column)`. The table knows
//! nothing about column meaning; classification (ID / Parent / Detail)
//! lives in [`DocumentState`](crate::document::DocumentState).
//!
//! Row indices are stable across single-cell edits but renumber on row
//! insert/delete, which is why structural undo records capture row indices
//! together with row contents.

/// Ordered, fixed-width grid of string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowTable {
    width: usize,
    rows: Vec<Vec<String>>,
}

impl RowTable {
    /// Create an empty table with the given column count.
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            width,
            rows: Vec::new(),
        }
    }

    /// Build a table from raw rows, padding or truncating each row to the
    /// width of the widest one.
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut table = Self::new(width);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read a cell. Out-of-range addresses read as the empty string, so
    /// callers restoring possibly-stale undo data never panic here.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map_or("", String::as_str)
    }

    /// Write a cell. Returns `false` (and writes nothing) when the address
    /// is out of range.
    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) -> bool {
        match self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) => {
                *cell = value.into();
                true
            }
            None => false,
        }
    }

    /// Borrow a full row.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[String]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    /// Iterate over all rows.
    pub fn iter(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Append a row, padding or truncating it to the table width.
    pub fn push_row(&mut self, row: Vec<String>) {
        self.insert_row(self.rows.len(), row);
    }

    /// Insert a row at `index` (clamped to the row count), padding or
    /// truncating it to the table width.
    pub fn insert_row(&mut self, index: usize, mut row: Vec<String>) {
        row.resize(self.width, String::new());
        let index = index.min(self.rows.len());
        self.rows.insert(index, row);
    }

    /// Remove and return the row at `index`, or `None` if out of range.
    pub fn remove_row(&mut self, index: usize) -> Option<Vec<String>> {
        if index < self.rows.len() {
            Some(self.rows.remove(index))
        } else {
            None
        }
    }

    /// Insert an empty column at `index` (clamped to the width).
    pub fn insert_column(&mut self, index: usize) {
        let index = index.min(self.width);
        self.width += 1;
        for row in &mut self.rows {
            row.insert(index, String::new());
        }
    }

    /// Insert a column at `index` with the given cell contents, one per
    /// row. Missing entries fill with the empty string.
    pub fn insert_column_with(&mut self, index: usize, cells: &[String]) {
        self.insert_column(index);
        for (row, value) in cells.iter().enumerate() {
            self.set_cell(row, index.min(self.width - 1), value.clone());
        }
    }

    /// Remove the column at `index` and return its cells, or `None` if out
    /// of range.
    pub fn remove_column(&mut self, index: usize) -> Option<Vec<String>> {
        if index >= self.width {
            return None;
        }
        self.width -= 1;
        Some(self.rows.iter_mut().map(|row| row.remove(index)).collect())
    }

    /// Replace the entire contents with `rows` (used by full-table undo).
    pub fn replace_all(&mut self, width: usize, rows: Vec<Vec<String>>) {
        self.width = width;
        self.rows = rows;
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
    }

    /// Clone the raw rows (used by full-table undo capture).
    #[must_use]
    pub fn clone_rows(&self) -> Vec<Vec<String>> {
        self.rows.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RowTable {
        let mut t = RowTable::new(3);
        t.push_row(vec!["a".into(), "".into(), "x".into()]);
        t.push_row(vec!["b".into(), "a".into(), "y".into()]);
        t
    }

    #[test]
    fn cell_roundtrip() {
        let mut t = sample();
        assert_eq!(t.cell(1, 1), "a");
        assert!(t.set_cell(1, 1, "b"));
        assert_eq!(t.cell(1, 1), "b");
    }

    #[test]
    fn out_of_range_reads_empty() {
        let t = sample();
        assert_eq!(t.cell(99, 0), "");
        assert_eq!(t.cell(0, 99), "");
    }

    #[test]
    fn out_of_range_write_is_rejected() {
        let mut t = sample();
        assert!(!t.set_cell(99, 0, "z"));
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn push_row_pads_to_width() {
        let mut t = sample();
        t.push_row(vec!["c".into()]);
        assert_eq!(t.row(2).unwrap(), &["c".to_owned(), String::new(), String::new()]);
    }

    #[test]
    fn insert_and_remove_row() {
        let mut t = sample();
        t.insert_row(1, vec!["mid".into(), "a".into(), "".into()]);
        assert_eq!(t.cell(1, 0), "mid");
        assert_eq!(t.cell(2, 0), "b");
        let removed = t.remove_row(1).unwrap();
        assert_eq!(removed[0], "mid");
        assert_eq!(t.cell(1, 0), "b");
    }

    #[test]
    fn insert_and_remove_column() {
        let mut t = sample();
        t.insert_column(1);
        assert_eq!(t.column_count(), 4);
        assert_eq!(t.cell(0, 1), "");
        assert_eq!(t.cell(1, 2), "a");
        let cells = t.remove_column(1).unwrap();
        assert_eq!(cells, vec![String::new(), String::new()]);
        assert_eq!(t.cell(1, 1), "a");
    }

    #[test]
    fn insert_column_with_contents() {
        let mut t = sample();
        t.insert_column_with(3, &["p".to_owned(), "q".to_owned()]);
        assert_eq!(t.cell(0, 3), "p");
        assert_eq!(t.cell(1, 3), "q");
    }

    #[test]
    fn from_rows_normalizes_width() {
        let t = RowTable::from_rows(vec![
            vec!["a".into()],
            vec!["b".into(), "a".into(), "extra".into()],
        ]);
        assert_eq!(t.column_count(), 3);
        assert_eq!(t.cell(0, 2), "");
    }
}
