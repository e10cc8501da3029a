//! Undo records and the bounded history stack.
//!
//! Each mutation pushes one [`UndoRecord`] *before* touching the document:
//! a tagged payload capturing exactly the fields that operation type
//! changes, the per-hierarchy ordering modes, and the view state at push
//! time. Undo pops the top record and restores the captured fields
//! verbatim; there is no redo - once undone, an action is gone unless the
//! user performs it again. This mirrors the forward-only history of the
//! original system and is a deliberate scope limit, not a gap.
//!
//! The stack holds at most [`UNDO_CAPACITY`] records; pushing onto a full
//! stack evicts the oldest.

use fsheet_core::ViewState;
use fsheet_forest::OrderingMode;

/// Maximum number of undoable steps.
pub const UNDO_CAPACITY: usize = 75;

/// One captured cell: `(row, col)` and the value it held before the
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellDelta {
    pub row: usize,
    pub col: usize,
    pub old: String,
}

/// Per-row restoration data for structural deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRestore {
    /// The row was physically removed; re-insert it whole at its old
    /// index.
    Full { row: usize, cells: Vec<String> },
    /// The row survived; only these per-hierarchy cells changed.
    Cells { row: usize, cells: Vec<(usize, String)> },
}

impl RowRestore {
    /// The row index this restore applies to.
    #[must_use]
    pub fn row(&self) -> usize {
        match self {
            Self::Full { row, .. } | Self::Cells { row, .. } => *row,
        }
    }
}

/// What one operation type needs to reverse itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoPayload {
    /// Row-level edits: old values of the touched cells.
    CellEdits(Vec<CellDelta>),
    /// Structural add/delete: rows that were inserted (undo removes
    /// them) and rows to restore.
    Structural {
        inserted: Vec<usize>,
        restores: Vec<RowRestore>,
    },
    /// A column was inserted at `col`; undo removes it.
    ColumnAdded { col: usize },
    /// A column was removed; undo re-inserts header and contents.
    ColumnRemoved {
        col: usize,
        header: String,
        was_hier: bool,
        cells: Vec<String>,
    },
    /// A manual-order change; the previous mode carries the full
    /// key-to-index mapping.
    Ordering { hier: usize, previous: OrderingMode },
    /// Operations touching many rows indiscriminately (bulk re-parents,
    /// merges, imports): a full copy of the table.
    FullTable {
        width: usize,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

/// One undoable step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoRecord {
    pub payload: UndoPayload,
    /// Ordering modes of every hierarchy before the mutation.
    pub orders: Vec<(usize, OrderingMode)>,
    /// Cursor/selection/scroll state before the mutation.
    pub view: ViewState,
}

/// Bounded, forward-only history stack.
#[derive(Debug, Clone, Default)]
pub struct UndoHistory {
    records: Vec<UndoRecord>,
}

impl UndoHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of undoable steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Push a record, evicting the oldest when full.
    pub fn push(&mut self, record: UndoRecord) {
        self.records.push(record);
        if self.records.len() > UNDO_CAPACITY {
            self.records.remove(0);
        }
    }

    /// Pop the most recent record.
    pub fn pop(&mut self) -> Option<UndoRecord> {
        self.records.pop()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// The user-facing position label, e.g. `"3/75"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{UNDO_CAPACITY}", self.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tag: usize) -> UndoRecord {
        UndoRecord {
            payload: UndoPayload::ColumnAdded { col: tag },
            orders: Vec::new(),
            view: ViewState::default(),
        }
    }

    #[test]
    fn push_pop_is_lifo() {
        let mut h = UndoHistory::new();
        h.push(record(1));
        h.push(record(2));
        assert_eq!(h.pop(), Some(record(2)));
        assert_eq!(h.pop(), Some(record(1)));
        assert_eq!(h.pop(), None);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut h = UndoHistory::new();
        for i in 0..UNDO_CAPACITY + 5 {
            h.push(record(i));
        }
        assert_eq!(h.len(), UNDO_CAPACITY);
        // The five oldest are gone; the most recent survives.
        assert_eq!(h.pop(), Some(record(UNDO_CAPACITY + 4)));
    }

    #[test]
    fn label_counts_entries() {
        let mut h = UndoHistory::new();
        assert_eq!(h.label(), "0/75");
        h.push(record(0));
        assert_eq!(h.label(), "1/75");
    }

    #[test]
    fn row_restore_reports_its_row() {
        let full = RowRestore::Full {
            row: 3,
            cells: vec!["a".into()],
        };
        let cells = RowRestore::Cells {
            row: 7,
            cells: vec![(1, "x".into())],
        };
        assert_eq!(full.row(), 3);
        assert_eq!(cells.row(), 7);
    }
}
