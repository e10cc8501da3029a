//! The document: one row table, one node graph, one undo history.
//!
//! `Document` owns every piece of mutable state and is the only thing the
//! UI layer talks to. All operations are synchronous and run to
//! completion on the calling thread; "snapshot, mutate, notify" is atomic
//! from the caller's perspective. The mutation operations themselves live
//! in [`ops`](crate::ops); this module provides construction, rebuild,
//! undo, and the bookkeeping they share.

use crate::undo::{RowRestore, UndoHistory, UndoPayload, UndoRecord};
use fsheet_core::{
    ColumnKind, ConfirmEdit, DocumentState, Notifier, NullConfirm, NullNotifier, RowTable,
    WarningSink, fold_key,
};
use fsheet_forest::order::{self, OrderingMode};
use fsheet_forest::{Forest, NodeId, ParentLink, build_forest};
use rustc_hash::FxHashMap;
use std::fmt;
use tracing::{debug, warn};

/// A loaded document: row table, node graph, ordering, warnings, undo.
pub struct Document {
    pub(crate) table: RowTable,
    pub(crate) state: DocumentState,
    pub(crate) forest: Forest,
    pub(crate) ordering: FxHashMap<usize, OrderingMode>,
    pub(crate) warnings: WarningSink,
    pub(crate) history: UndoHistory,
    pending_changes: u32,
    pub(crate) notifier: Box<dyn Notifier>,
    pub(crate) confirm: Box<dyn ConfirmEdit>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("rows", &self.table.row_count())
            .field("nodes", &self.forest.len())
            .field("hier_cols", &self.state.hier_cols())
            .field("undo_depth", &self.history.len())
            .field("pending_changes", &self.pending_changes)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Build a document from a table and its column classification. Runs
    /// the tree builder, so placeholder rows may be appended and warnings
    /// accumulated.
    #[must_use]
    pub fn new(mut table: RowTable, state: DocumentState) -> Self {
        let mut warnings = WarningSink::new();
        let forest = build_forest(&mut table, &state, &mut warnings);
        let ordering = state
            .hier_cols()
            .iter()
            .map(|&h| (h, OrderingMode::Auto))
            .collect();
        let mut doc = Self {
            table,
            state,
            forest,
            ordering,
            warnings,
            history: UndoHistory::new(),
            pending_changes: 0,
            notifier: Box::new(NullNotifier),
            confirm: Box::new(NullConfirm),
        };
        doc.renormalize_all();
        doc
    }

    /// Attach a display notifier (builder style).
    #[must_use]
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Attach a confirmation prompt (builder style).
    #[must_use]
    pub fn with_confirm(mut self, confirm: Box<dyn ConfirmEdit>) -> Self {
        self.confirm = confirm;
        self
    }

    // --- accessors ------------------------------------------------------

    #[must_use]
    pub fn table(&self) -> &RowTable {
        &self.table
    }

    #[must_use]
    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    /// Mutable view state (selection/scroll); the UI keeps this current
    /// so undo records capture real focus.
    pub fn state_mut(&mut self) -> &mut DocumentState {
        &mut self.state
    }

    #[must_use]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    #[must_use]
    pub fn warnings(&self) -> &WarningSink {
        &self.warnings
    }

    pub fn warnings_mut(&mut self) -> &mut WarningSink {
        &mut self.warnings
    }

    /// Undo depth and the "N/75" label.
    #[must_use]
    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    /// Ordering mode of one hierarchy. Auto for unknown columns.
    #[must_use]
    pub fn ordering(&self, hier: usize) -> &OrderingMode {
        self.ordering.get(&hier).unwrap_or(&OrderingMode::Auto)
    }

    /// Display order of the top-level nodes of `hier`.
    #[must_use]
    pub fn ordered_roots(&self, hier: usize) -> Vec<NodeId> {
        order::ordered_roots(&self.forest, hier, self.ordering(hier))
    }

    /// Unsaved-changes counter: incremented by every mutation push,
    /// decremented by undo, reset by [`mark_saved`](Self::mark_saved).
    #[must_use]
    pub fn pending_changes(&self) -> u32 {
        self.pending_changes
    }

    /// The surrounding application calls this after a successful save.
    pub fn mark_saved(&mut self) {
        self.pending_changes = 0;
    }

    // --- shared bookkeeping for ops ------------------------------------

    /// Row index backing the node with this (raw or folded) key.
    #[must_use]
    pub(crate) fn find_row(&self, key: &str) -> Option<usize> {
        let key = fold_key(key);
        let id_col = self.state.id_col();
        (0..self.table.row_count()).find(|&r| fold_key(self.table.cell(r, id_col)) == key)
    }

    /// Display spelling for a parent link ("" for Top).
    #[must_use]
    pub(crate) fn link_display(&self, link: ParentLink) -> String {
        match link {
            ParentLink::Top => String::new(),
            ParentLink::Node(p) => self.forest.node(p).display_name().to_owned(),
        }
    }

    /// Folded key addressing the manual-order list a link maps to
    /// (`None` = the top-level list).
    #[must_use]
    pub(crate) fn link_list_key(&self, link: ParentLink) -> Option<String> {
        match link {
            ParentLink::Top => None,
            ParentLink::Node(p) => Some(self.forest.node(p).key().to_owned()),
        }
    }

    pub(crate) fn manual_mut(&mut self, hier: usize) -> Option<&mut order::ManualOrder> {
        match self.ordering.get_mut(&hier) {
            Some(OrderingMode::Manual(m)) => Some(m),
            _ => None,
        }
    }

    /// Capture ordering modes + view state and push an undo record.
    /// Called after all preconditions passed and before the first write.
    pub(crate) fn push_undo(&mut self, payload: UndoPayload) {
        let orders = self
            .ordering
            .iter()
            .map(|(&h, m)| (h, m.clone()))
            .collect();
        self.history.push(UndoRecord {
            payload,
            orders,
            view: self.state.view.clone(),
        });
        self.pending_changes += 1;
    }

    /// Bring one hierarchy's graph order in line with its mode (falls
    /// back to auto-sort, with a warning, on a divergent manual order).
    pub(crate) fn renormalize(&mut self, hier: usize) {
        let mut mode = self
            .ordering
            .remove(&hier)
            .unwrap_or(OrderingMode::Auto);
        order::normalize(&mut self.forest, hier, &mut mode, &mut self.warnings);
        self.ordering.insert(hier, mode);
    }

    pub(crate) fn renormalize_all(&mut self) {
        for h in self.state.hier_cols().to_vec() {
            self.renormalize(h);
        }
    }

    /// Rebuild the node graph from the current table. `quiet` suppresses
    /// the builder's warning heuristics (undo and persistence restore
    /// already-consistent tables).
    pub(crate) fn rebuild(&mut self, quiet: bool) {
        if quiet {
            let mut scratch = WarningSink::new();
            self.forest = build_forest(&mut self.table, &self.state, &mut scratch);
        } else {
            self.forest = build_forest(&mut self.table, &self.state, &mut self.warnings);
        }
        self.renormalize_all();
    }

    // --- undo -----------------------------------------------------------

    /// Undo the most recent mutation. Returns `false` on an empty stack.
    ///
    /// Restoration is best-effort: a malformed record (stale row index
    /// and the like) never panics; the affected field is skipped with a
    /// warning and the rest of the record still applies.
    pub fn undo(&mut self) -> bool {
        let Some(record) = self.history.pop() else {
            return false;
        };
        debug!(target: "fsheet", label = %self.history.label(), "undo");
        let mut structural = false;
        match record.payload {
            UndoPayload::CellEdits(deltas) => {
                for delta in &deltas {
                    if self.table.set_cell(delta.row, delta.col, delta.old.clone()) {
                        structural |= !matches!(
                            self.state.column_kind(delta.col),
                            ColumnKind::Detail
                        );
                    } else {
                        self.undo_damage(delta.row, delta.col);
                    }
                }
            }
            UndoPayload::Structural { inserted, restores } => {
                structural = true;
                let mut inserted = inserted;
                inserted.sort_unstable_by(|a, b| b.cmp(a));
                for row in inserted {
                    if self.table.remove_row(row).is_none() {
                        self.undo_damage(row, 0);
                    }
                }
                let mut restores = restores;
                restores.sort_by_key(RowRestore::row);
                for restore in restores {
                    match restore {
                        RowRestore::Full { row, cells } => {
                            self.table.insert_row(row, cells);
                        }
                        RowRestore::Cells { row, cells } => {
                            for (col, old) in cells {
                                if !self.table.set_cell(row, col, old) {
                                    self.undo_damage(row, col);
                                }
                            }
                        }
                    }
                }
            }
            UndoPayload::ColumnAdded { col } => {
                structural = true;
                if self.table.remove_column(col).is_some() {
                    self.state.column_removed(col);
                } else {
                    self.undo_damage(0, col);
                }
            }
            UndoPayload::ColumnRemoved {
                col,
                header,
                was_hier,
                cells,
            } => {
                structural = true;
                self.table.insert_column_with(col, &cells);
                let kind = if was_hier {
                    ColumnKind::Parent
                } else {
                    ColumnKind::Detail
                };
                self.state.column_inserted(col, header, kind);
            }
            UndoPayload::Ordering { .. } => {
                // The wholesale ordering restore below carries the
                // previous mapping.
            }
            UndoPayload::FullTable {
                width,
                headers,
                rows,
            } => {
                structural = true;
                self.table.replace_all(width, rows);
                self.state.set_headers(headers);
            }
        }
        self.ordering = record.orders.into_iter().collect();
        if structural {
            self.rebuild(true);
        } else {
            self.renormalize_all();
        }
        self.state.view = record.view;
        self.pending_changes = self.pending_changes.saturating_sub(1);
        if structural {
            self.notifier.structure_rebuilt();
        } else {
            self.notifier.rows_changed();
        }
        if let Some(selected) = self.state.view.selected.clone() {
            self.notifier.select_node(&selected);
        }
        true
    }

    fn undo_damage(&mut self, row: usize, col: usize) {
        warn!(target: "fsheet", row, col, "undo record no longer matches the table");
        self.warnings.push(format!(
            "undo could not fully restore cell ({row}, {col}); the document may be incomplete"
        ));
    }
}
