//! The mutation operations.
//!
//! Every operation follows the same shape: validate all preconditions
//! (no writes yet), push one undo record, mutate table and graph
//! together, renormalize the touched hierarchies' order, notify. A
//! precondition failure returns a typed [`EditError`] with nothing
//! pushed and nothing written.
//!
//! The four cut/copy x single/subtree paste variants share one
//! parameterized transplant routine; the public methods are thin
//! wrappers selecting [`Scope`] and [`PasteMode`].

use crate::document::Document;
use crate::error::{EditError, EditResult};
use crate::undo::{CellDelta, RowRestore, UndoPayload};
use fsheet_core::{ColumnKind, fold_key};
use fsheet_forest::order::ManualOrder;
use fsheet_forest::{NodeId, ParentLink};
use tracing::debug;

/// Per-call flags shared by every operation.
///
/// `snapshot: false` lets an outer bulk operation own the undo record
/// while reusing inner operations for the work; `quiet: true` suppresses
/// notifier traffic and confirmation prompts during bulk/import paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditOptions {
    pub snapshot: bool,
    pub quiet: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            snapshot: true,
            quiet: false,
        }
    }
}

impl EditOptions {
    /// Snapshot, prompt, notify: the interactive default.
    pub const INTERACTIVE: Self = Self {
        snapshot: true,
        quiet: false,
    };

    /// No snapshot, no prompts: for recursion inside an outer snapshot.
    pub const NESTED: Self = Self {
        snapshot: false,
        quiet: true,
    };
}

/// What happens to a deleted node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Children splice up to the deleted node's own parent (default).
    ReparentChildren,
    /// Children become top-level roots of the hierarchy.
    OrphanChildren,
    /// The whole subtree goes.
    Subtree,
}

/// Whether a paste moves one node or its entire subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Node,
    Subtree,
}

/// Whether a paste moves the linkage or duplicates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteMode {
    Move,
    Duplicate,
}

impl Document {
    // --- add ------------------------------------------------------------

    /// Add `id` under `parent` (empty string = top level) in the current
    /// hierarchy.
    pub fn add(&mut self, id: &str, parent: &str, opts: EditOptions) -> EditResult<()> {
        self.add_in(id, parent, self.state.current_hier(), opts)
    }

    /// Add `id` under `parent` in `hier`. Inserts a new node (with a new
    /// backing row) or attaches an existing node that is not yet
    /// enrolled in `hier`.
    pub fn add_in(
        &mut self,
        id: &str,
        parent: &str,
        hier: usize,
        opts: EditOptions,
    ) -> EditResult<()> {
        if !self.state.is_hier(hier) {
            return Err(EditError::BadColumn(hier));
        }
        let id = self.state.clean(id).to_owned();
        if id.is_empty() {
            return Err(EditError::EmptyId);
        }
        let parent = self.state.clean(parent).to_owned();
        let target = if parent.is_empty() {
            ParentLink::Top
        } else {
            if fold_key(&parent) == fold_key(&id) {
                return Err(EditError::SelfReference);
            }
            ParentLink::Node(
                self.forest
                    .lookup(&parent)
                    .ok_or_else(|| EditError::UnknownId(parent.clone()))?,
            )
        };
        let existing = self.forest.lookup(&id);
        if let Some(node) = existing
            && self.forest.node(node).participates(hier)
        {
            return Err(EditError::AlreadyEnrolled { id, hier });
        }

        if opts.snapshot {
            let payload = match existing {
                Some(_) => match self.find_row(&id) {
                    Some(row) => UndoPayload::Structural {
                        inserted: Vec::new(),
                        restores: vec![RowRestore::Cells {
                            row,
                            cells: vec![(hier, self.table.cell(row, hier).to_owned())],
                        }],
                    },
                    // A node without a backing row should not exist; be
                    // conservative rather than guess an index.
                    None => self.full_table_payload(),
                },
                None => UndoPayload::Structural {
                    inserted: vec![self.table.row_count()],
                    restores: Vec::new(),
                },
            };
            self.push_undo(payload);
        }

        let node = match existing {
            Some(node) => node,
            None => {
                let node = self.forest.intern(&id);
                let mut cells = vec![String::new(); self.table.column_count()];
                cells[self.state.id_col()] =
                    self.forest.node(node).display_name().to_owned();
                self.table.push_row(cells);
                node
            }
        };
        let key = self.forest.node(node).key().to_owned();
        if let Some(row) = self.find_row(&key) {
            self.table.set_cell(row, hier, self.link_display(target));
        }
        self.forest.attach(node, hier, target);
        self.ensure_parent_rooted(target, hier);

        let list_key = self.link_list_key(target);
        if let Some(manual) = self.manual_mut(hier) {
            manual.append(list_key.as_deref(), &key);
        }
        self.renormalize(hier);
        debug!(target: "fsheet", id = %key, hier, "node added");
        if !opts.quiet {
            self.notifier.rows_changed();
            self.notifier.select_node(&key);
        }
        Ok(())
    }

    // --- rename ---------------------------------------------------------

    /// Rename `old` to `new`, propagating the new spelling into every
    /// parent cell that referenced the old one and into every manual
    /// order list, in place.
    pub fn rename(&mut self, old: &str, new: &str, opts: EditOptions) -> EditResult<()> {
        let node = self
            .forest
            .lookup(old)
            .ok_or_else(|| EditError::UnknownId(old.to_owned()))?;
        let new = self.state.clean(new).to_owned();
        if new.is_empty() {
            return Err(EditError::EmptyId);
        }
        let old_key = self.forest.node(node).key().to_owned();
        let new_key = fold_key(&new);
        if new_key != old_key && self.forest.lookup(&new).is_some() {
            return Err(EditError::NameCollision(new));
        }

        let mut deltas = Vec::new();
        if let Some(row) = self.find_row(&old_key) {
            deltas.push(CellDelta {
                row,
                col: self.state.id_col(),
                old: self.table.cell(row, self.state.id_col()).to_owned(),
            });
        }
        for row in 0..self.table.row_count() {
            for &h in self.state.hier_cols() {
                if fold_key(self.table.cell(row, h)) == old_key {
                    deltas.push(CellDelta {
                        row,
                        col: h,
                        old: self.table.cell(row, h).to_owned(),
                    });
                }
            }
        }
        if opts.snapshot {
            self.push_undo(UndoPayload::CellEdits(deltas.clone()));
        }

        self.forest.rename(node, &new);
        let display = self.forest.node(node).display_name().to_owned();
        for delta in &deltas {
            self.table.set_cell(delta.row, delta.col, display.clone());
        }
        for &h in &self.state.hier_cols().to_vec() {
            if let Some(manual) = self.manual_mut(h) {
                manual.rename_key(&old_key, &new_key);
            }
        }
        self.renormalize_all();
        debug!(target: "fsheet", old = %old_key, new = %new_key, "node renamed");
        if !opts.quiet {
            self.notifier.rows_changed();
            self.notifier.select_node(&new_key);
        }
        Ok(())
    }

    // --- delete ---------------------------------------------------------

    /// Delete `id` from one hierarchy. The backing row is only removed
    /// when this was the node's last hierarchy.
    pub fn delete(
        &mut self,
        id: &str,
        hier: usize,
        mode: DeleteMode,
        opts: EditOptions,
    ) -> EditResult<()> {
        if !self.state.is_hier(hier) {
            return Err(EditError::BadColumn(hier));
        }
        let node = self
            .forest
            .lookup(id)
            .ok_or_else(|| EditError::UnknownId(id.to_owned()))?;
        if !self.forest.node(node).participates(hier) {
            return Err(EditError::NotEnrolled {
                id: id.to_owned(),
                hier,
            });
        }

        let targets = match mode {
            DeleteMode::Subtree => self.forest.subtree(node, hier),
            _ => vec![node],
        };
        let children = match mode {
            DeleteMode::Subtree => Vec::new(),
            _ => self.forest.children(node, hier).to_vec(),
        };
        let old_parent = self.forest.parent(node, hier).unwrap_or(ParentLink::Top);

        if opts.snapshot {
            let mut restores = Vec::new();
            for &t in &targets {
                let key = self.forest.node(t).key().to_owned();
                let Some(row) = self.find_row(&key) else {
                    continue;
                };
                if self.forest.node(t).participation_count() > 1 {
                    restores.push(RowRestore::Cells {
                        row,
                        cells: vec![(hier, self.table.cell(row, hier).to_owned())],
                    });
                } else {
                    restores.push(RowRestore::Full {
                        row,
                        cells: self.table.row(row).map(<[String]>::to_vec).unwrap_or_default(),
                    });
                }
            }
            for &c in &children {
                let key = self.forest.node(c).key().to_owned();
                if let Some(row) = self.find_row(&key) {
                    restores.push(RowRestore::Cells {
                        row,
                        cells: vec![(hier, self.table.cell(row, hier).to_owned())],
                    });
                }
            }
            self.push_undo(UndoPayload::Structural {
                inserted: Vec::new(),
                restores,
            });
        }

        match mode {
            DeleteMode::OrphanChildren => {
                for c in children {
                    self.splice_to(c, hier, ParentLink::Top);
                }
            }
            DeleteMode::ReparentChildren => {
                for c in children {
                    self.splice_to(c, hier, old_parent);
                }
            }
            DeleteMode::Subtree => {}
        }
        // Leaves first so child lists are empty by the time their parent
        // is finalized.
        let mut rows_to_remove = Vec::new();
        for &t in targets.iter().rev() {
            self.forest.detach(t, hier);
            let key = self.forest.node(t).key().to_owned();
            if let Some(manual) = self.manual_mut(hier) {
                manual.remove_key(&key);
            }
            if self.forest.node(t).participation_count() == 0 {
                if let Some(row) = self.find_row(&key) {
                    rows_to_remove.push(row);
                }
                self.forest.remove(t);
            } else if let Some(row) = self.find_row(&key) {
                self.table.set_cell(row, hier, "");
            }
        }
        rows_to_remove.sort_unstable_by(|a, b| b.cmp(a));
        for row in rows_to_remove {
            self.table.remove_row(row);
        }
        self.renormalize(hier);
        debug!(target: "fsheet", id, hier, ?mode, "node deleted");
        if !opts.quiet {
            self.notifier.rows_changed();
        }
        Ok(())
    }

    /// Delete `id` from every hierarchy it participates in: per
    /// hierarchy the children splice to that hierarchy's grandparent,
    /// then the node and its row go away entirely.
    pub fn delete_everywhere(&mut self, id: &str, opts: EditOptions) -> EditResult<()> {
        let node = self
            .forest
            .lookup(id)
            .ok_or_else(|| EditError::UnknownId(id.to_owned()))?;
        let key = self.forest.node(node).key().to_owned();
        let hiers: Vec<usize> = self.forest.node(node).hierarchies().collect();

        if opts.snapshot {
            let mut restores = Vec::new();
            if let Some(row) = self.find_row(&key) {
                restores.push(RowRestore::Full {
                    row,
                    cells: self.table.row(row).map(<[String]>::to_vec).unwrap_or_default(),
                });
            }
            for &h in &hiers {
                for &c in self.forest.children(node, h) {
                    let ckey = self.forest.node(c).key().to_owned();
                    if let Some(row) = self.find_row(&ckey) {
                        restores.push(RowRestore::Cells {
                            row,
                            cells: vec![(h, self.table.cell(row, h).to_owned())],
                        });
                    }
                }
            }
            self.push_undo(UndoPayload::Structural {
                inserted: Vec::new(),
                restores,
            });
        }

        for &h in &hiers {
            let old_parent = self.forest.parent(node, h).unwrap_or(ParentLink::Top);
            for c in self.forest.children(node, h).to_vec() {
                self.splice_to(c, h, old_parent);
            }
            self.forest.detach(node, h);
            if let Some(manual) = self.manual_mut(h) {
                manual.remove_key(&key);
            }
        }
        if let Some(row) = self.find_row(&key) {
            self.table.remove_row(row);
        }
        self.forest.remove(node);
        for h in hiers {
            self.renormalize(h);
        }
        debug!(target: "fsheet", id, "node deleted from every hierarchy");
        if !opts.quiet {
            self.notifier.rows_changed();
        }
        Ok(())
    }

    // --- cut/copy paste -------------------------------------------------

    /// Move a single node to a new parent; its descendants splice to its
    /// old parent.
    pub fn cut_paste(
        &mut self,
        id: &str,
        src_hier: usize,
        dst_hier: usize,
        new_parent: &str,
        opts: EditOptions,
    ) -> EditResult<()> {
        self.transplant(id, src_hier, dst_hier, new_parent, Scope::Node, PasteMode::Move, opts)
    }

    /// Move a node together with its entire subtree.
    pub fn cut_paste_all(
        &mut self,
        id: &str,
        src_hier: usize,
        dst_hier: usize,
        new_parent: &str,
        opts: EditOptions,
    ) -> EditResult<()> {
        self.transplant(
            id,
            src_hier,
            dst_hier,
            new_parent,
            Scope::Subtree,
            PasteMode::Move,
            opts,
        )
    }

    /// Duplicate a node's linkage into another hierarchy; the source
    /// hierarchy is left untouched.
    pub fn copy_paste(
        &mut self,
        id: &str,
        src_hier: usize,
        dst_hier: usize,
        new_parent: &str,
        opts: EditOptions,
    ) -> EditResult<()> {
        self.transplant(
            id,
            src_hier,
            dst_hier,
            new_parent,
            Scope::Node,
            PasteMode::Duplicate,
            opts,
        )
    }

    /// Duplicate an entire subtree's linkage into another hierarchy.
    pub fn copy_paste_all(
        &mut self,
        id: &str,
        src_hier: usize,
        dst_hier: usize,
        new_parent: &str,
        opts: EditOptions,
    ) -> EditResult<()> {
        self.transplant(
            id,
            src_hier,
            dst_hier,
            new_parent,
            Scope::Subtree,
            PasteMode::Duplicate,
            opts,
        )
    }

    /// The shared subtree-transplant routine behind the four paste
    /// variants.
    pub fn transplant(
        &mut self,
        id: &str,
        src_hier: usize,
        dst_hier: usize,
        new_parent: &str,
        scope: Scope,
        mode: PasteMode,
        opts: EditOptions,
    ) -> EditResult<()> {
        if !self.state.is_hier(src_hier) {
            return Err(EditError::BadColumn(src_hier));
        }
        if !self.state.is_hier(dst_hier) {
            return Err(EditError::BadColumn(dst_hier));
        }
        let node = self
            .forest
            .lookup(id)
            .ok_or_else(|| EditError::UnknownId(id.to_owned()))?;
        if !self.forest.node(node).participates(src_hier) {
            return Err(EditError::NotEnrolled {
                id: id.to_owned(),
                hier: src_hier,
            });
        }
        let key = self.forest.node(node).key().to_owned();
        let new_parent = self.state.clean(new_parent).to_owned();
        let target = if new_parent.is_empty() {
            ParentLink::Top
        } else {
            let p = self
                .forest
                .lookup(&new_parent)
                .ok_or_else(|| EditError::UnknownId(new_parent.clone()))?;
            if p == node {
                return Err(EditError::SelfReference);
            }
            ParentLink::Node(p)
        };
        let cross = src_hier != dst_hier;

        match mode {
            PasteMode::Move if !cross => {
                if self.forest.parent(node, src_hier) == Some(target) {
                    return Err(EditError::SameParent);
                }
            }
            PasteMode::Move => {
                if scope == Scope::Node && self.forest.node(node).participates(dst_hier) {
                    return Err(EditError::AlreadyEnrolled {
                        id: id.to_owned(),
                        hier: dst_hier,
                    });
                }
            }
            PasteMode::Duplicate => {
                if !cross || self.forest.node(node).participates(dst_hier) {
                    return Err(EditError::AlreadyEnrolled {
                        id: id.to_owned(),
                        hier: dst_hier,
                    });
                }
            }
        }
        let members = match scope {
            Scope::Subtree => self.forest.subtree(node, src_hier),
            Scope::Node => vec![node],
        };
        if scope == Scope::Subtree {
            if !cross && let ParentLink::Node(p) = target
                && members.contains(&p)
            {
                return Err(EditError::WouldCycle { id: id.to_owned() });
            }
            if cross {
                for &m in &members {
                    if self.forest.node(m).participates(dst_hier) {
                        return Err(EditError::AlreadyEnrolled {
                            id: self.forest.node(m).display_name().to_owned(),
                            hier: dst_hier,
                        });
                    }
                }
            }
        }

        // All preconditions hold; capture the cells this will touch.
        if opts.snapshot {
            let mut deltas = Vec::new();
            let capture = |doc: &Self, member: NodeId, col: usize| {
                let mkey = doc.forest.node(member).key().to_owned();
                if let Some(row) = doc.find_row(&mkey) {
                    Some(CellDelta {
                        row,
                        col,
                        old: doc.table.cell(row, col).to_owned(),
                    })
                } else {
                    None
                }
            };
            match mode {
                PasteMode::Move => {
                    for &m in &members {
                        deltas.extend(capture(self, m, src_hier));
                        if cross {
                            deltas.extend(capture(self, m, dst_hier));
                        }
                    }
                    if scope == Scope::Node {
                        for &c in self.forest.children(node, src_hier) {
                            deltas.extend(capture(self, c, src_hier));
                        }
                    }
                }
                PasteMode::Duplicate => {
                    for &m in &members {
                        deltas.extend(capture(self, m, dst_hier));
                    }
                }
            }
            self.push_undo(UndoPayload::CellEdits(deltas));
        }

        match (mode, scope) {
            (PasteMode::Move, Scope::Node) => {
                let old_parent = self.forest.parent(node, src_hier).unwrap_or(ParentLink::Top);
                for c in self.forest.children(node, src_hier).to_vec() {
                    self.splice_to(c, src_hier, old_parent);
                }
                self.forest.detach(node, src_hier);
                if cross {
                    if let Some(row) = self.find_row(&key) {
                        self.table.set_cell(row, src_hier, "");
                    }
                    if let Some(manual) = self.manual_mut(src_hier) {
                        manual.remove_key(&key);
                    }
                } else if let Some(manual) = self.manual_mut(src_hier) {
                    manual.detach_key(&key);
                }
                self.enroll(node, dst_hier, target);
            }
            (PasteMode::Move, Scope::Subtree) => {
                if cross {
                    let structure = self.subtree_structure(&members, src_hier);
                    for &m in members.iter().rev() {
                        self.forest.detach(m, src_hier);
                    }
                    for &m in &members {
                        let mkey = self.forest.node(m).key().to_owned();
                        if let Some(row) = self.find_row(&mkey) {
                            self.table.set_cell(row, src_hier, "");
                        }
                        if let Some(manual) = self.manual_mut(src_hier) {
                            manual.remove_key(&mkey);
                        }
                    }
                    self.enroll(node, dst_hier, target);
                    for (m, parent) in structure {
                        self.enroll(m, dst_hier, ParentLink::Node(parent));
                    }
                } else {
                    self.forest.detach(node, src_hier);
                    if let Some(manual) = self.manual_mut(src_hier) {
                        manual.detach_key(&key);
                    }
                    self.enroll(node, src_hier, target);
                }
            }
            (PasteMode::Duplicate, Scope::Node) => {
                self.enroll(node, dst_hier, target);
            }
            (PasteMode::Duplicate, Scope::Subtree) => {
                let structure = self.subtree_structure(&members, src_hier);
                self.enroll(node, dst_hier, target);
                for (m, parent) in structure {
                    self.enroll(m, dst_hier, ParentLink::Node(parent));
                }
            }
        }
        self.renormalize(src_hier);
        if cross {
            self.renormalize(dst_hier);
        }
        debug!(
            target: "fsheet",
            id = %key, src_hier, dst_hier, ?scope, ?mode, "transplant"
        );
        if !opts.quiet {
            self.notifier.rows_changed();
            self.notifier.select_node(&key);
        }
        Ok(())
    }

    /// Re-parent every child of `old_parent` in bulk. Children that
    /// violate a precondition (already enrolled in the destination, a
    /// would-be cycle) are skipped and reported, not fatal.
    pub fn cut_paste_children(
        &mut self,
        old_parent: &str,
        src_hier: usize,
        dst_hier: usize,
        new_parent: &str,
        opts: EditOptions,
    ) -> EditResult<Vec<(String, EditError)>> {
        if !self.state.is_hier(src_hier) {
            return Err(EditError::BadColumn(src_hier));
        }
        if !self.state.is_hier(dst_hier) {
            return Err(EditError::BadColumn(dst_hier));
        }
        let parent_node = self
            .forest
            .lookup(old_parent)
            .ok_or_else(|| EditError::UnknownId(old_parent.to_owned()))?;
        let new_parent = self.state.clean(new_parent).to_owned();
        if !new_parent.is_empty() && self.forest.lookup(&new_parent).is_none() {
            return Err(EditError::UnknownId(new_parent));
        }
        let children: Vec<String> = self
            .forest
            .children(parent_node, src_hier)
            .iter()
            .map(|&c| self.forest.node(c).display_name().to_owned())
            .collect();

        if opts.snapshot {
            let payload = self.full_table_payload();
            self.push_undo(payload);
        }
        let mut skipped = Vec::new();
        for child in children {
            match self.transplant(
                &child,
                src_hier,
                dst_hier,
                &new_parent,
                Scope::Subtree,
                PasteMode::Move,
                EditOptions::NESTED,
            ) {
                Ok(()) => {}
                Err(err) => {
                    self.warnings.push(format!("{child:?} was not moved: {err}"));
                    skipped.push((child, err));
                }
            }
        }
        self.renormalize(src_hier);
        if src_hier != dst_hier {
            self.renormalize(dst_hier);
        }
        if !opts.quiet {
            self.notifier.rows_changed();
        }
        Ok(skipped)
    }

    // --- columns --------------------------------------------------------

    /// Insert a Parent or Detail column at `at`.
    pub fn add_column(
        &mut self,
        at: usize,
        kind: ColumnKind,
        header: &str,
        opts: EditOptions,
    ) -> EditResult<()> {
        if kind == ColumnKind::Id {
            return Err(EditError::BadColumn(at));
        }
        let at = at.min(self.table.column_count());
        if opts.snapshot {
            self.push_undo(UndoPayload::ColumnAdded { col: at });
        }
        self.table.insert_column(at);
        self.forest.shift_hierarchies_up(at);
        self.shift_ordering_keys(at, 1);
        self.state.column_inserted(at, header.to_owned(), kind);
        if kind == ColumnKind::Parent {
            self.ordering
                .insert(at, fsheet_forest::OrderingMode::Auto);
        }
        debug!(target: "fsheet", at, ?kind, "column added");
        if !opts.quiet {
            self.notifier.structure_rebuilt();
        }
        Ok(())
    }

    /// Remove the column at `at`. The ID column and the last remaining
    /// hierarchy column cannot be removed. Removing a hierarchy column
    /// drops that hierarchy's linkage everywhere; nodes left with no
    /// participation are reclassified as roots of the first remaining
    /// hierarchy.
    pub fn remove_column(&mut self, at: usize, opts: EditOptions) -> EditResult<()> {
        if at >= self.table.column_count() {
            return Err(EditError::BadColumn(at));
        }
        match self.state.column_kind(at) {
            ColumnKind::Id => return Err(EditError::BadColumn(at)),
            ColumnKind::Parent if self.state.hier_cols().len() == 1 => {
                return Err(EditError::BadColumn(at));
            }
            _ => {}
        }
        let was_hier = self.state.is_hier(at);
        let header = self.state.header(at).to_owned();
        let cells: Vec<String> = (0..self.table.row_count())
            .map(|r| self.table.cell(r, at).to_owned())
            .collect();
        if opts.snapshot {
            self.push_undo(UndoPayload::ColumnRemoved {
                col: at,
                header: header.clone(),
                was_hier,
                cells,
            });
        }
        if was_hier {
            self.forest.drop_hierarchy(at);
            self.ordering.remove(&at);
        }
        self.table.remove_column(at);
        self.forest.shift_hierarchies_down(at);
        self.state.column_removed(at);
        self.shift_ordering_keys(at, -1);
        if was_hier {
            let first = self.state.first_hier();
            let first_header = self.state.header(first).to_owned();
            let moved = self
                .forest
                .associate(self.state.hier_cols(), first);
            for key in moved {
                self.warnings.push(format!(
                    "{key:?} no longer belongs to any hierarchy; it is now a \
                     top-level row of {first_header:?}"
                ));
                if let Some(manual) = self.manual_mut(first) {
                    manual.append(None, &key);
                }
            }
            self.renormalize_all();
        }
        debug!(target: "fsheet", at, was_hier, "column removed");
        if !opts.quiet {
            self.notifier.structure_rebuilt();
        }
        Ok(())
    }

    // --- direct cell edit -----------------------------------------------

    /// Edit one cell through the grid. Detail cells are plain edits; an
    /// ID or parent cell edit is structural and forces a rebuild, which
    /// under manual order first asks the confirmation prompt (never
    /// during quiet bulk paths).
    pub fn edit_cell(
        &mut self,
        row: usize,
        col: usize,
        value: &str,
        opts: EditOptions,
    ) -> EditResult<()> {
        if row >= self.table.row_count() || col >= self.table.column_count() {
            return Err(EditError::BadCell { row, col });
        }
        let value = self.state.clean(value).to_owned();
        match self.state.column_kind(col) {
            ColumnKind::Detail => {
                if opts.snapshot {
                    self.push_undo(UndoPayload::CellEdits(vec![CellDelta {
                        row,
                        col,
                        old: self.table.cell(row, col).to_owned(),
                    }]));
                }
                self.table.set_cell(row, col, value);
                if !opts.quiet {
                    self.notifier.rows_changed();
                }
                Ok(())
            }
            ColumnKind::Id => self.edit_id_cell(row, col, &value, opts),
            ColumnKind::Parent => self.edit_parent_cell(row, col, &value, opts),
        }
    }

    fn edit_id_cell(
        &mut self,
        row: usize,
        col: usize,
        value: &str,
        opts: EditOptions,
    ) -> EditResult<()> {
        if value.is_empty() {
            return Err(EditError::EmptyId);
        }
        let old_id = self.table.cell(row, col).to_owned();
        let old_key = fold_key(&old_id);
        let new_key = fold_key(value);
        if new_key != old_key && self.forest.lookup(value).is_some() {
            return Err(EditError::NameCollision(value.to_owned()));
        }
        self.confirm_rebuild(opts)?;
        if opts.snapshot {
            let payload = self.full_table_payload();
            self.push_undo(payload);
        }
        self.table.set_cell(row, col, value.to_owned());
        for r in 0..self.table.row_count() {
            for &h in &self.state.hier_cols().to_vec() {
                if fold_key(self.table.cell(r, h)) == old_key {
                    self.table.set_cell(r, h, value.to_owned());
                }
            }
        }
        for &h in &self.state.hier_cols().to_vec() {
            if let Some(manual) = self.manual_mut(h) {
                manual.rename_key(&old_key, &new_key);
            }
        }
        self.rebuild_after_grid_edit();
        if !opts.quiet {
            self.notifier.structure_rebuilt();
            self.notifier.select_node(&new_key);
        }
        Ok(())
    }

    fn edit_parent_cell(
        &mut self,
        row: usize,
        col: usize,
        value: &str,
        opts: EditOptions,
    ) -> EditResult<()> {
        let id = self.table.cell(row, self.state.id_col()).to_owned();
        let key = fold_key(&id);
        if !value.is_empty() {
            if fold_key(value) == key {
                return Err(EditError::SelfReference);
            }
            if let (Some(p), Some(node)) = (self.forest.lookup(value), self.forest.lookup(&id))
                && self.forest.is_descendant(p, node, col)
            {
                return Err(EditError::WouldCycle { id });
            }
        }
        self.confirm_rebuild(opts)?;
        if opts.snapshot {
            let payload = self.full_table_payload();
            self.push_undo(payload);
        }
        if let Some(manual) = self.manual_mut(col) {
            manual.detach_key(&key);
        }
        self.table.set_cell(row, col, value.to_owned());
        self.rebuild_after_grid_edit();
        if !opts.quiet {
            self.notifier.structure_rebuilt();
            self.notifier.select_node(&key);
        }
        Ok(())
    }

    // --- ordering -------------------------------------------------------

    /// Splice `key` to `new_index` in one manual list (`parent = None`
    /// addresses the top-level list). Fails on auto-sorted hierarchies.
    pub fn reorder(
        &mut self,
        hier: usize,
        parent: Option<&str>,
        key: &str,
        new_index: usize,
        opts: EditOptions,
    ) -> EditResult<()> {
        if !self.state.is_hier(hier) {
            return Err(EditError::BadColumn(hier));
        }
        let key = fold_key(key);
        let parent_key = parent.map(fold_key);
        {
            let Some(manual) = self.manual_ref(hier) else {
                return Err(EditError::NotManual(hier));
            };
            let list = match &parent_key {
                None => manual.top(),
                Some(p) => manual.children_of(p).unwrap_or(&[]),
            };
            if !list.iter().any(|k| k == &key) {
                return Err(EditError::UnknownId(key));
            }
        }
        if opts.snapshot {
            self.push_undo(UndoPayload::Ordering {
                hier,
                previous: self.ordering(hier).clone(),
            });
        }
        if let Some(manual) = self.manual_mut(hier) {
            manual.move_key(parent_key.as_deref(), &key, new_index);
        }
        self.renormalize(hier);
        if !opts.quiet {
            self.notifier.rows_changed();
        }
        Ok(())
    }

    /// Switch a hierarchy between manual order and auto-sort. Switching
    /// to manual captures the current display order; switching to auto
    /// discards the lists and re-sorts.
    pub fn set_manual_order(
        &mut self,
        hier: usize,
        manual: bool,
        opts: EditOptions,
    ) -> EditResult<()> {
        if !self.state.is_hier(hier) {
            return Err(EditError::BadColumn(hier));
        }
        if self.ordering(hier).is_manual() == manual {
            return Ok(());
        }
        if opts.snapshot {
            self.push_undo(UndoPayload::Ordering {
                hier,
                previous: self.ordering(hier).clone(),
            });
        }
        let mode = if manual {
            fsheet_forest::OrderingMode::Manual(ManualOrder::from_forest(&self.forest, hier))
        } else {
            fsheet_forest::OrderingMode::Auto
        };
        self.ordering.insert(hier, mode);
        self.renormalize(hier);
        debug!(target: "fsheet", hier, manual, "ordering mode switched");
        if !opts.quiet {
            self.notifier.rows_changed();
        }
        Ok(())
    }

    // --- shared helpers -------------------------------------------------

    /// Move `child` under `link` in `hier`, keeping cell and manual-order
    /// bookkeeping in step (the splice applied to a deleted or moved
    /// node's children).
    fn splice_to(&mut self, child: NodeId, hier: usize, link: ParentLink) {
        self.forest.detach(child, hier);
        self.forest.attach(child, hier, link);
        let ckey = self.forest.node(child).key().to_owned();
        if let Some(row) = self.find_row(&ckey) {
            self.table.set_cell(row, hier, self.link_display(link));
        }
        let list_key = self.link_list_key(link);
        if let Some(manual) = self.manual_mut(hier) {
            manual.detach_key(&ckey);
            manual.append(list_key.as_deref(), &ckey);
        }
    }

    /// Enroll `node` under `link` in `hier`: graph link, parent cell,
    /// manual-order append, and rooting of a newly-dragged-in parent.
    fn enroll(&mut self, node: NodeId, hier: usize, link: ParentLink) {
        self.forest.attach(node, hier, link);
        self.ensure_parent_rooted(link, hier);
        let key = self.forest.node(node).key().to_owned();
        if let Some(row) = self.find_row(&key) {
            self.table.set_cell(row, hier, self.link_display(link));
        }
        let list_key = self.link_list_key(link);
        if let Some(manual) = self.manual_mut(hier) {
            manual.append(list_key.as_deref(), &key);
        }
    }

    /// A node that just gained children in a hierarchy it had no parent
    /// link in becomes a root there (the associate rule, applied
    /// eagerly).
    fn ensure_parent_rooted(&mut self, link: ParentLink, hier: usize) {
        if let ParentLink::Node(p) = link
            && self.forest.parent(p, hier).is_none()
        {
            self.forest.attach(p, hier, ParentLink::Top);
            let pkey = self.forest.node(p).key().to_owned();
            if let Some(manual) = self.manual_mut(hier) {
                manual.append(None, &pkey);
            }
        }
    }

    /// `(member, parent member)` pairs for every subtree member except
    /// the head, in preorder.
    fn subtree_structure(&self, members: &[NodeId], hier: usize) -> Vec<(NodeId, NodeId)> {
        members
            .iter()
            .skip(1)
            .map(|&m| {
                let parent = match self.forest.parent(m, hier) {
                    Some(ParentLink::Node(p)) => p,
                    _ => members[0],
                };
                (m, parent)
            })
            .collect()
    }

    fn manual_ref(&self, hier: usize) -> Option<&ManualOrder> {
        match self.ordering.get(&hier) {
            Some(fsheet_forest::OrderingMode::Manual(m)) => Some(m),
            _ => None,
        }
    }

    /// Ask before a structural rebuild while any hierarchy is manually
    /// ordered. Quiet (bulk/import) paths never prompt and proceed.
    fn confirm_rebuild(&mut self, opts: EditOptions) -> EditResult<()> {
        let any_manual = self.ordering.values().any(fsheet_forest::OrderingMode::is_manual);
        if any_manual
            && !opts.quiet
            && !self.confirm.confirm(
                "This edit rebuilds the tree and may reorder manually ordered rows. Continue?",
            )
        {
            return Err(EditError::EditDeclined);
        }
        Ok(())
    }

    /// Rebuild after a raw grid edit, then reconcile manual lists with
    /// the rebuilt graph (surviving entries keep their positions, new
    /// ones append).
    fn rebuild_after_grid_edit(&mut self) {
        let mut scratch = fsheet_core::WarningSink::new();
        self.forest =
            fsheet_forest::build_forest(&mut self.table, &self.state, &mut scratch);
        for w in scratch.drain() {
            self.warnings.push(w);
        }
        for h in self.state.hier_cols().to_vec() {
            let forest = &self.forest;
            if let Some(fsheet_forest::OrderingMode::Manual(manual)) = self.ordering.get_mut(&h)
            {
                manual.reconcile(forest, h);
            }
        }
        self.renormalize_all();
    }

    pub(crate) fn full_table_payload(&self) -> UndoPayload {
        UndoPayload::FullTable {
            width: self.table.column_count(),
            headers: self.state.headers().to_vec(),
            rows: self.table.clone_rows(),
        }
    }

    fn shift_ordering_keys(&mut self, at: usize, delta: isize) {
        let shifted: Vec<(usize, fsheet_forest::OrderingMode)> = self
            .ordering
            .drain()
            .map(|(h, m)| {
                let h = if delta > 0 && h >= at {
                    h + 1
                } else if delta < 0 && h > at {
                    h - 1
                } else {
                    h
                };
                (h, m)
            })
            .collect();
        self.ordering = shifted.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsheet_core::{DocumentState, RowTable};

    // Columns: 0 = ID, 1 = Dept hierarchy, 2 = Project hierarchy,
    // 3 = Notes.
    fn doc() -> Document {
        let rows = vec![
            vec!["Root".into(), String::new(), String::new(), String::new()],
            vec!["Mid".into(), "Root".into(), String::new(), String::new()],
            vec!["Leaf".into(), "Mid".into(), "PRoot".into(), String::new()],
            vec!["PRoot".into(), String::new(), String::new(), String::new()],
        ];
        let state = DocumentState::new(
            vec!["ID".into(), "Dept".into(), "Project".into(), "Notes".into()],
            0,
            vec![1, 2],
        );
        Document::new(RowTable::from_rows(rows), state)
    }

    fn key_of(d: &Document, id: &str) -> fsheet_forest::NodeId {
        d.forest().lookup(id).unwrap()
    }

    #[test]
    fn add_new_node_appends_a_row() {
        let mut d = doc();
        let rows = d.table().row_count();
        d.add("New", "Root", EditOptions::default()).unwrap();
        assert_eq!(d.table().row_count(), rows + 1);
        let node = key_of(&d, "new");
        assert_eq!(
            d.forest().parent(node, 1),
            Some(ParentLink::Node(key_of(&d, "root")))
        );
        assert_eq!(d.history().len(), 1);
        assert_eq!(d.pending_changes(), 1);
    }

    #[test]
    fn add_existing_node_reuses_its_row() {
        let mut d = doc();
        let rows = d.table().row_count();
        // Root participates in Dept but not Project.
        d.add_in("Root", "PRoot", 2, EditOptions::default()).unwrap();
        assert_eq!(d.table().row_count(), rows);
        let root = key_of(&d, "root");
        assert_eq!(
            d.forest().parent(root, 2),
            Some(ParentLink::Node(key_of(&d, "proot")))
        );
        assert_eq!(d.table().cell(0, 2), "PRoot");
    }

    #[test]
    fn add_rejects_duplicates_and_self_parents() {
        let mut d = doc();
        assert!(matches!(
            d.add("Mid", "Root", EditOptions::default()),
            Err(EditError::AlreadyEnrolled { .. })
        ));
        assert!(matches!(
            d.add("X", "x", EditOptions::default()),
            Err(EditError::SelfReference)
        ));
        assert!(matches!(
            d.add("  ", "Root", EditOptions::default()),
            Err(EditError::EmptyId)
        ));
        assert!(d.history().is_empty());
    }

    #[test]
    fn rename_propagates_to_parent_cells() {
        let mut d = doc();
        d.rename("Mid", "Middle", EditOptions::default()).unwrap();
        assert!(d.forest().lookup("mid").is_none());
        assert!(d.forest().lookup("middle").is_some());
        // Leaf's Dept parent cell follows the new spelling.
        assert_eq!(d.table().cell(2, 1), "Middle");
    }

    #[test]
    fn rename_collision_leaves_document_untouched() {
        let mut d = doc();
        let before = d.table().clone();
        assert!(matches!(
            d.rename("Mid", "Leaf", EditOptions::default()),
            Err(EditError::NameCollision(_))
        ));
        assert_eq!(d.table(), &before);
        assert!(d.history().is_empty());
        assert_eq!(d.pending_changes(), 0);
    }

    #[test]
    fn rename_case_only_change_is_allowed() {
        let mut d = doc();
        d.rename("Mid", "MID", EditOptions::default()).unwrap();
        assert_eq!(d.forest().node(key_of(&d, "mid")).display_name(), "MID");
    }

    #[test]
    fn delete_reparents_children_to_grandparent() {
        let mut d = doc();
        d.delete("Mid", 1, DeleteMode::ReparentChildren, EditOptions::default())
            .unwrap();
        assert!(d.forest().lookup("mid").is_none());
        let leaf = key_of(&d, "leaf");
        assert_eq!(
            d.forest().parent(leaf, 1),
            Some(ParentLink::Node(key_of(&d, "root")))
        );
        assert_eq!(d.table().cell(d.find_row("leaf").unwrap(), 1), "Root");
    }

    #[test]
    fn delete_orphan_promotes_children_to_top() {
        let mut d = doc();
        d.delete("Mid", 1, DeleteMode::OrphanChildren, EditOptions::default())
            .unwrap();
        let leaf = key_of(&d, "leaf");
        assert_eq!(d.forest().parent(leaf, 1), Some(ParentLink::Top));
        assert_eq!(d.table().cell(d.find_row("leaf").unwrap(), 1), "");
    }

    #[test]
    fn delete_subtree_removes_rows_only_on_last_hierarchy() {
        let mut d = doc();
        d.delete("Root", 1, DeleteMode::Subtree, EditOptions::default())
            .unwrap();
        // Root and Mid lived only in Dept; Leaf survives via Project.
        assert!(d.forest().lookup("root").is_none());
        assert!(d.forest().lookup("mid").is_none());
        let leaf = key_of(&d, "leaf");
        assert!(!d.forest().node(leaf).participates(1));
        assert!(d.forest().node(leaf).participates(2));
        let row = d.find_row("leaf").unwrap();
        assert_eq!(d.table().cell(row, 1), "");
        assert_eq!(d.table().cell(row, 2), "PRoot");
    }

    #[test]
    fn delete_everywhere_drops_the_row() {
        let mut d = doc();
        d.add_in("Mid", "PRoot", 2, EditOptions::default()).unwrap();
        d.delete_everywhere("Mid", EditOptions::default()).unwrap();
        assert!(d.forest().lookup("mid").is_none());
        assert!(d.find_row("mid").is_none());
        // Leaf spliced up to Root in Dept.
        assert_eq!(
            d.forest().parent(key_of(&d, "leaf"), 1),
            Some(ParentLink::Node(key_of(&d, "root")))
        );
    }

    #[test]
    fn cut_paste_moves_one_node_and_splices_children() {
        let mut d = doc();
        d.cut_paste("Mid", 1, 1, "", EditOptions::default()).unwrap();
        let mid = key_of(&d, "mid");
        assert_eq!(d.forest().parent(mid, 1), Some(ParentLink::Top));
        // Leaf spliced to Mid's old parent.
        assert_eq!(
            d.forest().parent(key_of(&d, "leaf"), 1),
            Some(ParentLink::Node(key_of(&d, "root")))
        );
        assert_eq!(d.table().cell(d.find_row("mid").unwrap(), 1), "");
    }

    #[test]
    fn cut_paste_all_keeps_the_subtree_together() {
        let mut d = doc();
        d.cut_paste_all("Mid", 1, 2, "PRoot", EditOptions::default())
            .unwrap();
        let mid = key_of(&d, "mid");
        let leaf = key_of(&d, "leaf");
        assert!(!d.forest().node(mid).participates(1));
        assert_eq!(
            d.forest().parent(mid, 2),
            Some(ParentLink::Node(key_of(&d, "proot")))
        );
        assert_eq!(d.forest().parent(leaf, 2), Some(ParentLink::Node(mid)));
        // Leaf kept only one Project parent; its old link was replaced.
        assert!(d.forest().check_back_refs());
    }

    #[test]
    fn cut_paste_all_into_own_subtree_fails() {
        let mut d = doc();
        assert!(matches!(
            d.cut_paste_all("Root", 1, 1, "Leaf", EditOptions::default()),
            Err(EditError::WouldCycle { .. })
        ));
        assert!(d.history().is_empty());
    }

    #[test]
    fn cut_paste_all_cross_rejects_enrolled_members() {
        let mut d = doc();
        // Leaf is in Mid's Dept subtree and already participates in
        // Project.
        assert!(matches!(
            d.cut_paste_all("Mid", 1, 2, "", EditOptions::default()),
            Err(EditError::AlreadyEnrolled { .. })
        ));
    }

    #[test]
    fn copy_paste_duplicates_without_touching_source() {
        let mut d = doc();
        d.copy_paste("Mid", 1, 2, "PRoot", EditOptions::default())
            .unwrap();
        let mid = key_of(&d, "mid");
        assert_eq!(
            d.forest().parent(mid, 1),
            Some(ParentLink::Node(key_of(&d, "root")))
        );
        assert_eq!(
            d.forest().parent(mid, 2),
            Some(ParentLink::Node(key_of(&d, "proot")))
        );
    }

    #[test]
    fn copy_paste_same_hierarchy_always_fails() {
        let mut d = doc();
        assert!(matches!(
            d.copy_paste("Leaf", 1, 1, "Root", EditOptions::default()),
            Err(EditError::AlreadyEnrolled { .. })
        ));
    }

    #[test]
    fn same_parent_move_is_rejected() {
        let mut d = doc();
        assert!(matches!(
            d.cut_paste("Mid", 1, 1, "Root", EditOptions::default()),
            Err(EditError::SameParent)
        ));
    }

    #[test]
    fn cut_paste_children_skips_failures() {
        let mut d = doc();
        d.add("Kid2", "Root", EditOptions::default()).unwrap();
        // Leaf (under Mid, itself under Root) already lives in Project,
        // so moving Root's children there skips Mid's subtree.
        let skipped = d
            .cut_paste_children("Root", 1, 2, "PRoot", EditOptions::default())
            .unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, "Mid");
        let kid2 = key_of(&d, "kid2");
        assert_eq!(
            d.forest().parent(kid2, 2),
            Some(ParentLink::Node(key_of(&d, "proot")))
        );
        assert!(!d.warnings().is_empty());
    }

    #[test]
    fn add_column_shifts_classification() {
        let mut d = doc();
        d.add_column(1, ColumnKind::Detail, "Status", EditOptions::default())
            .unwrap();
        assert_eq!(d.state().hier_cols(), &[2, 3]);
        assert_eq!(d.table().column_count(), 5);
        assert_eq!(d.table().cell(1, 2), "Root");
        // Hierarchy links followed the shift.
        let mid = key_of(&d, "mid");
        assert_eq!(
            d.forest().parent(mid, 2),
            Some(ParentLink::Node(key_of(&d, "root")))
        );
    }

    #[test]
    fn remove_last_hierarchy_is_rejected() {
        let mut d = doc();
        d.remove_column(2, EditOptions::default()).unwrap();
        assert!(matches!(
            d.remove_column(1, EditOptions::default()),
            Err(EditError::BadColumn(1))
        ));
    }

    #[test]
    fn removing_a_hierarchy_reclassifies_strays() {
        let mut d = doc();
        // PRoot only participates in Project; dropping that column
        // strands it.
        d.remove_column(2, EditOptions::default()).unwrap();
        let proot = key_of(&d, "proot");
        assert_eq!(d.forest().parent(proot, 1), Some(ParentLink::Top));
        assert!(!d.warnings().is_empty());
    }

    #[test]
    fn edit_detail_cell_is_plain() {
        let mut d = doc();
        d.edit_cell(0, 3, "note", EditOptions::default()).unwrap();
        assert_eq!(d.table().cell(0, 3), "note");
        assert_eq!(d.history().len(), 1);
    }

    #[test]
    fn edit_id_cell_rebuilds_and_propagates() {
        let mut d = doc();
        let row = d.find_row("mid").unwrap();
        d.edit_cell(row, 0, "Center", EditOptions::default()).unwrap();
        assert!(d.forest().lookup("mid").is_none());
        let center = key_of(&d, "center");
        assert_eq!(
            d.forest().parent(key_of(&d, "leaf"), 1),
            Some(ParentLink::Node(center))
        );
    }

    #[test]
    fn edit_parent_cell_rejects_cycles() {
        let mut d = doc();
        let row = d.find_row("root").unwrap();
        assert!(matches!(
            d.edit_cell(row, 1, "Leaf", EditOptions::default()),
            Err(EditError::WouldCycle { .. })
        ));
    }

    #[test]
    fn edit_parent_cell_relinks() {
        let mut d = doc();
        let row = d.find_row("leaf").unwrap();
        d.edit_cell(row, 1, "Root", EditOptions::default()).unwrap();
        assert_eq!(
            d.forest().parent(key_of(&d, "leaf"), 1),
            Some(ParentLink::Node(key_of(&d, "root")))
        );
        assert!(d.forest().check_back_refs());
    }

    #[test]
    fn reorder_requires_manual_mode() {
        let mut d = doc();
        assert!(matches!(
            d.reorder(1, None, "root", 0, EditOptions::default()),
            Err(EditError::NotManual(1))
        ));
        d.set_manual_order(1, true, EditOptions::default()).unwrap();
        d.add("Zed", "", EditOptions::default()).unwrap();
        d.reorder(1, None, "zed", 0, EditOptions::default()).unwrap();
        let roots = d.ordered_roots(1);
        assert_eq!(d.forest().node(roots[0]).key(), "zed");
    }

    #[test]
    fn set_manual_order_is_idempotent() {
        let mut d = doc();
        d.set_manual_order(1, false, EditOptions::default()).unwrap();
        assert!(d.history().is_empty());
        d.set_manual_order(1, true, EditOptions::default()).unwrap();
        assert_eq!(d.history().len(), 1);
        assert!(d.ordering(1).is_manual());
    }

    #[test]
    fn manual_order_survives_adds_at_the_end() {
        let mut d = doc();
        d.set_manual_order(1, true, EditOptions::default()).unwrap();
        d.add("Aardvark", "", EditOptions::default()).unwrap();
        let roots = d.ordered_roots(1);
        // Auto-sort would put Aardvark first; manual appends.
        assert_eq!(d.forest().node(*roots.last().unwrap()).key(), "aardvark");
    }
}
