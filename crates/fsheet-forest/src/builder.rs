//! Tree builder: flat row table in, populated node graph out.
//!
//! The builder is deliberately tolerant. Rows with an empty ID are
//! dropped, duplicate IDs are merged into the first occurrence, a parent
//! value with no row of its own gets a placeholder row appended, a
//! self-parent is cleared, and a parent link that would close a cycle is
//! ignored. Every heal appends one human-readable line to the warning
//! sink; none of them is fatal.
//!
//! The guarantee on exit: every parent value still present in the table
//! resolves to a node, no parent reference dangles, no hierarchy contains
//! a cycle, and the table has exactly one row per node.

use crate::forest::{Forest, ParentLink};
use fsheet_core::{DocumentState, RowTable, WarningSink, fold_key};
use tracing::debug;

/// Build a [`Forest`] from `table`, appending placeholder rows for
/// implied IDs and pruning rows that cannot back a node.
pub fn build_forest(
    table: &mut RowTable,
    state: &DocumentState,
    sink: &mut WarningSink,
) -> Forest {
    let mut forest = Forest::new();
    check_headers(state, sink);
    register_rows(table, state, &mut forest, sink);
    link_rows(table, state, &mut forest, sink);
    forest.associate(state.hier_cols(), state.first_hier());
    debug!(
        target: "fsheet",
        nodes = forest.len(),
        rows = table.row_count(),
        "forest rebuilt"
    );
    forest
}

fn check_headers(state: &DocumentState, sink: &mut WarningSink) {
    if state.header(state.id_col()).trim().is_empty() {
        sink.push(format!("ID column {} has no header", state.id_col()));
    }
    for &h in state.hier_cols() {
        if state.header(h).trim().is_empty() {
            sink.push(format!("hierarchy column {h} has no header"));
        }
    }
}

/// First pass: one node per unique ID. Rows with an empty ID are removed;
/// duplicate rows are merged into the first occurrence (non-empty parent
/// cells win) and removed.
fn register_rows(
    table: &mut RowTable,
    state: &DocumentState,
    forest: &mut Forest,
    sink: &mut WarningSink,
) {
    let id_col = state.id_col();
    let mut seen_row: Vec<(String, usize)> = Vec::new();
    let mut row = 0;
    while row < table.row_count() {
        let id = state.clean(table.cell(row, id_col)).to_owned();
        if id.is_empty() {
            sink.push(format!("row {}: empty ID, row skipped", row + 1));
            table.remove_row(row);
            continue;
        }
        let key = fold_key(&id);
        if let Some((_, first)) = seen_row.iter().find(|(k, _)| *k == key) {
            let first = *first;
            sink.push(format!(
                "row {}: duplicate ID {id:?}, merged into row {}",
                row + 1,
                first + 1
            ));
            for &h in state.hier_cols() {
                let dup = state.clean(table.cell(row, h)).to_owned();
                if !dup.is_empty() && state.clean(table.cell(first, h)).is_empty() {
                    table.set_cell(first, h, dup);
                }
            }
            table.remove_row(row);
            continue;
        }
        forest.intern(&id);
        seen_row.push((key, row));
        row += 1;
    }
}

/// Second pass: resolve every parent cell to a node, creating placeholder
/// rows where needed, and wire up the links.
fn link_rows(
    table: &mut RowTable,
    state: &DocumentState,
    forest: &mut Forest,
    sink: &mut WarningSink,
) {
    let id_col = state.id_col();
    let mut row = 0;
    // Placeholder rows appended mid-loop are visited too; their parent
    // cells are empty, so they only ever register, never link.
    while row < table.row_count() {
        let id = state.clean(table.cell(row, id_col)).to_owned();
        let node = forest.intern(&id);
        for &h in state.hier_cols() {
            let value = state.clean(table.cell(row, h)).to_owned();
            if value.is_empty() {
                continue;
            }
            if fold_key(&value) == fold_key(&id) {
                sink.push(format!(
                    "{id:?} lists itself as its parent; the link was cleared"
                ));
                table.set_cell(row, h, "");
                continue;
            }
            let parent = match forest.lookup(&value) {
                Some(p) => p,
                None => {
                    let p = forest.intern(&value);
                    let mut cells = vec![String::new(); table.column_count()];
                    cells[id_col] = value.clone();
                    table.push_row(cells);
                    sink.push(format!(
                        "parent {value:?} has no row of its own; one was added"
                    ));
                    p
                }
            };
            if forest.is_descendant(parent, node, h) {
                sink.push(format!(
                    "{id:?} cannot have descendant {value:?} as its parent; the link was ignored"
                ));
                table.set_cell(row, h, "");
                continue;
            }
            forest.attach(node, h, ParentLink::Node(parent));
        }
        row += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DocumentState {
        DocumentState::new(
            vec!["ID".into(), "Dept".into(), "Project".into()],
            0,
            vec![1, 2],
        )
    }

    fn table(rows: &[[&str; 3]]) -> RowTable {
        let mut t = RowTable::new(3);
        for row in rows {
            t.push_row(row.iter().map(|s| (*s).to_owned()).collect());
        }
        t
    }

    #[test]
    fn builds_two_hierarchies_over_one_row_set() {
        let mut t = table(&[
            ["Eng", "", ""],
            ["Alice", "Eng", "Apollo"],
            ["Apollo", "", ""],
        ]);
        let mut sink = WarningSink::new();
        let f = build_forest(&mut t, &state(), &mut sink);
        assert!(sink.is_empty());
        let eng = f.lookup("eng").unwrap();
        let alice = f.lookup("alice").unwrap();
        let apollo = f.lookup("apollo").unwrap();
        assert_eq!(f.parent(alice, 1), Some(ParentLink::Node(eng)));
        assert_eq!(f.parent(alice, 2), Some(ParentLink::Node(apollo)));
        assert_eq!(f.parent(eng, 1), Some(ParentLink::Top));
        assert!(f.check_back_refs());
    }

    #[test]
    fn empty_id_row_is_dropped_with_warning() {
        let mut t = table(&[["", "Eng", ""], ["Eng", "", ""]]);
        let mut sink = WarningSink::new();
        let f = build_forest(&mut t, &state(), &mut sink);
        assert_eq!(t.row_count(), 1);
        assert_eq!(f.len(), 1);
        assert!(sink.iter().any(|w| w.contains("empty ID")));
    }

    #[test]
    fn missing_parent_gets_placeholder_row() {
        let mut t = table(&[["Alice", "Eng", ""]]);
        let mut sink = WarningSink::new();
        let f = build_forest(&mut t, &state(), &mut sink);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.cell(1, 0), "Eng");
        let eng = f.lookup("eng").unwrap();
        assert_eq!(f.parent(eng, 1), Some(ParentLink::Top));
        assert!(sink.iter().any(|w| w.contains("no row of its own")));
    }

    #[test]
    fn self_parent_is_cleared() {
        let mut t = table(&[["Eng", "ENG", ""]]);
        let mut sink = WarningSink::new();
        let f = build_forest(&mut t, &state(), &mut sink);
        assert_eq!(t.cell(0, 1), "");
        let eng = f.lookup("eng").unwrap();
        // Cleared link, no other participation: forced root of hierarchy 1.
        assert_eq!(f.parent(eng, 1), Some(ParentLink::Top));
        assert!(sink.iter().any(|w| w.contains("itself")));
    }

    #[test]
    fn duplicate_rows_merge_into_first() {
        let mut t = table(&[
            ["Alice", "Eng", ""],
            ["alice", "", "Apollo"],
            ["Eng", "", ""],
            ["Apollo", "", ""],
        ]);
        let mut sink = WarningSink::new();
        let f = build_forest(&mut t, &state(), &mut sink);
        assert_eq!(t.row_count(), 3);
        let alice = f.lookup("alice").unwrap();
        assert!(f.node(alice).participates(1));
        assert!(f.node(alice).participates(2));
        assert!(sink.iter().any(|w| w.contains("duplicate ID")));
    }

    #[test]
    fn table_cycle_is_broken() {
        let mut t = table(&[["A", "B", ""], ["B", "A", ""]]);
        let mut sink = WarningSink::new();
        let f = build_forest(&mut t, &state(), &mut sink);
        let a = f.lookup("a").unwrap();
        let b = f.lookup("b").unwrap();
        assert!(!f.is_descendant(a, b, 1) || !f.is_descendant(b, a, 1));
        assert!(f.check_back_refs());
        assert!(sink.iter().any(|w| w.contains("descendant")));
    }

    #[test]
    fn disconnected_node_becomes_root_of_first_hierarchy() {
        let mut t = table(&[["Loner", "", ""]]);
        let mut sink = WarningSink::new();
        let f = build_forest(&mut t, &state(), &mut sink);
        let loner = f.lookup("loner").unwrap();
        assert_eq!(f.parent(loner, 1), Some(ParentLink::Top));
        assert_eq!(f.parent(loner, 2), None);
    }

    #[test]
    fn blank_header_is_reported() {
        let mut t = table(&[["A", "", ""]]);
        let mut sink = WarningSink::new();
        let s = DocumentState::new(vec!["ID".into(), String::new(), "P".into()], 0, vec![1, 2]);
        let _ = build_forest(&mut t, &s, &mut sink);
        assert!(sink.iter().any(|w| w.contains("no header")));
    }

    #[test]
    fn row_count_matches_node_count() {
        let mut t = table(&[
            ["Alice", "Eng", "Apollo"],
            ["Bob", "Eng", ""],
            ["", "x", ""],
        ]);
        let mut sink = WarningSink::new();
        let f = build_forest(&mut t, &state(), &mut sink);
        assert_eq!(t.row_count(), f.len());
    }
}
