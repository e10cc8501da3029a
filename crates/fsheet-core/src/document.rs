//! Document-wide state threaded through the mutation engine.
//!
//! The original system kept the ID column, hierarchy columns and current
//! hierarchy as ambient instance fields mutated from everywhere. Here they
//! live in one explicit [`DocumentState`] value so engine operations, the
//! tree builder and tests all read the same thing and independent documents
//! never alias.

/// Classification of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// The single ID column.
    Id,
    /// A parent column; each parent column defines one hierarchy.
    Parent,
    /// Free-form data, ignored by the graph.
    Detail,
}

/// Cursor/selection/scroll state captured alongside undo records so undo
/// can restore UI focus. Opaque to the core; the UI layer fills it in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    /// Folded key of the selected node, if any.
    pub selected: Option<String>,
    /// First visible row.
    pub scroll_row: usize,
    /// Grid cursor `(row, column)`.
    pub cursor: (usize, usize),
}

/// Column classification plus view state for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentState {
    headers: Vec<String>,
    id_col: usize,
    hier_cols: Vec<usize>,
    current_hier: usize,
    /// Cursor/view state, owned here so undo capture sees one source.
    pub view: ViewState,
    /// Whitespace-stripping policy applied to IDs and parent values.
    pub strip_whitespace: bool,
}

impl DocumentState {
    /// Create a state for the given headers, ID column and hierarchy
    /// columns. The current hierarchy starts as the first one.
    ///
    /// # Panics
    ///
    /// Panics if `hier_cols` is empty or contains `id_col`; a document
    /// always has at least one hierarchy, and the ID column cannot double
    /// as a parent column. These are construction-time programmer errors.
    #[must_use]
    pub fn new(headers: Vec<String>, id_col: usize, hier_cols: Vec<usize>) -> Self {
        assert!(!hier_cols.is_empty(), "a document needs at least one hierarchy");
        assert!(
            !hier_cols.contains(&id_col),
            "the ID column cannot be a parent column"
        );
        let current = hier_cols[0];
        Self {
            headers,
            id_col,
            hier_cols,
            current_hier: current,
            view: ViewState::default(),
            strip_whitespace: true,
        }
    }

    /// Column headers, one per table column.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Replace all headers (full-table undo restoration).
    pub fn set_headers(&mut self, headers: Vec<String>) {
        self.headers = headers;
    }

    /// Header for one column, or `""` when out of range.
    #[must_use]
    pub fn header(&self, col: usize) -> &str {
        self.headers.get(col).map_or("", String::as_str)
    }

    /// The ID column index.
    #[must_use]
    pub fn id_col(&self) -> usize {
        self.id_col
    }

    /// All hierarchy (parent) column indices, in table order.
    #[must_use]
    pub fn hier_cols(&self) -> &[usize] {
        &self.hier_cols
    }

    /// The first hierarchy, used as the fallback attachment point for
    /// nodes left without any participation.
    #[must_use]
    pub fn first_hier(&self) -> usize {
        self.hier_cols[0]
    }

    /// The hierarchy the UI is currently showing.
    #[must_use]
    pub fn current_hier(&self) -> usize {
        self.current_hier
    }

    /// Switch the current hierarchy. Ignored if `col` is not a hierarchy
    /// column.
    pub fn set_current_hier(&mut self, col: usize) {
        if self.hier_cols.contains(&col) {
            self.current_hier = col;
        }
    }

    /// Classify a column.
    #[must_use]
    pub fn column_kind(&self, col: usize) -> ColumnKind {
        if col == self.id_col {
            ColumnKind::Id
        } else if self.hier_cols.contains(&col) {
            ColumnKind::Parent
        } else {
            ColumnKind::Detail
        }
    }

    #[must_use]
    pub fn is_hier(&self, col: usize) -> bool {
        self.hier_cols.contains(&col)
    }

    /// Apply the whitespace policy to a raw cell value.
    #[must_use]
    pub fn clean<'a>(&self, raw: &'a str) -> &'a str {
        if self.strip_whitespace { raw.trim() } else { raw }
    }

    /// Record a column inserted at `at`: shifts the ID and hierarchy
    /// indices right of the insertion point and registers the new column.
    pub fn column_inserted(&mut self, at: usize, header: String, kind: ColumnKind) {
        if self.id_col >= at {
            self.id_col += 1;
        }
        for h in &mut self.hier_cols {
            if *h >= at {
                *h += 1;
            }
        }
        if self.current_hier >= at {
            self.current_hier += 1;
        }
        let at = at.min(self.headers.len());
        self.headers.insert(at, header);
        if kind == ColumnKind::Parent {
            self.hier_cols.push(at);
            self.hier_cols.sort_unstable();
        }
    }

    /// Record a column removed at `at`: drops it from the classification
    /// and shifts the remaining indices left. The ID column and the last
    /// hierarchy column must not be removed (engine preconditions).
    pub fn column_removed(&mut self, at: usize) {
        self.hier_cols.retain(|&h| h != at);
        if at < self.headers.len() {
            self.headers.remove(at);
        }
        if self.id_col > at {
            self.id_col -= 1;
        }
        for h in &mut self.hier_cols {
            if *h > at {
                *h -= 1;
            }
        }
        if self.current_hier == at {
            self.current_hier = self.first_hier();
        } else if self.current_hier > at {
            self.current_hier -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DocumentState {
        DocumentState::new(
            vec!["ID".into(), "Dept".into(), "Project".into(), "Notes".into()],
            0,
            vec![1, 2],
        )
    }

    #[test]
    fn classification() {
        let s = state();
        assert_eq!(s.column_kind(0), ColumnKind::Id);
        assert_eq!(s.column_kind(1), ColumnKind::Parent);
        assert_eq!(s.column_kind(2), ColumnKind::Parent);
        assert_eq!(s.column_kind(3), ColumnKind::Detail);
        assert_eq!(s.current_hier(), 1);
        assert_eq!(s.first_hier(), 1);
    }

    #[test]
    fn set_current_hier_rejects_non_hierarchy() {
        let mut s = state();
        s.set_current_hier(3);
        assert_eq!(s.current_hier(), 1);
        s.set_current_hier(2);
        assert_eq!(s.current_hier(), 2);
    }

    #[test]
    fn column_inserted_shifts_indices() {
        let mut s = state();
        s.column_inserted(0, "New".into(), ColumnKind::Detail);
        assert_eq!(s.id_col(), 1);
        assert_eq!(s.hier_cols(), &[2, 3]);
        assert_eq!(s.current_hier(), 2);
        assert_eq!(s.header(0), "New");
    }

    #[test]
    fn hierarchy_column_inserted_is_registered() {
        let mut s = state();
        s.column_inserted(3, "Team".into(), ColumnKind::Parent);
        assert_eq!(s.hier_cols(), &[1, 2, 3]);
        assert_eq!(s.column_kind(3), ColumnKind::Parent);
        assert_eq!(s.column_kind(4), ColumnKind::Detail);
    }

    #[test]
    fn column_removed_shifts_and_refocuses() {
        let mut s = state();
        s.set_current_hier(2);
        s.column_removed(2);
        assert_eq!(s.hier_cols(), &[1]);
        assert_eq!(s.current_hier(), 1);
        assert_eq!(s.headers(), &["ID".to_owned(), "Dept".to_owned(), "Notes".to_owned()]);
    }

    #[test]
    fn clean_respects_policy() {
        let mut s = state();
        assert_eq!(s.clean("  a  "), "a");
        s.strip_whitespace = false;
        assert_eq!(s.clean("  a  "), "  a  ");
    }

    #[test]
    #[should_panic(expected = "at least one hierarchy")]
    fn no_hierarchies_is_a_bug() {
        let _ = DocumentState::new(vec!["ID".into()], 0, vec![]);
    }
}
