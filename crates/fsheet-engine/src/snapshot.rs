//! Serializable document snapshots (`state-persistence` feature).
//!
//! A [`DocumentSnapshot`] captures everything needed to reopen a document
//! exactly as it was: headers, rows, column classification, the current
//! hierarchy, and any manual order lists. Undo history and warnings are
//! deliberately not persisted; a reopened document starts with a clean
//! history.

use crate::document::Document;
use core::fmt;
use fsheet_core::{DocumentState, RowTable};
use fsheet_forest::{ManualOrder, OrderingMode};
use serde::{Deserialize, Serialize};

/// Why a snapshot could not be restored.
#[derive(Debug)]
pub enum SnapshotError {
    /// The JSON did not parse as a snapshot.
    Parse(serde_json::Error),
    /// The snapshot parsed but its column layout is inconsistent.
    BadLayout(String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "snapshot does not parse: {err}"),
            Self::BadLayout(why) => write!(f, "snapshot layout is inconsistent: {why}"),
        }
    }
}

impl core::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::BadLayout(_) => None,
        }
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err)
    }
}

/// Persisted manual order of one hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualOrderSnapshot {
    pub hier: usize,
    pub top: Vec<String>,
    pub children: Vec<(String, Vec<String>)>,
}

/// The persisted form of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub id_col: usize,
    pub hier_cols: Vec<usize>,
    pub current_hier: usize,
    /// True when every hierarchy is auto-sorted (no manual lists).
    pub auto_sort: bool,
    #[serde(default)]
    pub manual_orders: Vec<ManualOrderSnapshot>,
}

impl DocumentSnapshot {
    /// Capture the current state of a document.
    #[must_use]
    pub fn capture(doc: &Document) -> Self {
        let mut manual_orders = Vec::new();
        for &h in doc.state().hier_cols() {
            if let OrderingMode::Manual(order) = doc.ordering(h) {
                let mut children: Vec<(String, Vec<String>)> = order
                    .child_lists()
                    .map(|(k, v)| (k.to_owned(), v.to_vec()))
                    .collect();
                children.sort_by(|a, b| a.0.cmp(&b.0));
                manual_orders.push(ManualOrderSnapshot {
                    hier: h,
                    top: order.top().to_vec(),
                    children,
                });
            }
        }
        Self {
            headers: doc.state().headers().to_vec(),
            rows: doc.table().clone_rows(),
            id_col: doc.state().id_col(),
            hier_cols: doc.state().hier_cols().to_vec(),
            current_hier: doc.state().current_hier(),
            auto_sort: manual_orders.is_empty(),
            manual_orders,
        }
    }

    /// Rebuild a document from this snapshot. A manual order list that no
    /// longer matches the data degrades that hierarchy to auto-sort with a
    /// warning, the same as everywhere else.
    pub fn restore(self) -> Result<Document, SnapshotError> {
        if self.hier_cols.is_empty() {
            return Err(SnapshotError::BadLayout(
                "no hierarchy columns".to_owned(),
            ));
        }
        if self.hier_cols.contains(&self.id_col) {
            return Err(SnapshotError::BadLayout(
                "the ID column is listed as a hierarchy column".to_owned(),
            ));
        }
        let width = self.headers.len();
        for &col in std::iter::once(&self.id_col).chain(&self.hier_cols) {
            if col >= width {
                return Err(SnapshotError::BadLayout(format!(
                    "column {col} is outside the {width} headers"
                )));
            }
        }
        let mut table = RowTable::new(width);
        for row in self.rows {
            table.push_row(row);
        }
        let mut state = DocumentState::new(self.headers, self.id_col, self.hier_cols);
        state.set_current_hier(self.current_hier);
        let mut doc = Document::new(table, state);
        if !self.auto_sort {
            for saved in self.manual_orders {
                if !doc.state().is_hier(saved.hier) {
                    continue;
                }
                let mut order = ManualOrder::new();
                order.set_top(saved.top);
                for (parent, keys) in saved.children {
                    order.set_child_list(parent, keys);
                }
                doc.ordering.insert(saved.hier, OrderingMode::Manual(order));
                doc.renormalize(saved.hier);
            }
        }
        Ok(doc)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}
