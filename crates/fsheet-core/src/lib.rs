#![forbid(unsafe_code)]

//! Foundation types for ForestSheet.
//!
//! This crate provides the flat data layer the graph and engine crates are
//! built on:
//! - [`RowTable`] - the ordered, fixed-width record store (one row per ID)
//! - [`DocumentState`] - column classification and cursor/view state
//! - [`WarningSink`] - append-only list of human-readable warnings
//! - [`Notifier`] / [`ConfirmEdit`] - boundary traits toward the UI layer
//!
//! # Example
//! ```
//! use fsheet_core::table::RowTable;
//! use fsheet_core::document::{ColumnKind, DocumentState};
//!
//! let mut table = RowTable::new(3);
//! table.push_row(vec!["alpha".into(), "".into(), "note".into()]);
//! assert_eq!(table.cell(0, 0), "alpha");
//!
//! let state = DocumentState::new(
//!     vec!["ID".into(), "Parent".into(), "Notes".into()],
//!     0,
//!     vec![1],
//! );
//! assert_eq!(state.column_kind(1), ColumnKind::Parent);
//! assert_eq!(state.column_kind(2), ColumnKind::Detail);
//! ```

pub mod document;
pub mod notify;
pub mod table;
pub mod warn;

pub use document::{ColumnKind, DocumentState, ViewState};
pub use notify::{ConfirmEdit, Notifier, NullConfirm, NullNotifier};
pub use table::RowTable;
pub use warn::WarningSink;

/// Case-fold an ID or parent value for graph lookups.
///
/// Keys are compared case-insensitively with surrounding whitespace
/// ignored; the human-entered spelling is preserved separately as the
/// display name.
#[must_use]
pub fn fold_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_key_trims_and_lowercases() {
        assert_eq!(fold_key("  Widget A "), "widget a");
        assert_eq!(fold_key("ITEM10"), "item10");
        assert_eq!(fold_key(""), "");
    }
}
