#![forbid(unsafe_code)]

//! Transactional mutation engine for ForestSheet.
//!
//! [`Document`] binds a [`RowTable`](fsheet_core::RowTable) to the
//! [`Forest`](fsheet_forest::Forest) built from it and keeps both
//! consistent through every edit. Each mutation follows one discipline:
//! validate all preconditions first, push one undo record, then apply
//! table and graph changes together. A precondition failure returns a
//! typed [`EditError`] with the document untouched.
//!
//! Undo is bounded ([`UNDO_CAPACITY`] steps) and forward-only: there is
//! no redo.
//!
//! # Example
//! ```
//! use fsheet_core::{DocumentState, RowTable};
//! use fsheet_engine::{Document, EditOptions};
//!
//! let table = RowTable::from_rows(vec![
//!     vec!["Root".into(), "".into()],
//!     vec!["Leaf".into(), "Root".into()],
//! ]);
//! let state = DocumentState::new(vec!["ID".into(), "Parent".into()], 0, vec![1]);
//! let mut doc = Document::new(table, state);
//!
//! doc.add("Branch", "Root", EditOptions::default()).unwrap();
//! assert_eq!(doc.table().row_count(), 3);
//! assert!(doc.undo());
//! assert_eq!(doc.table().row_count(), 2);
//! ```

pub mod document;
pub mod error;
pub mod ops;
pub mod undo;

#[cfg(feature = "state-persistence")]
pub mod snapshot;

pub use document::Document;
pub use error::{EditError, EditResult};
pub use ops::{DeleteMode, EditOptions, PasteMode, Scope};
pub use undo::{CellDelta, RowRestore, UNDO_CAPACITY, UndoHistory, UndoPayload, UndoRecord};

#[cfg(feature = "state-persistence")]
pub use snapshot::{DocumentSnapshot, SnapshotError};
