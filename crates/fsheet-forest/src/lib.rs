#![forbid(unsafe_code)]

//! Multi-hierarchy node graph for ForestSheet.
//!
//! One document holds one row set and several independent parent/child
//! hierarchies over it: the same IDs organized by "Department" in one
//! hierarchy and by "Project" in another. This crate provides:
//!
//! - [`Forest`] - the node graph: an arena of nodes keyed by [`NodeId`]
//!   handles, one node per case-folded ID, with per-hierarchy parent links
//!   and ordered child lists
//! - [`builder`] - converts a flat [`RowTable`](fsheet_core::RowTable)
//!   into a populated [`Forest`], self-healing structural problems
//! - [`order`] - the ordering policy: natural sort with a
//!   branch-before-leaf tie-break, or explicit manual order lists
//!
//! All graph edges are arena handles, never owning pointers; the arena
//! alone owns node storage, so the parent/child back-references of the
//! original design carry no lifetime problems here.
//!
//! # Example
//! ```
//! use fsheet_forest::{Forest, ParentLink};
//!
//! let mut forest = Forest::new();
//! let root = forest.intern("Root");
//! let leaf = forest.intern("Leaf");
//! forest.attach(root, 1, ParentLink::Top);
//! forest.attach(leaf, 1, ParentLink::Node(root));
//!
//! assert_eq!(forest.children(root, 1), &[leaf]);
//! assert_eq!(forest.parent(leaf, 1), Some(ParentLink::Node(root)));
//! ```

pub mod builder;
pub mod forest;
pub mod order;

pub use builder::build_forest;
pub use forest::{Forest, Node, NodeId, ParentLink};
pub use order::{ManualOrder, OrderingMode};
