//! Typed validation failures.
//!
//! Every mutation validates all of its preconditions before the first
//! write; a violation comes back as one of these values with the document
//! untouched and no undo record retained. The engine never panics for
//! invalid user input.

use core::fmt;

/// Why a mutation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// No node with this ID exists.
    UnknownId(String),
    /// An ID is required but the value was empty after cleaning.
    EmptyId,
    /// The new name collides case-insensitively with a different ID.
    NameCollision(String),
    /// The ID already participates in the target hierarchy.
    AlreadyEnrolled { id: String, hier: usize },
    /// The ID does not participate in the source hierarchy.
    NotEnrolled { id: String, hier: usize },
    /// A node cannot be its own parent.
    SelfReference,
    /// The move would make a node its own ancestor.
    WouldCycle { id: String },
    /// The target parent is already the node's parent.
    SameParent,
    /// The column cannot be used this way (ID column removal, removing
    /// the last hierarchy, or a non-hierarchy index where one is needed).
    BadColumn(usize),
    /// Cell address out of range.
    BadCell { row: usize, col: usize },
    /// The hierarchy is auto-sorted; there is no manual list to reorder.
    NotManual(usize),
    /// The user declined the rebuild confirmation.
    EditDeclined,
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownId(id) => write!(f, "no row with ID {id:?}"),
            Self::EmptyId => write!(f, "an ID cannot be empty"),
            Self::NameCollision(name) => {
                write!(f, "another row is already named {name:?}")
            }
            Self::AlreadyEnrolled { id, hier } => {
                write!(f, "{id:?} is already in hierarchy column {hier}")
            }
            Self::NotEnrolled { id, hier } => {
                write!(f, "{id:?} is not in hierarchy column {hier}")
            }
            Self::SelfReference => write!(f, "a row cannot be its own parent"),
            Self::WouldCycle { id } => {
                write!(f, "moving {id:?} there would make it its own ancestor")
            }
            Self::SameParent => write!(f, "the row is already under that parent"),
            Self::BadColumn(col) => write!(f, "column {col} cannot be used here"),
            Self::BadCell { row, col } => {
                write!(f, "cell ({row}, {col}) is out of range")
            }
            Self::NotManual(hier) => {
                write!(f, "hierarchy column {hier} is sorted automatically")
            }
            Self::EditDeclined => write!(f, "edit cancelled"),
        }
    }
}

impl core::error::Error for EditError {}

/// Result alias for mutation operations.
pub type EditResult<T> = Result<T, EditError>;
