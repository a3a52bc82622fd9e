//! Error and report types for model mutations.

use std::fmt;

use thiserror::Error;

use super::index::ModelIndex;
use super::traits::Orientation;

/// The kind of a structural mutation bracketed by begin/end calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Rows or columns are being inserted.
    Insert(Orientation),
    /// Rows or columns are being removed.
    Remove(Orientation),
    /// Rows or columns are being moved.
    Move(Orientation),
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (verb, orientation) = match self {
            Self::Insert(o) => ("insert", o),
            Self::Remove(o) => ("remove", o),
            Self::Move(o) => ("move", o),
        };
        let noun = match orientation {
            Orientation::Vertical => "rows",
            Orientation::Horizontal => "columns",
        };
        write!(f, "{verb}_{noun}")
    }
}

/// Errors raised when a model violates the mutation protocol.
///
/// These indicate a defect in the calling model implementation. The
/// operation is aborted and the persistent index registry is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// `first` is greater than `last`.
    #[error("invalid range for {kind}: first ({first}) is greater than last ({last})")]
    InvalidRange {
        kind: ChangeKind,
        first: usize,
        last: usize,
    },

    /// An `end_*` call had no open change to close.
    #[error("end_{kind} called without a matching begin_{kind}")]
    UnbalancedEnd { kind: ChangeKind },

    /// An `end_*` call does not match the innermost open change.
    #[error("end_{kind} called while begin_{open} is the innermost open change")]
    MismatchedEnd { kind: ChangeKind, open: ChangeKind },

    /// The move would place the range inside itself or into its own subtree.
    #[error("{kind} rejected: destination {destination} lies inside the moved range {first}..={last}")]
    MoveNotAllowed {
        kind: ChangeKind,
        first: usize,
        last: usize,
        destination: usize,
    },

    /// The parent index does not identify an item of this model.
    #[error("parent index {0:?} does not belong to this model")]
    ParentNotFound(ModelIndex),

    /// No node with this ID exists.
    #[error("node {0} does not exist")]
    NodeNotFound(u64),

    /// A row or column position is out of range.
    #[error("position {position} is out of range (count {count})")]
    OutOfRange { position: usize, count: usize },

    /// `change_persistent_index_list` was given lists of different lengths.
    #[error("cannot re-point {from} persistent indexes to {to} targets")]
    LengthMismatch { from: usize, to: usize },
}

/// A specialized Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// A persistent index that could not be relocated after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnresolvedIndex {
    /// The position the record held before the mutation.
    pub previous: ModelIndex,
    /// The `(row, column)` that was requested from the model, or `None` if the
    /// shift produced a negative coordinate.
    pub requested: Option<(usize, usize)>,
    /// The parent under which the position was requested.
    pub parent: ModelIndex,
}

/// Outcome of an `end_*` call.
///
/// A non-empty report means the model's `index()` implementation disagreed
/// with the announced mutation. Affected persistent indexes were orphaned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationReport {
    /// Number of records moved to a new position.
    pub relocated: usize,
    /// Number of records invalidated because their item was removed.
    pub invalidated: usize,
    /// Records whose new position could not be resolved.
    pub unresolved: Vec<UnresolvedIndex>,
}

impl MutationReport {
    /// Returns `true` if every affected record was resolved.
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub(crate) fn merge(&mut self, other: MutationReport) {
        self.relocated += other.relocated;
        self.invalidated += other.invalidated;
        self.unresolved.extend(other.unresolved);
    }
}
