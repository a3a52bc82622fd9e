//! Model index for addressing items in hierarchical models.
//!
//! The `ModelIndex` type is the fundamental way to reference items within
//! an `ItemModel`. It is a small `Copy` value holding a row, a column and an
//! opaque model-defined identity.

use std::cmp::Ordering;
use std::fmt;

/// A position within an `ItemModel` at the moment it was obtained.
///
/// An index is a plain value: a row and column relative to its parent, plus
/// an internal ID the model uses to find the item again. Persistent index
/// records store one of these and rewrite it as the model changes.
///
/// The parent is not stored in the index. It is recomputed on demand through
/// [`IndexResolver::parent`](super::IndexResolver::parent).
///
/// # Index Validity
///
/// Model indices should be used immediately and not stored long-term.
/// After model modifications (insertions, deletions, moves), previously
/// obtained indices may become invalid. Use
/// [`PersistentModelIndex`](super::PersistentModelIndex) to hold a position
/// across modifications.
///
/// # Identity and Ordering
///
/// Two indices are equal when their validity, position and internal ID all
/// match. Indices order invalid first, then by row, column and internal ID.
///
/// # Example
///
/// ```
/// use horizon_anchor::model::ModelIndex;
///
/// let plain = ModelIndex::new(1, 0);
/// let tagged = ModelIndex::with_internal_id(1, 0, 7);
///
/// assert!(!ModelIndex::default().is_valid());
/// assert_eq!(ModelIndex::default(), ModelIndex::invalid());
/// assert_ne!(plain, tagged);
/// assert!(ModelIndex::invalid() < plain);
/// assert!(plain < tagged);
/// assert!(tagged < ModelIndex::new(2, 0));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelIndex {
    /// The row within the parent.
    row: usize,
    /// The column within the parent.
    column: usize,
    /// An internal ID that models can use for their own purposes.
    /// This is typically a node identifier.
    internal_id: u64,
    /// Whether this index is valid.
    valid: bool,
}

impl Default for ModelIndex {
    fn default() -> Self {
        Self::invalid()
    }
}

impl ModelIndex {
    /// Creates an invalid (null) model index.
    ///
    /// An invalid index is used to represent:
    /// - The root of the model (as a parent reference)
    /// - A non-existent or out-of-bounds item
    /// - A persistent index whose item was removed
    ///
    /// All invalid indices compare equal.
    #[inline]
    pub const fn invalid() -> Self {
        Self {
            row: 0,
            column: 0,
            internal_id: 0,
            valid: false,
        }
    }

    /// Creates a new valid model index with an internal ID of zero.
    ///
    /// Suitable for flat models where row and column identify the cell.
    #[inline]
    pub const fn new(row: usize, column: usize) -> Self {
        Self::with_internal_id(row, column, 0)
    }

    /// Creates a new valid model index with a custom internal ID.
    ///
    /// Models can use the internal ID to store an identifier to their internal
    /// data structures for efficient lookups.
    ///
    /// # Arguments
    ///
    /// * `row` - The row within the parent
    /// * `column` - The column within the parent
    /// * `internal_id` - Model-specific identifier
    #[inline]
    pub const fn with_internal_id(row: usize, column: usize, internal_id: u64) -> Self {
        Self {
            row,
            column,
            internal_id,
            valid: true,
        }
    }

    /// Returns `true` if this is a valid index.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns the row of this index within its parent.
    ///
    /// Returns 0 for invalid indices.
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }

    /// Returns the column of this index within its parent.
    ///
    /// Returns 0 for invalid indices.
    #[inline]
    pub fn column(&self) -> usize {
        self.column
    }

    /// Returns the internal ID associated with this index.
    ///
    /// The meaning of this ID is model-specific.
    #[inline]
    pub fn internal_id(&self) -> u64 {
        self.internal_id
    }

    /// Returns the row and column shifted by signed deltas.
    ///
    /// Returns `None` if the index is invalid or either coordinate would
    /// become negative.
    pub(crate) fn offset(&self, row_delta: isize, column_delta: isize) -> Option<(usize, usize)> {
        if !self.valid {
            return None;
        }
        Some((
            self.row.checked_add_signed(row_delta)?,
            self.column.checked_add_signed(column_delta)?,
        ))
    }
}

impl fmt::Debug for ModelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            f.debug_struct("ModelIndex")
                .field("row", &self.row)
                .field("column", &self.column)
                .field("internal_id", &self.internal_id)
                .finish()
        } else {
            write!(f, "ModelIndex(invalid)")
        }
    }
}

impl PartialOrd for ModelIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ModelIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        // Invalid indices sort before valid ones
        match (self.is_valid(), other.is_valid()) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => self
                .row
                .cmp(&other.row)
                .then(self.column.cmp(&other.column))
                .then(self.internal_id.cmp(&other.internal_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_index() {
        let index = ModelIndex::invalid();
        assert!(!index.is_valid());
        assert_eq!(index.row(), 0);
        assert_eq!(index.column(), 0);
        assert_eq!(index, ModelIndex::default());
    }

    #[test]
    fn test_valid_index() {
        let index = ModelIndex::with_internal_id(5, 3, 77);
        assert!(index.is_valid());
        assert_eq!(index.row(), 5);
        assert_eq!(index.column(), 3);
        assert_eq!(index.internal_id(), 77);
        assert_ne!(index, ModelIndex::invalid());
    }

    #[test]
    fn test_equality() {
        assert_eq!(ModelIndex::invalid(), ModelIndex::invalid());
        assert_eq!(
            ModelIndex::with_internal_id(1, 0, 100),
            ModelIndex::with_internal_id(1, 0, 100)
        );
        assert_ne!(
            ModelIndex::with_internal_id(1, 0, 100),
            ModelIndex::with_internal_id(1, 0, 101)
        );
    }

    #[test]
    fn test_ordering() {
        let idx1 = ModelIndex::new(0, 0);
        let idx2 = ModelIndex::new(1, 0);
        let idx3 = ModelIndex::new(0, 1);

        assert!(idx1 < idx2); // Row 0 < Row 1
        assert!(idx1 < idx3); // Same row, Column 0 < Column 1
        assert!(idx3 < idx2); // Row dominates column
        assert!(ModelIndex::invalid() < idx1); // Invalid < Valid
        assert!(ModelIndex::with_internal_id(0, 0, 1) < ModelIndex::with_internal_id(0, 0, 2));
    }

    #[test]
    fn test_offset() {
        let index = ModelIndex::new(4, 2);
        assert_eq!(index.offset(3, 0), Some((7, 2)));
        assert_eq!(index.offset(-4, -2), Some((0, 0)));
        assert_eq!(index.offset(-5, 0), None);
        assert_eq!(ModelIndex::invalid().offset(1, 1), None);
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", ModelIndex::invalid()), "ModelIndex(invalid)");
        let debug = format!("{:?}", ModelIndex::with_internal_id(2, 1, 9));
        assert!(debug.contains("row: 2"));
        assert!(debug.contains("internal_id: 9"));
    }
}
