//! Core traits for the Model/View architecture.
//!
//! This module defines the traits that models implement so that persistent
//! indexes can follow their items through structural changes.

use horizon_anchor_core::Signal;

use super::base::ModelBase;
use super::index::ModelIndex;
use super::persistent::PersistentModelIndex;

/// The axis along which a structural change happens.
///
/// `Vertical` changes affect rows, `Horizontal` changes affect columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Horizontal axis (columns).
    Horizontal,
    /// Vertical axis (rows).
    Vertical,
}

impl Orientation {
    /// Returns the coordinate of `index` along this axis.
    #[inline]
    pub fn position(self, index: &ModelIndex) -> usize {
        match self {
            Self::Vertical => index.row(),
            Self::Horizontal => index.column(),
        }
    }

    /// Returns the number of rows or columns under `parent`.
    pub fn extent<M: IndexResolver + ?Sized>(self, model: &M, parent: &ModelIndex) -> usize {
        match self {
            Self::Vertical => model.row_count(parent),
            Self::Horizontal => model.column_count(parent),
        }
    }

    /// Splits a signed delta along this axis into `(row_delta, column_delta)`.
    #[inline]
    pub(crate) fn delta(self, delta: isize) -> (isize, isize) {
        match self {
            Self::Vertical => (delta, 0),
            Self::Horizontal => (0, delta),
        }
    }
}

/// Structural queries the persistent index machinery needs from a model.
///
/// These methods are called while the model's persistent index registry is
/// borrowed. Implementations must not create, clone or drop persistent
/// indexes of the same model from inside them.
pub trait IndexResolver {
    /// Returns the number of rows under the given parent.
    fn row_count(&self, parent: &ModelIndex) -> usize;

    /// Returns the number of columns for children of the given parent.
    fn column_count(&self, parent: &ModelIndex) -> usize;

    /// Creates a model index for the given row and column under parent.
    ///
    /// Return `ModelIndex::invalid()` if the position is out of bounds.
    fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex;

    /// Returns the parent of the given index.
    ///
    /// Return `ModelIndex::invalid()` for root-level items and invalid
    /// indices. Parent indices conventionally use column 0.
    fn parent(&self, index: &ModelIndex) -> ModelIndex;
}

/// The core trait for item models.
///
/// `ItemModel` couples the structural queries of [`IndexResolver`] with the
/// [`ModelBase`] that owns the model's signals and persistent indexes.
/// Implementations announce every structural change through the begin/end
/// brackets on [`ModelBase`].
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use horizon_anchor::model::{IndexResolver, ItemModel, ModelBase, ModelIndex, ModelResult};
///
/// struct Names {
///     items: RefCell<Vec<String>>,
///     base: ModelBase,
/// }
///
/// impl IndexResolver for Names {
///     fn row_count(&self, parent: &ModelIndex) -> usize {
///         if parent.is_valid() { 0 } else { self.items.borrow().len() }
///     }
///
///     fn column_count(&self, _parent: &ModelIndex) -> usize {
///         1
///     }
///
///     fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex {
///         if parent.is_valid() || row >= self.items.borrow().len() || column > 0 {
///             ModelIndex::invalid()
///         } else {
///             ModelIndex::new(row, column)
///         }
///     }
///
///     fn parent(&self, _index: &ModelIndex) -> ModelIndex {
///         ModelIndex::invalid()
///     }
/// }
///
/// impl ItemModel for Names {
///     fn base(&self) -> &ModelBase {
///         &self.base
///     }
/// }
///
/// impl Names {
///     fn push_front(&self, name: &str) -> ModelResult<()> {
///         let root = ModelIndex::invalid();
///         self.base.begin_insert_rows(self, &root, 0, 0)?;
///         self.items.borrow_mut().insert(0, name.to_string());
///         self.base.end_insert_rows(self)?;
///         Ok(())
///     }
/// }
///
/// let model = Names { items: RefCell::new(vec!["b".into()]), base: ModelBase::new() };
/// let b = model.persistent_index(0, 0, &ModelIndex::invalid());
/// model.push_front("a").unwrap();
/// assert_eq!(b.row(), 1);
/// ```
pub trait ItemModel: IndexResolver {
    /// Returns the embedded model base.
    fn base(&self) -> &ModelBase;

    // -------------------------------------------------------------------------
    // Provided methods
    // -------------------------------------------------------------------------

    /// Returns the signals for this model.
    fn signals(&self) -> &ModelSignals {
        self.base().signals()
    }

    /// Returns `true` if the item at parent has any children.
    fn has_children(&self, parent: &ModelIndex) -> bool {
        self.row_count(parent) > 0 && self.column_count(parent) > 0
    }

    /// Returns `true` if `(row, column)` exists under `parent`.
    fn has_index(&self, row: usize, column: usize, parent: &ModelIndex) -> bool {
        row < self.row_count(parent) && column < self.column_count(parent)
    }

    /// Creates a sibling index at the given row and column.
    fn sibling(&self, index: &ModelIndex, row: usize, column: usize) -> ModelIndex {
        if !index.is_valid() {
            return ModelIndex::invalid();
        }
        self.index(row, column, &self.parent(index))
    }

    /// Returns the depth of this index in the tree hierarchy.
    ///
    /// Root-level items have depth 0. Returns 0 for invalid indices.
    fn depth(&self, index: &ModelIndex) -> usize {
        let mut depth = 0;
        let mut current = self.parent(index);
        while current.is_valid() {
            depth += 1;
            current = self.parent(&current);
        }
        depth
    }

    /// Checks if `index` is a descendant of `ancestor`.
    fn is_descendant_of(&self, index: &ModelIndex, ancestor: &ModelIndex) -> bool {
        if !index.is_valid() || !ancestor.is_valid() {
            return false;
        }
        let mut current = self.parent(index);
        while current.is_valid() {
            if current == *ancestor {
                return true;
            }
            current = self.parent(&current);
        }
        false
    }

    /// Creates a persistent index for the item at `(row, column)` under
    /// `parent`.
    ///
    /// Returns an invalid persistent index if the position does not exist.
    fn persistent_index(&self, row: usize, column: usize, parent: &ModelIndex) -> PersistentModelIndex {
        PersistentModelIndex::new(self, &self.index(row, column, parent))
    }

    /// Returns the positions of all live persistent indexes, in registry
    /// order.
    fn persistent_index_list(&self) -> Vec<ModelIndex> {
        self.base().persistent_index_list()
    }
}

/// Collection of signals emitted by item models.
///
/// Every structural change is announced by an about-to signal before the
/// model's storage changes and a done signal after persistent indexes have
/// been updated. Handlers may perform nested mutations.
pub struct ModelSignals {
    // -------------------------------------------------------------------------
    // Row modification signals
    // -------------------------------------------------------------------------
    /// Emitted just before rows are inserted.
    /// Args: (parent index, first row, last row)
    pub rows_about_to_be_inserted: Signal<(ModelIndex, usize, usize)>,

    /// Emitted after rows have been inserted.
    /// Args: (parent index, first row, last row)
    pub rows_inserted: Signal<(ModelIndex, usize, usize)>,

    /// Emitted just before rows are removed.
    /// Args: (parent index, first row, last row)
    pub rows_about_to_be_removed: Signal<(ModelIndex, usize, usize)>,

    /// Emitted after rows have been removed.
    /// Args: (parent index, first row, last row)
    pub rows_removed: Signal<(ModelIndex, usize, usize)>,

    /// Emitted just before rows are moved.
    /// Args: (source parent, source first, source last, dest parent, dest row)
    pub rows_about_to_be_moved: Signal<(ModelIndex, usize, usize, ModelIndex, usize)>,

    /// Emitted after rows have been moved.
    /// Args: (source parent, source first, source last, dest parent, dest row)
    pub rows_moved: Signal<(ModelIndex, usize, usize, ModelIndex, usize)>,

    // -------------------------------------------------------------------------
    // Column modification signals
    // -------------------------------------------------------------------------
    /// Emitted just before columns are inserted.
    pub columns_about_to_be_inserted: Signal<(ModelIndex, usize, usize)>,

    /// Emitted after columns have been inserted.
    pub columns_inserted: Signal<(ModelIndex, usize, usize)>,

    /// Emitted just before columns are removed.
    pub columns_about_to_be_removed: Signal<(ModelIndex, usize, usize)>,

    /// Emitted after columns have been removed.
    pub columns_removed: Signal<(ModelIndex, usize, usize)>,

    /// Emitted just before columns are moved.
    pub columns_about_to_be_moved: Signal<(ModelIndex, usize, usize, ModelIndex, usize)>,

    /// Emitted after columns have been moved.
    pub columns_moved: Signal<(ModelIndex, usize, usize, ModelIndex, usize)>,

    // -------------------------------------------------------------------------
    // Layout signals
    // -------------------------------------------------------------------------
    /// Emitted before a layout change (e.g., sorting or moving).
    pub layout_about_to_change: Signal<()>,

    /// Emitted after a layout change.
    pub layout_changed: Signal<()>,

    // -------------------------------------------------------------------------
    // Reset signals
    // -------------------------------------------------------------------------
    /// Emitted before the model is reset.
    pub model_about_to_reset: Signal<()>,

    /// Emitted after the model has been reset.
    pub model_reset: Signal<()>,
}

impl Default for ModelSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSignals {
    /// Creates a new set of model signals.
    pub fn new() -> Self {
        Self {
            rows_about_to_be_inserted: Signal::new(),
            rows_inserted: Signal::new(),
            rows_about_to_be_removed: Signal::new(),
            rows_removed: Signal::new(),
            rows_about_to_be_moved: Signal::new(),
            rows_moved: Signal::new(),
            columns_about_to_be_inserted: Signal::new(),
            columns_inserted: Signal::new(),
            columns_about_to_be_removed: Signal::new(),
            columns_removed: Signal::new(),
            columns_about_to_be_moved: Signal::new(),
            columns_moved: Signal::new(),
            layout_about_to_change: Signal::new(),
            layout_changed: Signal::new(),
            model_about_to_reset: Signal::new(),
            model_reset: Signal::new(),
        }
    }

    pub(crate) fn about_to_be_inserted(&self, orientation: Orientation) -> &Signal<(ModelIndex, usize, usize)> {
        match orientation {
            Orientation::Vertical => &self.rows_about_to_be_inserted,
            Orientation::Horizontal => &self.columns_about_to_be_inserted,
        }
    }

    pub(crate) fn inserted(&self, orientation: Orientation) -> &Signal<(ModelIndex, usize, usize)> {
        match orientation {
            Orientation::Vertical => &self.rows_inserted,
            Orientation::Horizontal => &self.columns_inserted,
        }
    }

    pub(crate) fn about_to_be_removed(&self, orientation: Orientation) -> &Signal<(ModelIndex, usize, usize)> {
        match orientation {
            Orientation::Vertical => &self.rows_about_to_be_removed,
            Orientation::Horizontal => &self.columns_about_to_be_removed,
        }
    }

    pub(crate) fn removed(&self, orientation: Orientation) -> &Signal<(ModelIndex, usize, usize)> {
        match orientation {
            Orientation::Vertical => &self.rows_removed,
            Orientation::Horizontal => &self.columns_removed,
        }
    }

    pub(crate) fn about_to_be_moved(
        &self,
        orientation: Orientation,
    ) -> &Signal<(ModelIndex, usize, usize, ModelIndex, usize)> {
        match orientation {
            Orientation::Vertical => &self.rows_about_to_be_moved,
            Orientation::Horizontal => &self.columns_about_to_be_moved,
        }
    }

    pub(crate) fn moved(&self, orientation: Orientation) -> &Signal<(ModelIndex, usize, usize, ModelIndex, usize)> {
        match orientation {
            Orientation::Vertical => &self.rows_moved,
            Orientation::Horizontal => &self.columns_moved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_model_signals_creation() {
        let signals = ModelSignals::new();
        assert_eq!(signals.rows_inserted.connection_count(), 0);
        assert_eq!(signals.columns_moved.connection_count(), 0);
    }

    #[test]
    fn test_orientation_selects_signal() {
        let signals = ModelSignals::new();
        let received = Rc::new(RefCell::new(Vec::new()));

        let recv = received.clone();
        signals.columns_inserted.connect(move |(_, first, last)| {
            recv.borrow_mut().push((*first, *last));
        });

        signals.inserted(Orientation::Vertical).emit((ModelIndex::invalid(), 0, 0));
        signals.inserted(Orientation::Horizontal).emit((ModelIndex::invalid(), 2, 3));

        assert_eq!(*received.borrow(), vec![(2, 3)]);
    }

    #[test]
    fn test_orientation_position() {
        let index = ModelIndex::new(4, 7);
        assert_eq!(Orientation::Vertical.position(&index), 4);
        assert_eq!(Orientation::Horizontal.position(&index), 7);
        assert_eq!(Orientation::Vertical.delta(-2), (-2, 0));
        assert_eq!(Orientation::Horizontal.delta(3), (0, 3));
    }
}
