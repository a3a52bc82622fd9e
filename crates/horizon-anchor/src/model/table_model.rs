//! Two-dimensional table model implementation.
//!
//! `TableModel` is a flat grid of cells. Rows and columns can both be
//! inserted, removed and moved, and persistent indexes follow their cells
//! along either axis.

use std::cell::{Cell, RefCell};

use super::base::ModelBase;
use super::config::PersistenceConfig;
use super::error::{ModelError, ModelResult};
use super::index::ModelIndex;
use super::traits::{IndexResolver, ItemModel};

/// A table model storing a `rows x columns` grid of values.
///
/// New cells are filled with `T::default()`.
///
/// # Example
///
/// ```
/// use horizon_anchor::model::{ItemModel, ModelIndex, TableModel};
///
/// let model: TableModel<i32> = TableModel::new(3, 3);
/// model.set(2, 2, 42).unwrap();
/// let cell = model.persistent_index(2, 2, &ModelIndex::invalid());
///
/// model.remove_rows(0, 1).unwrap();
/// model.insert_columns(0, 2).unwrap();
///
/// assert_eq!((cell.row(), cell.column()), (1, 4));
/// assert_eq!(model.get(cell.row(), cell.column()), Some(42));
/// ```
pub struct TableModel<T> {
    cells: RefCell<Vec<Vec<T>>>,
    columns: Cell<usize>,
    base: ModelBase,
}

impl<T: Clone + Default> TableModel<T> {
    /// Creates a table of the given size filled with default values.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self::with_config(rows, columns, PersistenceConfig::default())
    }

    /// Creates a table with the given persistence configuration.
    pub fn with_config(rows: usize, columns: usize, config: PersistenceConfig) -> Self {
        Self {
            cells: RefCell::new(vec![vec![T::default(); columns]; rows]),
            columns: Cell::new(columns),
            base: ModelBase::with_config(config),
        }
    }

    /// Returns the number of rows.
    pub fn rows(&self) -> usize {
        self.cells.borrow().len()
    }

    /// Returns the number of columns.
    pub fn columns(&self) -> usize {
        self.columns.get()
    }

    /// Returns a copy of the value at `(row, column)`.
    pub fn get(&self, row: usize, column: usize) -> Option<T> {
        self.cells.borrow().get(row)?.get(column).cloned()
    }

    /// Replaces the value at `(row, column)`.
    pub fn set(&self, row: usize, column: usize, value: T) -> ModelResult<()> {
        let mut cells = self.cells.borrow_mut();
        let count = cells.len();
        let Some(cells_row) = cells.get_mut(row) else {
            return Err(ModelError::OutOfRange { position: row, count });
        };
        let columns = cells_row.len();
        let Some(cell) = cells_row.get_mut(column) else {
            return Err(ModelError::OutOfRange {
                position: column,
                count: columns,
            });
        };
        *cell = value;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Rows
    // -------------------------------------------------------------------------

    /// Inserts `count` default rows before `row`.
    pub fn insert_rows(&self, row: usize, count: usize) -> ModelResult<()> {
        check_insert(row, self.rows())?;
        if count == 0 {
            return Ok(());
        }
        let root = ModelIndex::invalid();
        self.base.begin_insert_rows(self, &root, row, row + count - 1)?;
        {
            let columns = self.columns();
            let mut cells = self.cells.borrow_mut();
            cells.splice(row..row, (0..count).map(|_| vec![T::default(); columns]));
        }
        self.base.end_insert_rows(self)?;
        Ok(())
    }

    /// Removes `count` rows starting at `row` and returns them.
    pub fn remove_rows(&self, row: usize, count: usize) -> ModelResult<Vec<Vec<T>>> {
        check_range(row, count, self.rows())?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let root = ModelIndex::invalid();
        self.base.begin_remove_rows(self, &root, row, row + count - 1)?;
        let removed = self.cells.borrow_mut().drain(row..row + count).collect();
        self.base.end_remove_rows(self)?;
        Ok(removed)
    }

    /// Moves `count` rows starting at `src_row` before row `dst_row`,
    /// counted before the move.
    pub fn move_rows(&self, src_row: usize, count: usize, dst_row: usize) -> ModelResult<()> {
        let rows = self.rows();
        check_range(src_row, count, rows)?;
        check_insert(dst_row, rows)?;
        if count == 0 {
            return Ok(());
        }
        let root = ModelIndex::invalid();
        self.base
            .begin_move_rows(self, &root, src_row, src_row + count - 1, &root, dst_row)?;
        move_block(&mut self.cells.borrow_mut(), src_row, count, dst_row);
        self.base.end_move_rows(self)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Columns
    // -------------------------------------------------------------------------

    /// Inserts `count` default columns before `column`.
    pub fn insert_columns(&self, column: usize, count: usize) -> ModelResult<()> {
        check_insert(column, self.columns())?;
        if count == 0 {
            return Ok(());
        }
        let root = ModelIndex::invalid();
        self.base
            .begin_insert_columns(self, &root, column, column + count - 1)?;
        {
            let mut cells = self.cells.borrow_mut();
            for cells_row in cells.iter_mut() {
                cells_row.splice(column..column, (0..count).map(|_| T::default()));
            }
            self.columns.set(self.columns.get() + count);
        }
        self.base.end_insert_columns(self)?;
        Ok(())
    }

    /// Removes `count` columns starting at `column`.
    pub fn remove_columns(&self, column: usize, count: usize) -> ModelResult<()> {
        check_range(column, count, self.columns())?;
        if count == 0 {
            return Ok(());
        }
        let root = ModelIndex::invalid();
        self.base
            .begin_remove_columns(self, &root, column, column + count - 1)?;
        {
            let mut cells = self.cells.borrow_mut();
            for cells_row in cells.iter_mut() {
                cells_row.drain(column..column + count);
            }
            self.columns.set(self.columns.get() - count);
        }
        self.base.end_remove_columns(self)?;
        Ok(())
    }

    /// Moves `count` columns starting at `src_column` before column
    /// `dst_column`, counted before the move.
    pub fn move_columns(&self, src_column: usize, count: usize, dst_column: usize) -> ModelResult<()> {
        let columns = self.columns();
        check_range(src_column, count, columns)?;
        check_insert(dst_column, columns)?;
        if count == 0 {
            return Ok(());
        }
        let root = ModelIndex::invalid();
        self.base.begin_move_columns(
            self,
            &root,
            src_column,
            src_column + count - 1,
            &root,
            dst_column,
        )?;
        {
            let mut cells = self.cells.borrow_mut();
            for cells_row in cells.iter_mut() {
                move_block(cells_row, src_column, count, dst_column);
            }
        }
        self.base.end_move_columns(self)?;
        Ok(())
    }

    /// Replaces the whole grid with a default-filled one of the given size.
    ///
    /// All persistent indexes are invalidated.
    pub fn reset(&self, rows: usize, columns: usize) {
        self.base.begin_reset_model();
        *self.cells.borrow_mut() = vec![vec![T::default(); columns]; rows];
        self.columns.set(columns);
        self.base.end_reset_model();
    }
}

/// Moves `items[src..src + count]` before position `dst`, counted before the
/// move.
fn move_block<V>(items: &mut Vec<V>, src: usize, count: usize, dst: usize) {
    let block: Vec<V> = items.drain(src..src + count).collect();
    let at = if dst > src { dst - count } else { dst };
    items.splice(at..at, block);
}

fn check_insert(position: usize, count: usize) -> ModelResult<()> {
    if position > count {
        return Err(ModelError::OutOfRange { position, count });
    }
    Ok(())
}

fn check_range(first: usize, len: usize, count: usize) -> ModelResult<()> {
    if first + len > count {
        return Err(ModelError::OutOfRange {
            position: first + len,
            count,
        });
    }
    Ok(())
}

impl<T> IndexResolver for TableModel<T> {
    fn row_count(&self, parent: &ModelIndex) -> usize {
        if parent.is_valid() {
            0
        } else {
            self.cells.borrow().len()
        }
    }

    fn column_count(&self, parent: &ModelIndex) -> usize {
        if parent.is_valid() {
            0
        } else {
            self.columns.get()
        }
    }

    fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex {
        if parent.is_valid() || row >= self.row_count(parent) || column >= self.column_count(parent) {
            return ModelIndex::invalid();
        }
        ModelIndex::new(row, column)
    }

    fn parent(&self, _index: &ModelIndex) -> ModelIndex {
        ModelIndex::invalid()
    }
}

impl<T> ItemModel for TableModel<T> {
    fn base(&self) -> &ModelBase {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: ModelIndex = ModelIndex::invalid();

    fn numbered(rows: usize, columns: usize) -> TableModel<usize> {
        let model = TableModel::with_config(rows, columns, PersistenceConfig::lenient());
        for row in 0..rows {
            for column in 0..columns {
                model.set(row, column, row * 10 + column).unwrap();
            }
        }
        model
    }

    #[test]
    fn test_table_model_basic() {
        let model = numbered(2, 3);
        assert_eq!(model.row_count(&ROOT), 2);
        assert_eq!(model.column_count(&ROOT), 3);
        assert_eq!(model.get(1, 2), Some(12));
        assert_eq!(model.get(2, 0), None);
        assert!(model.index(1, 2, &ROOT).is_valid());
        assert!(!model.index(1, 3, &ROOT).is_valid());
        assert_eq!(
            model.set(0, 5, 1),
            Err(ModelError::OutOfRange { position: 5, count: 3 })
        );
    }

    #[test]
    fn test_cells_follow_row_moves() {
        let model = numbered(5, 1);
        let handles: Vec<_> = (0..5).map(|row| model.persistent_index(row, 0, &ROOT)).collect();

        model.move_rows(0, 2, 4).unwrap();

        for (value, handle) in handles.iter().enumerate() {
            assert_eq!(model.get(handle.row(), 0), Some(value * 10));
        }
    }

    #[test]
    fn test_cells_follow_column_moves() {
        let model = numbered(2, 5);
        let handles: Vec<_> = (0..5).map(|column| model.persistent_index(1, column, &ROOT)).collect();

        model.move_columns(3, 2, 1).unwrap();

        for (value, handle) in handles.iter().enumerate() {
            assert_eq!(model.get(1, handle.column()), Some(10 + value));
        }
    }

    #[test]
    fn test_remove_columns_invalidates_cells() {
        let model = numbered(2, 4);
        let gone = model.persistent_index(0, 1, &ROOT);
        let kept = model.persistent_index(0, 3, &ROOT);

        model.remove_columns(1, 2).unwrap();

        assert!(!gone.is_valid());
        assert!(!gone.is_attached());
        assert_eq!(kept.column(), 1);
        assert_eq!(model.get(0, kept.column()), Some(3));
    }

    #[test]
    fn test_column_count_tracks_changes() {
        let model = numbered(2, 3);
        model.insert_columns(1, 2).unwrap();
        assert_eq!(model.columns(), 5);
        assert_eq!(model.column_count(&ROOT), 5);
        model.remove_columns(0, 4).unwrap();
        assert_eq!(model.columns(), 1);
        assert_eq!(model.get(1, 0), Some(12));
    }

    #[test]
    fn test_remove_rows_returns_data() {
        let model = numbered(3, 2);
        let removed = model.remove_rows(1, 1).unwrap();
        assert_eq!(removed, vec![vec![10, 11]]);
        assert_eq!(model.rows(), 2);
    }

    #[test]
    fn test_reset() {
        let model = numbered(2, 2);
        let handle = model.persistent_index(1, 1, &ROOT);
        model.reset(1, 1);
        assert!(!handle.is_valid());
        assert_eq!(model.get(0, 0), Some(0));
        assert_eq!(model.columns(), 1);
    }

    #[test]
    fn test_move_block() {
        let mut items = vec![0, 1, 2, 3, 4];
        move_block(&mut items, 1, 2, 5);
        assert_eq!(items, vec![0, 3, 4, 1, 2]);

        let mut items = vec![0, 1, 2, 3, 4];
        move_block(&mut items, 3, 2, 0);
        assert_eq!(items, vec![3, 4, 0, 1, 2]);
    }
}
