//! Shared state embedded in every item model.
//!
//! [`ModelBase`] owns a model's signals and its persistent index registry and
//! implements the begin/end brackets that concrete models call around every
//! structural change:
//!
//! ```text
//! begin_insert_rows(parent, first, last)
//!     push change
//!     emit rows_about_to_be_inserted
//!     classify persistent indexes
//! <model changes its storage>
//! end_insert_rows()
//!     pop change
//!     relocate persistent indexes
//!     emit rows_inserted
//! ```
//!
//! Because the open changes are kept on a stack, the `end_*` calls take no
//! range arguments, and a signal handler may run a complete nested mutation
//! between a begin and its end.
//!
//! No borrow of the registry or the change stack is held while a signal is
//! emitted.

use std::cell::RefCell;
use std::rc::Rc;

use horizon_anchor_core::logging::targets;
use horizon_anchor_core::PerfSpan;
use static_assertions::assert_not_impl_any;

use super::config::PersistenceConfig;
use super::error::{ChangeKind, ModelError, ModelResult, MutationReport};
use super::index::ModelIndex;
use super::registry::PersistentRegistry;
use super::traits::{IndexResolver, ModelSignals, Orientation};

/// An open structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Change {
    kind: ChangeKind,
    parent: ModelIndex,
    first: usize,
    last: usize,
    /// The parent's own position shifts by the moved count during a move.
    needs_adjust: bool,
}

/// Signals, persistent indexes and the mutation protocol of one model.
///
/// Concrete models embed a `ModelBase` and return it from
/// [`ItemModel::base`](super::ItemModel::base).
pub struct ModelBase {
    signals: ModelSignals,
    registry: Rc<RefCell<PersistentRegistry>>,
    changes: RefCell<Vec<Change>>,
}

assert_not_impl_any!(ModelBase: Send, Sync);

impl Default for ModelBase {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBase {
    /// Creates a model base with the default configuration.
    pub fn new() -> Self {
        Self::with_config(PersistenceConfig::default())
    }

    /// Creates a model base with the given configuration.
    pub fn with_config(config: PersistenceConfig) -> Self {
        Self {
            signals: ModelSignals::new(),
            registry: Rc::new(RefCell::new(PersistentRegistry::new(config))),
            changes: RefCell::new(Vec::new()),
        }
    }

    /// Returns the model's signals.
    pub fn signals(&self) -> &ModelSignals {
        &self.signals
    }

    /// Returns the persistence configuration.
    pub fn config(&self) -> PersistenceConfig {
        self.registry.borrow().config()
    }

    /// Positions of all live persistent indexes, in registry order.
    pub fn persistent_index_list(&self) -> Vec<ModelIndex> {
        self.registry.borrow().live_indexes()
    }

    /// Number of live persistent records, including invalidated ones that
    /// are still referenced.
    pub fn persistent_count(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Number of structural changes currently between begin and end.
    pub fn pending_changes(&self) -> usize {
        self.changes.borrow().len()
    }

    pub(crate) fn registry(&self) -> &Rc<RefCell<PersistentRegistry>> {
        &self.registry
    }

    // -------------------------------------------------------------------------
    // Rows
    // -------------------------------------------------------------------------

    /// Begins inserting rows `first..=last` under `parent`.
    ///
    /// Call before the model's storage changes.
    pub fn begin_insert_rows<M: IndexResolver + ?Sized>(
        &self,
        model: &M,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) -> ModelResult<()> {
        self.begin_insert(model, Orientation::Vertical, parent, first, last)
    }

    /// Ends the innermost row insertion.
    pub fn end_insert_rows<M: IndexResolver + ?Sized>(&self, model: &M) -> ModelResult<MutationReport> {
        self.end_insert(model, Orientation::Vertical)
    }

    /// Begins removing rows `first..=last` under `parent`.
    pub fn begin_remove_rows<M: IndexResolver + ?Sized>(
        &self,
        model: &M,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) -> ModelResult<()> {
        self.begin_remove(model, Orientation::Vertical, parent, first, last)
    }

    /// Ends the innermost row removal.
    pub fn end_remove_rows<M: IndexResolver + ?Sized>(&self, model: &M) -> ModelResult<MutationReport> {
        self.end_remove(model, Orientation::Vertical)
    }

    /// Begins moving rows `src_first..=src_last` under `src_parent` so that
    /// they end up before row `dst_child` of `dst_parent`.
    ///
    /// Returns [`ModelError::MoveNotAllowed`] without emitting anything if the
    /// destination lies inside the moved range or its subtree. A rejected
    /// move is an expected outcome and does not panic under strict checks.
    pub fn begin_move_rows<M: IndexResolver + ?Sized>(
        &self,
        model: &M,
        src_parent: &ModelIndex,
        src_first: usize,
        src_last: usize,
        dst_parent: &ModelIndex,
        dst_child: usize,
    ) -> ModelResult<()> {
        self.begin_move(
            model,
            Orientation::Vertical,
            src_parent,
            src_first,
            src_last,
            dst_parent,
            dst_child,
        )
    }

    /// Ends the innermost row move.
    pub fn end_move_rows<M: IndexResolver + ?Sized>(&self, model: &M) -> ModelResult<MutationReport> {
        self.end_move(model, Orientation::Vertical)
    }

    // -------------------------------------------------------------------------
    // Columns
    // -------------------------------------------------------------------------

    /// Begins inserting columns `first..=last` under `parent`.
    pub fn begin_insert_columns<M: IndexResolver + ?Sized>(
        &self,
        model: &M,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) -> ModelResult<()> {
        self.begin_insert(model, Orientation::Horizontal, parent, first, last)
    }

    /// Ends the innermost column insertion.
    pub fn end_insert_columns<M: IndexResolver + ?Sized>(&self, model: &M) -> ModelResult<MutationReport> {
        self.end_insert(model, Orientation::Horizontal)
    }

    /// Begins removing columns `first..=last` under `parent`.
    pub fn begin_remove_columns<M: IndexResolver + ?Sized>(
        &self,
        model: &M,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) -> ModelResult<()> {
        self.begin_remove(model, Orientation::Horizontal, parent, first, last)
    }

    /// Ends the innermost column removal.
    pub fn end_remove_columns<M: IndexResolver + ?Sized>(&self, model: &M) -> ModelResult<MutationReport> {
        self.end_remove(model, Orientation::Horizontal)
    }

    /// Begins moving columns. See [`begin_move_rows`](Self::begin_move_rows).
    pub fn begin_move_columns<M: IndexResolver + ?Sized>(
        &self,
        model: &M,
        src_parent: &ModelIndex,
        src_first: usize,
        src_last: usize,
        dst_parent: &ModelIndex,
        dst_child: usize,
    ) -> ModelResult<()> {
        self.begin_move(
            model,
            Orientation::Horizontal,
            src_parent,
            src_first,
            src_last,
            dst_parent,
            dst_child,
        )
    }

    /// Ends the innermost column move.
    pub fn end_move_columns<M: IndexResolver + ?Sized>(&self, model: &M) -> ModelResult<MutationReport> {
        self.end_move(model, Orientation::Horizontal)
    }

    // -------------------------------------------------------------------------
    // Reset and layout
    // -------------------------------------------------------------------------

    /// Begins a model reset.
    pub fn begin_reset_model(&self) {
        tracing::debug!(target: targets::MODEL, "begin reset");
        self.signals.model_about_to_reset.emit(());
    }

    /// Ends a model reset, invalidating every persistent index.
    pub fn end_reset_model(&self) -> MutationReport {
        let invalidated = {
            let _perf = PerfSpan::new("end_reset_model");
            self.registry.borrow_mut().invalidate_all()
        };
        tracing::debug!(target: targets::MODEL, invalidated, "end reset");
        self.signals.model_reset.emit(());
        MutationReport {
            invalidated,
            ..Default::default()
        }
    }

    /// Announces an arbitrary reordering of items.
    ///
    /// Between this call and [`end_layout_change`](Self::end_layout_change)
    /// the model re-points its persistent indexes with
    /// [`change_persistent_index`](Self::change_persistent_index) or
    /// [`change_persistent_index_list`](Self::change_persistent_index_list).
    pub fn begin_layout_change(&self) {
        self.signals.layout_about_to_change.emit(());
    }

    /// Ends a layout change.
    pub fn end_layout_change(&self) {
        self.signals.layout_changed.emit(());
    }

    /// Re-points the persistent index at `from` to `to`.
    ///
    /// An invalid `to` invalidates and detaches it. Returns `false` if no
    /// persistent index is at `from`.
    pub fn change_persistent_index(&self, from: &ModelIndex, to: &ModelIndex) -> bool {
        self.registry.borrow_mut().change_persistent_index(from, to)
    }

    /// Re-points persistent indexes pairwise from `from[i]` to `to[i]`.
    ///
    /// Returns the number of persistent indexes changed.
    pub fn change_persistent_index_list(&self, from: &[ModelIndex], to: &[ModelIndex]) -> ModelResult<usize> {
        if from.len() != to.len() {
            return Err(self.usage_error(ModelError::LengthMismatch {
                from: from.len(),
                to: to.len(),
            }));
        }
        Ok(self.registry.borrow_mut().change_persistent_index_list(from, to))
    }

    // -------------------------------------------------------------------------
    // Protocol
    // -------------------------------------------------------------------------

    fn begin_insert<M: IndexResolver + ?Sized>(
        &self,
        model: &M,
        orientation: Orientation,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) -> ModelResult<()> {
        let kind = ChangeKind::Insert(orientation);
        self.check_range(kind, first, last)?;
        tracing::debug!(target: targets::MODEL, %kind, ?parent, first, last, "begin");

        self.push_change(kind, *parent, first, last, false);
        self.signals.about_to_be_inserted(orientation).emit((*parent, first, last));
        self.registry
            .borrow_mut()
            .begin_insert(model, orientation, parent, first, last);
        Ok(())
    }

    fn end_insert<M: IndexResolver + ?Sized>(&self, model: &M, orientation: Orientation) -> ModelResult<MutationReport> {
        let kind = ChangeKind::Insert(orientation);
        let change = self.pop_change(kind)?;
        let report = {
            let _perf = PerfSpan::new("end_insert");
            self.registry
                .borrow_mut()
                .end_insert(model, orientation, &change.parent, change.first, change.last)
        };
        tracing::debug!(target: targets::MODEL, %kind, relocated = report.relocated, "end");
        self.signals
            .inserted(orientation)
            .emit((change.parent, change.first, change.last));
        Ok(report)
    }

    fn begin_remove<M: IndexResolver + ?Sized>(
        &self,
        model: &M,
        orientation: Orientation,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) -> ModelResult<()> {
        let kind = ChangeKind::Remove(orientation);
        self.check_range(kind, first, last)?;
        tracing::debug!(target: targets::MODEL, %kind, ?parent, first, last, "begin");

        self.push_change(kind, *parent, first, last, false);
        self.signals.about_to_be_removed(orientation).emit((*parent, first, last));
        self.registry
            .borrow_mut()
            .begin_remove(model, orientation, parent, first, last);
        Ok(())
    }

    fn end_remove<M: IndexResolver + ?Sized>(&self, model: &M, orientation: Orientation) -> ModelResult<MutationReport> {
        let kind = ChangeKind::Remove(orientation);
        let change = self.pop_change(kind)?;
        let report = {
            let _perf = PerfSpan::new("end_remove");
            self.registry
                .borrow_mut()
                .end_remove(model, orientation, &change.parent, change.first, change.last)
        };
        tracing::debug!(
            target: targets::MODEL,
            %kind,
            relocated = report.relocated,
            invalidated = report.invalidated,
            "end"
        );
        self.signals
            .removed(orientation)
            .emit((change.parent, change.first, change.last));
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn begin_move<M: IndexResolver + ?Sized>(
        &self,
        model: &M,
        orientation: Orientation,
        src_parent: &ModelIndex,
        src_first: usize,
        src_last: usize,
        dst_parent: &ModelIndex,
        dst_child: usize,
    ) -> ModelResult<()> {
        let kind = ChangeKind::Move(orientation);
        self.check_range(kind, src_first, src_last)?;

        let allowed = self
            .registry
            .borrow()
            .allow_move(model, orientation, src_parent, src_first, src_last, dst_parent, dst_child);
        if !allowed {
            tracing::debug!(target: targets::MODEL, %kind, src_first, src_last, dst_child, "move rejected");
            return Err(ModelError::MoveNotAllowed {
                kind,
                first: src_first,
                last: src_last,
                destination: dst_child,
            });
        }
        tracing::debug!(
            target: targets::MODEL,
            %kind,
            ?src_parent,
            src_first,
            src_last,
            ?dst_parent,
            dst_child,
            "begin"
        );

        let source_adjust = src_parent.is_valid()
            && orientation.position(src_parent) >= dst_child
            && model.parent(src_parent) == *dst_parent;
        self.push_change(kind, *src_parent, src_first, src_last, source_adjust);

        let destination_adjust = dst_parent.is_valid()
            && orientation.position(dst_parent) >= src_last
            && model.parent(dst_parent) == *src_parent;
        let dst_last = dst_child + (src_last - src_first);
        self.push_change(kind, *dst_parent, dst_child, dst_last, destination_adjust);

        self.signals
            .about_to_be_moved(orientation)
            .emit((*src_parent, src_first, src_last, *dst_parent, dst_child));
        self.signals.layout_about_to_change.emit(());
        self.registry.borrow_mut().push_move_frames(
            model,
            orientation,
            src_parent,
            src_first,
            src_last,
            dst_parent,
            dst_child,
        );
        Ok(())
    }

    fn end_move<M: IndexResolver + ?Sized>(&self, model: &M, orientation: Orientation) -> ModelResult<MutationReport> {
        let kind = ChangeKind::Move(orientation);
        let destination = self.pop_change(kind)?;
        let source = self.pop_change(kind)?;

        let count = source.last - source.first + 1;
        let dst_parent = if destination.needs_adjust {
            shifted(&destination.parent, orientation, -signed(count))
        } else {
            destination.parent
        };
        let src_parent = if source.needs_adjust {
            shifted(&source.parent, orientation, signed(count))
        } else {
            source.parent
        };

        let report = {
            let _perf = PerfSpan::new("end_move");
            self.registry.borrow_mut().end_move(
                model,
                orientation,
                &src_parent,
                source.first,
                source.last,
                &dst_parent,
                destination.first,
            )
        };
        tracing::debug!(target: targets::MODEL, %kind, relocated = report.relocated, "end");
        self.signals
            .moved(orientation)
            .emit((src_parent, source.first, source.last, dst_parent, destination.first));
        self.signals.layout_changed.emit(());
        Ok(report)
    }

    // -------------------------------------------------------------------------
    // Change stack
    // -------------------------------------------------------------------------

    fn push_change(&self, kind: ChangeKind, parent: ModelIndex, first: usize, last: usize, needs_adjust: bool) {
        self.changes.borrow_mut().push(Change {
            kind,
            parent,
            first,
            last,
            needs_adjust,
        });
    }

    fn pop_change(&self, kind: ChangeKind) -> ModelResult<Change> {
        let open = self.changes.borrow().last().map(|change| change.kind);
        match open {
            None => Err(self.usage_error(ModelError::UnbalancedEnd { kind })),
            Some(open) if open != kind => Err(self.usage_error(ModelError::MismatchedEnd { kind, open })),
            Some(_) => self
                .changes
                .borrow_mut()
                .pop()
                .ok_or(ModelError::UnbalancedEnd { kind }),
        }
    }

    fn check_range(&self, kind: ChangeKind, first: usize, last: usize) -> ModelResult<()> {
        if first > last {
            return Err(self.usage_error(ModelError::InvalidRange { kind, first, last }));
        }
        Ok(())
    }

    /// Logs a protocol usage error, panicking under strict checks.
    fn usage_error(&self, error: ModelError) -> ModelError {
        tracing::error!(target: targets::MODEL, %error, "model protocol violated");
        if self.config().strict_checks && !std::thread::panicking() {
            panic!("model protocol violated: {error}");
        }
        error
    }
}

/// Returns `index` moved by `delta` along `orientation`, keeping its identity.
fn shifted(index: &ModelIndex, orientation: Orientation, delta: isize) -> ModelIndex {
    let (row_delta, column_delta) = orientation.delta(delta);
    match index.offset(row_delta, column_delta) {
        Some((row, column)) => ModelIndex::with_internal_id(row, column, index.internal_id()),
        None => *index,
    }
}

fn signed(value: usize) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::model::ItemModel;

    /// A flat list of `len` rows and one column.
    struct Rows {
        len: Cell<usize>,
        base: ModelBase,
    }

    impl Rows {
        fn new(len: usize, config: PersistenceConfig) -> Self {
            Self {
                len: Cell::new(len),
                base: ModelBase::with_config(config),
            }
        }
    }

    impl IndexResolver for Rows {
        fn row_count(&self, parent: &ModelIndex) -> usize {
            if parent.is_valid() { 0 } else { self.len.get() }
        }

        fn column_count(&self, _parent: &ModelIndex) -> usize {
            1
        }

        fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex {
            if parent.is_valid() || row >= self.len.get() || column > 0 {
                ModelIndex::invalid()
            } else {
                ModelIndex::new(row, column)
            }
        }

        fn parent(&self, _index: &ModelIndex) -> ModelIndex {
            ModelIndex::invalid()
        }
    }

    impl ItemModel for Rows {
        fn base(&self) -> &ModelBase {
            &self.base
        }
    }

    const ROOT: ModelIndex = ModelIndex::invalid();

    #[test]
    fn test_end_without_begin() {
        let model = Rows::new(3, PersistenceConfig::lenient());
        assert_eq!(
            model.base.end_insert_rows(&model),
            Err(ModelError::UnbalancedEnd {
                kind: ChangeKind::Insert(Orientation::Vertical)
            })
        );
    }

    #[test]
    fn test_mismatched_end_keeps_change_open() {
        let model = Rows::new(3, PersistenceConfig::lenient());
        model.base.begin_insert_rows(&model, &ROOT, 0, 0).unwrap();

        let err = model.base.end_remove_rows(&model).unwrap_err();
        assert_eq!(
            err,
            ModelError::MismatchedEnd {
                kind: ChangeKind::Remove(Orientation::Vertical),
                open: ChangeKind::Insert(Orientation::Vertical),
            }
        );
        assert_eq!(model.base.pending_changes(), 1);

        model.len.set(4);
        assert!(model.base.end_insert_rows(&model).is_ok());
        assert_eq!(model.base.pending_changes(), 0);
    }

    #[test]
    #[should_panic(expected = "model protocol violated")]
    fn test_invalid_range_panics_when_strict() {
        let model = Rows::new(3, PersistenceConfig::default().with_strict_checks(true));
        let _ = model.base.begin_remove_rows(&model, &ROOT, 2, 1);
    }

    #[test]
    fn test_invalid_range_is_rejected() {
        let model = Rows::new(3, PersistenceConfig::lenient());
        let result = model.base.begin_remove_rows(&model, &ROOT, 2, 1);
        assert!(matches!(result, Err(ModelError::InvalidRange { first: 2, last: 1, .. })));
        assert_eq!(model.base.pending_changes(), 0);
    }

    #[test]
    fn test_rejected_move_emits_nothing() {
        let model = Rows::new(5, PersistenceConfig::default().with_strict_checks(true));
        let emitted = Rc::new(Cell::new(0));
        let counter = emitted.clone();
        model
            .base
            .signals()
            .rows_about_to_be_moved
            .connect(move |_| counter.set(counter.get() + 1));

        let result = model.base.begin_move_rows(&model, &ROOT, 1, 2, &ROOT, 3);
        assert!(matches!(result, Err(ModelError::MoveNotAllowed { destination: 3, .. })));
        assert_eq!(emitted.get(), 0);
        assert_eq!(model.base.pending_changes(), 0);
    }

    #[test]
    fn test_signal_order() {
        let model = Rows::new(2, PersistenceConfig::lenient());
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = log.clone();
        model
            .base
            .signals()
            .rows_about_to_be_moved
            .connect(move |_| l.borrow_mut().push("about_to_be_moved"));
        let l = log.clone();
        model
            .base
            .signals()
            .layout_about_to_change
            .connect(move |_| l.borrow_mut().push("layout_about_to_change"));
        let l = log.clone();
        model
            .base
            .signals()
            .rows_moved
            .connect(move |_| l.borrow_mut().push("moved"));
        let l = log.clone();
        model
            .base
            .signals()
            .layout_changed
            .connect(move |_| l.borrow_mut().push("layout_changed"));

        model.base.begin_move_rows(&model, &ROOT, 0, 0, &ROOT, 2).unwrap();
        model.base.end_move_rows(&model).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["about_to_be_moved", "layout_about_to_change", "moved", "layout_changed"]
        );
    }

    #[test]
    fn test_persistent_index_follows_insert() {
        let model = Rows::new(3, PersistenceConfig::lenient());
        let handle = model.persistent_index(1, 0, &ROOT);

        model.base.begin_insert_rows(&model, &ROOT, 0, 1).unwrap();
        model.len.set(5);
        let report = model.base.end_insert_rows(&model).unwrap();

        assert_eq!(report.relocated, 1);
        assert_eq!(handle.row(), 3);
        assert_eq!(model.persistent_index_list(), vec![ModelIndex::new(3, 0)]);
    }

    #[test]
    fn test_reset_invalidates_everything() {
        let model = Rows::new(3, PersistenceConfig::lenient());
        let a = model.persistent_index(0, 0, &ROOT);
        let b = model.persistent_index(2, 0, &ROOT);

        model.base.begin_reset_model();
        model.len.set(0);
        let report = model.base.end_reset_model();

        assert_eq!(report.invalidated, 2);
        assert!(!a.is_valid() && !a.is_attached());
        assert!(!b.is_valid() && !b.is_attached());
        assert!(model.persistent_index_list().is_empty());
    }

    #[test]
    fn test_change_persistent_index_list_length_mismatch() {
        let model = Rows::new(3, PersistenceConfig::lenient());
        let result = model
            .base
            .change_persistent_index_list(&[ModelIndex::new(0, 0)], &[]);
        assert_eq!(result, Err(ModelError::LengthMismatch { from: 1, to: 0 }));
    }

    #[test]
    fn test_shifted_keeps_identity() {
        let index = ModelIndex::with_internal_id(4, 0, 42);
        assert_eq!(
            shifted(&index, Orientation::Vertical, -2),
            ModelIndex::with_internal_id(2, 0, 42)
        );
        assert_eq!(
            shifted(&index, Orientation::Horizontal, 3),
            ModelIndex::with_internal_id(4, 3, 42)
        );
    }
}
