//! Begin/end procedures that keep persistent records in step with structural
//! mutations.
//!
//! Every `begin_*` classifies the affected records against the tree shape
//! *before* the mutation and pushes them as frames; the matching `end_*` pops
//! those frames and asks the model for each record's new position. Frames are
//! stacks so that a mutation may be nested inside another one's brackets.
//!
//! Shifts are applied as counts relative to each record's current position,
//! never as absolute targets, which is what lets nested inserts compose.

use horizon_anchor_core::logging::targets;

use super::config::ResolveFailurePolicy;
use super::error::{MutationReport, UnresolvedIndex};
use super::index::ModelIndex;
use super::registry::{PersistentRegistry, RecordKey};
use super::traits::{IndexResolver, Orientation};

#[allow(clippy::too_many_arguments)]
impl PersistentRegistry {
    // -------------------------------------------------------------------------
    // Insert
    // -------------------------------------------------------------------------

    /// Records every persistent index under `parent` at or after `first`.
    ///
    /// Must be called before the model's storage changes.
    #[tracing::instrument(skip(self, model), target = "horizon_anchor::persistent", level = "trace")]
    pub fn begin_insert<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        orientation: Orientation,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) {
        let mut moved = Vec::new();
        // Nothing can shift when appending past the current end.
        if first < orientation.extent(model, parent) {
            for (index, key) in self.entries() {
                if orientation.position(index) >= first && model.parent(index) == *parent {
                    moved.push(key);
                }
            }
        }
        self.moved.push(moved);
    }

    /// Shifts the records collected by the matching [`begin_insert`] by the
    /// number of inserted items.
    ///
    /// [`begin_insert`]: Self::begin_insert
    #[tracing::instrument(skip(self, model), target = "horizon_anchor::persistent", level = "trace")]
    pub fn end_insert<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        orientation: Orientation,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) -> MutationReport {
        let mut report = MutationReport::default();
        let Some(moved) = self.pop_moved(parent) else {
            return report;
        };
        let count = span(first, last);
        self.relocate(model, moved, orientation, count, parent, &mut report);
        report
    }

    // -------------------------------------------------------------------------
    // Remove
    // -------------------------------------------------------------------------

    /// Classifies every record against the range about to be removed.
    ///
    /// Records are matched at the level of their ancestor whose parent is
    /// `parent`: past `last` they will shift back, inside `[first, last]` they
    /// lose their item, however deep below it they sit.
    #[tracing::instrument(skip(self, model), target = "horizon_anchor::persistent", level = "trace")]
    pub fn begin_remove<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        orientation: Orientation,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) {
        let max_depth = self.config.max_ancestor_depth;
        let mut moved = Vec::new();
        let mut invalidated = Vec::new();

        for (index, key) in self.entries() {
            let mut level_changed = false;
            let mut current = *index;
            let mut hops = 0;
            while current.is_valid() {
                let current_parent = model.parent(&current);
                if current_parent == *parent {
                    let position = orientation.position(&current);
                    if !level_changed && position > last {
                        moved.push(key);
                    } else if (first..=last).contains(&position) {
                        invalidated.push(key);
                    }
                    break;
                }
                hops += 1;
                if hops > max_depth {
                    tracing::error!(
                        target: targets::PERSISTENT,
                        ?index,
                        max_depth,
                        "ancestor walk exceeded the maximum depth; leaving record unaffected"
                    );
                    break;
                }
                current = current_parent;
                level_changed = true;
            }
        }

        self.moved.push(moved);
        self.invalidated.push(invalidated);
    }

    /// Shifts surviving records back and invalidates records inside the
    /// removed range.
    ///
    /// Invalidated records are detached and never registered again.
    #[tracing::instrument(skip(self, model), target = "horizon_anchor::persistent", level = "trace")]
    pub fn end_remove<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        orientation: Orientation,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) -> MutationReport {
        let mut report = MutationReport::default();
        let Some(moved) = self.pop_moved(parent) else {
            return report;
        };
        let Some(invalidated) = self.invalidated.pop() else {
            self.consistency_violation("remove ended without an invalidated frame", parent);
            return report;
        };

        let count = span(first, last);
        self.relocate(model, moved, orientation, -count, parent, &mut report);

        for key in invalidated {
            let Some(old) = self.records.get(key).map(|record| record.index) else {
                continue;
            };
            if old.is_valid() {
                self.remove(&old, key);
            }
            if let Some(record) = self.records.get_mut(key) {
                record.index = ModelIndex::invalid();
                record.attached = false;
                report.invalidated += 1;
            }
        }
        report
    }

    // -------------------------------------------------------------------------
    // Move
    // -------------------------------------------------------------------------

    /// Returns `true` if `[start, end]` under `src_parent` may be moved to
    /// `dst_start` under `dst_parent`.
    ///
    /// Within one parent the destination may not fall inside the range or
    /// right after it. Across parents the destination may not lie inside the
    /// moved subtree.
    pub fn allow_move<M: IndexResolver + ?Sized>(
        &self,
        model: &M,
        orientation: Orientation,
        src_parent: &ModelIndex,
        start: usize,
        end: usize,
        dst_parent: &ModelIndex,
        dst_start: usize,
    ) -> bool {
        if dst_parent == src_parent {
            return !(dst_start >= start && dst_start <= end + 1);
        }

        let mut ancestor = *dst_parent;
        let mut position = orientation.position(&ancestor);
        for _ in 0..=self.config.max_ancestor_depth {
            if ancestor == *src_parent {
                return !(start..=end).contains(&position);
            }
            if !ancestor.is_valid() {
                return true;
            }
            position = orientation.position(&ancestor);
            ancestor = model.parent(&ancestor);
        }

        tracing::error!(
            target: targets::PERSISTENT,
            ?dst_parent,
            "ancestor walk exceeded the maximum depth; rejecting move"
        );
        false
    }

    /// Splits the records touched by a move into the explicitly moved range,
    /// the records shifting inside the source parent and the records shifting
    /// inside the destination parent.
    ///
    /// Returns `false` without pushing any frame if the move is not allowed.
    #[tracing::instrument(skip(self, model), target = "horizon_anchor::persistent", level = "trace")]
    pub fn begin_move<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        orientation: Orientation,
        src_parent: &ModelIndex,
        src_first: usize,
        src_last: usize,
        dst_parent: &ModelIndex,
        dst_child: usize,
    ) -> bool {
        if !self.allow_move(model, orientation, src_parent, src_first, src_last, dst_parent, dst_child) {
            return false;
        }
        self.push_move_frames(model, orientation, src_parent, src_first, src_last, dst_parent, dst_child);
        true
    }

    /// Classifies and pushes the move partitions without checking
    /// [`allow_move`](Self::allow_move).
    pub(crate) fn push_move_frames<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        orientation: Orientation,
        src_parent: &ModelIndex,
        src_first: usize,
        src_last: usize,
        dst_parent: &ModelIndex,
        dst_child: usize,
    ) {
        let same_parent = src_parent == dst_parent;
        let moving_up = src_first > dst_child;

        let mut explicit = Vec::new();
        let mut in_source = Vec::new();
        let mut in_destination = Vec::new();

        for (index, key) in self.entries() {
            let parent = model.parent(index);
            let is_source = parent == *src_parent;
            let is_destination = parent == *dst_parent;
            if !(is_source || is_destination) {
                continue;
            }
            let position = orientation.position(index);

            if !same_parent && is_destination {
                if position >= dst_child {
                    in_destination.push(key);
                }
                continue;
            }

            let unaffected = if same_parent && moving_up {
                position < dst_child || (position > src_last && position >= dst_child)
            } else if same_parent {
                position < src_first || (position > src_last && position >= dst_child)
            } else {
                position < src_first
            };
            if unaffected {
                continue;
            }

            if (src_first..=src_last).contains(&position) {
                explicit.push(key);
            } else {
                in_source.push(key);
            }
        }

        self.moved.push(explicit);
        self.moved.push(in_source);
        self.moved.push(in_destination);
    }

    /// Applies the three partitions pushed by [`begin_move`], each with its
    /// own delta.
    ///
    /// `src_parent` and `dst_parent` are the parents as they are *after* the
    /// move.
    ///
    /// [`begin_move`]: Self::begin_move
    #[tracing::instrument(skip(self, model), target = "horizon_anchor::persistent", level = "trace")]
    pub fn end_move<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        orientation: Orientation,
        src_parent: &ModelIndex,
        src_first: usize,
        src_last: usize,
        dst_parent: &ModelIndex,
        dst_child: usize,
    ) -> MutationReport {
        let mut report = MutationReport::default();
        let (Some(in_destination), Some(in_source), Some(explicit)) = (
            self.pop_moved(dst_parent),
            self.pop_moved(src_parent),
            self.pop_moved(src_parent),
        ) else {
            return report;
        };

        let same_parent = src_parent == dst_parent;
        let moving_up = src_first > dst_child;
        let count = span(src_first, src_last);
        let (dst, first, last) = (signed(dst_child), signed(src_first), signed(src_last));

        let explicit_delta = if !same_parent || moving_up {
            dst - first
        } else {
            dst - last - 1
        };
        let source_delta = if !same_parent || !moving_up { -count } else { count };
        let destination_delta = count;

        let partitions = [
            ("explicit", explicit, explicit_delta, dst_parent),
            ("source", in_source, source_delta, src_parent),
            ("destination", in_destination, destination_delta, dst_parent),
        ];
        for (name, keys, delta, parent) in partitions {
            let mut partition = MutationReport::default();
            self.relocate(model, keys, orientation, delta, parent, &mut partition);
            tracing::trace!(
                target: targets::PERSISTENT,
                partition = name,
                delta,
                relocated = partition.relocated,
                unresolved = partition.unresolved.len(),
                "applied move partition"
            );
            report.merge(partition);
        }
        report
    }

    // -------------------------------------------------------------------------
    // Reset and explicit re-pointing
    // -------------------------------------------------------------------------

    /// Invalidates and detaches every record.
    #[tracing::instrument(skip(self), target = "horizon_anchor::persistent", level = "trace")]
    pub fn invalidate_all(&mut self) -> usize {
        let registered: Vec<(ModelIndex, RecordKey)> = self.entries().map(|(index, key)| (*index, key)).collect();
        for (index, key) in &registered {
            self.remove(index, *key);
        }
        for record in self.records.values_mut() {
            record.index = ModelIndex::invalid();
            record.attached = false;
        }
        registered.len()
    }

    /// Re-points the first record registered at `from` to `to`.
    ///
    /// An invalid `to` detaches the record. Returns `false` if no record was
    /// registered at `from`.
    pub fn change_persistent_index(&mut self, from: &ModelIndex, to: &ModelIndex) -> bool {
        let Some(key) = self.find_all(from).next() else {
            return false;
        };
        self.remove(from, key);
        self.repoint(key, *to);
        if to.is_valid() {
            self.insert_at_end(*to, key);
        }
        true
    }

    /// Re-points records pairwise from `from[i]` to `to[i]`.
    ///
    /// Identical pairs are skipped. All removals happen before any record is
    /// registered again, so the lists may describe a permutation. Returns the
    /// number of records changed.
    pub fn change_persistent_index_list(&mut self, from: &[ModelIndex], to: &[ModelIndex]) -> usize {
        let mut reinsert = Vec::with_capacity(to.len());
        let mut changed = 0;
        for (old, new) in from.iter().zip(to) {
            if old == new {
                continue;
            }
            let Some(key) = self.find_all(old).next() else {
                continue;
            };
            self.remove(old, key);
            self.repoint(key, *new);
            if new.is_valid() {
                reinsert.push((*new, key));
            }
            changed += 1;
        }
        for (index, key) in reinsert {
            self.insert_at_end(index, key);
        }
        changed
    }

    // -------------------------------------------------------------------------
    // Named wrappers
    // -------------------------------------------------------------------------

    /// [`begin_insert`](Self::begin_insert) along rows.
    pub fn begin_insert_rows<M: IndexResolver + ?Sized>(&mut self, model: &M, parent: &ModelIndex, first: usize, last: usize) {
        self.begin_insert(model, Orientation::Vertical, parent, first, last);
    }

    /// [`end_insert`](Self::end_insert) along rows.
    pub fn end_insert_rows<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) -> MutationReport {
        self.end_insert(model, Orientation::Vertical, parent, first, last)
    }

    /// [`begin_insert`](Self::begin_insert) along columns.
    pub fn begin_insert_columns<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) {
        self.begin_insert(model, Orientation::Horizontal, parent, first, last);
    }

    /// [`end_insert`](Self::end_insert) along columns.
    pub fn end_insert_columns<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) -> MutationReport {
        self.end_insert(model, Orientation::Horizontal, parent, first, last)
    }

    /// [`begin_remove`](Self::begin_remove) along rows.
    pub fn begin_remove_rows<M: IndexResolver + ?Sized>(&mut self, model: &M, parent: &ModelIndex, first: usize, last: usize) {
        self.begin_remove(model, Orientation::Vertical, parent, first, last);
    }

    /// [`end_remove`](Self::end_remove) along rows.
    pub fn end_remove_rows<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) -> MutationReport {
        self.end_remove(model, Orientation::Vertical, parent, first, last)
    }

    /// [`begin_remove`](Self::begin_remove) along columns.
    pub fn begin_remove_columns<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) {
        self.begin_remove(model, Orientation::Horizontal, parent, first, last);
    }

    /// [`end_remove`](Self::end_remove) along columns.
    pub fn end_remove_columns<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        parent: &ModelIndex,
        first: usize,
        last: usize,
    ) -> MutationReport {
        self.end_remove(model, Orientation::Horizontal, parent, first, last)
    }

    /// [`begin_move`](Self::begin_move) along rows.
    pub fn begin_move_rows<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        src_parent: &ModelIndex,
        src_first: usize,
        src_last: usize,
        dst_parent: &ModelIndex,
        dst_child: usize,
    ) -> bool {
        self.begin_move(model, Orientation::Vertical, src_parent, src_first, src_last, dst_parent, dst_child)
    }

    /// [`end_move`](Self::end_move) along rows.
    pub fn end_move_rows<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        src_parent: &ModelIndex,
        src_first: usize,
        src_last: usize,
        dst_parent: &ModelIndex,
        dst_child: usize,
    ) -> MutationReport {
        self.end_move(model, Orientation::Vertical, src_parent, src_first, src_last, dst_parent, dst_child)
    }

    /// [`begin_move`](Self::begin_move) along columns.
    pub fn begin_move_columns<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        src_parent: &ModelIndex,
        src_first: usize,
        src_last: usize,
        dst_parent: &ModelIndex,
        dst_child: usize,
    ) -> bool {
        self.begin_move(model, Orientation::Horizontal, src_parent, src_first, src_last, dst_parent, dst_child)
    }

    /// [`end_move`](Self::end_move) along columns.
    pub fn end_move_columns<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        src_parent: &ModelIndex,
        src_first: usize,
        src_last: usize,
        dst_parent: &ModelIndex,
        dst_child: usize,
    ) -> MutationReport {
        self.end_move(model, Orientation::Horizontal, src_parent, src_first, src_last, dst_parent, dst_child)
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn pop_moved(&mut self, parent: &ModelIndex) -> Option<Vec<RecordKey>> {
        let frame = self.moved.pop();
        if frame.is_none() {
            self.consistency_violation("mutation ended without a matching frame", parent);
        }
        frame
    }

    fn repoint(&mut self, key: RecordKey, to: ModelIndex) {
        if let Some(record) = self.records.get_mut(key) {
            record.index = to;
            if !to.is_valid() {
                record.attached = false;
            }
        }
    }

    /// Moves each record by `delta` along `orientation` and re-resolves it
    /// under `parent`.
    fn relocate<M: IndexResolver + ?Sized>(
        &mut self,
        model: &M,
        keys: Vec<RecordKey>,
        orientation: Orientation,
        delta: isize,
        parent: &ModelIndex,
        report: &mut MutationReport,
    ) {
        let (row_delta, column_delta) = orientation.delta(delta);
        for key in keys {
            let Some(old) = self.records.get(key).map(|record| record.index) else {
                continue;
            };
            // Already invalidated by a nested mutation.
            if !old.is_valid() {
                continue;
            }
            self.remove(&old, key);

            let requested = old.offset(row_delta, column_delta);
            let resolved = requested
                .map(|(row, column)| model.index(row, column, parent))
                .unwrap_or_else(ModelIndex::invalid);

            let policy = self.config.resolve_failure;
            let Some(record) = self.records.get_mut(key) else {
                continue;
            };
            record.index = resolved;
            if resolved.is_valid() {
                self.insert_at_end(resolved, key);
                report.relocated += 1;
            } else {
                if policy == ResolveFailurePolicy::Detach {
                    record.attached = false;
                }
                tracing::warn!(
                    target: targets::PERSISTENT,
                    previous = ?old,
                    ?requested,
                    ?parent,
                    "model could not resolve the new position of a persistent index"
                );
                report.unresolved.push(UnresolvedIndex {
                    previous: old,
                    requested,
                    parent: *parent,
                });
            }
        }
    }
}

/// Number of items in `[first, last]` as a signed delta.
fn span(first: usize, last: usize) -> isize {
    signed(last.saturating_sub(first) + 1)
}

fn signed(value: usize) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}
