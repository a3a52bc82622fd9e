//! Per-model bookkeeping for persistent indexes.
//!
//! The registry owns one [`Record`] per distinct persistent position and keeps
//! them in an ordered multi-association keyed by [`ModelIndex`]. Structural
//! mutations push frames of affected records on begin and pop them on end;
//! see the `protocol` module for those procedures.
//!
//! Records live in a [`SlotMap`] so that the keys held by frames and handles
//! are generation-checked: a key whose record was released never resolves to
//! a later record that reused the slot.

use std::collections::BTreeMap;
use std::fmt;

use horizon_anchor_core::logging::targets;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use super::config::PersistenceConfig;
use super::index::ModelIndex;

new_key_type! {
    /// Identifies a record within a [`PersistentRegistry`].
    pub struct RecordKey;
}

/// The canonical state behind every handle to one persistent position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Record {
    /// Current position, or the invalid index once the item is gone.
    pub(crate) index: ModelIndex,
    /// Cleared when the item is removed or the model is reset.
    pub(crate) attached: bool,
    /// Number of live handles.
    pub(crate) ref_count: usize,
}

type Bucket = SmallVec<[RecordKey; 1]>;

/// Persistent index registry of a single model.
///
/// Holds the ordered `ModelIndex -> Record` multi-association and the stacks
/// of "moved" and "invalidated" frames used by in-flight mutations.
pub struct PersistentRegistry {
    pub(crate) records: SlotMap<RecordKey, Record>,
    index_to_records: BTreeMap<ModelIndex, Bucket>,
    pub(crate) moved: Vec<Vec<RecordKey>>,
    pub(crate) invalidated: Vec<Vec<RecordKey>>,
    pub(crate) config: PersistenceConfig,
}

impl Default for PersistentRegistry {
    fn default() -> Self {
        Self::new(PersistenceConfig::default())
    }
}

impl PersistentRegistry {
    /// Creates an empty registry.
    pub fn new(config: PersistenceConfig) -> Self {
        Self {
            records: SlotMap::with_key(),
            index_to_records: BTreeMap::new(),
            moved: Vec::new(),
            invalidated: Vec::new(),
            config,
        }
    }

    /// Returns the registry configuration.
    pub fn config(&self) -> PersistenceConfig {
        self.config
    }

    /// Number of live records, registered or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no record is alive.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of open "moved" frames.
    pub fn frame_depth(&self) -> usize {
        self.moved.len()
    }

    // -------------------------------------------------------------------------
    // Ordered multi-association
    // -------------------------------------------------------------------------

    /// Registers `key` under `index`, after any records already there.
    pub(crate) fn insert_at_end(&mut self, index: ModelIndex, key: RecordKey) {
        if !index.is_valid() {
            self.consistency_violation("attempted to register an invalid index", &index);
            return;
        }
        self.index_to_records.entry(index).or_default().push(key);
    }

    /// Removes exactly one `(index, key)` association.
    ///
    /// Returns `false` and reports a consistency violation if the pair was not
    /// registered.
    pub(crate) fn remove(&mut self, index: &ModelIndex, key: RecordKey) -> bool {
        let removed = match self.index_to_records.get_mut(index) {
            Some(bucket) => match bucket.iter().position(|&k| k == key) {
                Some(pos) => {
                    bucket.remove(pos);
                    if bucket.is_empty() {
                        self.index_to_records.remove(index);
                    }
                    true
                }
                None => false,
            },
            None => false,
        };
        if !removed {
            self.consistency_violation("persistent model indexes corrupted", index);
        }
        removed
    }

    /// Returns every record registered under `index`, in insertion order.
    pub fn find_all(&self, index: &ModelIndex) -> impl Iterator<Item = RecordKey> + '_ {
        self.index_to_records
            .get(index)
            .into_iter()
            .flat_map(|bucket| bucket.iter().copied())
    }

    /// Iterates `(index, key)` pairs in registry order.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (&ModelIndex, RecordKey)> + '_ {
        self.index_to_records
            .iter()
            .flat_map(|(index, bucket)| bucket.iter().map(move |&key| (index, key)))
    }

    /// Positions of every registered record, in registry order.
    pub fn live_indexes(&self) -> Vec<ModelIndex> {
        self.entries().map(|(index, _)| *index).collect()
    }

    // -------------------------------------------------------------------------
    // Record lifecycle
    // -------------------------------------------------------------------------

    /// Returns the record for `key`, if it is still alive.
    pub(crate) fn record(&self, key: RecordKey) -> Option<&Record> {
        self.records.get(key)
    }

    /// Looks up or creates the canonical record for `index` and takes a
    /// reference to it.
    ///
    /// Returns `None` for invalid indexes, which are never registered.
    pub(crate) fn acquire(&mut self, index: &ModelIndex) -> Option<RecordKey> {
        if !index.is_valid() {
            return None;
        }
        let existing = self.find_all(index).next();
        if let Some(key) = existing {
            if let Some(record) = self.records.get_mut(key) {
                record.ref_count += 1;
                return Some(key);
            }
        }
        let key = self.records.insert(Record {
            index: *index,
            attached: true,
            ref_count: 1,
        });
        self.insert_at_end(*index, key);
        tracing::trace!(target: targets::PERSISTENT, ?index, "created persistent record");
        Some(key)
    }

    /// Takes an additional reference to a live record.
    pub(crate) fn retain(&mut self, key: RecordKey) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                record.ref_count += 1;
                true
            }
            None => false,
        }
    }

    /// Drops one reference; the last one unregisters and frees the record.
    pub(crate) fn release(&mut self, key: RecordKey) {
        let Some(record) = self.records.get_mut(key) else {
            return;
        };
        record.ref_count -= 1;
        if record.ref_count > 0 {
            return;
        }
        let Some(record) = self.records.remove(key) else {
            return;
        };
        if record.index.is_valid() {
            self.remove(&record.index, key);
        }
        // Frames opened by in-flight mutations must not revisit a freed record.
        for frame in self.moved.iter_mut().chain(self.invalidated.iter_mut()) {
            frame.retain(|&k| k != key);
        }
        tracing::trace!(target: targets::PERSISTENT, index = ?record.index, "released persistent record");
    }

    /// Reports a bookkeeping inconsistency.
    ///
    /// Panics under strict checks, otherwise logs and lets the caller no-op.
    pub(crate) fn consistency_violation(&self, message: &str, index: &ModelIndex) {
        tracing::error!(target: targets::PERSISTENT, ?index, "{message}");
        if self.config.strict_checks && !std::thread::panicking() {
            panic!("persistent index registry: {message} ({index:?})");
        }
    }
}

impl fmt::Debug for PersistentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentRegistry")
            .field("records", &self.records.len())
            .field(
                "entries",
                &self
                    .entries()
                    .map(|(index, key)| (*index, self.records.get(key).map(|r| r.ref_count)))
                    .collect::<Vec<_>>(),
            )
            .field("frame_depth", &self.moved.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lenient() -> PersistentRegistry {
        PersistentRegistry::new(PersistenceConfig::lenient())
    }

    fn dummy_keys(registry: &mut PersistentRegistry, count: usize) -> Vec<RecordKey> {
        (0..count)
            .map(|_| {
                registry.records.insert(Record {
                    index: ModelIndex::invalid(),
                    attached: true,
                    ref_count: 1,
                })
            })
            .collect()
    }

    #[test]
    fn test_insert_at_end_appends_to_bucket() {
        let mut registry = lenient();
        let keys = dummy_keys(&mut registry, 3);
        let shared = ModelIndex::new(2, 0);

        registry.insert_at_end(shared, keys[1]);
        registry.insert_at_end(ModelIndex::new(1, 0), keys[2]);
        registry.insert_at_end(shared, keys[0]);
        registry.insert_at_end(shared, keys[2]);

        let found: Vec<_> = registry.find_all(&shared).collect();
        assert_eq!(found, vec![keys[1], keys[0], keys[2]]);

        // Registry order is by position first, insertion order second.
        let order: Vec<_> = registry.entries().map(|(i, k)| (i.row(), k)).collect();
        assert_eq!(order, vec![(1, keys[2]), (2, keys[1]), (2, keys[0]), (2, keys[2])]);
    }

    #[test]
    fn test_remove_exact_pair() {
        let mut registry = lenient();
        let keys = dummy_keys(&mut registry, 2);
        let index = ModelIndex::new(0, 0);

        registry.insert_at_end(index, keys[0]);
        registry.insert_at_end(index, keys[1]);

        assert!(registry.remove(&index, keys[1]));
        assert_eq!(registry.find_all(&index).collect::<Vec<_>>(), vec![keys[0]]);

        // Missing pair is a logged no-op when lenient.
        assert!(!registry.remove(&index, keys[1]));
        assert!(!registry.remove(&ModelIndex::new(9, 9), keys[0]));
        assert_eq!(registry.live_indexes(), vec![index]);

        assert!(registry.remove(&index, keys[0]));
        assert!(registry.live_indexes().is_empty());
    }

    #[test]
    #[should_panic(expected = "persistent model indexes corrupted")]
    fn test_remove_missing_pair_panics_when_strict() {
        let mut registry = PersistentRegistry::new(PersistenceConfig::default().with_strict_checks(true));
        let keys = dummy_keys(&mut registry, 1);
        registry.remove(&ModelIndex::new(0, 0), keys[0]);
    }

    #[test]
    fn test_invalid_index_is_never_registered() {
        let mut registry = lenient();
        let keys = dummy_keys(&mut registry, 1);
        registry.insert_at_end(ModelIndex::invalid(), keys[0]);
        assert!(registry.live_indexes().is_empty());
        assert_eq!(registry.acquire(&ModelIndex::invalid()), None);
    }

    #[test]
    fn test_acquire_shares_record() {
        let mut registry = lenient();
        let index = ModelIndex::new(3, 1);

        let a = registry.acquire(&index).unwrap();
        let b = registry.acquire(&index).unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.record(a).unwrap().ref_count, 2);
        assert_eq!(registry.len(), 1);

        registry.release(a);
        assert_eq!(registry.record(a).unwrap().ref_count, 1);
        registry.release(b);
        assert!(registry.record(a).is_none());
        assert!(registry.is_empty());
        assert!(registry.live_indexes().is_empty());
    }

    #[test]
    fn test_acquire_joins_record_at_its_new_position() {
        let mut registry = lenient();
        let key = registry.acquire(&ModelIndex::new(1, 0)).unwrap();
        registry.change_persistent_index(&ModelIndex::new(1, 0), &ModelIndex::new(4, 0));

        assert_eq!(registry.acquire(&ModelIndex::new(4, 0)), Some(key));
        assert_eq!(registry.record(key).unwrap().ref_count, 2);
        assert_ne!(registry.acquire(&ModelIndex::new(1, 0)), Some(key));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reacquire_after_release_creates_fresh_record() {
        let mut registry = lenient();
        let index = ModelIndex::new(0, 0);

        let first = registry.acquire(&index).unwrap();
        registry.release(first);
        let second = registry.acquire(&index).unwrap();

        assert_ne!(first, second);
        assert!(registry.record(first).is_none());
        assert_eq!(registry.record(second).unwrap().ref_count, 1);
    }

    #[test]
    fn test_release_purges_open_frames() {
        let mut registry = lenient();
        let a = registry.acquire(&ModelIndex::new(0, 0)).unwrap();
        let b = registry.acquire(&ModelIndex::new(1, 0)).unwrap();

        registry.moved.push(vec![a, b]);
        registry.moved.push(vec![b]);
        registry.invalidated.push(vec![b, a]);

        registry.release(b);

        assert_eq!(registry.moved, vec![vec![a], vec![]]);
        assert_eq!(registry.invalidated, vec![vec![a]]);
    }

    #[test]
    fn test_retain() {
        let mut registry = lenient();
        let key = registry.acquire(&ModelIndex::new(0, 0)).unwrap();
        assert!(registry.retain(key));
        assert_eq!(registry.record(key).unwrap().ref_count, 2);

        registry.release(key);
        registry.release(key);
        assert!(!registry.retain(key));
    }
}
