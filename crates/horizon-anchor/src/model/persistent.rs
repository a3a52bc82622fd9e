//! Persistent model indexes.
//!
//! A [`PersistentModelIndex`] keeps addressing the same item while the model
//! inserts, removes and moves rows or columns around it. When its item is
//! removed (or the model is reset or dropped) the handle becomes invalid and
//! stays that way.
//!
//! All handles to one position share a single record in the model's registry.
//! Cloning a handle takes another reference to that record, dropping the last
//! handle frees it.
//!
//! # Threading
//!
//! Handles are bound to the thread that owns their model and are neither
//! `Send` nor `Sync`.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};

use horizon_anchor_core::logging::targets;
use static_assertions::assert_not_impl_any;

use super::index::ModelIndex;
use super::registry::{PersistentRegistry, Record, RecordKey};
use super::traits::ItemModel;

#[derive(Clone)]
struct Anchor {
    registry: Weak<RefCell<PersistentRegistry>>,
    key: RecordKey,
}

/// A model index that follows its item across structural changes.
///
/// # Example
///
/// ```
/// use horizon_anchor::model::{ItemModel, ModelIndex, TreeModel};
///
/// let model = TreeModel::new();
/// let first = model.add_root("first").unwrap();
/// let second = model.add_root("second").unwrap();
///
/// let handle = model.persistent_index(1, 0, &ModelIndex::invalid());
/// model.remove(first).unwrap();
///
/// assert_eq!(handle.row(), 0);
/// assert_eq!(model.node_id(&handle.index()), Some(second));
/// ```
#[derive(Default)]
pub struct PersistentModelIndex {
    anchor: Option<Anchor>,
}

assert_not_impl_any!(PersistentModelIndex: Send, Sync);

impl PersistentModelIndex {
    /// Creates a persistent index for `index` in `model`.
    ///
    /// An invalid `index` produces an invalid handle that is not tracked.
    pub fn new<M: ItemModel + ?Sized>(model: &M, index: &ModelIndex) -> Self {
        Self::from_registry(model.base().registry(), index)
    }

    pub(crate) fn from_registry(registry: &Rc<RefCell<PersistentRegistry>>, index: &ModelIndex) -> Self {
        let key = match registry.try_borrow_mut() {
            Ok(mut registry) => registry.acquire(index),
            Err(_) => {
                tracing::error!(
                    target: targets::PERSISTENT,
                    ?index,
                    "persistent index created while the registry is busy; returning an invalid handle"
                );
                None
            }
        };
        Self {
            anchor: key.map(|key| Anchor {
                registry: Rc::downgrade(registry),
                key,
            }),
        }
    }

    /// Creates an invalid persistent index.
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Reads the backing record, if both the model and the record are alive.
    fn with_record<R>(&self, f: impl FnOnce(&Record) -> R) -> Option<R> {
        let anchor = self.anchor.as_ref()?;
        let registry = anchor.registry.upgrade()?;
        let registry = registry.try_borrow().ok()?;
        registry.record(anchor.key).map(f)
    }

    /// Returns the current position of the item.
    ///
    /// Returns `ModelIndex::invalid()` once the item is gone.
    pub fn index(&self) -> ModelIndex {
        self.with_record(|record| record.index)
            .unwrap_or_else(ModelIndex::invalid)
    }

    /// Returns `true` if the item still exists.
    pub fn is_valid(&self) -> bool {
        self.index().is_valid()
    }

    /// Returns the current row, or 0 if invalid.
    pub fn row(&self) -> usize {
        self.index().row()
    }

    /// Returns the current column, or 0 if invalid.
    pub fn column(&self) -> usize {
        self.index().column()
    }

    /// Returns the internal ID of the current position.
    pub fn internal_id(&self) -> u64 {
        self.index().internal_id()
    }

    /// Returns `true` while the handle is still linked to a live model.
    ///
    /// Removal of the item, a model reset, or dropping the model detaches it.
    pub fn is_attached(&self) -> bool {
        self.with_record(|record| record.attached).unwrap_or(false)
    }

    /// Number of handles sharing this handle's record.
    ///
    /// Returns 0 for untracked handles.
    pub fn ref_count(&self) -> usize {
        self.with_record(|record| record.ref_count).unwrap_or(0)
    }

    /// Returns `true` if this handle was created from `model` and is still
    /// attached to it.
    pub fn belongs_to<M: ItemModel + ?Sized>(&self, model: &M) -> bool {
        let Some(anchor) = &self.anchor else {
            return false;
        };
        std::ptr::eq(anchor.registry.as_ptr(), Rc::as_ptr(model.base().registry())) && self.is_attached()
    }
}

impl Clone for PersistentModelIndex {
    fn clone(&self) -> Self {
        let Some(anchor) = &self.anchor else {
            return Self::invalid();
        };
        let Some(registry) = anchor.registry.upgrade() else {
            // The model is gone; the copy is as dead as the original.
            return Self::invalid();
        };
        let retained = match registry.try_borrow_mut() {
            Ok(mut registry) => registry.retain(anchor.key),
            Err(_) => {
                tracing::error!(
                    target: targets::PERSISTENT,
                    "persistent index cloned while the registry is busy; returning an invalid handle"
                );
                false
            }
        };
        if retained {
            Self {
                anchor: Some(anchor.clone()),
            }
        } else {
            Self::invalid()
        }
    }
}

impl Drop for PersistentModelIndex {
    fn drop(&mut self) {
        let Some(anchor) = self.anchor.take() else {
            return;
        };
        let Some(registry) = anchor.registry.upgrade() else {
            return;
        };
        match registry.try_borrow_mut() {
            Ok(mut registry) => registry.release(anchor.key),
            Err(_) => tracing::error!(
                target: targets::PERSISTENT,
                "persistent index dropped while the registry is busy; leaking its record"
            ),
        }
    }
}

impl PartialEq for PersistentModelIndex {
    fn eq(&self, other: &Self) -> bool {
        self.index() == other.index()
    }
}

impl Eq for PersistentModelIndex {}

impl PartialEq<ModelIndex> for PersistentModelIndex {
    fn eq(&self, other: &ModelIndex) -> bool {
        self.index() == *other
    }
}

impl PartialOrd for PersistentModelIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PersistentModelIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index().cmp(&other.index())
    }
}

impl fmt::Debug for PersistentModelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentModelIndex")
            .field("index", &self.index())
            .field("attached", &self.is_attached())
            .finish()
    }
}
