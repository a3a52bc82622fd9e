//! Hierarchical tree model implementation.
//!
//! `TreeModel` stores data with parent-child relationships and announces every
//! structural change through [`ModelBase`], so persistent indexes into it
//! follow their nodes across insertions, removals, moves and sorting.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use super::base::ModelBase;
use super::config::PersistenceConfig;
use super::error::{ModelError, ModelResult};
use super::index::ModelIndex;
use super::traits::{IndexResolver, ItemModel};

/// A node ID for internal tracking.
pub type NodeId = u64;

/// Counter for generating unique node IDs.
static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> NodeId {
    NODE_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed)
}

/// A node in the tree structure.
struct TreeNode<T> {
    data: T,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

/// Internal storage for tree nodes.
struct TreeStorage<T> {
    nodes: HashMap<NodeId, TreeNode<T>>,
    root_children: Vec<NodeId>,
}

impl<T> TreeStorage<T> {
    fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            root_children: Vec::new(),
        }
    }

    fn children_of(&self, parent_id: Option<NodeId>) -> &[NodeId] {
        match parent_id {
            None => &self.root_children,
            Some(id) => self
                .nodes
                .get(&id)
                .map(|n| n.children.as_slice())
                .unwrap_or(&[]),
        }
    }

    fn children_mut(&mut self, parent_id: Option<NodeId>) -> Option<&mut Vec<NodeId>> {
        match parent_id {
            None => Some(&mut self.root_children),
            Some(id) => self.nodes.get_mut(&id).map(|n| &mut n.children),
        }
    }

    fn child_count(&self, parent_id: Option<NodeId>) -> usize {
        self.children_of(parent_id).len()
    }

    fn child_at(&self, parent_id: Option<NodeId>, row: usize) -> Option<NodeId> {
        self.children_of(parent_id).get(row).copied()
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    fn row_of(&self, id: NodeId) -> Option<usize> {
        let node = self.nodes.get(&id)?;
        self.children_of(node.parent)
            .iter()
            .position(|&child_id| child_id == id)
    }

    /// Creates nodes for `items` and links them in at `row`.
    fn insert(&mut self, parent_id: Option<NodeId>, row: usize, items: Vec<T>) -> Vec<NodeId> {
        let ids: Vec<NodeId> = items
            .into_iter()
            .map(|data| {
                let id = next_node_id();
                self.nodes.insert(
                    id,
                    TreeNode {
                        data,
                        children: Vec::new(),
                        parent: parent_id,
                    },
                );
                id
            })
            .collect();
        self.attach(parent_id, row, &ids);
        ids
    }

    /// Unlinks `count` children starting at `row` without dropping them.
    fn detach(&mut self, parent_id: Option<NodeId>, row: usize, count: usize) -> Vec<NodeId> {
        match self.children_mut(parent_id) {
            Some(children) => children.drain(row..row + count).collect(),
            None => Vec::new(),
        }
    }

    /// Links existing nodes under `parent_id` at `row`.
    fn attach(&mut self, parent_id: Option<NodeId>, row: usize, ids: &[NodeId]) {
        for id in ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.parent = parent_id;
            }
        }
        if let Some(children) = self.children_mut(parent_id) {
            children.splice(row..row, ids.iter().copied());
        }
    }

    /// Drops a detached node and all its descendants.
    fn remove_subtree(&mut self, id: NodeId) -> Option<T> {
        let node = self.nodes.remove(&id)?;
        let mut pending = node.children;
        while let Some(child_id) = pending.pop() {
            if let Some(child) = self.nodes.remove(&child_id) {
                pending.extend(child.children);
            }
        }
        Some(node.data)
    }
}

/// A hierarchical tree model.
///
/// Node IDs are stable for the lifetime of a node and are used as the
/// internal ID of its model indexes, so an index only needs its row to be
/// kept current.
///
/// # Example
///
/// ```
/// use horizon_anchor::model::{ItemModel, ModelIndex, TreeModel};
///
/// let model = TreeModel::new();
/// let docs = model.add_root("Documents").unwrap();
/// let notes = model.add_child(docs, "notes.txt").unwrap();
///
/// let handle = model.persistent_index(0, 0, &model.index_for_node(docs));
/// model.add_child(docs, "a.txt").unwrap();
/// model.move_rows(&model.index_for_node(docs), 1, 1, &model.index_for_node(docs), 0).unwrap();
///
/// assert_eq!(handle.row(), 1);
/// assert_eq!(model.node_id(&handle.index()), Some(notes));
/// ```
pub struct TreeModel<T> {
    storage: RefCell<TreeStorage<T>>,
    column_count: usize,
    base: ModelBase,
}

impl<T> TreeModel<T> {
    /// Creates a new empty tree model.
    pub fn new() -> Self {
        Self::with_config(PersistenceConfig::default())
    }

    /// Creates a new empty tree model with the given persistence
    /// configuration.
    pub fn with_config(config: PersistenceConfig) -> Self {
        Self {
            storage: RefCell::new(TreeStorage::new()),
            column_count: 1,
            base: ModelBase::with_config(config),
        }
    }

    /// Sets the number of columns every node exposes.
    pub fn with_columns(mut self, count: usize) -> Self {
        self.column_count = count;
        self
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Adds a root-level node and returns its ID.
    pub fn add_root(&self, data: T) -> ModelResult<NodeId> {
        let row = self.root_count();
        let ids = self.insert_rows(&ModelIndex::invalid(), row, vec![data])?;
        Ok(ids[0])
    }

    /// Appends a child node to `parent_id` and returns its ID.
    pub fn add_child(&self, parent_id: NodeId, data: T) -> ModelResult<NodeId> {
        let parent = self.existing_index(parent_id)?;
        let row = self.row_count(&parent);
        let ids = self.insert_rows(&parent, row, vec![data])?;
        Ok(ids[0])
    }

    /// Inserts `items` as consecutive children of `parent` starting at `row`.
    ///
    /// Returns the IDs of the new nodes.
    pub fn insert_rows(&self, parent: &ModelIndex, row: usize, items: Vec<T>) -> ModelResult<Vec<NodeId>> {
        let (parent_id, parent) = self.resolve_parent(parent)?;
        let count = self.storage.borrow().child_count(parent_id);
        if row > count {
            return Err(ModelError::OutOfRange { position: row, count });
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let last = row + items.len() - 1;
        self.base.begin_insert_rows(self, &parent, row, last)?;
        let ids = self.storage.borrow_mut().insert(parent_id, row, items);
        self.base.end_insert_rows(self)?;
        Ok(ids)
    }

    /// Removes `count` children of `parent` starting at `row`, together with
    /// their subtrees.
    ///
    /// Returns the data of the removed children, in order.
    pub fn remove_rows(&self, parent: &ModelIndex, row: usize, count: usize) -> ModelResult<Vec<T>> {
        let (parent_id, parent) = self.resolve_parent(parent)?;
        let child_count = self.storage.borrow().child_count(parent_id);
        if row + count > child_count {
            return Err(ModelError::OutOfRange {
                position: row + count,
                count: child_count,
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        self.base.begin_remove_rows(self, &parent, row, row + count - 1)?;
        let removed = {
            let mut storage = self.storage.borrow_mut();
            let ids = storage.detach(parent_id, row, count);
            ids.into_iter()
                .filter_map(|id| storage.remove_subtree(id))
                .collect()
        };
        self.base.end_remove_rows(self)?;
        Ok(removed)
    }

    /// Removes a node and all its descendants.
    ///
    /// Returns the removed node's data.
    pub fn remove(&self, id: NodeId) -> ModelResult<T> {
        let index = self.existing_index(id)?;
        let parent = self.parent(&index);
        self.remove_rows(&parent, index.row(), 1)?
            .pop()
            .ok_or(ModelError::NodeNotFound(id))
    }

    /// Moves `count` children of `src_parent` starting at `src_row` so that
    /// they end up before child `dst_child` of `dst_parent`.
    ///
    /// `dst_child` is counted before the move. Moving a range onto itself or
    /// into its own subtree fails with [`ModelError::MoveNotAllowed`].
    pub fn move_rows(
        &self,
        src_parent: &ModelIndex,
        src_row: usize,
        count: usize,
        dst_parent: &ModelIndex,
        dst_child: usize,
    ) -> ModelResult<()> {
        let (src_id, src_parent) = self.resolve_parent(src_parent)?;
        let (dst_id, dst_parent) = self.resolve_parent(dst_parent)?;
        {
            let storage = self.storage.borrow();
            let src_count = storage.child_count(src_id);
            if src_row + count > src_count {
                return Err(ModelError::OutOfRange {
                    position: src_row + count,
                    count: src_count,
                });
            }
            let dst_count = storage.child_count(dst_id);
            if dst_child > dst_count {
                return Err(ModelError::OutOfRange {
                    position: dst_child,
                    count: dst_count,
                });
            }
        }
        if count == 0 {
            return Ok(());
        }

        let src_last = src_row + count - 1;
        self.base
            .begin_move_rows(self, &src_parent, src_row, src_last, &dst_parent, dst_child)?;
        {
            let mut storage = self.storage.borrow_mut();
            let ids = storage.detach(src_id, src_row, count);
            let row = if src_id == dst_id && dst_child > src_row {
                dst_child - count
            } else {
                dst_child
            };
            storage.attach(dst_id, row, &ids);
        }
        self.base.end_move_rows(self)?;
        Ok(())
    }

    /// Reorders the children of `parent` with a stable sort.
    ///
    /// Persistent indexes to the children follow them to their new rows.
    pub fn sort_children_by<F>(&self, parent: &ModelIndex, mut compare: F) -> ModelResult<()>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let (parent_id, _) = self.resolve_parent(parent)?;

        self.base.begin_layout_change();
        let (old, new) = {
            let mut storage = self.storage.borrow_mut();
            let old = storage.children_of(parent_id).to_vec();
            let mut new = old.clone();
            new.sort_by(|a, b| match (storage.nodes.get(a), storage.nodes.get(b)) {
                (Some(a), Some(b)) => compare(&a.data, &b.data),
                _ => Ordering::Equal,
            });
            if let Some(children) = storage.children_mut(parent_id) {
                children.clone_from(&new);
            }
            (old, new)
        };

        let new_rows: HashMap<NodeId, usize> = new.iter().enumerate().map(|(row, &id)| (id, row)).collect();
        let mut from = Vec::new();
        let mut to = Vec::new();
        for (old_row, id) in old.iter().enumerate() {
            let Some(&new_row) = new_rows.get(id) else {
                continue;
            };
            if old_row == new_row {
                continue;
            }
            for column in 0..self.column_count {
                from.push(ModelIndex::with_internal_id(old_row, column, *id));
                to.push(ModelIndex::with_internal_id(new_row, column, *id));
            }
        }
        let result = self.base.change_persistent_index_list(&from, &to);
        self.base.end_layout_change();
        result.map(|_| ())
    }

    /// Removes every node, invalidating all persistent indexes.
    pub fn clear(&self) {
        self.base.begin_reset_model();
        {
            let mut storage = self.storage.borrow_mut();
            storage.nodes.clear();
            storage.root_children.clear();
        }
        self.base.end_reset_model();
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Returns the number of root-level nodes.
    pub fn root_count(&self) -> usize {
        self.storage.borrow().root_children.len()
    }

    /// Returns the total number of nodes.
    pub fn node_count(&self) -> usize {
        self.storage.borrow().nodes.len()
    }

    /// Returns `true` if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.storage.borrow().root_children.is_empty()
    }

    /// Returns the IDs of the children of `parent_id`, or of the root nodes
    /// for `None`.
    pub fn children(&self, parent_id: Option<NodeId>) -> Vec<NodeId> {
        self.storage.borrow().children_of(parent_id).to_vec()
    }

    /// Returns the parent of a node, `None` for root nodes and unknown IDs.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.storage.borrow().parent_of(id)
    }

    /// Provides read access to a node's data.
    pub fn with_node<F, R>(&self, id: NodeId, f: F) -> Option<R>
    where
        F: FnOnce(&T) -> R,
    {
        let storage = self.storage.borrow();
        storage.nodes.get(&id).map(|node| f(&node.data))
    }

    /// Returns the column 0 index of a node, or an invalid index if the node
    /// does not exist.
    pub fn index_for_node(&self, id: NodeId) -> ModelIndex {
        let storage = self.storage.borrow();
        match storage.row_of(id) {
            Some(row) => ModelIndex::with_internal_id(row, 0, id),
            None => ModelIndex::invalid(),
        }
    }

    /// Returns the node an index points at.
    pub fn node_id(&self, index: &ModelIndex) -> Option<NodeId> {
        if !index.is_valid() {
            return None;
        }
        let id = index.internal_id();
        self.storage.borrow().nodes.contains_key(&id).then_some(id)
    }

    fn existing_index(&self, id: NodeId) -> ModelResult<ModelIndex> {
        let index = self.index_for_node(id);
        if index.is_valid() {
            Ok(index)
        } else {
            Err(ModelError::NodeNotFound(id))
        }
    }

    /// Maps a parent index to its node and its canonical column 0 index.
    fn resolve_parent(&self, parent: &ModelIndex) -> ModelResult<(Option<NodeId>, ModelIndex)> {
        if !parent.is_valid() {
            return Ok((None, ModelIndex::invalid()));
        }
        let id = parent.internal_id();
        let canonical = self.index_for_node(id);
        if canonical.is_valid() {
            Ok((Some(id), canonical))
        } else {
            Err(ModelError::ParentNotFound(*parent))
        }
    }

    fn parent_node_id(&self, parent: &ModelIndex) -> Option<NodeId> {
        if parent.is_valid() {
            Some(parent.internal_id())
        } else {
            None
        }
    }
}

impl<T> Default for TreeModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IndexResolver for TreeModel<T> {
    fn row_count(&self, parent: &ModelIndex) -> usize {
        let storage = self.storage.borrow();
        storage.child_count(self.parent_node_id(parent))
    }

    fn column_count(&self, _parent: &ModelIndex) -> usize {
        self.column_count
    }

    fn index(&self, row: usize, column: usize, parent: &ModelIndex) -> ModelIndex {
        if column >= self.column_count {
            return ModelIndex::invalid();
        }

        let storage = self.storage.borrow();
        let parent_id = self.parent_node_id(parent);

        match storage.child_at(parent_id, row) {
            Some(child_id) => ModelIndex::with_internal_id(row, column, child_id),
            None => ModelIndex::invalid(),
        }
    }

    fn parent(&self, index: &ModelIndex) -> ModelIndex {
        if !index.is_valid() {
            return ModelIndex::invalid();
        }

        let storage = self.storage.borrow();
        let Some(parent_id) = storage.parent_of(index.internal_id()) else {
            return ModelIndex::invalid();
        };

        match storage.row_of(parent_id) {
            Some(row) => ModelIndex::with_internal_id(row, 0, parent_id),
            None => ModelIndex::invalid(),
        }
    }
}

impl<T> ItemModel for TreeModel<T> {
    fn base(&self) -> &ModelBase {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: ModelIndex = ModelIndex::invalid();

    fn model() -> TreeModel<String> {
        TreeModel::with_config(PersistenceConfig::lenient())
    }

    fn name(model: &TreeModel<String>, index: &ModelIndex) -> Option<String> {
        model.node_id(index).and_then(|id| model.with_node(id, Clone::clone))
    }

    #[test]
    fn test_tree_model_basic() {
        let model = model();
        model.add_root("Documents".into()).unwrap();

        assert_eq!(model.root_count(), 1);
        assert_eq!(model.row_count(&ROOT), 1);

        let index = model.index(0, 0, &ROOT);
        assert!(index.is_valid());
        assert_eq!(name(&model, &index).as_deref(), Some("Documents"));
        assert!(!model.index(1, 0, &ROOT).is_valid());
        assert!(!model.index(0, 1, &ROOT).is_valid());
    }

    #[test]
    fn test_tree_model_hierarchy() {
        let model = model();
        let root = model.add_root("Root".into()).unwrap();
        let child1 = model.add_child(root, "Child1".into()).unwrap();
        model.add_child(root, "Child2".into()).unwrap();
        model.add_child(child1, "Grandchild".into()).unwrap();

        let root_index = model.index(0, 0, &ROOT);
        assert_eq!(model.row_count(&root_index), 2);

        let child1_index = model.index(0, 0, &root_index);
        assert_eq!(name(&model, &child1_index).as_deref(), Some("Child1"));
        assert_eq!(model.row_count(&child1_index), 1);

        let grandchild_index = model.index(0, 0, &child1_index);
        assert_eq!(name(&model, &grandchild_index).as_deref(), Some("Grandchild"));

        let parent = model.parent(&grandchild_index);
        assert_eq!(parent, child1_index);
        assert_eq!(model.depth(&grandchild_index), 2);
        assert!(model.is_descendant_of(&grandchild_index, &root_index));
    }

    #[test]
    fn test_tree_model_remove() {
        let model = model();
        let root = model.add_root("Root".into()).unwrap();
        let child = model.add_child(root, "Child".into()).unwrap();
        model.add_child(child, "Grandchild".into()).unwrap();

        let root_index = model.index(0, 0, &ROOT);
        assert_eq!(model.row_count(&root_index), 1);

        assert_eq!(model.remove(child).unwrap(), "Child");
        assert_eq!(model.row_count(&root_index), 0);
        assert_eq!(model.node_count(), 1);
        assert_eq!(model.remove(child), Err(ModelError::NodeNotFound(child)));
    }

    #[test]
    fn test_tree_model_clear() {
        let model = model();
        model.add_root("Root1".into()).unwrap();
        model.add_root("Root2".into()).unwrap();
        let handle = model.persistent_index(1, 0, &ROOT);

        model.clear();
        assert!(model.is_empty());
        assert_eq!(model.node_count(), 0);
        assert!(!handle.is_valid());
        assert!(!handle.is_attached());
    }

    #[test]
    fn test_insert_rows_out_of_range() {
        let model = model();
        model.add_root("a".into()).unwrap();
        assert_eq!(
            model.insert_rows(&ROOT, 3, vec!["b".into()]),
            Err(ModelError::OutOfRange { position: 3, count: 1 })
        );
    }

    #[test]
    fn test_stale_parent_is_rejected() {
        let model = model();
        let root = model.add_root("a".into()).unwrap();
        let parent = model.index_for_node(root);
        model.remove(root).unwrap();

        assert_eq!(
            model.insert_rows(&parent, 0, vec!["b".into()]),
            Err(ModelError::ParentNotFound(parent))
        );
    }

    #[test]
    fn test_parent_in_other_column_is_normalized() {
        let model = model().with_columns(3);
        let root = model.add_root("a".into()).unwrap();
        model.add_child(root, "x".into()).unwrap();
        let handle = model.persistent_index(0, 2, &model.index_for_node(root));

        // A column 2 parent still addresses the same node.
        let parent = model.index(0, 2, &ROOT);
        model.insert_rows(&parent, 0, vec!["w".into()]).unwrap();

        assert_eq!(handle.row(), 1);
        assert_eq!(handle.column(), 2);
    }

    #[test]
    fn test_move_rows_between_parents() {
        let model = model();
        let a = model.add_root("a".into()).unwrap();
        let b = model.add_root("b".into()).unwrap();
        let a0 = model.add_child(a, "a0".into()).unwrap();
        let a1 = model.add_child(a, "a1".into()).unwrap();
        model.add_child(b, "b0".into()).unwrap();

        let moved = model.persistent_index(0, 0, &model.index_for_node(a));
        let stays = model.persistent_index(1, 0, &model.index_for_node(a));

        model
            .move_rows(&model.index_for_node(a), 0, 1, &model.index_for_node(b), 1)
            .unwrap();

        assert_eq!(model.children(Some(b)).len(), 2);
        assert_eq!(model.parent_of(a0), Some(b));
        assert_eq!(model.node_id(&moved.index()), Some(a0));
        assert_eq!(moved.row(), 1);
        assert_eq!(model.node_id(&stays.index()), Some(a1));
        assert_eq!(stays.row(), 0);
    }

    #[test]
    fn test_move_into_own_subtree_is_rejected() {
        let model = model();
        let a = model.add_root("a".into()).unwrap();
        let child = model.add_child(a, "child".into()).unwrap();

        let result = model.move_rows(&ROOT, 0, 1, &model.index_for_node(child), 0);
        assert!(matches!(result, Err(ModelError::MoveNotAllowed { .. })));
        assert_eq!(model.parent_of(child), Some(a));
        assert_eq!(model.base().pending_changes(), 0);
    }

    #[test]
    fn test_sort_children_by() {
        let model = model();
        for name in ["c", "a", "b"] {
            model.add_root(name.into()).unwrap();
        }
        let c = model.persistent_index(0, 0, &ROOT);
        let a = model.persistent_index(1, 0, &ROOT);
        let b = model.persistent_index(2, 0, &ROOT);

        model.sort_children_by(&ROOT, |x, y| x.cmp(y)).unwrap();

        assert_eq!((a.row(), b.row(), c.row()), (0, 1, 2));
        assert_eq!(name(&model, &a.index()).as_deref(), Some("a"));
        assert_eq!(model.persistent_index_list().len(), 3);
    }
}
