//! Prelude module for Horizon Anchor.
//!
//! This module re-exports the most commonly used types for convenient importing:
//!
//! ```ignore
//! use horizon_anchor::prelude::*;
//! ```
//!
//! This provides access to:
//! - Signal/slot system (`Signal`, `ConnectionId`)
//! - Index types (`ModelIndex`, `PersistentModelIndex`)
//! - Model traits and the mutation protocol (`ItemModel`, `ModelBase`)
//! - Ready-made models (`TreeModel`, `TableModel`)

// ============================================================================
// Signal/Slot System
// ============================================================================

pub use crate::signal::{ConnectionId, Signal};

// ============================================================================
// Indexes
// ============================================================================

pub use crate::model::{ModelIndex, Orientation, PersistentModelIndex};

// ============================================================================
// Model Traits and Protocol
// ============================================================================

pub use crate::model::{
    IndexResolver, ItemModel, ModelBase, ModelError, ModelResult, ModelSignals, MutationReport,
};
pub use crate::model::{PersistenceConfig, ResolveFailurePolicy};

// ============================================================================
// Models
// ============================================================================

pub use crate::model::{NodeId, TableModel, TreeModel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_types_exist() {
        let _signal: Signal<i32> = Signal::new();
        let _index = ModelIndex::invalid();
        let _handle = PersistentModelIndex::invalid();
        let _config = PersistenceConfig::lenient();

        let tree: TreeModel<u8> = TreeModel::new();
        let table: TableModel<u8> = TableModel::new(1, 1);
        assert_eq!(tree.row_count(&ModelIndex::invalid()), 0);
        assert_eq!(table.column_count(&ModelIndex::invalid()), 1);
    }
}
