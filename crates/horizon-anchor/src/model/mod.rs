//! Item models with persistent index tracking.
//!
//! This module provides the foundational types for addressing items in a
//! hierarchical model and for keeping those addresses valid while the model
//! changes shape:
//!
//! - `ModelIndex`: A transient `(row, column, parent)` address
//! - `PersistentModelIndex`: An address that follows its item across
//!   inserts, removes and moves
//! - `IndexResolver` / `ItemModel`: The traits that models implement
//! - `ModelBase`: Begin/end bracket API that drives the registry and signals
//! - `PersistentRegistry`: Bookkeeping for every live persistent index
//!
//! # Model Implementations
//!
//! - `TreeModel`: Hierarchical tree of nodes
//! - `TableModel`: 2D grid with movable rows and columns
//!
//! # Example
//!
//! ```
//! use horizon_anchor::model::{ItemModel, ModelIndex, TreeModel};
//!
//! let model = TreeModel::new();
//! let docs = model.add_root("docs").unwrap();
//! let readme = model.add_child(docs, "README").unwrap();
//!
//! let handle = model.persistent_index(0, 0, &model.index_for_node(docs));
//!
//! // Inserting before the item shifts the handle with it.
//! model.insert_rows(&model.index_for_node(docs), 0, vec!["LICENSE"]).unwrap();
//! assert_eq!(handle.row(), 1);
//! assert_eq!(model.node_id(&handle.index()), Some(readme));
//!
//! // Removing the parent invalidates it.
//! model.remove(docs).unwrap();
//! assert!(!handle.is_valid());
//! ```
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────┐ begin/end ┌─────────────┐  relocate  ┌────────────────────┐
//! │    Model    │──────────>│  ModelBase  │───────────>│ PersistentRegistry │
//! │ (ItemModel) │           │  + signals  │            │      records       │
//! └─────────────┘           └─────────────┘            └────────────────────┘
//!       ^                                                        ^
//!       │ index()/parent()                                       │ shared record
//!       └──────────────── PersistentModelIndex ──────────────────┘
//! ```

mod base;
mod config;
mod error;
mod index;
mod persistent;
mod protocol;
mod registry;
mod table_model;
mod traits;
mod tree_model;

pub use base::ModelBase;
pub use config::{PersistenceConfig, ResolveFailurePolicy};
pub use error::{ChangeKind, ModelError, ModelResult, MutationReport, UnresolvedIndex};
pub use index::ModelIndex;
pub use persistent::PersistentModelIndex;
pub use registry::{PersistentRegistry, RecordKey};
pub use table_model::TableModel;
pub use traits::{IndexResolver, ItemModel, ModelSignals, Orientation};
pub use tree_model::{NodeId, TreeModel};
