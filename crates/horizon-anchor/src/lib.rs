//! Horizon Anchor - persistent model indexes for Rust item models.
//!
//! This is the main crate. It re-exports the core signal and logging
//! facilities and provides the [`model`] module with the persistent index
//! registry, the begin/end mutation protocol and ready-made tree and table
//! models.
//!
//! # Example
//!
//! ```
//! use horizon_anchor::prelude::*;
//!
//! let model: TableModel<&str> = TableModel::new(3, 1);
//! model.set(1, 0, "tracked").unwrap();
//! let cell = model.persistent_index(1, 0, &ModelIndex::invalid());
//!
//! model.move_rows(1, 1, 3).unwrap();
//!
//! assert_eq!(cell.row(), 2);
//! assert_eq!(model.get(cell.row(), 0), Some("tracked"));
//! ```

pub use horizon_anchor_core::*;

pub mod model;
pub mod prelude;
