//! Core systems for Horizon Anchor.
//!
//! This crate provides the foundational components shared by Horizon Anchor
//! item models:
//!
//! - **Signal/Slot System**: Single-threaded, reentrancy-safe notifications
//! - **Logging**: `tracing` targets, span names and performance spans
//!
//! # Signal/Slot Example
//!
//! ```
//! use horizon_anchor_core::Signal;
//!
//! // Create a signal that notifies when rows are inserted
//! let rows_inserted = Signal::<(usize, usize)>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = rows_inserted.connect(|(first, last)| {
//!     println!("Rows {}..={} inserted", first, last);
//! });
//!
//! // Emit the signal
//! rows_inserted.emit((3, 5));
//!
//! // Disconnect when done
//! rows_inserted.disconnect(conn_id);
//! ```

pub mod logging;
pub mod signal;

pub use logging::PerfSpan;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
