//! Signal/slot system for Horizon Anchor.
//!
//! This module provides a type-safe, Qt-inspired signal/slot mechanism used by
//! item models to announce structural changes. Signals are emitted before and
//! after every mutation, and connected slots (callbacks) are invoked in
//! response.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The main signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//! - [`ConnectionGuard`] - RAII guard that disconnects when dropped
//!
//! # Threading
//!
//! Signals are single-threaded: they are neither `Send` nor `Sync`, and slots
//! are plain `Fn(&Args)` closures invoked directly on the emitting thread.
//!
//! # Reentrancy
//!
//! Emission takes a snapshot of the connected slots before invoking any of
//! them. A slot may therefore connect or disconnect slots, emit other signals,
//! or perform a nested model mutation that emits this same signal again.
//! Connections made during an emission are not invoked by that emission.
//!
//! # Example
//!
//! ```
//! use horizon_anchor_core::Signal;
//!
//! // Create a signal that passes a string argument
//! let text_changed = Signal::<String>::new();
//!
//! // Connect a slot (closure)
//! let conn_id = text_changed.connect(|text| {
//!     println!("Text changed to: {}", text);
//! });
//!
//! // Emit the signal
//! text_changed.emit("Hello, World!".to_string());
//!
//! // Disconnect when done
//! text_changed.disconnect(conn_id);
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    /// The ID remains valid until the connection is explicitly disconnected or
    /// the signal is dropped.
    pub struct ConnectionId;
}

type Slot<Args> = Rc<dyn Fn(&Args)>;
type Connections<Args> = RefCell<SlotMap<ConnectionId, Slot<Args>>>;

/// A type-safe signal that can have multiple connected slots.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments, or a tuple like `(ModelIndex, usize, usize)` for
///   multiple arguments.
pub struct Signal<Args> {
    /// All active connections. Shared with [`ConnectionGuard`]s.
    connections: Rc<Connections<Args>>,
    /// Whether signal emission is temporarily blocked.
    blocked: Cell<bool>,
}

static_assertions::assert_not_impl_any!(Signal<()>: Send, Sync);

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Rc::new(RefCell::new(SlotMap::with_key())),
            blocked: Cell::new(false),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    ///
    /// # Example
    ///
    /// ```
    /// use horizon_anchor_core::Signal;
    ///
    /// let signal = Signal::<String>::new();
    /// let id = signal.connect(|s| println!("Got: {}", s));
    /// signal.emit("Hello".to_string());
    /// ```
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + 'static,
    {
        self.connections.borrow_mut().insert(Rc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.borrow_mut().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.borrow_mut().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.borrow().len()
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, calls to `emit()` will do nothing.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.set(blocked);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.get()
    }

    /// Emit the signal, invoking all connected slots in connection order.
    ///
    /// If the signal is blocked, this does nothing.
    #[tracing::instrument(skip_all, target = "horizon_anchor_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        // Snapshot so slots may reenter this signal.
        let slots: Vec<Slot<Args>> = self.connections.borrow().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");

        for slot in slots {
            slot(&args);
        }
    }

    /// Connect a slot with automatic disconnection when the guard is dropped.
    ///
    /// The guard only holds a weak link to the connection table, so it may
    /// safely outlive the signal.
    pub fn connect_scoped<F>(&self, slot: F) -> ConnectionGuard<Args>
    where
        F: Fn(&Args) + 'static,
    {
        let id = self.connect(slot);
        ConnectionGuard {
            connections: Rc::downgrade(&self.connections),
            id,
        }
    }
}

/// RAII guard that disconnects a slot when dropped.
///
/// # Example
///
/// ```
/// use horizon_anchor_core::Signal;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let signal = Signal::<i32>::new();
/// let total = Rc::new(Cell::new(0));
/// {
///     let total = total.clone();
///     let _guard = signal.connect_scoped(move |&n| total.set(total.get() + n));
///     signal.emit(42);
/// }
/// signal.emit(43); // Nothing happens - connection was dropped
/// assert_eq!(total.get(), 42);
/// ```
pub struct ConnectionGuard<Args> {
    connections: Weak<Connections<Args>>,
    id: ConnectionId,
}

impl<Args> ConnectionGuard<Args> {
    /// The ID of the guarded connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl<Args> Drop for ConnectionGuard<Args> {
    fn drop(&mut self) {
        if let Some(connections) = self.connections.upgrade() {
            connections.borrow_mut().remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_connect_emit() {
        let signal = Signal::<i32>::new();
        let received = Rc::new(RefCell::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.borrow_mut().push(value);
        });

        signal.emit(42);
        signal.emit(100);

        assert_eq!(*received.borrow(), vec![42, 100]);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal = Signal::<i32>::new();
        let received = Rc::new(RefCell::new(Vec::new()));

        let received_clone = received.clone();
        let conn_id = signal.connect(move |&value| {
            received_clone.borrow_mut().push(value);
        });

        signal.emit(1);
        assert!(signal.disconnect(conn_id));
        assert!(!signal.disconnect(conn_id));
        signal.emit(2);

        assert_eq!(*received.borrow(), vec![1]);
    }

    #[test]
    fn test_signal_blocked() {
        let signal = Signal::<()>::new();
        let count = Rc::new(Cell::new(0));

        let count_clone = count.clone();
        signal.connect(move |_| count_clone.set(count_clone.get() + 1));

        signal.set_blocked(true);
        signal.emit(());
        assert_eq!(count.get(), 0);

        signal.set_blocked(false);
        signal.emit(());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_slot_can_reenter_signal() {
        let signal = Rc::new(Signal::<u32>::new());
        let received = Rc::new(RefCell::new(Vec::new()));

        let weak = Rc::downgrade(&signal);
        let received_clone = received.clone();
        signal.connect(move |&depth| {
            received_clone.borrow_mut().push(depth);
            if depth < 3 {
                if let Some(signal) = weak.upgrade() {
                    signal.emit(depth + 1);
                }
            }
        });

        signal.emit(0);
        assert_eq!(*received.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_slot_connecting_during_emit_is_deferred() {
        let signal = Rc::new(Signal::<()>::new());
        let late_calls = Rc::new(Cell::new(0));

        let weak = Rc::downgrade(&signal);
        let late = late_calls.clone();
        signal.connect(move |_| {
            if let Some(signal) = weak.upgrade() {
                let late = late.clone();
                signal.connect(move |_| late.set(late.get() + 1));
            }
        });

        signal.emit(());
        assert_eq!(late_calls.get(), 0);
        assert_eq!(signal.connection_count(), 2);
    }

    #[test]
    fn test_connection_guard() {
        let signal = Signal::<i32>::new();
        let total = Rc::new(Cell::new(0));

        {
            let total = total.clone();
            let _guard = signal.connect_scoped(move |&n| total.set(total.get() + n));
            assert_eq!(signal.connection_count(), 1);
            signal.emit(5);
        }

        assert_eq!(signal.connection_count(), 0);
        signal.emit(7);
        assert_eq!(total.get(), 5);
    }

    #[test]
    fn test_connection_guard_outlives_signal() {
        let guard;
        {
            let signal = Signal::<()>::new();
            guard = signal.connect_scoped(|_| {});
        }
        drop(guard);
    }
}
