//! Callback identity and the listener table every handle dispatches through.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::TransportSignal;

/// Catch-all tap: sees every inbound event before regular listeners.
pub type AnyListener = Arc<dyn Fn(&str, &[Value]) + Send + Sync>;

/// Receives a handle's [`TransportSignal`]s.
pub type SignalListener = Arc<dyn Fn(&TransportSignal) + Send + Sync>;

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// An event callback with identity.
///
/// Cloning a `Listener` shares the same callback, and two listeners are
/// equal only when they are clones of each other. Consumers keep a clone
/// around to unsubscribe the exact callback they registered.
#[derive(Clone)]
pub struct Listener(Arc<dyn Fn(&[Value]) + Send + Sync>);

impl Listener {
    /// Wraps a closure.
    pub fn new(f: impl Fn(&[Value]) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invokes the callback.
    pub fn call(&self, args: &[Value]) {
        (self.0)(args)
    }

    /// Returns `true` if both listeners wrap the same callback.
    pub fn same_as(&self, other: &Listener) -> bool {
        // Compare data pointers only; vtable pointers are not unique.
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

struct Entry {
    event: String,
    listener: Listener,
    once: bool,
}

#[derive(Default)]
struct Table {
    entries: Vec<Entry>,
    taps: Vec<AnyListener>,
    signals: Vec<SignalListener>,
}

/// Listener table shared by transport handle implementations.
///
/// Callbacks are never invoked while the table is locked, so a callback
/// may freely register or remove listeners on the same emitter.
#[derive(Default)]
pub struct Emitter {
    table: Mutex<Table>,
}

impl Emitter {
    /// Creates an empty emitter.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `listener` for `event`.
    pub fn on(&self, event: &str, listener: Listener) {
        self.lock().entries.push(Entry {
            event: event.to_string(),
            listener,
            once: false,
        });
    }

    /// Registers `listener` for the next `event` only.
    pub fn once(&self, event: &str, listener: Listener) {
        self.lock().entries.push(Entry {
            event: event.to_string(),
            listener,
            once: true,
        });
    }

    /// Removes the first registration of `listener` for `event`.
    ///
    /// Returns `true` if something was removed.
    pub fn off(&self, event: &str, listener: &Listener) -> bool {
        let mut table = self.lock();
        match table
            .entries
            .iter()
            .position(|e| e.event == event && e.listener.same_as(listener))
        {
            Some(i) => {
                table.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// Registers a catch-all tap.
    pub fn on_any(&self, tap: AnyListener) {
        self.lock().taps.push(tap);
    }

    /// Registers a lifecycle signal listener.
    pub fn on_signal(&self, listener: SignalListener) {
        self.lock().signals.push(listener);
    }

    /// Drops every listener, tap, and signal listener.
    pub fn remove_all(&self) {
        *self.lock() = Table::default();
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().entries.iter().filter(|e| e.event == event).count()
    }

    /// Delivers an inbound event: taps first, then listeners in
    /// registration order. One-shot listeners are removed before the call.
    ///
    /// Returns the number of listeners (not taps) invoked.
    pub fn dispatch(&self, event: &str, args: &[Value]) -> usize {
        let (taps, listeners) = {
            let mut table = self.lock();
            let taps = table.taps.clone();
            let listeners: Vec<Listener> = table
                .entries
                .iter()
                .filter(|e| e.event == event)
                .map(|e| e.listener.clone())
                .collect();
            table.entries.retain(|e| !(e.once && e.event == event));
            (taps, listeners)
        };

        for tap in &taps {
            tap(event, args);
        }
        for listener in &listeners {
            listener.call(args);
        }
        listeners.len()
    }

    /// Delivers a lifecycle signal to every signal listener.
    pub fn signal(&self, signal: &TransportSignal) {
        let signals = self.lock().signals.clone();
        for listener in &signals {
            listener(signal);
        }
    }
}
