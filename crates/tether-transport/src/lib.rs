//! Transport abstraction layer for Tether.
//!
//! Provides the [`TransportHandle`] trait (one physical, bidirectional
//! event connection) and the [`Connector`] trait that opens handles. The
//! session layer only ever talks to these traits, so the wire mechanism
//! can be swapped, and tests can substitute an in-memory handle.
//!
//! A handle is callback driven: calls never block, inbound events reach
//! listeners registered with [`TransportHandle::on`], and connection state
//! changes reach [`TransportHandle::on_signal`] listeners.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket client via `tokio-tungstenite`

mod error;
mod listener;
mod options;
mod signal;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use listener::{AnyListener, Emitter, Listener, SignalListener};
pub use options::{ConnectOptions, TransportKind};
pub use signal::{DisconnectReason, TransportSignal, UnknownReason};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnector, WebSocketHandle};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a transport handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One physical event connection to the remote endpoint.
///
/// Every method returns immediately. Implementations must not invoke
/// listeners synchronously from inside these calls.
pub trait TransportHandle: Send + Sync + 'static {
    /// Returns the unique identifier for this handle.
    fn id(&self) -> ConnectionId;

    /// Starts connecting (or reconnecting). A no-op while a connection
    /// attempt or an open connection is already in progress.
    fn connect(&self);

    /// Closes the connection. Reports
    /// [`DisconnectReason::ClientDisconnect`] if one was open.
    fn disconnect(&self);

    /// Returns `true` while the connection is open.
    fn is_connected(&self) -> bool;

    /// Sends an event. Events sent while offline are buffered until the
    /// next open.
    fn emit(&self, event: &str, args: &[Value]);

    /// Registers `listener` for inbound `event`.
    fn on(&self, event: &str, listener: Listener);

    /// Registers `listener` for the next inbound `event` only.
    fn once(&self, event: &str, listener: Listener);

    /// Removes one registration of `listener` for `event`.
    fn off(&self, event: &str, listener: &Listener);

    /// Registers a tap that sees every inbound event.
    fn on_any(&self, tap: AnyListener);

    /// Registers a listener for connection state changes.
    fn on_signal(&self, listener: SignalListener);

    /// Removes every listener, tap, and signal listener.
    fn remove_all_listeners(&self);
}

/// Opens transport handles.
pub trait Connector: Send + Sync + 'static {
    /// Creates a handle for `options`. The handle starts disconnected;
    /// the caller decides when to call [`TransportHandle::connect`].
    ///
    /// # Errors
    /// Returns [`TransportError`] when the options cannot be honoured
    /// (bad URL, no supported transport kind).
    fn open(
        &self,
        options: ConnectOptions,
    ) -> Result<Arc<dyn TransportHandle>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_next_is_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b.into_inner() > a.into_inner());
    }
}
