//! Lifecycle signals a transport handle reports about itself.

use std::fmt;
use std::str::FromStr;

/// Why a transport connection went away.
///
/// The string forms match the reasons a Socket.IO style client reports,
/// so logs read the same on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The server closed the connection on purpose.
    ServerDisconnect,
    /// This side called `disconnect()`.
    ClientDisconnect,
    /// No traffic arrived within the keep-alive window.
    PingTimeout,
    /// The underlying stream ended without a close handshake.
    TransportClose,
    /// The underlying stream failed, or the connection could not be opened.
    TransportError,
}

impl DisconnectReason {
    /// Returns `true` when the transport itself dropped the connection, as
    /// opposed to a deliberate close by either side.
    ///
    /// Only transport-initiated disconnects are worth reconnecting.
    pub fn is_transport_initiated(self) -> bool {
        matches!(
            self,
            Self::PingTimeout | Self::TransportClose | Self::TransportError
        )
    }

    /// The wire-compatible reason string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServerDisconnect => "io server disconnect",
            Self::ClientDisconnect => "io client disconnect",
            Self::PingTimeout => "ping timeout",
            Self::TransportClose => "transport close",
            Self::TransportError => "transport error",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown disconnect reason string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown disconnect reason: {0}")]
pub struct UnknownReason(pub String);

impl FromStr for DisconnectReason {
    type Err = UnknownReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "io server disconnect" => Ok(Self::ServerDisconnect),
            "io client disconnect" => Ok(Self::ClientDisconnect),
            "ping timeout" => Ok(Self::PingTimeout),
            "transport close" => Ok(Self::TransportClose),
            "transport error" => Ok(Self::TransportError),
            other => Err(UnknownReason(other.to_string())),
        }
    }
}

/// A change in a handle's connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSignal {
    /// The connection is open.
    ///
    /// `recovered` is `true` when the server restored the previous
    /// connection's state (rooms, missed packets), so nothing needs to be
    /// replayed.
    Connected { recovered: bool },
    /// The connection closed.
    Disconnected(DisconnectReason),
}
