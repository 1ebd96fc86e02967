//! The transport handle's state machine.
//!
//! ```text
//!                 ConnectRequested
//!  Disconnected ───────────────────→ Connecting
//!       ↑                                │
//!       │                 Connected { recovered: false }
//!       │                                ▼              (action: Rebind)
//!       │ Disconnected          ConnectedRecovering
//!       │                                │ Ready
//!       │                                ▼              (action: Rejoin)
//!       └──────────────────────── ConnectedReady
//!                                        ↑
//!           Connected { recovered: true } (no action: state was kept)
//! ```
//!
//! Replay happens only as a transition action. `Rebind` re-attaches every
//! view's callbacks the moment the socket is open again, `Rejoin` re-sends
//! every view's joins once the server says it is ready, so callbacks are
//! always in place before any join acknowledgment can arrive.

use std::fmt;

/// Where the live handle is in its connect/ready cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandleState {
    /// No connection and no attempt in flight.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Open, but the server has not finished its post-connect handshake.
    ConnectedRecovering,
    /// Open and ready for joins.
    ConnectedReady,
}

/// Inputs to [`HandleState::on_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleEvent {
    /// The registry asked the handle to connect.
    ConnectRequested,
    /// The transport reported an open connection.
    Connected { recovered: bool },
    /// The server sent its ready event.
    Ready,
    /// The transport reported a closed connection.
    Disconnected,
}

/// Work to perform on entry to the new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to replay.
    None,
    /// Detach then re-attach every recorded callback binding.
    Rebind,
    /// Re-send a join for every recorded subscription.
    Rejoin,
}

impl HandleState {
    /// Applies `event` and returns the next state plus its entry action.
    pub fn on_event(self, event: HandleEvent) -> (Self, Transition) {
        use HandleEvent as E;
        use HandleState as S;

        match (self, event) {
            (_, E::Disconnected) => (S::Disconnected, Transition::None),

            (S::Disconnected, E::ConnectRequested) => (S::Connecting, Transition::None),
            (state, E::ConnectRequested) => (state, Transition::None),

            (_, E::Connected { recovered: true }) => (S::ConnectedReady, Transition::None),
            (_, E::Connected { recovered: false }) => {
                (S::ConnectedRecovering, Transition::Rebind)
            }

            (S::ConnectedRecovering, E::Ready) => (S::ConnectedReady, Transition::Rejoin),
            // A ready outside the recovering window changes nothing.
            (state, E::Ready) => (state, Transition::None),
        }
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::ConnectedRecovering => write!(f, "ConnectedRecovering"),
            Self::ConnectedReady => write!(f, "ConnectedReady"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_disconnected() {
        assert_eq!(HandleState::default(), HandleState::Disconnected);
    }

    #[test]
    fn test_connect_requested_from_disconnected_starts_connecting() {
        assert_eq!(
            HandleState::Disconnected.on_event(HandleEvent::ConnectRequested),
            (HandleState::Connecting, Transition::None)
        );
    }

    #[test]
    fn test_connect_requested_while_connected_is_ignored() {
        assert_eq!(
            HandleState::ConnectedReady.on_event(HandleEvent::ConnectRequested),
            (HandleState::ConnectedReady, Transition::None)
        );
    }

    #[test]
    fn test_fresh_connect_rebinds_then_ready_rejoins() {
        let (state, action) = HandleState::Connecting
            .on_event(HandleEvent::Connected { recovered: false });
        assert_eq!(state, HandleState::ConnectedRecovering);
        assert_eq!(action, Transition::Rebind);

        let (state, action) = state.on_event(HandleEvent::Ready);
        assert_eq!(state, HandleState::ConnectedReady);
        assert_eq!(action, Transition::Rejoin);
    }

    #[test]
    fn test_recovered_connect_skips_replay() {
        assert_eq!(
            HandleState::Connecting.on_event(HandleEvent::Connected { recovered: true }),
            (HandleState::ConnectedReady, Transition::None)
        );
    }

    #[test]
    fn test_duplicate_ready_does_not_rejoin() {
        assert_eq!(
            HandleState::ConnectedReady.on_event(HandleEvent::Ready),
            (HandleState::ConnectedReady, Transition::None)
        );
    }

    #[test]
    fn test_disconnect_from_any_state() {
        for state in [
            HandleState::Disconnected,
            HandleState::Connecting,
            HandleState::ConnectedRecovering,
            HandleState::ConnectedReady,
        ] {
            assert_eq!(
                state.on_event(HandleEvent::Disconnected),
                (HandleState::Disconnected, Transition::None)
            );
        }
    }
}
