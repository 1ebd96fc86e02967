//! Event naming: lifecycle vs application events, and the join/leave
//! convention for subscriptions.
//!
//! Two event names are reserved by the connection lifecycle and never
//! travel to the remote endpoint as ordinary events: `connect` and
//! `ready`. Everything else is an application event the core forwards
//! without looking at its payload.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix marking an outbound event as a subscription declaration.
pub const JOIN_PREFIX: &str = "join";

/// Prefix of the retraction counterpart of a [`JOIN_PREFIX`] event.
pub const LEAVE_PREFIX: &str = "leave";

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// Connection lifecycle moments a consumer may wait for.
///
/// Both are routed to the registry's readiness mechanism instead of being
/// registered as handle listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// The transport connection was established.
    Connected,
    /// The server finished its post-connect handshake.
    Ready,
}

impl LifecycleEvent {
    /// The reserved wire name of this lifecycle event.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Connected => "connect",
            Self::Ready => "ready",
        }
    }
}

// ---------------------------------------------------------------------------
// EventName
// ---------------------------------------------------------------------------

/// An event name as a consumer passes it to a session view.
///
/// The split is resolved once, where the name enters the system, so the
/// rest of the core matches on a closed enum instead of comparing strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    /// One of the reserved lifecycle names.
    Lifecycle(LifecycleEvent),
    /// Any other event, forwarded verbatim.
    Application(String),
}

impl EventName {
    /// Classifies a raw event name.
    pub fn parse(name: &str) -> Self {
        match name {
            "connect" => Self::Lifecycle(LifecycleEvent::Connected),
            "ready" => Self::Lifecycle(LifecycleEvent::Ready),
            other => Self::Application(other.to_string()),
        }
    }

    /// Returns the wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Lifecycle(event) => event.wire_name(),
            Self::Application(name) => name,
        }
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<String> for EventName {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<LifecycleEvent> for EventName {
    fn from(event: LifecycleEvent) -> Self {
        Self::Lifecycle(event)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A join a consumer issued: the channel suffix plus its parameters.
///
/// `send("joinTicket", [42])` records `Subscription { channel: "Ticket",
/// params: [42] }`; it is re-sent as `joinTicket` after a reconnect and
/// retracted as `leaveTicket` when the owning view is disposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// The event name with the join prefix stripped.
    pub channel: String,
    /// Parameters exactly as the consumer sent them.
    pub params: Vec<Value>,
}

impl Subscription {
    /// Recognizes a join by its event name.
    ///
    /// Returns `None` for every event that does not carry the join prefix.
    pub fn from_join(event: &str, params: &[Value]) -> Option<Self> {
        event.strip_prefix(JOIN_PREFIX).map(|channel| Self {
            channel: channel.to_string(),
            params: params.to_vec(),
        })
    }

    /// The event that (re-)declares this subscription.
    pub fn join_event(&self) -> String {
        format!("{JOIN_PREFIX}{}", self.channel)
    }

    /// The event that retracts this subscription.
    pub fn leave_event(&self) -> String {
        format!("{LEAVE_PREFIX}{}", self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reserved_names_are_lifecycle() {
        assert_eq!(
            EventName::parse("connect"),
            EventName::Lifecycle(LifecycleEvent::Connected)
        );
        assert_eq!(
            EventName::parse("ready"),
            EventName::Lifecycle(LifecycleEvent::Ready)
        );
    }

    #[test]
    fn test_parse_other_names_are_application() {
        assert_eq!(
            EventName::parse("message"),
            EventName::Application("message".into())
        );
        // Matching is exact: prefixes of reserved names are ordinary events.
        assert!(matches!(
            EventName::parse("readyState"),
            EventName::Application(_)
        ));
    }

    #[test]
    fn test_event_name_round_trips_through_as_str() {
        for raw in ["connect", "ready", "ticket"] {
            assert_eq!(EventName::parse(raw).as_str(), raw);
        }
    }

    #[test]
    fn test_from_join_strips_prefix() {
        let sub = Subscription::from_join("joinTicket", &[json!(42)]).unwrap();
        assert_eq!(sub.channel, "Ticket");
        assert_eq!(sub.params, vec![json!(42)]);
        assert_eq!(sub.join_event(), "joinTicket");
        assert_eq!(sub.leave_event(), "leaveTicket");
    }

    #[test]
    fn test_from_join_ignores_other_events() {
        assert!(Subscription::from_join("message", &[]).is_none());
        assert!(Subscription::from_join("leaveTicket", &[json!(1)]).is_none());
    }

    #[test]
    fn test_from_join_bare_prefix_has_empty_channel() {
        let sub = Subscription::from_join("join", &[]).unwrap();
        assert_eq!(sub.channel, "");
        assert_eq!(sub.leave_event(), "leave");
    }
}
