//! Wire-level vocabulary for Tether.
//!
//! This crate defines what the rest of the workspace talks about:
//!
//! - **Identity** ([`TenantId`], [`UserId`], [`TenantKey`]) — which
//!   logical connection a session view belongs to.
//! - **Events** ([`EventName`], [`LifecycleEvent`], [`Subscription`]) —
//!   reserved lifecycle names versus application events, and the
//!   `join`/`leave` subscription convention.
//! - **Frames** ([`Frame`], [`Codec`], [`JsonCodec`]) — how an event is
//!   laid out on the wire.
//!
//! ```text
//! Transport (bytes) → Protocol (Frame, EventName) → Session (views, replay)
//! ```

mod codec;
mod error;
mod event;
mod identity;

pub use codec::{Codec, Frame};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{EventName, LifecycleEvent, Subscription, JOIN_PREFIX, LEAVE_PREFIX};
pub use identity::{TenantId, TenantKey, UserId};

/// Re-exported so consumers can build event arguments without naming
/// `serde_json` themselves.
pub use serde_json::Value;
