//! Connection sessions for Tether.
//!
//! This crate reconciles three lifecycles that change independently:
//!
//! 1. **The transport** — one physical connection that drops and comes back
//! 2. **The credential** — a bearer token that expires ([`CredentialGate`])
//! 3. **The consumers** — many independent parts of an application, each
//!    joining channels and binding callbacks ([`SessionView`])
//!
//! [`ConnectionRegistry`] owns the single live handle. Consumers call
//! [`ConnectionRegistry::acquire`] and get a [`View`] that records what they
//! asked for, so that after a reconnect every callback is re-attached and
//! every join re-sent exactly once, and so that `dispose` retracts exactly
//! what that consumer added.
//!
//! # How it fits in the stack
//!
//! ```text
//! Application (above)  ← holds views, subscribes, sends joins
//!     ↕
//! Session Layer (this crate)  ← registry, views, replay, credential gate
//!     ↕
//! Transport Layer (below)  ← TransportHandle, Connector
//! ```

mod config;
mod credential;
mod error;
mod registry;
mod reload;
mod state;
mod store;
mod view;

pub use config::RegistryConfig;
pub use credential::{Clock, Credential, CredentialGate, SystemClock};
pub use error::SessionError;
pub use registry::{ConnectionRegistry, RegistryBuilder};
pub use reload::Reloader;
pub use state::{HandleEvent, HandleState, Transition};
pub use store::{CredentialStore, MemoryStore, TOKEN_KEY, USER_ID_KEY};
pub use view::{EventSession, InertView, SessionView, View};
