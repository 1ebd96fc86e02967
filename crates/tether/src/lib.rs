//! # Tether
//!
//! One shared realtime connection, many independent session views.
//!
//! An application usually has many parts that each want to listen to the
//! server and join channels, but it should hold exactly one connection per
//! signed-in (tenant, user). Tether owns that connection, hands each part
//! its own view, and keeps every view's joins and callbacks intact across
//! reconnects, credential expiry, and tenant switches.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether::prelude::*;
//!
//! # fn main() -> Result<(), TetherError> {
//! tether::init_tracing();
//!
//! let store = MemoryStore::new();
//! // store.set(TOKEN_KEY, ...) after login
//!
//! let client = TetherClientBuilder::new(store)
//!     .config_from_env()?
//!     .build()?;
//!
//! let view = client.acquire(Some(TenantId::from(17u64)));
//! view.subscribe("message", Listener::new(|args| println!("{args:?}")));
//! view.send("joinTicket", &[Value::from(42)]);
//! // ...
//! view.dispose();
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - [`protocol`]: identity, event names, wire frames
//! - [`transport`]: the handle and connector traits, WebSocket client
//! - [`session`]: registry, views, credential gate

mod client;
mod config;
mod error;
mod telemetry;

pub use client::{TetherClient, TetherClientBuilder};
pub use config::{
    BACKEND_URL, ConfigFromEnv, EXPIRY_SKEW_MS, PING_INTERVAL_MS, PING_TIMEOUT_MS,
    RELOAD_DELAY_MS,
};
pub use error::TetherError;
pub use telemetry::init_tracing;

pub use tether_protocol as protocol;
pub use tether_session as session;
pub use tether_transport as transport;

/// Common imports for applications using Tether.
pub mod prelude {
    pub use crate::{ConfigFromEnv, TetherClient, TetherClientBuilder, TetherError, init_tracing};
    pub use tether_protocol::{EventName, LifecycleEvent, TenantId, UserId, Value};
    pub use tether_session::{
        CredentialStore, EventSession, HandleState, MemoryStore, RegistryConfig, Reloader, View,
        TOKEN_KEY, USER_ID_KEY,
    };
    pub use tether_transport::{DisconnectReason, Listener};
}
