//! The WebSocket-backed client and its builder.

use tether_session::{
    Clock, ConnectionRegistry, CredentialStore, RegistryBuilder, RegistryConfig, Reloader,
};
use tether_transport::{ConnectOptions, WebSocketConnector};

use crate::TetherError;
use crate::config::ConfigFromEnv;

/// A [`ConnectionRegistry`] over real WebSocket connections.
pub type TetherClient<S> = ConnectionRegistry<WebSocketConnector, S>;

/// Builder for configuring a [`TetherClient`].
///
/// # Example
///
/// ```rust,no_run
/// use tether::prelude::*;
///
/// # fn main() -> Result<(), TetherError> {
/// let client = TetherClientBuilder::new(MemoryStore::new())
///     .endpoint("wss://api.example.com/socket")
///     .reloader(|| eprintln!("session expired, sign in again"))
///     .build()?;
///
/// let view = client.acquire(Some(TenantId::from(17u64)));
/// view.send("joinTicket", &[Value::from(42)]);
/// # Ok(())
/// # }
/// ```
pub struct TetherClientBuilder<S> {
    registry: RegistryBuilder<WebSocketConnector, S>,
    config: RegistryConfig,
}

impl<S: CredentialStore> TetherClientBuilder<S> {
    /// Creates a builder reading credentials from `store`, with default
    /// settings.
    pub fn new(store: S) -> Self {
        Self {
            registry: ConnectionRegistry::builder(WebSocketConnector::new(), store),
            config: RegistryConfig::default(),
        }
    }

    /// Sets the endpoint URL (`ws://` or `wss://`).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the configuration with one read from `TETHER_*` variables.
    ///
    /// # Errors
    /// [`TetherError::Config`] if a variable cannot be parsed.
    pub fn config_from_env(mut self) -> Result<Self, TetherError> {
        self.config = RegistryConfig::from_env()?;
        Ok(self)
    }

    /// Sets what runs when the stored credential expires.
    pub fn reloader(mut self, reloader: impl Reloader) -> Self {
        self.registry = self.registry.reloader(reloader);
        self
    }

    /// Overrides the clock used for expiry checks.
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.registry = self.registry.clock(clock);
        self
    }

    /// Builds the client. No connection is opened until the first
    /// `acquire`.
    ///
    /// # Errors
    /// [`TetherError::Transport`] if the endpoint is not a WebSocket URL.
    pub fn build(self) -> Result<TetherClient<S>, TetherError> {
        ConnectOptions::new(self.config.endpoint.clone()).request_url()?;
        tracing::debug!(endpoint = %self.config.endpoint, "tether client configured");
        Ok(self.registry.config(self.config).build())
    }
}
