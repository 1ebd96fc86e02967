//! Parameters for opening a transport handle.

use std::time::Duration;

use crate::TransportError;

/// The wire mechanisms a handle may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// A long-lived WebSocket.
    WebSocket,
    /// HTTP long-polling fallback.
    Polling,
}

/// Everything a [`Connector`](crate::Connector) needs to open a handle.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Base URL of the remote endpoint (`ws://` or `wss://`).
    pub url: String,
    /// Allowed mechanisms, in order of preference.
    pub transports: Vec<TransportKind>,
    /// How often the client probes the connection.
    pub ping_interval: Duration,
    /// How long past a missed probe the connection is declared dead.
    pub ping_timeout: Duration,
    /// First delay before retrying a failed connection attempt.
    pub reconnect_delay: Duration,
    /// Upper bound for the exponential retry delay.
    pub reconnect_delay_max: Duration,
    /// Connection-time query parameters (the bearer token travels here).
    pub query: Vec<(String, String)>,
}

impl ConnectOptions {
    /// Default keep-alive interval and timeout.
    pub const DEFAULT_PING: Duration = Duration::from_secs(18);

    /// Creates options for `url` with WebSocket-only transport and default
    /// timings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transports: vec![TransportKind::WebSocket],
            ping_interval: Self::DEFAULT_PING,
            ping_timeout: Self::DEFAULT_PING,
            reconnect_delay: Duration::from_secs(1),
            reconnect_delay_max: Duration::from_secs(5),
            query: Vec::new(),
        }
    }

    /// Appends a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets ping interval and timeout.
    pub fn with_ping(mut self, interval: Duration, timeout: Duration) -> Self {
        self.ping_interval = interval;
        self.ping_timeout = timeout;
        self
    }

    /// Builds the URL the handle actually dials: the base URL, the query
    /// parameters (percent-encoded), and `transport=websocket`.
    ///
    /// # Errors
    /// [`TransportError::InvalidUrl`] when the base URL is not a `ws://` or
    /// `wss://` URL.
    pub fn request_url(&self) -> Result<String, TransportError> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(TransportError::InvalidUrl(self.url.clone()));
        }

        let mut url = self.url.clone();
        let mut sep = if url.contains('?') { '&' } else { '?' };
        for (key, value) in self
            .query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .chain(std::iter::once(("transport", "websocket")))
        {
            url.push(sep);
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
            sep = '&';
        }
        Ok(url)
    }

    /// Retry delay after `failures` consecutive failed attempts: doubles
    /// from `reconnect_delay`, capped at `reconnect_delay_max`.
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.reconnect_delay
            .saturating_mul(factor)
            .min(self.reconnect_delay_max)
    }
}
