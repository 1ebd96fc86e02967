//! Registry configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_transport::{ConnectOptions, TransportKind};

/// Configuration for a [`ConnectionRegistry`](crate::ConnectionRegistry).
///
/// Durations are (de)serialized as integer milliseconds, so the config can
/// be read from JSON or environment-derived maps directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base WebSocket URL of the remote endpoint.
    pub endpoint: String,

    /// Keep-alive probe interval. Default: 18 s.
    #[serde(with = "millis")]
    pub ping_interval: Duration,

    /// Keep-alive timeout past a missed probe. Default: 18 s.
    #[serde(with = "millis")]
    pub ping_timeout: Duration,

    /// Delay before the reload scheduled for a credential found expired at
    /// acquire time. Default: 1 s.
    #[serde(with = "millis")]
    pub reload_delay: Duration,

    /// Slack subtracted from "now" when re-checking expiry after a
    /// transport-initiated disconnect. Default: 180 ms.
    #[serde(with = "millis")]
    pub expiry_skew: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8080".to_string(),
            ping_interval: ConnectOptions::DEFAULT_PING,
            ping_timeout: ConnectOptions::DEFAULT_PING,
            reload_delay: Duration::from_secs(1),
            expiry_skew: Duration::from_millis(180),
        }
    }
}

impl RegistryConfig {
    /// Config pointing at `endpoint` with every other value defaulted.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Options for opening a handle authenticated with `token`.
    ///
    /// Always WebSocket-only: no polling fallback.
    pub fn connect_options(&self, token: &str) -> ConnectOptions {
        let mut options = ConnectOptions::new(self.endpoint.clone())
            .with_ping(self.ping_interval, self.ping_timeout)
            .with_query("token", token);
        options.transports = vec![TransportKind::WebSocket];
        options
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_timings() {
        let cfg = RegistryConfig::default();
        assert_eq!(cfg.ping_interval, Duration::from_secs(18));
        assert_eq!(cfg.ping_timeout, Duration::from_secs(18));
        assert_eq!(cfg.reload_delay, Duration::from_secs(1));
        assert_eq!(cfg.expiry_skew, Duration::from_millis(180));
    }

    #[test]
    fn test_connect_options_carry_token_and_ping() {
        let opts = RegistryConfig::with_endpoint("ws://backend:9000").connect_options("tok");
        assert_eq!(opts.url, "ws://backend:9000");
        assert_eq!(opts.transports, vec![TransportKind::WebSocket]);
        assert_eq!(opts.ping_interval, Duration::from_secs(18));
        assert_eq!(opts.query, vec![("token".to_string(), "tok".to_string())]);
    }

    #[test]
    fn test_deserialize_partial_json_uses_defaults() {
        let cfg: RegistryConfig =
            serde_json::from_str(r#"{"endpoint":"ws://x","expiry_skew":0}"#).unwrap();
        assert_eq!(cfg.endpoint, "ws://x");
        assert_eq!(cfg.expiry_skew, Duration::ZERO);
        assert_eq!(cfg.reload_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_serialize_durations_as_millis() {
        let json = serde_json::to_value(RegistryConfig::default()).unwrap();
        assert_eq!(json["ping_interval"], 18_000);
        assert_eq!(json["expiry_skew"], 180);
    }
}
