//! Environment-driven configuration.
//!
//! | variable | field | unit |
//! |---|---|---|
//! | `TETHER_BACKEND_URL` | `endpoint` | URL |
//! | `TETHER_PING_INTERVAL_MS` | `ping_interval` | ms |
//! | `TETHER_PING_TIMEOUT_MS` | `ping_timeout` | ms |
//! | `TETHER_RELOAD_DELAY_MS` | `reload_delay` | ms |
//! | `TETHER_EXPIRY_SKEW_MS` | `expiry_skew` | ms |
//!
//! Unset variables keep the default.

use std::time::Duration;

use tether_session::RegistryConfig;

use crate::TetherError;

pub const BACKEND_URL: &str = "TETHER_BACKEND_URL";
pub const PING_INTERVAL_MS: &str = "TETHER_PING_INTERVAL_MS";
pub const PING_TIMEOUT_MS: &str = "TETHER_PING_TIMEOUT_MS";
pub const RELOAD_DELAY_MS: &str = "TETHER_RELOAD_DELAY_MS";
pub const EXPIRY_SKEW_MS: &str = "TETHER_EXPIRY_SKEW_MS";

/// Loads a [`RegistryConfig`] from the environment.
pub trait ConfigFromEnv: Sized {
    /// Reads the process environment.
    ///
    /// # Errors
    /// [`TetherError::Config`] when a duration variable is not an integer.
    fn from_env() -> Result<Self, TetherError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads through `lookup` instead of the process environment.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TetherError>;
}

impl ConfigFromEnv for RegistryConfig {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TetherError> {
        let mut config = RegistryConfig::default();

        if let Some(url) = lookup(BACKEND_URL).filter(|u| !u.trim().is_empty()) {
            config.endpoint = url.trim().to_string();
        }

        let millis = |var: &'static str, into: &mut Duration| -> Result<(), TetherError> {
            if let Some(raw) = lookup(var) {
                let ms = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| TetherError::Config { var, value: raw.clone() })?;
                *into = Duration::from_millis(ms);
            }
            Ok(())
        };
        millis(PING_INTERVAL_MS, &mut config.ping_interval)?;
        millis(PING_TIMEOUT_MS, &mut config.ping_timeout)?;
        millis(RELOAD_DELAY_MS, &mut config.reload_delay)?;
        millis(EXPIRY_SKEW_MS, &mut config.expiry_skew)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_from_lookup_empty_is_default() {
        let config = RegistryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RegistryConfig::default());
    }

    #[test]
    fn test_from_lookup_reads_every_variable() {
        let config = RegistryConfig::from_lookup(lookup(&[
            (BACKEND_URL, " wss://api.example.com/socket "),
            (PING_INTERVAL_MS, "5000"),
            (PING_TIMEOUT_MS, "2500"),
            (RELOAD_DELAY_MS, "0"),
            (EXPIRY_SKEW_MS, "1000"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint, "wss://api.example.com/socket");
        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.ping_timeout, Duration::from_millis(2500));
        assert_eq!(config.reload_delay, Duration::ZERO);
        assert_eq!(config.expiry_skew, Duration::from_secs(1));
    }

    #[test]
    fn test_from_lookup_rejects_non_numeric_duration() {
        let err = RegistryConfig::from_lookup(lookup(&[(PING_TIMEOUT_MS, "18s")])).unwrap_err();
        assert!(matches!(
            err,
            TetherError::Config { var: PING_TIMEOUT_MS, .. }
        ));
    }
}
