//! Unified error type for Tether.

use tether_protocol::ProtocolError;
use tether_session::SessionError;
use tether_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `tether` facade you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    /// A transport-level error (bad URL, unsupported transport).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (credential, tenant).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    Config {
        /// The variable name.
        var: &'static str,
        /// The raw value found.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::InvalidUrl("http://nope".into());
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Transport(_)));
        assert!(tether_err.to_string().contains("http://nope"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::Decode(serde_json::from_str::<serde_json::Value>("[").unwrap_err());
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let tether_err: TetherError = SessionError::NoCredential.into();
        assert!(matches!(tether_err, TetherError::Session(_)));
    }

    #[test]
    fn test_config_error_names_variable() {
        let err = TetherError::Config {
            var: "TETHER_PING_TIMEOUT_MS",
            value: "soon".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for TETHER_PING_TIMEOUT_MS: \"soon\""
        );
    }
}
