//! Error types for the session layer.

use tether_transport::TransportError;

/// Errors that can occur while gating credentials or opening a handle.
///
/// None of these reach consumers of a view: the registry turns every one
/// of them into an inert view (and, for an expired credential, a deferred
/// reload). They surface through [`ConnectionRegistry::try_acquire`] and in
/// logs.
///
/// [`ConnectionRegistry::try_acquire`]: crate::ConnectionRegistry::try_acquire
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Nothing is stored under the credential key.
    #[error("no credential stored")]
    NoCredential,

    /// The stored record or the token payload could not be decoded, or the
    /// token carries no expiry.
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// The credential decoded but its expiry has passed.
    #[error("credential expired at {expired_at_ms} ms")]
    ExpiredCredential {
        /// Expiry as Unix milliseconds.
        expired_at_ms: u64,
    },

    /// No tenant was given and no connection is live.
    #[error("no tenant context")]
    NoTenant,

    /// The connector refused to open a handle.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
