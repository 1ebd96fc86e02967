use tether_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint URL cannot be dialed.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    /// None of the requested transport kinds is supported by the connector.
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Frame(#[from] ProtocolError),
}
