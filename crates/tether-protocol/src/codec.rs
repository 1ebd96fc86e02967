//! Wire frames and the codec that turns them into bytes.
//!
//! An event travels as a JSON array: the event name first, then its
//! arguments in order.
//!
//! ```text
//! ["joinTicket", 42]
//! ["message", {"id": 1, "body": "hi"}]
//! ```

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One event on the wire: its name and its ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Event name.
    pub event: String,
    /// Event arguments, possibly empty.
    pub args: Vec<Value>,
}

impl Frame {
    /// Creates a frame.
    pub fn new(event: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            event: event.into(),
            args,
        }
    }
}

impl Serialize for Frame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.args.len() + 1))?;
        seq.serialize_element(&self.event)?;
        for arg in &self.args {
            seq.serialize_element(arg)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Frame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut items = Vec::<Value>::deserialize(deserializer)?.into_iter();
        let event = match items.next() {
            Some(Value::String(event)) => event,
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "event name must be a string, got {other}"
                )));
            }
            None => return Err(de::Error::custom("empty frame")),
        };
        Ok(Self {
            event,
            args: items.collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encodes values to bytes and decodes them back.
///
/// The transport only needs something that implements this trait, so the
/// text format can be swapped without touching connection handling.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or do
    /// not match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use tether_protocol::{Codec, Frame, JsonCodec};
/// use serde_json::json;
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Frame::new("joinTicket", vec![json!(42)])).unwrap();
/// assert_eq!(bytes, br#"["joinTicket",42]"#);
///
/// let frame: Frame = codec.decode(&bytes).unwrap();
/// assert_eq!(frame.event, "joinTicket");
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl JsonCodec {
    /// Serializes a value into a JSON string, for text frames.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    pub fn encode_text<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }
}

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
