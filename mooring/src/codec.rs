//! Wire framing for invocations that cross a process boundary.
//!
//! Local connectors hand [`Invocation`]s to the target port directly. When the
//! peer was resolved remotely, the connector encodes the invocation with a
//! [`MessageCodec`], ships the frame through [`PortStub::deliver`], and
//! decodes the reply frame, which carries the callee's
//! `Result<Value, InvocationError>`.
//!
//! [`PortStub::deliver`]: crate::port::PortStub::deliver

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::InvocationError;
use crate::port::Invocation;

/// Error type for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a value to bytes.
    #[error("encode error: {0}")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Failed to decode bytes to a value.
    #[error("decode error: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Pluggable frame serialization.
pub trait MessageCodec: Clone + Send + Sync + 'static {
    /// Encode a serializable value to bytes.
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes to a deserializable value.
    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError>;

    /// Encode an outgoing invocation.
    fn encode_invocation(&self, invocation: &Invocation) -> Result<Vec<u8>, InvocationError> {
        Ok(self.encode(invocation)?)
    }

    /// Decode a reply frame and flatten the callee's outcome into ours.
    fn decode_reply(&self, frame: &[u8]) -> Result<Value, InvocationError> {
        let reply: Result<Value, InvocationError> = self.decode(frame)?;
        reply
    }
}

/// JSON codec using serde_json. Human-readable frames, used by every
/// standard connector.
#[derive(Clone, Default, Debug, Copy)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(msg).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}
