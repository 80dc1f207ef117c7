//! What a connector sees of the port at its far end.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{JsonCodec, MessageCodec};
use crate::connector::ConnectorKey;
use crate::error::{InvocationError, PortError};
use crate::port::PortRole;
use crate::uri::PortUri;

/// A single call travelling through a connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Operation name understood by the target's handler.
    pub operation: String,
    /// Positional arguments.
    pub args: Vec<Value>,
}

impl Invocation {
    /// Create an invocation.
    pub fn new(operation: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            operation: operation.into(),
            args,
        }
    }

    /// Borrow argument `index`.
    pub fn arg(&self, index: usize) -> Result<&Value, InvocationError> {
        self.args
            .get(index)
            .ok_or_else(|| InvocationError::InvalidArguments {
                operation: self.operation.clone(),
                message: format!("missing argument {index}"),
            })
    }

    /// Decode argument `index` into `T`.
    pub fn decode_arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, InvocationError> {
        let value = self.arg(index)?;
        serde_json::from_value(value.clone()).map_err(|e| InvocationError::InvalidArguments {
            operation: self.operation.clone(),
            message: format!("argument {index}: {e}"),
        })
    }
}

/// Handle on a port as seen through a registry.
///
/// Local ports implement this directly; [`RemotePortStub`] forwards to a
/// port living behind another fabric. Connection control (`obey_*`) and
/// invocations both go through this trait, so a connector never needs to
/// know where its peer lives.
///
/// [`RemotePortStub`]: crate::registry::RemotePortStub
pub trait PortStub: Send + Sync + fmt::Debug {
    /// URI of the port.
    fn uri(&self) -> &PortUri;

    /// Role of the port.
    fn role(&self) -> PortRole;

    /// Whether this stub stands in for a port behind another fabric.
    fn is_remote(&self) -> bool {
        false
    }

    /// Dispatch an invocation to the port's handler.
    fn invoke(&self, invocation: Invocation) -> Result<Value, InvocationError>;

    /// Dispatch an encoded invocation and return the encoded outcome.
    ///
    /// The outer `Err` reports framing failures only; the handler's own
    /// outcome travels inside the reply frame.
    fn deliver(&self, frame: &[u8]) -> Result<Vec<u8>, InvocationError> {
        let codec = JsonCodec;
        let invocation: Invocation = codec.decode(frame)?;
        let outcome = self.invoke(invocation);
        Ok(codec.encode(&outcome)?)
    }

    /// Answer a connection request from `initiator`.
    fn obey_connection(&self, initiator: &PortUri, key: &ConnectorKey) -> Result<(), PortError>;

    /// Answer a disconnection request from `initiator`.
    fn obey_disconnection(&self, initiator: &PortUri) -> Result<(), PortError>;
}
