//! Call envelopes and the payloads that carry them.
//!
//! An envelope starts with an operation name and arguments only. The client
//! stamps it with call info (correlation id and its reception port), the
//! wire carries it as a [`CallPayload`], and the server stamps it with
//! callee info before dispatching. Each stamp is applied exactly once.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AsyncCallError, CallError};
use crate::uri::{CorrelationId, PortUri};

/// Outcome delivered for one call: a value (absent for void calls) or an error.
pub type CallOutcome = Result<Option<Value>, CallError>;

/// Where the result of a call must go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInfo {
    /// Token pairing the call with its result.
    pub correlation_id: CorrelationId,
    /// The client's result reception port.
    pub client_reception_uri: PortUri,
}

/// Which server component and plugin accepted the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalleeInfo {
    /// Name of the server component.
    pub component: String,
    /// URI of the server plugin's inbound port.
    pub plugin: PortUri,
}

/// A call on its way from a client to a server handler.
#[derive(Debug, Clone, PartialEq)]
pub struct CallEnvelope {
    operation: String,
    args: Vec<Value>,
    call_info: Option<CallInfo>,
    callee: Option<CalleeInfo>,
}

impl CallEnvelope {
    /// An unstamped envelope for `operation` with positional `args`.
    pub fn new(operation: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            operation: operation.into(),
            args,
            call_info: None,
            callee: None,
        }
    }

    /// Append a serializable argument.
    pub fn arg<T: Serialize>(mut self, value: &T) -> Result<Self, AsyncCallError> {
        self.args.push(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Positional arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Call info, once the client stamped it.
    pub fn call_info(&self) -> Option<&CallInfo> {
        self.call_info.as_ref()
    }

    /// Callee info, once the server stamped it.
    pub fn callee(&self) -> Option<&CalleeInfo> {
        self.callee.as_ref()
    }

    /// Client-side stamp.
    pub fn stamp_call_info(
        &mut self,
        correlation_id: CorrelationId,
        client_reception_uri: PortUri,
    ) -> Result<(), AsyncCallError> {
        if self.call_info.is_some() {
            return Err(AsyncCallError::EnvelopeAlreadyStamped { stamp: "call info" });
        }
        self.call_info = Some(CallInfo {
            correlation_id,
            client_reception_uri,
        });
        Ok(())
    }

    /// Server-side stamp.
    pub fn stamp_callee(&mut self, callee: CalleeInfo) -> Result<(), AsyncCallError> {
        if self.callee.is_some() {
            return Err(AsyncCallError::EnvelopeAlreadyStamped { stamp: "callee info" });
        }
        self.callee = Some(callee);
        Ok(())
    }

    /// Wire form of a stamped envelope.
    pub fn to_payload(&self) -> Result<CallPayload, AsyncCallError> {
        let info = self
            .call_info
            .as_ref()
            .ok_or(AsyncCallError::EnvelopeIncomplete { field: "call info" })?;
        Ok(CallPayload {
            correlation_id: info.correlation_id.clone(),
            operation: self.operation.clone(),
            parameters: self.args.clone(),
            client_reception_uri: info.client_reception_uri.clone(),
        })
    }

    /// Rebuild a client-stamped envelope on the server.
    pub fn from_payload(payload: CallPayload) -> Self {
        Self {
            operation: payload.operation,
            args: payload.parameters,
            call_info: Some(CallInfo {
                correlation_id: payload.correlation_id,
                client_reception_uri: payload.client_reception_uri,
            }),
            callee: None,
        }
    }

    /// Split a fully stamped envelope into its parts for dispatch.
    pub(crate) fn into_dispatch(self) -> Result<(String, Vec<Value>, CallInfo), AsyncCallError> {
        if self.callee.is_none() {
            return Err(AsyncCallError::EnvelopeIncomplete {
                field: "callee info",
            });
        }
        let info = self
            .call_info
            .ok_or(AsyncCallError::EnvelopeIncomplete { field: "call info" })?;
        Ok((self.operation, self.args, info))
    }
}

/// Client to server: one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallPayload {
    /// Token pairing the call with its result.
    pub correlation_id: CorrelationId,
    /// Operation the server handler registry dispatches on.
    pub operation: String,
    /// Positional arguments.
    pub parameters: Vec<Value>,
    /// Where the server pushes the result.
    pub client_reception_uri: PortUri,
}

/// Server to client: one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    /// Token of the call this result answers.
    pub correlation_id: CorrelationId,
    /// The outcome.
    pub result: CallOutcome,
}
