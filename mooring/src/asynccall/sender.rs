//! One-shot result capability handed to call handlers.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{AsyncCallError, CallError};
use crate::uri::{CorrelationId, PortUri};

use super::envelope::CallOutcome;

/// Where a [`ResultSender`] delivers to. Implemented by the server plugin.
pub(crate) trait ResultSink: Send + Sync {
    fn deliver_outcome(
        &self,
        correlation_id: &CorrelationId,
        outcome: CallOutcome,
        client: &PortUri,
    ) -> Result<(), AsyncCallError>;
}

/// The obligation to answer one call, exactly once.
///
/// Consumed by [`send`](Self::send) or [`send_error`](Self::send_error).
/// Dropping it unsent (including by panicking) delivers
/// `CallError::BrokenPromise` to the caller, so no call is left hanging.
#[must_use = "dropping a ResultSender answers the call with BrokenPromise"]
pub struct ResultSender {
    correlation_id: CorrelationId,
    client: PortUri,
    sink: Arc<dyn ResultSink>,
    sent: bool,
}

impl ResultSender {
    pub(crate) fn new(
        correlation_id: CorrelationId,
        client: PortUri,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            correlation_id,
            client,
            sink,
            sent: false,
        }
    }

    /// Correlation id of the call being answered.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Reception port of the calling client.
    pub fn client(&self) -> &PortUri {
        &self.client
    }

    /// Answer with `result`; `None` for void calls.
    pub fn send(mut self, result: Option<Value>) -> Result<(), AsyncCallError> {
        self.sent = true;
        self.sink
            .deliver_outcome(&self.correlation_id, Ok(result), &self.client)
    }

    /// Answer with a serializable value.
    pub fn send_value<T: Serialize>(self, value: &T) -> Result<(), AsyncCallError> {
        match serde_json::to_value(value) {
            Ok(value) => self.send(Some(value)),
            Err(e) => self.send_error(CallError::Serialization {
                message: e.to_string(),
            }),
        }
    }

    /// Answer with a failure.
    pub fn send_error(mut self, error: CallError) -> Result<(), AsyncCallError> {
        self.sent = true;
        self.sink
            .deliver_outcome(&self.correlation_id, Err(error), &self.client)
    }
}

impl Drop for ResultSender {
    fn drop(&mut self) {
        if self.sent {
            return;
        }
        tracing::warn!(
            correlation_id = %self.correlation_id,
            client = %self.client,
            "ResultSender dropped without sending, sending BrokenPromise"
        );
        if let Err(err) =
            self.sink
                .deliver_outcome(&self.correlation_id, Err(CallError::BrokenPromise), &self.client)
        {
            tracing::warn!(
                correlation_id = %self.correlation_id,
                error = %err,
                "failed to deliver BrokenPromise"
            );
        }
    }
}

impl fmt::Debug for ResultSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSender")
            .field("correlation_id", &self.correlation_id)
            .field("client", &self.client)
            .field("sent", &self.sent)
            .finish()
    }
}
