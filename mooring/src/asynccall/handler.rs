//! Server-side call handlers and the registry that dispatches to them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::component::Component;
use crate::error::{AsyncCallError, CallError};
use crate::uri::{CorrelationId, PortUri};

use super::sender::ResultSender;

/// What a handler knows about the call it is executing.
#[derive(Clone)]
pub struct CallContext {
    component: Arc<Component>,
    operation: String,
    correlation_id: CorrelationId,
    client: PortUri,
}

impl CallContext {
    pub(crate) fn new(
        component: Arc<Component>,
        operation: String,
        correlation_id: CorrelationId,
        client: PortUri,
    ) -> Self {
        Self {
            component,
            operation,
            correlation_id,
            client,
        }
    }

    /// The server component running the call.
    pub fn component(&self) -> &Arc<Component> {
        &self.component
    }

    /// Operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Correlation id of the call.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Reception port of the calling client.
    pub fn client(&self) -> &PortUri {
        &self.client
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("component", &self.component.name())
            .field("operation", &self.operation)
            .field("correlation_id", &self.correlation_id)
            .field("client", &self.client)
            .finish()
    }
}

/// Executes one operation on the server's worker pool.
///
/// The handler answers through `reply`, which it must consume exactly once.
/// An `Err` return is an execution fault: it is logged at the dispatch
/// boundary and never reaches the transport. If `reply` was not consumed,
/// the caller observes `CallError::BrokenPromise`.
#[async_trait]
pub trait CallHandler: Send + Sync + 'static {
    /// Run the operation.
    async fn execute(
        &self,
        ctx: CallContext,
        args: Vec<Value>,
        reply: ResultSender,
    ) -> Result<(), CallError>;
}

/// Adapts a synchronous closure into a [`CallHandler`].
///
/// The closure's `Ok` value is sent as the result, and its `Err` is sent as
/// the failure, so the caller always gets an answer.
pub struct FnCallHandler<F> {
    f: F,
}

#[async_trait]
impl<F> CallHandler for FnCallHandler<F>
where
    F: Fn(&CallContext, Vec<Value>) -> Result<Option<Value>, CallError> + Send + Sync + 'static,
{
    async fn execute(
        &self,
        ctx: CallContext,
        args: Vec<Value>,
        reply: ResultSender,
    ) -> Result<(), CallError> {
        let sent = match (self.f)(&ctx, args) {
            Ok(value) => reply.send(value),
            Err(error) => reply.send_error(error),
        };
        sent.map_err(|e| CallError::Execution {
            message: e.to_string(),
        })
    }
}

/// Wrap a closure as a shared [`CallHandler`].
pub fn handler_fn<F>(f: F) -> Arc<dyn CallHandler>
where
    F: Fn(&CallContext, Vec<Value>) -> Result<Option<Value>, CallError> + Send + Sync + 'static,
{
    Arc::new(FnCallHandler { f })
}

/// Operation name to handler.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn CallHandler>>>,
}

impl HandlerRegistry {
    pub(crate) fn register(
        &self,
        operation: impl Into<String>,
        handler: Arc<dyn CallHandler>,
    ) -> Result<(), AsyncCallError> {
        let operation = operation.into();
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&operation) {
            return Err(AsyncCallError::DuplicateHandler { operation });
        }
        handlers.insert(operation, handler);
        Ok(())
    }

    pub(crate) fn get(&self, operation: &str) -> Option<Arc<dyn CallHandler>> {
        self.handlers.read().get(operation).cloned()
    }

    pub(crate) fn operations(&self) -> Vec<String> {
        let mut ops: Vec<String> = self.handlers.read().keys().cloned().collect();
        ops.sort();
        ops
    }
}
