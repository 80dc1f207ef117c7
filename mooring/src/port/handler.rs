//! Handlers that give offering ports their behaviour.

use std::sync::Arc;

use serde_json::Value;

use crate::error::InvocationError;
use crate::uri::PortUri;

use super::stub::Invocation;

/// Operation a data outbound port sends to pull a value.
pub const DATA_REQUEST: &str = "data.request";
/// Operation a data inbound port sends to push a value.
pub const DATA_SEND: &str = "data.send";

/// Behaviour behind an offering port.
///
/// Implemented for any `Fn(Invocation) -> Result<Value, InvocationError>`,
/// which covers most single-purpose ports.
pub trait InboundHandler: Send + Sync {
    /// Run `invocation` on behalf of the port at `target`.
    fn handle(&self, target: &PortUri, invocation: Invocation) -> Result<Value, InvocationError>;
}

impl<F> InboundHandler for F
where
    F: Fn(Invocation) -> Result<Value, InvocationError> + Send + Sync,
{
    fn handle(&self, _target: &PortUri, invocation: Invocation) -> Result<Value, InvocationError> {
        self(invocation)
    }
}

/// Source of values for a data inbound port.
pub trait DataProvider: Send + Sync {
    /// Produce the next value on a pull.
    fn request(&self) -> Result<Value, InvocationError>;
}

/// Sink for values pushed to a data outbound port.
pub trait DataConsumer: Send + Sync {
    /// Accept a pushed value.
    fn receive(&self, value: Value) -> Result<(), InvocationError>;
}

struct ProviderHandler<P>(P);

impl<P: DataProvider> InboundHandler for ProviderHandler<P> {
    fn handle(&self, target: &PortUri, invocation: Invocation) -> Result<Value, InvocationError> {
        match invocation.operation.as_str() {
            DATA_REQUEST => self.0.request(),
            _ => Err(unknown(target, invocation)),
        }
    }
}

struct ConsumerHandler<C>(C);

impl<C: DataConsumer> InboundHandler for ConsumerHandler<C> {
    fn handle(&self, target: &PortUri, invocation: Invocation) -> Result<Value, InvocationError> {
        match invocation.operation.as_str() {
            DATA_SEND => {
                let value = invocation.arg(0)?.clone();
                self.0.receive(value)?;
                Ok(Value::Null)
            }
            _ => Err(unknown(target, invocation)),
        }
    }
}

fn unknown(target: &PortUri, invocation: Invocation) -> InvocationError {
    InvocationError::UnknownOperation {
        uri: target.clone(),
        operation: invocation.operation,
    }
}

/// Handler for a data inbound port answering pulls from `provider`.
pub fn provider_handler<P: DataProvider + 'static>(provider: P) -> Arc<dyn InboundHandler> {
    Arc::new(ProviderHandler(provider))
}

/// Handler for a data outbound port accepting pushes into `consumer`.
pub fn consumer_handler<C: DataConsumer + 'static>(consumer: C) -> Arc<dyn InboundHandler> {
    Arc::new(ConsumerHandler(consumer))
}
