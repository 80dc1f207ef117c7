//! Client half of the async-call protocol.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::component::{Component, PortSpec};
use crate::config::AsyncCallConfig;
use crate::discovery::{Discovery, ReflectionClient, REFLECTION};
use crate::error::{AsyncCallError, InvocationError};
use crate::port::{InboundHandler, Invocation, Port};
use crate::uri::{CorrelationId, PortUri};

use super::envelope::{CallEnvelope, CallOutcome, ResultPayload};
use super::pending::{CallFuture, PendingResults};
use super::{ASYNC_CALL, ASYNC_CALL_OP, DISCONNECT_RECEPTION_OP, RECEIVE_OP, RESULT_RECEPTION};

/// The async-call client plugin of one component.
///
/// Owns an outbound port towards one server and an inbound reception port
/// on which the server pushes results. Calls return a [`CallFuture`] at
/// once; the future completes when the matching result arrives.
pub struct AsyncCallClient {
    component: Arc<Component>,
    outbound: Arc<Port>,
    reception: Arc<Port>,
    pending: Arc<PendingResults>,
    config: AsyncCallConfig,
}

impl AsyncCallClient {
    /// Install the plugin on `component` and publish its reception port.
    pub fn install(
        component: &Arc<Component>,
        config: AsyncCallConfig,
    ) -> Result<Self, AsyncCallError> {
        let pending = Arc::new(PendingResults::new());
        let handler: Arc<dyn InboundHandler> = Arc::new(ReceptionHandler {
            pending: pending.clone(),
        });
        let reception = component.create_port(PortSpec::inbound(RESULT_RECEPTION, Some(handler)));
        let outbound = component.create_port(PortSpec::outbound(ASYNC_CALL));
        if let Err(err) = reception.publish().and_then(|()| outbound.publish()) {
            for uri in [reception.uri(), outbound.uri()] {
                if let Err(cleanup) = component.destroy_port(uri) {
                    tracing::warn!(port = %uri, error = %cleanup, "failed to clean up client port");
                }
            }
            return Err(err.into());
        }
        tracing::debug!(
            component = %component.name(),
            reception = %reception.uri(),
            "async-call client installed"
        );
        Ok(Self {
            component: component.clone(),
            outbound,
            reception,
            pending,
            config,
        })
    }

    /// Find the single async-call server of the component whose reflection
    /// port is `peer_discovery_uri` and connect to it.
    pub fn connect_to_server(&self, peer_discovery_uri: &PortUri) -> Result<(), AsyncCallError> {
        if self.outbound.connected() {
            return Err(AsyncCallError::AlreadyConnected);
        }
        let acquired = self.component.add_required(REFLECTION);
        let connected = self.discover_and_connect(peer_discovery_uri);
        if acquired {
            self.component.remove_required(&REFLECTION);
        }
        connected
    }

    fn discover_and_connect(&self, peer_discovery_uri: &PortUri) -> Result<(), AsyncCallError> {
        let reflection = ReflectionClient::connect(&self.component, peer_discovery_uri)?;
        let found = reflection.find_single_inbound_port_uri(&ASYNC_CALL);
        reflection.release()?;
        let server = found?;
        self.outbound
            .do_connection(&server, self.config.call_connector())?;
        tracing::debug!(
            component = %self.component.name(),
            server = %server,
            remote = self.outbound.is_remote(),
            "connected to async-call server"
        );
        Ok(())
    }

    /// Whether the client is connected to a server.
    pub fn is_connected_to_server(&self) -> bool {
        self.outbound.connected()
    }

    /// URI of the connected server's inbound port.
    pub fn server_uri(&self) -> Option<PortUri> {
        self.outbound.server_uri()
    }

    /// URI of the reception port results arrive on.
    pub fn reception_uri(&self) -> &PortUri {
        self.reception.uri()
    }

    /// Stamp `envelope`, send it and return the future of its result.
    ///
    /// If the send fails the call is forgotten and the error returned.
    pub fn async_call_with_future(
        &self,
        mut envelope: CallEnvelope,
    ) -> Result<CallFuture, AsyncCallError> {
        if !self.outbound.connected() {
            return Err(AsyncCallError::NotConnected);
        }
        let correlation_id = CorrelationId::next();
        let future = self.pending.register(correlation_id.clone());
        if let Err(err) = self.transmit(&mut envelope, correlation_id.clone()) {
            self.pending.discard(&correlation_id);
            tracing::debug!(correlation_id = %correlation_id, error = %err, "call not sent");
            return Err(err);
        }
        tracing::trace!(
            correlation_id = %correlation_id,
            operation = %envelope.operation(),
            "call sent"
        );
        Ok(future)
    }

    /// Shorthand for [`async_call_with_future`](Self::async_call_with_future)
    /// on a fresh envelope.
    pub fn call(
        &self,
        operation: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<CallFuture, AsyncCallError> {
        self.async_call_with_future(CallEnvelope::new(operation, args))
    }

    fn transmit(
        &self,
        envelope: &mut CallEnvelope,
        correlation_id: CorrelationId,
    ) -> Result<(), AsyncCallError> {
        envelope.stamp_call_info(correlation_id, self.reception.uri().clone())?;
        let payload = serde_json::to_value(envelope.to_payload()?)?;
        self.outbound
            .call(Invocation::new(ASYNC_CALL_OP, vec![payload]))?;
        Ok(())
    }

    /// Complete the pending call `correlation_id` with `outcome`. Returns
    /// `false` if no such call is pending.
    pub fn receive(&self, correlation_id: &CorrelationId, outcome: CallOutcome) -> bool {
        self.pending.complete(correlation_id, outcome)
    }

    /// Number of calls awaiting a result.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Ask the server to drop its reception channel, then disconnect.
    ///
    /// Pending calls stay pending; results still in flight may arrive
    /// until the server has dropped the channel.
    pub fn disconnect_from_server(&self) -> Result<(), AsyncCallError> {
        if !self.outbound.connected() {
            return Err(AsyncCallError::NotConnected);
        }
        let request = Invocation::new(DISCONNECT_RECEPTION_OP, vec![json!(self.reception.uri())]);
        if let Err(err) = self.outbound.call(request) {
            tracing::warn!(
                reception = %self.reception.uri(),
                error = %err,
                "server did not drop its reception channel"
            );
        }
        self.outbound.do_disconnection()?;
        tracing::debug!(component = %self.component.name(), "disconnected from async-call server");
        Ok(())
    }

    /// Disconnect if connected, abandon every pending call and destroy the
    /// plugin's ports.
    pub fn finalise(&self) -> Result<(), AsyncCallError> {
        if self.outbound.connected() {
            if let Err(err) = self.disconnect_from_server() {
                tracing::warn!(error = %err, "disconnect during finalise failed");
            }
        }
        let abandoned = self.pending.abandon_all();
        if abandoned > 0 {
            tracing::debug!(abandoned, "pending calls abandoned");
        }
        self.component.destroy_port(self.outbound.uri())?;
        self.component.destroy_port(self.reception.uri())?;
        Ok(())
    }
}

impl fmt::Debug for AsyncCallClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCallClient")
            .field("component", &self.component.name())
            .field("server", &self.outbound.server_uri())
            .field("reception", self.reception.uri())
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Completes pending calls from results pushed by the server.
struct ReceptionHandler {
    pending: Arc<PendingResults>,
}

impl InboundHandler for ReceptionHandler {
    fn handle(&self, target: &PortUri, invocation: Invocation) -> Result<Value, InvocationError> {
        if invocation.operation != RECEIVE_OP {
            return Err(InvocationError::UnknownOperation {
                uri: target.clone(),
                operation: invocation.operation,
            });
        }
        let payload: ResultPayload = invocation.decode_arg(0)?;
        self.pending.complete(&payload.correlation_id, payload.result);
        Ok(Value::Null)
    }
}
