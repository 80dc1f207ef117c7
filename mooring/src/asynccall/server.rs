//! Server half of the async-call protocol.
//!
//! ```text
//!            client thread                          worker pool
//! inbound ──► async_call ──► connect_reception_port      │
//!                 │             (once per client)        │
//!                 ├──► stamp callee info                 │
//!                 └──► spawn_task ─────────────────────► execute(ctx, args, reply)
//!                                                        │
//!                                reply.send ◄────────────┘
//!                                    │
//!                 reception channel ─┴──► client reception port
//! ```
//!
//! `execute` never runs on the inbound dispatch thread. Results travel back
//! over a reception channel: one outbound port per client, created on first
//! contact with a single-winner insert and reused for every later call.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::{json, Value};

use crate::component::{Component, PortSpec};
use crate::config::AsyncCallConfig;
use crate::error::{AsyncCallError, CallError, InvocationError};
use crate::port::{InboundHandler, Invocation, Port};
use crate::uri::{CorrelationId, PortUri};

use super::envelope::{CallEnvelope, CallOutcome, CallPayload, CalleeInfo, ResultPayload};
use super::handler::{CallContext, CallHandler, HandlerRegistry};
use super::sender::{ResultSender, ResultSink};
use super::{ASYNC_CALL, ASYNC_CALL_OP, DISCONNECT_RECEPTION_OP, RECEIVE_OP, RESULT_RECEPTION};

/// The async-call server plugin of one component.
///
/// Publishes an inbound port offering [`ASYNC_CALL`] and runs registered
/// [`CallHandler`]s on the component's worker pools.
#[derive(Clone)]
pub struct AsyncCallServer {
    shared: Arc<ServerShared>,
}

struct ServerShared {
    component: Arc<Component>,
    inbound: Arc<Port>,
    channels: DashMap<PortUri, Arc<Port>>,
    handlers: HandlerRegistry,
    config: AsyncCallConfig,
    finalised: AtomicBool,
}

impl AsyncCallServer {
    /// Install the plugin on `component` and publish its inbound port.
    pub fn install(
        component: &Arc<Component>,
        config: AsyncCallConfig,
    ) -> Result<Self, AsyncCallError> {
        let shared = Arc::new_cyclic(|me: &Weak<ServerShared>| {
            let handler: Arc<dyn InboundHandler> = Arc::new(ServerInbound { server: me.clone() });
            let inbound = component.create_port(PortSpec::inbound(ASYNC_CALL, Some(handler)));
            ServerShared {
                component: component.clone(),
                inbound,
                channels: DashMap::new(),
                handlers: HandlerRegistry::default(),
                config,
                finalised: AtomicBool::new(false),
            }
        });
        shared.inbound.publish()?;
        tracing::debug!(
            component = %component.name(),
            port = %shared.inbound.uri(),
            "async-call server installed"
        );
        Ok(Self { shared })
    }

    /// URI of the inbound async-call port.
    pub fn inbound_uri(&self) -> &PortUri {
        self.shared.inbound.uri()
    }

    /// Register the handler for `operation`.
    pub fn register_handler(
        &self,
        operation: impl Into<String>,
        handler: Arc<dyn CallHandler>,
    ) -> Result<(), AsyncCallError> {
        self.shared.ensure_live()?;
        self.shared.handlers.register(operation, handler)
    }

    /// Operations with a registered handler.
    pub fn operations(&self) -> Vec<String> {
        self.shared.handlers.operations()
    }

    /// Accept a client-stamped envelope and schedule its execution.
    pub fn async_call(&self, envelope: CallEnvelope) -> Result<(), AsyncCallError> {
        self.shared.async_call(envelope)
    }

    /// Ensure a connected reception channel to `client` exists.
    pub fn connect_reception_port(&self, client: &PortUri) -> Result<(), AsyncCallError> {
        self.shared.connect_reception_port(client)
    }

    /// Tear down the reception channel to `client`. Returns `false` if
    /// there was none.
    pub fn disconnect_reception_port(&self, client: &PortUri) -> Result<bool, AsyncCallError> {
        self.shared.disconnect_reception_port(client)
    }

    /// Push `result` for `correlation_id` to `client`.
    ///
    /// # Errors
    ///
    /// `AsyncCallError::NoReceptionChannel` if `client` never called.
    pub fn send_result(
        &self,
        correlation_id: &CorrelationId,
        result: Option<Value>,
        client: &PortUri,
    ) -> Result<(), AsyncCallError> {
        self.shared.deliver_outcome(correlation_id, Ok(result), client)
    }

    /// Number of cached reception channels.
    pub fn reception_channel_count(&self) -> usize {
        self.shared.channels.len()
    }

    /// Whether a reception channel to `client` is cached.
    pub fn has_reception_channel(&self, client: &PortUri) -> bool {
        self.shared.channels.contains_key(client)
    }

    /// Tear down every reception channel and the inbound port. Calls
    /// arriving afterwards are refused.
    pub fn finalise(&self) -> Result<(), AsyncCallError> {
        self.shared.finalise()
    }
}

impl fmt::Debug for AsyncCallServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCallServer")
            .field("component", &self.shared.component.name())
            .field("inbound", self.shared.inbound.uri())
            .field("channels", &self.shared.channels.len())
            .finish()
    }
}

impl ServerShared {
    fn ensure_live(&self) -> Result<(), AsyncCallError> {
        if self.finalised.load(Ordering::Acquire) {
            Err(AsyncCallError::Finalised)
        } else {
            Ok(())
        }
    }

    fn async_call(self: &Arc<Self>, mut envelope: CallEnvelope) -> Result<(), AsyncCallError> {
        self.ensure_live()?;
        let client = envelope
            .call_info()
            .map(|info| info.client_reception_uri.clone())
            .ok_or(AsyncCallError::EnvelopeIncomplete { field: "call info" })?;
        self.connect_reception_port(&client)?;

        envelope.stamp_callee(CalleeInfo {
            component: self.component.name().to_string(),
            plugin: self.inbound.uri().clone(),
        })?;
        let (operation, args, info) = envelope.into_dispatch()?;
        let sink: Arc<dyn ResultSink> = self.clone();
        let reply = ResultSender::new(info.correlation_id.clone(), client.clone(), sink);

        let Some(handler) = self.handlers.get(&operation) else {
            tracing::warn!(
                correlation_id = %info.correlation_id,
                operation = %operation,
                "no handler registered"
            );
            return reply.send_error(CallError::UnknownOperation { operation });
        };

        let scheduler = self.component.scheduler();
        let pool = scheduler.select_pool(self.config.preferred_pool()).to_string();
        let correlation_id = info.correlation_id;
        let ctx = CallContext::new(
            self.component.clone(),
            operation.clone(),
            correlation_id.clone(),
            client,
        );
        tracing::debug!(
            correlation_id = %correlation_id,
            operation = %operation,
            pool = %pool,
            "dispatching call"
        );

        scheduler.spawn_task(
            &pool,
            "async-call-execute",
            Box::pin(async move {
                if let Err(err) = handler.execute(ctx, args, reply).await {
                    tracing::error!(
                        correlation_id = %correlation_id,
                        operation = %operation,
                        error = %err,
                        "execution fault"
                    );
                }
            }),
        )?;
        Ok(())
    }

    fn connect_reception_port(&self, client: &PortUri) -> Result<(), AsyncCallError> {
        self.ensure_live()?;
        match self.channels.entry(client.clone()) {
            Entry::Occupied(entry) => {
                if entry.get().connected() {
                    tracing::trace!(client = %client, "reusing reception channel");
                    Ok(())
                } else {
                    Err(AsyncCallError::ReceptionChannelDisconnected {
                        client: client.clone(),
                    })
                }
            }
            Entry::Vacant(entry) => {
                // Re-checked under the shard lock; `finalise` drains after
                // setting the flag.
                self.ensure_live()?;
                let channel = self.open_reception_channel(client)?;
                entry.insert(channel);
                Ok(())
            }
        }
    }

    fn open_reception_channel(&self, client: &PortUri) -> Result<Arc<Port>, AsyncCallError> {
        let port = self
            .component
            .create_port(PortSpec::outbound(RESULT_RECEPTION));
        let opened = port
            .publish()
            .and_then(|()| port.do_connection(client, self.config.reception_connector()));
        if let Err(err) = opened {
            if let Err(cleanup) = self.component.destroy_port(port.uri()) {
                tracing::warn!(
                    port = %port.uri(),
                    error = %cleanup,
                    "failed to clean up reception channel"
                );
            }
            return Err(err.into());
        }
        tracing::debug!(
            client = %client,
            channel = %port.uri(),
            remote = port.is_remote(),
            "reception channel opened"
        );
        Ok(port)
    }

    fn disconnect_reception_port(&self, client: &PortUri) -> Result<bool, AsyncCallError> {
        let Some((_, channel)) = self.channels.remove(client) else {
            return Ok(false);
        };
        let disconnected = if channel.connected() {
            channel.do_disconnection()
        } else {
            Ok(())
        };
        self.component.destroy_port(channel.uri())?;
        disconnected?;
        tracing::debug!(client = %client, channel = %channel.uri(), "reception channel closed");
        Ok(true)
    }

    fn finalise(&self) -> Result<(), AsyncCallError> {
        if self.finalised.swap(true, Ordering::AcqRel) {
            return Err(AsyncCallError::Finalised);
        }
        loop {
            let clients: Vec<PortUri> = self.channels.iter().map(|e| e.key().clone()).collect();
            if clients.is_empty() {
                break;
            }
            for client in clients {
                if let Err(err) = self.disconnect_reception_port(&client) {
                    tracing::warn!(
                        client = %client,
                        error = %err,
                        "failed to close reception channel"
                    );
                }
            }
        }
        self.component.destroy_port(self.inbound.uri())?;
        tracing::debug!(component = %self.component.name(), "async-call server finalised");
        Ok(())
    }
}

impl ResultSink for ServerShared {
    fn deliver_outcome(
        &self,
        correlation_id: &CorrelationId,
        outcome: CallOutcome,
        client: &PortUri,
    ) -> Result<(), AsyncCallError> {
        let channel = self
            .channels
            .get(client)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AsyncCallError::NoReceptionChannel {
                client: client.clone(),
            })?;
        let payload = ResultPayload {
            correlation_id: correlation_id.clone(),
            result: outcome,
        };
        channel.call(Invocation::new(RECEIVE_OP, vec![serde_json::to_value(&payload)?]))?;
        tracing::debug!(correlation_id = %correlation_id, client = %client, "result sent");
        Ok(())
    }
}

/// Dispatches invocations arriving on the server's inbound port.
struct ServerInbound {
    server: Weak<ServerShared>,
}

impl InboundHandler for ServerInbound {
    fn handle(&self, target: &PortUri, invocation: Invocation) -> Result<Value, InvocationError> {
        let server = self
            .server
            .upgrade()
            .ok_or_else(|| InvocationError::Unavailable { uri: target.clone() })?;
        match invocation.operation.as_str() {
            ASYNC_CALL_OP => {
                let payload: CallPayload = invocation.decode_arg(0)?;
                server
                    .async_call(CallEnvelope::from_payload(payload))
                    .map_err(into_invocation_error)?;
                Ok(Value::Null)
            }
            DISCONNECT_RECEPTION_OP => {
                let client: PortUri = invocation.decode_arg(0)?;
                let removed = server
                    .disconnect_reception_port(&client)
                    .map_err(into_invocation_error)?;
                Ok(json!(removed))
            }
            _ => Err(InvocationError::UnknownOperation {
                uri: target.clone(),
                operation: invocation.operation,
            }),
        }
    }
}

fn into_invocation_error(err: AsyncCallError) -> InvocationError {
    match err {
        AsyncCallError::Invocation(inner) => inner,
        other => InvocationError::Handler {
            message: other.to_string(),
        },
    }
}
