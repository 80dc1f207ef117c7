//! Error types for the mooring port, connector and async-call layers.
//!
//! Errors are split by concern the same way the transport splits
//! `MessagingError` from `ReplyError`:
//!
//! - [`PortError`]: connection protocol failures, both precondition
//!   violations (wrong state, wrong side) and resolution failures
//! - [`RegistryError`] / [`ConnectorError`]: lookup and wiring failures
//! - [`InvocationError`]: failures of a single call crossing a connector
//!   (serializable, it travels back over remote connectors)
//! - [`CallError`]: the failure half of an asynchronous call outcome
//!   (serializable, it travels inside result payloads)
//! - [`AsyncCallError`]: misuse or failure of the async-call plugins
//! - [`DiscoveryError`] / [`SchedulerError`]: collaborator failures

use serde::{Deserialize, Serialize};

use crate::connector::ConnectorKey;
use crate::port::PortRole;
use crate::uri::{Capability, PortUri};

/// Errors from port registries and remote resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A port is already registered under this URI.
    #[error("port already registered: {uri}")]
    AlreadyRegistered {
        /// The conflicting URI.
        uri: PortUri,
    },

    /// No port is registered under this URI.
    #[error("port not registered: {uri}")]
    NotFound {
        /// The missing URI.
        uri: PortUri,
    },

    /// The URI is neither registered locally nor resolvable remotely.
    #[error("port unresolvable: {uri}")]
    Unresolvable {
        /// The URI that could not be resolved.
        uri: PortUri,
    },
}

/// Errors from connector creation and binding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectorError {
    /// No constructor is registered for this connector key.
    #[error("unknown connector key: {key}")]
    UnknownKey {
        /// The key that was looked up.
        key: ConnectorKey,
    },

    /// The connector already joins an edge; connectors are never reused.
    #[error("connector {key} is already bound")]
    AlreadyBound {
        /// Key of the connector.
        key: ConnectorKey,
    },

    /// The connector was disconnected and cannot be bound again.
    #[error("connector {key} is retired")]
    Retired {
        /// Key of the connector.
        key: ConnectorKey,
    },
}

/// Errors from the port connection protocol.
///
/// Every variant except [`PortError::Registry`], [`PortError::Connector`]
/// and [`PortError::IncompatibleRoles`] is a precondition violation: the
/// caller used the port in the wrong state or from the wrong side. Those are
/// never retried internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The port must be published for this operation.
    #[error("port {uri} is not published")]
    NotPublished {
        /// The port URI.
        uri: PortUri,
    },

    /// The port is already published.
    #[error("port {uri} is already published")]
    AlreadyPublished {
        /// The port URI.
        uri: PortUri,
    },

    /// The port already carries a connector.
    #[error("port {uri} is already connected")]
    AlreadyConnected {
        /// The port URI.
        uri: PortUri,
    },

    /// The port carries no connector.
    #[error("port {uri} is not connected")]
    NotConnected {
        /// The port URI.
        uri: PortUri,
    },

    /// Another connect or disconnect is running on this port.
    #[error("port {uri} has a connection change in progress")]
    ConnectionInProgress {
        /// The port URI.
        uri: PortUri,
    },

    /// Only the side that initiated the connection may disconnect it.
    #[error("port {uri} did not initiate its connection")]
    NotInitiator {
        /// The port URI.
        uri: PortUri,
    },

    /// The port's role never initiates connections.
    #[error("port {uri} has role {role} which cannot initiate connections")]
    InitiatorOnly {
        /// The port URI.
        uri: PortUri,
        /// The port's role.
        role: PortRole,
    },

    /// The port's role cannot answer a connection request.
    #[error("port {uri} has role {role} which cannot obey connections")]
    NotResponder {
        /// The port URI.
        uri: PortUri,
        /// The port's role.
        role: PortRole,
    },

    /// The two roles cannot be joined.
    #[error("port {uri} ({local}) cannot be joined to a {peer} port")]
    IncompatibleRoles {
        /// The port URI.
        uri: PortUri,
        /// Role of this port.
        local: PortRole,
        /// Role of the peer.
        peer: PortRole,
    },

    /// The port was destroyed; no further mutation is legal.
    #[error("port {uri} is destroyed")]
    Destroyed {
        /// The port URI.
        uri: PortUri,
    },

    /// Peer resolution or registration failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Connector creation or binding failed.
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),
}

impl PortError {
    /// Whether this error reports caller misuse rather than a resolution failure.
    pub fn is_precondition_violation(&self) -> bool {
        !matches!(
            self,
            PortError::Registry(_) | PortError::Connector(_) | PortError::IncompatibleRoles { .. }
        )
    }
}

/// Errors raised by a single invocation travelling through a connector.
///
/// Serializable so a remote peer can report them back across the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum InvocationError {
    /// The calling port has no connector.
    #[error("port {uri} is not connected")]
    NotConnected {
        /// The calling port.
        uri: PortUri,
    },

    /// The connector was never bound or has been retired.
    #[error("connector {key} is not bound")]
    ConnectorUnbound {
        /// Key of the connector.
        key: ConnectorKey,
    },

    /// The target port is destroyed or no longer reachable.
    #[error("port {uri} is unavailable")]
    Unavailable {
        /// The target port.
        uri: PortUri,
    },

    /// The target port offers no handler.
    #[error("port {uri} has no inbound handler")]
    NoHandler {
        /// The target port.
        uri: PortUri,
    },

    /// The target handler does not implement this operation.
    #[error("unknown operation {operation} on port {uri}")]
    UnknownOperation {
        /// The target port.
        uri: PortUri,
        /// The requested operation.
        operation: String,
    },

    /// The operation is not available for the calling port's role.
    #[error("operation {operation} is not available on {role} port {uri}")]
    WrongRole {
        /// The calling port.
        uri: PortUri,
        /// Its role.
        role: PortRole,
        /// The requested operation.
        operation: String,
    },

    /// Arguments did not match what the operation expects.
    #[error("invalid arguments for {operation}: {message}")]
    InvalidArguments {
        /// The operation.
        operation: String,
        /// What was wrong.
        message: String,
    },

    /// Encoding or decoding a frame failed.
    #[error("serialization failed: {message}")]
    Serialization {
        /// Codec message.
        message: String,
    },

    /// The handler reported a failure.
    #[error("handler failed: {message}")]
    Handler {
        /// Handler message.
        message: String,
    },
}

impl From<crate::codec::CodecError> for InvocationError {
    fn from(err: crate::codec::CodecError) -> Self {
        InvocationError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Failure half of an asynchronous call outcome, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CallError {
    /// The server dropped its result sender without sending a result.
    #[error("server dropped the call without sending a result")]
    BrokenPromise,

    /// The client stopped tracking the call before a result arrived.
    #[error("call abandoned before a result arrived")]
    Abandoned,

    /// The caller's timer expired first.
    #[error("call timed out")]
    Timeout,

    /// No handler is registered for the requested operation.
    #[error("unknown operation: {operation}")]
    UnknownOperation {
        /// The requested operation.
        operation: String,
    },

    /// Arguments did not match what the operation expects.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// What was wrong.
        message: String,
    },

    /// A result could not be encoded or decoded.
    #[error("serialization failed: {message}")]
    Serialization {
        /// Codec message.
        message: String,
    },

    /// The operation itself failed and encoded the failure in its result.
    #[error("execution failed: {message}")]
    Execution {
        /// Failure description.
        message: String,
    },
}

/// Errors from capability discovery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    /// The protocol requires exactly one matching inbound port.
    #[error("expected exactly one inbound port offering {capability}, found {found}")]
    UnexpectedMatchCount {
        /// The capability queried.
        capability: Capability,
        /// How many URIs came back.
        found: usize,
    },

    /// Connecting to or releasing the peer's reflection port failed.
    #[error("discovery port error: {0}")]
    Port(#[from] PortError),

    /// The discovery query itself failed.
    #[error("discovery query failed: {0}")]
    Invocation(#[from] InvocationError),
}

/// Errors from the task scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The named worker pool does not exist.
    #[error("unknown worker pool: {name}")]
    UnknownPool {
        /// The pool name.
        name: String,
    },

    /// No Tokio runtime is available on the calling thread.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// Building a worker pool failed.
    #[error("failed to build worker pool {name}: {message}")]
    Build {
        /// The pool name.
        name: String,
        /// Underlying I/O message.
        message: String,
    },
}

/// Errors from the async-call client and server plugins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsyncCallError {
    /// The client is already connected to a server.
    #[error("already connected to server")]
    AlreadyConnected,

    /// The client is not connected to a server.
    #[error("not connected to server")]
    NotConnected,

    /// Envelopes are stamped once and never reused.
    #[error("envelope already stamped with {stamp}")]
    EnvelopeAlreadyStamped {
        /// Which stamp was applied twice.
        stamp: &'static str,
    },

    /// The envelope lacks information the protocol needs at this step.
    #[error("envelope is missing {field}")]
    EnvelopeIncomplete {
        /// The missing field.
        field: &'static str,
    },

    /// A result was sent before the reception channel to its client existed.
    #[error("no reception channel for client {client}")]
    NoReceptionChannel {
        /// The client's reception port URI.
        client: PortUri,
    },

    /// A cached reception channel was found disconnected.
    #[error("reception channel for client {client} is not connected")]
    ReceptionChannelDisconnected {
        /// The client's reception port URI.
        client: PortUri,
    },

    /// An operation already has a handler.
    #[error("handler already registered for {operation}")]
    DuplicateHandler {
        /// The operation name.
        operation: String,
    },

    /// A payload could not be encoded or decoded.
    #[error("payload serialization failed: {message}")]
    Serialization {
        /// Codec message.
        message: String,
    },

    /// The plugin was finalised.
    #[error("plugin finalised")]
    Finalised,

    /// Port protocol failure.
    #[error("port error: {0}")]
    Port(#[from] PortError),

    /// Discovery failure while connecting to the server.
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Transmission failure.
    #[error("invocation error: {0}")]
    Invocation(#[from] InvocationError),

    /// The worker pool refused the task.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

impl AsyncCallError {
    /// Whether this error reports protocol misuse by the caller.
    pub fn is_precondition_violation(&self) -> bool {
        match self {
            AsyncCallError::AlreadyConnected
            | AsyncCallError::NotConnected
            | AsyncCallError::EnvelopeAlreadyStamped { .. }
            | AsyncCallError::EnvelopeIncomplete { .. }
            | AsyncCallError::NoReceptionChannel { .. }
            | AsyncCallError::ReceptionChannelDisconnected { .. }
            | AsyncCallError::DuplicateHandler { .. }
            | AsyncCallError::Finalised => true,
            AsyncCallError::Port(err) => err.is_precondition_violation(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for AsyncCallError {
    fn from(err: serde_json::Error) -> Self {
        AsyncCallError::Serialization {
            message: err.to_string(),
        }
    }
}
