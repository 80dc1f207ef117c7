//! The connector trait and the keys that select connector implementations.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConnectorError, InvocationError, PortError};
use crate::port::{Invocation, PortStub};
use crate::uri::PortUri;

/// Late-bound selector for a connector implementation.
///
/// The [`ConnectorFactory`](super::ConnectorFactory) maps keys to
/// constructors, so wiring can be chosen at connect time without reflection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorKey(Cow<'static, str>);

impl ConnectorKey {
    /// Plain call forwarding between an outbound and an inbound port.
    pub const DIRECT: ConnectorKey = ConnectorKey::from_static("direct");
    /// Symmetric forwarding between two two-way ports.
    pub const TWO_WAY: ConnectorKey = ConnectorKey::from_static("two-way");
    /// Pull and push forwarding between data ports.
    pub const DATA: ConnectorKey = ConnectorKey::from_static("data");
    /// Forwarding to a peer component's reflection port.
    pub const REFLECTION: ConnectorKey = ConnectorKey::from_static("reflection");
    /// Client outbound port to server inbound async-call port.
    pub const ASYNC_CALL: ConnectorKey = ConnectorKey::from_static("async-call");
    /// Server reception channel to client reception port.
    pub const RESULT_RECEPTION: ConnectorKey = ConnectorKey::from_static("result-reception");

    /// A key known at compile time.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// A key built at runtime.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The key name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two ends a connector joins.
#[derive(Debug, Clone)]
pub struct ConnectorEnds {
    /// The side that serves invocations.
    pub offering: Arc<dyn PortStub>,
    /// URI of the side that issues invocations.
    pub requiring: PortUri,
    /// Whether `offering` lives behind another fabric.
    pub remote: bool,
}

/// Mediates calls across one connected pair of ports.
///
/// A connector is created fresh for each connection attempt, bound once,
/// and retired on disconnection; it is never reused across edges.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Key this connector was created from.
    fn key(&self) -> &ConnectorKey;

    /// Join the two ends. Fails if the connector was ever bound before.
    fn bind(&self, ends: ConnectorEnds) -> Result<(), ConnectorError>;

    /// Whether the connector currently joins two ends.
    fn is_bound(&self) -> bool;

    /// Whether the offering end lives behind another fabric.
    fn is_remote(&self) -> bool;

    /// Forward an invocation to the offering end.
    fn invoke(&self, invocation: Invocation) -> Result<Value, InvocationError>;

    /// Tell the offering end the requiring end is going away, then retire.
    ///
    /// The connector retires even if the notification fails.
    fn obey_disconnection(&self) -> Result<(), PortError>;

    /// Retire without notifying anyone.
    fn retire(&self);
}
