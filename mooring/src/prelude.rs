//! Common imports for building components.

pub use crate::asynccall::{
    handler_fn, AsyncCallClient, AsyncCallServer, CallContext, CallEnvelope, CallFuture,
    CallHandler, ResultSender,
};
pub use crate::component::{Component, PortSpec};
pub use crate::config::{AsyncCallConfig, FabricConfig, SchedulerConfig};
pub use crate::connector::ConnectorKey;
pub use crate::discovery::{Discovery, ReflectionClient};
pub use crate::error::{
    AsyncCallError, CallError, DiscoveryError, InvocationError, PortError, RegistryError,
};
pub use crate::fabric::Fabric;
pub use crate::port::{InboundHandler, Invocation, Port, PortRole, PortStatus};
pub use crate::registry::LoopbackResolver;
pub use crate::scheduler::{TaskScheduler, TokioScheduler};
pub use crate::uri::{Capability, CorrelationId, PortUri};

pub use async_trait::async_trait;
pub use std::sync::Arc;
