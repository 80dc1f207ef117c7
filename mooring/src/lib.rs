//! # Mooring
//!
//! Port and connector middleware for components that talk to each other
//! inside one process or across processes.
//!
//! Components own typed ports. A port on the requiring side connects to a
//! port on the offering side through a connector, and calls travel over that
//! link. On top of ports sit capability discovery and an asynchronous call
//! protocol whose results come back as futures.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  asynccall        AsyncCallClient / AsyncCallServer          │
//! │                   CallFuture, ResultSender, worker pools     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  component        Component, PortSpec, reflection port       │
//! │  discovery        Discovery, ReflectionClient                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  port             Port, PortRole, PortStub, InboundHandler   │
//! │  connector        Connector, ConnectorFactory                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  fabric           Fabric: registry + resolver + connectors   │
//! │  registry         InMemoryRegistry, LoopbackResolver         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Port roles
//!
//! | Role | Offers | Connects to | Peer records the link |
//! |------|--------|-------------|-----------------------|
//! | `Outbound` | no | `Inbound` | no |
//! | `Inbound` | yes | never initiates | no |
//! | `TwoWay` | yes | `TwoWay` | yes |
//! | `DataOutbound` | no | `DataInbound` | yes |
//! | `DataInbound` | yes | never initiates | yes |
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mooring::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fabric = Fabric::new(FabricConfig::local("demo"));
//! let scheduler = Arc::new(TokioScheduler::from_config(&SchedulerConfig::default())?);
//!
//! let server = Component::new("server", fabric.clone(), scheduler.clone())?;
//! let plugin = AsyncCallServer::install(&server, AsyncCallConfig::default())?;
//! plugin.register_handler(
//!     "add",
//!     handler_fn(|_ctx, args| {
//!         let sum: i64 = args.iter().filter_map(|v| v.as_i64()).sum();
//!         Ok(Some(serde_json::json!(sum)))
//!     }),
//! )?;
//!
//! let client = Component::new("client", fabric, scheduler)?;
//! let caller = AsyncCallClient::install(&client, AsyncCallConfig::default())?;
//! caller.connect_to_server(server.discovery_uri())?;
//!
//! let future = caller.call("add", vec![2.into(), 3.into()])?;
//! assert_eq!(future.blocking_wait()?, Some(serde_json::json!(5)));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod asynccall;
pub mod codec;
pub mod component;
pub mod config;
pub mod connector;
pub mod discovery;
pub mod error;
pub mod fabric;
pub mod port;
pub mod prelude;
pub mod registry;
pub mod scheduler;
pub mod uri;

pub use asynccall::{AsyncCallClient, AsyncCallServer, CallEnvelope, CallFuture};
pub use component::{Component, PortSpec};
pub use config::{AsyncCallConfig, FabricConfig, SchedulerConfig};
pub use connector::{Connector, ConnectorKey};
pub use error::{AsyncCallError, CallError, InvocationError, PortError};
pub use fabric::Fabric;
pub use port::{Port, PortRole, PortStatus};
pub use scheduler::{TaskScheduler, TokioScheduler};
pub use uri::{Capability, CorrelationId, PortUri};
