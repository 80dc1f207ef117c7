//! Ports: typed connection points joined by connectors.
//!
//! One [`Port`] record serves every role; the role tag selects a strategy
//! that decides how the shared connection protocol binds each side.
//!
//! | Role | Initiates | Peer | Peer obeys | Records link when obeying |
//! |------|-----------|------|------------|---------------------------|
//! | `Outbound` | yes | `Inbound` | no | n/a |
//! | `Inbound` | no | `Outbound` | n/a | no (serves many clients) |
//! | `TwoWay` | yes | `TwoWay` | yes | yes |
//! | `DataOutbound` | yes | `DataInbound` | yes | n/a |
//! | `DataInbound` | no | `DataOutbound` | n/a | yes (push channel) |

mod handler;
mod record;
mod role;
mod stub;

pub use handler::{
    consumer_handler, provider_handler, DataConsumer, DataProvider, InboundHandler, DATA_REQUEST,
    DATA_SEND,
};
pub use record::{Port, PortStatus};
pub use role::PortRole;
pub use stub::{Invocation, PortStub};
