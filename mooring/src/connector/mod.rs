//! Connectors: one instance per connected edge, created from a key.

mod factory;
mod standard;
mod traits;

pub use factory::ConnectorFactory;
pub use standard::StandardConnector;
pub use traits::{Connector, ConnectorEnds, ConnectorKey};
