//! Capability discovery across components.
//!
//! Every [`Component`] publishes a reflection port. A peer asks it which
//! inbound ports offer a capability by connecting a short-lived outbound
//! port through a [`ReflectionClient`].

use std::sync::Arc;

use serde_json::json;

use crate::component::{Component, PortSpec};
use crate::connector::ConnectorKey;
use crate::error::{DiscoveryError, InvocationError};
use crate::port::{Invocation, Port};
use crate::uri::{Capability, PortUri};

/// Capability offered by every component's reflection port.
pub const REFLECTION: Capability = Capability::from_static("mooring.Reflection");

/// Operation answered by reflection ports.
pub const FIND_INBOUND_PORT_URIS: &str = "reflection.findInboundPortURIs";

/// Given a capability, list the inbound port URIs that offer it.
pub trait Discovery {
    /// URIs of inbound ports offering `capability` (0..N).
    fn find_inbound_port_uris(
        &self,
        capability: &Capability,
    ) -> Result<Vec<PortUri>, DiscoveryError>;

    /// The single inbound port offering `capability`.
    ///
    /// # Errors
    ///
    /// `DiscoveryError::UnexpectedMatchCount` unless exactly one URI matches.
    fn find_single_inbound_port_uri(
        &self,
        capability: &Capability,
    ) -> Result<PortUri, DiscoveryError> {
        let uris = self.find_inbound_port_uris(capability)?;
        exactly_one(capability, uris)
    }
}

fn exactly_one(capability: &Capability, mut uris: Vec<PortUri>) -> Result<PortUri, DiscoveryError> {
    match uris.len() {
        1 => Ok(uris.remove(0)),
        found => Err(DiscoveryError::UnexpectedMatchCount {
            capability: capability.clone(),
            found,
        }),
    }
}

/// An outbound connection to a peer component's reflection port.
///
/// The port is created and connected by [`ReflectionClient::connect`] and
/// torn down by [`ReflectionClient::release`].
#[derive(Debug)]
pub struct ReflectionClient {
    owner: Arc<Component>,
    port: Arc<Port>,
}

impl ReflectionClient {
    /// Connect `owner` to the reflection port at `peer_discovery_uri`.
    pub fn connect(
        owner: &Arc<Component>,
        peer_discovery_uri: &PortUri,
    ) -> Result<Self, DiscoveryError> {
        let port = owner.create_port(PortSpec::outbound(REFLECTION));
        let connected = port
            .publish()
            .and_then(|()| port.do_connection(peer_discovery_uri, &ConnectorKey::REFLECTION));
        if let Err(err) = connected {
            if let Err(cleanup) = owner.destroy_port(port.uri()) {
                tracing::warn!(
                    port = %port.uri(),
                    error = %cleanup,
                    "failed to clean up reflection port"
                );
            }
            return Err(err.into());
        }
        tracing::debug!(
            component = %owner.name(),
            peer = %peer_discovery_uri,
            "connected to peer reflection port"
        );
        Ok(Self {
            owner: owner.clone(),
            port,
        })
    }

    /// Disconnect and destroy the reflection port.
    pub fn release(self) -> Result<(), DiscoveryError> {
        self.port.do_disconnection()?;
        self.owner.destroy_port(self.port.uri())?;
        Ok(())
    }
}

impl Discovery for ReflectionClient {
    fn find_inbound_port_uris(
        &self,
        capability: &Capability,
    ) -> Result<Vec<PortUri>, DiscoveryError> {
        let reply = self
            .port
            .call(Invocation::new(FIND_INBOUND_PORT_URIS, vec![json!(capability)]))?;
        serde_json::from_value(reply).map_err(|e| {
            DiscoveryError::Invocation(InvocationError::Serialization {
                message: e.to_string(),
            })
        })
    }
}
