//! Port roles and the per-role connection strategies.
//!
//! The port record in [`record`](super::record) runs the same connection
//! protocol for every role. What differs per role (which peers it accepts,
//! whether it may initiate, whether the peer must answer, what it records
//! when answering) lives behind [`RoleStrategy`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::connector::ConnectorKey;
use crate::error::PortError;
use crate::uri::PortUri;

use super::record::{Link, LinkSide, Port};

/// The role of a port in its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRole {
    /// Offers a capability; never initiates.
    Inbound,
    /// Requires a capability; initiates toward an inbound port.
    Outbound,
    /// Symmetric; either side may initiate, both record the link.
    TwoWay,
    /// Offers a data stream; answers a data outbound port and pushes to it.
    DataInbound,
    /// Requires a data stream; initiates and pulls.
    DataOutbound,
}

impl PortRole {
    /// Whether `do_connection` is legal on a port with this role.
    pub fn can_initiate(self) -> bool {
        !matches!(self, PortRole::Inbound | PortRole::DataInbound)
    }

    /// Whether the port offers its capability to others.
    pub fn is_offering(self) -> bool {
        matches!(
            self,
            PortRole::Inbound | PortRole::TwoWay | PortRole::DataInbound
        )
    }

    pub(crate) fn strategy(self) -> Arc<dyn RoleStrategy> {
        match self {
            PortRole::Inbound => Arc::new(InboundStrategy),
            PortRole::Outbound => Arc::new(OutboundStrategy),
            PortRole::TwoWay => Arc::new(TwoWayStrategy),
            PortRole::DataInbound => Arc::new(DataInboundStrategy),
            PortRole::DataOutbound => Arc::new(DataOutboundStrategy),
        }
    }

    fn short(self) -> &'static str {
        match self {
            PortRole::Inbound => "in",
            PortRole::Outbound => "out",
            PortRole::TwoWay => "twoway",
            PortRole::DataInbound => "datain",
            PortRole::DataOutbound => "dataout",
        }
    }

    /// Prefix used when generating URIs for ports with this role.
    pub(crate) fn uri_prefix(self, owner: &str) -> String {
        format!("{owner}/{}", self.short())
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortRole::Inbound => "inbound",
            PortRole::Outbound => "outbound",
            PortRole::TwoWay => "two-way",
            PortRole::DataInbound => "data-inbound",
            PortRole::DataOutbound => "data-outbound",
        };
        f.write_str(name)
    }
}

/// How a port answers `obey_connection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResponderMode {
    /// The role cannot be the target of a connection.
    Refuses,
    /// Accept any number of initiators without recording anything.
    Stateless,
    /// Record a link back toward the initiator.
    Linked,
}

/// Role-specific half of the connection protocol.
pub(crate) trait RoleStrategy: Send + Sync + fmt::Debug {
    /// Whether a peer with `peer` role may be joined to this port.
    fn accepts(&self, peer: PortRole) -> bool;

    /// Whether the peer must run `obey_connection` before the edge exists.
    fn peer_obeys(&self) -> bool;

    fn responder_mode(&self) -> ResponderMode;

    /// Build the initiator's link toward `peer`.
    fn bind_as_initiator(
        &self,
        port: &Port,
        peer: &PortUri,
        key: &ConnectorKey,
    ) -> Result<Link, PortError> {
        port.open_link(peer, key, LinkSide::Client)
    }

    /// Build the responder's link back toward `initiator`.
    fn bind_as_responder(
        &self,
        port: &Port,
        initiator: &PortUri,
        key: &ConnectorKey,
    ) -> Result<Link, PortError> {
        port.open_link(initiator, key, LinkSide::Server)
    }
}

#[derive(Debug)]
struct InboundStrategy;

impl RoleStrategy for InboundStrategy {
    fn accepts(&self, peer: PortRole) -> bool {
        peer == PortRole::Outbound
    }

    fn peer_obeys(&self) -> bool {
        false
    }

    fn responder_mode(&self) -> ResponderMode {
        ResponderMode::Stateless
    }

    fn bind_as_initiator(
        &self,
        port: &Port,
        _peer: &PortUri,
        _key: &ConnectorKey,
    ) -> Result<Link, PortError> {
        Err(PortError::InitiatorOnly {
            uri: port.uri().clone(),
            role: PortRole::Inbound,
        })
    }
}

#[derive(Debug)]
struct OutboundStrategy;

impl RoleStrategy for OutboundStrategy {
    fn accepts(&self, peer: PortRole) -> bool {
        peer == PortRole::Inbound
    }

    // Inbound ports are stateless responders.
    fn peer_obeys(&self) -> bool {
        false
    }

    fn responder_mode(&self) -> ResponderMode {
        ResponderMode::Refuses
    }
}

#[derive(Debug)]
struct TwoWayStrategy;

impl RoleStrategy for TwoWayStrategy {
    fn accepts(&self, peer: PortRole) -> bool {
        peer == PortRole::TwoWay
    }

    fn peer_obeys(&self) -> bool {
        true
    }

    fn responder_mode(&self) -> ResponderMode {
        ResponderMode::Linked
    }
}

#[derive(Debug)]
struct DataInboundStrategy;

impl RoleStrategy for DataInboundStrategy {
    fn accepts(&self, peer: PortRole) -> bool {
        peer == PortRole::DataOutbound
    }

    fn peer_obeys(&self) -> bool {
        false
    }

    // The recorded link is the push channel toward the client.
    fn responder_mode(&self) -> ResponderMode {
        ResponderMode::Linked
    }

    fn bind_as_initiator(
        &self,
        port: &Port,
        _peer: &PortUri,
        _key: &ConnectorKey,
    ) -> Result<Link, PortError> {
        Err(PortError::InitiatorOnly {
            uri: port.uri().clone(),
            role: PortRole::DataInbound,
        })
    }
}

#[derive(Debug)]
struct DataOutboundStrategy;

impl RoleStrategy for DataOutboundStrategy {
    fn accepts(&self, peer: PortRole) -> bool {
        peer == PortRole::DataInbound
    }

    fn peer_obeys(&self) -> bool {
        true
    }

    fn responder_mode(&self) -> ResponderMode {
        ResponderMode::Refuses
    }
}
