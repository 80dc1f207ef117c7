//! The port record and its connection state machine.
//!
//! ```text
//! Unpublished ──publish──► Published ──do/obey_connection──► Connected
//!      ▲                      │  ▲                               │
//!      └──────unpublish───────┘  └──────do/obey_disconnection────┘
//!                             │
//!                          destroy ──► Destroyed
//! ```
//!
//! The link slot is the only source of truth for `connected()`. A connect
//! or disconnect first moves the slot to `Reserved` under the port guard,
//! then talks to the registry, the connector and the peer with the guard
//! released, and finally installs or clears the link. Two ports connecting
//! to each other therefore never hold each other's guards, and a concurrent
//! attempt on the same port fails with `ConnectionInProgress`.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;

use crate::connector::{Connector, ConnectorEnds, ConnectorKey};
use crate::error::{InvocationError, PortError};
use crate::fabric::Fabric;
use crate::uri::{Capability, PortUri};

use super::handler::{InboundHandler, DATA_REQUEST, DATA_SEND};
use super::role::{PortRole, ResponderMode, RoleStrategy};
use super::stub::{Invocation, PortStub};

/// Coarse observable state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    /// Created but not visible in the registry.
    Unpublished,
    /// Visible in the registry, no connector.
    Published,
    /// Carries exactly one connector.
    Connected,
    /// Terminal.
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Unpublished,
    Published,
    Destroyed,
}

/// Which end of the handshake a link was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkSide {
    Client,
    Server,
}

/// One connected edge as recorded by one of its ports.
pub(crate) struct Link {
    connector: Arc<dyn Connector>,
    peer: Arc<dyn PortStub>,
    side: LinkSide,
    client: PortUri,
    server: PortUri,
    remote: bool,
}

impl Link {
    fn peer_uri(&self) -> &PortUri {
        self.peer.uri()
    }
}

enum LinkSlot {
    Vacant,
    Reserved,
    Bound(Link),
}

struct PortState {
    lifecycle: Lifecycle,
    link: LinkSlot,
}

/// A typed connection point owned by a component.
///
/// Ports are created through [`Component::create_port`] and shared as
/// `Arc<Port>`; the registry holds them as `Arc<dyn PortStub>` while
/// published.
///
/// [`Component::create_port`]: crate::component::Component::create_port
pub struct Port {
    uri: PortUri,
    owner: String,
    role: PortRole,
    capability: Capability,
    strategy: Arc<dyn RoleStrategy>,
    handler: Option<Arc<dyn InboundHandler>>,
    fabric: Arc<Fabric>,
    me: Weak<Port>,
    state: Mutex<PortState>,
}

impl Port {
    pub(crate) fn new(
        uri: PortUri,
        owner: impl Into<String>,
        role: PortRole,
        capability: Capability,
        handler: Option<Arc<dyn InboundHandler>>,
        fabric: Arc<Fabric>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Port {
            uri,
            owner: owner.into(),
            role,
            capability,
            strategy: role.strategy(),
            handler,
            fabric,
            me: me.clone(),
            state: Mutex::new(PortState {
                lifecycle: Lifecycle::Unpublished,
                link: LinkSlot::Vacant,
            }),
        })
    }

    /// The port URI.
    pub fn uri(&self) -> &PortUri {
        &self.uri
    }

    /// Name of the owning component.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The port role.
    pub fn role(&self) -> PortRole {
        self.role
    }

    /// The capability this port offers or requires.
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Current observable state.
    pub fn status(&self) -> PortStatus {
        let state = self.state.lock();
        match (&state.lifecycle, &state.link) {
            (Lifecycle::Destroyed, _) => PortStatus::Destroyed,
            (_, LinkSlot::Bound(_)) => PortStatus::Connected,
            (Lifecycle::Published, _) => PortStatus::Published,
            (Lifecycle::Unpublished, _) => PortStatus::Unpublished,
        }
    }

    /// Whether the port is visible in the registry.
    pub fn is_published(&self) -> bool {
        self.state.lock().lifecycle == Lifecycle::Published
    }

    /// Whether the port is destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.state.lock().lifecycle == Lifecycle::Destroyed
    }

    /// Whether the port carries a connector.
    pub fn connected(&self) -> bool {
        matches!(self.state.lock().link, LinkSlot::Bound(_))
    }

    /// Whether the connected peer was resolved remotely.
    pub fn is_remote(&self) -> bool {
        self.with_link(|link| link.remote).unwrap_or(false)
    }

    /// URI of the connected peer.
    pub fn peer_uri(&self) -> Option<PortUri> {
        self.with_link(|link| link.peer_uri().clone())
    }

    /// Client end of the current connection as seen from this port. The
    /// initiator reports itself; a responder reports the reverse pair, so
    /// this is always the port's own URI while connected.
    pub fn client_uri(&self) -> Option<PortUri> {
        self.with_link(|link| link.client.clone())
    }

    /// Server end of the current connection as seen from this port: the
    /// peer's URI while connected.
    pub fn server_uri(&self) -> Option<PortUri> {
        self.with_link(|link| link.server.clone())
    }

    /// Whether this port initiated its current connection.
    pub fn is_initiator(&self) -> bool {
        self.with_link(|link| link.side == LinkSide::Client).unwrap_or(false)
    }

    /// Key of the current connector.
    pub fn connector_key(&self) -> Option<ConnectorKey> {
        self.with_link(|link| link.connector.key().clone())
    }

    fn with_link<T>(&self, f: impl FnOnce(&Link) -> T) -> Option<T> {
        match &self.state.lock().link {
            LinkSlot::Bound(link) => Some(f(link)),
            _ => None,
        }
    }

    /// Make the port resolvable through the fabric's registry.
    pub fn publish(&self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        match state.lifecycle {
            Lifecycle::Destroyed => return Err(self.destroyed()),
            Lifecycle::Published => {
                return Err(PortError::AlreadyPublished {
                    uri: self.uri.clone(),
                })
            }
            Lifecycle::Unpublished => {}
        }
        let stub = self.stub()?;
        self.fabric.registry().put(self.uri.clone(), stub)?;
        state.lifecycle = Lifecycle::Published;
        tracing::debug!(port = %self.uri, role = %self.role, "published");
        Ok(())
    }

    /// Remove the port from the registry. Requires `!connected()`.
    pub fn unpublish(&self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        match state.lifecycle {
            Lifecycle::Destroyed => return Err(self.destroyed()),
            Lifecycle::Unpublished => return Err(self.not_published()),
            Lifecycle::Published => {}
        }
        self.ensure_vacant(&state.link)?;
        self.fabric.registry().remove(&self.uri)?;
        state.lifecycle = Lifecycle::Unpublished;
        tracing::debug!(port = %self.uri, "unpublished");
        Ok(())
    }

    /// Destroy the port, unpublishing it first if needed. Requires
    /// `!connected()`. Destroying twice is a precondition violation.
    pub fn destroy(&self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.lifecycle == Lifecycle::Destroyed {
            return Err(self.destroyed());
        }
        self.ensure_vacant(&state.link)?;
        if state.lifecycle == Lifecycle::Published {
            self.fabric.registry().remove(&self.uri)?;
        }
        state.lifecycle = Lifecycle::Destroyed;
        tracing::debug!(port = %self.uri, "destroyed");
        Ok(())
    }

    /// Connect this port to `peer` through a connector built from `key`.
    ///
    /// Only initiating roles may call this. For two-way and data roles the
    /// peer obeys before the edge exists; if it refuses, this port stays
    /// unconnected.
    pub fn do_connection(&self, peer: &PortUri, key: &ConnectorKey) -> Result<(), PortError> {
        if !self.role.can_initiate() {
            return Err(PortError::InitiatorOnly {
                uri: self.uri.clone(),
                role: self.role,
            });
        }
        self.reserve()?;
        match self.initiate(peer, key) {
            Ok(link) => {
                tracing::debug!(
                    port = %self.uri,
                    peer = %peer,
                    connector = %key,
                    remote = link.remote,
                    "connected"
                );
                self.install(link);
                Ok(())
            }
            Err(err) => {
                self.release();
                tracing::debug!(port = %self.uri, peer = %peer, error = %err, "connection failed");
                Err(err)
            }
        }
    }

    fn initiate(&self, peer: &PortUri, key: &ConnectorKey) -> Result<Link, PortError> {
        let link = self.strategy.bind_as_initiator(self, peer, key)?;
        if self.strategy.peer_obeys() {
            if let Err(err) = link.peer.obey_connection(&self.uri, key) {
                link.connector.retire();
                return Err(err);
            }
        }
        Ok(link)
    }

    /// Disconnect the connection this port initiated, notifying the peer
    /// first. Local state is cleared even if the peer cannot be reached; the
    /// peer's error is then returned.
    pub fn do_disconnection(&self) -> Result<(), PortError> {
        if !self.role.can_initiate() {
            return Err(PortError::InitiatorOnly {
                uri: self.uri.clone(),
                role: self.role,
            });
        }
        let link = {
            let mut state = self.state.lock();
            if state.lifecycle == Lifecycle::Destroyed {
                return Err(self.destroyed());
            }
            match std::mem::replace(&mut state.link, LinkSlot::Reserved) {
                LinkSlot::Bound(link) if link.side == LinkSide::Client => link,
                other => {
                    let err = match &other {
                        LinkSlot::Bound(_) => PortError::NotInitiator {
                            uri: self.uri.clone(),
                        },
                        LinkSlot::Reserved => PortError::ConnectionInProgress {
                            uri: self.uri.clone(),
                        },
                        LinkSlot::Vacant => PortError::NotConnected {
                            uri: self.uri.clone(),
                        },
                    };
                    state.link = other;
                    return Err(err);
                }
            }
        };

        let notified = link.connector.obey_disconnection();
        self.state.lock().link = LinkSlot::Vacant;
        match &notified {
            Ok(()) => tracing::debug!(port = %self.uri, peer = %link.peer_uri(), "disconnected"),
            Err(err) => tracing::warn!(
                port = %self.uri,
                peer = %link.peer_uri(),
                error = %err,
                "peer failed to obey disconnection, cleared locally"
            ),
        }
        notified
    }

    /// Drop a link this port obeyed without involving the initiator, whose
    /// later calls then see this port as unavailable. Returns `false` when
    /// there was no such link.
    pub(crate) fn abandon_obeyed_link(&self) -> bool {
        let link = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut state.link, LinkSlot::Vacant) {
                LinkSlot::Bound(link) if link.side == LinkSide::Server => link,
                other => {
                    state.link = other;
                    return false;
                }
            }
        };
        link.connector.retire();
        tracing::debug!(port = %self.uri, initiator = %link.peer_uri(), "abandoned obeyed link");
        true
    }

    /// Call the connected peer.
    pub fn call(&self, invocation: Invocation) -> Result<Value, InvocationError> {
        let connector = match &self.state.lock().link {
            LinkSlot::Bound(link) => link.connector.clone(),
            _ => {
                return Err(InvocationError::NotConnected {
                    uri: self.uri.clone(),
                })
            }
        };
        connector.invoke(invocation)
    }

    /// Pull the next value from the connected data provider.
    pub fn pull(&self) -> Result<Value, InvocationError> {
        self.require_role(PortRole::DataOutbound, DATA_REQUEST)?;
        self.call(Invocation::new(DATA_REQUEST, Vec::new()))
    }

    /// Push a value to the connected data consumer.
    pub fn push(&self, value: Value) -> Result<(), InvocationError> {
        self.require_role(PortRole::DataInbound, DATA_SEND)?;
        self.call(Invocation::new(DATA_SEND, vec![value]))?;
        Ok(())
    }

    fn require_role(&self, role: PortRole, operation: &str) -> Result<(), InvocationError> {
        if self.role == role {
            Ok(())
        } else {
            Err(InvocationError::WrongRole {
                uri: self.uri.clone(),
                role: self.role,
                operation: operation.to_string(),
            })
        }
    }

    /// Resolve `peer`, build a connector for `key` and bind it with this
    /// port on the requiring side.
    pub(crate) fn open_link(
        &self,
        peer: &PortUri,
        key: &ConnectorKey,
        side: LinkSide,
    ) -> Result<Link, PortError> {
        let (stub, remote) = self.fabric.resolve(peer)?;
        let peer_role = stub.role();
        if !self.strategy.accepts(peer_role) {
            return Err(PortError::IncompatibleRoles {
                uri: self.uri.clone(),
                local: self.role,
                peer: peer_role,
            });
        }

        let connector = self.fabric.connectors().create(key)?;
        connector.bind(ConnectorEnds {
            offering: stub.clone(),
            requiring: self.uri.clone(),
            remote,
        })?;

        Ok(Link {
            connector,
            peer: stub,
            side,
            client: self.uri.clone(),
            server: peer.clone(),
            remote,
        })
    }

    fn reserve(&self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        match state.lifecycle {
            Lifecycle::Destroyed => return Err(self.destroyed()),
            Lifecycle::Unpublished => return Err(self.not_published()),
            Lifecycle::Published => {}
        }
        self.ensure_vacant(&state.link)?;
        state.link = LinkSlot::Reserved;
        Ok(())
    }

    fn install(&self, link: Link) {
        self.state.lock().link = LinkSlot::Bound(link);
    }

    fn release(&self) {
        let mut state = self.state.lock();
        if matches!(state.link, LinkSlot::Reserved) {
            state.link = LinkSlot::Vacant;
        }
    }

    fn ensure_vacant(&self, link: &LinkSlot) -> Result<(), PortError> {
        match link {
            LinkSlot::Vacant => Ok(()),
            LinkSlot::Reserved => Err(PortError::ConnectionInProgress {
                uri: self.uri.clone(),
            }),
            LinkSlot::Bound(_) => Err(PortError::AlreadyConnected {
                uri: self.uri.clone(),
            }),
        }
    }

    fn ensure_published(&self) -> Result<(), PortError> {
        match self.state.lock().lifecycle {
            Lifecycle::Published => Ok(()),
            Lifecycle::Unpublished => Err(self.not_published()),
            Lifecycle::Destroyed => Err(self.destroyed()),
        }
    }

    fn stub(&self) -> Result<Arc<dyn PortStub>, PortError> {
        match self.me.upgrade() {
            Some(port) => {
                let stub: Arc<dyn PortStub> = port;
                Ok(stub)
            }
            None => Err(self.destroyed()),
        }
    }

    fn destroyed(&self) -> PortError {
        PortError::Destroyed {
            uri: self.uri.clone(),
        }
    }

    fn not_published(&self) -> PortError {
        PortError::NotPublished {
            uri: self.uri.clone(),
        }
    }
}

impl PortStub for Port {
    fn uri(&self) -> &PortUri {
        &self.uri
    }

    fn role(&self) -> PortRole {
        self.role
    }

    fn invoke(&self, invocation: Invocation) -> Result<Value, InvocationError> {
        if self.is_destroyed() {
            return Err(InvocationError::Unavailable {
                uri: self.uri.clone(),
            });
        }
        match &self.handler {
            Some(handler) => handler.handle(&self.uri, invocation),
            None => Err(InvocationError::NoHandler {
                uri: self.uri.clone(),
            }),
        }
    }

    fn obey_connection(&self, initiator: &PortUri, key: &ConnectorKey) -> Result<(), PortError> {
        match self.strategy.responder_mode() {
            ResponderMode::Refuses => Err(PortError::NotResponder {
                uri: self.uri.clone(),
                role: self.role,
            }),
            ResponderMode::Stateless => self.ensure_published(),
            ResponderMode::Linked => {
                self.reserve()?;
                match self.strategy.bind_as_responder(self, initiator, key) {
                    Ok(link) => {
                        tracing::debug!(
                            port = %self.uri,
                            initiator = %initiator,
                            remote = link.remote,
                            "obeyed connection"
                        );
                        self.install(link);
                        Ok(())
                    }
                    Err(err) => {
                        self.release();
                        Err(err)
                    }
                }
            }
        }
    }

    fn obey_disconnection(&self, initiator: &PortUri) -> Result<(), PortError> {
        if self.strategy.responder_mode() != ResponderMode::Linked {
            return Ok(());
        }
        let link = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut state.link, LinkSlot::Vacant) {
                LinkSlot::Bound(link)
                    if link.side == LinkSide::Server && link.peer_uri() == initiator =>
                {
                    link
                }
                other => {
                    let err = match &other {
                        LinkSlot::Reserved => PortError::ConnectionInProgress {
                            uri: self.uri.clone(),
                        },
                        _ => PortError::NotConnected {
                            uri: self.uri.clone(),
                        },
                    };
                    state.link = other;
                    return Err(err);
                }
            }
        };
        link.connector.retire();
        tracing::debug!(port = %self.uri, initiator = %initiator, "obeyed disconnection");
        Ok(())
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("uri", &self.uri)
            .field("owner", &self.owner)
            .field("role", &self.role)
            .field("capability", &self.capability)
            .field("status", &self.status())
            .finish()
    }
}
