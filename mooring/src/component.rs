//! Components: owners of ports and worker pools.
//!
//! A component generates its ports' URIs, keeps them alive, and publishes a
//! reflection port under its discovery URI so peers can ask which of its
//! inbound ports offer a given capability.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::discovery::{Discovery, FIND_INBOUND_PORT_URIS, REFLECTION};
use crate::error::{DiscoveryError, InvocationError, PortError, RegistryError};
use crate::fabric::Fabric;
use crate::port::{InboundHandler, Invocation, Port, PortRole};
use crate::scheduler::TaskScheduler;
use crate::uri::{Capability, PortUri};

/// What to create with [`Component::create_port`].
pub struct PortSpec {
    role: PortRole,
    capability: Capability,
    handler: Option<Arc<dyn InboundHandler>>,
    uri: Option<PortUri>,
}

impl PortSpec {
    /// A port with an explicit role.
    pub fn new(
        role: PortRole,
        capability: Capability,
        handler: Option<Arc<dyn InboundHandler>>,
    ) -> Self {
        Self {
            role,
            capability,
            handler,
            uri: None,
        }
    }

    /// An outbound port requiring `capability`.
    pub fn outbound(capability: Capability) -> Self {
        Self::new(PortRole::Outbound, capability, None)
    }

    /// An inbound port offering `capability` through `handler`.
    pub fn inbound(capability: Capability, handler: Option<Arc<dyn InboundHandler>>) -> Self {
        Self::new(PortRole::Inbound, capability, handler)
    }

    /// A two-way port; `handler` serves calls from the peer.
    pub fn two_way(capability: Capability, handler: Arc<dyn InboundHandler>) -> Self {
        Self::new(PortRole::TwoWay, capability, Some(handler))
    }

    /// A data inbound port answering pulls through `provider`.
    pub fn data_inbound(capability: Capability, provider: Arc<dyn InboundHandler>) -> Self {
        Self::new(PortRole::DataInbound, capability, Some(provider))
    }

    /// A data outbound port accepting pushes through `consumer`.
    pub fn data_outbound(capability: Capability, consumer: Arc<dyn InboundHandler>) -> Self {
        Self::new(PortRole::DataOutbound, capability, Some(consumer))
    }

    /// Use `uri` instead of a generated one.
    pub fn with_uri(mut self, uri: PortUri) -> Self {
        self.uri = Some(uri);
        self
    }
}

/// An independently deployable unit exposing capabilities through ports.
pub struct Component {
    name: String,
    fabric: Arc<Fabric>,
    scheduler: Arc<dyn TaskScheduler>,
    ports: DashMap<PortUri, Arc<Port>>,
    required: Mutex<HashSet<Capability>>,
    reflection: Arc<Port>,
}

impl Component {
    /// Create a component and publish its reflection port.
    ///
    /// # Errors
    ///
    /// Fails if the reflection port cannot be published.
    pub fn new(
        name: impl Into<String>,
        fabric: Arc<Fabric>,
        scheduler: Arc<dyn TaskScheduler>,
    ) -> Result<Arc<Self>, PortError> {
        let name = name.into();
        let component = Arc::new_cyclic(|me: &Weak<Component>| {
            let handler: Arc<dyn InboundHandler> = Arc::new(ReflectionHandler {
                component: me.clone(),
            });
            let reflection = Port::new(
                PortUri::generate(&PortRole::Inbound.uri_prefix(&name)),
                name.clone(),
                PortRole::Inbound,
                REFLECTION,
                Some(handler),
                fabric.clone(),
            );
            Component {
                name: name.clone(),
                fabric: fabric.clone(),
                scheduler,
                ports: DashMap::new(),
                required: Mutex::new(HashSet::new()),
                reflection,
            }
        });
        component.reflection.publish()?;
        tracing::debug!(
            component = %component.name,
            discovery = %component.discovery_uri(),
            "component started"
        );
        Ok(component)
    }

    /// Component name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URI of the reflection port peers query for discovery.
    pub fn discovery_uri(&self) -> &PortUri {
        self.reflection.uri()
    }

    /// The fabric this component's ports live in.
    pub fn fabric(&self) -> &Arc<Fabric> {
        &self.fabric
    }

    /// The component's worker pools.
    pub fn scheduler(&self) -> &Arc<dyn TaskScheduler> {
        &self.scheduler
    }

    /// Create an unpublished port owned by this component.
    pub fn create_port(&self, spec: PortSpec) -> Arc<Port> {
        let uri = spec
            .uri
            .unwrap_or_else(|| PortUri::generate(&spec.role.uri_prefix(&self.name)));
        let port = Port::new(
            uri,
            self.name.clone(),
            spec.role,
            spec.capability,
            spec.handler,
            self.fabric.clone(),
        );
        self.ports.insert(port.uri().clone(), port.clone());
        tracing::trace!(
            component = %self.name,
            port = %port.uri(),
            role = %port.role(),
            "port created"
        );
        port
    }

    /// Look up a port owned by this component.
    pub fn port(&self, uri: &PortUri) -> Option<Arc<Port>> {
        self.ports.get(uri).map(|entry| entry.value().clone())
    }

    /// Number of ports owned, not counting the reflection port.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Destroy and forget a port. Requires the port to be unconnected.
    pub fn destroy_port(&self, uri: &PortUri) -> Result<(), PortError> {
        let port = self
            .port(uri)
            .ok_or_else(|| RegistryError::NotFound { uri: uri.clone() })?;
        port.destroy()?;
        self.ports.remove(uri);
        Ok(())
    }

    /// URIs of published offering ports whose capability matches.
    pub fn find_inbound_port_uris(&self, capability: &Capability) -> Vec<PortUri> {
        let mut uris: Vec<PortUri> = self
            .ports
            .iter()
            .filter(|entry| {
                let port = entry.value();
                port.role().is_offering() && port.capability() == capability && port.is_published()
            })
            .map(|entry| entry.key().clone())
            .collect();
        uris.sort();
        uris
    }

    /// Record that this component requires `capability`. Returns `false`
    /// if it was already required.
    pub fn add_required(&self, capability: Capability) -> bool {
        self.required.lock().insert(capability)
    }

    /// Drop a required capability. Returns `false` if it was not required.
    pub fn remove_required(&self, capability: &Capability) -> bool {
        self.required.lock().remove(capability)
    }

    /// Whether `capability` is currently required.
    pub fn is_required(&self, capability: &Capability) -> bool {
        self.required.lock().contains(capability)
    }

    /// Disconnect every port this component initiated, drop the links its
    /// responders obeyed, then destroy all ports including the reflection
    /// port. Errors are logged and the shutdown continues; a port that
    /// could not be destroyed stays owned.
    pub fn shutdown(&self) {
        let ports: Vec<Arc<Port>> = self.ports.iter().map(|e| e.value().clone()).collect();
        for port in &ports {
            if port.is_initiator() {
                if let Err(err) = port.do_disconnection() {
                    tracing::warn!(
                        port = %port.uri(),
                        error = %err,
                        "disconnect during shutdown failed"
                    );
                }
            }
        }
        for port in &ports {
            port.abandon_obeyed_link();
        }
        for port in ports {
            if !port.is_destroyed() {
                if let Err(err) = port.destroy() {
                    tracing::warn!(
                        port = %port.uri(),
                        error = %err,
                        "destroy during shutdown failed"
                    );
                    continue;
                }
            }
            self.ports.remove(port.uri());
        }
        if let Err(err) = self.reflection.destroy() {
            tracing::debug!(component = %self.name, error = %err, "reflection port already gone");
        }
        tracing::debug!(component = %self.name, "component shut down");
    }
}

impl Discovery for Component {
    fn find_inbound_port_uris(
        &self,
        capability: &Capability,
    ) -> Result<Vec<PortUri>, DiscoveryError> {
        Ok(Component::find_inbound_port_uris(self, capability))
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("discovery_uri", self.discovery_uri())
            .field("ports", &self.ports.len())
            .finish()
    }
}

/// Serves discovery queries on the reflection port.
struct ReflectionHandler {
    component: Weak<Component>,
}

impl InboundHandler for ReflectionHandler {
    fn handle(&self, target: &PortUri, invocation: Invocation) -> Result<Value, InvocationError> {
        match invocation.operation.as_str() {
            FIND_INBOUND_PORT_URIS => {
                let capability: Capability = invocation.decode_arg(0)?;
                let component = self
                    .component
                    .upgrade()
                    .ok_or_else(|| InvocationError::Unavailable { uri: target.clone() })?;
                let uris = component.find_inbound_port_uris(&capability);
                tracing::trace!(
                    component = %component.name,
                    capability = %capability,
                    matches = uris.len(),
                    "answered discovery query"
                );
                Ok(json!(uris))
            }
            _ => Err(InvocationError::UnknownOperation {
                uri: target.clone(),
                operation: invocation.operation,
            }),
        }
    }
}
