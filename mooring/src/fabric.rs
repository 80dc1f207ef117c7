//! The per-process connection fabric.
//!
//! A [`Fabric`] bundles everything the port layer needs from its
//! surroundings: the registry ports publish into, the optional remote
//! resolver, the connector factory and the configuration. Every port holds
//! an `Arc<Fabric>`; there is no global state.
//!
//! ```rust
//! use mooring::config::FabricConfig;
//! use mooring::registry::LoopbackResolver;
//! use mooring::Fabric;
//! use std::sync::Arc;
//!
//! let resolver = Arc::new(LoopbackResolver::new());
//! let fabric = Fabric::builder(FabricConfig::distributed("node-a"))
//!     .resolver(resolver.clone())
//!     .build();
//! assert!(fabric.config().is_distributed());
//! ```

use std::sync::Arc;

use crate::config::FabricConfig;
use crate::connector::ConnectorFactory;
use crate::error::RegistryError;
use crate::port::PortStub;
use crate::registry::{InMemoryRegistry, Registry, RemoteResolver};
use crate::uri::PortUri;

/// Registry, resolver, connector factory and config of one process.
#[derive(Debug)]
pub struct Fabric {
    config: FabricConfig,
    registry: Arc<dyn Registry>,
    resolver: Option<Arc<dyn RemoteResolver>>,
    connectors: ConnectorFactory,
}

impl Fabric {
    /// A fabric with an in-memory registry, default connectors and no
    /// remote resolver.
    pub fn new(config: FabricConfig) -> Arc<Self> {
        Self::builder(config).build()
    }

    /// Start building a fabric.
    pub fn builder(config: FabricConfig) -> FabricBuilder {
        FabricBuilder {
            config,
            registry: None,
            resolver: None,
            connectors: None,
        }
    }

    /// The fabric configuration.
    pub fn config(&self) -> &FabricConfig {
        &self.config
    }

    /// The local registry.
    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// The connector factory.
    pub fn connectors(&self) -> &ConnectorFactory {
        &self.connectors
    }

    /// Resolve `uri` to a callable stub.
    ///
    /// The local registry is probed first. Only when it misses and the
    /// fabric is distributed is the remote resolver consulted; the returned
    /// flag is `true` in that case.
    pub fn resolve(&self, uri: &PortUri) -> Result<(Arc<dyn PortStub>, bool), RegistryError> {
        if let Some(stub) = self.registry.get(uri) {
            return Ok((stub, false));
        }
        match &self.resolver {
            Some(resolver) if self.config.is_distributed() => {
                let stub = resolver.resolve(uri)?;
                tracing::debug!(fabric = %self.config.name(), port = %uri, "resolved remotely");
                Ok((stub, true))
            }
            _ => Err(RegistryError::Unresolvable { uri: uri.clone() }),
        }
    }
}

/// Builder for [`Fabric`].
pub struct FabricBuilder {
    config: FabricConfig,
    registry: Option<Arc<dyn Registry>>,
    resolver: Option<Arc<dyn RemoteResolver>>,
    connectors: Option<ConnectorFactory>,
}

impl FabricBuilder {
    /// Use `registry` instead of a fresh in-memory one.
    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the remote resolver. Ignored unless the config is distributed.
    pub fn resolver(mut self, resolver: Arc<dyn RemoteResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use `connectors` instead of the default factory.
    pub fn connectors(mut self, connectors: ConnectorFactory) -> Self {
        self.connectors = Some(connectors);
        self
    }

    /// Build the fabric (infallible).
    pub fn build(self) -> Arc<Fabric> {
        Arc::new(Fabric {
            config: self.config,
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(InMemoryRegistry::new())),
            resolver: self.resolver,
            connectors: self.connectors.unwrap_or_default(),
        })
    }
}
