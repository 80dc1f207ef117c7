//! Configuration for the connection fabric, worker pools and async-call
//! plugins.
//!
//! All three follow the same shape: sensible `Default`, a few shortcut
//! constructors, and an infallible builder for full control.
//!
//! ```rust
//! use mooring::config::{AsyncCallConfig, FabricConfig, SchedulerConfig};
//!
//! let fabric = FabricConfig::distributed("node-a");
//! assert!(fabric.is_distributed());
//!
//! let scheduler = SchedulerConfig::builder()
//!     .pool("calls", 4)
//!     .default_pool("calls")
//!     .build();
//! assert_eq!(scheduler.default_pool(), "calls");
//!
//! let calls = AsyncCallConfig::builder().preferred_pool("calls").build();
//! assert_eq!(calls.preferred_pool(), Some("calls"));
//! ```

use crate::connector::ConnectorKey;

/// Name of the pool every scheduler starts with.
pub const DEFAULT_POOL: &str = "default";

/// Settings for a [`Fabric`](crate::Fabric).
#[derive(Debug, Clone)]
pub struct FabricConfig {
    name: String,
    distributed: bool,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            name: "local".to_string(),
            distributed: false,
        }
    }
}

impl FabricConfig {
    /// A fabric that only resolves ports registered in its own registry.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            distributed: false,
        }
    }

    /// A fabric that falls back to remote resolution for unknown URIs.
    pub fn distributed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            distributed: true,
        }
    }

    /// Start building a fabric configuration.
    pub fn builder() -> FabricConfigBuilder {
        FabricConfigBuilder::default()
    }

    /// Name of this fabric, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether remote resolution is enabled.
    pub fn is_distributed(&self) -> bool {
        self.distributed
    }
}

/// Builder for [`FabricConfig`].
#[derive(Debug, Clone, Default)]
pub struct FabricConfigBuilder {
    name: Option<String>,
    distributed: bool,
}

impl FabricConfigBuilder {
    /// Set the fabric name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Enable or disable remote resolution.
    pub fn distributed(mut self, distributed: bool) -> Self {
        self.distributed = distributed;
        self
    }

    /// Build the fabric configuration (infallible).
    pub fn build(self) -> FabricConfig {
        let defaults = FabricConfig::default();
        FabricConfig {
            name: self.name.unwrap_or(defaults.name),
            distributed: self.distributed,
        }
    }
}

/// One named worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Pool name, referenced by plugins as their preferred pool.
    pub name: String,
    /// Number of worker threads.
    pub worker_threads: usize,
}

/// Worker pools a [`TokioScheduler`](crate::scheduler::TokioScheduler)
/// builds when it owns its runtimes.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    default_pool: String,
    pools: Vec<PoolConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_pool: DEFAULT_POOL.to_string(),
            pools: vec![PoolConfig {
                name: DEFAULT_POOL.to_string(),
                worker_threads: 2,
            }],
        }
    }
}

impl SchedulerConfig {
    /// Start building a scheduler configuration.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// Name of the pool used when no preferred pool applies.
    pub fn default_pool(&self) -> &str {
        &self.default_pool
    }

    /// All configured pools.
    pub fn pools(&self) -> &[PoolConfig] {
        &self.pools
    }
}

/// Builder for [`SchedulerConfig`].
///
/// The default pool is always present; adding a pool with the same name
/// replaces its thread count.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfigBuilder {
    default_pool: Option<String>,
    pools: Vec<PoolConfig>,
}

impl SchedulerConfigBuilder {
    /// Add a named pool.
    pub fn pool(mut self, name: impl Into<String>, worker_threads: usize) -> Self {
        let name = name.into();
        let worker_threads = worker_threads.max(1);
        match self.pools.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.worker_threads = worker_threads,
            None => self.pools.push(PoolConfig {
                name,
                worker_threads,
            }),
        }
        self
    }

    /// Select which pool is the default.
    pub fn default_pool(mut self, name: impl Into<String>) -> Self {
        self.default_pool = Some(name.into());
        self
    }

    /// Build the scheduler configuration (infallible).
    pub fn build(mut self) -> SchedulerConfig {
        let default_pool = self
            .default_pool
            .take()
            .unwrap_or_else(|| DEFAULT_POOL.to_string());
        if !self.pools.iter().any(|p| p.name == default_pool) {
            self.pools.push(PoolConfig {
                name: default_pool.clone(),
                worker_threads: 2,
            });
        }
        SchedulerConfig {
            default_pool,
            pools: self.pools,
        }
    }
}

/// Settings shared by the async-call client and server plugins.
#[derive(Debug, Clone)]
pub struct AsyncCallConfig {
    preferred_pool: Option<String>,
    call_connector: ConnectorKey,
    reception_connector: ConnectorKey,
}

impl Default for AsyncCallConfig {
    fn default() -> Self {
        Self {
            preferred_pool: None,
            call_connector: ConnectorKey::ASYNC_CALL,
            reception_connector: ConnectorKey::RESULT_RECEPTION,
        }
    }
}

impl AsyncCallConfig {
    /// Start building an async-call configuration.
    pub fn builder() -> AsyncCallConfigBuilder {
        AsyncCallConfigBuilder::default()
    }

    /// Pool the server submits `execute` tasks to, if set and present.
    pub fn preferred_pool(&self) -> Option<&str> {
        self.preferred_pool.as_deref()
    }

    /// Connector joining the client outbound port to the server inbound port.
    pub fn call_connector(&self) -> &ConnectorKey {
        &self.call_connector
    }

    /// Connector joining a server reception channel to the client reception port.
    pub fn reception_connector(&self) -> &ConnectorKey {
        &self.reception_connector
    }
}

/// Builder for [`AsyncCallConfig`].
#[derive(Debug, Clone, Default)]
pub struct AsyncCallConfigBuilder {
    preferred_pool: Option<String>,
    call_connector: Option<ConnectorKey>,
    reception_connector: Option<ConnectorKey>,
}

impl AsyncCallConfigBuilder {
    /// Set the preferred worker pool.
    pub fn preferred_pool(mut self, pool: impl Into<String>) -> Self {
        self.preferred_pool = Some(pool.into());
        self
    }

    /// Override the call connector key.
    pub fn call_connector(mut self, key: ConnectorKey) -> Self {
        self.call_connector = Some(key);
        self
    }

    /// Override the reception connector key.
    pub fn reception_connector(mut self, key: ConnectorKey) -> Self {
        self.reception_connector = Some(key);
        self
    }

    /// Build the async-call configuration (infallible).
    pub fn build(self) -> AsyncCallConfig {
        let defaults = AsyncCallConfig::default();
        AsyncCallConfig {
            preferred_pool: self.preferred_pool,
            call_connector: self.call_connector.unwrap_or(defaults.call_connector),
            reception_connector: self
                .reception_connector
                .unwrap_or(defaults.reception_connector),
        }
    }
}
