//! Connector construction keyed by [`ConnectorKey`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ConnectorError;

use super::standard::StandardConnector;
use super::traits::{Connector, ConnectorKey};

type Constructor = Arc<dyn Fn(&ConnectorKey) -> Arc<dyn Connector> + Send + Sync>;

/// Maps connector keys to constructors.
///
/// ```rust
/// use mooring::connector::{ConnectorFactory, ConnectorKey, StandardConnector};
/// use std::sync::Arc;
///
/// let factory = ConnectorFactory::with_defaults();
/// assert!(factory.contains(&ConnectorKey::ASYNC_CALL));
///
/// let audited = ConnectorKey::new("audited");
/// factory.register(audited.clone(), |key| Arc::new(StandardConnector::new(key.clone())));
/// assert!(factory.create(&audited).is_ok());
/// ```
pub struct ConnectorFactory {
    constructors: RwLock<HashMap<ConnectorKey, Constructor>>,
}

impl ConnectorFactory {
    /// A factory with no registered keys.
    pub fn empty() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// A factory where every built-in key builds a [`StandardConnector`].
    pub fn with_defaults() -> Self {
        let factory = Self::empty();
        for key in [
            ConnectorKey::DIRECT,
            ConnectorKey::TWO_WAY,
            ConnectorKey::DATA,
            ConnectorKey::REFLECTION,
            ConnectorKey::ASYNC_CALL,
            ConnectorKey::RESULT_RECEPTION,
        ] {
            factory.register(key, |key| Arc::new(StandardConnector::new(key.clone())));
        }
        factory
    }

    /// Register or replace the constructor for `key`.
    pub fn register<F>(&self, key: ConnectorKey, constructor: F)
    where
        F: Fn(&ConnectorKey) -> Arc<dyn Connector> + Send + Sync + 'static,
    {
        self.constructors.write().insert(key, Arc::new(constructor));
    }

    /// Whether `key` has a constructor.
    pub fn contains(&self, key: &ConnectorKey) -> bool {
        self.constructors.read().contains_key(key)
    }

    /// Build a fresh, unbound connector for `key`.
    pub fn create(&self, key: &ConnectorKey) -> Result<Arc<dyn Connector>, ConnectorError> {
        let constructor = self
            .constructors
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ConnectorError::UnknownKey { key: key.clone() })?;
        Ok(constructor(key))
    }
}

impl Default for ConnectorFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ConnectorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<_> = self.constructors.read().keys().cloned().collect();
        f.debug_struct("ConnectorFactory").field("keys", &keys).finish()
    }
}
