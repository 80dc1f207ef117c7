//! In-memory registry backed by a concurrent map.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::RegistryError;
use crate::port::PortStub;
use crate::uri::PortUri;

use super::traits::Registry;

/// Registry holding published ports of one process.
///
/// Each fabric gets its own instance; there is no process-wide singleton, so
/// tests can run several isolated "processes" side by side.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    ports: DashMap<PortUri, Arc<dyn PortStub>>,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// URIs of every published port.
    pub fn uris(&self) -> Vec<PortUri> {
        self.ports.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Registry for InMemoryRegistry {
    fn get(&self, uri: &PortUri) -> Option<Arc<dyn PortStub>> {
        let found = self.ports.get(uri).map(|entry| entry.value().clone());
        tracing::trace!(port = %uri, found = found.is_some(), "registry lookup");
        found
    }

    fn put(&self, uri: PortUri, stub: Arc<dyn PortStub>) -> Result<(), RegistryError> {
        match self.ports.entry(uri) {
            Entry::Occupied(entry) => Err(RegistryError::AlreadyRegistered {
                uri: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                tracing::trace!(port = %entry.key(), "registry insert");
                entry.insert(stub);
                Ok(())
            }
        }
    }

    fn remove(&self, uri: &PortUri) -> Result<Arc<dyn PortStub>, RegistryError> {
        self.ports
            .remove(uri)
            .map(|(_, stub)| stub)
            .ok_or_else(|| RegistryError::NotFound { uri: uri.clone() })
    }

    fn len(&self) -> usize {
        self.ports.len()
    }
}
