//! Registry and remote-resolution trait definitions.

use std::fmt;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::port::PortStub;
use crate::uri::PortUri;

/// Maps port URIs to the stubs of published ports.
///
/// A registry is purely a lookup collaborator: ports put themselves in on
/// `publish()` and take themselves out on `unpublish()`/`destroy()`, and
/// connect operations read it to resolve peers.
///
/// # Concurrency
///
/// Implementations are shared between threads. `put` is a single-winner
/// insert: of two concurrent puts for one URI, exactly one succeeds.
pub trait Registry: Send + Sync + fmt::Debug {
    /// Look up the stub published under `uri`.
    fn get(&self, uri: &PortUri) -> Option<Arc<dyn PortStub>>;

    /// Publish `stub` under `uri`.
    ///
    /// # Errors
    ///
    /// `RegistryError::AlreadyRegistered` if `uri` is taken.
    fn put(&self, uri: PortUri, stub: Arc<dyn PortStub>) -> Result<(), RegistryError>;

    /// Withdraw the stub published under `uri`.
    ///
    /// # Errors
    ///
    /// `RegistryError::NotFound` if nothing is published under `uri`.
    fn remove(&self, uri: &PortUri) -> Result<Arc<dyn PortStub>, RegistryError>;

    /// Number of published ports.
    fn len(&self) -> usize;

    /// Whether no port is published.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves URIs that are not in the local registry to remote references.
///
/// Only consulted by a distributed fabric, and only after the local registry
/// missed.
pub trait RemoteResolver: Send + Sync + fmt::Debug {
    /// Resolve `uri` to a stub that forwards across the process boundary.
    ///
    /// # Errors
    ///
    /// `RegistryError::Unresolvable` if no remote peer publishes `uri`.
    fn resolve(&self, uri: &PortUri) -> Result<Arc<dyn PortStub>, RegistryError>;
}
