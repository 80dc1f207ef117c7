//! Remote resolution across fabrics that share one address space.
//!
//! [`LoopbackResolver`] looks URIs up in the registries of other fabrics and
//! wraps what it finds in a [`RemotePortStub`]. Invocations through such a
//! stub are encoded to frames and decoded on the far side, exactly as they
//! would be over a real transport, so the remote code path is exercised
//! end to end without sockets.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::codec::{JsonCodec, MessageCodec};
use crate::connector::ConnectorKey;
use crate::error::{InvocationError, PortError, RegistryError};
use crate::port::{Invocation, PortRole, PortStub};
use crate::uri::PortUri;

use super::traits::{Registry, RemoteResolver};

/// Resolves URIs against the registries of attached peer fabrics.
#[derive(Debug, Default)]
pub struct LoopbackResolver {
    peers: RwLock<Vec<Arc<dyn Registry>>>,
}

impl LoopbackResolver {
    /// A resolver with no peers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the ports published in `registry` resolvable.
    pub fn attach(&self, registry: Arc<dyn Registry>) {
        self.peers.write().push(registry);
    }
}

impl RemoteResolver for LoopbackResolver {
    fn resolve(&self, uri: &PortUri) -> Result<Arc<dyn PortStub>, RegistryError> {
        let found = self.peers.read().iter().find_map(|peer| peer.get(uri));
        match found {
            Some(target) => {
                tracing::trace!(port = %uri, "resolved remote reference");
                Ok(Arc::new(RemotePortStub::new(target)))
            }
            None => Err(RegistryError::Unresolvable { uri: uri.clone() }),
        }
    }
}

/// Stand-in for a port living behind another fabric.
///
/// Every invocation is framed with the codec before it reaches the target,
/// and the reply is framed on its way back.
#[derive(Debug)]
pub struct RemotePortStub {
    target: Arc<dyn PortStub>,
    codec: JsonCodec,
}

impl RemotePortStub {
    /// Wrap `target` as a remote reference.
    pub fn new(target: Arc<dyn PortStub>) -> Self {
        Self {
            target,
            codec: JsonCodec,
        }
    }
}

impl PortStub for RemotePortStub {
    fn uri(&self) -> &PortUri {
        self.target.uri()
    }

    fn role(&self) -> PortRole {
        self.target.role()
    }

    fn is_remote(&self) -> bool {
        true
    }

    fn invoke(&self, invocation: Invocation) -> Result<Value, InvocationError> {
        let frame = self.codec.encode_invocation(&invocation)?;
        let reply = self.deliver(&frame)?;
        self.codec.decode_reply(&reply)
    }

    fn deliver(&self, frame: &[u8]) -> Result<Vec<u8>, InvocationError> {
        self.target.deliver(frame)
    }

    fn obey_connection(&self, initiator: &PortUri, key: &ConnectorKey) -> Result<(), PortError> {
        self.target.obey_connection(initiator, key)
    }

    fn obey_disconnection(&self, initiator: &PortUri) -> Result<(), PortError> {
        self.target.obey_disconnection(initiator)
    }
}
