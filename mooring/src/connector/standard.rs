//! The default connector: a single-use edge between two port ends.

use parking_lot::Mutex;
use serde_json::Value;

use crate::codec::{JsonCodec, MessageCodec};
use crate::error::{ConnectorError, InvocationError, PortError};
use crate::port::Invocation;

use super::traits::{Connector, ConnectorEnds, ConnectorKey};

#[derive(Debug)]
enum Binding {
    Fresh,
    Bound(ConnectorEnds),
    Retired,
}

/// Forwards invocations to the offering end, locally by direct dispatch or
/// remotely through codec frames.
#[derive(Debug)]
pub struct StandardConnector<C: MessageCodec = JsonCodec> {
    key: ConnectorKey,
    codec: C,
    binding: Mutex<Binding>,
}

impl StandardConnector<JsonCodec> {
    /// Create an unbound connector using JSON frames for remote delivery.
    pub fn new(key: ConnectorKey) -> Self {
        Self::with_codec(key, JsonCodec)
    }
}

impl<C: MessageCodec + std::fmt::Debug> StandardConnector<C> {
    /// Create an unbound connector with a custom frame codec.
    pub fn with_codec(key: ConnectorKey, codec: C) -> Self {
        Self {
            key,
            codec,
            binding: Mutex::new(Binding::Fresh),
        }
    }

    fn take_ends(&self) -> Option<ConnectorEnds> {
        let mut binding = self.binding.lock();
        match std::mem::replace(&mut *binding, Binding::Retired) {
            Binding::Bound(ends) => Some(ends),
            _ => None,
        }
    }
}

impl<C: MessageCodec + std::fmt::Debug> Connector for StandardConnector<C> {
    fn key(&self) -> &ConnectorKey {
        &self.key
    }

    fn bind(&self, ends: ConnectorEnds) -> Result<(), ConnectorError> {
        let mut binding = self.binding.lock();
        match *binding {
            Binding::Fresh => {
                *binding = Binding::Bound(ends);
                Ok(())
            }
            Binding::Bound(_) => Err(ConnectorError::AlreadyBound {
                key: self.key.clone(),
            }),
            Binding::Retired => Err(ConnectorError::Retired {
                key: self.key.clone(),
            }),
        }
    }

    fn is_bound(&self) -> bool {
        matches!(*self.binding.lock(), Binding::Bound(_))
    }

    fn is_remote(&self) -> bool {
        matches!(&*self.binding.lock(), Binding::Bound(ends) if ends.remote)
    }

    fn invoke(&self, invocation: Invocation) -> Result<Value, InvocationError> {
        let ends = match &*self.binding.lock() {
            Binding::Bound(ends) => ends.clone(),
            _ => {
                return Err(InvocationError::ConnectorUnbound {
                    key: self.key.clone(),
                })
            }
        };

        tracing::trace!(
            connector = %self.key,
            from = %ends.requiring,
            to = %ends.offering.uri(),
            operation = %invocation.operation,
            remote = ends.remote,
            "forwarding invocation"
        );

        if ends.remote {
            let frame = self.codec.encode_invocation(&invocation)?;
            let reply = ends.offering.deliver(&frame)?;
            self.codec.decode_reply(&reply)
        } else {
            ends.offering.invoke(invocation)
        }
    }

    fn obey_disconnection(&self) -> Result<(), PortError> {
        match self.take_ends() {
            Some(ends) => ends.offering.obey_disconnection(&ends.requiring),
            None => Ok(()),
        }
    }

    fn retire(&self) {
        let _ = self.take_ends();
    }
}
