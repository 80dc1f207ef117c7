//! Identifiers: port URIs, capabilities and call correlation ids.
//!
//! - [`UID`]: 128-bit random identifier, the source of generated URIs
//! - [`PortUri`]: globally unique port name used by the registries
//! - [`Capability`]: the interface a port offers or requires
//! - [`CorrelationId`]: unique token pairing an async call with its result

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// 128-bit unique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UID {
    /// First 64 bits.
    pub first: u64,
    /// Second 64 bits.
    pub second: u64,
}

impl UID {
    /// Create a new UID with explicit values.
    pub const fn new(first: u64, second: u64) -> Self {
        Self { first, second }
    }

    /// Create a random UID.
    pub fn random() -> Self {
        Self {
            first: rand::random(),
            second: rand::random(),
        }
    }

    /// Check if UID is valid (non-zero).
    pub const fn is_valid(&self) -> bool {
        self.first != 0 || self.second != 0
    }
}

impl fmt::Display for UID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            self.first >> 32,
            (self.first >> 16) & 0xffff,
            self.first & 0xffff,
            self.second >> 48,
            self.second & 0xffff_ffff_ffff
        )
    }
}

/// Globally unique name of a port.
///
/// Registries, connectors and reception channels are all keyed by URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortUri(String);

impl PortUri {
    /// Wrap an existing URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Generate a fresh URI under `prefix`.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", UID::random()))
    }

    /// The URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortUri {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for PortUri {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

/// Name of an interface offered by inbound ports and required by outbound ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(Cow<'static, str>);

impl Capability {
    /// A capability known at compile time.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// A capability built at runtime.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// The capability name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static NEXT_CORRELATION: AtomicU64 = AtomicU64::new(1);
static PROCESS_TAG: OnceLock<UID> = OnceLock::new();

/// Token pairing an asynchronous call with its result.
///
/// Ids combine a per-process random tag with a process-wide counter, so they
/// are unique across every client in the process and across processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate the next correlation id.
    pub fn next() -> Self {
        let tag = PROCESS_TAG.get_or_init(UID::random);
        let seq = NEXT_CORRELATION.fetch_add(1, Ordering::Relaxed);
        Self(format!("{:016x}-{seq}", tag.first))
    }

    /// Wrap an id received from the wire.
    pub fn from_wire(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
