//! Port registries and remote resolution.
//!
//! - [`Registry`]: get/put/remove by URI, injected into every port through
//!   its fabric
//! - [`InMemoryRegistry`]: the per-process implementation
//! - [`RemoteResolver`]: fallback for URIs the local registry does not know
//! - [`LoopbackResolver`] / [`RemotePortStub`]: remote references to ports
//!   of other fabrics in the same address space

mod loopback;
mod memory;
mod traits;

pub use loopback::{LoopbackResolver, RemotePortStub};
pub use memory::InMemoryRegistry;
pub use traits::{Registry, RemoteResolver};
