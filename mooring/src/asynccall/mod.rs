//! Asynchronous calls with future-based results.
//!
//! A client component installs an [`AsyncCallClient`], a server component an
//! [`AsyncCallServer`]. The client discovers the server through its
//! reflection port and connects an outbound port to the server's inbound
//! port. Each call gets a fresh [`CorrelationId`](crate::uri::CorrelationId)
//! and returns a [`CallFuture`] immediately. The server runs the handler on
//! its worker pool and pushes the result back over a reception channel,
//! an outbound port it opens once per client towards the client's
//! reception port.
//!
//! ```text
//! client component                               server component
//! ┌────────────────────────┐                     ┌─────────────────────────┐
//! │ outbound (AsyncCall) ──┼──── asyncCall ─────►│ inbound (AsyncCall)     │
//! │                        │                     │      │ spawn_task       │
//! │ pending results        │                     │      ▼                  │
//! │ inbound (Reception) ◄──┼──── receive ────────┼─ reception channel      │
//! └────────────────────────┘                     └─────────────────────────┘
//! ```

mod client;
mod envelope;
mod handler;
mod pending;
mod sender;
mod server;

pub use client::AsyncCallClient;
pub use envelope::{CallEnvelope, CallInfo, CallOutcome, CallPayload, CalleeInfo, ResultPayload};
pub use handler::{handler_fn, CallContext, CallHandler, FnCallHandler};
pub use pending::{CallFuture, PendingResults};
pub use sender::ResultSender;
pub use server::AsyncCallServer;

use crate::uri::Capability;

/// Capability of the server's inbound call port.
pub const ASYNC_CALL: Capability = Capability::from_static("mooring.AsyncCall");

/// Capability of the client's result reception port.
pub const RESULT_RECEPTION: Capability =
    Capability::from_static("mooring.AsyncCallResultReception");

/// Client to server: submit one call.
pub const ASYNC_CALL_OP: &str = "asyncCall.call";

/// Client to server: drop the reception channel towards the caller.
pub const DISCONNECT_RECEPTION_OP: &str = "asyncCall.disconnectReceptionPort";

/// Server to client: deliver one result.
pub const RECEIVE_OP: &str = "asyncCall.receive";
