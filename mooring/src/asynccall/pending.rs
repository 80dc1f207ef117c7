//! Pending-result table and the non-cancellable call future.
//!
//! # Architecture
//!
//! ```text
//! Call flow:
//!   1. Client generates a correlation id
//!   2. register(): oneshot pair, sender stored in the table, CallFuture returned
//!   3. Envelope is stamped and transmitted
//!
//! Result flow:
//!   4. Reception port receives (correlation id, outcome)
//!   5. complete(): entry removed atomically, sender fires once
//!   6. CallFuture resolves
//!
//! Late or duplicate result:
//!   5'. complete(): no entry, result dropped (debug log only)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::CallError;
use crate::uri::CorrelationId;

use super::envelope::CallOutcome;

/// State for one outstanding call.
struct PendingCall {
    /// Consumed on completion; `None` afterwards.
    sender: Mutex<Option<oneshot::Sender<CallOutcome>>>,
    registered_at: Instant,
}

impl PendingCall {
    /// Complete once. Returns `false` if already completed or if the
    /// caller dropped its future.
    fn complete(&self, outcome: CallOutcome) -> bool {
        match self.sender.lock().take() {
            Some(sender) => sender.send(outcome).is_ok(),
            None => false,
        }
    }
}

/// Per-client map from correlation id to the sender of a pending future.
///
/// Every insert and remove is a single atomic map operation; completion
/// removes the entry before firing it, so of two racing deliveries for one
/// id exactly one completes the future.
#[derive(Default)]
pub struct PendingResults {
    entries: DashMap<CorrelationId, PendingCall>,
}

impl PendingResults {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending call and return its future.
    pub fn register(&self, correlation_id: CorrelationId) -> CallFuture {
        let (tx, rx) = oneshot::channel();
        let previous = self.entries.insert(
            correlation_id.clone(),
            PendingCall {
                sender: Mutex::new(Some(tx)),
                registered_at: Instant::now(),
            },
        );
        debug_assert!(previous.is_none(), "correlation id registered twice");
        CallFuture {
            correlation_id,
            receiver: rx,
        }
    }

    /// Deliver `outcome` to the call registered under `correlation_id`.
    ///
    /// Returns `true` if a pending future was completed. Unknown ids,
    /// duplicates and results for abandoned futures are dropped.
    pub fn complete(&self, correlation_id: &CorrelationId, outcome: CallOutcome) -> bool {
        match self.entries.remove(correlation_id) {
            Some((_, call)) => {
                let elapsed = call.registered_at.elapsed();
                let delivered = call.complete(outcome);
                if delivered {
                    tracing::debug!(
                        correlation_id = %correlation_id,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "call completed"
                    );
                } else {
                    tracing::debug!(
                        correlation_id = %correlation_id,
                        "caller abandoned its future, result dropped"
                    );
                }
                delivered
            }
            None => {
                tracing::debug!(
                    correlation_id = %correlation_id,
                    "result for unknown or already completed call dropped"
                );
                false
            }
        }
    }

    /// Forget a call that never reached the wire. Its future resolves to
    /// `CallError::Abandoned`.
    pub fn discard(&self, correlation_id: &CorrelationId) {
        self.entries.remove(correlation_id);
    }

    /// Forget every outstanding call; their futures resolve to
    /// `CallError::Abandoned`. Returns how many were outstanding.
    pub fn abandon_all(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Number of outstanding calls.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no call is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `correlation_id` is outstanding.
    pub fn contains(&self, correlation_id: &CorrelationId) -> bool {
        self.entries.contains_key(correlation_id)
    }
}

impl std::fmt::Debug for PendingResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResults")
            .field("outstanding", &self.entries.len())
            .finish()
    }
}

/// Future for the result of one asynchronous call.
///
/// The call has already been dispatched when this future exists, so it
/// cannot be cancelled: [`cancel`](Self::cancel) always returns `false`.
/// Dropping the future abandons the result; a late delivery is then dropped
/// by the pending table.
#[derive(Debug)]
pub struct CallFuture {
    correlation_id: CorrelationId,
    receiver: oneshot::Receiver<CallOutcome>,
}

impl CallFuture {
    /// Correlation id of the call.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Attempt to cancel the call. Always fails.
    pub fn cancel(&self) -> bool {
        false
    }

    /// Whether the call was cancelled. Always `false`.
    pub fn is_cancelled(&self) -> bool {
        false
    }

    /// Race the result against a timer. On expiry the future is abandoned
    /// and `CallError::Timeout` returned.
    pub async fn wait_timeout(self, timeout: Duration) -> CallOutcome {
        let correlation_id = self.correlation_id.clone();
        match tokio::time::timeout(timeout, self).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::debug!(
                    correlation_id = %correlation_id,
                    ?timeout,
                    "call abandoned after timeout"
                );
                Err(CallError::Timeout)
            }
        }
    }

    /// Await the result and decode it into `T`. A void result decodes from
    /// JSON `null`.
    pub async fn decode<T: DeserializeOwned>(self) -> Result<T, CallError> {
        let value = self.await?.unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| CallError::Serialization {
            message: e.to_string(),
        })
    }

    /// Block the current thread until the result arrives.
    ///
    /// Must not be called from within an async context.
    pub fn blocking_wait(self) -> CallOutcome {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(CallError::Abandoned))
    }
}

impl Future for CallFuture {
    type Output = CallOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(CallError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}
