//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes committed events to consumers: the audit trail, the
//! notification outbox, and read-model projections. Delivery is
//! at-least-once and events are persisted to the store before publication,
//! so consumers must be idempotent; the store remains the source of truth.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of all events published to the bus
/// (broadcast semantics). Designed for single-threaded consumption.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently queued (non-blocking).
    pub fn drain(&self) -> Vec<M> {
        let mut out = Vec::new();
        while let Ok(m) = self.receiver.try_recv() {
            out.push(m);
        }
        out
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// Transport-agnostic: the in-memory implementation covers tests and
/// single-process deployments; a broker-backed implementation can be swapped
/// in without touching domain code. `publish` failures are surfaced to the
/// caller, which treats them as degraded-mode observability warnings since
/// the events are already persisted.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
