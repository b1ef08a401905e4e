//! In-process frame pair.
//!
//! [`MemoryTransport::pair`] returns two connected endpoints: whatever one
//! side sends, the other side's receive hooks see. Delivery always happens
//! on a later task turn (never inside `send`), the same way a posted
//! message is only seen after the sender's current callback returns.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::{InboundHandler, ListenerRegistry, Subscription, Transport, TransportError};

/// A message in flight, tagged with the instant it may be delivered.
struct Delivery {
    due: Instant,
    message: Value,
}

/// One end of an in-process frame pair.
pub struct MemoryTransport {
    parent: Option<mpsc::UnboundedSender<Delivery>>,
    hooks: Arc<ListenerRegistry<Value>>,
    latency: Duration,
    /// Dropped with the endpoint, which stops its delivery task.
    _alive: Option<oneshot::Sender<()>>,
}

impl MemoryTransport {
    /// Creates two connected endpoints with no added latency.
    ///
    /// Must be called inside a Tokio runtime: each endpoint spawns a
    /// delivery task.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_latency(Duration::ZERO)
    }

    /// Creates two connected endpoints; every message is held back for
    /// `latency` before the receiving side sees it.
    pub fn pair_with_latency(latency: Duration) -> (Self, Self) {
        let (to_a, a_inbox) = mpsc::unbounded_channel();
        let (to_b, b_inbox) = mpsc::unbounded_channel();

        let a = Self::endpoint(to_b, a_inbox, latency);
        let b = Self::endpoint(to_a, b_inbox, latency);
        (a, b)
    }

    /// An endpoint with no parent frame. Every `send` fails with
    /// [`TransportError::NoParent`].
    pub fn detached() -> Self {
        Self {
            parent: None,
            hooks: Arc::new(ListenerRegistry::new()),
            latency: Duration::ZERO,
            _alive: None,
        }
    }

    /// The delivery delay applied to messages sent from this endpoint.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    fn endpoint(
        parent: mpsc::UnboundedSender<Delivery>,
        inbox: mpsc::UnboundedReceiver<Delivery>,
        latency: Duration,
    ) -> Self {
        let hooks = Arc::new(ListenerRegistry::new());
        let (alive, dropped) = oneshot::channel();
        tokio::spawn(deliver(inbox, Arc::downgrade(&hooks), dropped));
        Self {
            parent: Some(parent),
            hooks,
            latency,
            _alive: Some(alive),
        }
    }
}

impl Transport for MemoryTransport {
    fn send(&self, message: Value) -> Result<(), TransportError> {
        let Some(parent) = &self.parent else {
            return Err(TransportError::NoParent);
        };
        let due = Instant::now() + self.latency;
        parent
            .send(Delivery { due, message })
            .map_err(|_| TransportError::ConnectionClosed("peer frame dropped".into()))
    }

    fn on_receive(&self, handler: InboundHandler) -> Subscription {
        self.hooks.add(move |message| handler(message))
    }
}

/// Drains one endpoint's inbox into its receive hooks, in arrival order.
///
/// Stops when the endpoint is dropped, closing the inbox so the peer's
/// next `send` fails.
async fn deliver(
    mut inbox: mpsc::UnboundedReceiver<Delivery>,
    hooks: Weak<ListenerRegistry<Value>>,
    mut dropped: oneshot::Receiver<()>,
) {
    loop {
        let next = tokio::select! {
            _ = &mut dropped => break,
            next = inbox.recv() => next,
        };
        let Some(Delivery { due, message }) = next else {
            break;
        };
        time::sleep_until(due).await;
        let Some(hooks) = hooks.upgrade() else {
            break;
        };
        let delivered = hooks.emit(&message);
        tracing::trace!(delivered, "memory frame delivered message");
    }
}
