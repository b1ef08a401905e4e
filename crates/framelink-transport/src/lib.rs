//! Transport abstraction layer for Framelink.
//!
//! A game frame talks to its hosting platform through exactly two
//! primitives: post a structured value to the parent frame, and hear every
//! value any frame posts back. [`Transport`] captures those two as a trait
//! so the communicators never touch a concrete message bus.
//!
//! There is no origin or authenticity check on inbound messages. The
//! embedding contract with the platform is the trust boundary.
//!
//! # Implementations
//!
//! - [`MemoryTransport`]: an in-process frame pair with optional injected
//!   latency. Used by tests and demos in place of `postMessage`.
//! - `WebSocketTransport` (feature `websocket`, default): bridges a native
//!   game process to a platform over a WebSocket, one JSON text frame per
//!   message.
//!
//! # Listener registries
//!
//! [`ListenerRegistry`] and [`Subscription`] live here because receive
//! hooks are the first listeners in the stack; every higher layer reuses
//! them.

mod error;
mod listener;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use listener::{Listener, ListenerRegistry, Subscription, SubscriptionGuard};
pub use memory::MemoryTransport;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;

use std::sync::Arc;

use serde_json::Value;

/// Callback invoked for every inbound message.
pub type InboundHandler = Box<dyn Fn(&Value) + Send + Sync>;

/// A one-way channel to the parent frame plus a hook on inbound messages.
///
/// `send` does not serialize or validate: it hands the value over as-is.
/// Delivery is best-effort and at-most-once; messages from one sender
/// arrive in send order.
pub trait Transport: Send + Sync + 'static {
    /// Posts `message` to the parent frame.
    ///
    /// # Errors
    /// [`TransportError::NoParent`] when there is no parent to post to.
    fn send(&self, message: Value) -> Result<(), TransportError>;

    /// Subscribes `handler` to every inbound message, from any source.
    fn on_receive(&self, handler: InboundHandler) -> Subscription;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, message: Value) -> Result<(), TransportError> {
        (**self).send(message)
    }

    fn on_receive(&self, handler: InboundHandler) -> Subscription {
        (**self).on_receive(handler)
    }
}
