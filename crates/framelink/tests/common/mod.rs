//! A scripted platform for communicator tests.
//!
//! The platform holds the far end of a `MemoryTransport` pair: it sees
//! everything the communicator sends and can send anything back.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use framelink::protocol::{Message, MessageType};
use framelink::transport::{MemoryTransport, Transport};
use serde_json::Value;
use tokio::sync::mpsc;

pub struct Platform {
    transport: MemoryTransport,
    inbox: mpsc::UnboundedReceiver<Value>,
}

impl Platform {
    /// Returns the game-side transport and the platform holding the other end.
    pub fn attach() -> (Arc<dyn Transport>, Platform) {
        Self::attach_with_latency(Duration::ZERO)
    }

    pub fn attach_with_latency(latency: Duration) -> (Arc<dyn Transport>, Platform) {
        let (game, platform) = MemoryTransport::pair_with_latency(latency);
        let (tx, inbox) = mpsc::unbounded_channel();
        let _ = platform.on_receive(Box::new(move |message: &Value| {
            let _ = tx.send(message.clone());
        }));
        (
            Arc::new(game),
            Platform {
                transport: platform,
                inbox,
            },
        )
    }

    pub fn send(&self, message: Message) {
        self.transport.send(message.to_value().unwrap()).unwrap();
    }

    pub fn send_raw(&self, value: Value) {
        self.transport.send(value).unwrap();
    }

    /// The next message the game sent.
    pub async fn next(&mut self) -> Value {
        self.inbox.recv().await.expect("game side hung up")
    }

    /// The next message of `message_type`, skipping anything else.
    pub async fn next_of(&mut self, message_type: MessageType) -> Value {
        loop {
            let message = self.next().await;
            if message["type"] == message_type.as_str() {
                return message;
            }
        }
    }

    /// Everything received so far, without waiting.
    pub fn drain(&mut self) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(message) = self.inbox.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Lets every delivery already in flight land.
    pub async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// `true` if `message` has the given type tag.
pub fn is(message: &Value, message_type: MessageType) -> bool {
    message["type"] == message_type.as_str()
}
