//! WebSocket bridge using `tokio-tungstenite`.
//!
//! Lets a game running as a native process stand in for an embedded frame:
//! the platform end of the socket plays the parent window. Each message is
//! one JSON text frame.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::{InboundHandler, ListenerRegistry, Subscription, Transport, TransportError};

/// A [`Transport`] whose parent frame is a WebSocket peer.
pub struct WebSocketTransport {
    outbound: mpsc::UnboundedSender<String>,
    hooks: Arc<ListenerRegistry<Value>>,
}

impl WebSocketTransport {
    /// Connects to the platform at `url` (e.g. `ws://127.0.0.1:9000`).
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            TransportError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;
        tracing::info!(url, "connected to platform bridge");

        let (mut sink, mut stream) = ws.split();
        let (outbound, mut queue) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(text) = queue.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::debug!(error = %e, "bridge write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let hooks = Arc::new(ListenerRegistry::new());
        let reader_hooks = Arc::downgrade(&hooks);
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let parsed = match frame {
                    Ok(Message::Text(text)) => serde_json::from_str::<Value>(text.as_str()),
                    Ok(Message::Binary(data)) => serde_json::from_slice::<Value>(&data),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue, // ping/pong/raw frames
                    Err(e) => {
                        tracing::debug!(error = %e, "bridge read failed");
                        break;
                    }
                };
                let message = match parsed {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!(error = %e, "bridge frame is not JSON, dropped");
                        continue;
                    }
                };
                let Some(hooks) = reader_hooks.upgrade() else {
                    break;
                };
                hooks.emit(&message);
            }
            tracing::debug!("platform bridge closed");
        });

        Ok(Self { outbound, hooks })
    }
}

impl Transport for WebSocketTransport {
    fn send(&self, message: Value) -> Result<(), TransportError> {
        let text =
            serde_json::to_string(&message).map_err(|e| TransportError::SendFailed(e.to_string()))?;
        self.outbound
            .send(text)
            .map_err(|_| TransportError::ConnectionClosed("bridge writer stopped".into()))
    }

    fn on_receive(&self, handler: InboundHandler) -> Subscription {
        self.hooks.add(move |message| handler(message))
    }
}
