//! The shared validate → filter → dispatch pipeline.
//!
//! Both communicators own a [`Dispatcher`]. It subscribes to the
//! transport, checks every inbound value with
//! [`is_envelope`](framelink_protocol::is_envelope), and hands valid
//! envelopes to two listener registries:
//!
//! ```text
//!                         ┌─→ app registry  (every envelope, optional type filter)
//! transport ─→ validate ──┤
//!                         └─→ game registry (only the role's GameRoute type)
//! ```
//!
//! The role-specific part is injected as a [`GameRoute`]: the one message
//! type that carries game actions destined for this frame. Those envelopes
//! reach the app registry too, so a wildcard app listener sees every
//! message that arrives.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use framelink_protocol::{Envelope, Message, MessageType, ProtocolError};
use framelink_transport::{ListenerRegistry, Subscription, SubscriptionGuard, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{error, trace};

use crate::FramelinkError;

/// Which game-action type a frame receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameRoute {
    /// `GAME_ACTION_RESPONSE_HOSTER`: controller actions for the hoster.
    Hoster,
    /// `GAME_ACTION_RESPONSE_CONTROLLER`: hoster actions for a controller.
    Controller,
}

impl GameRoute {
    pub fn message_type(self) -> MessageType {
        match self {
            Self::Hoster => MessageType::GameActionResponseHoster,
            Self::Controller => MessageType::GameActionResponseController,
        }
    }
}

/// The registries, shared with the transport hook.
struct Routes {
    game_route: MessageType,
    app: Arc<ListenerRegistry<Envelope>>,
    game: Arc<ListenerRegistry<Envelope>>,
}

impl Routes {
    fn dispatch(&self, raw: &Value) -> Result<(), ProtocolError> {
        let envelope = Envelope::from_value(raw)?;

        let app = self.app.emit(&envelope);
        let game = if envelope.is(self.game_route) {
            self.game.emit(&envelope)
        } else {
            0
        };
        trace!(kind = %envelope.kind, app, game, "dispatched");
        Ok(())
    }
}

/// Listener registries plus the transport they're fed from.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    routes: Arc<Routes>,
    inbound: Subscription,
}

impl Dispatcher {
    /// Subscribes to `transport` right away.
    pub fn new(transport: Arc<dyn Transport>, route: GameRoute) -> Self {
        let routes = Arc::new(Routes {
            game_route: route.message_type(),
            app: Arc::new(ListenerRegistry::new()),
            game: Arc::new(ListenerRegistry::new()),
        });

        let hook = Arc::clone(&routes);
        let inbound = transport.on_receive(Box::new(move |raw: &Value| {
            // A bad message is dropped; the next one is handled normally.
            if let Err(e) = hook.dispatch(raw) {
                error!(error = %e, "dropping inbound message");
            }
        }));

        Self {
            transport,
            routes,
            inbound,
        }
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Posts `payload` as-is.
    pub fn send_message(&self, payload: Value) -> Result<(), FramelinkError> {
        self.transport.send(payload)?;
        Ok(())
    }

    /// Encodes and posts an app-level message.
    pub fn send_app_message(&self, message: &Message) -> Result<(), FramelinkError> {
        trace!(kind = %message.message_type(), "sending");
        self.send_message(message.to_value()?)
    }

    // -----------------------------------------------------------------------
    // Receiving
    // -----------------------------------------------------------------------

    /// Validates `raw` and dispatches it.
    ///
    /// App listeners run first, in registration order, then (for the game
    /// route type) game listeners. Everything runs before this returns.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidEnvelope`] if `raw` isn't an envelope. No
    /// listener runs in that case.
    pub fn handle_message(&self, raw: &Value) -> Result<(), ProtocolError> {
        self.routes.dispatch(raw)
    }

    /// Registers an app-message listener.
    ///
    /// With `Some(type)` it only sees that type; `None` sees every valid
    /// envelope, including ones outside the catalog.
    pub fn add_app_message_listener<F>(
        &self,
        listener: F,
        message_type: Option<MessageType>,
    ) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        match message_type {
            None => self.routes.app.add(listener),
            Some(message_type) => self.routes.app.add(move |envelope: &Envelope| {
                if envelope.is(message_type) {
                    listener(envelope);
                }
            }),
        }
    }

    /// Registers a listener for this frame's game-route envelopes.
    pub fn add_game_message_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.routes.game.add(listener)
    }

    /// Registers a one-shot listener for the first `message_type` whose
    /// decoded data satisfies `matches`.
    ///
    /// Register before sending the request so a fast reply can't be missed.
    pub fn expect<T, P>(&self, message_type: MessageType, matches: P) -> PendingReply<T>
    where
        T: DeserializeOwned + Send + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));

        let subscription = self.add_app_message_listener(
            move |envelope| {
                let Ok(data) = envelope.data_as::<T>() else {
                    return;
                };
                if !matches(&data) {
                    return;
                }
                let tx = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(tx) = tx {
                    let _ = tx.send(data);
                }
            },
            Some(message_type),
        );

        PendingReply {
            rx,
            _guard: subscription.guard(),
        }
    }

    /// Like [`expect`](Self::expect), but matches on the raw `data.key`
    /// alone. The reply's value is left undecoded.
    pub fn expect_key(
        &self,
        message_type: MessageType,
        key: impl Into<String>,
    ) -> PendingReply<Value> {
        let key = key.into();
        self.expect::<Value, _>(message_type, move |data| {
            data.get("key").and_then(Value::as_str) == Some(key.as_str())
        })
    }

    /// Removes the transport subscription. Registered listeners stay, but
    /// nothing reaches them any more.
    pub fn destroy(&self) {
        self.inbound.destroy();
    }

    /// `false` once [`destroy`](Self::destroy) has run.
    pub fn is_attached(&self) -> bool {
        self.inbound.is_active()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.inbound.destroy();
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("game_route", &self.routes.game_route)
            .field("app_listeners", &self.routes.app.len())
            .field("game_listeners", &self.routes.game.len())
            .field("attached", &self.is_attached())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PendingReply
// ---------------------------------------------------------------------------

/// A reply registered with [`Dispatcher::expect`].
///
/// Its listener is removed when the reply is dropped, whether it arrived,
/// timed out, or was never awaited.
pub struct PendingReply<T> {
    rx: oneshot::Receiver<T>,
    _guard: SubscriptionGuard,
}

impl<T> PendingReply<T> {
    /// Waits for the reply. `None` waits forever.
    ///
    /// # Errors
    /// - [`FramelinkError::Timeout`] if `timeout` elapses first.
    /// - [`FramelinkError::Cancelled`] if the dispatcher is dropped first.
    pub async fn wait(
        self,
        timeout: Option<Duration>,
        what: impl Into<String>,
    ) -> Result<T, FramelinkError> {
        let Self { rx, _guard } = self;
        let what = what.into();

        let received = match timeout {
            Some(after) => tokio::time::timeout(after, rx)
                .await
                .map_err(|_| FramelinkError::Timeout {
                    what: what.clone(),
                    after,
                })?,
            None => rx.await,
        };
        received.map_err(|_| FramelinkError::Cancelled(what))
    }
}

impl<T> fmt::Debug for PendingReply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReply").finish_non_exhaustive()
    }
}
