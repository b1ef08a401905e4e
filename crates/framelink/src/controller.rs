//! The controller communicator: one player's frame.
//!
//! A controller talks only to the hoster (through the platform), so it
//! needs no routing. What it adds over the dispatcher:
//!
//! - readiness in both directions (its own `ready()`, and the hoster's
//!   `hosterReady` from app data);
//! - the ping responder, which echoes every `PING_HOSTER` as
//!   `PONG_CONTROLLER` straight away;
//! - the latency view from `PONG_HOSTER`.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use framelink_protocol::{
    ControllerAppData, ControllerGameAction, ControllerGameActionResponse,
    ControllerGlobalSettings, ControllerSetting, Empty, Envelope, GameStorage, InitGame, Message,
    MessageType, Ping, PongController, PongHoster, ProtocolError, ReadyStatus, StorageEntry,
};
use framelink_transport::{ListenerRegistry, Subscription, Transport};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::app_state::{AppInfo, LoadFlag, Persistence};
use crate::ping::{self, PingData};
use crate::{CommunicatorConfig, Dispatcher, FramelinkError, GameData, GameRoute, RawGameData};

#[derive(Default)]
struct ControllerState {
    is_ready: bool,
    hoster_ready: bool,
    info: Option<AppInfo>,
    ping: Option<PingData>,
}

struct ControllerShared<G> {
    dispatcher: Dispatcher,
    config: CommunicatorConfig,
    state: Mutex<ControllerState>,
    persistence: Persistence<ControllerGlobalSettings>,
    hoster_ready_listeners: Arc<ListenerRegistry<bool>>,
    ping_listeners: Arc<ListenerRegistry<PingData>>,
    loaded: LoadFlag,
    _game: PhantomData<fn() -> G>,
}

impl<G: GameData> ControllerShared<G> {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_ready(&self, ready: bool) -> Result<(), FramelinkError> {
        self.lock().is_ready = ready;
        self.dispatcher
            .send_app_message(&Message::ReadyStatusController(ReadyStatus { ready }))
    }

    fn apply_app_data(&self, envelope: &Envelope) {
        let data = match envelope.data_as::<ControllerAppData>() {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "ignoring malformed AppData_CONTROLLER");
                return;
            }
        };

        let hoster_ready_changed = {
            let mut state = self.lock();
            state.info = Some(AppInfo {
                connection_id: data.connection_id,
                join_url: data.join_url,
                join_code: data.join_code,
                dev_mode: data.dev_mode,
                lobby_game: data.lobby_game,
            });
            std::mem::replace(&mut state.hoster_ready, data.hoster_ready) != data.hoster_ready
        };
        self.persistence.refresh(data.global_settings, data.game_storage);

        if hoster_ready_changed {
            debug!(hoster_ready = data.hoster_ready, "hoster readiness changed");
            self.hoster_ready_listeners.emit(&data.hoster_ready);
        }
        if !self.loaded.is_set() {
            info!("controller loaded");
        }
        self.loaded.set();
    }

    /// Echoes a probe. The platform only forwards probes meant for us.
    fn answer_ping(&self, envelope: &Envelope) {
        let ping = match envelope.data_as::<Ping>() {
            Ok(ping) => ping,
            Err(e) => {
                warn!(error = %e, "malformed PING_HOSTER");
                return;
            }
        };
        trace!(id = %ping.id, "answering ping");
        let pong = Message::PongController(PongController {
            id: ping.id,
            player_id: ping.player_id,
            controller_time: ping::epoch_ms(),
        });
        if let Err(e) = self.dispatcher.send_app_message(&pong) {
            warn!(error = %e, "failed to answer ping");
        }
    }

    fn record_pong(&self, envelope: &Envelope) {
        let pong = match envelope.data_as::<PongHoster>() {
            Ok(pong) => pong,
            Err(e) => {
                warn!(error = %e, "malformed PONG_HOSTER");
                return;
            }
        };
        let data = PingData::from_pong(pong.ping_ms, pong.time_since_start, pong.hoster_time);
        self.lock().ping = Some(data.clone());
        self.ping_listeners.emit(&data);
    }
}

/// The controller side of a game.
pub struct ControllerCommunicator<G: GameData = RawGameData> {
    shared: Arc<ControllerShared<G>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<G: GameData> ControllerCommunicator<G> {
    /// Subscribes to the transport, wires the ping responder, and sends
    /// `INIT_GAME_CONTROLLER`. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// Fails if `INIT_GAME_CONTROLLER` can't be sent.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: CommunicatorConfig,
    ) -> Result<Self, FramelinkError> {
        let shared = Arc::new(ControllerShared {
            dispatcher: Dispatcher::new(transport, GameRoute::Controller),
            config,
            state: Mutex::new(ControllerState::default()),
            persistence: Persistence::new(),
            hoster_ready_listeners: Arc::new(ListenerRegistry::new()),
            ping_listeners: Arc::new(ListenerRegistry::new()),
            loaded: LoadFlag::new(),
            _game: PhantomData,
        });

        register_app_listeners(&shared);

        shared
            .dispatcher
            .send_app_message(&Message::InitGameController(InitGame {
                core_version: shared.config.core_version.clone(),
            }))?;
        debug!(core_version = %shared.config.core_version, "controller initialized");

        let mut tasks = Vec::new();
        if shared.config.auto_ready {
            let weak = Arc::downgrade(&shared);
            let delay = shared.config.auto_ready_delay;
            tasks.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(shared) = weak.upgrade() {
                    if let Err(e) = shared.set_ready(true) {
                        warn!(error = %e, "auto-ready failed");
                    }
                }
            }));
        }

        Ok(Self { shared, tasks })
    }

    // -----------------------------------------------------------------------
    // Readiness
    // -----------------------------------------------------------------------

    /// Tells the platform this frame can receive game messages.
    pub fn ready(&self) -> Result<(), FramelinkError> {
        self.shared.set_ready(true)
    }

    pub fn unready(&self) -> Result<(), FramelinkError> {
        self.shared.set_ready(false)
    }

    pub fn is_ready(&self) -> bool {
        self.shared.lock().is_ready
    }

    /// Whether the hoster has announced readiness, per the latest app data.
    pub fn hoster_ready(&self) -> bool {
        self.shared.lock().hoster_ready
    }

    /// Fires only when the announced hoster readiness actually changes.
    pub fn add_hoster_ready_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.shared
            .hoster_ready_listeners
            .add(move |ready: &bool| listener(*ready))
    }

    // -----------------------------------------------------------------------
    // Game messages
    // -----------------------------------------------------------------------

    /// Sends `payload` to the hoster.
    pub fn send_game_message(&self, payload: &G::ControllerToHoster) -> Result<(), FramelinkError> {
        let payload = serde_json::to_value(payload).map_err(ProtocolError::Encode)?;
        self.shared
            .dispatcher
            .send_app_message(&Message::GameActionController(ControllerGameAction { payload }))
    }

    /// Listens for hoster actions addressed to this controller.
    pub fn add_game_message_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&G::HosterToController) + Send + Sync + 'static,
    {
        self.shared
            .dispatcher
            .add_game_message_listener(move |envelope: &Envelope| {
                let action = match envelope.data_as::<ControllerGameActionResponse>() {
                    Ok(action) => action,
                    Err(e) => {
                        warn!(error = %e, "malformed game action");
                        return;
                    }
                };
                match serde_json::from_value::<G::HosterToController>(action.payload) {
                    Ok(payload) => listener(&payload),
                    Err(e) => warn!(error = %e, "undecodable game payload"),
                }
            })
    }

    // -----------------------------------------------------------------------
    // App messages
    // -----------------------------------------------------------------------

    /// See [`Dispatcher::add_app_message_listener`].
    pub fn add_app_message_listener<F>(
        &self,
        listener: F,
        message_type: Option<MessageType>,
    ) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.shared
            .dispatcher
            .add_app_message_listener(listener, message_type)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.shared.dispatcher
    }

    pub fn end_game(&self) -> Result<(), FramelinkError> {
        self.shared
            .dispatcher
            .send_app_message(&Message::EndGameController(Empty {}))
    }

    pub fn reload_game(&self) -> Result<(), FramelinkError> {
        self.shared
            .dispatcher
            .send_app_message(&Message::ReloadGameController(Empty {}))
    }

    pub fn send_debug(&self, data: Value) -> Result<(), FramelinkError> {
        self.shared.dispatcher.send_app_message(&Message::Debug(data))
    }

    // -----------------------------------------------------------------------
    // Ping
    // -----------------------------------------------------------------------

    /// Notified on every `PONG_HOSTER`.
    pub fn add_ping_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PingData) + Send + Sync + 'static,
    {
        self.shared.ping_listeners.add(listener)
    }

    /// The latest latency report, if any.
    pub fn ping(&self) -> Option<PingData> {
        self.shared.lock().ping.clone()
    }

    // -----------------------------------------------------------------------
    // Settings and storage
    // -----------------------------------------------------------------------

    pub fn global_settings(&self) -> Option<ControllerGlobalSettings> {
        self.shared.persistence.settings()
    }

    pub fn game_storage(&self) -> Option<GameStorage> {
        self.shared.persistence.storage()
    }

    /// Asks the platform to change one setting and waits for it to
    /// confirm the same key. A confirmation whose value doesn't decode
    /// still counts; `setting` is returned in its place.
    pub async fn set_global_setting(
        &self,
        setting: ControllerSetting,
    ) -> Result<ControllerSetting, FramelinkError> {
        let key = setting.key();
        let pending = self
            .shared
            .dispatcher
            .expect_key(MessageType::UpdatedGlobalSettingControllerP2G, key);
        self.shared
            .dispatcher
            .send_app_message(&Message::SetGlobalSettingControllerG2P(setting.clone()))?;
        let data = pending
            .wait(self.shared.config.confirm_timeout, format!("global setting {key}"))
            .await?;
        match serde_json::from_value::<ControllerSetting>(data) {
            Ok(confirmed) => Ok(confirmed),
            Err(_) => {
                // The cache listener skipped it; keep what was asked for.
                self.shared
                    .persistence
                    .update_settings(|settings| settings.apply(&setting));
                Ok(setting)
            }
        }
    }

    /// Writes (or with `None`, removes) one storage key and waits for the
    /// platform to confirm it.
    pub async fn set_game_storage(
        &self,
        key: impl Into<String>,
        value: Option<String>,
    ) -> Result<StorageEntry, FramelinkError> {
        let entry = StorageEntry {
            key: key.into(),
            value,
        };
        let pending = self
            .shared
            .dispatcher
            .expect_key(MessageType::UpdatedGameStorageControllerP2G, entry.key.clone());
        let what = format!("game storage {}", entry.key);
        self.shared
            .dispatcher
            .send_app_message(&Message::SetGameStorageControllerG2P(entry.clone()))?;
        let data = pending.wait(self.shared.config.confirm_timeout, what).await?;
        match serde_json::from_value::<StorageEntry>(data) {
            Ok(confirmed) => Ok(confirmed),
            Err(_) => {
                self.shared.persistence.update_storage(&entry);
                Ok(entry)
            }
        }
    }

    // -----------------------------------------------------------------------
    // App data
    // -----------------------------------------------------------------------

    pub fn has_loaded(&self) -> bool {
        self.shared.loaded.is_set()
    }

    /// Resolves once the first `AppData_CONTROLLER` has arrived.
    pub async fn wait_for_load(&self) {
        self.shared.loaded.wait().await;
    }

    pub fn app_info(&self) -> Option<AppInfo> {
        self.shared.lock().info.clone()
    }

    /// This player's own connection id.
    pub fn connection_id(&self) -> Option<String> {
        self.app_info().map(|info| info.connection_id)
    }

    pub fn join_url(&self) -> Option<String> {
        self.app_info().map(|info| info.join_url)
    }

    pub fn join_code(&self) -> Option<String> {
        self.app_info().map(|info| info.join_code)
    }

    pub fn dev_mode(&self) -> bool {
        self.app_info().is_some_and(|info| info.dev_mode)
    }

    pub fn lobby_game(&self) -> bool {
        self.app_info().is_some_and(|info| info.lobby_game)
    }

    /// Removes the transport subscription.
    pub fn destroy(&self) {
        self.shared.dispatcher.destroy();
    }
}

impl<G: GameData> Drop for ControllerCommunicator<G> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        self.shared.dispatcher.destroy();
    }
}

/// Runs `handle` on the shared state for every `message_type` envelope.
fn on<G, H>(shared: &Arc<ControllerShared<G>>, message_type: MessageType, handle: H)
where
    G: GameData,
    H: Fn(&ControllerShared<G>, &Envelope) + Send + Sync + 'static,
{
    let weak = Arc::downgrade(shared);
    // Lives as long as the dispatcher.
    let _ = shared.dispatcher.add_app_message_listener(
        move |envelope| {
            if let Some(shared) = weak.upgrade() {
                handle(&shared, envelope);
            }
        },
        Some(message_type),
    );
}

fn register_app_listeners<G: GameData>(shared: &Arc<ControllerShared<G>>) {
    on(shared, MessageType::AppDataController, ControllerShared::apply_app_data);
    on(shared, MessageType::PingHoster, ControllerShared::answer_ping);
    on(shared, MessageType::PongHoster, ControllerShared::record_pong);
    on(shared, MessageType::UpdatedGlobalSettingControllerP2G, |shared, envelope| {
        match envelope.data_as::<ControllerSetting>() {
            Ok(setting) => shared
                .persistence
                .update_settings(|settings| settings.apply(&setting)),
            Err(e) => warn!(data = %envelope.data, error = %e, "undecodable setting confirmation"),
        }
    });
    on(shared, MessageType::UpdatedGameStorageControllerP2G, |shared, envelope| {
        match envelope.data_as::<StorageEntry>() {
            Ok(entry) => shared.persistence.update_storage(&entry),
            Err(e) => warn!(data = %envelope.data, error = %e, "undecodable storage confirmation"),
        }
    });
}
