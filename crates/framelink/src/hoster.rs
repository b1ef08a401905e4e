//! The hoster communicator: the frame that sees every player.
//!
//! # Construction
//!
//! [`HosterCommunicator::new`] does, in order:
//!
//! 1. subscribe to the transport (through its [`Dispatcher`]);
//! 2. register the `AppData_HOSTER` listener that feeds the
//!    [`PlayerStore`] and flips the loaded flag;
//! 3. send `INIT_GAME_HOSTER` with the core version;
//! 4. start the ping scheduler (if enabled);
//! 5. schedule the auto-ready announcement (if enabled).
//!
//! Must be called inside a Tokio runtime.
//!
//! # Dropping
//!
//! Dropping the communicator detaches it from the transport and aborts the
//! scheduler together with the probes it started.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use framelink_protocol::{
    Empty, Envelope, GameStorage, HosterAppData, HosterGameAction, HosterGameActionResponse,
    HosterGlobalSettings, HosterSetting, InitGame, Message, MessageType, Ping, PongController,
    PongHoster, ProtocolError, ReadyStatus, StorageEntry,
};
use framelink_roster::PlayerStore;
use framelink_transport::{ListenerRegistry, Subscription, Transport};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::app_state::{AppInfo, LoadFlag, Persistence};
use crate::ping::{self, PingSample};
use crate::{CommunicatorConfig, Dispatcher, FramelinkError, GameData, GameRoute, RawGameData};

/// Mutable hoster state.
#[derive(Default)]
struct HosterState {
    is_ready: bool,
    info: Option<AppInfo>,
    pings: HashMap<String, PingSample>,
}

/// Everything background tasks need. They hold it weakly.
pub(crate) struct HosterShared<G> {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) players: PlayerStore,
    config: CommunicatorConfig,
    state: Mutex<HosterState>,
    persistence: Persistence<HosterGlobalSettings>,
    ping_listeners: Arc<ListenerRegistry<PingSample>>,
    loaded: LoadFlag,
    start_time: Instant,
    _game: PhantomData<fn() -> G>,
}

impl<G: GameData> HosterShared<G> {
    fn lock(&self) -> MutexGuard<'_, HosterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn time_since_start(&self) -> f64 {
        ping::as_ms(self.start_time.elapsed())
    }

    fn set_ready(&self, ready: bool) -> Result<(), FramelinkError> {
        self.lock().is_ready = ready;
        self.dispatcher
            .send_app_message(&Message::ReadyStatusHoster(ReadyStatus { ready }))
    }

    fn apply_app_data(&self, envelope: &Envelope) {
        let data = match envelope.data_as::<HosterAppData>() {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "ignoring malformed AppData_HOSTER");
                return;
            }
        };

        self.lock().info = Some(AppInfo {
            connection_id: data.connection_id,
            join_url: data.join_url,
            join_code: data.join_code,
            dev_mode: data.dev_mode,
            lobby_game: data.lobby_game,
        });
        self.persistence.refresh(data.global_settings, data.game_storage);
        self.players.smart_update_players(&data.players);
        let present = self.players.connection_ids();
        self.lock().pings.retain(|id, _| present.contains(id));

        if !self.loaded.is_set() {
            info!(players = self.players.len(), "hoster loaded");
        }
        self.loaded.set();
    }

    /// One probe. See [`HosterCommunicator::fetch_ping`].
    pub(crate) async fn fetch_ping(&self, connection_id: &str) -> Result<f64, FramelinkError> {
        let id = ping::probe_id();
        let player_id = connection_id.to_owned();

        let pending = {
            let id = id.clone();
            let player_id = player_id.clone();
            self.dispatcher
                .expect::<PongController, _>(MessageType::PongController, move |pong| {
                    pong.id == id && pong.player_id == player_id
                })
        };

        let sent_at = Instant::now();
        self.dispatcher.send_app_message(&Message::PingHoster(Ping {
            id: id.clone(),
            player_id: player_id.clone(),
            time_since_start: self.time_since_start(),
            hoster_time: ping::epoch_ms(),
        }))?;

        pending
            .wait(self.config.ping.timeout, format!("ping to {player_id}"))
            .await?;
        let ping_ms = ping::as_ms(sent_at.elapsed());

        self.dispatcher.send_app_message(&Message::PongHoster(PongHoster {
            id,
            player_id: player_id.clone(),
            ping_ms,
            time_since_start: self.time_since_start(),
            hoster_time: ping::epoch_ms(),
        }))?;

        let sample = PingSample {
            player: self.players.player(&player_id),
            connection_id: player_id.clone(),
            ping_ms,
            last_poll: std::time::SystemTime::now(),
        };
        // Players kicked mid-probe get no sample.
        if sample.player.is_some() {
            self.lock().pings.insert(player_id, sample.clone());
        }
        self.ping_listeners.emit(&sample);

        Ok(ping_ms)
    }
}

/// The hoster side of a game.
///
/// `G` describes the game's payloads; [`RawGameData`] keeps them as JSON.
pub struct HosterCommunicator<G: GameData = RawGameData> {
    shared: Arc<HosterShared<G>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<G: GameData> HosterCommunicator<G> {
    /// Creates the communicator and announces it to the platform.
    ///
    /// # Errors
    /// Fails if `INIT_GAME_HOSTER` can't be sent (for example
    /// [`TransportError::NoParent`](framelink_transport::TransportError::NoParent)).
    pub fn new(
        transport: Arc<dyn Transport>,
        config: CommunicatorConfig,
    ) -> Result<Self, FramelinkError> {
        let shared = Arc::new(HosterShared {
            dispatcher: Dispatcher::new(transport, GameRoute::Hoster),
            players: PlayerStore::new(),
            config,
            state: Mutex::new(HosterState::default()),
            persistence: Persistence::new(),
            ping_listeners: Arc::new(ListenerRegistry::new()),
            loaded: LoadFlag::new(),
            start_time: Instant::now(),
            _game: PhantomData,
        });

        register_app_listeners(&shared);

        shared
            .dispatcher
            .send_app_message(&Message::InitGameHoster(InitGame {
                core_version: shared.config.core_version.clone(),
            }))?;
        debug!(core_version = %shared.config.core_version, "hoster initialized");

        let mut tasks = Vec::new();
        if shared.config.ping.enabled {
            let ping_config = shared.config.ping.clone().validated();
            tasks.push(ping::spawn_scheduler(
                Arc::downgrade(&shared),
                ping_config.interval,
            ));
        }
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

    /// Marks the hoster ready and tells the platform.
    pub fn ready(&self) -> Result<(), FramelinkError> {
        self.shared.set_ready(true)
    }

    pub fn unready(&self) -> Result<(), FramelinkError> {
        self.shared.set_ready(false)
    }

    pub fn is_ready(&self) -> bool {
        self.shared.lock().is_ready
    }

    // -----------------------------------------------------------------------
    // Game messages
    // -----------------------------------------------------------------------

    /// Sends `payload` to one controller.
    ///
    /// `to` isn't checked against the roster; a message for an unknown
    /// player is simply never seen.
    pub fn send_game_message(
        &self,
        payload: &G::HosterToController,
        to: &str,
    ) -> Result<(), FramelinkError> {
        let payload = serde_json::to_value(payload).map_err(ProtocolError::Encode)?;
        self.send_raw_game_message(payload, to)
    }

    /// Sends `payload` to every player currently in the roster, in roster
    /// order.
    pub fn broadcast_game_message(
        &self,
        payload: &G::HosterToController,
    ) -> Result<(), FramelinkError> {
        let payload = serde_json::to_value(payload).map_err(ProtocolError::Encode)?;
        for connection_id in self.shared.players.connection_ids() {
            self.send_raw_game_message(payload.clone(), &connection_id)?;
        }
        Ok(())
    }

    fn send_raw_game_message(&self, payload: Value, to: &str) -> Result<(), FramelinkError> {
        self.shared
            .dispatcher
            .send_app_message(&Message::GameActionHoster(HosterGameAction {
                to: to.to_owned(),
                payload,
            }))
    }

    /// Listens for controller actions. The listener gets the sender's
    /// connection id and the decoded payload.
    pub fn add_game_message_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&str, &G::ControllerToHoster) + Send + Sync + 'static,
    {
        self.shared
            .dispatcher
            .add_game_message_listener(move |envelope: &Envelope| {
                let action = match envelope.data_as::<HosterGameActionResponse>() {
                    Ok(action) => action,
                    Err(e) => {
                        warn!(error = %e, "malformed game action");
                        return;
                    }
                };
                match serde_json::from_value::<G::ControllerToHoster>(action.payload) {
                    Ok(payload) => listener(&action.from, &payload),
                    Err(e) => warn!(from = %action.from, error = %e, "undecodable game payload"),
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
            .send_app_message(&Message::EndGameHoster(Empty {}))
    }

    pub fn reload_game(&self) -> Result<(), FramelinkError> {
        self.shared
            .dispatcher
            .send_app_message(&Message::ReloadGameHoster(Empty {}))
    }

    /// Sends a `DEBUG` message with an arbitrary payload.
    pub fn send_debug(&self, data: Value) -> Result<(), FramelinkError> {
        self.shared.dispatcher.send_app_message(&Message::Debug(data))
    }

    // -----------------------------------------------------------------------
    // Players and ping
    // -----------------------------------------------------------------------

    /// The roster.
    pub fn players(&self) -> &PlayerStore {
        &self.shared.players
    }

    /// Measures the round trip to one player.
    ///
    /// Resolves with milliseconds once the matching `PONG_CONTROLLER`
    /// arrives, after telling the controller the result via `PONG_HOSTER`.
    ///
    /// # Errors
    /// [`FramelinkError::Timeout`] if no pong arrives within the
    /// configured ping timeout.
    pub async fn fetch_ping(&self, connection_id: &str) -> Result<f64, FramelinkError> {
        self.shared.fetch_ping(connection_id).await
    }

    /// Notified after every completed probe.
    pub fn add_player_ping_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PingSample) + Send + Sync + 'static,
    {
        self.shared.ping_listeners.add(listener)
    }

    /// The latest sample for one player.
    pub fn ping(&self, connection_id: &str) -> Option<PingSample> {
        self.shared.lock().pings.get(connection_id).cloned()
    }

    /// The latest sample for every measured player.
    pub fn pings(&self) -> HashMap<String, PingSample> {
        self.shared.lock().pings.clone()
    }

    // -----------------------------------------------------------------------
    // Settings and storage
    // -----------------------------------------------------------------------

    /// `None` until the platform reports them.
    pub fn global_settings(&self) -> Option<HosterGlobalSettings> {
        self.shared.persistence.settings()
    }

    pub fn game_storage(&self) -> Option<GameStorage> {
        self.shared.persistence.storage()
    }

    /// Asks the platform to change one setting and waits for it to
    /// confirm the same key. Returns the confirmed value, or `setting`
    /// itself when the platform's value doesn't decode.
    pub async fn set_global_setting(
        &self,
        setting: HosterSetting,
    ) -> Result<HosterSetting, FramelinkError> {
        let key = setting.key();
        let pending = self
            .shared
            .dispatcher
            .expect_key(MessageType::UpdatedGlobalSettingHosterP2G, key);
        self.shared
            .dispatcher
            .send_app_message(&Message::SetGlobalSettingHosterG2P(setting.clone()))?;
        let data = pending
            .wait(self.shared.config.confirm_timeout, format!("global setting {key}"))
            .await?;
        match serde_json::from_value::<HosterSetting>(data) {
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
            .expect_key(MessageType::UpdatedGameStorageHosterP2G, entry.key.clone());
        let what = format!("game storage {}", entry.key);
        self.shared
            .dispatcher
            .send_app_message(&Message::SetGameStorageHosterG2P(entry.clone()))?;
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

    /// `true` once the first `AppData_HOSTER` has arrived.
    pub fn has_loaded(&self) -> bool {
        self.shared.loaded.is_set()
    }

    /// Resolves once the first `AppData_HOSTER` has arrived.
    pub async fn wait_for_load(&self) {
        self.shared.loaded.wait().await;
    }

    /// Session details from the latest app data.
    pub fn app_info(&self) -> Option<AppInfo> {
        self.shared.lock().info.clone()
    }

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

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Removes the transport subscription. Listeners and pending waits are
    /// left alone.
    pub fn destroy(&self) {
        self.shared.dispatcher.destroy();
    }
}

impl<G: GameData> Drop for HosterCommunicator<G> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        self.shared.dispatcher.destroy();
    }
}

/// Runs `handle` on the shared state for every `message_type` envelope.
fn on<G, H>(shared: &Arc<HosterShared<G>>, message_type: MessageType, handle: H)
where
    G: GameData,
    H: Fn(&HosterShared<G>, &Envelope) + Send + Sync + 'static,
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

/// Listeners every hoster installs at construction.
fn register_app_listeners<G: GameData>(shared: &Arc<HosterShared<G>>) {
    on(shared, MessageType::AppDataHoster, HosterShared::apply_app_data);
    on(shared, MessageType::UpdatedGlobalSettingHosterP2G, |shared, envelope| {
        match envelope.data_as::<HosterSetting>() {
            Ok(setting) => shared
                .persistence
                .update_settings(|settings| settings.apply(&setting)),
            Err(e) => warn!(data = %envelope.data, error = %e, "undecodable setting confirmation"),
        }
    });
    on(shared, MessageType::UpdatedGameStorageHosterP2G, |shared, envelope| {
        match envelope.data_as::<StorageEntry>() {
            Ok(entry) => shared.persistence.update_storage(&entry),
            Err(e) => warn!(data = %envelope.data, error = %e, "undecodable storage confirmation"),
        }
    });
}
