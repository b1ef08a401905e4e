//! The typed message catalog.
//!
//! [`Message`] is the full tagged union: one variant per [`MessageType`],
//! each carrying the `data` shape that type promises. Serde's adjacent
//! tagging (`tag = "type", content = "data"`) produces exactly the wire
//! envelope:
//!
//! ```text
//! Message::ReadyStatusHoster(ReadyStatus { ready: true })
//!   ⇄  { "type": "READY_STATUS_HOSTER", "data": { "ready": true } }
//! ```
//!
//! Game payloads stay as `serde_json::Value` here. The protocol layer
//! routes them but never interprets them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ControllerGlobalSettings, ControllerSetting, GameStorage, HosterGlobalSettings,
    HosterSetting, MessageType, PlayerDto, ProtocolError, StorageEntry,
};

// ---------------------------------------------------------------------------
// Data shapes
// ---------------------------------------------------------------------------

/// `INIT_GAME_*`: sent once, as soon as a communicator is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitGame {
    pub core_version: String,
}

/// `AppData_HOSTER`: the platform's full view for the hoster frame.
///
/// Sent on startup and again whenever any value changes. `players` is the
/// complete roster, never a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HosterAppData {
    pub connection_id: String,
    #[serde(default)]
    pub players: Vec<PlayerDto>,
    #[serde(default)]
    pub join_url: String,
    #[serde(default)]
    pub join_code: String,
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default)]
    pub lobby_game: bool,
    #[serde(default)]
    pub global_settings: Option<HosterGlobalSettings>,
    #[serde(default)]
    pub game_storage: Option<GameStorage>,
}

/// `AppData_CONTROLLER`: the platform's view for one controller frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerAppData {
    #[serde(default)]
    pub hoster_ready: bool,
    pub connection_id: String,
    #[serde(default)]
    pub join_url: String,
    #[serde(default)]
    pub join_code: String,
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default)]
    pub lobby_game: bool,
    #[serde(default)]
    pub global_settings: Option<ControllerGlobalSettings>,
    #[serde(default)]
    pub game_storage: Option<GameStorage>,
}

/// `READY_STATUS_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyStatus {
    pub ready: bool,
}

/// `PING_HOSTER`: the hoster opens a latency probe.
///
/// `id` is opaque and unique per probe. Times are milliseconds:
/// `time_since_start` relative to the hoster's construction,
/// `hoster_time` since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ping {
    pub id: String,
    pub player_id: String,
    pub time_since_start: f64,
    pub hoster_time: f64,
}

/// `PONG_CONTROLLER`: the controller's immediate echo of a [`Ping`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongController {
    pub id: String,
    pub player_id: String,
    pub controller_time: f64,
}

/// `PONG_HOSTER`: the hoster tells the controller what it measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongHoster {
    pub id: String,
    pub player_id: String,
    /// Full round trip, hoster → controller → hoster.
    pub ping_ms: f64,
    pub time_since_start: f64,
    pub hoster_time: f64,
}

/// `GAME_ACTION_HOSTER`: hoster → one controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HosterGameAction {
    /// Target connection id. Not checked against the roster.
    pub to: String,
    pub payload: Value,
}

/// `GAME_ACTION_CONTROLLER`: controller → hoster. Always addressed to the
/// hoster, so it needs no routing field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerGameAction {
    pub payload: Value,
}

/// `GAME_ACTION_RESPONSE_HOSTER`: a controller's action, delivered to the
/// hoster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HosterGameActionResponse {
    /// Sender's connection id.
    pub from: String,
    pub payload: Value,
}

/// `GAME_ACTION_RESPONSE_CONTROLLER`: a hoster action, delivered to a
/// controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerGameActionResponse {
    pub payload: Value,
}

/// The `{}` payload of lifecycle notifications.
///
/// A unit variant would drop `data` from the envelope entirely, which the
/// receiving side rejects, so these carry an empty object instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Empty {}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Every message in the catalog, typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    /// Free-form diagnostics, either direction.
    #[serde(rename = "DEBUG")]
    Debug(Value),

    #[serde(rename = "AppData_HOSTER")]
    AppDataHoster(HosterAppData),
    #[serde(rename = "AppData_CONTROLLER")]
    AppDataController(ControllerAppData),

    #[serde(rename = "INIT_GAME_HOSTER")]
    InitGameHoster(InitGame),
    #[serde(rename = "INIT_GAME_CONTROLLER")]
    InitGameController(InitGame),

    #[serde(rename = "READY_STATUS_HOSTER")]
    ReadyStatusHoster(ReadyStatus),
    #[serde(rename = "READY_STATUS_CONTROLLER")]
    ReadyStatusController(ReadyStatus),

    #[serde(rename = "PING_HOSTER")]
    PingHoster(Ping),
    #[serde(rename = "PONG_CONTROLLER")]
    PongController(PongController),
    #[serde(rename = "PONG_HOSTER")]
    PongHoster(PongHoster),

    #[serde(rename = "GAME_ACTION_HOSTER")]
    GameActionHoster(HosterGameAction),
    #[serde(rename = "GAME_ACTION_CONTROLLER")]
    GameActionController(ControllerGameAction),
    #[serde(rename = "GAME_ACTION_RESPONSE_HOSTER")]
    GameActionResponseHoster(HosterGameActionResponse),
    #[serde(rename = "GAME_ACTION_RESPONSE_CONTROLLER")]
    GameActionResponseController(ControllerGameActionResponse),

    #[serde(rename = "END_GAME_HOSTER")]
    EndGameHoster(Empty),
    #[serde(rename = "END_GAME_CONTROLLER")]
    EndGameController(Empty),
    #[serde(rename = "RELOAD_GAME_HOSTER")]
    ReloadGameHoster(Empty),
    #[serde(rename = "RELOAD_GAME_CONTROLLER")]
    ReloadGameController(Empty),

    #[serde(rename = "SET_GLOBAL_SETTING_HOSTER_G2P")]
    SetGlobalSettingHosterG2P(HosterSetting),
    #[serde(rename = "SET_GLOBAL_SETTING_CONTROLLER_G2P")]
    SetGlobalSettingControllerG2P(ControllerSetting),
    #[serde(rename = "SET_GAME_STORAGE_HOSTER_G2P")]
    SetGameStorageHosterG2P(StorageEntry),
    #[serde(rename = "SET_GAME_STORAGE_CONTROLLER_G2P")]
    SetGameStorageControllerG2P(StorageEntry),

    #[serde(rename = "UPDATED_GLOBAL_SETTING_HOSTER_P2G")]
    UpdatedGlobalSettingHosterP2G(HosterSetting),
    #[serde(rename = "UPDATED_GLOBAL_SETTING_CONTROLLER_P2G")]
    UpdatedGlobalSettingControllerP2G(ControllerSetting),
    #[serde(rename = "UPDATED_GAME_STORAGE_HOSTER_P2G")]
    UpdatedGameStorageHosterP2G(StorageEntry),
    #[serde(rename = "UPDATED_GAME_STORAGE_CONTROLLER_P2G")]
    UpdatedGameStorageControllerP2G(StorageEntry),
}

impl Message {
    /// The tag this message travels under.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Debug(_) => MessageType::Debug,
            Self::AppDataHoster(_) => MessageType::AppDataHoster,
            Self::AppDataController(_) => MessageType::AppDataController,
            Self::InitGameHoster(_) => MessageType::InitGameHoster,
            Self::InitGameController(_) => MessageType::InitGameController,
            Self::ReadyStatusHoster(_) => MessageType::ReadyStatusHoster,
            Self::ReadyStatusController(_) => MessageType::ReadyStatusController,
            Self::PingHoster(_) => MessageType::PingHoster,
            Self::PongController(_) => MessageType::PongController,
            Self::PongHoster(_) => MessageType::PongHoster,
            Self::GameActionHoster(_) => MessageType::GameActionHoster,
            Self::GameActionController(_) => MessageType::GameActionController,
            Self::GameActionResponseHoster(_) => MessageType::GameActionResponseHoster,
            Self::GameActionResponseController(_) => MessageType::GameActionResponseController,
            Self::EndGameHoster(_) => MessageType::EndGameHoster,
            Self::EndGameController(_) => MessageType::EndGameController,
            Self::ReloadGameHoster(_) => MessageType::ReloadGameHoster,
            Self::ReloadGameController(_) => MessageType::ReloadGameController,
            Self::SetGlobalSettingHosterG2P(_) => MessageType::SetGlobalSettingHosterG2P,
            Self::SetGlobalSettingControllerG2P(_) => MessageType::SetGlobalSettingControllerG2P,
            Self::SetGameStorageHosterG2P(_) => MessageType::SetGameStorageHosterG2P,
            Self::SetGameStorageControllerG2P(_) => MessageType::SetGameStorageControllerG2P,
            Self::UpdatedGlobalSettingHosterP2G(_) => MessageType::UpdatedGlobalSettingHosterP2G,
            Self::UpdatedGlobalSettingControllerP2G(_) => {
                MessageType::UpdatedGlobalSettingControllerP2G
            }
            Self::UpdatedGameStorageHosterP2G(_) => MessageType::UpdatedGameStorageHosterP2G,
            Self::UpdatedGameStorageControllerP2G(_) => {
                MessageType::UpdatedGameStorageControllerP2G
            }
        }
    }

    /// Converts to the plain `{ type, data }` value a transport posts.
    pub fn to_value(&self) -> Result<Value, ProtocolError> {
        serde_json::to_value(self).map_err(ProtocolError::Encode)
    }
}

// =========================================================================
// Tests
// =========================================================================
