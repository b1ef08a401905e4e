//! The envelope every cross-frame message travels in.
//!
//! On the wire a message is always `{ "type": ..., "data": ... }`. This
//! module defines the closed set of known `type` tags ([`MessageType`]), the
//! untyped [`Envelope`] that inbound values are validated into, and the
//! structural gate [`is_envelope`].
//!
//! Validation here is structural only. An envelope whose `data` doesn't
//! match its `type` still passes; the mismatch surfaces later, when
//! someone asks for a typed view with [`Envelope::data_as`] or
//! [`Envelope::to_message`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Message, ProtocolError};

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Every `type` tag the platform and the games agree on.
///
/// Suffixes name the side the message concerns: `_HOSTER` / `_CONTROLLER`.
/// `G2P` is game-to-platform, `P2G` platform-to-game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "DEBUG")]
    Debug,

    #[serde(rename = "AppData_HOSTER")]
    AppDataHoster,
    #[serde(rename = "AppData_CONTROLLER")]
    AppDataController,

    #[serde(rename = "INIT_GAME_HOSTER")]
    InitGameHoster,
    #[serde(rename = "INIT_GAME_CONTROLLER")]
    InitGameController,

    #[serde(rename = "READY_STATUS_HOSTER")]
    ReadyStatusHoster,
    #[serde(rename = "READY_STATUS_CONTROLLER")]
    ReadyStatusController,

    #[serde(rename = "PING_HOSTER")]
    PingHoster,
    #[serde(rename = "PONG_CONTROLLER")]
    PongController,
    #[serde(rename = "PONG_HOSTER")]
    PongHoster,

    #[serde(rename = "GAME_ACTION_HOSTER")]
    GameActionHoster,
    #[serde(rename = "GAME_ACTION_CONTROLLER")]
    GameActionController,
    #[serde(rename = "GAME_ACTION_RESPONSE_HOSTER")]
    GameActionResponseHoster,
    #[serde(rename = "GAME_ACTION_RESPONSE_CONTROLLER")]
    GameActionResponseController,

    #[serde(rename = "END_GAME_HOSTER")]
    EndGameHoster,
    #[serde(rename = "END_GAME_CONTROLLER")]
    EndGameController,
    #[serde(rename = "RELOAD_GAME_HOSTER")]
    ReloadGameHoster,
    #[serde(rename = "RELOAD_GAME_CONTROLLER")]
    ReloadGameController,

    #[serde(rename = "SET_GLOBAL_SETTING_HOSTER_G2P")]
    SetGlobalSettingHosterG2P,
    #[serde(rename = "SET_GLOBAL_SETTING_CONTROLLER_G2P")]
    SetGlobalSettingControllerG2P,
    #[serde(rename = "SET_GAME_STORAGE_HOSTER_G2P")]
    SetGameStorageHosterG2P,
    #[serde(rename = "SET_GAME_STORAGE_CONTROLLER_G2P")]
    SetGameStorageControllerG2P,

    #[serde(rename = "UPDATED_GLOBAL_SETTING_HOSTER_P2G")]
    UpdatedGlobalSettingHosterP2G,
    #[serde(rename = "UPDATED_GLOBAL_SETTING_CONTROLLER_P2G")]
    UpdatedGlobalSettingControllerP2G,
    #[serde(rename = "UPDATED_GAME_STORAGE_HOSTER_P2G")]
    UpdatedGameStorageHosterP2G,
    #[serde(rename = "UPDATED_GAME_STORAGE_CONTROLLER_P2G")]
    UpdatedGameStorageControllerP2G,
}

impl MessageType {
    /// All known tags, in catalog order.
    pub const ALL: [MessageType; 26] = [
        Self::Debug,
        Self::AppDataHoster,
        Self::AppDataController,
        Self::InitGameHoster,
        Self::InitGameController,
        Self::ReadyStatusHoster,
        Self::ReadyStatusController,
        Self::PingHoster,
        Self::PongController,
        Self::PongHoster,
        Self::GameActionHoster,
        Self::GameActionController,
        Self::GameActionResponseHoster,
        Self::GameActionResponseController,
        Self::EndGameHoster,
        Self::EndGameController,
        Self::ReloadGameHoster,
        Self::ReloadGameController,
        Self::SetGlobalSettingHosterG2P,
        Self::SetGlobalSettingControllerG2P,
        Self::SetGameStorageHosterG2P,
        Self::SetGameStorageControllerG2P,
        Self::UpdatedGlobalSettingHosterP2G,
        Self::UpdatedGlobalSettingControllerP2G,
        Self::UpdatedGameStorageHosterP2G,
        Self::UpdatedGameStorageControllerP2G,
    ];

    /// The exact wire tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::AppDataHoster => "AppData_HOSTER",
            Self::AppDataController => "AppData_CONTROLLER",
            Self::InitGameHoster => "INIT_GAME_HOSTER",
            Self::InitGameController => "INIT_GAME_CONTROLLER",
            Self::ReadyStatusHoster => "READY_STATUS_HOSTER",
            Self::ReadyStatusController => "READY_STATUS_CONTROLLER",
            Self::PingHoster => "PING_HOSTER",
            Self::PongController => "PONG_CONTROLLER",
            Self::PongHoster => "PONG_HOSTER",
            Self::GameActionHoster => "GAME_ACTION_HOSTER",
            Self::GameActionController => "GAME_ACTION_CONTROLLER",
            Self::GameActionResponseHoster => "GAME_ACTION_RESPONSE_HOSTER",
            Self::GameActionResponseController => "GAME_ACTION_RESPONSE_CONTROLLER",
            Self::EndGameHoster => "END_GAME_HOSTER",
            Self::EndGameController => "END_GAME_CONTROLLER",
            Self::ReloadGameHoster => "RELOAD_GAME_HOSTER",
            Self::ReloadGameController => "RELOAD_GAME_CONTROLLER",
            Self::SetGlobalSettingHosterG2P => "SET_GLOBAL_SETTING_HOSTER_G2P",
            Self::SetGlobalSettingControllerG2P => "SET_GLOBAL_SETTING_CONTROLLER_G2P",
            Self::SetGameStorageHosterG2P => "SET_GAME_STORAGE_HOSTER_G2P",
            Self::SetGameStorageControllerG2P => "SET_GAME_STORAGE_CONTROLLER_G2P",
            Self::UpdatedGlobalSettingHosterP2G => "UPDATED_GLOBAL_SETTING_HOSTER_P2G",
            Self::UpdatedGlobalSettingControllerP2G => "UPDATED_GLOBAL_SETTING_CONTROLLER_P2G",
            Self::UpdatedGameStorageHosterP2G => "UPDATED_GAME_STORAGE_HOSTER_P2G",
            Self::UpdatedGameStorageControllerP2G => "UPDATED_GAME_STORAGE_CONTROLLER_P2G",
        }
    }

    /// Looks up a wire tag. Unknown tags return `None`.
    pub fn from_wire(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    /// `true` for the four game-level tags (opaque payloads routed to or
    /// from a specific player). Everything else is app-level.
    pub fn is_game_message(self) -> bool {
        matches!(
            self,
            Self::GameActionHoster
                | Self::GameActionController
                | Self::GameActionResponseHoster
                | Self::GameActionResponseController
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The `type` of a validated envelope.
///
/// Envelopes with a tag outside the catalog are still valid envelopes:
/// they reach wildcard listeners but never match a typed filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// A tag from the catalog.
    Known(MessageType),
    /// Any other string or number tag, kept verbatim (numbers stringified).
    Unrecognized(String),
}

impl MessageKind {
    /// The known type, if any.
    pub fn known(&self) -> Option<MessageType> {
        match self {
            Self::Known(message_type) => Some(*message_type),
            Self::Unrecognized(_) => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(message_type) => message_type.fmt(f),
            Self::Unrecognized(tag) => f.write_str(tag),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Structural envelope check.
///
/// `true` iff `value` is an object with a string-or-number `type` and a
/// `data` key. `data: null` counts as present; only a missing key is
/// "undefined". Arrays, primitives and `null` are rejected.
pub fn is_envelope(value: &Value) -> bool {
    let Value::Object(map) = value else {
        return false;
    };
    matches!(map.get("type"), Some(Value::String(_) | Value::Number(_)))
        && map.contains_key("data")
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A structurally valid inbound message, not yet interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// The `type` tag.
    pub kind: MessageKind,
    /// The `data` payload, untouched.
    pub data: Value,
}

impl Envelope {
    /// Builds an envelope for a known type.
    pub fn new(message_type: MessageType, data: Value) -> Self {
        Self {
            kind: MessageKind::Known(message_type),
            data,
        }
    }

    /// Validates `value` with [`is_envelope`] and splits it into parts.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidEnvelope`] when the value fails the check.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        if !is_envelope(value) {
            return Err(ProtocolError::InvalidEnvelope(describe(value)));
        }

        let kind = match &value["type"] {
            Value::String(tag) => match MessageType::from_wire(tag) {
                Some(message_type) => MessageKind::Known(message_type),
                None => MessageKind::Unrecognized(tag.clone()),
            },
            other => MessageKind::Unrecognized(other.to_string()),
        };

        Ok(Self {
            kind,
            data: value["data"].clone(),
        })
    }

    /// The known type, if the tag is in the catalog.
    pub fn message_type(&self) -> Option<MessageType> {
        self.kind.known()
    }

    /// `true` if this envelope carries `message_type`.
    pub fn is(&self, message_type: MessageType) -> bool {
        self.kind == MessageKind::Known(message_type)
    }

    /// Deserializes `data` into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        T::deserialize(&self.data).map_err(ProtocolError::Decode)
    }

    /// Interprets the whole envelope as a typed [`Message`].
    pub fn to_message(&self) -> Result<Message, ProtocolError> {
        Message::deserialize(&self.to_value()).map_err(ProtocolError::Decode)
    }

    /// Reassembles the `{ type, data }` value.
    pub fn to_value(&self) -> Value {
        let tag = match &self.kind {
            MessageKind::Known(message_type) => Value::String(message_type.as_str().to_owned()),
            MessageKind::Unrecognized(tag) => Value::String(tag.clone()),
        };
        let mut map = Map::new();
        map.insert("type".into(), tag);
        map.insert("data".into(), self.data.clone());
        Value::Object(map)
    }
}

/// Short description of why a value isn't an envelope, for error messages.
fn describe(value: &Value) -> String {
    match value {
        Value::Object(map) => match (map.get("type"), map.contains_key("data")) {
            (None, _) => "missing `type`".into(),
            (Some(Value::String(_) | Value::Number(_)), false) => "missing `data`".into(),
            (Some(_), _) => "`type` is neither a string nor a number".into(),
        },
        Value::Null => "null".into(),
        Value::Array(_) => "array".into(),
        _ => "not an object".into(),
    }
}

// =========================================================================
// Tests
// =========================================================================
