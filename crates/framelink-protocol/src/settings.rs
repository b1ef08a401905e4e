//! Platform-wide settings and per-game storage.
//!
//! Global settings belong to the user, not the game; the platform owns
//! them and a game may only ask to change one key at a time. On the wire
//! every change is `{ "key": ..., "value": ... }`, which is exactly the
//! adjacently tagged form of [`HosterSetting`] / [`ControllerSetting`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Key/value pairs a game keeps on the platform. `None` means "unset".
pub type GameStorage = HashMap<String, Option<String>>;

/// Content rating the hoster is allowed to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MaturityLevel {
    #[default]
    Everyone,
    Teen,
    Mature,
}

// ---------------------------------------------------------------------------
// Hoster
// ---------------------------------------------------------------------------

/// Settings visible to the hoster frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HosterGlobalSettings {
    pub sound_fx_volume: f64,
    pub music_volume: f64,
    pub narration_volume: f64,
    pub maturity_level: MaturityLevel,
}

/// A single hoster setting change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "camelCase")]
pub enum HosterSetting {
    SoundFxVolume(f64),
    MusicVolume(f64),
    NarrationVolume(f64),
    MaturityLevel(MaturityLevel),
}

impl HosterSetting {
    /// The wire key, e.g. `"soundFxVolume"`.
    pub fn key(&self) -> &'static str {
        match self {
            Self::SoundFxVolume(_) => "soundFxVolume",
            Self::MusicVolume(_) => "musicVolume",
            Self::NarrationVolume(_) => "narrationVolume",
            Self::MaturityLevel(_) => "maturityLevel",
        }
    }
}

impl HosterGlobalSettings {
    /// Writes one confirmed change into the cached settings.
    pub fn apply(&mut self, setting: &HosterSetting) {
        match *setting {
            HosterSetting::SoundFxVolume(v) => self.sound_fx_volume = v,
            HosterSetting::MusicVolume(v) => self.music_volume = v,
            HosterSetting::NarrationVolume(v) => self.narration_volume = v,
            HosterSetting::MaturityLevel(level) => self.maturity_level = level,
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Settings visible to a controller frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerGlobalSettings {
    pub sound_fx_volume: f64,
}

/// A single controller setting change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "camelCase")]
pub enum ControllerSetting {
    SoundFxVolume(f64),
}

impl ControllerSetting {
    /// The wire key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::SoundFxVolume(_) => "soundFxVolume",
        }
    }
}

impl ControllerGlobalSettings {
    /// Writes one confirmed change into the cached settings.
    pub fn apply(&mut self, setting: &ControllerSetting) {
        match *setting {
            ControllerSetting::SoundFxVolume(v) => self.sound_fx_volume = v,
        }
    }
}

// ---------------------------------------------------------------------------
// Game storage
// ---------------------------------------------------------------------------

/// A single game-storage write, or its confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub key: String,
    /// `None` removes the key.
    #[serde(default)]
    pub value: Option<String>,
}
