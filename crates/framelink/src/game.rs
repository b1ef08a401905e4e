//! Typed game payloads.
//!
//! The platform routes game actions without looking inside them. A game
//! describes its own payloads by implementing [`GameData`]; the
//! communicators then encode outgoing payloads and decode incoming ones.
//!
//! ```rust
//! use framelink::GameData;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! #[serde(tag = "kind")]
//! enum Input { Move { dx: i32 }, Fire }
//!
//! #[derive(Serialize, Deserialize)]
//! struct Score { points: u32 }
//!
//! struct Shooter;
//!
//! impl GameData for Shooter {
//!     type ControllerToHoster = Input;
//!     type HosterToController = Score;
//! }
//! ```
//!
//! An incoming payload that doesn't decode is logged and skipped; the
//! listener never sees it.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Payload types for one game.
pub trait GameData: Send + Sync + 'static {
    /// What controllers send the hoster.
    type ControllerToHoster: Serialize + DeserializeOwned + Send + Sync + 'static;
    /// What the hoster sends controllers.
    type HosterToController: Serialize + DeserializeOwned + Send + Sync + 'static;
}

/// Untyped payloads: plain JSON both ways.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawGameData;

impl GameData for RawGameData {
    type ControllerToHoster = Value;
    type HosterToController = Value;
}
