//! Wire protocol for Framelink.
//!
//! This crate defines what game frames and the hosting platform say to
//! each other:
//!
//! - **Envelope** ([`Envelope`], [`MessageType`], [`is_envelope`]): the
//!   `{ type, data }` wrapper and its structural validator.
//! - **Catalog** ([`Message`] and its data structs): the typed view of
//!   every message the platform understands.
//! - **Domain records** ([`PlayerDto`], settings, storage): the shapes
//!   carried inside those messages.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (plain JSON values) and
//! the communicators (listeners and state). It knows nothing about
//! frames, rosters or timing.
//!
//! ```text
//! Transport (Value) → Protocol (Envelope / Message) → Communicator (listeners)
//! ```

mod error;
mod messages;
mod player;
mod settings;
mod types;

pub use error::ProtocolError;
pub use messages::{
    ControllerAppData, ControllerGameAction, ControllerGameActionResponse, Empty,
    HosterAppData, HosterGameAction, HosterGameActionResponse, InitGame, Message, Ping,
    PongController, PongHoster, ReadyStatus,
};
pub use player::{PlayerDto, SubscriptionTier};
pub use settings::{
    ControllerGlobalSettings, ControllerSetting, GameStorage, HosterGlobalSettings,
    HosterSetting, MaturityLevel, StorageEntry,
};
pub use types::{Envelope, MessageKind, MessageType, is_envelope};
