//! # Framelink
//!
//! Typed communication between a game embedded in a hosting platform and
//! that platform.
//!
//! A game runs as two kinds of frames. The **hoster** shows the shared
//! screen and sees every player; each **controller** is one player's
//! device. Neither talks to the other directly: both exchange
//! `{ type, data }` envelopes with the platform, which relays.
//!
//! ## Layers
//!
//! ```text
//! framelink-transport   send / on_receive, listener registries
//! framelink-protocol    envelope validation, message catalog
//! framelink-roster      players and roster events (hoster)
//! framelink             Dispatcher, HosterCommunicator, ControllerCommunicator
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use framelink::prelude::*;
//!
//! # async fn run(transport: Arc<dyn Transport>) -> Result<(), FramelinkError> {
//! let hoster: HosterCommunicator = HosterCommunicator::new(transport, CommunicatorConfig::default())?;
//! hoster.wait_for_load().await;
//!
//! let _joins = hoster.players().add_join_listener(|player| {
//!     println!("{player} joined");
//! });
//! let _actions = hoster.add_game_message_listener(|from, payload| {
//!     println!("{from} sent {payload}");
//! });
//! hoster.ready()?;
//! # Ok(())
//! # }
//! ```

mod app_state;
mod config;
mod controller;
mod dispatcher;
mod error;
mod game;
mod hoster;
pub mod logging;
mod ping;

pub use app_state::AppInfo;
pub use config::{CommunicatorConfig, PingConfig};
pub use controller::ControllerCommunicator;
pub use dispatcher::{Dispatcher, GameRoute, PendingReply};
pub use error::FramelinkError;
pub use game::{GameData, RawGameData};
pub use hoster::HosterCommunicator;
pub use ping::{PingData, PingSample};

pub use framelink_protocol as protocol;
pub use framelink_roster as roster;
pub use framelink_transport as transport;

/// The types most games need.
pub mod prelude {
    pub use crate::{
        AppInfo, CommunicatorConfig, ControllerCommunicator, FramelinkError, GameData,
        HosterCommunicator, PingConfig, PingData, PingSample, RawGameData,
    };
    pub use framelink_protocol::{
        ControllerSetting, Envelope, HosterSetting, MaturityLevel, MessageType, PlayerDto,
    };
    pub use framelink_roster::{Player, PlayerEvent, PlayerEventKind, PlayerStore};
    pub use framelink_transport::{MemoryTransport, Subscription, Transport};
}
