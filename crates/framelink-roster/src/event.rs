//! Roster events.
//!
//! The store never exposes "something changed, go look". Every snapshot
//! is diffed per connection id and turned into discrete events, so
//! listeners only hear about what actually moved.

use std::fmt;

use crate::Player;

/// What happened to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerEventKind {
    /// First snapshot naming this connection id.
    Joined,
    /// A snapshot no longer names this connection id.
    Kicked,
    /// `ready` went false → true.
    Ready,
    /// `ready` went true → false.
    Unready,
    /// `active` went false → true.
    Active,
    /// `active` went true → false.
    Inactive,
    /// `has_connection` went false → true.
    Connected,
    /// `has_connection` went true → false.
    Disconnected,
    /// `is_host` flipped either way.
    HostChanged,
    /// `screen_name` changed.
    ScreenNameChanged,
    /// `image` changed.
    ImageChanged,
}

impl fmt::Display for PlayerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Joined => "joined",
            Self::Kicked => "kicked",
            Self::Ready => "ready",
            Self::Unready => "unready",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::HostChanged => "host-changed",
            Self::ScreenNameChanged => "screen-name-changed",
            Self::ImageChanged => "image-changed",
        };
        f.write_str(name)
    }
}

/// A single roster change. `player` already holds the new field values
/// (for `Kicked`, the last values it had).
#[derive(Debug, Clone)]
pub struct PlayerEvent {
    pub kind: PlayerEventKind,
    pub player: Player,
}
