//! Player roster for the Framelink hoster.
//!
//! The platform reports the full list of players on every change. This
//! crate keeps a stable [`Player`] handle per connection id and turns each
//! new list into discrete [`PlayerEvent`]s.
//!
//! # Key types
//!
//! - [`PlayerStore`]: the roster and its listeners.
//! - [`Player`]: a shared handle to one player's record.
//! - [`PlayerEvent`] / [`PlayerEventKind`]: what changed, and for whom.
//! - [`RosterError`]: failures while waiting on roster state.

mod error;
mod event;
mod player;
mod store;

pub use error::RosterError;
pub use event::{PlayerEvent, PlayerEventKind};
pub use player::Player;
pub use store::PlayerStore;
