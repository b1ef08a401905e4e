//! The player store: the hoster's view of who is in the game.
//!
//! The platform doesn't send "player joined" or "player got ready"
//! messages. It sends the whole roster, every time anything changes, as
//! part of `AppData_HOSTER`. The store turns those snapshots into a stable
//! set of [`Player`] handles and a stream of [`PlayerEvent`]s.
//!
//! # Smart update
//!
//! ```text
//! previous roster ─┐
//!                  ├─→ joins (snapshot order)
//! snapshot ────────┤   kicks (previous roster order)
//!                  └─→ field changes, per connection id
//! ```
//!
//! Everything is matched by connection id, never by position: a snapshot
//! that lists the same players in a different order produces no events.
//! Players present in both snapshots keep their handle; their record is
//! overwritten in place. Joins and kicks are emitted before field events,
//! and all events are emitted after the roster itself is updated, so a
//! listener always sees the post-update roster.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use framelink_protocol::PlayerDto;
use framelink_transport::{ListenerRegistry, Subscription};

use crate::{Player, PlayerEvent, PlayerEventKind};

/// Players keyed by connection id, plus their join order.
#[derive(Default)]
struct Roster {
    players: HashMap<String, Player>,
    /// Iteration order. Survivors keep their slot, newcomers go last.
    order: Vec<String>,
}

/// Tracks the current roster and notifies listeners of changes.
pub struct PlayerStore {
    roster: Mutex<Roster>,
    events: Arc<ListenerRegistry<PlayerEvent>>,
}

impl PlayerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            roster: Mutex::new(Roster::default()),
            events: Arc::new(ListenerRegistry::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// All players, in roster order.
    pub fn players(&self) -> Vec<Player> {
        let roster = self.lock();
        roster
            .order
            .iter()
            .filter_map(|id| roster.players.get(id).cloned())
            .collect()
    }

    /// Looks a player up by connection id.
    pub fn player(&self, connection_id: &str) -> Option<Player> {
        self.lock().players.get(connection_id).cloned()
    }

    /// Connection ids, in roster order.
    pub fn connection_ids(&self) -> Vec<String> {
        self.lock().order.clone()
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.lock().players.contains_key(connection_id)
    }

    pub fn len(&self) -> usize {
        self.lock().players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().players.is_empty()
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    /// Replaces the roster with `snapshot` and emits the resulting events.
    ///
    /// If a connection id appears twice in one snapshot, the later entry
    /// wins. Returns the emitted events, in emission order.
    pub fn smart_update_players(&self, snapshot: &[PlayerDto]) -> Vec<PlayerEvent> {
        let mut joined = Vec::new();
        let mut kicked = Vec::new();
        let mut changed = Vec::new();

        {
            let mut roster = self.lock();

            let mut latest: HashMap<&str, &PlayerDto> = HashMap::with_capacity(snapshot.len());
            let mut seen_order: Vec<&str> = Vec::with_capacity(snapshot.len());
            for dto in snapshot {
                if latest.insert(dto.connection_id.as_str(), dto).is_none() {
                    seen_order.push(dto.connection_id.as_str());
                }
            }

            // Kicks: tracked ids the snapshot no longer names.
            let Roster { players, order } = &mut *roster;
            order.retain(|id| {
                if latest.contains_key(id.as_str()) {
                    return true;
                }
                if let Some(player) = players.remove(id) {
                    player.mark_removed();
                    kicked.push(player);
                }
                false
            });

            // Joins and in-place updates, in snapshot order.
            for id in seen_order {
                let dto = latest[id];
                match players.get(id) {
                    Some(player) => {
                        for kind in player.overwrite(dto) {
                            changed.push(PlayerEvent {
                                kind,
                                player: player.clone(),
                            });
                        }
                    }
                    None => {
                        let player = Player::new(dto.clone());
                        players.insert(id.to_owned(), player.clone());
                        order.push(id.to_owned());
                        joined.push(player);
                    }
                }
            }
        }

        let events: Vec<PlayerEvent> = joined
            .into_iter()
            .map(|player| PlayerEvent {
                kind: PlayerEventKind::Joined,
                player,
            })
            .chain(kicked.into_iter().map(|player| PlayerEvent {
                kind: PlayerEventKind::Kicked,
                player,
            }))
            .chain(changed)
            .collect();

        for event in &events {
            tracing::debug!(
                connection_id = event.player.connection_id(),
                kind = %event.kind,
                "player event"
            );
            self.events.emit(event);
        }

        events
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    /// Listens for roster events. `None` receives every kind.
    pub fn add_listener<F>(&self, kind: Option<PlayerEventKind>, listener: F) -> Subscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.events.add(move |event: &PlayerEvent| {
            if kind.is_none_or(|kind| kind == event.kind) {
                listener(event);
            }
        })
    }

    /// Listens for events about one connection id only.
    pub fn add_player_listener<F>(
        &self,
        connection_id: impl Into<String>,
        kind: Option<PlayerEventKind>,
        listener: F,
    ) -> Subscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        let connection_id = connection_id.into();
        self.add_listener(kind, move |event| {
            if event.player.connection_id() == connection_id {
                listener(event);
            }
        })
    }

    pub fn add_join_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Player) + Send + Sync + 'static,
    {
        self.on(PlayerEventKind::Joined, listener)
    }

    pub fn add_kick_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Player) + Send + Sync + 'static,
    {
        self.on(PlayerEventKind::Kicked, listener)
    }

    pub fn add_ready_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Player) + Send + Sync + 'static,
    {
        self.on(PlayerEventKind::Ready, listener)
    }

    pub fn add_unready_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Player) + Send + Sync + 'static,
    {
        self.on(PlayerEventKind::Unready, listener)
    }

    pub fn add_active_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Player) + Send + Sync + 'static,
    {
        self.on(PlayerEventKind::Active, listener)
    }

    pub fn add_inactive_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Player) + Send + Sync + 'static,
    {
        self.on(PlayerEventKind::Inactive, listener)
    }

    pub fn add_connected_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Player) + Send + Sync + 'static,
    {
        self.on(PlayerEventKind::Connected, listener)
    }

    pub fn add_disconnected_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Player) + Send + Sync + 'static,
    {
        self.on(PlayerEventKind::Disconnected, listener)
    }

    fn on<F>(&self, kind: PlayerEventKind, listener: F) -> Subscription
    where
        F: Fn(&Player) + Send + Sync + 'static,
    {
        self.add_listener(Some(kind), move |event| listener(&event.player))
    }

    fn lock(&self) -> MutexGuard<'_, Roster> {
        self.roster.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PlayerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerStore")
            .field("players", &self.connection_ids())
            .field("listeners", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(id: &str) -> PlayerDto {
        PlayerDto::new(id)
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = PlayerStore::new();
        assert!(store.is_empty());
        assert!(store.players().is_empty());
    }

    #[test]
    fn test_duplicate_id_in_snapshot_later_entry_wins() {
        let store = PlayerStore::new();
        let mut second = dto("a");
        second.ready = true;

        let events = store.smart_update_players(&[dto("a"), second]);

        assert_eq!(store.len(), 1);
        assert!(store.player("a").unwrap().is_ready());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, PlayerEventKind::Joined);
    }

    #[test]
    fn test_newcomers_appended_after_survivors() {
        let store = PlayerStore::new();
        store.smart_update_players(&[dto("a"), dto("b")]);
        store.smart_update_players(&[dto("c"), dto("b"), dto("a")]);

        assert_eq!(store.connection_ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_kicked_player_is_gone() {
        let store = PlayerStore::new();
        store.smart_update_players(&[dto("a"), dto("b")]);
        store.smart_update_players(&[dto("b")]);

        assert!(!store.contains("a"));
        assert!(store.player("a").is_none());
        assert_eq!(store.connection_ids(), vec!["b"]);
    }
}
