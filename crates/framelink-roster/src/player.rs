//! The `Player` handle.
//!
//! A `Player` is a cheap, cloneable handle to one roster entry. Every
//! clone points at the same record, and the store overwrites that record
//! in place on each snapshot, so a handle taken before an update shows the
//! new values after it. Use [`Player::ptr_eq`] to check identity.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use framelink_protocol::{PlayerDto, SubscriptionTier};
use tokio::sync::watch;

use crate::{PlayerEventKind, RosterError};

/// What `wait_for_ready` watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Readiness {
    ready: bool,
    removed: bool,
}

struct PlayerCell {
    connection_id: String,
    record: Mutex<PlayerDto>,
    readiness: watch::Sender<Readiness>,
}

/// A connected (or recently connected) game participant.
#[derive(Clone)]
pub struct Player {
    cell: Arc<PlayerCell>,
}

impl Player {
    pub(crate) fn new(dto: PlayerDto) -> Self {
        let readiness = watch::Sender::new(Readiness {
            ready: dto.ready,
            removed: false,
        });
        Self {
            cell: Arc::new(PlayerCell {
                connection_id: dto.connection_id.clone(),
                record: Mutex::new(dto),
                readiness,
            }),
        }
    }

    /// Stable identity. Never changes for the life of the handle.
    pub fn connection_id(&self) -> &str {
        &self.cell.connection_id
    }

    pub fn screen_name(&self) -> Option<String> {
        self.record().screen_name.clone()
    }

    pub fn image(&self) -> Option<String> {
        self.record().image.clone()
    }

    /// The controller frame has signaled it can receive messages.
    pub fn is_ready(&self) -> bool {
        self.record().ready
    }

    /// Currently connected, as opposed to dropped.
    pub fn is_active(&self) -> bool {
        self.record().active
    }

    pub fn has_connection(&self) -> bool {
        self.record().has_connection
    }

    pub fn is_host(&self) -> bool {
        self.record().is_host
    }

    pub fn subscription(&self) -> SubscriptionTier {
        self.record().subscription
    }

    /// A copy of the full record.
    pub fn dto(&self) -> PlayerDto {
        self.record().clone()
    }

    /// `true` if both handles refer to the same roster entry.
    pub fn ptr_eq(&self, other: &Player) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Resolves once the player is ready; immediately if it already is.
    ///
    /// `None` waits without limit.
    ///
    /// # Errors
    /// - [`RosterError::Timeout`] if `timeout` elapses first.
    /// - [`RosterError::Removed`] if the player is kicked first.
    pub async fn wait_for_ready(&self, timeout: Option<Duration>) -> Result<(), RosterError> {
        let mut readiness = self.cell.readiness.subscribe();
        let connection_id = self.connection_id().to_owned();

        let wait = async {
            let state = readiness
                .wait_for(|state| state.ready || state.removed)
                .await
                .map(|state| *state)
                .map_err(|_| RosterError::Removed(connection_id.clone()))?;
            if state.ready {
                Ok(())
            } else {
                Err(RosterError::Removed(connection_id.clone()))
            }
        };

        match timeout {
            Some(after) => tokio::time::timeout(after, wait)
                .await
                .map_err(|_| RosterError::Timeout {
                    connection_id: connection_id.clone(),
                    after,
                })?,
            None => wait.await,
        }
    }

    /// Overwrites every field with `dto` and reports which tracked fields
    /// changed, in a fixed order.
    pub(crate) fn overwrite(&self, dto: &PlayerDto) -> Vec<PlayerEventKind> {
        let changes = {
            let mut record = self.record();
            let changes = field_changes(&record, dto);
            *record = dto.clone();
            // The id is the map key; a snapshot can't rename a player.
            record.connection_id.clone_from(&self.cell.connection_id);
            changes
        };
        self.cell.readiness.send_modify(|state| state.ready = dto.ready);
        changes
    }

    pub(crate) fn mark_removed(&self) {
        self.cell.readiness.send_modify(|state| state.removed = true);
    }

    fn record(&self) -> MutexGuard<'_, PlayerDto> {
        self.cell.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player").field("record", &*self.record()).finish()
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.screen_name() {
            Some(name) => write!(f, "{name} ({})", self.connection_id()),
            None => f.write_str(self.connection_id()),
        }
    }
}

/// Diff of two records of the same player.
fn field_changes(before: &PlayerDto, after: &PlayerDto) -> Vec<PlayerEventKind> {
    let mut changes = Vec::new();

    if before.ready != after.ready {
        changes.push(if after.ready {
            PlayerEventKind::Ready
        } else {
            PlayerEventKind::Unready
        });
    }
    if before.active != after.active {
        changes.push(if after.active {
            PlayerEventKind::Active
        } else {
            PlayerEventKind::Inactive
        });
    }
    if before.has_connection != after.has_connection {
        changes.push(if after.has_connection {
            PlayerEventKind::Connected
        } else {
            PlayerEventKind::Disconnected
        });
    }
    if before.is_host != after.is_host {
        changes.push(PlayerEventKind::HostChanged);
    }
    if before.screen_name != after.screen_name {
        changes.push(PlayerEventKind::ScreenNameChanged);
    }
    if before.image != after.image {
        changes.push(PlayerEventKind::ImageChanged);
    }

    changes
}
