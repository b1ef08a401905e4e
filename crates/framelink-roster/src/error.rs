//! Error types for the roster layer.

use std::time::Duration;

/// Errors that can occur while waiting on roster state.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    /// The player didn't reach the awaited state in time.
    #[error("player {connection_id} not ready after {after:?}")]
    Timeout {
        connection_id: String,
        after: Duration,
    },

    /// The player left the roster while someone was waiting on it.
    #[error("player {0} was removed from the roster")]
    Removed(String),
}
