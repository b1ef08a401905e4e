//! Unified error type for Framelink.

use std::time::Duration;

use framelink_protocol::ProtocolError;
use framelink_roster::RosterError;
use framelink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors, so
/// communicator methods return this one type.
#[derive(Debug, thiserror::Error)]
pub enum FramelinkError {
    /// Sending failed (no parent frame, closed connection).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding an outgoing message or decoding an inbound one failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    /// A bounded wait (ping probe, settings confirmation) expired.
    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    /// The communicator went away while a reply was pending.
    #[error("{0} was cancelled")]
    Cancelled(String),
}
