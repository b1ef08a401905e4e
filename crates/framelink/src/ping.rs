//! Latency measurement.
//!
//! One probe, as seen from the hoster:
//!
//! ```text
//! hoster                         platform / controller
//!   │ PING_HOSTER {id, playerId} ──→ │
//!   │ ←── PONG_CONTROLLER {id, playerId}  (immediate echo)
//!   │ pingMs = now - sent_at
//!   │ PONG_HOSTER {id, playerId, pingMs} ──→ │  (controller learns it too)
//! ```
//!
//! The pong is matched on both `id` and `playerId`, so overlapping probes
//! to the same player never cross. The scheduler starts a round for every
//! active player each interval without waiting for earlier rounds.

use std::sync::Weak;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use framelink_roster::Player;
use rand::Rng;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::GameData;
use crate::hoster::HosterShared;

/// One completed hoster-side measurement.
#[derive(Debug, Clone)]
pub struct PingSample {
    pub connection_id: String,
    /// `None` if the player left the roster while the probe was out.
    pub player: Option<Player>,
    /// Full round trip in milliseconds.
    pub ping_ms: f64,
    pub last_poll: SystemTime,
}

/// The controller's view of its latency, from the latest `PONG_HOSTER`.
#[derive(Debug, Clone, PartialEq)]
pub struct PingData {
    pub ping_ms: f64,
    /// Hoster's clock, relative to its start, when the probe went out.
    pub time_since_start: f64,
    /// `time_since_start` plus half the round trip: an estimate of the
    /// hoster's relative clock "now".
    pub time_since_start_ping_adjusted: f64,
    pub hoster_time: f64,
    pub last_poll: SystemTime,
}

impl PingData {
    pub(crate) fn from_pong(ping_ms: f64, time_since_start: f64, hoster_time: f64) -> Self {
        Self {
            ping_ms,
            time_since_start,
            time_since_start_ping_adjusted: time_since_start + ping_ms / 2.0,
            hoster_time,
            last_poll: SystemTime::now(),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn epoch_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64() * 1_000.0)
        .unwrap_or_default()
}

pub(crate) fn as_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

/// A random opaque probe id (64 bits, hex).
pub(crate) fn probe_id() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Runs measurement rounds until the hoster is dropped or the returned
/// handle is aborted. Aborting also aborts the probes still in flight.
pub(crate) fn spawn_scheduler<G: GameData>(
    hoster: Weak<HosterShared<G>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; rounds start one interval in.
        ticker.tick().await;

        let mut probes = JoinSet::new();
        loop {
            ticker.tick().await;
            while probes.try_join_next().is_some() {}

            let Some(hoster) = hoster.upgrade() else {
                break;
            };
            let active: Vec<Player> = hoster
                .players
                .players()
                .into_iter()
                .filter(Player::is_active)
                .collect();
            debug!(players = active.len(), in_flight = probes.len(), "ping round");

            for player in active {
                let hoster = hoster.clone();
                probes.spawn(async move {
                    if let Err(e) = hoster.fetch_ping(player.connection_id()).await {
                        warn!(connection_id = player.connection_id(), error = %e, "ping failed");
                    }
                });
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_id_is_hex_and_varies() {
        let a = probe_id();
        let b = probe_id();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_ping_data_adjusts_by_half_round_trip() {
        let data = PingData::from_pong(40.0, 1_000.0, 5.0);
        assert_eq!(data.time_since_start_ping_adjusted, 1_020.0);
    }

    #[test]
    fn test_as_ms() {
        assert_eq!(as_ms(Duration::from_millis(250)), 250.0);
    }
}
