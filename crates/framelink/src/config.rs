//! Communicator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// PingConfig
// ---------------------------------------------------------------------------

/// How the hoster measures latency to its players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingConfig {
    /// Run the periodic scheduler. `fetch_ping` works either way.
    pub enabled: bool,

    /// Time between measurement rounds. Rounds don't wait for each other.
    pub interval: Duration,

    /// How long a probe waits for its pong. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(2_500),
            timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl PingConfig {
    /// Shortest interval the scheduler will run at.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

    /// No periodic rounds.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Clamps `interval` up to [`Self::MIN_INTERVAL`].
    ///
    /// Called automatically when a hoster starts its scheduler.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval = ?self.interval,
                min = ?Self::MIN_INTERVAL,
                "ping interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// CommunicatorConfig
// ---------------------------------------------------------------------------

/// Settings shared by the hoster and controller communicators.
///
/// ```rust
/// use std::time::Duration;
/// use framelink::{CommunicatorConfig, PingConfig};
///
/// let config = CommunicatorConfig::default()
///     .with_auto_ready(true)
///     .with_confirm_timeout(Some(Duration::from_secs(3)))
///     .with_ping(PingConfig::disabled());
/// assert!(config.auto_ready);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicatorConfig {
    /// Announce readiness on our own, `auto_ready_delay` after
    /// construction. For games that never call `ready()` themselves.
    pub auto_ready: bool,

    pub auto_ready_delay: Duration,

    /// How long `set_global_setting` / `set_game_storage` wait for the
    /// platform's confirmation. `None` waits forever.
    pub confirm_timeout: Option<Duration>,

    /// Latency measurement (hoster only).
    pub ping: PingConfig,

    /// Announced in `INIT_GAME_*`.
    pub core_version: String,
}

impl Default for CommunicatorConfig {
    fn default() -> Self {
        Self {
            auto_ready: false,
            auto_ready_delay: Duration::from_secs(1),
            confirm_timeout: Some(Duration::from_secs(10)),
            ping: PingConfig::default(),
            core_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl CommunicatorConfig {
    pub fn with_auto_ready(mut self, auto_ready: bool) -> Self {
        self.auto_ready = auto_ready;
        self
    }

    pub fn with_auto_ready_delay(mut self, delay: Duration) -> Self {
        self.auto_ready_delay = delay;
        self
    }

    pub fn with_confirm_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn with_ping(mut self, ping: PingConfig) -> Self {
        self.ping = ping;
        self
    }

    pub fn with_core_version(mut self, version: impl Into<String>) -> Self {
        self.core_version = version.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_communicator_config_default() {
        let config = CommunicatorConfig::default();
        assert!(!config.auto_ready);
        assert_eq!(config.auto_ready_delay, Duration::from_secs(1));
        assert_eq!(config.confirm_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.core_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_ping_config_default() {
        let ping = PingConfig::default();
        assert!(ping.enabled);
        assert_eq!(ping.interval, Duration::from_millis(2_500));
    }

    #[test]
    fn test_validated_clamps_zero_interval() {
        let ping = PingConfig::default()
            .with_interval(Duration::ZERO)
            .validated();
        assert_eq!(ping.interval, PingConfig::MIN_INTERVAL);
    }

    #[test]
    fn test_validated_keeps_sane_interval() {
        let ping = PingConfig::default()
            .with_interval(Duration::from_secs(5))
            .validated();
        assert_eq!(ping.interval, Duration::from_secs(5));
    }

    #[test]
    fn test_builders_chain() {
        let config = CommunicatorConfig::default()
            .with_core_version("9.9.9")
            .with_ping(PingConfig::disabled().with_timeout(None));
        assert_eq!(config.core_version, "9.9.9");
        assert!(!config.ping.enabled);
        assert_eq!(config.ping.timeout, None);
    }
}
