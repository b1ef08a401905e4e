//! Subscriber setup for binaries.
//!
//! The library only emits `tracing` events. Call [`init`] once at the top
//! of `main` to see them.

use tracing_subscriber::{EnvFilter, fmt};

/// Installs a fmt subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// A second call (or a subscriber installed elsewhere) is left in place.
pub fn init() {
    init_with_default("info");
}

/// Like [`init`], with `default` used when `RUST_LOG` is unset or invalid.
pub fn init_with_default(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    if fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("global subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_with_default("debug");
        init();
    }
}
