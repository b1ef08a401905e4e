//! State both communicators keep from `AppData_*` snapshots: the session
//! info, the cached settings and storage, and the "loaded" flag.

use std::sync::{Mutex, MutexGuard, PoisonError};

use framelink_protocol::{GameStorage, StorageEntry};
use tokio::sync::watch;

/// Session details the platform announces in every app-data snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppInfo {
    /// This frame's own connection id.
    pub connection_id: String,
    pub join_url: String,
    pub join_code: String,
    pub dev_mode: bool,
    pub lobby_game: bool,
}

// ---------------------------------------------------------------------------
// LoadFlag
// ---------------------------------------------------------------------------

/// Flips to `true` on the first app-data snapshot and stays there.
pub(crate) struct LoadFlag(watch::Sender<bool>);

impl LoadFlag {
    pub(crate) fn new() -> Self {
        Self(watch::Sender::new(false))
    }

    pub(crate) fn set(&self) {
        self.0.send_if_modified(|loaded| !std::mem::replace(loaded, true));
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.0.borrow()
    }

    pub(crate) async fn wait(&self) {
        let mut loaded = self.0.subscribe();
        // The sender lives in `self`, so this can't observe a closed channel.
        let _ = loaded.wait_for(|loaded| *loaded).await;
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Cached global settings (`S`) and game storage.
///
/// Both are `None` until the platform first reports them.
pub(crate) struct Persistence<S> {
    inner: Mutex<Cached<S>>,
}

struct Cached<S> {
    settings: Option<S>,
    storage: Option<GameStorage>,
}

impl<S: Clone> Persistence<S> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Cached {
                settings: None,
                storage: None,
            }),
        }
    }

    /// Takes whatever a snapshot carries. Absent values keep the cache.
    pub(crate) fn refresh(&self, settings: Option<S>, storage: Option<GameStorage>) {
        let mut cached = self.lock();
        if settings.is_some() {
            cached.settings = settings;
        }
        if storage.is_some() {
            cached.storage = storage;
        }
    }

    /// Applies one confirmed setting change, if settings are known yet.
    pub(crate) fn update_settings(&self, apply: impl FnOnce(&mut S)) {
        if let Some(settings) = self.lock().settings.as_mut() {
            apply(settings);
        }
    }

    /// Applies one confirmed storage write.
    pub(crate) fn update_storage(&self, entry: &StorageEntry) {
        self.lock()
            .storage
            .get_or_insert_with(GameStorage::new)
            .insert(entry.key.clone(), entry.value.clone());
    }

    pub(crate) fn settings(&self) -> Option<S> {
        self.lock().settings.clone()
    }

    pub(crate) fn storage(&self) -> Option<GameStorage> {
        self.lock().storage.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Cached<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
