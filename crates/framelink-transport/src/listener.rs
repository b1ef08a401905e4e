//! Listener registries and the `Subscription` handles they hand out.
//!
//! Every place in Framelink that lets callers "add a listener" goes
//! through a [`ListenerRegistry`]: transport receive hooks, app and game
//! message listeners, roster events, ping listeners. Registering returns a
//! [`Subscription`] whose [`destroy`](Subscription::destroy) removes exactly
//! that registration.
//!
//! # Identity
//!
//! Closures can't be compared for equality in Rust, so a registration is
//! identified by a generated `u64` id instead of by the callback itself.
//!
//! # Dispatch while mutating
//!
//! [`ListenerRegistry::emit`] copies the current listener list (cheap `Arc`
//! clones) and releases the lock before calling anything. A listener may
//! therefore add or destroy registrations, including its own, while a
//! dispatch is in progress. The change takes effect from the next `emit`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A registered callback.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

// ---------------------------------------------------------------------------
// ListenerRegistry
// ---------------------------------------------------------------------------

/// An insertion-ordered list of listeners for events of type `E`.
///
/// The registry is always used behind an `Arc` because the handles it
/// returns keep a weak reference back to it.
pub struct ListenerRegistry<E> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Listener<E>)>>,
}

impl<E: 'static> ListenerRegistry<E> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Registers `listener` at the end of the list.
    pub fn add<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, Arc::new(listener)));

        let registry = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        })
    }

    /// Invokes every listener registered at the moment of the call, in
    /// registration order. Returns how many were invoked.
    pub fn emit(&self, event: &E) -> usize {
        let snapshot: Vec<Listener<E>> = self
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn remove(&self, id: u64) -> bool {
        let mut entries = self.lock();
        match entries.iter().position(|(entry_id, _)| *entry_id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(u64, Listener<E>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: 'static> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ListenerRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self
            .entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or_default();
        f.debug_struct("ListenerRegistry").field("len", &len).finish()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle returned by every `add_*_listener` call.
///
/// Dropping a `Subscription` does **not** unregister anything; call
/// [`destroy`](Self::destroy), or wrap it in a [`SubscriptionGuard`] for
/// scoped registrations.
pub struct Subscription {
    teardown: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    /// Creates a handle that runs `teardown` on the first `destroy`.
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// A handle that is already destroyed.
    pub fn noop() -> Self {
        Self {
            teardown: Mutex::new(None),
        }
    }

    /// Bundles several handles into one; destroying it destroys all.
    pub fn all(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || {
            for subscription in &subscriptions {
                subscription.destroy();
            }
        })
    }

    /// Removes the registration. A second call is a no-op.
    pub fn destroy(&self) {
        let teardown = self
            .teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Returns `true` until [`destroy`](Self::destroy) has run.
    pub fn is_active(&self) -> bool {
        self.teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Converts the handle into a guard that destroys it on drop.
    pub fn guard(self) -> SubscriptionGuard {
        SubscriptionGuard(self)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Destroys the wrapped [`Subscription`] when dropped.
#[derive(Debug)]
pub struct SubscriptionGuard(Subscription);

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&u32) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_: &u32| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_calls_listeners_in_registration_order() {
        let registry = Arc::new(ListenerRegistry::<u32>::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            let _ = registry.add(move |_| order.lock().unwrap().push(tag));
        }

        assert_eq!(registry.emit(&0), 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_destroy_removes_only_that_registration() {
        let registry = Arc::new(ListenerRegistry::<u32>::new());
        let (a_count, a) = counter();
        let (b_count, b) = counter();
        let sub_a = registry.add(a);
        let _sub_b = registry.add(b);

        sub_a.destroy();
        registry.emit(&1);

        assert_eq!(a_count.load(Ordering::SeqCst), 0);
        assert_eq!(b_count.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_destroy_twice_is_noop() {
        let registry = Arc::new(ListenerRegistry::<u32>::new());
        let (_, a) = counter();
        let (_, b) = counter();
        let sub_a = registry.add(a);
        let _sub_b = registry.add(b);

        sub_a.destroy();
        sub_a.destroy();

        assert!(!sub_a.is_active());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_destroy_during_emit_does_not_skip_later_listeners() {
        let registry = Arc::new(ListenerRegistry::<u32>::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let self_slot = Arc::clone(&slot);
        let first = registry.add(move |_| {
            if let Some(sub) = self_slot.lock().unwrap().as_ref() {
                sub.destroy();
            }
        });
        *slot.lock().unwrap() = Some(first);

        let (count, second) = counter();
        let _second = registry.add(second);

        registry.emit(&7);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);

        registry.emit(&8);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_add_during_emit_takes_effect_next_time() {
        let registry = Arc::new(ListenerRegistry::<u32>::new());
        let (count, late) = counter();
        let late = Arc::new(late);

        let inner_registry = Arc::clone(&registry);
        let _ = registry.add(move |_| {
            let late = Arc::clone(&late);
            let _ = inner_registry.add(move |event| late(event));
        });

        assert_eq!(registry.emit(&0), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_guard_destroys_on_drop() {
        let registry = Arc::new(ListenerRegistry::<u32>::new());
        let (_, a) = counter();
        {
            let _guard = registry.add(a).guard();
            assert_eq!(registry.len(), 1);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_all_destroys_every_member() {
        let registry = Arc::new(ListenerRegistry::<u32>::new());
        let (_, a) = counter();
        let (_, b) = counter();
        let bundle = Subscription::all(vec![registry.add(a), registry.add(b)]);

        bundle.destroy();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_destroy_after_registry_dropped_is_harmless() {
        let registry = Arc::new(ListenerRegistry::<u32>::new());
        let (_, a) = counter();
        let sub = registry.add(a);
        drop(registry);

        sub.destroy();
        assert!(!sub.is_active());
    }
}
