//! Subscriber table with snapshot dispatch
//!
//! ```text
//!   register(cb) ──► [ id 1 │ id 2 │ id 3 ]   (registration order)
//!                          │
//!   dispatch(ev) ── snapshot ──► cb1(ev.clone()) ─► cb2(ev.clone()) ─► cb3(ev)
//! ```
//!
//! The subscriber list is snapshotted when a dispatch starts and the lock is
//! released before any callback runs, so callbacks may register or
//! unregister on the same registry. A callback registered during a dispatch
//! does not see that dispatch's event; a callback unregistered during a
//! dispatch is skipped if it has not run yet.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifier returned by [`CallbackRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl CallbackId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CallbackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "callback#{}", self.0)
    }
}

type Callback<E> = Arc<dyn Fn(E) + Send + Sync>;

struct Registration<E> {
    id: CallbackId,
    tag: Option<String>,
    callback: Callback<E>,
}

struct Subscribers<E> {
    next_id: u64,
    registrations: Vec<Registration<E>>,
}

impl<E> Subscribers<E> {
    fn contains(&self, id: CallbackId) -> bool {
        self.registrations.iter().any(|r| r.id == id)
    }
}

/// Typed callback table keyed by [`CallbackId`]
pub struct CallbackRegistry<E> {
    name: &'static str,
    subscribers: Mutex<Subscribers<E>>,
}

impl<E: Clone> CallbackRegistry<E> {
    /// Create an empty registry; `name` only appears in logs
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: Mutex::new(Subscribers {
                next_id: 1,
                registrations: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers<E>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a callback
    pub fn register<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(E) + Send + Sync + 'static,
    {
        self.insert(None, Arc::new(callback))
    }

    /// Register a callback with a client tag
    pub fn register_tagged<F>(&self, tag: impl Into<String>, callback: F) -> CallbackId
    where
        F: Fn(E) + Send + Sync + 'static,
    {
        self.insert(Some(tag.into()), Arc::new(callback))
    }

    fn insert(&self, tag: Option<String>, callback: Callback<E>) -> CallbackId {
        let mut subscribers = self.lock();
        let id = CallbackId(subscribers.next_id);
        subscribers.next_id += 1;

        tracing::trace!(registry = self.name, id = %id, tag = ?tag, "Callback registered");

        subscribers.registrations.push(Registration { id, tag, callback });
        id
    }

    /// Remove a callback
    ///
    /// Unknown or already removed ids are ignored. Returns whether anything
    /// was removed.
    pub fn unregister(&self, id: CallbackId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.registrations.len();
        subscribers.registrations.retain(|r| r.id != id);
        let removed = subscribers.registrations.len() != before;

        if removed {
            tracing::trace!(registry = self.name, id = %id, "Callback unregistered");
        }

        removed
    }

    /// Invoke every registered callback in registration order
    ///
    /// Each callback receives its own clone of `event`. Returns the number of
    /// callbacks invoked.
    pub fn dispatch(&self, event: E) -> usize {
        let snapshot: Vec<(CallbackId, Callback<E>)> = self
            .lock()
            .registrations
            .iter()
            .map(|r| (r.id, Arc::clone(&r.callback)))
            .collect();

        let mut invoked = 0;
        for (id, callback) in snapshot {
            if !self.lock().contains(id) {
                continue;
            }
            callback(event.clone());
            invoked += 1;
        }

        invoked
    }

    /// Check whether `id` is currently registered
    pub fn contains(&self, id: CallbackId) -> bool {
        self.lock().contains(id)
    }

    /// Client tag given at registration
    pub fn tag(&self, id: CallbackId) -> Option<String> {
        self.lock()
            .registrations
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.tag.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> std::fmt::Debug for CallbackRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .subscribers
            .lock()
            .map(|s| s.registrations.len())
            .unwrap_or_default();
        f.debug_struct("CallbackRegistry")
            .field("name", &self.name)
            .field("subscribers", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(u32) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |name: &str| {
            let sink = Arc::clone(&sink);
            let name = name.to_string();
            Box::new(move |ev: u32| sink.lock().unwrap().push(format!("{}:{}", name, ev)))
                as Box<dyn Fn(u32) + Send + Sync>
        };
        (log, make)
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let registry = CallbackRegistry::<u32>::new("test");
        let (log, make) = recorder();

        let a = make("a");
        let b = make("b");
        let c = make("c");
        registry.register(move |e| a(e));
        registry.register(move |e| b(e));
        registry.register(move |e| c(e));

        assert_eq!(registry.dispatch(7), 3);
        assert_eq!(*log.lock().unwrap(), vec!["a:7", "b:7", "c:7"]);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = CallbackRegistry::<u32>::new("test");
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        let first = registry.register(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let h = Arc::clone(&hits);
        registry.register(move |_| {
            h.fetch_add(10, Ordering::SeqCst);
        });

        assert!(registry.unregister(first));
        assert!(!registry.unregister(first));
        assert!(!registry.unregister(CallbackId(999)));

        registry.dispatch(0);
        assert_eq!(hits.load(Ordering::SeqCst), 10);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_events_are_passed_by_value() {
        let registry = CallbackRegistry::<Vec<u8>>::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        registry.register(|mut ev: Vec<u8>| ev.push(99));
        let s = Arc::clone(&seen);
        registry.register(move |ev: Vec<u8>| s.lock().unwrap().push(ev.len()));

        registry.dispatch(vec![1, 2, 3]);
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_register_during_dispatch_does_not_see_current_event() {
        let registry = Arc::new(CallbackRegistry::<u32>::new("test"));
        let late_hits = Arc::new(AtomicUsize::new(0));

        let reg = Arc::clone(&registry);
        let hits = Arc::clone(&late_hits);
        registry.register(move |_| {
            let hits = Arc::clone(&hits);
            reg.register(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(registry.dispatch(1), 1);
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 2);

        // Second dispatch reaches the callback added during the first one
        registry.dispatch(2);
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_during_dispatch_skips_pending_callback() {
        let registry = Arc::new(CallbackRegistry::<u32>::new("test"));
        let victim_hits = Arc::new(AtomicUsize::new(0));
        let victim_id = Arc::new(Mutex::new(None::<CallbackId>));

        let reg = Arc::clone(&registry);
        let id_slot = Arc::clone(&victim_id);
        registry.register(move |_| {
            if let Some(id) = *id_slot.lock().unwrap() {
                reg.unregister(id);
            }
        });

        let hits = Arc::clone(&victim_hits);
        let id = registry.register(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        *victim_id.lock().unwrap() = Some(id);

        assert_eq!(registry.dispatch(0), 1);
        assert_eq!(victim_hits.load(Ordering::SeqCst), 0);
        assert!(!registry.contains(id));
    }

    #[test]
    fn test_callback_may_unregister_itself() {
        let registry = Arc::new(CallbackRegistry::<u32>::new("test"));
        let own_id = Arc::new(Mutex::new(None::<CallbackId>));
        let hits = Arc::new(AtomicUsize::new(0));

        let reg = Arc::clone(&registry);
        let slot = Arc::clone(&own_id);
        let h = Arc::clone(&hits);
        let id = registry.register(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *slot.lock().unwrap() {
                reg.unregister(id);
            }
        });
        *own_id.lock().unwrap() = Some(id);

        registry.dispatch(0);
        registry.dispatch(0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_tags() {
        let registry = CallbackRegistry::<u32>::new("test");
        let tagged = registry.register_tagged("hand-tracker", |_| {});
        let plain = registry.register(|_| {});

        assert_eq!(registry.tag(tagged).as_deref(), Some("hand-tracker"));
        assert_eq!(registry.tag(plain), None);
        assert!(tagged < plain);
    }
}
