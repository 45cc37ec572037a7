//! The event bus: synchronous, in-process publish/subscribe keyed by
//! [`EventName`].
//!
//! Every micro-frontend mounted into the same process must see the same
//! bus, otherwise a `user:login` published by the auth module never reaches
//! the navigation bar. There are two ways to get that shared instance:
//!
//! - build one `Arc<EventBus>` at the composition root and hand clones to
//!   every module (preferred, see `streamia::Shell`), or
//! - call [`EventBus::global`], a lazily-created process-wide slot, when
//!   modules are wired independently.
//!
//! # Delivery contract
//!
//! - `publish` runs every callback registered for the name, in
//!   registration order, before it returns.
//! - A panicking callback is caught and logged. The remaining callbacks
//!   still run and the publisher never sees the panic.
//! - Callbacks registered while a publish is in flight are not invoked by
//!   that publish. The callback list is snapshotted before delivery, so
//!   callbacks may freely re-enter the bus.
//! - No queuing, no persistence, no replay.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use crate::{Event, EventKind, EventName};

type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identifies one registration. Unique for the lifetime of a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscriber {
    id: SubscriptionId,
    callback: Callback,
}

static GLOBAL_BUS: OnceLock<Arc<EventBus>> = OnceLock::new();

/// A publish/subscribe registry shared by all co-loaded modules.
pub struct EventBus {
    /// Subscribers per name, in registration order. A name is present
    /// only while it has at least one subscriber.
    registry: Mutex<HashMap<EventName, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the process-wide bus, creating it on first access.
    ///
    /// Lives until the process exits.
    pub fn global() -> Arc<EventBus> {
        Arc::clone(GLOBAL_BUS.get_or_init(|| {
            tracing::info!("created global event bus");
            Arc::new(EventBus::new())
        }))
    }

    /// Registers `callback` for every event published under `name`.
    ///
    /// Never fails. The returned [`Subscription`] removes exactly this
    /// registration when disposed.
    pub fn subscribe<F>(self: &Arc<Self>, name: EventName, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let total = {
            let mut registry = self.lock();
            let subscribers = registry.entry(name).or_default();
            subscribers.push(Subscriber {
                id,
                callback: Arc::new(callback),
            });
            subscribers.len()
        };

        tracing::debug!(event = %name, %id, total, "subscribed");

        Subscription {
            bus: Arc::downgrade(self),
            name,
            id,
            disposed: AtomicBool::new(false),
        }
    }

    /// Typed form of [`subscribe`](Self::subscribe): the callback receives
    /// the payload of `K` directly.
    pub fn on<K, F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        K: EventKind,
        F: Fn(&K::Payload) + Send + Sync + 'static,
    {
        self.subscribe(K::NAME, move |event| {
            if let Some(payload) = K::payload(event) {
                callback(payload);
            }
        })
    }

    /// Delivers `event` to every subscriber of its name, synchronously and
    /// in registration order.
    ///
    /// Publishing to a name with no subscribers is a no-op.
    pub fn publish(&self, event: Event) {
        let name = event.name();
        let callbacks: Vec<Callback> = self
            .lock()
            .get(&name)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .map(|s| Arc::clone(&s.callback))
                    .collect()
            })
            .unwrap_or_default();

        if callbacks.is_empty() {
            tracing::debug!(event = %name, "no subscribers");
            return;
        }

        // `LoginPayload`'s Debug impl masks the token.
        tracing::debug!(
            event = %name,
            subscribers = callbacks.len(),
            payload = ?event,
            "publishing"
        );

        for (index, callback) in callbacks.iter().enumerate() {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| callback(&event)));
            if let Err(panic) = outcome {
                tracing::error!(
                    event = %name,
                    subscriber = index,
                    reason = panic_message(panic.as_ref()),
                    "subscriber panicked during publish"
                );
            }
        }
    }

    /// Typed form of [`publish`](Self::publish).
    pub fn emit<K: EventKind>(&self, payload: K::Payload) {
        self.publish(K::into_event(payload));
    }

    /// Removes every subscriber registered for `name`.
    pub fn unsubscribe(&self, name: EventName) {
        // Bind first so the callbacks are dropped after the lock is released.
        let removed = self.lock().remove(&name);
        if let Some(removed) = removed {
            tracing::debug!(event = %name, removed = removed.len(), "unsubscribed all");
        }
    }

    /// Removes every subscriber for every name.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.lock());
        tracing::debug!(events = drained.len(), "event bus cleared");
    }

    /// Names that currently have at least one subscriber, in no
    /// particular order.
    pub fn events(&self) -> Vec<EventName> {
        self.lock().keys().copied().collect()
    }

    /// Number of callbacks currently registered for `name`.
    pub fn subscriber_count(&self, name: EventName) -> usize {
        self.lock().get(&name).map_or(0, Vec::len)
    }

    /// Removes a single registration. Returns `false` if it was already gone.
    fn remove(&self, name: EventName, id: SubscriptionId) -> bool {
        let mut registry = self.lock();
        let Some(subscribers) = registry.get_mut(&name) else {
            return false;
        };
        let Some(index) = subscribers.iter().position(|s| s.id == id) else {
            return false;
        };
        let removed = subscribers.remove(index);
        let remaining = subscribers.len();
        if remaining == 0 {
            registry.remove(&name);
        }
        // Release the lock before the callback (and whatever it captured)
        // is dropped.
        drop(registry);
        drop(removed);

        tracing::debug!(event = %name, %id, remaining, "subscription disposed");
        true
    }

    /// Callbacks never run under this lock, so a poisoned mutex still holds
    /// a consistent map. Recover it instead of failing the caller.
    fn lock(&self) -> MutexGuard<'_, HashMap<EventName, Vec<Subscriber>>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.events())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// The disposer returned by [`EventBus::subscribe`].
///
/// Dropping a `Subscription` does NOT remove the callback; call
/// [`dispose`](Self::dispose), or convert it with
/// [`dispose_on_drop`](Self::dispose_on_drop) to tie the registration to a
/// scope. Holds only a weak reference, so it never keeps the bus alive.
#[must_use = "the callback stays registered until dispose() is called"]
pub struct Subscription {
    bus: Weak<EventBus>,
    name: EventName,
    id: SubscriptionId,
    disposed: AtomicBool,
}

impl Subscription {
    /// Removes this registration from the bus. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.name, self.id);
        }
    }

    /// `true` once [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// The name this subscription listens to.
    pub fn name(&self) -> EventName {
        self.name
    }

    /// This registration's id.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wraps the subscription in a guard that disposes it when dropped.
    pub fn dispose_on_drop(self) -> SubscriptionGuard {
        SubscriptionGuard(self)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Disposes the wrapped [`Subscription`] on drop.
#[derive(Debug)]
pub struct SubscriptionGuard(Subscription);

impl SubscriptionGuard {
    /// The guarded subscription.
    pub fn subscription(&self) -> &Subscription {
        &self.0
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.0.dispose();
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{FavoriteAdded, UserLogout};
    use crate::{FavoritePayload, LoadingPayload, MoviePayload};

    // -- Helpers ----------------------------------------------------------

    fn bus() -> Arc<EventBus> {
        Arc::new(EventBus::new())
    }

    /// A shared log that callbacks append to.
    fn recorder() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn loading(source: &str) -> Event {
        Event::LoadingStart(LoadingPayload {
            source: source.into(),
        })
    }

    /// Subscribes a callback that records `label` on every delivery.
    fn record_as(
        bus: &Arc<EventBus>,
        name: EventName,
        log: &Arc<Mutex<Vec<String>>>,
        label: &str,
    ) -> Subscription {
        let log = Arc::clone(log);
        let label = label.to_string();
        bus.subscribe(name, move |_| log.lock().unwrap().push(label.clone()))
    }

    // =====================================================================
    // subscribe() / publish()
    // =====================================================================

    #[test]
    fn test_publish_invokes_subscriber_once_with_payload() {
        let bus = bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = bus.subscribe(EventName::LoadingStart, move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        bus.publish(loading("catalog"));

        // Delivery is synchronous: visible as soon as publish returns.
        assert_eq!(*seen.lock().unwrap(), vec![loading("catalog")]);
    }

    #[test]
    fn test_publish_invokes_subscribers_in_registration_order() {
        let bus = bus();
        let log = recorder();
        let _a = record_as(&bus, EventName::LoadingStart, &log, "a");
        let _b = record_as(&bus, EventName::LoadingStart, &log, "b");
        let _c = record_as(&bus, EventName::LoadingStart, &log, "c");

        bus.publish(loading("shell"));

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = bus();
        bus.publish(Event::UserLogout);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn test_publish_only_reaches_subscribers_of_that_name() {
        let bus = bus();
        let log = recorder();
        let _sub = record_as(&bus, EventName::LoadingEnd, &log, "end");

        bus.publish(loading("x"));

        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_publish_panicking_subscriber_does_not_stop_delivery() {
        let bus = bus();
        let log = recorder();
        let _before = record_as(&bus, EventName::LoadingStart, &log, "before");
        let _boom = bus.subscribe(EventName::LoadingStart, |_| {
            panic!("subscriber exploded");
        });
        let _after = record_as(&bus, EventName::LoadingStart, &log, "after");

        // Must not propagate to the publisher.
        bus.publish(loading("x"));

        assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);
    }

    #[test]
    fn test_subscriber_added_during_publish_is_not_invoked_by_it() {
        let bus = bus();
        let log = recorder();
        let late: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let bus_ref = Arc::clone(&bus);
        let log_ref = Arc::clone(&log);
        let late_ref = Arc::clone(&late);
        let _adder = bus.subscribe(EventName::LoadingStart, move |_| {
            let sub = record_as(&bus_ref, EventName::LoadingStart, &log_ref, "late");
            late_ref.lock().unwrap().push(sub);
        });

        bus.publish(loading("x"));
        assert!(log.lock().unwrap().is_empty());

        // But it is registered for the next publish.
        bus.publish(loading("y"));
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn test_publish_from_inside_callback_is_delivered() {
        let bus = bus();
        let log = recorder();
        let _end = record_as(&bus, EventName::LoadingEnd, &log, "end");

        let bus_ref = Arc::clone(&bus);
        let _start = bus.subscribe(EventName::LoadingStart, move |_| {
            bus_ref.publish(Event::LoadingEnd(LoadingPayload {
                source: "nested".into(),
            }));
        });

        bus.publish(loading("outer"));

        assert_eq!(*log.lock().unwrap(), vec!["end"]);
    }

    // =====================================================================
    // on() / emit()
    // =====================================================================

    #[test]
    fn test_on_receives_typed_payload() {
        let bus = bus();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = bus.on::<FavoriteAdded, _>(move |payload| {
            sink.lock().unwrap().push(payload.clone());
        });

        bus.emit::<FavoriteAdded>(FavoritePayload::movie("m1"));

        assert_eq!(*seen.lock().unwrap(), vec![FavoritePayload::movie("m1")]);
    }

    #[test]
    fn test_on_unit_payload_kind() {
        let bus = bus();
        let log = recorder();
        let sink = Arc::clone(&log);
        let _sub = bus.on::<UserLogout, _>(move |_| {
            sink.lock().unwrap().push("logout".into());
        });

        bus.emit::<UserLogout>(());

        assert_eq!(*log.lock().unwrap(), vec!["logout"]);
    }

    // =====================================================================
    // Subscription (disposer)
    // =====================================================================

    #[test]
    fn test_dispose_removes_only_that_registration() {
        let bus = bus();
        let log = recorder();
        let a = record_as(&bus, EventName::MovieSelected, &log, "a");
        let _b = record_as(&bus, EventName::MovieSelected, &log, "b");

        a.dispose();
        bus.publish(Event::MovieSelected(MoviePayload {
            movie_id: "m1".into(),
        }));

        assert_eq!(*log.lock().unwrap(), vec!["b"]);
        assert_eq!(bus.subscriber_count(EventName::MovieSelected), 1);
    }

    #[test]
    fn test_dispose_twice_is_noop() {
        let bus = bus();
        let log = recorder();
        let a = record_as(&bus, EventName::MovieSelected, &log, "a");
        let _b = record_as(&bus, EventName::MovieSelected, &log, "b");

        a.dispose();
        a.dispose();

        assert!(a.is_disposed());
        assert_eq!(bus.subscriber_count(EventName::MovieSelected), 1);
    }

    #[test]
    fn test_dispose_identical_callbacks_removes_one() {
        // Two registrations of the "same" behavior are still two entries.
        let bus = bus();
        let log = recorder();
        let first = record_as(&bus, EventName::LoadingStart, &log, "same");
        let _second = record_as(&bus, EventName::LoadingStart, &log, "same");

        first.dispose();
        bus.publish(loading("x"));

        assert_eq!(*log.lock().unwrap(), vec!["same"]);
    }

    #[test]
    fn test_dispose_after_bus_dropped_is_harmless() {
        let bus = bus();
        let sub = bus.subscribe(EventName::LoadingStart, |_| {});
        drop(bus);

        sub.dispose();
        assert!(sub.is_disposed());
    }

    #[test]
    fn test_dispose_after_unsubscribe_does_not_touch_new_registrations() {
        let bus = bus();
        let log = recorder();
        let old = record_as(&bus, EventName::LoadingStart, &log, "old");
        bus.unsubscribe(EventName::LoadingStart);
        let _new = record_as(&bus, EventName::LoadingStart, &log, "new");

        old.dispose();
        bus.publish(loading("x"));

        assert_eq!(*log.lock().unwrap(), vec!["new"]);
    }

    #[test]
    fn test_dropping_subscription_keeps_callback_registered() {
        let bus = bus();
        let log = recorder();
        drop(record_as(&bus, EventName::LoadingStart, &log, "leaked"));

        bus.publish(loading("x"));

        assert_eq!(*log.lock().unwrap(), vec!["leaked"]);
    }

    #[test]
    fn test_dispose_on_drop_guard_removes_registration() {
        let bus = bus();
        let log = recorder();
        {
            let _guard =
                record_as(&bus, EventName::LoadingStart, &log, "scoped").dispose_on_drop();
            assert_eq!(bus.subscriber_count(EventName::LoadingStart), 1);
        }

        bus.publish(loading("x"));

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.subscriber_count(EventName::LoadingStart), 0);
    }

    // =====================================================================
    // unsubscribe() / clear() / events()
    // =====================================================================

    #[test]
    fn test_unsubscribe_removes_all_subscribers_of_name() {
        let bus = bus();
        let log = recorder();
        let _a = record_as(&bus, EventName::LoadingStart, &log, "a");
        let _b = record_as(&bus, EventName::LoadingStart, &log, "b");
        let _other = record_as(&bus, EventName::LoadingEnd, &log, "other");

        bus.unsubscribe(EventName::LoadingStart);
        bus.publish(loading("x"));

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.subscriber_count(EventName::LoadingEnd), 1);
    }

    #[test]
    fn test_clear_removes_everything() {
        let bus = bus();
        let log = recorder();
        let _a = record_as(&bus, EventName::LoadingStart, &log, "a");
        let _b = record_as(&bus, EventName::UserLogout, &log, "b");

        bus.clear();
        bus.publish(loading("x"));
        bus.publish(Event::UserLogout);

        assert!(log.lock().unwrap().is_empty());
        assert!(bus.events().is_empty());
    }

    #[test]
    fn test_events_lists_only_names_with_subscribers() {
        let bus = bus();
        let log = recorder();
        let _login = record_as(&bus, EventName::UserLogin, &log, "login");
        let fav = record_as(&bus, EventName::FavoriteAdded, &log, "fav");
        assert_eq!(bus.events().len(), 2);

        fav.dispose();

        let events = bus.events();
        assert!(events.contains(&EventName::UserLogin));
        assert!(!events.contains(&EventName::FavoriteAdded));
    }

    // =====================================================================
    // global()
    // =====================================================================

    #[test]
    fn test_global_returns_same_instance() {
        let a = EventBus::global();
        let b = EventBus::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
