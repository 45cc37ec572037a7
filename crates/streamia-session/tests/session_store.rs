//! Integration tests for the session store: reloads, expiry, logout and
//! convergence between stores that share only a bus and storage.

use std::sync::{Arc, Mutex};

use serde_json::json;
use streamia_events::{Event, EventBus, EventName, LoginPayload};
use streamia_session::token;
use streamia_session::{
    ManualClock, Session, SessionConfig, SessionState, SessionStore, User,
};
use streamia_storage::{FileStorage, MemoryStorage, Storage};

const NOW: i64 = 1_700_000_000;

// =========================================================================
// Helpers
// =========================================================================

fn ada() -> User {
    User {
        id: "u1".into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: "ada@example.com".into(),
        age: 36,
    }
}

fn token_with(claims: serde_json::Value) -> String {
    token::encode_unsigned(&claims)
}

fn store_on(
    bus: &Arc<EventBus>,
    storage: Arc<dyn Storage>,
    clock: &Arc<ManualClock>,
    name: &str,
) -> SessionStore {
    SessionStore::builder(Arc::clone(bus), storage)
        .name(name)
        .clock(clock.clone())
        .build()
}

// =========================================================================
// Round-trip through storage
// =========================================================================

#[test]
fn test_login_then_reload_restores_session() {
    let bus = Arc::new(EventBus::new());
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let t = token_with(json!({ "sub": "u1", "exp": NOW + 3600 }));

    store_on(&bus, Arc::clone(&storage), &clock, "auth").login(ada(), t.clone());

    // A fresh page load: new bus, new store, same storage.
    let reloaded = store_on(&Arc::new(EventBus::new()), storage, &clock, "shell");
    let session = reloaded.initialize();

    assert_eq!(session.user, Some(ada()));
    assert_eq!(session.token, Some(t));
    assert_eq!(reloaded.state(), SessionState::Authenticated);
}

#[test]
fn test_login_then_reload_with_token_without_exp_restores_session() {
    let bus = Arc::new(EventBus::new());
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let t = token_with(json!({ "sub": "u1" }));

    store_on(&bus, Arc::clone(&storage), &clock, "auth").login(ada(), t.clone());
    let session = store_on(&bus, storage, &clock, "shell").initialize();

    assert_eq!(session, Session::new(ada(), t));
}

#[test]
fn test_file_storage_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(NOW));
    let t = token_with(json!({ "exp": NOW + 60 }));

    {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::in_dir(dir.path()).unwrap());
        store_on(&Arc::new(EventBus::new()), storage, &clock, "auth").login(ada(), t.clone());
    }

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::in_dir(dir.path()).unwrap());
    let store = store_on(&Arc::new(EventBus::new()), storage, &clock, "shell");

    assert_eq!(store.user(), Some(ada()));
    assert_eq!(store.token(), Some(t));
}

#[test]
fn test_custom_config_keys_are_used() {
    let bus = Arc::new(EventBus::new());
    let storage = Arc::new(MemoryStorage::new());
    let config = SessionConfig {
        token_key: "jwt".into(),
        user_key: "profile".into(),
    };
    let store = SessionStore::builder(Arc::clone(&bus), storage.clone())
        .config(config)
        .build();

    store.login(ada(), token_with(json!({})));

    assert!(storage.contains("jwt").unwrap());
    assert!(storage.contains("profile").unwrap());
    assert!(!storage.contains("authToken").unwrap());
}

// =========================================================================
// Expiry
// =========================================================================

#[test]
fn test_login_with_past_exp_then_initialize_clears_everything() {
    let bus = Arc::new(EventBus::new());
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let store = store_on(&bus, storage.clone(), &clock, "auth");

    store.login(ada(), token_with(json!({ "exp": NOW - 1 })));
    let session = store.initialize();

    assert_eq!(session.user, None);
    assert_eq!(session.token, None);
    assert!(!store.is_authenticated());
    assert!(storage.is_empty());
}

#[test]
fn test_token_expiring_while_mounted_is_settled_on_read() {
    let bus = Arc::new(EventBus::new());
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let store = store_on(&bus, storage.clone(), &clock, "shell");
    store.login(ada(), token_with(json!({ "exp": NOW + 30 })));

    clock.advance(29);
    assert!(store.is_authenticated());

    clock.advance(1);
    assert!(!store.is_authenticated());
    assert_eq!(store.user(), None);
    assert!(storage.is_empty());
}

// =========================================================================
// Logout
// =========================================================================

#[test]
fn test_logout_after_login_clears_storage_keys() {
    let bus = Arc::new(EventBus::new());
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let store = store_on(&bus, storage.clone(), &clock, "shell");
    store.login(ada(), token_with(json!({ "exp": NOW + 60 })));

    store.logout();

    assert!(!store.is_authenticated());
    assert!(!storage.contains("authToken").unwrap());
    assert!(!storage.contains("user").unwrap());
}

#[test]
fn test_logout_publishes_user_logout_once() {
    let bus = Arc::new(EventBus::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let store = store_on(&bus, Arc::new(MemoryStorage::new()), &clock, "shell");
    let count = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&count);
    let _sub = bus.subscribe(EventName::UserLogout, move |event| {
        assert_eq!(event, &Event::UserLogout);
        *counter.lock().unwrap() += 1;
    });

    store.logout();

    assert_eq!(*count.lock().unwrap(), 1);
}

// =========================================================================
// Cross-instance convergence
// =========================================================================

#[test]
fn test_login_on_one_store_converges_on_another() {
    let bus = Arc::new(EventBus::new());
    let clock = Arc::new(ManualClock::new(NOW));
    // Separate storage: B learns only through the bus.
    let a = store_on(&bus, Arc::new(MemoryStorage::new()), &clock, "auth");
    let b = store_on(&bus, Arc::new(MemoryStorage::new()), &clock, "favorites");
    assert!(!b.is_authenticated());

    a.login(ada(), token_with(json!({ "exp": NOW + 60 })));

    assert_eq!(b.user(), Some(ada()));
    assert!(b.is_authenticated());
}

#[test]
fn test_logout_on_one_store_converges_on_another() {
    let bus = Arc::new(EventBus::new());
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let a = store_on(&bus, Arc::clone(&storage), &clock, "auth");
    let b = store_on(&bus, storage, &clock, "shell");
    a.login(ada(), token_with(json!({ "exp": NOW + 60 })));
    assert!(b.is_authenticated());

    b.logout();

    assert!(!a.is_authenticated());
    assert_eq!(a.session(), Session::unauthenticated());
}

#[test]
fn test_login_event_from_plain_publisher_is_adopted() {
    // An auth module that publishes directly instead of owning a store.
    let bus = Arc::new(EventBus::new());
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let store = store_on(&bus, storage.clone(), &clock, "shell");
    let t = token_with(json!({ "exp": NOW + 60 }));

    bus.publish(Event::UserLogin(LoginPayload {
        user: ada(),
        token: t.clone(),
    }));

    assert!(store.is_authenticated());
    assert_eq!(storage.get("authToken").unwrap(), Some(t));
}

#[test]
fn test_dropped_store_no_longer_reacts() {
    let bus = Arc::new(EventBus::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let a = store_on(&bus, Arc::new(MemoryStorage::new()), &clock, "auth");
    let b_storage = Arc::new(MemoryStorage::new());
    drop(store_on(&bus, b_storage.clone(), &clock, "unmounted"));

    a.login(ada(), token_with(json!({ "exp": NOW + 60 })));

    assert!(b_storage.is_empty());
    assert_eq!(bus.subscriber_count(EventName::UserLogin), 1);
}

// =========================================================================
// Storage failure resilience
// =========================================================================

#[test]
fn test_login_with_disabled_storage_does_not_panic_or_authenticate() {
    let bus = Arc::new(EventBus::new());
    let storage = Arc::new(MemoryStorage::new());
    storage.set_available(false);
    let clock = Arc::new(ManualClock::new(NOW));
    let store = store_on(&bus, storage, &clock, "auth");

    store.login(ada(), token_with(json!({ "exp": NOW + 60 })));

    assert!(!store.is_authenticated());
}

#[test]
fn test_logout_with_disabled_storage_still_unauthenticates() {
    let bus = Arc::new(EventBus::new());
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let store = store_on(&bus, storage.clone(), &clock, "shell");
    store.login(ada(), token_with(json!({ "exp": NOW + 60 })));
    storage.set_available(false);

    store.logout();

    assert!(!store.is_authenticated());
}
