//! The favorites store: a module-local cache of the user's favorites.
//!
//! Changes are optimistic. The cache is updated first, the API is called,
//! and the change is either committed (and announced on the bus) or
//! compensated by applying its inverse. See [`MutationState`].
//!
//! Other modules' changes arrive as `favorite:added` / `favorite:removed`
//! and are folded into the cache; `user:logout` empties it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use streamia_events::kind::{
    FavoriteAdded, FavoriteRemoved, LoadingEnd, LoadingStart, UserLogout,
};
use streamia_events::{
    ErrorPayload, Event, EventBus, FavoritePayload, LoadingPayload,
    SubscriptionGuard,
};
use streamia_session::SessionStore;

use crate::{
    Favorite, FavoritesApi, FavoritesError, Mutation, MutationKind,
    MutationState,
};

/// `source` used in `loading:*` and `error:occurred` payloads.
const SOURCE: &str = "favorites";

#[derive(Debug)]
struct Pending {
    mutation: Mutation,
    /// Another module already committed the same change, so the server
    /// holds it whatever this call's outcome.
    confirmed: bool,
}

#[derive(Debug, Default)]
struct Cache {
    favorites: BTreeMap<String, Favorite>,
    in_flight: HashMap<String, Pending>,
    last_mutation: Option<Mutation>,
}

impl Cache {
    fn apply(&mut self, kind: MutationKind, favorite: &Favorite) {
        match kind {
            MutationKind::Add => {
                self.favorites
                    .insert(favorite.movie_id.clone(), favorite.clone());
            }
            MutationKind::Remove => {
                self.favorites.remove(&favorite.movie_id);
            }
        }
    }

    /// Folds in a change another module committed. A matching change
    /// still in flight here is marked confirmed instead.
    fn observe(&mut self, kind: MutationKind, favorite: Favorite) {
        let movie_id = favorite.movie_id.clone();
        if let Some(pending) = self.in_flight.get_mut(&movie_id) {
            if pending.mutation.kind() == kind {
                pending.confirmed = true;
                tracing::debug!(%movie_id, ?kind, "in-flight change confirmed elsewhere");
            }
            return;
        }
        let present = self.favorites.contains_key(&movie_id);
        if present != (kind == MutationKind::Add) {
            tracing::debug!(%movie_id, ?kind, "favorite changed elsewhere");
            self.apply(kind, &favorite);
        }
    }
}

struct Inner {
    cache: Mutex<Cache>,
}

impl Inner {
    fn cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A favorites cache bound to a session and an API client.
pub struct FavoritesStore<A: FavoritesApi> {
    inner: Arc<Inner>,
    api: Arc<A>,
    session: Arc<SessionStore>,
    bus: Arc<EventBus>,
    _reactions: Vec<SubscriptionGuard>,
}

impl<A: FavoritesApi> FavoritesStore<A> {
    /// Creates an empty store and subscribes it to `favorite:*` and
    /// `user:logout` on the session's bus. Call [`load`](Self::load) to
    /// fill it.
    pub fn new(session: Arc<SessionStore>, api: Arc<A>) -> Self {
        let bus = Arc::clone(session.bus());
        let inner = Arc::new(Inner {
            cache: Mutex::new(Cache::default()),
        });

        let reactions = vec![
            {
                let weak = Arc::downgrade(&inner);
                let session = Arc::downgrade(&session);
                bus.on::<FavoriteAdded, _>(move |payload| {
                    if let Some(inner) = signed_in(&weak, &session) {
                        let favorite = Favorite {
                            movie_id: payload.movie_id.clone(),
                            title: payload.title.clone().unwrap_or_default(),
                            poster: None,
                            note: None,
                        };
                        inner.cache().observe(MutationKind::Add, favorite);
                    }
                })
                .dispose_on_drop()
            },
            {
                let weak = Arc::downgrade(&inner);
                let session = Arc::downgrade(&session);
                bus.on::<FavoriteRemoved, _>(move |payload| {
                    if let Some(inner) = signed_in(&weak, &session) {
                        inner
                            .cache()
                            .observe(MutationKind::Remove, Favorite::new(&payload.movie_id));
                    }
                })
                .dispose_on_drop()
            },
            {
                let weak = Arc::downgrade(&inner);
                bus.on::<UserLogout, _>(move |_| {
                    if let Some(inner) = Weak::upgrade(&weak) {
                        *inner.cache() = Cache::default();
                        tracing::info!("favorites cleared on logout");
                    }
                })
                .dispose_on_drop()
            },
        ];

        Self {
            inner,
            api,
            session,
            bus,
            _reactions: reactions,
        }
    }

    /// Replaces the cache with the server's list. Returns how many
    /// favorites were loaded.
    ///
    /// Without a session the cache is emptied and
    /// [`FavoritesError::Unauthenticated`] returned.
    pub async fn load(&self) -> Result<usize, FavoritesError> {
        let token = match self.token() {
            Ok(token) => token,
            Err(e) => {
                self.inner.cache().favorites.clear();
                return Err(e);
            }
        };

        self.bus.emit::<LoadingStart>(LoadingPayload {
            source: SOURCE.into(),
        });
        let result = self.api.list(&token).await;
        self.bus.emit::<LoadingEnd>(LoadingPayload {
            source: SOURCE.into(),
        });

        match result {
            Ok(favorites) => {
                let count = favorites.len();
                self.inner.cache().favorites = favorites
                    .into_iter()
                    .map(|f| (f.movie_id.clone(), f))
                    .collect();
                tracing::info!(count, "favorites loaded");
                Ok(count)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load favorites");
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Flips `movie_id`. Returns whether it is a favorite afterwards.
    pub async fn toggle(&self, movie_id: &str) -> Result<bool, FavoritesError> {
        if self.is_favorite(movie_id) {
            self.remove(movie_id).await?;
            Ok(false)
        } else {
            self.add(Favorite::new(movie_id)).await?;
            Ok(true)
        }
    }

    /// Adds `favorite`. A no-op if it's already cached.
    pub async fn add(&self, favorite: Favorite) -> Result<(), FavoritesError> {
        self.mutate(MutationKind::Add, favorite).await
    }

    /// Removes `movie_id`. A no-op if it isn't cached.
    pub async fn remove(&self, movie_id: &str) -> Result<(), FavoritesError> {
        let favorite = self
            .inner
            .cache()
            .favorites
            .get(movie_id)
            .cloned()
            .unwrap_or_else(|| Favorite::new(movie_id));
        self.mutate(MutationKind::Remove, favorite).await
    }

    pub fn is_favorite(&self, movie_id: &str) -> bool {
        self.inner.cache().favorites.contains_key(movie_id)
    }

    /// Cached movie ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.inner.cache().favorites.keys().cloned().collect()
    }

    /// Cached favorites, sorted by movie id.
    pub fn favorites(&self) -> Vec<Favorite> {
        self.inner.cache().favorites.values().cloned().collect()
    }

    /// The most recently started or settled mutation, if any.
    pub fn last_mutation(&self) -> Option<Mutation> {
        self.inner.cache().last_mutation.clone()
    }

    /// State of the most recent mutation, `Idle` if none.
    pub fn mutation_state(&self) -> MutationState {
        self.last_mutation()
            .map_or(MutationState::Idle, |m| m.state())
    }

    // -- internals --------------------------------------------------------

    fn token(&self) -> Result<String, FavoritesError> {
        self.session.token().ok_or(FavoritesError::Unauthenticated)
    }

    /// Apply tentatively, call the API, then commit or compensate.
    async fn mutate(
        &self,
        kind: MutationKind,
        favorite: Favorite,
    ) -> Result<(), FavoritesError> {
        let token = self.token()?;
        let movie_id = favorite.movie_id.clone();

        {
            let mut cache = self.inner.cache();
            let present = cache.favorites.contains_key(&movie_id);
            if present == (kind == MutationKind::Add) {
                return Ok(());
            }
            if cache.in_flight.contains_key(&movie_id) {
                return Err(FavoritesError::InFlight(movie_id));
            }
            let mutation = Mutation::begin(&movie_id, kind);
            cache.apply(kind, &favorite);
            cache.last_mutation = Some(mutation.clone());
            cache.in_flight.insert(
                movie_id.clone(),
                Pending {
                    mutation,
                    confirmed: false,
                },
            );
        }
        tracing::debug!(%movie_id, ?kind, "mutation pending");

        let result = match kind {
            MutationKind::Add => self.api.add(&token, &favorite).await,
            MutationKind::Remove => self.api.remove(&token, &movie_id).await,
        };

        let outcome = if result.is_ok() {
            MutationState::Committed
        } else {
            MutationState::RolledBack
        };
        {
            let mut cache = self.inner.cache();
            // A logout while in flight resets the cache: the outcome
            // belongs to a session that no longer exists.
            let Some(Pending {
                mutation: mut settled,
                confirmed,
            }) = cache.in_flight.remove(&movie_id)
            else {
                drop(cache);
                tracing::info!(%movie_id, ?kind, ok = result.is_ok(), "settled after logout, discarding");
                return Err(FavoritesError::Unauthenticated);
            };
            let moved = settled.transition(outcome);
            if moved && outcome == MutationState::RolledBack {
                if confirmed {
                    tracing::debug!(%movie_id, ?kind, "rolled back but confirmed elsewhere, keeping");
                } else {
                    cache.apply(kind.inverse(), &favorite);
                }
            }
            cache.last_mutation = Some(settled);
        }

        match result {
            Ok(()) => {
                tracing::info!(%movie_id, ?kind, "favorite change committed");
                let payload = FavoritePayload {
                    movie_id,
                    title: Some(favorite.title).filter(|t| !t.is_empty()),
                    timestamp: None,
                };
                self.bus.publish(match kind {
                    MutationKind::Add => Event::FavoriteAdded(payload),
                    MutationKind::Remove => Event::FavoriteRemoved(payload),
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%movie_id, ?kind, error = %e, "favorite change rolled back");
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Reports `error` on the bus. A 401 also drops the session token,
    /// since the server no longer honours it.
    fn fail(&self, error: &FavoritesError) {
        if error.is_unauthorized() {
            self.session.set_token(None);
        }
        self.bus.publish(Event::ErrorOccurred(ErrorPayload {
            source: SOURCE.into(),
            message: error.to_string(),
        }));
    }
}

/// The cache behind `weak`, if it's alive and the session still holds a
/// token. Changes announced after logout are ignored.
fn signed_in(weak: &Weak<Inner>, session: &Weak<SessionStore>) -> Option<Arc<Inner>> {
    let session = session.upgrade()?;
    session.token()?;
    weak.upgrade()
}

impl<A: FavoritesApi> std::fmt::Debug for FavoritesStore<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.inner.cache();
        f.debug_struct("FavoritesStore")
            .field("favorites", &cache.favorites.len())
            .field("in_flight", &cache.in_flight.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFavoritesApi;
    use serde_json::json;
    use streamia_events::{EventName, User};
    use streamia_session::token;
    use streamia_storage::MemoryStorage;

    fn signed_in_session(bus: &Arc<EventBus>) -> Arc<SessionStore> {
        let session = SessionStore::builder(Arc::clone(bus), Arc::new(MemoryStorage::new()))
            .name("favorites")
            .build();
        session.login(
            User {
                id: "u1".into(),
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "ada@example.com".into(),
                age: 36,
            },
            token::encode_unsigned(&json!({ "sub": "u1" })),
        );
        Arc::new(session)
    }

    fn store() -> (Arc<EventBus>, Arc<MemoryFavoritesApi>, FavoritesStore<MemoryFavoritesApi>) {
        let bus = Arc::new(EventBus::new());
        let api = Arc::new(MemoryFavoritesApi::new());
        let store = FavoritesStore::new(signed_in_session(&bus), Arc::clone(&api));
        (bus, api, store)
    }

    #[tokio::test]
    async fn test_new_store_is_idle_and_empty() {
        let (_bus, _api, store) = store();
        assert!(store.ids().is_empty());
        assert_eq!(store.mutation_state(), MutationState::Idle);
    }

    #[tokio::test]
    async fn test_add_already_cached_skips_api() {
        let (_bus, api, store) = store();
        store.add(Favorite::new("m1")).await.unwrap();
        let calls = api.calls();

        store.add(Favorite::new("m1")).await.unwrap();

        assert_eq!(api.calls(), calls);
    }

    #[tokio::test]
    async fn test_remove_uncached_skips_api() {
        let (_bus, api, store) = store();
        store.remove("m1").await.unwrap();
        assert_eq!(api.calls(), 0);
        assert_eq!(store.mutation_state(), MutationState::Idle);
    }

    #[tokio::test]
    async fn test_failed_add_reports_error_occurred() {
        let (bus, api, store) = store();
        api.set_failing(true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = bus.subscribe(EventName::ErrorOccurred, move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        let _ = store.add(Favorite::new("m1")).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(
            &seen[0],
            Event::ErrorOccurred(ErrorPayload { source, .. }) if source == "favorites"
        ));
    }

    #[tokio::test]
    async fn test_load_unauthorized_drops_session_token() {
        let (_bus, api, store) = store();
        api.set_unauthorized(true);

        let err = store.load().await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(store.session.token(), None);
        assert!(!store.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_favorite_event_while_signed_out_is_ignored() {
        let (bus, _api, store) = store();
        store.session.set_token(None);

        bus.publish(Event::FavoriteAdded(FavoritePayload::movie("m1")));

        assert!(store.ids().is_empty());
    }

    #[tokio::test]
    async fn test_favorite_event_for_pending_change_marks_it_confirmed() {
        let (bus, _api, store) = store();
        let mut cache = Cache::default();
        cache.in_flight.insert(
            "m1".into(),
            Pending {
                mutation: Mutation::begin("m1", MutationKind::Add),
                confirmed: false,
            },
        );
        cache.apply(MutationKind::Add, &Favorite::new("m1"));
        *store.inner.cache() = cache;

        bus.publish(Event::FavoriteAdded(FavoritePayload::movie("m1")));

        let cache = store.inner.cache();
        assert!(cache.in_flight["m1"].confirmed);
        assert!(cache.favorites.contains_key("m1"));
    }

    #[tokio::test]
    async fn test_load_brackets_request_with_loading_events() {
        let (bus, _api, store) = store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _start = bus.subscribe(EventName::LoadingStart, move |e| {
            sink.lock().unwrap().push(e.name())
        });
        let sink = Arc::clone(&seen);
        let _end = bus.subscribe(EventName::LoadingEnd, move |e| {
            sink.lock().unwrap().push(e.name())
        });

        store.load().await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventName::LoadingStart, EventName::LoadingEnd]
        );
    }
}
