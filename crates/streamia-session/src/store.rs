//! The session store: one module's cached view of the shared session.
//!
//! Every micro-frontend mounts its own `SessionStore`. The stores are not
//! the same object and share no memory; they converge through two shared
//! media:
//!
//! - **durable storage**, read on [`initialize`](SessionStore::initialize)
//!   (a page load), and
//! - **the event bus**: each store rebroadcasts its own `login`/`logout`
//!   and adopts `user:login`, `user:logout` and `user:updated` published
//!   by anyone else.
//!
//! # Failure policy
//!
//! Storage faults never escape the default mutators. They are logged and
//! the operation is treated as not having happened, so the cached session
//! stays as it was. Clearing is the exception: `logout` always empties the
//! cache, even if storage can't be cleaned. The `try_*` variants return
//! the error for callers that want confirmation.
//!
//! # Concurrency note
//!
//! The cached session sits behind a `std::sync::Mutex`. The lock is never
//! held across a bus publish, so a store's own reactions (which lock it
//! too) can run inside that publish without deadlocking.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use streamia_events::kind::{UserLogin, UserLogout, UserUpdated};
use streamia_events::{EventBus, LoginPayload, SubscriptionGuard, User};
use streamia_storage::{Storage, StorageError};

use crate::token::{self, Claims, Clock, SystemClock};
use crate::{Session, SessionConfig, SessionError, SessionState};

/// Shared by the store handle and its bus reactions. Reactions hold a
/// `Weak` so a dropped store is never kept alive by the bus.
struct Inner {
    name: String,
    session: Mutex<Session>,
    storage: Arc<dyn Storage>,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
}

/// A module's handle on the shared session.
///
/// ## Lifecycle
///
/// ```text
/// build() ──→ initialize() ──→ login() ──→ set_user()/set_token() ──→ logout()
///                 │              │  ▲                                   │
///                 │              ▼  │ user:login / user:updated         ▼
///                 │            [Authenticated] ◄──── bus ────► [Unauthenticated]
///                 └─ invalid/expired token: storage cleared
/// ```
///
/// Dropping the store disposes its bus reactions.
pub struct SessionStore {
    inner: Arc<Inner>,
    bus: Arc<EventBus>,
    _reactions: Vec<SubscriptionGuard>,
}

impl SessionStore {
    /// Starts building a store on `bus` and `storage`.
    pub fn builder(
        bus: Arc<EventBus>,
        storage: Arc<dyn Storage>,
    ) -> SessionStoreBuilder {
        SessionStoreBuilder {
            name: "session".to_string(),
            bus,
            storage,
            config: SessionConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Builds a store with the default config and the system clock.
    pub fn new(bus: Arc<EventBus>, storage: Arc<dyn Storage>) -> Self {
        Self::builder(bus, storage).build()
    }

    /// Re-reads durable storage and validates the stored token.
    ///
    /// An absent, malformed, or expired token clears both keys and yields
    /// an unauthenticated session, as does a token with no readable user
    /// record. Storage read failures also yield an unauthenticated session.
    /// Safe to call any number of times.
    pub fn initialize(&self) -> Session {
        self.inner.initialize()
    }

    /// Persists `user` and `token`, marks this store authenticated, and
    /// publishes `user:login` so every other store converges.
    ///
    /// Overwrites any existing session. Failures are logged and leave the
    /// session unchanged; see [`try_login`](Self::try_login).
    pub fn login(&self, user: User, token: impl Into<String>) {
        if let Err(e) = self.try_login(user, token) {
            tracing::error!(store = %self.inner.name, error = %e, "login failed, session unchanged");
        }
    }

    /// [`login`](Self::login), reporting storage failures.
    ///
    /// # Errors
    /// - [`SessionError::Storage`] if a write failed (nothing is published)
    /// - [`SessionError::Serialize`] if the user record can't be encoded
    pub fn try_login(
        &self,
        user: User,
        token: impl Into<String>,
    ) -> Result<(), SessionError> {
        let token = token.into();
        self.inner.persist(&user, &token)?;
        *self.inner.cache() = Session::new(user.clone(), token.clone());

        tracing::info!(store = %self.inner.name, user_id = %user.id, "logged in");
        self.bus.emit::<UserLogin>(LoginPayload { user, token });
        Ok(())
    }

    /// Clears the session everywhere and publishes `user:logout`.
    pub fn logout(&self) {
        if let Err(e) = self.try_logout() {
            tracing::warn!(store = %self.inner.name, error = %e, "logout could not clear storage");
        }
    }

    /// [`logout`](Self::logout), reporting storage failures.
    ///
    /// The cache is cleared and `user:logout` published even when storage
    /// fails; the error is returned afterwards.
    pub fn try_logout(&self) -> Result<(), SessionError> {
        *self.inner.cache() = Session::unauthenticated();
        let cleared = self.inner.clear_storage();

        tracing::info!(store = %self.inner.name, "logged out");
        self.bus.emit::<UserLogout>(());
        cleared.map_err(SessionError::from)
    }

    /// Replaces the user without touching the token (e.g. after a profile
    /// edit). `None` removes the user, which leaves the store
    /// unauthenticated until a user is set again.
    ///
    /// Ignored while no token is held. Doesn't publish; profile modules
    /// announce edits with `user:updated`.
    pub fn set_user(&self, user: Option<User>) {
        match user {
            Some(user) => self.inner.replace_user(&user),
            None => {
                self.inner.cache().user = None;
                if let Err(e) = self.inner.storage.remove(&self.inner.config.user_key) {
                    tracing::warn!(store = %self.inner.name, error = %e, "could not remove user record");
                }
                tracing::debug!(store = %self.inner.name, "user cleared");
            }
        }
    }

    /// Replaces the token. `None` clears the token *and* the user, in the
    /// cache and in storage, so no identity outlives its credential.
    pub fn set_token(&self, token: Option<String>) {
        match token {
            Some(token) => {
                if let Err(e) = self.inner.storage.set(&self.inner.config.token_key, &token) {
                    tracing::error!(store = %self.inner.name, error = %e, "could not store token, keeping previous");
                    return;
                }
                self.inner.cache().token = Some(token);
                tracing::debug!(store = %self.inner.name, "token replaced");
            }
            None => {
                *self.inner.cache() = Session::unauthenticated();
                self.inner.discard();
                tracing::info!(store = %self.inner.name, "token cleared");
            }
        }
    }

    /// A settled snapshot of the session.
    ///
    /// If the cached token has expired since it was adopted, the store
    /// transitions to unauthenticated (clearing storage) before returning.
    pub fn session(&self) -> Session {
        self.inner.settle()
    }

    /// The current state, settled as in [`session`](Self::session).
    pub fn state(&self) -> SessionState {
        self.session().state_at(self.inner.clock.now_secs())
    }

    /// Shorthand for `state() == Authenticated`.
    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// The current user, if any.
    pub fn user(&self) -> Option<User> {
        self.session().user
    }

    /// The current token, if any and still valid.
    pub fn token(&self) -> Option<String> {
        self.session().token
    }

    /// Decodes the current token's claims.
    ///
    /// # Errors
    /// - [`SessionError::NotAuthenticated`] if there is no token
    /// - [`SessionError::Token`] if it doesn't decode
    pub fn token_claims(&self) -> Result<Claims, SessionError> {
        let token = self.token().ok_or(SessionError::NotAuthenticated)?;
        Ok(token::decode_claims(&token)?)
    }

    /// The module name this store logs under.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The bus this store publishes to and listens on.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("name", &self.inner.name)
            .field("session", &*self.inner.cache())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and mounts a [`SessionStore`].
pub struct SessionStoreBuilder {
    name: String,
    bus: Arc<EventBus>,
    storage: Arc<dyn Storage>,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
}

impl SessionStoreBuilder {
    /// Names the owning module in log lines (e.g. `"shell"`, `"favorites"`).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the storage keys.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the clock used for expiry checks.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Subscribes the store's reactions and seeds it from storage.
    pub fn build(self) -> SessionStore {
        let inner = Arc::new(Inner {
            name: self.name,
            session: Mutex::new(Session::unauthenticated()),
            storage: self.storage,
            config: self.config,
            clock: self.clock,
        });

        let reactions = vec![
            {
                let weak = Arc::downgrade(&inner);
                self.bus
                    .on::<UserLogin, _>(move |payload| {
                        if let Some(inner) = Weak::upgrade(&weak) {
                            inner.adopt_login(payload);
                        }
                    })
                    .dispose_on_drop()
            },
            {
                let weak = Arc::downgrade(&inner);
                self.bus
                    .on::<UserLogout, _>(move |_| {
                        if let Some(inner) = Weak::upgrade(&weak) {
                            inner.adopt_logout();
                        }
                    })
                    .dispose_on_drop()
            },
            {
                let weak = Arc::downgrade(&inner);
                self.bus
                    .on::<UserUpdated, _>(move |payload| {
                        if let Some(inner) = Weak::upgrade(&weak) {
                            inner.replace_user(&payload.user);
                        }
                    })
                    .dispose_on_drop()
            },
        ];

        let session = inner.initialize();
        tracing::info!(
            store = %inner.name,
            state = %session.state_at(inner.clock.now_secs()),
            "session store mounted"
        );

        SessionStore {
            inner,
            bus: self.bus,
            _reactions: reactions,
        }
    }
}

// ---------------------------------------------------------------------------
// Inner
// ---------------------------------------------------------------------------

impl Inner {
    fn cache(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initialize(&self) -> Session {
        let session = self.load().unwrap_or_else(|e| {
            tracing::warn!(store = %self.name, error = %e, "could not restore session, starting unauthenticated");
            Session::unauthenticated()
        });
        *self.cache() = session.clone();
        session
    }

    /// Reads and validates the stored session, clearing storage when it
    /// doesn't hold a usable one.
    fn load(&self) -> Result<Session, SessionError> {
        let token = self.storage.get(&self.config.token_key)?;
        let record = self.storage.get(&self.config.user_key)?;

        let Some(token) = token else {
            if record.is_some() {
                tracing::debug!(store = %self.name, "user record without token, discarding");
            }
            self.discard();
            return Ok(Session::unauthenticated());
        };

        if let Err(reason) = token::validate_at(&token, self.clock.now_secs()) {
            tracing::info!(store = %self.name, %reason, "stored token rejected, clearing session");
            self.discard();
            return Ok(Session::unauthenticated());
        }

        let user = match record.as_deref().map(|r| serde_json::from_str::<User>(r)) {
            Some(Ok(user)) => user,
            Some(Err(e)) => {
                let error = SessionError::CorruptUser(e);
                tracing::warn!(store = %self.name, %error, "clearing session");
                self.discard();
                return Ok(Session::unauthenticated());
            }
            None => {
                tracing::info!(store = %self.name, "token without user record, clearing session");
                self.discard();
                return Ok(Session::unauthenticated());
            }
        };

        tracing::debug!(store = %self.name, user_id = %user.id, "session restored from storage");
        Ok(Session::new(user, token))
    }

    /// Writes the token and user record. If the user write fails, the
    /// previous token is put back so storage never pairs the new
    /// credential with an old identity.
    fn persist(&self, user: &User, token: &str) -> Result<(), SessionError> {
        let record = serde_json::to_string(user).map_err(SessionError::Serialize)?;
        let previous = self.storage.get(&self.config.token_key)?;

        self.storage.set(&self.config.token_key, token)?;
        if let Err(e) = self.storage.set(&self.config.user_key, &record) {
            let restored = match previous {
                Some(previous) => self.storage.set(&self.config.token_key, &previous),
                None => self.storage.remove(&self.config.token_key),
            };
            if let Err(restore) = restored {
                tracing::error!(store = %self.name, error = %restore, "could not restore previous token");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Removes both keys. Attempts both even if the first fails and
    /// reports the first failure.
    fn clear_storage(&self) -> Result<(), StorageError> {
        let token = self.storage.remove(&self.config.token_key);
        let user = self.storage.remove(&self.config.user_key);
        token.and(user)
    }

    /// [`clear_storage`](Self::clear_storage), logging instead of failing.
    fn discard(&self) {
        if let Err(e) = self.clear_storage() {
            tracing::warn!(store = %self.name, error = %e, "could not clear session storage");
        }
    }

    fn settle(&self) -> Session {
        let now = self.clock.now_secs();
        let mut session = self.cache();

        let Some(token) = session.token.clone() else {
            if session.user.take().is_some() {
                tracing::debug!(store = %self.name, "user without token, clearing");
            }
            return session.clone();
        };
        let Err(reason) = token::validate_at(&token, now) else {
            return session.clone();
        };

        *session = Session::unauthenticated();
        drop(session);
        tracing::info!(store = %self.name, %reason, "session token no longer valid, clearing");
        self.discard();
        Session::unauthenticated()
    }

    fn adopt_login(&self, payload: &LoginPayload) {
        {
            let mut session = self.cache();
            let unchanged = session.user.as_ref() == Some(&payload.user)
                && session.token.as_deref() == Some(payload.token.as_str());
            if unchanged {
                return;
            }
            *session = Session::new(payload.user.clone(), payload.token.clone());
        }

        tracing::info!(store = %self.name, user_id = %payload.user.id, "adopted login from bus");
        if let Err(e) = self.persist(&payload.user, &payload.token) {
            tracing::warn!(store = %self.name, error = %e, "could not persist adopted login");
        }
    }

    fn adopt_logout(&self) {
        let previous = std::mem::take(&mut *self.cache());
        if previous == Session::unauthenticated() {
            return;
        }
        tracing::info!(store = %self.name, "adopted logout from bus");
        self.discard();
    }

    /// Shared by `set_user(Some(..))` and the `user:updated` reaction.
    /// Ignored while no token is held, so neither the cache nor storage
    /// ever carries an identity without a credential.
    fn replace_user(&self, user: &User) {
        {
            let mut session = self.cache();
            if session.token.is_none() {
                drop(session);
                tracing::debug!(store = %self.name, user_id = %user.id, "no token held, ignoring user update");
                return;
            }
            session.user = Some(user.clone());
        }
        tracing::debug!(store = %self.name, user_id = %user.id, "user replaced");

        let written = serde_json::to_string(user)
            .map_err(SessionError::Serialize)
            .and_then(|record| {
                self.storage
                    .set(&self.config.user_key, &record)
                    .map_err(SessionError::from)
            });
        if let Err(e) = written {
            tracing::warn!(store = %self.name, error = %e, "could not persist updated user");
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
