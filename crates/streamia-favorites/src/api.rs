//! The network seam for favorites.
//!
//! The store never talks HTTP itself. It calls a [`FavoritesApi`], which
//! production code implements against `GET/POST/DELETE /favorites` and
//! tests implement in memory.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::FavoritesError;

/// A favorited movie as the API reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub movie_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Favorite {
    /// A favorite known only by its movie id.
    pub fn new(movie_id: impl Into<String>) -> Self {
        Self {
            movie_id: movie_id.into(),
            title: String::new(),
            poster: None,
            note: None,
        }
    }

    /// Sets the display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Collection path of the favorites resource, relative to the API base
/// URL. Single favorites live at `{FAVORITES_PATH}/{movie_id}`.
pub const FAVORITES_PATH: &str = "/favorites";

/// Server-side favorites, addressed with the caller's bearer token.
///
/// HTTP clients resolve [`FAVORITES_PATH`] against the shell's API base
/// URL (`ShellConfig::endpoint`).
///
/// # Trait bounds
///
/// `Send + Sync + 'static` so one client can be shared by every task of
/// the favorites module.
pub trait FavoritesApi: Send + Sync + 'static {
    /// Lists the user's favorites.
    fn list(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Vec<Favorite>, FavoritesError>> + Send;

    /// Adds a favorite. Adding one that exists is not an error.
    fn add(
        &self,
        token: &str,
        favorite: &Favorite,
    ) -> impl Future<Output = Result<(), FavoritesError>> + Send;

    /// Removes a favorite. Removing one that doesn't exist is not an error.
    fn remove(
        &self,
        token: &str,
        movie_id: &str,
    ) -> impl Future<Output = Result<(), FavoritesError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryFavoritesApi
// ---------------------------------------------------------------------------

/// An in-process stand-in for the favorites backend.
///
/// Serves a single user, accepts any token, and can be told to fail or
/// to answer slowly.
#[derive(Debug, Default)]
pub struct MemoryFavoritesApi {
    favorites: Mutex<BTreeMap<String, Favorite>>,
    failing: AtomicBool,
    unauthorized: AtomicBool,
    latency: Duration,
    calls: AtomicUsize,
}

impl MemoryFavoritesApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every answer by `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Seeds the server side with `favorites`.
    pub fn seed(&self, favorites: impl IntoIterator<Item = Favorite>) {
        let mut stored = self.lock();
        for favorite in favorites {
            stored.insert(favorite.movie_id.clone(), favorite);
        }
    }

    /// While on, every call fails with a 503.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    /// While on, every call fails with a 401.
    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.unauthorized.store(unauthorized, Ordering::Release);
    }

    /// Movie ids currently stored server-side.
    pub fn stored_ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }

    async fn answer(&self) -> Result<(), FavoritesError> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.unauthorized.load(Ordering::Acquire) {
            return Err(FavoritesError::Api {
                status: 401,
                message: "invalid token".into(),
            });
        }
        if self.failing.load(Ordering::Acquire) {
            return Err(FavoritesError::Api {
                status: 503,
                message: "service unavailable".into(),
            });
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Favorite>> {
        self.favorites.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FavoritesApi for MemoryFavoritesApi {
    async fn list(&self, _token: &str) -> Result<Vec<Favorite>, FavoritesError> {
        self.answer().await?;
        Ok(self.lock().values().cloned().collect())
    }

    async fn add(&self, _token: &str, favorite: &Favorite) -> Result<(), FavoritesError> {
        self.answer().await?;
        self.lock()
            .insert(favorite.movie_id.clone(), favorite.clone());
        Ok(())
    }

    async fn remove(&self, _token: &str, movie_id: &str) -> Result<(), FavoritesError> {
        self.answer().await?;
        self.lock().remove(movie_id);
        Ok(())
    }
}
