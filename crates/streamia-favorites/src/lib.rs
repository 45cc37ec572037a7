//! Favorites for Streamia's catalog and favorites modules.
//!
//! Each module keeps its own [`FavoritesStore`]; the stores converge
//! through `favorite:added` / `favorite:removed` on the event bus.
//!
//! # Key types
//!
//! - [`FavoritesApi`] — the network seam (with [`MemoryFavoritesApi`] for
//!   tests and demos)
//! - [`FavoritesStore`] — the optimistic cache
//! - [`Mutation`] / [`MutationState`] — the speculative-change state machine
//! - [`FavoritesError`]

#![allow(async_fn_in_trait)]

mod api;
mod error;
mod mutation;
mod store;

pub use api::{FAVORITES_PATH, Favorite, FavoritesApi, MemoryFavoritesApi};
pub use error::FavoritesError;
pub use mutation::{Mutation, MutationKind, MutationState};
pub use store::FavoritesStore;
