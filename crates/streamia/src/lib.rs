//! # Streamia
//!
//! Cross-module coordination for micro-frontend shells.
//!
//! Independently loaded modules (auth, catalog, favorites, profile, ...)
//! share two things through this crate: an event bus carrying a closed,
//! typed vocabulary, and a session that every module sees the same way,
//! kept consistent through durable storage and `user:*` events.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use streamia::prelude::*;
//!
//! # fn main() -> Result<(), StreamiaError> {
//! let config = ShellConfig::from_env();
//! streamia::logging::init(&config.log_filter)?;
//!
//! let shell = Shell::builder().config(config).build()?;
//! let auth = shell.mount("auth");
//! let catalog = shell.mount("catalog");
//!
//! // auth.login(user, token) -> catalog.is_authenticated() == true
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod logging;
mod shell;

pub use config::{API_URL_VAR, LOG_VAR, STORAGE_DIR_VAR, ShellConfig};
pub use error::StreamiaError;
pub use shell::{Shell, ShellBuilder};

pub use streamia_events as events;
pub use streamia_favorites as favorites;
pub use streamia_session as session;
pub use streamia_storage as storage;

pub mod prelude {
    //! The types most modules need, in one import.

    pub use crate::{Shell, ShellBuilder, ShellConfig, StreamiaError};
    pub use streamia_events::kind::{self, EventKind};
    pub use streamia_events::{
        Event, EventBus, EventName, FavoritePayload, LoginPayload, Subscription,
        SubscriptionGuard, User,
    };
    pub use streamia_favorites::{
        Favorite, FavoritesApi, FavoritesError, FavoritesStore, MutationState,
    };
    pub use streamia_session::{Session, SessionState, SessionStore};
    pub use streamia_storage::{MemoryStorage, Storage};
}
