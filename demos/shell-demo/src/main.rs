use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use streamia::favorites::{FAVORITES_PATH, MemoryFavoritesApi};
use streamia::prelude::*;
use streamia::events::{MoviePayload, UserUpdatedPayload};
use streamia::session::{Clock, SystemClock, token};

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

// Stand-ins for the shell's micro-frontends. Each holds only what a
// separately bundled module would: its own session store and whatever it
// subscribed to.

/// Signs users in.
struct AuthModule {
    session: Arc<SessionStore>,
}

impl AuthModule {
    /// Logs in with the token a successful `POST /auth/login` would return.
    fn sign_in(&self, user: User, ttl_secs: i64) {
        let exp = SystemClock.now_secs() + ttl_secs;
        let token = token::encode_unsigned(&json!({ "sub": user.id, "exp": exp }));
        self.session.login(user, token);
    }
}

/// The movie grid: toggles favorites and reacts to selections.
struct CatalogModule {
    favorites: FavoritesStore<MemoryFavoritesApi>,
    _selections: SubscriptionGuard,
}

/// Edits the signed-in user's profile.
struct ProfileModule {
    session: Arc<SessionStore>,
}

impl ProfileModule {
    fn rename(&self, first_name: &str) {
        let Some(mut user) = self.session.user() else {
            tracing::warn!("no user to rename");
            return;
        };
        user.first_name = first_name.to_string();
        self.session.set_user(Some(user.clone()));
        self.session
            .bus()
            .emit::<kind::UserUpdated>(UserUpdatedPayload { user });
    }
}

fn demo_user() -> User {
    User {
        id: "u-1001".into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: "ada@streamia.dev".into(),
        age: 36,
    }
}

fn report(label: &str, session: &SessionStore) {
    let state = session.state().to_string();
    let name = session
        .user()
        .map(|u| u.display_name())
        .unwrap_or_else(|| "-".into());
    println!("  {label:<10} {state:<16} {name}");
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), StreamiaError> {
    let config = ShellConfig::from_env();
    streamia::logging::init(&config.log_filter)?;

    let shell = Shell::builder().config(config).build()?;
    // In-process stand-in for the backend at this endpoint.
    let endpoint = shell.config().endpoint(FAVORITES_PATH);
    tracing::info!(%endpoint, "favorites api");
    let api = Arc::new(MemoryFavoritesApi::with_latency(Duration::from_millis(50)));

    let auth = AuthModule {
        session: shell.mount("auth"),
    };
    let catalog = CatalogModule {
        favorites: FavoritesStore::new(shell.mount("catalog"), Arc::clone(&api)),
        _selections: shell
            .bus()
            .on::<kind::MovieSelected, _>(|payload| {
                tracing::info!(movie_id = %payload.movie_id, "movie selected");
            })
            .dispose_on_drop(),
    };
    let favorites = FavoritesStore::new(shell.mount("favorites"), Arc::clone(&api));
    let profile = ProfileModule {
        session: shell.mount("profile"),
    };

    println!("mounted: {}", shell.mounted().join(", "));
    println!("\nbefore sign-in:");
    report("auth", &auth.session);
    report("profile", &profile.session);

    if let Err(e) = catalog.favorites.toggle("m-42").await {
        println!("  toggle while signed out: {e}");
    }

    auth.sign_in(demo_user(), 3600);
    println!("\nafter sign-in on the auth module:");
    report("auth", &auth.session);
    report("profile", &profile.session);

    shell.navigate("/catalog");
    shell.bus().emit::<kind::MovieSelected>(MoviePayload {
        movie_id: "m-42".into(),
    });

    let now_favorite = catalog.favorites.toggle("m-42").await?;
    println!("\ncatalog toggled m-42 -> favorite: {now_favorite}");
    println!("  favorites module sees: {:?}", favorites.ids());

    api.set_failing(true);
    let failed = catalog.favorites.toggle("m-7").await;
    api.set_failing(false);
    println!(
        "  failing toggle of m-7: {:?}, state {}, cached: {:?}",
        failed.err(),
        catalog.favorites.mutation_state(),
        catalog.favorites.ids()
    );

    profile.rename("Augusta");
    println!("\nafter profile edit:");
    report("auth", &auth.session);

    profile.session.logout();
    println!("\nafter sign-out from the profile module:");
    report("auth", &auth.session);
    report("profile", &profile.session);
    println!("  favorites module sees: {:?}", favorites.ids());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> Shell {
        Shell::builder().build().unwrap()
    }

    #[test]
    fn test_sign_in_reaches_profile_module() {
        let shell = shell();
        let auth = AuthModule {
            session: shell.mount("auth"),
        };
        let profile = ProfileModule {
            session: shell.mount("profile"),
        };

        auth.sign_in(demo_user(), 60);

        assert_eq!(profile.session.user(), Some(demo_user()));
    }

    #[test]
    fn test_rename_propagates_through_user_updated() {
        let shell = shell();
        let auth = AuthModule {
            session: shell.mount("auth"),
        };
        let profile = ProfileModule {
            session: shell.mount("profile"),
        };
        auth.sign_in(demo_user(), 60);

        profile.rename("Augusta");

        let renamed = auth.session.user().unwrap();
        assert_eq!(renamed.display_name(), "Augusta Lovelace");
        assert!(auth.session.is_authenticated());
    }

    #[test]
    fn test_rename_without_user_is_noop() {
        let shell = shell();
        let profile = ProfileModule {
            session: shell.mount("profile"),
        };

        profile.rename("Nobody");

        assert_eq!(profile.session.user(), None);
    }
}
