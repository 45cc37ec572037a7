//! Session types: who is logged in, with what credential.
//!
//! A "session" is the front end's view of the current identity. It tracks:
//! - WHO the user is (`User`, display data)
//! - HOW they prove it (the bearer token)
//! - WHETHER that proof still holds (derived, never stored)

use std::fmt;

use serde::{Deserialize, Serialize};
use streamia_events::User;

use crate::token;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Where the session lives in durable storage.
///
/// The defaults are the `localStorage` keys the JavaScript modules use, so
/// a store pointed at the same storage interoperates with them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Key holding the raw bearer token.
    pub token_key: String,

    /// Key holding the JSON-serialized [`User`] record.
    pub user_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_key: "authToken".to_string(),
            user_key: "user".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The two states of a session store.
///
/// ```text
///                 login() / user:login
///   Unauthenticated ───────────────────→ Authenticated ──┐ setUser / user:updated
///         ↑                                   │  ↑───────┘
///         └── logout() / user:logout / token expires on read
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "Unauthenticated"),
            Self::Authenticated => write!(f, "Authenticated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A snapshot of the current identity and credential.
///
/// Authentication is never stored as a flag. It's derived every time from
/// the token (structure + expiry) and the presence of a user, so it can't
/// drift out of sync with the credential.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// The logged-in user, if any.
    pub user: Option<User>,

    /// The bearer token, if any.
    pub token: Option<String>,
}

impl Session {
    /// A session with neither user nor token.
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// A session carrying `user` and `token`.
    pub fn new(user: User, token: impl Into<String>) -> Self {
        Self {
            user: Some(user),
            token: Some(token.into()),
        }
    }

    /// `true` iff a user is present and the token is valid at `now`.
    pub fn is_authenticated_at(&self, now: i64) -> bool {
        self.user.is_some()
            && self
                .token
                .as_deref()
                .is_some_and(|t| token::validate_at(t, now).is_ok())
    }

    /// [`is_authenticated_at`](Self::is_authenticated_at) using the
    /// system clock.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.as_deref().is_some_and(token::is_valid)
    }

    /// The state this snapshot corresponds to at `now`.
    pub fn state_at(&self, now: i64) -> SessionState {
        if self.is_authenticated_at(now) {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }
}

// Hand-written so the token stays out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn user() -> User {
        User {
            id: "u1".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            age: 36,
        }
    }

    #[test]
    fn test_session_config_default_uses_browser_keys() {
        let config = SessionConfig::default();
        assert_eq!(config.token_key, "authToken");
        assert_eq!(config.user_key, "user");
    }

    #[test]
    fn test_session_config_partial_json_fills_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "token_key": "jwt" }"#).unwrap();
        assert_eq!(config.token_key, "jwt");
        assert_eq!(config.user_key, "user");
    }

    #[test]
    fn test_unauthenticated_session_is_not_authenticated() {
        let session = Session::unauthenticated();
        assert!(!session.is_authenticated_at(NOW));
        assert_eq!(session.state_at(NOW), SessionState::Unauthenticated);
    }

    #[test]
    fn test_valid_token_and_user_is_authenticated() {
        let token = token::encode_unsigned(&json!({ "exp": NOW + 10 }));
        let session = Session::new(user(), token);
        assert!(session.is_authenticated_at(NOW));
        assert_eq!(session.state_at(NOW), SessionState::Authenticated);
    }

    #[test]
    fn test_expired_token_is_not_authenticated() {
        let token = token::encode_unsigned(&json!({ "exp": NOW }));
        let session = Session::new(user(), token);
        assert!(!session.is_authenticated_at(NOW));
    }

    #[test]
    fn test_token_without_user_is_not_authenticated() {
        let session = Session {
            user: None,
            token: Some(token::encode_unsigned(&json!({}))),
        };
        assert!(!session.is_authenticated_at(NOW));
    }

    #[test]
    fn test_user_with_malformed_token_is_not_authenticated() {
        let session = Session::new(user(), "not-a-jwt");
        assert!(!session.is_authenticated_at(NOW));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_session_debug_masks_token() {
        let session = Session::new(user(), "secret-token-value");
        let debug = format!("{session:?}");
        assert!(debug.contains("***"));
        assert!(!debug.contains("secret-token-value"));
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::Authenticated.to_string(), "Authenticated");
        assert_eq!(SessionState::Unauthenticated.to_string(), "Unauthenticated");
    }
}
