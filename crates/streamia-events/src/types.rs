//! The event vocabulary and the payload records carried by each event.
//!
//! Every micro-frontend speaks this vocabulary. The names are the wire
//! strings the JavaScript modules use (`"user:login"`, `"favorite:added"`,
//! ...), and the payloads are the JSON shapes they exchange, so field
//! names serialize as camelCase.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::EventError;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An authenticated identity, as returned by the login/register API and
/// carried by the `user:*` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub age: u32,
}

impl User {
    /// "First Last", for navigation bars and greetings.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ---------------------------------------------------------------------------
// EventName
// ---------------------------------------------------------------------------

/// The closed set of event names shared by all micro-frontends.
///
/// `Hash + Eq` so the bus can key its registry by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "user:login")]
    UserLogin,
    #[serde(rename = "user:logout")]
    UserLogout,
    #[serde(rename = "user:updated")]
    UserUpdated,
    #[serde(rename = "user:deleted")]
    UserDeleted,
    #[serde(rename = "route:change")]
    RouteChange,
    #[serde(rename = "movie:selected")]
    MovieSelected,
    #[serde(rename = "movie:play")]
    MoviePlay,
    #[serde(rename = "movie:rated")]
    MovieRated,
    #[serde(rename = "favorite:added")]
    FavoriteAdded,
    #[serde(rename = "favorite:removed")]
    FavoriteRemoved,
    #[serde(rename = "comment:created")]
    CommentCreated,
    #[serde(rename = "comment:added")]
    CommentAdded,
    #[serde(rename = "comment:deleted")]
    CommentDeleted,
    #[serde(rename = "loading:start")]
    LoadingStart,
    #[serde(rename = "loading:end")]
    LoadingEnd,
    #[serde(rename = "error:occurred")]
    ErrorOccurred,
}

impl EventName {
    /// Every name in the vocabulary.
    pub const ALL: [EventName; 16] = [
        Self::UserLogin,
        Self::UserLogout,
        Self::UserUpdated,
        Self::UserDeleted,
        Self::RouteChange,
        Self::MovieSelected,
        Self::MoviePlay,
        Self::MovieRated,
        Self::FavoriteAdded,
        Self::FavoriteRemoved,
        Self::CommentCreated,
        Self::CommentAdded,
        Self::CommentDeleted,
        Self::LoadingStart,
        Self::LoadingEnd,
        Self::ErrorOccurred,
    ];

    /// The wire string for this name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserLogin => "user:login",
            Self::UserLogout => "user:logout",
            Self::UserUpdated => "user:updated",
            Self::UserDeleted => "user:deleted",
            Self::RouteChange => "route:change",
            Self::MovieSelected => "movie:selected",
            Self::MoviePlay => "movie:play",
            Self::MovieRated => "movie:rated",
            Self::FavoriteAdded => "favorite:added",
            Self::FavoriteRemoved => "favorite:removed",
            Self::CommentCreated => "comment:created",
            Self::CommentAdded => "comment:added",
            Self::CommentDeleted => "comment:deleted",
            Self::LoadingStart => "loading:start",
            Self::LoadingEnd => "loading:end",
            Self::ErrorOccurred => "error:occurred",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| EventError::UnknownEvent(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// `user:login` — a successful login or registration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPayload {
    pub user: User,
    pub token: String,
}

// Hand-written so the bearer token never reaches a log line.
impl fmt::Debug for LoginPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginPayload")
            .field("user", &self.user)
            .field("token", &"***")
            .finish()
    }
}

/// `user:updated` — profile edits that keep the same credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdatedPayload {
    pub user: User,
}

/// `user:deleted` — the account is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeletedPayload {
    pub user_id: String,
}

/// `route:change`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteChangePayload {
    pub path: String,
}

/// `movie:selected`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoviePayload {
    pub movie_id: String,
}

/// `movie:play`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoviePlayPayload {
    pub movie_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

/// `movie:rated` — `rating` is on the 1–5 star scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRatedPayload {
    pub movie_id: String,
    pub rating: u8,
}

/// `favorite:added` and `favorite:removed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritePayload {
    pub movie_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// RFC 3339 timestamp set by the publisher, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl FavoritePayload {
    /// A payload carrying only the movie id, the most common shape.
    pub fn movie(movie_id: impl Into<String>) -> Self {
        Self {
            movie_id: movie_id.into(),
            title: None,
            timestamp: None,
        }
    }
}

/// `comment:created` and `comment:added`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    pub movie_id: String,
    pub comment_id: String,
    pub text: String,
}

/// `comment:deleted`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDeletedPayload {
    pub movie_id: String,
    pub comment_id: String,
}

/// `loading:start` and `loading:end`. `source` names the module that is busy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingPayload {
    pub source: String,
}

/// `error:occurred`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub source: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A named event together with its payload.
///
/// Adjacently tagged, so the JSON form matches what the JavaScript bus
/// would see: `{ "name": "favorite:added", "payload": { "movieId": "m1" } }`.
/// `user:logout` has no payload and serializes as `{ "name": "user:logout" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum Event {
    #[serde(rename = "user:login")]
    UserLogin(LoginPayload),
    #[serde(rename = "user:logout")]
    UserLogout,
    #[serde(rename = "user:updated")]
    UserUpdated(UserUpdatedPayload),
    #[serde(rename = "user:deleted")]
    UserDeleted(UserDeletedPayload),
    #[serde(rename = "route:change")]
    RouteChange(RouteChangePayload),
    #[serde(rename = "movie:selected")]
    MovieSelected(MoviePayload),
    #[serde(rename = "movie:play")]
    MoviePlay(MoviePlayPayload),
    #[serde(rename = "movie:rated")]
    MovieRated(MovieRatedPayload),
    #[serde(rename = "favorite:added")]
    FavoriteAdded(FavoritePayload),
    #[serde(rename = "favorite:removed")]
    FavoriteRemoved(FavoritePayload),
    #[serde(rename = "comment:created")]
    CommentCreated(CommentPayload),
    #[serde(rename = "comment:added")]
    CommentAdded(CommentPayload),
    #[serde(rename = "comment:deleted")]
    CommentDeleted(CommentDeletedPayload),
    #[serde(rename = "loading:start")]
    LoadingStart(LoadingPayload),
    #[serde(rename = "loading:end")]
    LoadingEnd(LoadingPayload),
    #[serde(rename = "error:occurred")]
    ErrorOccurred(ErrorPayload),
}

impl Event {
    /// The name this event is published under.
    pub fn name(&self) -> EventName {
        match self {
            Self::UserLogin(_) => EventName::UserLogin,
            Self::UserLogout => EventName::UserLogout,
            Self::UserUpdated(_) => EventName::UserUpdated,
            Self::UserDeleted(_) => EventName::UserDeleted,
            Self::RouteChange(_) => EventName::RouteChange,
            Self::MovieSelected(_) => EventName::MovieSelected,
            Self::MoviePlay(_) => EventName::MoviePlay,
            Self::MovieRated(_) => EventName::MovieRated,
            Self::FavoriteAdded(_) => EventName::FavoriteAdded,
            Self::FavoriteRemoved(_) => EventName::FavoriteRemoved,
            Self::CommentCreated(_) => EventName::CommentCreated,
            Self::CommentAdded(_) => EventName::CommentAdded,
            Self::CommentDeleted(_) => EventName::CommentDeleted,
            Self::LoadingStart(_) => EventName::LoadingStart,
            Self::LoadingEnd(_) => EventName::LoadingEnd,
            Self::ErrorOccurred(_) => EventName::ErrorOccurred,
        }
    }

    /// Builds an event from a wire name and a loosely-typed JSON payload,
    /// as a bridge to modules that still publish untyped data.
    ///
    /// # Errors
    /// - [`EventError::UnknownEvent`] if `name` is outside the vocabulary
    /// - [`EventError::InvalidPayload`] if `payload` doesn't fit the name
    pub fn from_json(
        name: &str,
        payload: serde_json::Value,
    ) -> Result<Self, EventError> {
        let name: EventName = name.parse()?;
        let mut envelope = serde_json::Map::new();
        envelope.insert("name".into(), serde_json::Value::from(name.as_str()));
        if !payload.is_null() {
            envelope.insert("payload".into(), payload);
        }
        serde_json::from_value(serde_json::Value::Object(envelope))
            .map_err(|source| EventError::InvalidPayload { name, source })
    }
}

// =========================================================================
// Tests
// =========================================================================
