//! Compile-time typing for event payloads.
//!
//! Each event name gets a zero-sized marker type implementing [`EventKind`].
//! The marker ties the name to exactly one payload type, so
//! `bus.emit::<FavoriteAdded>(payload)` only compiles when `payload` is a
//! [`FavoritePayload`], and `bus.on::<UserLogin>(|p| ...)` hands the
//! callback a `&LoginPayload` instead of an untyped value.

use crate::types::*;

/// Binds an [`EventName`] to its payload type.
pub trait EventKind: 'static {
    /// The name events of this kind are published under.
    const NAME: EventName;

    /// The payload carried by this kind of event.
    type Payload: Clone + Send + Sync + 'static;

    /// Wraps a payload into the tagged [`Event`] union.
    fn into_event(payload: Self::Payload) -> Event;

    /// Borrows the payload out of an event, or `None` if the event is of a
    /// different kind.
    fn payload(event: &Event) -> Option<&Self::Payload>;
}

macro_rules! event_kinds {
    ($($(#[$doc:meta])* $kind:ident => $variant:ident($payload:ty);)*) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct $kind;

            impl EventKind for $kind {
                const NAME: EventName = EventName::$variant;
                type Payload = $payload;

                fn into_event(payload: $payload) -> Event {
                    Event::$variant(payload)
                }

                fn payload(event: &Event) -> Option<&$payload> {
                    match event {
                        Event::$variant(payload) => Some(payload),
                        _ => None,
                    }
                }
            }
        )*
    };
}

event_kinds! {
    /// `user:login`
    UserLogin => UserLogin(LoginPayload);
    /// `user:updated`
    UserUpdated => UserUpdated(UserUpdatedPayload);
    /// `user:deleted`
    UserDeleted => UserDeleted(UserDeletedPayload);
    /// `route:change`
    RouteChange => RouteChange(RouteChangePayload);
    /// `movie:selected`
    MovieSelected => MovieSelected(MoviePayload);
    /// `movie:play`
    MoviePlay => MoviePlay(MoviePlayPayload);
    /// `movie:rated`
    MovieRated => MovieRated(MovieRatedPayload);
    /// `favorite:added`
    FavoriteAdded => FavoriteAdded(FavoritePayload);
    /// `favorite:removed`
    FavoriteRemoved => FavoriteRemoved(FavoritePayload);
    /// `comment:created`
    CommentCreated => CommentCreated(CommentPayload);
    /// `comment:added`
    CommentAdded => CommentAdded(CommentPayload);
    /// `comment:deleted`
    CommentDeleted => CommentDeleted(CommentDeletedPayload);
    /// `loading:start`
    LoadingStart => LoadingStart(LoadingPayload);
    /// `loading:end`
    LoadingEnd => LoadingEnd(LoadingPayload);
    /// `error:occurred`
    ErrorOccurred => ErrorOccurred(ErrorPayload);
}

/// `user:logout`. Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserLogout;

impl EventKind for UserLogout {
    const NAME: EventName = EventName::UserLogout;
    type Payload = ();

    fn into_event(_: ()) -> Event {
        Event::UserLogout
    }

    fn payload(event: &Event) -> Option<&()> {
        match event {
            Event::UserLogout => Some(&()),
            _ => None,
        }
    }
}
