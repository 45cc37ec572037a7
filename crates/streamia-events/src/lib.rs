//! Cross-module events for Streamia.
//!
//! This crate defines the "language" that independently loaded
//! micro-frontends use to talk to each other, and the bus that carries it:
//!
//! - **Vocabulary** ([`EventName`], [`Event`], payload records) — the
//!   closed set of event names and the typed payload each one carries.
//! - **Kinds** ([`kind`] module, [`EventKind`] trait) — marker types that
//!   bind a name to its payload at compile time.
//! - **Bus** ([`EventBus`], [`Subscription`]) — synchronous
//!   publish/subscribe shared by every module in the process.
//! - **Errors** ([`EventError`]) — conversions from untyped wire data.
//!
//! # Architecture
//!
//! ```text
//! auth / catalog / favorites / profile modules
//!        │ publish            ▲ subscribe
//!        ▼                    │
//!   EventBus (this crate) ────┘
//!        ▲
//!        │ user:login / user:logout / user:updated
//! Session layer (streamia-session)
//! ```

mod bus;
mod error;
pub mod kind;
mod types;

pub use bus::{EventBus, Subscription, SubscriptionGuard, SubscriptionId};
pub use error::EventError;
pub use kind::EventKind;
pub use types::{
    CommentDeletedPayload, CommentPayload, ErrorPayload, Event, EventName,
    FavoritePayload, LoadingPayload, LoginPayload, MoviePayload,
    MoviePlayPayload, MovieRatedPayload, RouteChangePayload, User,
    UserDeletedPayload, UserUpdatedPayload,
};
