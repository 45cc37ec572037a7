//! Shared session state for Streamia's micro-frontends.
//!
//! This crate answers "who is logged in?" consistently across modules that
//! were loaded independently:
//!
//! 1. **Token inspection** ([`token`] module): decoding the bearer token's
//!    claims and checking expiry, without verifying signatures
//! 2. **Session snapshots** ([`Session`], [`SessionState`]): identity plus
//!    credential, with authentication always derived, never stored
//! 3. **Session stores** ([`SessionStore`]): one per module, kept in step
//!    through durable storage and the event bus
//!
//! # How it fits in the stack
//!
//! ```text
//! Favorites / shell / demo modules (above)  ← read the session, gate calls
//!     ↕
//! Session Layer (this crate)  ← owns login/logout and cross-module convergence
//!     ↕                 ↕
//! streamia-events    streamia-storage  ← the bus and the durable KV store
//! ```

mod error;
mod session;
mod store;
pub mod token;

pub use error::SessionError;
pub use session::{Session, SessionConfig, SessionState};
pub use store::{SessionStore, SessionStoreBuilder};
pub use streamia_events::User;
pub use token::{Claims, Clock, ManualClock, SystemClock, TokenError};
