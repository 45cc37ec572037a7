//! Unified error type for Streamia.

use streamia_events::EventError;
use streamia_favorites::FavoritesError;
use streamia_session::{SessionError, TokenError};
use streamia_storage::StorageError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `streamia` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate; `?`
/// converts them through the `#[from]` impls.
#[derive(Debug, thiserror::Error)]
pub enum StreamiaError {
    /// An event name or payload couldn't be decoded.
    #[error(transparent)]
    Event(#[from] EventError),

    /// Durable storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A session operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A bearer token failed inspection.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// A favorites operation failed.
    #[error(transparent)]
    Favorites(#[from] FavoritesError),

    /// The log filter directive is invalid.
    #[error("invalid log filter: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),
}
