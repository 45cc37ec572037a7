//! Error types for the session layer.

use streamia_storage::StorageError;

use crate::TokenError;

/// Errors that can occur while reading or mutating a session.
///
/// The default [`SessionStore`](crate::SessionStore) mutators log these
/// and carry on; only the `try_*` variants hand them to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token failed structural or expiry checks.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Durable storage refused a read or write.
    #[error("session storage failed: {0}")]
    Storage(#[from] StorageError),

    /// The user record couldn't be serialized for storage.
    #[error("user record could not be serialized: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The stored user record isn't valid JSON for a `User`.
    #[error("stored user record is corrupt: {0}")]
    CorruptUser(#[source] serde_json::Error),

    /// The operation needs a token and there is none.
    #[error("no session token")]
    NotAuthenticated,
}
