//! Error types for the favorites layer.

/// Errors that can occur while loading or changing favorites.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FavoritesError {
    /// There is no valid session token to present.
    #[error("sign in to manage favorites")]
    Unauthenticated,

    /// A change to this movie hasn't settled yet.
    #[error("a change to movie {0} is already in flight")]
    InFlight(String),

    /// The API answered with an error status.
    #[error("favorites API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The API couldn't be reached.
    #[error("favorites API unreachable: {0}")]
    Network(String),
}

impl FavoritesError {
    /// `true` if the server rejected the credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }
}
