//! Optimistic mutation tracking.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MutationState
// ---------------------------------------------------------------------------

/// The lifecycle of a speculative change.
///
/// ```text
///            begin            API ok
/// Idle ──────────→ Pending ──────────→ Committed ─┐
///                   │  ▲                          │
///                   │  └──────── begin ───────────┤
///                   │ API error                   │
///                   ▼                             │
///               RolledBack ─────── begin ─────────┘
/// ```
///
/// - **Idle**: nothing has been attempted yet.
/// - **Pending**: the tentative state is applied locally and the request
///   is in flight.
/// - **Committed**: the server accepted the change.
/// - **RolledBack**: the server refused it and the inverse was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationState {
    Idle,
    Pending,
    Committed,
    RolledBack,
}

impl MutationState {
    /// Returns `true` once the server has answered.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    /// Returns `true` if moving to `target` is a valid transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Idle | Self::Committed | Self::RolledBack, Self::Pending)
                | (Self::Pending, Self::Committed | Self::RolledBack)
        )
    }
}

impl std::fmt::Display for MutationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Pending => write!(f, "Pending"),
            Self::Committed => write!(f, "Committed"),
            Self::RolledBack => write!(f, "RolledBack"),
        }
    }
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// Which way a favorite is being changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    Add,
    Remove,
}

impl MutationKind {
    /// The compensating change applied on rollback.
    pub fn inverse(self) -> Self {
        match self {
            Self::Add => Self::Remove,
            Self::Remove => Self::Add,
        }
    }
}

/// One optimistic change to one movie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    movie_id: String,
    kind: MutationKind,
    state: MutationState,
}

impl Mutation {
    /// Starts a mutation in the `Pending` state.
    pub(crate) fn begin(movie_id: impl Into<String>, kind: MutationKind) -> Self {
        Self {
            movie_id: movie_id.into(),
            kind,
            state: MutationState::Pending,
        }
    }

    pub fn movie_id(&self) -> &str {
        &self.movie_id
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    /// Moves to `target` if the transition is valid. Returns whether it
    /// moved.
    pub(crate) fn transition(&mut self, target: MutationState) -> bool {
        if !self.state.can_transition_to(target) {
            tracing::warn!(
                movie_id = %self.movie_id,
                from = %self.state,
                to = %target,
                "invalid mutation transition"
            );
            return false;
        }
        self.state = target;
        true
    }
}
