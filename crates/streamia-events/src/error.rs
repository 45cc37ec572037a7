//! Error types for the event layer.
//!
//! The bus itself never fails its callers. The only fallible operations
//! in this crate are the conversions between wire strings / JSON and the
//! typed vocabulary.

/// Errors that can occur when converting to or from the event vocabulary.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The string is not one of the names in the closed vocabulary.
    ///
    /// Unknown names are rejected at the boundary rather than opening a
    /// channel nothing else listens on.
    #[error("unknown event name: {0:?}")]
    UnknownEvent(String),

    /// A JSON payload didn't match the shape required by its event name.
    #[error("invalid payload for {name}: {source}")]
    InvalidPayload {
        name: crate::EventName,
        #[source]
        source: serde_json::Error,
    },
}
