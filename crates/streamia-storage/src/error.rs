/// Errors that can occur in the storage layer.
///
/// Mirrors the ways browser `localStorage` can throw: the quota is
/// exhausted, storage is disabled, or the backing medium fails.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Writing the value would exceed the configured quota.
    #[error("quota exceeded writing {key:?}: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        quota: usize,
    },

    /// Storage is disabled or otherwise unreachable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the backing file failed.
    #[error("storage I/O failed: {0}")]
    Io(#[source] std::io::Error),

    /// The backing file exists but isn't a valid JSON document.
    #[cfg(feature = "file")]
    #[error("storage file is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
}
