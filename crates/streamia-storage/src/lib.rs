//! Durable key-value storage for Streamia.
//!
//! Provides the [`Storage`] trait that abstracts over where session data
//! lives between page loads (a browser's `localStorage`), plus two
//! implementations:
//!
//! - [`MemoryStorage`] — process-local map, optionally quota-limited or
//!   switched off to simulate a browser with storage disabled.
//! - [`FileStorage`] — one JSON document on disk, surviving restarts.
//!
//! # Feature Flags
//!
//! - `file` (default) — [`FileStorage`] via `serde_json`

mod error;
#[cfg(feature = "file")]
mod file;
mod memory;

pub use error::StorageError;
#[cfg(feature = "file")]
pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Synchronous string key-value storage.
///
/// Every operation can fail, just as `localStorage` can throw. Callers in
/// the session layer log and absorb these failures; they never crash the
/// UI.
///
/// Methods take `&self` so one store can be shared as `Arc<dyn Storage>`
/// by every module in the process; implementations use interior
/// mutability.
pub trait Storage: Send + Sync + 'static {
    /// Returns the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Returns `true` if `key` currently holds a value.
    fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }
}
