//! Shell configuration.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use streamia_session::SessionConfig;
use streamia_storage::{FileStorage, MemoryStorage, Storage, StorageError};

/// Environment variable for [`ShellConfig::api_url`].
pub const API_URL_VAR: &str = "STREAMIA_API_URL";
/// Environment variable for [`ShellConfig::storage_dir`].
pub const STORAGE_DIR_VAR: &str = "STREAMIA_STORAGE_DIR";
/// Environment variable for [`ShellConfig::log_filter`].
pub const LOG_VAR: &str = "STREAMIA_LOG";

/// Settings shared by every module a shell mounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Base URL of the backend API.
    pub api_url: String,

    /// Directory for file-backed storage. `None` keeps everything in
    /// memory for the life of the process.
    pub storage_dir: Option<PathBuf>,

    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Storage keys for the session.
    pub session: SessionConfig,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000/api".to_string(),
            storage_dir: None,
            log_filter: "info".to_string(),
            session: SessionConfig::default(),
        }
    }
}

impl ShellConfig {
    /// Reads the `STREAMIA_*` variables over the defaults. Empty values
    /// count as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = var(API_URL_VAR) {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = var(STORAGE_DIR_VAR) {
            config.storage_dir = Some(PathBuf::from(dir));
        }
        if let Some(filter) = var(LOG_VAR) {
            config.log_filter = filter;
        }
        config
    }

    /// `path` resolved against [`api_url`](Self::api_url), for API
    /// clients such as a `FavoritesApi` over HTTP.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Opens the storage this config describes.
    ///
    /// # Errors
    /// [`StorageError::Io`] if `storage_dir` can't be created.
    pub fn open_storage(&self) -> Result<Arc<dyn Storage>, StorageError> {
        match &self.storage_dir {
            Some(dir) => Ok(Arc::new(FileStorage::in_dir(dir)?)),
            None => Ok(Arc::new(MemoryStorage::new())),
        }
    }
}
