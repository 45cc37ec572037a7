//! Logging setup.
//!
//! Library crates only emit `tracing` events. Binaries call [`init`] once
//! to print them.

use rand::Rng;
use tracing_subscriber::EnvFilter;

use crate::StreamiaError;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, or by `filter` when
/// `RUST_LOG` is unset.
///
/// Calling it again (or after another subscriber was installed) is
/// harmless: the first subscriber stays.
///
/// # Errors
/// [`StreamiaError::LogFilter`] if `filter` isn't a valid directive.
pub fn init(filter: &str) -> Result<(), StreamiaError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::try_new(filter)?,
    };

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}

/// A random 64-bit id, hex encoded, for tagging one shell's log lines.
pub fn correlation_id() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 8] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
