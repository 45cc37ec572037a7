//! The `Shell` composition root.
//!
//! The shell is the host page: it owns the event bus and durable storage
//! and hands every micro-frontend it mounts a session store wired to
//! both. Modules never construct their own bus, so they can't end up on
//! disconnected copies of it.

use std::sync::{Arc, Mutex, PoisonError};

use streamia_events::kind::RouteChange;
use streamia_events::{EventBus, RouteChangePayload};
use streamia_session::{Clock, SessionStore, SystemClock};
use streamia_storage::Storage;

use crate::{ShellConfig, StreamiaError, logging};

/// Builder for configuring a [`Shell`].
///
/// # Example
///
/// ```rust,no_run
/// use streamia::prelude::*;
///
/// # fn main() -> Result<(), StreamiaError> {
/// let shell = Shell::builder()
///     .config(ShellConfig::from_env())
///     .build()?;
/// let auth = shell.mount("auth");
/// # Ok(())
/// # }
/// ```
pub struct ShellBuilder {
    config: ShellConfig,
    bus: Option<Arc<EventBus>>,
    storage: Option<Arc<dyn Storage>>,
    clock: Arc<dyn Clock>,
}

impl ShellBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ShellConfig::default(),
            bus: None,
            storage: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ShellConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `bus` instead of a fresh one.
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Uses the process-wide bus from [`EventBus::global`], for modules
    /// that can't be handed a reference.
    pub fn global_bus(self) -> Self {
        self.bus(EventBus::global())
    }

    /// Uses `storage` instead of opening the one the config describes.
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the clock every mounted session store checks expiry with.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Opens storage (unless one was given) and builds the shell.
    ///
    /// # Errors
    /// [`StreamiaError::Storage`] if the configured storage directory
    /// can't be created.
    pub fn build(self) -> Result<Shell, StreamiaError> {
        let storage = match self.storage {
            Some(storage) => storage,
            None => self.config.open_storage()?,
        };
        let correlation_id = logging::correlation_id();
        let span = tracing::info_span!("shell", correlation_id = %correlation_id);
        span.in_scope(|| {
            tracing::info!(
                api_url = %self.config.api_url,
                durable = self.config.storage_dir.is_some(),
                "shell started"
            );
        });

        Ok(Shell {
            bus: self.bus.unwrap_or_else(|| Arc::new(EventBus::new())),
            storage,
            clock: self.clock,
            config: self.config,
            correlation_id,
            span,
            mounted: Mutex::new(Vec::new()),
        })
    }
}

impl Default for ShellBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The host of a set of micro-frontends.
pub struct Shell {
    config: ShellConfig,
    bus: Arc<EventBus>,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    correlation_id: String,
    span: tracing::Span,
    mounted: Mutex<Vec<String>>,
}

impl Shell {
    /// Creates a new builder.
    pub fn builder() -> ShellBuilder {
        ShellBuilder::new()
    }

    /// Gives `module` its own session store on the shell's bus and
    /// storage. The store is initialized from storage before it is
    /// returned.
    pub fn mount(&self, module: &str) -> Arc<SessionStore> {
        self.span.in_scope(|| {
            let store = SessionStore::builder(Arc::clone(&self.bus), Arc::clone(&self.storage))
                .name(module)
                .config(self.config.session.clone())
                .clock(Arc::clone(&self.clock))
                .build();
            self.mounted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(module.to_string());
            tracing::info!(module, "module mounted");
            Arc::new(store)
        })
    }

    /// Announces a navigation with `route:change`.
    pub fn navigate(&self, path: &str) {
        self.span.in_scope(|| {
            tracing::debug!(path, "navigating");
            self.bus.emit::<RouteChange>(RouteChangePayload {
                path: path.to_string(),
            });
        });
    }

    /// Names of the modules mounted so far, in mount order.
    pub fn mounted(&self) -> Vec<String> {
        self.mounted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Id attached to every log line this shell emits.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// The span carrying [`correlation_id`](Self::correlation_id). Enter
    /// it to tag a module's own log lines.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("correlation_id", &self.correlation_id)
            .field("mounted", &self.mounted())
            .field("bus", &self.bus)
            .finish()
    }
}
