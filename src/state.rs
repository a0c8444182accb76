//! Shared application state
//!
//! One `AppState` for the whole server: the immutable relay configuration
//! and the capability registry. Sessions never share any other mutable
//! state; everything per-call lives inside the session coordinator.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::tools::ToolRegistry;

/// Application state shared across handlers via `State<Arc<AppState>>`.
pub struct AppState {
    /// Immutable server configuration
    pub config: RelayConfig,
    /// Read-only capability registry, supplied at startup
    pub tools: Arc<ToolRegistry>,
}

impl AppState {
    /// Create application state from configuration, registering the built-in
    /// capability providers.
    pub fn new(config: RelayConfig) -> Self {
        let tools = Arc::new(ToolRegistry::with_builtin_providers(&config));
        Self { config, tools }
    }
}
