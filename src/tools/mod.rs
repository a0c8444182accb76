//! Capability registry and tool dispatch
//!
//! Tools are external capabilities the model may invoke mid-conversation.
//! The registry is an immutable name-to-handler mapping supplied at
//! startup: new capabilities register here and the dispatch path never
//! grows a branch. Providers own their argument validation and their own
//! network calls; the dispatcher only parses, looks up, invokes and shapes
//! errors.

mod catalog;
mod dispatch;
mod facts;
mod web_search;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RelayConfig;
use crate::core::realtime::messages::ToolDef;

pub use catalog::CatalogSearch;
pub use dispatch::dispatch;
pub use facts::StoreInfo;
pub use web_search::WebSearch;

/// Errors a capability provider can report.
///
/// All of these become structured in-conversation results; none of them
/// ever ends the call.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The argument payload did not match the provider's expected shape.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The provider's own call (network, upstream API) failed.
    #[error("provider failure: {0}")]
    Provider(String),

    /// The provider is registered but not configured for use.
    #[error("capability not configured: {0}")]
    NotConfigured(&'static str),
}

/// An asynchronous capability handler.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Capability name the model calls this tool by.
    fn name(&self) -> &'static str;

    /// Human-readable description advertised to the model.
    fn description(&self) -> &'static str;

    /// JSON schema of the argument payload.
    fn parameters(&self) -> serde_json::Value;

    /// Invoke with already-parsed arguments; returns a JSON-serializable
    /// payload or a structured error.
    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

/// Immutable mapping from capability name to handler.
///
/// Built once at startup and shared read-only across all sessions.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in capability providers.
    pub fn with_builtin_providers(config: &RelayConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CatalogSearch::new(config.catalog_api_url.clone())));
        registry.register(Arc::new(WebSearch::new(
            config.search_api_url.clone(),
            config.search_api_key.clone(),
        )));
        registry.register(Arc::new(StoreInfo::new()));
        registry
    }

    /// Register a tool under its own name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    /// Look up a handler by capability name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Wire-protocol tool definitions advertised in session initialization.
    pub fn definitions(&self) -> Vec<ToolDef> {
        let mut defs: Vec<ToolDef> = self
            .tools
            .values()
            .map(|tool| ToolDef {
                tool_type: "function".to_string(),
                name: tool.name().to_string(),
                description: Some(tool.description().to_string()),
                parameters: Some(tool.parameters()),
            })
            .collect();
        // Stable advertisement order regardless of map iteration
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn description(&self) -> &'static str {
            "Echoes its arguments"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            Ok(args)
        }
    }

    #[test]
    fn registry_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("doesNotExist").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn definitions_are_sorted_and_typed() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        registry.register(Arc::new(StoreInfo::new()));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert!(defs.windows(2).all(|w| w[0].name <= w[1].name));
        assert!(defs.iter().all(|d| d.tool_type == "function"));
    }
}
