//! Tool dispatcher.
//!
//! Matches a model-issued tool call against the capability registry and
//! shapes every possible failure (unparseable arguments, unknown name,
//! provider error, timeout) into a structured result the model can relay
//! to the caller. This layer is never fatal to the session.

use std::time::Duration;

use serde_json::json;

use super::{ToolError, ToolRegistry};
use crate::core::realtime::ToolCallRequest;

/// Apology the model is given to work with when a capability fails.
const APOLOGY: &str =
    "I'm sorry, I couldn't complete that lookup right now. Please try again in a moment.";

/// Dispatch one tool call and produce the JSON result string to relay back.
///
/// Always returns a payload; errors come back as `{"error": ...}` objects
/// rather than surfacing as session failures.
pub async fn dispatch(
    registry: &ToolRegistry,
    call: &ToolCallRequest,
    timeout: Duration,
) -> String {
    let args: serde_json::Value = match serde_json::from_str(&call.arguments) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(tool = %call.name, call_id = %call.call_id, "malformed tool arguments: {e}");
            return error_payload("invalid_arguments", &format!("argument payload did not parse: {e}"));
        }
    };

    let Some(tool) = registry.get(&call.name) else {
        tracing::warn!(tool = %call.name, call_id = %call.call_id, "unknown capability requested");
        return error_payload(
            "capability_not_available",
            &format!("no capability named '{}' is available", call.name),
        );
    };

    tracing::info!(tool = %call.name, call_id = %call.call_id, "invoking capability");

    match tokio::time::timeout(timeout, tool.invoke(args)).await {
        Ok(Ok(result)) => result.to_string(),
        Ok(Err(ToolError::InvalidArguments(msg))) => {
            tracing::warn!(tool = %call.name, "provider rejected arguments: {msg}");
            error_payload("invalid_arguments", &msg)
        }
        Ok(Err(err)) => {
            tracing::error!(tool = %call.name, "capability failed: {err}");
            error_payload("provider_failure", APOLOGY)
        }
        Err(_) => {
            tracing::error!(tool = %call.name, "capability timed out after {timeout:?}");
            error_payload("provider_timeout", APOLOGY)
        }
    }
}

fn error_payload(kind: &str, message: &str) -> String {
    json!({
        "error": {
            "type": kind,
            "message": message,
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::tools::Tool;

    struct Flaky;

    #[async_trait]
    impl Tool for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }
        fn description(&self) -> &'static str {
            "Always fails"
        }
        fn parameters(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn invoke(&self, _args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            Err(ToolError::Provider("upstream 500".to_string()))
        }
    }

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }
        fn description(&self) -> &'static str {
            "Never finishes in time"
        }
        fn parameters(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn invoke(&self, _args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!({}))
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            call_id: "call_test".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn unknown_capability_yields_structured_error() {
        let registry = ToolRegistry::new();
        let result = dispatch(&registry, &call("doesNotExist", "{}"), Duration::from_secs(1)).await;
        let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["error"]["type"], "capability_not_available");
    }

    #[tokio::test]
    async fn malformed_arguments_yield_parse_error() {
        let registry = ToolRegistry::new();
        let result = dispatch(&registry, &call("anything", "{not json"), Duration::from_secs(1)).await;
        let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["error"]["type"], "invalid_arguments");
    }

    #[tokio::test]
    async fn provider_failure_becomes_apology() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Flaky));
        let result = dispatch(&registry, &call("flaky", "{}"), Duration::from_secs(1)).await;
        let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["error"]["type"], "provider_failure");
        assert!(parsed["error"]["message"].as_str().unwrap().contains("sorry"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Slow));
        let result = dispatch(&registry, &call("slow", "{}"), Duration::from_millis(50)).await;
        let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["error"]["type"], "provider_timeout");
    }
}
