//! Web search provider.
//!
//! Posts the query to the configured search API and returns the organic
//! results, trimmed for a voice conversation.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Tool, ToolError};

/// Default search API endpoint.
const DEFAULT_SEARCH_URL: &str = "https://google.serper.dev/search";

/// Result entries to keep; enough for the model to summarize aloud.
const MAX_RESULTS: usize = 3;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

/// Capability provider backed by a web search HTTP API.
pub struct WebSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl WebSearch {
    pub fn new(endpoint: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            api_key,
        }
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Search the web for current information the assistant does not know, \
         such as news, weather or opening hours of other businesses."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: SearchArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ToolError::NotConfigured("web_search"))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", api_key)
            .json(&json!({"q": args.query}))
            .send()
            .await
            .map_err(|e| ToolError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| ToolError::Provider(e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ToolError::Provider(e.to_string()))?;

        let results: Vec<serde_json::Value> = body["organic"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .take(MAX_RESULTS)
                    .map(|entry| {
                        json!({
                            "title": entry["title"],
                            "snippet": entry["snippet"],
                            "link": entry["link"],
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({
            "query": args.query,
            "results": results,
        }))
    }
}
