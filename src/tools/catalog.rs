//! Product catalog search provider.
//!
//! Queries the configured catalog API and returns a trimmed list of
//! matching products. The HTTP call is entirely this provider's concern.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Tool, ToolError};

/// How many products to return at most, regardless of what the model asks
/// for. The caller is on a phone; long lists do not read well aloud.
const MAX_RESULTS: usize = 5;

#[derive(Debug, Deserialize)]
struct CatalogArgs {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

/// Capability provider backed by a product catalog HTTP API.
pub struct CatalogSearch {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl CatalogSearch {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl Tool for CatalogSearch {
    fn name(&self) -> &'static str {
        "catalog_search"
    }

    fn description(&self) -> &'static str {
        "Search the store's product catalog by keyword. \
         Returns matching products with name, price and availability."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords describing the product"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results (default 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: CatalogArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let base_url = self
            .base_url
            .as_deref()
            .ok_or(ToolError::NotConfigured("catalog_search"))?;

        let limit = args.limit.unwrap_or(3).min(MAX_RESULTS);
        let url = format!("{}/products", base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[("q", args.query.as_str()), ("limit", &limit.to_string())])
            .send()
            .await
            .map_err(|e| ToolError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| ToolError::Provider(e.to_string()))?;

        let products: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ToolError::Provider(e.to_string()))?;

        Ok(json!({
            "query": args.query,
            "products": products,
        }))
    }
}
