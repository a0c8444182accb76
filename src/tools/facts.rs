//! Static store information lookup.
//!
//! A fixed fact table for questions that never need a network call: opening
//! hours, address, returns, contact details.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use super::{Tool, ToolError};

static FACTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            "hours",
            "The store is open Monday through Saturday from 9am to 8pm, and Sunday from 10am to 6pm.",
        ),
        (
            "address",
            "The store is at 420 Market Street, downtown, two blocks from the Main Street station.",
        ),
        (
            "returns",
            "Items can be returned within 30 days with a receipt for a full refund; opened electronics carry a 15 percent restocking fee.",
        ),
        (
            "phone",
            "The store can be reached at 555-0137 during opening hours.",
        ),
        (
            "shipping",
            "Orders over 50 dollars ship free; everything else ships at a flat 5 dollar rate, arriving in 3 to 5 business days.",
        ),
    ])
});

#[derive(Debug, Deserialize)]
struct FactArgs {
    topic: String,
}

/// Capability provider answering fixed store questions from a local table.
#[derive(Default)]
pub struct StoreInfo;

impl StoreInfo {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for StoreInfo {
    fn name(&self) -> &'static str {
        "store_info"
    }

    fn description(&self) -> &'static str {
        "Answer fixed questions about the store: hours, address, returns, \
         phone, shipping."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "enum": ["hours", "address", "returns", "phone", "shipping"],
                    "description": "Which piece of store information to look up"
                }
            },
            "required": ["topic"]
        })
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: FactArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let topic = args.topic.to_lowercase();
        match FACTS.get(topic.as_str()) {
            Some(answer) => Ok(json!({"topic": topic, "answer": answer})),
            None => {
                let mut known: Vec<&str> = FACTS.keys().copied().collect();
                known.sort_unstable();
                Ok(json!({
                    "topic": topic,
                    "answer": null,
                    "known_topics": known,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn looks_up_known_topic() {
        let tool = StoreInfo::new();
        let result = tool.invoke(json!({"topic": "hours"})).await.unwrap();
        assert!(result["answer"].as_str().unwrap().contains("9am"));
    }

    #[tokio::test]
    async fn topic_lookup_is_case_insensitive() {
        let tool = StoreInfo::new();
        let result = tool.invoke(json!({"topic": "HOURS"})).await.unwrap();
        assert!(result["answer"].is_string());
    }

    #[tokio::test]
    async fn unknown_topic_lists_known_topics() {
        let tool = StoreInfo::new();
        let result = tool.invoke(json!({"topic": "parking"})).await.unwrap();
        assert!(result["answer"].is_null());
        assert!(result["known_topics"].as_array().unwrap().contains(&json!("hours")));
    }

    #[tokio::test]
    async fn missing_topic_is_invalid_arguments() {
        let tool = StoreInfo::new();
        let result = tool.invoke(json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
