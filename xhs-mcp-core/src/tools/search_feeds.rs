//! Search notes by keyword.

use crate::platform::Platform;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use server_common::{ToolDescriptor, ToolError, ToolHandler, ToolResult};
use std::sync::Arc;
use validator::Validate;

pub const NAME: &str = "search_feeds";

#[derive(Debug, Deserialize, Validate)]
struct SearchInput {
    #[serde(default)]
    keyword: Option<String>,
    /// Maximum number of results; absent means all. Fractions round down.
    #[validate(range(min = 1.0))]
    limit: Option<f64>,
}

pub struct SearchFeedsTool {
    platform: Arc<dyn Platform>,
}

impl SearchFeedsTool {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for SearchFeedsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: NAME.into(),
            description: "Search Xiaohongshu feeds by keyword".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "keyword": {"type": "string", "description": "Search keyword"},
                    "limit": {"type": "number", "description": "Maximum number of results"}
                },
                "required": ["keyword"]
            }),
        }
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolResult, ToolError> {
        let input: SearchInput = serde_json::from_value(Value::Object(arguments))
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid arguments: {}", e)))?;
        input
            .validate()
            .map_err(|e| ToolError::InvalidArguments(format!("Validation failed: {}", e)))?;

        let keyword = input.keyword.as_deref().unwrap_or_default().trim();
        if keyword.is_empty() {
            return Ok(ToolResult::error("search keyword must not be empty"));
        }

        tracing::info!(%keyword, limit = ?input.limit, "Searching feeds");

        let mut response = match self.platform.search_feeds(keyword).await {
            Ok(response) => response,
            Err(e) => return Ok(ToolResult::error(format!("Failed to search feeds: {}", e))),
        };
        if let Some(limit) = input.limit {
            // Float-to-int casts saturate.
            response.truncate(limit.floor() as usize);
        }

        Ok(match serde_json::to_string_pretty(&response) {
            Ok(text) => ToolResult::text(text),
            Err(e) => ToolResult::error(format!("Failed to serialize results: {}", e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::FakePlatform;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_limit_truncates_results() {
        let tool = SearchFeedsTool::new(Arc::new(FakePlatform::logged_in()));
        let result = tool
            .call(args(json!({"keyword": "环球影城", "limit": 2})))
            .await
            .unwrap();
        let value: Value = serde_json::from_str(result.first_text().unwrap()).unwrap();
        assert_eq!(value["keyword"], json!("环球影城"));
        assert_eq!(value["total"], json!(2));
        assert_eq!(value["results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_without_limit_returns_everything() {
        let tool = SearchFeedsTool::new(Arc::new(FakePlatform::logged_in()));
        let result = tool.call(args(json!({"keyword": "parade"}))).await.unwrap();
        let value: Value = serde_json::from_str(result.first_text().unwrap()).unwrap();
        assert_eq!(value["total"], json!(3));
    }

    #[tokio::test]
    async fn test_empty_keyword_is_tool_error() {
        let tool = SearchFeedsTool::new(Arc::new(FakePlatform::logged_in()));
        for arguments in [json!({}), json!({"keyword": "  "}), json!({"keyword": null})] {
            let result = tool.call(args(arguments)).await.unwrap();
            assert!(result.is_error);
            assert_eq!(result.first_text(), Some("search keyword must not be empty"));
        }
    }

    #[tokio::test]
    async fn test_float_limit_is_accepted() {
        let tool = SearchFeedsTool::new(Arc::new(FakePlatform::logged_in()));
        for (limit, expected) in [(json!(2.0), 2), (json!(1.7), 1), (json!(1e12), 3)] {
            let result = tool
                .call(args(json!({"keyword": "a", "limit": limit})))
                .await
                .unwrap();
            let value: Value = serde_json::from_str(result.first_text().unwrap()).unwrap();
            assert_eq!(value["total"], json!(expected));
        }
    }

    #[tokio::test]
    async fn test_bad_limit_is_invalid_arguments() {
        let tool = SearchFeedsTool::new(Arc::new(FakePlatform::logged_in()));
        for limit in [json!(0), json!(-1), json!(0.5), json!("ten")] {
            let err = tool
                .call(args(json!({"keyword": "a", "limit": limit})))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments(_)));
        }
    }
}
