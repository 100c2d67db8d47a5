//! List the explore-page feed.

use crate::platform::Platform;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use server_common::{ToolDescriptor, ToolError, ToolHandler, ToolResult};
use std::sync::Arc;

pub const NAME: &str = "list_feeds";

pub struct ListFeedsTool {
    platform: Arc<dyn Platform>,
}

impl ListFeedsTool {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for ListFeedsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: NAME.into(),
            description: "List Xiaohongshu feeds".into(),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    async fn call(&self, _arguments: Map<String, Value>) -> Result<ToolResult, ToolError> {
        let feeds = match self.platform.list_feeds().await {
            Ok(feeds) => feeds,
            Err(e) => return Ok(ToolResult::error(format!("Failed to list feeds: {}", e))),
        };

        Ok(match serde_json::to_string_pretty(&feeds) {
            Ok(text) => ToolResult::text(text),
            Err(e) => ToolResult::error(format!("Failed to serialize feeds: {}", e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::FakePlatform;

    #[tokio::test]
    async fn test_feeds_rendered_as_pretty_json() {
        let tool = ListFeedsTool::new(Arc::new(FakePlatform::logged_in()));
        let result = tool.call(Map::new()).await.unwrap();
        assert!(!result.is_error);

        let text = result.first_text().unwrap();
        assert!(text.contains("\n  \"feeds\""));
        let value: Value = serde_json::from_str(text).unwrap();
        assert_eq!(value["count"], json!(2));
        assert_eq!(value["feeds"][1]["title"], json!("Night parade"));
    }

    #[tokio::test]
    async fn test_platform_failure_is_tool_error() {
        let tool = ListFeedsTool::new(Arc::new(FakePlatform::down()));
        let result = tool.call(Map::new()).await.unwrap();
        assert!(result.is_error);
    }
}
