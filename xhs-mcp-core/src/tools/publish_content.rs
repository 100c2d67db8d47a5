//! Publish an image post.

use crate::platform::{Platform, PublishRequest};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use server_common::{ToolDescriptor, ToolError, ToolHandler, ToolResult};
use std::sync::Arc;
use validator::Validate;

pub const NAME: &str = "publish_content";

/// Wire shape of the arguments. Extra keys (e.g. `headless`) are ignored.
#[derive(Debug, Deserialize)]
struct PublishInput {
    title: String,
    content: String,
    images: Vec<String>,
}

pub struct PublishContentTool {
    platform: Arc<dyn Platform>,
}

impl PublishContentTool {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for PublishContentTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: NAME.into(),
            description: "Publish content to Xiaohongshu".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "Content title"},
                    "content": {"type": "string", "description": "Content body"},
                    "images": {"type": "array", "items": {"type": "string"}, "description": "Image paths"}
                },
                "required": ["title", "content", "images"]
            }),
        }
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolResult, ToolError> {
        let input: PublishInput = serde_json::from_value(Value::Object(arguments))
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid arguments: {}", e)))?;

        let request = PublishRequest {
            title: input.title,
            content: input.content,
            images: input.images,
        };
        request
            .validate()
            .map_err(|e| ToolError::InvalidArguments(format!("Validation failed: {}", e)))?;

        tracing::info!(title = %request.title, images = request.images.len(), "Publishing content");

        Ok(match self.platform.publish(&request).await {
            Ok(response) => ToolResult::text(format!(
                "Content published successfully: title={:?}, images={}, status={}",
                response.title, response.images, response.status
            )),
            Err(e) => ToolResult::error(format!("Failed to publish content: {}", e)),
        })
    }
}
