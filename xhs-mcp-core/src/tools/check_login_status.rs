//! Report whether the browser profile is logged in.

use crate::platform::Platform;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use server_common::{ToolDescriptor, ToolError, ToolHandler, ToolResult};
use std::sync::Arc;

pub const NAME: &str = "check_login_status";

pub struct CheckLoginStatusTool {
    platform: Arc<dyn Platform>,
}

impl CheckLoginStatusTool {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ToolHandler for CheckLoginStatusTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: NAME.into(),
            description: "Check Xiaohongshu login status".into(),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    async fn call(&self, _arguments: Map<String, Value>) -> Result<ToolResult, ToolError> {
        Ok(match self.platform.check_login_status().await {
            Ok(status) => ToolResult::text(status.summary()),
            Err(e) => ToolResult::error(format!("Failed to check login status: {}", e)),
        })
    }
}
