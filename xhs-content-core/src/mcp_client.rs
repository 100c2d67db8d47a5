//! JSON-RPC client for the MCP tool servers.

use reqwest::Client;
use serde_json::{json, Value};
use server_common::{JsonRpcRequest, JsonRpcResponse, ToolResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::fetch::http_client;

#[derive(Debug, Error)]
pub enum McpClientError {
    #[error("failed to call MCP server at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("MCP server returned status {0}")]
    Status(u16),
    #[error("failed to decode MCP response: {0}")]
    Decode(String),
    #[error("MCP error {code}: {message}")]
    Rpc { code: i32, message: String },
    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },
}

pub struct McpClient {
    client: Client,
    base_url: String,
    next_id: AtomicU64,
}

impl McpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Invoke `tools/call`. A tool result flagged `isError` becomes
    /// [`McpClientError::Tool`].
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult, McpClientError> {
        let id = format!("{}_{}", name, self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = JsonRpcRequest::new(
            id,
            "tools/call",
            Some(json!({"name": name, "arguments": arguments})),
        );
        let url = format!("{}/mcp", self.base_url);

        tracing::debug!(tool = name, %url, "Calling MCP tool");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| McpClientError::Transport {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(McpClientError::Status(status.as_u16()));
        }

        let envelope: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| McpClientError::Decode(e.to_string()))?;

        if let Some(error) = envelope.error {
            return Err(McpClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result: ToolResult = serde_json::from_value(envelope.result.unwrap_or(Value::Null))
            .map_err(|e| McpClientError::Decode(e.to_string()))?;

        if result.is_error {
            return Err(McpClientError::Tool {
                tool: name.to_string(),
                message: result.first_text().unwrap_or("unknown error").to_string(),
            });
        }

        Ok(result)
    }

    /// `GET /health`; any non-2xx status is an error.
    pub async fn health(&self) -> Result<(), McpClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| McpClientError::Transport {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(McpClientError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> McpClient {
        McpClient::new(format!("{}/", server.uri()), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_call_tool_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(json!({
                "jsonrpc": "2.0",
                "method": "tools/call",
                "params": {"name": "list_feeds", "arguments": {}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": "list_feeds_1",
                "result": {"content": [{"type": "text", "text": "{}"}], "isError": false}
            })))
            .mount(&server)
            .await;

        let result = client(&server).call_tool("list_feeds", json!({})).await.unwrap();
        assert_eq!(result.first_text(), Some("{}"));
    }

    #[tokio::test]
    async fn test_is_error_result_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"content": [{"type": "text", "text": "browser crashed"}], "isError": true}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .call_tool("publish_content", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "publish_content failed: browser crashed");
    }

    #[tokio::test]
    async fn test_rpc_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32602, "message": "Invalid params", "data": "Missing tool arguments"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).call_tool("x", json!({})).await.unwrap_err();
        assert!(matches!(err, McpClientError::Rpc { code: -32602, .. }));
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        client(&server).health().await.unwrap();
    }

    #[tokio::test]
    async fn test_health_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client(&server).health().await.unwrap_err();
        assert_eq!(err.to_string(), "MCP server returned status 502");
    }
}
