//! MCP method dispatch.
//!
//! `Dispatcher` routes a parsed JSON-RPC request to the static MCP methods
//! (`initialize`, `tools/list`, `tools/call`, `notifications/*`). Tools live in
//! a `ToolRegistry` that is assembled and validated once at startup; nothing
//! is retained between calls.

use crate::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolCall, ToolResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// MCP protocol revision advertised by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Public description of a tool, returned verbatim by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Errors a tool handler can raise instead of producing a `ToolResult`.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments failed schema validation. Surfaces as JSON-RPC -32602.
    #[error("{0}")]
    InvalidArguments(String),
}

/// A named, schema-described operation reachable through `tools/call`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute the tool. Downstream failures are reported inside the
    /// returned `ToolResult` with `is_error` set.
    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolResult, ToolError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool registered with an empty name")]
    EmptyName,
    #[error("tool '{0}' registered more than once")]
    Duplicate(String),
    #[error("tool '{0}' is required but not registered")]
    Missing(String),
    #[error("tool '{0}' is not part of the expected catalog")]
    Unexpected(String),
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

/// Immutable name → handler table. Preserves registration order for listing.
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools
            .iter()
            .map(|t| t.descriptor.name.as_str())
            .collect()
    }

    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        self.tools.iter().map(|t| &t.descriptor).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools
            .iter()
            .find(|t| t.descriptor.name == name)
            .map(|t| &t.handler)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    handlers: Vec<Arc<dyn ToolHandler>>,
    expected: Option<Vec<String>>,
}

impl ToolRegistryBuilder {
    pub fn tool(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Require the registry to contain exactly these tool names.
    pub fn expect_exactly<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut seen = HashSet::new();
        let mut tools = Vec::with_capacity(self.handlers.len());

        for handler in self.handlers {
            let descriptor = handler.descriptor();
            if descriptor.name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if !seen.insert(descriptor.name.clone()) {
                return Err(RegistryError::Duplicate(descriptor.name));
            }
            tools.push(RegisteredTool {
                descriptor,
                handler,
            });
        }

        if let Some(expected) = self.expected {
            for name in &expected {
                if !seen.contains(name) {
                    return Err(RegistryError::Missing(name.clone()));
                }
            }
            if let Some(extra) = tools
                .iter()
                .find(|t| !expected.contains(&t.descriptor.name))
            {
                return Err(RegistryError::Unexpected(extra.descriptor.name.clone()));
            }
        }

        Ok(ToolRegistry { tools })
    }
}

/// Identity reported by `initialize` and `/health`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Outcome of dispatching one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Result(Value),
    Error(JsonRpcError),
    /// Notifications: the transport writes no body at all.
    NoReply,
}

impl Reply {
    /// Wrap into a response envelope; `None` for notifications.
    pub fn into_response(self, id: Value) -> Option<JsonRpcResponse> {
        match self {
            Reply::Result(result) => Some(JsonRpcResponse::success(id, result)),
            Reply::Error(error) => Some(JsonRpcResponse::failure(id, error)),
            Reply::NoReply => None,
        }
    }
}

pub struct Dispatcher {
    info: ServerInfo,
    registry: ToolRegistry,
}

impl Dispatcher {
    pub fn new(info: ServerInfo, registry: ToolRegistry) -> Self {
        Self { info, registry }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, request: &JsonRpcRequest) -> Reply {
        tracing::info!(method = %request.method, id = %request.id, "Received MCP request");

        match request.method.as_str() {
            "initialize" => Reply::Result(self.initialize()),
            "tools/list" => Reply::Result(self.tools_list()),
            "tools/call" => self.tools_call(request.params.as_ref()).await,
            method if method.starts_with("notifications/") => {
                match method {
                    "notifications/initialized" => {
                        tracing::info!("MCP: client initialization complete")
                    }
                    "notifications/cancelled" => {
                        tracing::info!("MCP: received cancellation notification")
                    }
                    other => tracing::debug!(method = other, "MCP: ignoring notification"),
                }
                Reply::NoReply
            }
            other => Reply::Error(JsonRpcError::method_not_found(format!(
                "Unknown method: {}",
                other
            ))),
        }
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version,
            }
        })
    }

    fn tools_list(&self) -> Value {
        json!({ "tools": self.registry.descriptors() })
    }

    async fn tools_call(&self, params: Option<&Value>) -> Reply {
        let call = match ToolCall::from_params(params) {
            Ok(call) => call,
            Err(e) => return Reply::Error(e),
        };

        let Some(handler) = self.registry.get(&call.name) else {
            return Reply::Error(JsonRpcError::method_not_found(format!(
                "Unknown tool: {}",
                call.name
            )));
        };

        tracing::info!(tool = %call.name, "Executing tool");

        match handler.call(call.arguments).await {
            Ok(result) => {
                if result.is_error {
                    tracing::warn!(tool = %call.name, text = ?result.first_text(), "Tool reported an error");
                }
                match serde_json::to_value(&result) {
                    Ok(value) => Reply::Result(value),
                    Err(e) => Reply::Error(JsonRpcError::new(
                        crate::jsonrpc::error_codes::INTERNAL_ERROR,
                        "Internal error",
                        Some(e.to_string()),
                    )),
                }
            }
            Err(ToolError::InvalidArguments(detail)) => {
                tracing::warn!(tool = %call.name, %detail, "Rejected tool arguments");
                Reply::Error(JsonRpcError::invalid_params(detail))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::jsonrpc::error_codes;

    /// Echoes its arguments back; rejects a `reject` key.
    pub(crate) struct EchoTool(pub &'static str);

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: self.0.to_string(),
                description: format!("Echo tool {}", self.0),
                input_schema: json!({"type": "object", "properties": {}}),
            }
        }

        async fn call(&self, arguments: Map<String, Value>) -> Result<ToolResult, ToolError> {
            if arguments.contains_key("reject") {
                return Err(ToolError::InvalidArguments("reject is not allowed".into()));
            }
            if arguments.contains_key("fail") {
                return Ok(ToolResult::error("downstream failed"));
            }
            Ok(ToolResult::text(Value::Object(arguments).to_string()))
        }
    }

    pub(crate) fn dispatcher() -> Dispatcher {
        let registry = ToolRegistry::builder()
            .tool(Arc::new(EchoTool("alpha")))
            .tool(Arc::new(EchoTool("beta")))
            .build()
            .unwrap();
        Dispatcher::new(ServerInfo::new("test-mcp", "v1.0.0"), registry)
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest::new(1, method, params)
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let err = ToolRegistry::builder()
            .tool(Arc::new(EchoTool("alpha")))
            .tool(Arc::new(EchoTool("alpha")))
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("alpha".into()));
    }

    #[test]
    fn test_registry_rejects_empty_name() {
        let err = ToolRegistry::builder()
            .tool(Arc::new(EchoTool(" ")))
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::EmptyName);
    }

    #[test]
    fn test_registry_expect_exactly() {
        let err = ToolRegistry::builder()
            .tool(Arc::new(EchoTool("alpha")))
            .expect_exactly(["alpha", "beta"])
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::Missing("beta".into()));

        let err = ToolRegistry::builder()
            .tool(Arc::new(EchoTool("alpha")))
            .tool(Arc::new(EchoTool("gamma")))
            .expect_exactly(["alpha"])
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::Unexpected("gamma".into()));

        let registry = ToolRegistry::builder()
            .tool(Arc::new(EchoTool("beta")))
            .tool(Arc::new(EchoTool("alpha")))
            .expect_exactly(["alpha", "beta"])
            .build()
            .unwrap();
        assert_eq!(registry.names(), vec!["beta", "alpha"]);
    }

    #[tokio::test]
    async fn test_initialize_returns_server_triple() {
        let Reply::Result(value) = dispatcher().dispatch(&request("initialize", None)).await else {
            panic!("expected result");
        };
        assert_eq!(value["protocolVersion"], json!(PROTOCOL_VERSION));
        assert_eq!(value["capabilities"], json!({"tools": {}}));
        assert_eq!(value["serverInfo"]["name"], json!("test-mcp"));
    }

    #[tokio::test]
    async fn test_tools_list_ignores_params() {
        let d = dispatcher();
        let Reply::Result(a) = d.dispatch(&request("tools/list", None)).await else {
            panic!("expected result");
        };
        let Reply::Result(b) = d
            .dispatch(&request("tools/list", Some(json!({"cursor": "x"}))))
            .await
        else {
            panic!("expected result");
        };
        assert_eq!(a, b);
        assert_eq!(a["tools"].as_array().unwrap().len(), 2);
        assert_eq!(a["tools"][0]["name"], json!("alpha"));
        assert!(a["tools"][0].get("inputSchema").is_some());
    }

    #[tokio::test]
    async fn test_unknown_method_is_not_found() {
        let Reply::Error(err) = dispatcher().dispatch(&request("resources/list", None)).await else {
            panic!("expected error");
        };
        assert_eq!(err.code, error_codes::METHOD_NOT_FOUND);
        assert_eq!(err.data, Some(json!("Unknown method: resources/list")));
    }

    #[tokio::test]
    async fn test_notifications_produce_no_reply() {
        let d = dispatcher();
        for method in [
            "notifications/initialized",
            "notifications/cancelled",
            "notifications/progress",
        ] {
            assert!(matches!(d.dispatch(&request(method, None)).await, Reply::NoReply));
        }
    }

    #[tokio::test]
    async fn test_tools_call_missing_pieces_is_invalid_params() {
        let d = dispatcher();
        for params in [
            None,
            Some(json!({"arguments": {}})),
            Some(json!({"name": "alpha"})),
            Some(json!({"name": "alpha", "arguments": null})),
        ] {
            let Reply::Error(err) = d.dispatch(&request("tools/call", params)).await else {
                panic!("expected error");
            };
            assert_eq!(err.code, error_codes::INVALID_PARAMS);
        }
    }

    #[tokio::test]
    async fn test_tools_call_unknown_tool() {
        let Reply::Error(err) = dispatcher()
            .dispatch(&request(
                "tools/call",
                Some(json!({"name": "nope", "arguments": {}})),
            ))
            .await
        else {
            panic!("expected error");
        };
        assert_eq!(err.code, error_codes::METHOD_NOT_FOUND);
        assert_eq!(err.data, Some(json!("Unknown tool: nope")));
    }

    #[tokio::test]
    async fn test_tools_call_routes_to_handler() {
        let d = dispatcher();
        let Reply::Result(value) = d
            .dispatch(&request(
                "tools/call",
                Some(json!({"name": "beta", "arguments": {"k": 1}})),
            ))
            .await
        else {
            panic!("expected result");
        };
        assert_eq!(value["content"][0]["text"], json!("{\"k\":1}"));
        assert_eq!(value["isError"], json!(false));

        let Reply::Result(value) = d
            .dispatch(&request(
                "tools/call",
                Some(json!({"name": "beta", "arguments": {"fail": true}})),
            ))
            .await
        else {
            panic!("expected result");
        };
        assert_eq!(value["isError"], json!(true));
    }

    #[tokio::test]
    async fn test_tool_argument_rejection_maps_to_invalid_params() {
        let Reply::Error(err) = dispatcher()
            .dispatch(&request(
                "tools/call",
                Some(json!({"name": "alpha", "arguments": {"reject": 1}})),
            ))
            .await
        else {
            panic!("expected error");
        };
        assert_eq!(err.code, error_codes::INVALID_PARAMS);
        assert_eq!(err.data, Some(json!("reject is not allowed")));
    }
}
