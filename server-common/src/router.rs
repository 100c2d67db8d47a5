//! Axum router for the MCP JSON-RPC-over-HTTP transport.
//! Routes: `POST /mcp`, `POST /mcp/*path`, `POST /` (requests), `GET /health`.

use crate::dispatch::Dispatcher;
use crate::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the MCP router around a dispatcher.
///
/// Callers may merge additional routes (e.g. a content API) before serving.
pub fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", post(handle_mcp))
        .route("/mcp", post(handle_mcp))
        .route("/mcp/*path", post(handle_mcp))
        .route("/health", get(handle_health))
        .with_state(dispatcher)
}

/// CORS + request tracing, applied once at the outermost layer.
pub fn with_http_layers(router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            HeaderName::from_static("x-csrf-token"),
            header::AUTHORIZATION,
        ]);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

async fn handle_health(State(dispatcher): State<Arc<Dispatcher>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": dispatcher.info().name,
        "tools": dispatcher.registry().names(),
    }))
}

async fn handle_mcp(State(dispatcher): State<Arc<Dispatcher>>, body: String) -> Response {
    let value: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed JSON-RPC body");
            return json_response(JsonRpcResponse::failure(
                Value::Null,
                JsonRpcError::parse_error(e.to_string()),
            ));
        }
    };

    let id = value.get("id").cloned().unwrap_or(Value::Null);

    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            return json_response(JsonRpcResponse::failure(
                id,
                JsonRpcError::invalid_request(e.to_string()),
            ))
        }
    };

    match dispatcher.dispatch(&request).await.into_response(request.id) {
        Some(response) => json_response(response),
        None => StatusCode::OK.into_response(),
    }
}

fn json_response(response: JsonRpcResponse) -> Response {
    (StatusCode::OK, Json(response)).into_response()
}
