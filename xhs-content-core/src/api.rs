//! Content API mounted next to the MCP routes.
//! Routes: `POST /api/generate-and-publish`, `GET /api/status`.

use crate::orchestrator::Workflow;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// `None` when the configuration failed to load; the routes stay mounted
/// and report that generation is not configured.
#[derive(Clone)]
struct ApiState {
    workflow: Option<Arc<dyn Workflow>>,
}

pub fn api_router(workflow: Option<Arc<dyn Workflow>>) -> Router {
    Router::new()
        .route("/api/generate-and-publish", post(handle_generate_and_publish))
        .route("/api/status", get(handle_status))
        .with_state(ApiState { workflow })
}

async fn handle_generate_and_publish(State(state): State<ApiState>) -> Response {
    let Some(workflow) = state.workflow else {
        return error_response("Content generation not configured".to_string());
    };

    tracing::info!("Content generation requested over HTTP");
    match workflow.run().await {
        Ok(result) => Json(json!({
            "status": "success",
            "message": "Content generation and publishing completed successfully",
            "result": result,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Workflow failed");
            error_response(format!("Workflow failed: {e}"))
        }
    }
}

async fn handle_status(State(state): State<ApiState>) -> Response {
    let mut status = json!({
        "mcp_server": "running",
        "content_generation": "not_configured",
    });

    if let Some(workflow) = state.workflow {
        status["content_generation"] = json!("available");
        status["services"] = json!(workflow.service_status().await);
    }

    Json(status).into_response()
}

fn error_response(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::FakeWorkflow;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1 << 20).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_generate_and_publish_success() {
        let workflow = Arc::new(FakeWorkflow::succeeding());
        let app = api_router(Some(workflow.clone()));

        let (status, body) = send(app, "POST", "/api/generate-and-publish").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(
            body["message"],
            "Content generation and publishing completed successfully"
        );
        assert_eq!(body["result"]["generated_content"]["title"], "周末去环球");
        assert_eq!(workflow.runs(), 1);
    }

    #[tokio::test]
    async fn test_generate_and_publish_failure_is_500() {
        let app = api_router(Some(Arc::new(FakeWorkflow::failing())));

        let (status, body) = send(app, "POST", "/api/generate-and-publish").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error"],
            "Workflow failed: Content generation failed: DeepSeek returned no choices"
        );
    }

    #[tokio::test]
    async fn test_generate_without_workflow() {
        let (status, body) = send(api_router(None), "POST", "/api/generate-and-publish").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Content generation not configured");
    }

    #[tokio::test]
    async fn test_status_reports_services() {
        let app = api_router(Some(Arc::new(FakeWorkflow::succeeding())));

        let (status, body) = send(app, "GET", "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "mcp_server": "running",
                "content_generation": "available",
                "services": {"mcp_server": "✅ OK"}
            })
        );
    }

    #[tokio::test]
    async fn test_status_without_workflow() {
        let (_, body) = send(api_router(None), "GET", "/api/status").await;
        assert_eq!(body["content_generation"], "not_configured");
        assert!(body.get("services").is_none());
    }
}
