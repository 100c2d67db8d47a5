//! Client for the Xiaohongshu platform tools.

use crate::config::XiaohongshuConfig;
use crate::mcp_client::{McpClient, McpClientError};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

pub const XHS_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);
pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_CONTENT_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostValidationError {
    #[error("title is required")]
    EmptyTitle,
    #[error("content is required")]
    EmptyContent,
    #[error("at least one image is required")]
    NoImages,
    #[error("title too long (max 100 characters)")]
    TitleTooLong,
    #[error("content too long (max 1000 characters)")]
    ContentTooLong,
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("failed to post content after {attempts} retries: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: McpClientError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRequest {
    pub title: String,
    pub content: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostResponse {
    pub status: String,
    pub message: String,
    pub posted_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginStatus {
    pub logged_in: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feed {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub likes: u64,
    pub comments: u64,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsResponse {
    pub feeds: Vec<Feed>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResponse {
    pub keyword: String,
    pub results: Vec<Feed>,
    pub total: usize,
}

/// Reject posts the platform would refuse. Lengths count characters.
pub fn validate_post(request: &PostRequest) -> Result<(), PostValidationError> {
    if request.title.is_empty() {
        return Err(PostValidationError::EmptyTitle);
    }
    if request.content.is_empty() {
        return Err(PostValidationError::EmptyContent);
    }
    if request.images.is_empty() {
        return Err(PostValidationError::NoImages);
    }
    if request.title.chars().count() > MAX_TITLE_CHARS {
        return Err(PostValidationError::TitleTooLong);
    }
    if request.content.chars().count() > MAX_CONTENT_CHARS {
        return Err(PostValidationError::ContentTooLong);
    }
    Ok(())
}

pub struct XhsClient {
    mcp: McpClient,
    headless: bool,
    retry_delay: Duration,
}

impl XhsClient {
    pub fn new(config: &XiaohongshuConfig) -> Self {
        Self {
            mcp: McpClient::new(config.server_url.clone(), XHS_TIMEOUT),
            headless: config.headless,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Base unit of the linear backoff between publish attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub async fn health(&self) -> Result<(), McpClientError> {
        self.mcp.health().await
    }

    pub async fn post_content(&self, request: &PostRequest) -> Result<PostResponse, McpClientError> {
        let arguments = json!({
            "title": request.title,
            "content": request.content,
            "images": request.images,
            "headless": self.headless,
        });
        let result = self.mcp.call_tool("publish_content", arguments).await?;

        Ok(PostResponse {
            status: "published".into(),
            message: result.first_text().unwrap_or_default().to_string(),
            posted_at: Local::now(),
        })
    }

    /// Exactly `attempts` tries. Before try `k` (zero-based) sleeps
    /// `k * retry_delay`.
    pub async fn post_with_retry(
        &self,
        request: &PostRequest,
        attempts: u32,
    ) -> Result<PostResponse, PostError> {
        let mut last = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.retry_delay * attempt;
                tracing::warn!(attempt, delay_secs = delay.as_secs(), "Retrying publish");
                tokio::time::sleep(delay).await;
            }

            match self.post_content(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Publish attempt failed");
                    last = Some(e);
                }
            }
        }

        Err(PostError::RetriesExhausted {
            attempts,
            last: last.unwrap_or_else(|| McpClientError::Decode("no publish attempt was made".into())),
        })
    }

    pub async fn check_login_status(&self) -> Result<LoginStatus, McpClientError> {
        let result = self
            .mcp
            .call_tool("check_login_status", json!({"headless": self.headless}))
            .await?;
        let message = result.first_text().unwrap_or_default().to_string();

        Ok(LoginStatus {
            logged_in: !message.contains("not logged in"),
            message,
        })
    }

    pub async fn list_feeds(&self) -> Result<FeedsResponse, McpClientError> {
        let result = self
            .mcp
            .call_tool("list_feeds", json!({"headless": self.headless}))
            .await?;
        serde_json::from_str(result.first_text().unwrap_or("{}"))
            .map_err(|e| McpClientError::Decode(e.to_string()))
    }

    pub async fn search_feeds(
        &self,
        keyword: &str,
        limit: Option<u64>,
    ) -> Result<SearchResponse, McpClientError> {
        let mut arguments = json!({"keyword": keyword, "headless": self.headless});
        if let Some(limit) = limit {
            arguments["limit"] = json!(limit);
        }
        let result = self.mcp.call_tool("search_feeds", arguments).await?;
        serde_json::from_str(result.first_text().unwrap_or("{}"))
            .map_err(|e| McpClientError::Decode(e.to_string()))
    }
}
