//! Platform-automation types shared by the tools and the browser backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginStatus {
    pub is_logged_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl LoginStatus {
    pub fn summary(&self) -> String {
        match (self.is_logged_in, self.username.as_deref()) {
            (true, Some(name)) if !name.is_empty() => {
                format!("Login status: logged in as {}", name)
            }
            (true, _) => "Login status: logged in".to_string(),
            (false, _) => "Login status: not logged in".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PublishRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
    #[validate(length(min = 1, message = "at least one image is required"))]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub title: String,
    pub content: String,
    /// Number of images uploaded.
    pub images: usize,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author: String,
    pub likes: u64,
    pub comments: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedsListResponse {
    pub feeds: Vec<Feed>,
    pub count: usize,
}

impl FeedsListResponse {
    pub fn new(feeds: Vec<Feed>) -> Self {
        let count = feeds.len();
        Self { feeds, count }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub keyword: String,
    pub results: Vec<Feed>,
    pub total: usize,
}

impl SearchResponse {
    pub fn new(keyword: impl Into<String>, results: Vec<Feed>) -> Self {
        let total = results.len();
        Self {
            keyword: keyword.into(),
            results,
            total,
        }
    }

    /// Keep at most `limit` results.
    pub fn truncate(&mut self, limit: usize) {
        self.results.truncate(limit);
        self.total = self.results.len();
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("browser error: {0}")]
    Browser(String),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("page element '{selector}' not found: {detail}")]
    Element { selector: String, detail: String },
    #[error("failed to read page state: {0}")]
    PageState(String),
    #[error("image upload failed: {0}")]
    Upload(String),
    #[error("{operation} timed out after {}s", .seconds)]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },
}

/// The social platform as seen by the tools.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn check_login_status(&self) -> Result<LoginStatus, PlatformError>;
    async fn publish(&self, request: &PublishRequest) -> Result<PublishResponse, PlatformError>;
    async fn list_feeds(&self) -> Result<FeedsListResponse, PlatformError>;
    async fn search_feeds(&self, keyword: &str) -> Result<SearchResponse, PlatformError>;
}
