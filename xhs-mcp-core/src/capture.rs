//! Element screenshots: navigate, wait for a selector, settle, capture, write.

use crate::browser::{wait_for_visible, BrowserOptions, BrowserSession};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub const DEFAULT_SELECTOR: &str = "body";
pub const DEFAULT_WAIT_SECS: u64 = 3;

/// Deadline for captures made on behalf of tool calls.
pub const TOOL_DEADLINE: Duration = Duration::from_secs(60);
/// Deadline for the one-shot `export` command.
pub const EXPORT_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRequest {
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub selector: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_path: String,
    /// Extra settle time after the selector is visible.
    #[serde(default)]
    pub wait_time: u64,
}

impl ScreenshotRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn wait_time(mut self, seconds: u64) -> Self {
        self.wait_time = seconds;
        self
    }

    /// Fill zero-valued fields. `unix_secs` names the default output file.
    pub fn with_defaults(mut self, unix_secs: i64) -> Self {
        if self.selector.is_empty() {
            self.selector = DEFAULT_SELECTOR.to_string();
        }
        if self.output_path.is_empty() {
            self.output_path = format!("screenshot_{}.jpg", unix_secs);
        }
        if self.wait_time == 0 {
            self.wait_time = DEFAULT_WAIT_SECS;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ScreenshotResult {
    pub fn saved(output_path: impl Into<String>, bytes: usize) -> Self {
        let output_path = output_path.into();
        Self {
            success: true,
            message: format!("Screenshot saved to {} ({} bytes)", output_path, bytes),
            output_path,
            error: String::new(),
        }
    }

    pub fn failed(error: &CaptureError) -> Self {
        Self {
            success: false,
            output_path: String::new(),
            message: String::new(),
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("failed to navigate to {url}: {detail}")]
    Navigation { url: String, detail: String },
    #[error("element '{selector}' never became visible: {detail}")]
    ElementNotVisible { selector: String, detail: String },
    #[error("failed to take screenshot: {0}")]
    Screenshot(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("screenshot timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Something that can turn a page URL into an image file.
#[async_trait]
pub trait Capturer: Send + Sync {
    async fn capture(&self, request: ScreenshotRequest) -> Result<ScreenshotResult, CaptureError>;
}

/// Captures with a fresh browser per call.
#[derive(Debug, Clone)]
pub struct BrowserCapturer {
    options: BrowserOptions,
    deadline: Duration,
}

impl BrowserCapturer {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            deadline: TOOL_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

#[async_trait]
impl Capturer for BrowserCapturer {
    async fn capture(&self, request: ScreenshotRequest) -> Result<ScreenshotResult, CaptureError> {
        let request = request.with_defaults(chrono::Utc::now().timestamp());
        tracing::info!(
            url = %request.url,
            selector = %request.selector,
            output = %request.output_path,
            "Taking screenshot"
        );

        let deadline = Instant::now() + self.deadline;

        let session = tokio::time::timeout_at(deadline, BrowserSession::launch(&self.options))
            .await
            .map_err(|_| CaptureError::Timeout(self.deadline))?
            .map_err(|e| CaptureError::Launch(format!("{:#}", e)))?;

        let outcome =
            tokio::time::timeout_at(deadline, capture_element(&session, &request, self.deadline))
                .await;
        session.close().await;

        let bytes = outcome.map_err(|_| CaptureError::Timeout(self.deadline))??;
        tracing::info!(output = %request.output_path, bytes, "Screenshot saved");
        Ok(ScreenshotResult::saved(request.output_path, bytes))
    }
}

async fn capture_element(
    session: &BrowserSession,
    request: &ScreenshotRequest,
    visible_timeout: Duration,
) -> Result<usize, CaptureError> {
    let page = session
        .open(&request.url)
        .await
        .map_err(|e| CaptureError::Navigation {
            url: request.url.clone(),
            detail: format!("{:#}", e),
        })?;

    let element = wait_for_visible(&page, &request.selector, visible_timeout)
        .await
        .map_err(|e| CaptureError::ElementNotVisible {
            selector: request.selector.clone(),
            detail: e.to_string(),
        })?;

    tokio::time::sleep(Duration::from_secs(request.wait_time)).await;

    let bytes = element
        .screenshot(format_for_path(&request.output_path))
        .await
        .map_err(|e| CaptureError::Screenshot(e.to_string()))?;

    write_output(Path::new(&request.output_path), &bytes).await?;
    Ok(bytes.len())
}

/// JPEG for `.jpg`/`.jpeg`, PNG for everything else.
pub fn format_for_path(path: &str) -> CaptureScreenshotFormat {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => CaptureScreenshotFormat::Jpeg,
        _ => CaptureScreenshotFormat::Png,
    }
}

/// Write the image, creating missing parent directories first.
pub async fn write_output(path: &Path, bytes: &[u8]) -> Result<(), CaptureError> {
    let write_err = |source| CaptureError::Write {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::write(path, bytes).await.map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_zero_values() {
        let req = ScreenshotRequest::new("http://localhost:3000").with_defaults(1700000000);
        assert_eq!(req.selector, "body");
        assert_eq!(req.output_path, "screenshot_1700000000.jpg");
        assert_eq!(req.wait_time, 3);
    }

    #[test]
    fn test_defaults_keep_explicit_values() {
        let req = ScreenshotRequest::new("http://x")
            .selector("#exportable")
            .output_path("/tmp/a.png")
            .wait_time(5)
            .with_defaults(1);
        assert_eq!(req.selector, "#exportable");
        assert_eq!(req.output_path, "/tmp/a.png");
        assert_eq!(req.wait_time, 5);
    }

    #[test]
    fn test_format_follows_extension() {
        assert_eq!(format_for_path("a.jpg"), CaptureScreenshotFormat::Jpeg);
        assert_eq!(format_for_path("/x/cover.JPEG"), CaptureScreenshotFormat::Jpeg);
        assert_eq!(format_for_path("/tmp/cover.png"), CaptureScreenshotFormat::Png);
        assert_eq!(format_for_path("noext"), CaptureScreenshotFormat::Png);
    }

    #[tokio::test]
    async fn test_write_output_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/cover.jpeg");
        write_output(&path, b"img").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"img");
    }

    #[tokio::test]
    async fn test_write_output_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let err = write_output(&blocker.join("child.png"), b"img")
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Write { .. }));
        assert!(err.to_string().contains("child.png"));
    }

    #[test]
    fn test_failed_result_carries_error_text() {
        let result = ScreenshotResult::failed(&CaptureError::Timeout(EXPORT_DEADLINE));
        assert!(!result.success);
        assert_eq!(result.error, "screenshot timed out after 30s");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("output_path").is_none());
    }
}
