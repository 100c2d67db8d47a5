//! Cover images through the `generate_xiaohongshu_cover` tool.

use crate::config::CoverConfig;
use crate::fetch::http_client;
use crate::mcp_client::{McpClient, McpClientError};
use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const COVER_TIMEOUT: Duration = Duration::from_secs(120);
pub const COVER_TOOL: &str = "generate_xiaohongshu_cover";

const FALLBACK_TEXT: &str = "Sample Text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResponse {
    pub image_path: String,
    pub prompt: String,
    pub cover_text: String,
    pub generated_at: DateTime<Local>,
}

#[derive(Debug, Deserialize)]
struct AssetsResponse {
    #[serde(default)]
    images: Vec<String>,
}

pub struct CoverClient {
    mcp: McpClient,
    assets_client: reqwest::Client,
    config: CoverConfig,
}

impl CoverClient {
    pub fn new(config: CoverConfig) -> Self {
        Self {
            mcp: McpClient::new(config.server_url.clone(), COVER_TIMEOUT),
            assets_client: http_client(COVER_TIMEOUT),
            config,
        }
    }

    pub async fn health(&self) -> Result<(), McpClientError> {
        self.mcp.health().await
    }

    /// Background images offered by the editor's `/api/assets`.
    pub async fn assets(&self) -> Result<Vec<String>, McpClientError> {
        let url = format!("{}/api/assets", self.config.base_url.trim_end_matches('/'));
        let response = self
            .assets_client
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

        let body: AssetsResponse = response
            .json()
            .await
            .map_err(|e| McpClientError::Decode(e.to_string()))?;
        Ok(body.images)
    }

    /// Render a cover over a random asset and write it to the output dir.
    pub async fn generate(
        &self,
        prompt: &str,
        cover_text: &str,
    ) -> Result<ImageResponse, McpClientError> {
        let cover_text = if cover_text.trim().is_empty() {
            FALLBACK_TEXT
        } else {
            cover_text
        };

        let assets = self.assets().await?;
        let image = assets
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| McpClientError::Decode("no assets available".into()))?;

        let now = Local::now();
        let output_path = output_path(Path::new(&self.config.out_dir), now);
        let arguments = cover_arguments(&self.config, &image, cover_text, &output_path);

        tracing::info!(%image, output = %output_path.display(), "Generating cover");
        self.mcp.call_tool(COVER_TOOL, arguments).await?;

        Ok(ImageResponse {
            image_path: output_path.display().to_string(),
            prompt: prompt.to_string(),
            cover_text: cover_text.to_string(),
            generated_at: now,
        })
    }
}

/// `<out_dir>/cover_YYYYmmdd_HHMMSS.jpeg`
pub fn output_path(out_dir: &Path, now: DateTime<Local>) -> PathBuf {
    out_dir.join(format!("cover_{}.jpeg", now.format("%Y%m%d_%H%M%S")))
}

/// House style for daily covers.
pub fn cover_arguments(config: &CoverConfig, image: &str, text: &str, output_path: &Path) -> Value {
    json!({
        "baseUrl": config.base_url,
        "selector": "#exportable",
        "image": image,
        "text": text,
        "output_path": output_path.display().to_string(),
        "headless": config.headless,
        "fontFamily": "Comic Sans MS",
        "fontSize": 48,
        "fontWeight": "bold",
        "color": "#0e0d0c",
        "backgroundColor": "#f4f750",
        "textShadow": "2px 2px 4px #000000",
        "border": "1px solidrgb(187, 23, 23)",
        "borderRadius": 32,
        "borderWidth": 2,
        "borderStyle": "dashed",
        "padding": 40,
        "scaleX": 1.0,
        "scaleY": 1.0,
        "skewX": -15.0,
        "skewY": 0.0,
        "opacity": 0.8,
        "overlayColor": "#443c3c",
        "x": 50,
        "y": 50
    })
}
