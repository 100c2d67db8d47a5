//! The daily workflow: check servers, gather, generate, cover, publish.

use crate::config::Config;
use crate::cover::{CoverClient, ImageResponse};
use crate::llm::{ContentRequest, DeepSeekClient, GeneratedContent, LlmError};
use crate::lunar::{LunarInfo, LunarService};
use crate::mcp_client::McpClientError;
use crate::traffic::{TrafficInfo, TrafficService};
use crate::visitor::{VisitorInfo, VisitorService};
use crate::weather::{WeatherInfo, WeatherService};
use crate::weibo::WeiboService;
use crate::xhs::{validate_post, PostError, PostRequest, PostResponse, PostValidationError, XhsClient};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const THEME: &str = "daily life sharing";
pub const IMAGE_PROMPT: &str =
    "cozy daily life scene, warm lighting, lifestyle photography, Beijing Universal Studios theme park";
pub const PUBLISH_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Connection test failed: {server} connection failed: {source}")]
    Connectivity {
        server: &'static str,
        #[source]
        source: McpClientError,
    },
    #[error("Content generation failed: {0}")]
    Generation(#[from] LlmError),
    #[error("Image generation failed: {0}")]
    Cover(#[source] McpClientError),
    #[error("Post validation failed: {0}")]
    Validation(#[from] PostValidationError),
    #[error("Posting failed: {0}")]
    Publish(#[from] PostError),
}

/// Everything one successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub weather_info: Option<WeatherInfo>,
    pub lunar_info: Option<LunarInfo>,
    pub traffic_info: Option<TrafficInfo>,
    pub visitor_info: Option<VisitorInfo>,
    pub weibo_content: String,
    pub generated_content: GeneratedContent,
    pub image_response: ImageResponse,
    pub post_response: PostResponse,
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Local>,
    pub success: bool,
}

/// What the scheduler and the HTTP API drive.
#[async_trait]
pub trait Workflow: Send + Sync {
    async fn run(&self) -> Result<WorkflowResult, WorkflowError>;

    /// Per-service health, keyed by service name.
    async fn service_status(&self) -> BTreeMap<String, String>;
}

#[derive(Default)]
struct Gathered {
    weather: Option<WeatherInfo>,
    lunar: Option<LunarInfo>,
    traffic: Option<TrafficInfo>,
    visitor: Option<VisitorInfo>,
    weibo: String,
}

pub struct Orchestrator {
    weather: WeatherService,
    lunar: LunarService,
    traffic: TrafficService,
    visitor: VisitorService,
    weibo: WeiboService,
    llm: DeepSeekClient,
    cover: CoverClient,
    xhs: XhsClient,
}

impl Orchestrator {
    pub fn new(config: &Config) -> Self {
        Self {
            weather: WeatherService::new(&config.weather_api),
            lunar: LunarService::new(config.lunar_api.base_url.clone()),
            traffic: TrafficService::new(config.traffic_api.city.clone()),
            visitor: VisitorService::new(),
            weibo: WeiboService::new(config.weibo.clone()),
            llm: DeepSeekClient::new(&config.deepseek_llm),
            cover: CoverClient::new(config.mcp.clone()),
            xhs: XhsClient::new(&config.xiaohongshu),
        }
    }

    /// Base delay between publish attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.xhs = self.xhs.with_retry_delay(delay);
        self
    }

    async fn check_connections(&self) -> Result<(), WorkflowError> {
        tracing::info!("Testing service connections");

        self.cover
            .health()
            .await
            .map_err(|e| WorkflowError::Connectivity {
                server: "MCP server",
                source: e,
            })?;
        tracing::info!("MCP server connection OK");

        self.xhs
            .health()
            .await
            .map_err(|e| WorkflowError::Connectivity {
                server: "Xiaohongshu MCP server",
                source: e,
            })?;
        tracing::info!("Xiaohongshu MCP server connection OK");

        Ok(())
    }

    /// Sequential and failure-tolerant: a fetcher error only leaves its
    /// slot empty.
    async fn gather(&self) -> Gathered {
        let mut gathered = Gathered::default();

        match self.weather.fetch().await {
            Ok(info) => {
                tracing::info!(weather = %info.formatted(), "Weather fetched");
                gathered.weather = Some(info);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to get weather info"),
        }

        match self.lunar.fetch().await {
            Ok(info) => {
                tracing::info!(lunar = %info.formatted(), "Lunar calendar fetched");
                gathered.lunar = Some(info);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to get lunar info"),
        }

        let traffic = self.traffic.fetch();
        tracing::info!(status = %traffic.overall_status, "Traffic report ready");
        gathered.traffic = Some(traffic);

        let visitor = self.visitor.fetch();
        tracing::info!(visitor = %visitor.formatted(), "Visitor estimate ready");
        gathered.visitor = Some(visitor);

        match self.weibo.summary().await {
            Ok(summary) => {
                tracing::info!("Got recent weibo content");
                gathered.weibo = summary;
            }
            Err(e) => tracing::warn!(error = %e, "Failed to get weibo summary content"),
        }

        gathered
    }
}

#[async_trait]
impl Workflow for Orchestrator {
    async fn run(&self) -> Result<WorkflowResult, WorkflowError> {
        let started = Instant::now();
        let timestamp = Local::now();
        tracing::info!("Starting content generation workflow");

        self.check_connections().await?;

        tracing::info!("Gathering information");
        let gathered = self.gather().await;

        tracing::info!("Generating content with DeepSeek");
        // Traffic stays out of the prompt.
        let request = ContentRequest {
            weather: gathered.weather.clone(),
            lunar: gathered.lunar.clone(),
            visitor: gathered.visitor.clone(),
            weibo: gathered.weibo.clone(),
            theme: THEME.to_string(),
        };
        let content = self.llm.generate(&request).await?;
        tracing::info!(title = %content.title, "Content generated");

        tracing::info!("Generating cover image");
        let image = self
            .cover
            .generate(IMAGE_PROMPT, &content.cover_text)
            .await
            .map_err(WorkflowError::Cover)?;
        tracing::info!(path = %image.image_path, "Cover image generated");

        let post = PostRequest {
            title: content.title.clone(),
            content: content.formatted_content(),
            images: vec![image.image_path.clone()],
        };
        validate_post(&post)?;

        tracing::info!("Posting to Xiaohongshu");
        let posted = self.xhs.post_with_retry(&post, PUBLISH_ATTEMPTS).await?;

        let elapsed = started.elapsed();
        tracing::info!(
            elapsed_ms = elapsed.as_millis() as u64,
            message = %posted.message,
            "Workflow completed successfully"
        );

        Ok(WorkflowResult {
            weather_info: gathered.weather,
            lunar_info: gathered.lunar,
            traffic_info: gathered.traffic,
            visitor_info: gathered.visitor,
            weibo_content: gathered.weibo,
            generated_content: content,
            image_response: image,
            post_response: posted,
            execution_time_ms: elapsed.as_millis() as u64,
            timestamp,
            success: true,
        })
    }

    async fn service_status(&self) -> BTreeMap<String, String> {
        fn describe<E: std::fmt::Display>(result: Result<(), E>) -> String {
            match result {
                Ok(()) => "✅ OK".to_string(),
                Err(e) => format!("❌ Error: {e}"),
            }
        }

        let mut status = BTreeMap::new();
        status.insert("mcp_server".to_string(), describe(self.cover.health().await));
        status.insert(
            "xiaohongshu_server".to_string(),
            describe(self.xhs.health().await),
        );
        status.insert(
            "weather_service".to_string(),
            describe(self.weather.fetch().await.map(|_| ())),
        );
        status.insert(
            "lunar_service".to_string(),
            describe(self.lunar.fetch().await.map(|_| ())),
        );
        // Computed locally.
        for local in ["traffic_service", "visitor_service"] {
            status.insert(local.to_string(), "✅ OK".to_string());
        }
        status
    }
}
