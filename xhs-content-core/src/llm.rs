//! DeepSeek chat-completions client that writes the post.

use crate::config::DeepSeekConfig;
use crate::fetch::http_client;
use crate::lunar::LunarInfo;
use crate::visitor::VisitorInfo;
use crate::weather::WeatherInfo;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const LLM_TIMEOUT: Duration = Duration::from_secs(120);

const SYSTEM_PROMPT: &str = "你是一位擅长写小红书笔记的生活方式博主，熟悉北京环球度假区。\
请只输出一个 JSON 对象，字段为 title（不超过20字）、content（不超过600字，口语化，可带 emoji）、\
tags（3到6个话题词，不带 # 号）、cover_text（不超过12字的封面文字）。";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("DeepSeek request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("DeepSeek returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("DeepSeek returned no choices")]
    EmptyReply,
    #[error("failed to parse generated content: {0}")]
    InvalidContent(String),
}

/// Whatever context the gather step managed to collect.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentRequest {
    pub weather: Option<WeatherInfo>,
    pub lunar: Option<LunarInfo>,
    pub visitor: Option<VisitorInfo>,
    pub weibo: String,
    pub theme: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cover_text: String,
}

impl GeneratedContent {
    /// Body text followed by the tags as hashtags.
    pub fn formatted_content(&self) -> String {
        let tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim().trim_start_matches('#'))
            .filter(|t| !t.is_empty())
            .map(|t| format!("#{t}"))
            .collect();
        if tags.is_empty() {
            self.content.clone()
        } else {
            format!("{}\n\n{}", self.content, tags.join(" "))
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct DeepSeekClient {
    client: reqwest::Client,
    auth_header: String,
    endpoint: String,
    model: String,
}

impl DeepSeekClient {
    pub fn new(config: &DeepSeekConfig) -> Self {
        Self {
            client: http_client(LLM_TIMEOUT),
            auth_header: format!("Bearer {}", config.api_key),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        }
    }

    pub async fn generate(&self, request: &ContentRequest) -> Result<GeneratedContent, LlmError> {
        let prompt = build_prompt(request);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.8,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Requesting completion");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.auth_header)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyReply)?;

        parse_generated(&text)
    }
}

/// User prompt built from the sections that are present.
pub fn build_prompt(request: &ContentRequest) -> String {
    let mut sections = Vec::new();
    if let Some(weather) = &request.weather {
        sections.push(weather.formatted());
    }
    if let Some(lunar) = &request.lunar {
        sections.push(lunar.formatted());
    }
    if let Some(visitor) = &request.visitor {
        sections.push(visitor.formatted());
    }
    if !request.weibo.is_empty() {
        sections.push(request.weibo.trim_end().to_string());
    }

    let mut prompt = format!("主题：{}\n\n", request.theme);
    if sections.is_empty() {
        prompt.push_str("今天没有额外的参考信息，请围绕主题自由发挥。\n");
    } else {
        prompt.push_str("今日参考信息：\n");
        for section in sections {
            prompt.push_str(&section);
            prompt.push_str("\n\n");
        }
    }
    prompt.push_str("请结合以上信息写一篇北京环球度假区的小红书笔记。");
    prompt
}

/// Decode the model's JSON reply, tolerating a surrounding code fence.
pub fn parse_generated(text: &str) -> Result<GeneratedContent, LlmError> {
    let trimmed = text.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let content: GeneratedContent =
        serde_json::from_str(json).map_err(|e| LlmError::InvalidContent(e.to_string()))?;
    if content.title.trim().is_empty() || content.content.trim().is_empty() {
        return Err(LlmError::InvalidContent(
            "title and content must not be empty".into(),
        ));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> DeepSeekConfig {
        DeepSeekConfig {
            api_key: "sk-test".into(),
            base_url,
            model: "deepseek-chat".into(),
        }
    }

    fn request() -> ContentRequest {
        ContentRequest {
            weibo: "1. 发布时间：今天\n内容：烟花秀\n\n".into(),
            theme: "daily life sharing".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_formatted_content_appends_tags() {
        let content = GeneratedContent {
            title: "t".into(),
            content: "正文".into(),
            tags: vec!["环球影城".into(), "#北京周末".into(), " ".into()],
            cover_text: String::new(),
        };
        assert_eq!(content.formatted_content(), "正文\n\n#环球影城 #北京周末");
    }

    #[test]
    fn test_build_prompt_skips_missing_sections() {
        let prompt = build_prompt(&request());
        assert!(prompt.starts_with("主题：daily life sharing\n\n今日参考信息：\n"));
        assert!(prompt.contains("内容：烟花秀"));
        assert!(!prompt.contains("🌤️"));

        let bare = build_prompt(&ContentRequest {
            theme: "x".into(),
            ..Default::default()
        });
        assert!(bare.contains("没有额外的参考信息"));
    }

    #[test]
    fn test_parse_generated_with_fence() {
        let text = "```json\n{\"title\":\"周末\",\"content\":\"好玩\",\"tags\":[\"a\"],\"cover_text\":\"冲\"}\n```";
        let content = parse_generated(text).unwrap();
        assert_eq!(content.title, "周末");
        assert_eq!(content.cover_text, "冲");
    }

    #[test]
    fn test_parse_generated_rejects_blank_title() {
        let err = parse_generated(r#"{"title":"","content":"x"}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidContent(_)));
    }

    #[tokio::test]
    async fn test_generate_calls_chat_completions() {
        let server = MockServer::start().await;
        let reply = json!({"title": "环球夜游", "content": "灯光超美", "tags": ["环球影城"], "cover_text": "夜游攻略"});
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "deepseek-chat",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": reply.to_string()}}]
            })))
            .mount(&server)
            .await;

        let client = DeepSeekClient::new(&config(server.uri()));
        let content = client.generate(&request()).await.unwrap();
        assert_eq!(content.title, "环球夜游");
        assert_eq!(content.formatted_content(), "灯光超美\n\n#环球影城");
    }

    #[tokio::test]
    async fn test_generate_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = DeepSeekClient::new(&config(server.uri()))
            .generate(&request())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "DeepSeek returned status 401: bad key");
    }
}
