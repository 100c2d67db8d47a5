//! Latest posts from the park's official Weibo account.

use crate::config::WeiboConfig;
use crate::fetch::{http_client, FetchError, FETCH_TIMEOUT};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Posts fed to the summary prompt.
pub const SUMMARY_POSTS: usize = 2;

const SUMMARY_HEADER: &str = "以下是北京环球度假区官方微博最新动态，请总结其中的新闻和活动信息：\n\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeiboPost {
    pub id: String,
    pub text: String,
    pub created_at: String,
    pub user_name: String,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    ok: i64,
    #[serde(default)]
    data: TimelineData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimelineData {
    list: Vec<TimelineItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimelineItem {
    mblogid: String,
    created_at: String,
    text_raw: String,
    text: String,
    user: TimelineUser,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimelineUser {
    screen_name: String,
}

pub struct WeiboService {
    client: reqwest::Client,
    config: WeiboConfig,
}

impl WeiboService {
    pub fn new(config: WeiboConfig) -> Self {
        Self {
            client: http_client(FETCH_TIMEOUT),
            config,
        }
    }

    fn timeline_url(&self, page: u32) -> String {
        format!(
            "{}/ajax/statuses/mymblog?uid={}&page={}&feature=0",
            self.config.base_url.trim_end_matches('/'),
            self.config.uid,
            page
        )
    }

    /// Browser-like headers; the endpoint rejects bare clients.
    fn headers(&self) -> HeaderMap {
        let pairs: [(&'static str, String); 18] = [
            ("accept", "application/json, text/plain, */*".into()),
            (
                "accept-language",
                "en-US,en;q=0.9,zh-CN;q=0.8,zh;q=0.7,zh-TW;q=0.6".into(),
            ),
            ("cache-control", "no-cache".into()),
            ("client-version", "v2.47.106".into()),
            ("cookie", self.config.cookies.clone()),
            ("pragma", "no-cache".into()),
            ("priority", "u=1, i".into()),
            (
                "referer",
                format!("https://weibo.com/u/{}?is_all=1", self.config.uid),
            ),
            (
                "sec-ch-ua",
                r#""Not;A=Brand";v="99", "Google Chrome";v="139", "Chromium";v="139""#.into(),
            ),
            ("sec-ch-ua-mobile", "?0".into()),
            ("sec-ch-ua-platform", "\"macOS\"".into()),
            ("sec-fetch-dest", "empty".into()),
            ("sec-fetch-mode", "cors".into()),
            ("sec-fetch-site", "same-origin".into()),
            ("server-version", "v2025.09.05.1".into()),
            (
                "user-agent",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36".into(),
            ),
            ("x-requested-with", "XMLHttpRequest".into()),
            ("x-xsrf-token", self.config.token.clone()),
        ];

        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            if value.is_empty() {
                continue;
            }
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(name), value);
                }
                Err(_) => tracing::warn!(header = name, "Skipping header with invalid value"),
            }
        }
        headers
    }

    pub async fn latest_posts(&self, page: u32) -> Result<Vec<WeiboPost>, FetchError> {
        let url = self.timeline_url(page);
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                service: "weibo API",
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Decode {
            service: "weibo API",
            detail: e.to_string(),
        })?;
        let timeline: TimelineResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::debug!(error = %e, body = %body, "Unparseable weibo response");
            FetchError::Decode {
                service: "weibo API",
                detail: e.to_string(),
            }
        })?;

        if timeline.ok != 1 {
            return Err(FetchError::Api {
                service: "weibo API",
                detail: body,
            });
        }

        Ok(timeline
            .data
            .list
            .into_iter()
            .map(|item| {
                let mut text = clean_text(&item.text_raw);
                if text.is_empty() {
                    text = clean_text(&item.text);
                }
                WeiboPost {
                    id: item.mblogid,
                    text,
                    created_at: item.created_at,
                    user_name: item.user.screen_name,
                }
            })
            .collect())
    }

    /// Prompt-ready digest of the newest posts.
    pub async fn summary(&self) -> Result<String, FetchError> {
        let posts = self.latest_posts(1).await?;
        summarize(&posts)
    }
}

pub fn summarize(posts: &[WeiboPost]) -> Result<String, FetchError> {
    if posts.is_empty() {
        return Err(FetchError::Empty("no posts found"));
    }

    let mut out = String::from(SUMMARY_HEADER);
    for (i, post) in posts.iter().take(SUMMARY_POSTS).enumerate() {
        out.push_str(&format!(
            "{}. 发布时间：{}\n内容：{}\n\n",
            i + 1,
            post.created_at,
            clean_text(&post.text)
        ));
    }
    Ok(out)
}

fn tag_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").ok()).as_ref()
}

fn whitespace_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").ok()).as_ref()
}

/// Strip markup, collapse whitespace and drop the trailing 全文/展开 link text.
pub fn clean_text(text: &str) -> String {
    let mut out = text.to_string();
    if let Some(re) = tag_regex() {
        out = re.replace_all(&out, " ").into_owned();
    }
    if let Some(re) = whitespace_regex() {
        out = re.replace_all(&out, " ").into_owned();
    }

    let mut trimmed = out.trim();
    for suffix in ["全文", "展开"] {
        trimmed = trimmed.strip_suffix(suffix).unwrap_or(trimmed).trim_end();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(base_url: String) -> WeiboService {
        WeiboService::new(WeiboConfig {
            uid: "3937775216".into(),
            cookies: "SUB=abc".into(),
            token: "xsrf".into(),
            base_url,
        })
    }

    fn post(text: &str, created: &str) -> WeiboPost {
        WeiboPost {
            id: "id".into(),
            text: text.into(),
            created_at: created.into(),
            user_name: "北京环球度假区".into(),
        }
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(
            clean_text("万圣节<br />惊喜  <a href=\"x\">活动</a>\n开启 展开"),
            "万圣节 惊喜 活动 开启"
        );
        assert_eq!(clean_text("  "), "");
    }

    #[test]
    fn test_summarize_takes_two_posts() {
        let posts = vec![
            post("夜间巡游回归", "Wed Oct 14 18:00:00 +0800 2026"),
            post("哈利波特新店开业", "Tue Oct 13 10:00:00 +0800 2026"),
            post("不会出现", "Mon Oct 12 10:00:00 +0800 2026"),
        ];
        let summary = summarize(&posts).unwrap();
        assert!(summary.starts_with(SUMMARY_HEADER));
        assert!(summary.contains("1. 发布时间：Wed Oct 14 18:00:00 +0800 2026\n内容：夜间巡游回归\n\n"));
        assert!(summary.contains("2. 发布时间："));
        assert!(!summary.contains("不会出现"));
    }

    #[test]
    fn test_summarize_empty_is_error() {
        assert_eq!(summarize(&[]).unwrap_err().to_string(), "no posts found");
    }

    #[tokio::test]
    async fn test_latest_posts_sends_auth_and_cleans() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ajax/statuses/mymblog"))
            .and(query_param("uid", "3937775216"))
            .and(query_param("page", "1"))
            .and(header("x-xsrf-token", "xsrf"))
            .and(header("cookie", "SUB=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": 1,
                "data": {"list": [
                    {"mblogid": "P1", "created_at": "today", "text_raw": "", "text": "<b>烟花</b>秀 全文",
                     "user": {"screen_name": "北京环球度假区"}}
                ]}
            })))
            .mount(&server)
            .await;

        let posts = service(server.uri()).latest_posts(1).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "P1");
        assert_eq!(posts[0].text, "烟花 秀");
    }

    #[tokio::test]
    async fn test_not_ok_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 0})))
            .mount(&server)
            .await;

        let err = service(server.uri()).summary().await.unwrap_err();
        assert!(matches!(err, FetchError::Api { .. }));
    }
}
