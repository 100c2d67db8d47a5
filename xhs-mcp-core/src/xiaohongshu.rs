//! Browser-backed Xiaohongshu automation.
//!
//! Each operation launches its own browser (sharing the configured
//! user-data-dir for the login session), drives the web app and closes the
//! browser on every exit path. Feed data is read from the page's
//! `window.__INITIAL_STATE__` store rather than scraped from the DOM.

use crate::browser::{wait_for_condition, wait_for_visible, BrowserOptions, BrowserSession};
use crate::platform::{
    Feed, FeedsListResponse, LoginStatus, Platform, PlatformError, PublishRequest,
    PublishResponse, SearchResponse,
};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::Page;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

pub const EXPLORE_URL: &str = "https://www.xiaohongshu.com/explore";
pub const PUBLISH_URL: &str = "https://creator.xiaohongshu.com/publish/publish?source=official";
const SEARCH_URL: &str = "https://www.xiaohongshu.com/search_result";
const NOTE_URL_PREFIX: &str = "https://www.xiaohongshu.com/explore/";

const LOGGED_IN_SELECTOR: &str = ".main-container .user .link-wrapper .channel";
const UPLOAD_INPUT_SELECTOR: &str = ".upload-input";
const IMAGE_PREVIEW_SELECTOR: &str = ".img-preview-area .pr";
const TITLE_SELECTOR: &str = "div.d-input input";
const BODY_SELECTOR: &str = "div.ql-editor";
const SUBMIT_SELECTOR: &str = "div.submit div.d-button-content";
const CREATOR_TAB_SELECTOR: &str = "div.creator-tab";
const IMAGE_TAB_LABEL: &str = "上传图文";

const STATE_READY: &str = "typeof window.__INITIAL_STATE__ !== 'undefined'";
const FEEDS_STATE: &str = "window.__INITIAL_STATE__.feed.feeds";
const SEARCH_STATE: &str = "window.__INITIAL_STATE__.search.feeds";
const NICKNAME_STATE: &str = "window.__INITIAL_STATE__.user.userInfo";

const OPERATION_DEADLINE: Duration = Duration::from_secs(60);
const PUBLISH_DEADLINE: Duration = Duration::from_secs(180);
const ELEMENT_TIMEOUT: Duration = Duration::from_secs(15);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const LOGIN_PROBE: Duration = Duration::from_secs(5);

/// Xiaohongshu driven through a real browser.
#[derive(Debug, Clone)]
pub struct BrowserPlatform {
    options: BrowserOptions,
}

impl BrowserPlatform {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    /// Launch a browser, open `url`, run `action`, close. `deadline` covers
    /// the launch too.
    async fn with_page<T, F, Fut>(
        &self,
        operation: &'static str,
        url: &str,
        deadline: Duration,
        action: F,
    ) -> Result<T, PlatformError>
    where
        F: FnOnce(Page) -> Fut,
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        let deadline_at = tokio::time::Instant::now() + deadline;
        let timed_out = || PlatformError::Timeout {
            operation,
            seconds: deadline.as_secs(),
        };

        let session = tokio::time::timeout_at(deadline_at, BrowserSession::launch(&self.options))
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| PlatformError::Browser(format!("{:#}", e)))?;

        let outcome = tokio::time::timeout_at(deadline_at, async {
            let page = session
                .open(url)
                .await
                .map_err(|e| PlatformError::Browser(format!("{:#}", e)))?;
            action(page).await
        })
        .await;

        session.close().await;

        outcome.map_err(|_| timed_out())?
    }
}

#[async_trait]
impl Platform for BrowserPlatform {
    async fn check_login_status(&self) -> Result<LoginStatus, PlatformError> {
        tracing::info!("Checking Xiaohongshu login status");

        self.with_page("login check", EXPLORE_URL, OPERATION_DEADLINE, |page| async move {
            let is_logged_in = wait_for_visible(&page, LOGGED_IN_SELECTOR, LOGIN_PROBE)
                .await
                .is_ok();
            let username = if is_logged_in {
                read_nickname(&page).await
            } else {
                None
            };
            Ok(LoginStatus {
                is_logged_in,
                username,
            })
        })
        .await
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResponse, PlatformError> {
        tracing::info!(title = %request.title, images = request.images.len(), "Publishing content");

        let request = request.clone();
        self.with_page("publish", PUBLISH_URL, PUBLISH_DEADLINE, |page| async move {
            select_image_tab(&page).await?;
            upload_images(&page, &request.images).await?;
            fill(&page, TITLE_SELECTOR, &request.title).await?;
            fill(&page, BODY_SELECTOR, &request.content).await?;

            let submit = find(&page, SUBMIT_SELECTOR).await?;
            submit.click().await.map_err(|e| PlatformError::Element {
                selector: SUBMIT_SELECTOR.into(),
                detail: e.to_string(),
            })?;
            tokio::time::sleep(Duration::from_secs(3)).await;

            Ok(PublishResponse {
                title: request.title,
                content: request.content,
                images: request.images.len(),
                status: "published".into(),
                post_id: None,
            })
        })
        .await
    }

    async fn list_feeds(&self) -> Result<FeedsListResponse, PlatformError> {
        tracing::info!("Listing Xiaohongshu feeds");

        self.with_page("list feeds", EXPLORE_URL, OPERATION_DEADLINE, |page| async move {
            let feeds = read_feed_state(&page, FEEDS_STATE).await?;
            Ok(FeedsListResponse::new(feeds))
        })
        .await
    }

    async fn search_feeds(&self, keyword: &str) -> Result<SearchResponse, PlatformError> {
        tracing::info!(%keyword, "Searching Xiaohongshu feeds");

        let url = search_url(keyword);
        let keyword = keyword.to_string();
        self.with_page("search feeds", &url, OPERATION_DEADLINE, |page| async move {
            let results = read_feed_state(&page, SEARCH_STATE).await?;
            Ok(SearchResponse::new(keyword, results))
        })
        .await
    }
}

pub fn search_url(keyword: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("keyword", keyword)
        .append_pair("source", "web_explore_feed")
        .finish();
    format!("{}?{}", SEARCH_URL, query)
}

async fn find(page: &Page, selector: &str) -> Result<chromiumoxide::Element, PlatformError> {
    wait_for_visible(page, selector, ELEMENT_TIMEOUT)
        .await
        .map_err(|e| PlatformError::Element {
            selector: selector.into(),
            detail: e.to_string(),
        })
}

async fn fill(page: &Page, selector: &str, text: &str) -> Result<(), PlatformError> {
    let element = find(page, selector).await?;
    let element_err = |e: chromiumoxide::error::CdpError| PlatformError::Element {
        selector: selector.into(),
        detail: e.to_string(),
    };
    element.click().await.map_err(element_err)?;
    element.type_str(text).await.map_err(element_err)?;
    Ok(())
}

async fn select_image_tab(page: &Page) -> Result<(), PlatformError> {
    find(page, CREATOR_TAB_SELECTOR).await?;
    let tabs = page
        .find_elements(CREATOR_TAB_SELECTOR)
        .await
        .map_err(|e| PlatformError::Browser(e.to_string()))?;

    for tab in tabs {
        if let Ok(Some(label)) = tab.inner_text().await {
            if label.contains(IMAGE_TAB_LABEL) {
                tab.click()
                    .await
                    .map_err(|e| PlatformError::Browser(e.to_string()))?;
                tokio::time::sleep(Duration::from_secs(1)).await;
                return Ok(());
            }
        }
    }

    Err(PlatformError::Element {
        selector: CREATOR_TAB_SELECTOR.into(),
        detail: format!("no tab labelled {}", IMAGE_TAB_LABEL),
    })
}

async fn upload_images(page: &Page, images: &[String]) -> Result<(), PlatformError> {
    for path in images {
        if !std::path::Path::new(path).exists() {
            return Err(PlatformError::Upload(format!("image not found: {}", path)));
        }
    }

    let input = page
        .find_element(UPLOAD_INPUT_SELECTOR)
        .await
        .map_err(|e| PlatformError::Element {
            selector: UPLOAD_INPUT_SELECTOR.into(),
            detail: e.to_string(),
        })?;

    let params = SetFileInputFilesParams::builder()
        .files(images.to_vec())
        .backend_node_id(input.backend_node_id)
        .build()
        .map_err(PlatformError::Upload)?;
    page.execute(params)
        .await
        .map_err(|e| PlatformError::Upload(e.to_string()))?;

    let uploaded = format!(
        "document.querySelectorAll('{}').length >= {}",
        IMAGE_PREVIEW_SELECTOR,
        images.len()
    );
    wait_for_condition(page, &uploaded, UPLOAD_TIMEOUT)
        .await
        .map_err(|e| PlatformError::Upload(e.to_string()))
}

async fn read_nickname(page: &Page) -> Option<String> {
    let expression = format!(
        "(() => {{ try {{ const u = {s}; const v = u._value || u.value || u; return v.nickname || ''; }} catch (e) {{ return ''; }} }})()",
        s = NICKNAME_STATE
    );
    let nickname: String = page.evaluate(expression).await.ok()?.into_value().ok()?;
    (!nickname.is_empty()).then_some(nickname)
}

async fn read_feed_state(page: &Page, state_path: &str) -> Result<Vec<Feed>, PlatformError> {
    wait_for_condition(page, STATE_READY, ELEMENT_TIMEOUT)
        .await
        .map_err(|e| PlatformError::PageState(e.to_string()))?;

    // Feeds live in a Vue ref; serialise inside the page to unwrap it.
    let expression = format!(
        "(() => {{ const f = {s}; return JSON.stringify((f && (f._value || f.value)) || f || []); }})()",
        s = state_path
    );
    let raw: String = page
        .evaluate(expression)
        .await
        .map_err(|e| PlatformError::PageState(e.to_string()))?
        .into_value()
        .map_err(|e| PlatformError::PageState(e.to_string()))?;

    parse_feeds(&raw)
}

#[derive(Debug, Deserialize)]
struct RawFeed {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "noteCard")]
    note_card: RawNoteCard,
}

#[derive(Debug, Default, Deserialize)]
struct RawNoteCard {
    #[serde(default, rename = "displayTitle")]
    display_title: String,
    #[serde(default)]
    user: RawUser,
    #[serde(default, rename = "interactInfo")]
    interact_info: RawInteract,
}

#[derive(Debug, Default, Deserialize)]
struct RawUser {
    #[serde(default)]
    nickname: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawInteract {
    #[serde(default, rename = "likedCount")]
    liked_count: serde_json::Value,
    #[serde(default, rename = "commentCount")]
    comment_count: serde_json::Value,
}

/// Map the page's feed store into flat `Feed`s. Entries without an id
/// (ads, placeholders) are dropped.
pub fn parse_feeds(raw: &str) -> Result<Vec<Feed>, PlatformError> {
    let entries: Vec<RawFeed> =
        serde_json::from_str(raw).map_err(|e| PlatformError::PageState(e.to_string()))?;

    Ok(entries
        .into_iter()
        .filter(|f| !f.id.is_empty())
        .map(|f| Feed {
            url: format!("{}{}", NOTE_URL_PREFIX, f.id),
            title: f.note_card.display_title.clone(),
            content: f.note_card.display_title,
            author: f.note_card.user.nickname,
            likes: count(&f.note_card.interact_info.liked_count),
            comments: count(&f.note_card.interact_info.comment_count),
            id: f.id,
        })
        .collect())
}

/// Counts arrive as numbers or strings, strings possibly abbreviated
/// ("1.2万", "10万+"). Anything unparseable is 0.
fn count(value: &serde_json::Value) -> u64 {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        serde_json::Value::String(s) => parse_count(s),
        _ => 0,
    }
}

fn parse_count(text: &str) -> u64 {
    let text = text.trim().trim_end_matches('+');
    let (digits, scale) = match text.strip_suffix('万') {
        Some(digits) => (digits, 10_000.0),
        None => (text, 1.0),
    };
    digits
        .trim()
        .parse::<f64>()
        .map(|n| (n * scale).round().max(0.0) as u64)
        .unwrap_or(0)
}
