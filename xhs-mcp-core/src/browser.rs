//! Browser launch helpers (Chrome DevTools Protocol via chromiumoxide).
//!
//! Every capture and platform action gets its own browser process: there is no
//! pooling, so a crashed page can never poison a later call. When a
//! `user_data_dir` is configured, Chrome persists cookies there so a manual
//! login (see `launch_for_login`) carries over to headless runs.

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How browsers are launched.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Custom Chrome/Edge binary path.
    pub browser_path: Option<String>,
    /// Run headless (default: true).
    pub headless: bool,
    /// Browser window size.
    pub window_size: (u32, u32),
    /// Chrome user-data-dir for session persistence.
    pub user_data_dir: Option<PathBuf>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            browser_path: None,
            headless: true,
            window_size: (1280, 900),
            user_data_dir: None,
        }
    }
}

/// OS-appropriate default for the persistent profile directory.
///
/// - macOS: `~/Library/Application Support/xhs-mcp/profile`
/// - Linux: `~/.local/share/xhs-mcp/profile`
pub fn default_user_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "xhs-mcp").map(|dirs| dirs.data_dir().join("profile"))
}

/// A launched browser plus the task pumping its CDP event stream.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch a fresh browser process.
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder();

        if let Some(ref path) = options.browser_path {
            builder = builder.chrome_executable(path);
        }

        if !options.headless {
            builder = builder.with_head();
        }

        builder = builder.window_size(options.window_size.0, options.window_size.1);

        if let Some(ref dir) = options.user_data_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create user data dir: {}", dir.display()))?;
            builder = builder.user_data_dir(dir);
        }

        builder = builder
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--ignore-certificate-errors")
            .arg("--allow-running-insecure-content")
            .arg("--remote-allow-origins=*");

        let config = builder.build().map_err(|e| anyhow::anyhow!("{}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Self { browser, handler })
    }

    /// Open a new tab at `url`.
    pub async fn open(&self, url: &str) -> Result<Page> {
        let page = self
            .browser
            .new_page(url)
            .await
            .with_context(|| format!("Failed to open {}", url))?;
        Ok(page)
    }

    /// Close the browser and stop the event pump. Errors are logged, not
    /// returned: by the time we close, the caller's outcome is already known.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!(error = %e, "Browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

/// Poll until `selector` resolves to an element with a non-empty layout box.
pub async fn wait_for_visible(page: &Page, selector: &str, timeout: Duration) -> Result<Element> {
    let start = Instant::now();

    loop {
        if let Ok(element) = page.find_element(selector).await {
            if let Ok(bbox) = element.bounding_box().await {
                if bbox.width > 0.0 && bbox.height > 0.0 {
                    return Ok(element);
                }
            }
        }

        if start.elapsed() >= timeout {
            anyhow::bail!(
                "Timeout waiting for '{}' to become visible after {}ms",
                selector,
                timeout.as_millis()
            );
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Poll a JavaScript expression until it evaluates to `true`.
pub async fn wait_for_condition(page: &Page, expression: &str, timeout: Duration) -> Result<()> {
    let start = Instant::now();

    loop {
        let ready = match page.evaluate(expression).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(_) => false,
        };
        if ready {
            return Ok(());
        }

        if start.elapsed() >= timeout {
            anyhow::bail!(
                "Timeout waiting for condition after {}ms: {}",
                timeout.as_millis(),
                expression
            );
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Launch a headed browser on `url` for a human to log in. The caller keeps
/// the session alive until the user is done, then closes it.
pub async fn launch_for_login(options: &BrowserOptions, url: &str) -> Result<BrowserSession> {
    let options = BrowserOptions {
        headless: false,
        ..options.clone()
    };
    let session = BrowserSession::launch(&options)
        .await
        .context("Failed to launch browser for login")?;

    let page = session.open(url).await.context("Failed to open login page")?;
    tracing::info!(%url, "Browser opened for login");

    // The tab stays attached to the browser; we only drop our handle.
    drop(page);

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_headless() {
        let options = BrowserOptions::default();
        assert!(options.headless);
        assert!(options.user_data_dir.is_none());
    }

    #[test]
    fn test_default_user_data_dir_is_under_project() {
        if let Some(dir) = default_user_data_dir() {
            assert!(dir.ends_with("profile"));
            assert!(dir.to_string_lossy().contains("xhs-mcp"));
        }
    }
}
