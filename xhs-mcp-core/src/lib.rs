//! Xiaohongshu MCP server core library.
//!
//! Provides `build_dispatcher()` which wires the browser-backed capturer and
//! platform into a ready-to-serve MCP `Dispatcher`.

pub mod browser;
pub mod capture;
pub mod export;
pub mod platform;
pub mod tools;
pub mod xiaohongshu;

use browser::BrowserOptions;
use capture::BrowserCapturer;
use server_common::{Dispatcher, RegistryError, ServerInfo};
use std::sync::Arc;
use xiaohongshu::BrowserPlatform;

pub const UNIFIED_SERVER_NAME: &str = "xiaohongshu-unified-mcp";
pub const COVER_SERVER_NAME: &str = "xiaohongshu-cover-mcp";
pub const SERVER_VERSION: &str = "v1.0.0";

/// Which tool set a server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// Cover generation plus the four platform tools.
    #[default]
    Unified,
    /// Cover generation only.
    CoverOnly,
}

/// Cover captures never touch the login profile, so they can run next to
/// each other and next to platform calls.
fn capture_options(options: &BrowserOptions) -> BrowserOptions {
    BrowserOptions {
        user_data_dir: None,
        ..options.clone()
    }
}

/// Build a dispatcher backed by real browsers.
pub fn build_dispatcher(
    options: BrowserOptions,
    mode: ServerMode,
) -> Result<Dispatcher, RegistryError> {
    let capturer = Arc::new(BrowserCapturer::new(capture_options(&options)));

    match mode {
        ServerMode::Unified => {
            let platform = Arc::new(BrowserPlatform::new(options));
            let registry = tools::unified_registry(capturer, platform)?;
            Ok(Dispatcher::new(
                ServerInfo::new(UNIFIED_SERVER_NAME, SERVER_VERSION),
                registry,
            ))
        }
        ServerMode::CoverOnly => {
            let registry = tools::cover_registry(capturer)?;
            Ok(Dispatcher::new(
                ServerInfo::new(COVER_SERVER_NAME, SERVER_VERSION),
                registry,
            ))
        }
    }
}
