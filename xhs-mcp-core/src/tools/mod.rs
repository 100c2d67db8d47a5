//! The MCP tool catalog.
//!
//! Each tool is a `ToolHandler` holding the backend it drives: the
//! screenshot `Capturer` for covers, the `Platform` for everything else.

pub mod check_login_status;
pub mod generate_cover;
pub mod list_feeds;
pub mod publish_content;
pub mod search_feeds;

use crate::capture::Capturer;
use crate::platform::Platform;
use server_common::{RegistryError, ToolRegistry};
use std::sync::Arc;

/// Tool names of the unified server, in `tools/list` order.
pub const UNIFIED_TOOLS: [&str; 5] = [
    generate_cover::NAME,
    check_login_status::NAME,
    publish_content::NAME,
    list_feeds::NAME,
    search_feeds::NAME,
];

/// All five tools.
pub fn unified_registry(
    capturer: Arc<dyn Capturer>,
    platform: Arc<dyn Platform>,
) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::builder()
        .tool(Arc::new(generate_cover::GenerateCoverTool::new(
            capturer,
            generate_cover::Catalog::Unified,
        )))
        .tool(Arc::new(check_login_status::CheckLoginStatusTool::new(
            platform.clone(),
        )))
        .tool(Arc::new(publish_content::PublishContentTool::new(
            platform.clone(),
        )))
        .tool(Arc::new(list_feeds::ListFeedsTool::new(platform.clone())))
        .tool(Arc::new(search_feeds::SearchFeedsTool::new(platform)))
        .expect_exactly(UNIFIED_TOOLS)
        .build()
}

/// Only the cover tool, with its fully documented descriptor.
pub fn cover_registry(capturer: Arc<dyn Capturer>) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::builder()
        .tool(Arc::new(generate_cover::GenerateCoverTool::new(
            capturer,
            generate_cover::Catalog::CoverOnly,
        )))
        .expect_exactly([generate_cover::NAME])
        .build()
}
