//! Daily content pipeline for the Xiaohongshu account.
//!
//! Gathers context (weather, lunar calendar, traffic, visitor numbers, the
//! park's latest Weibo posts), asks DeepSeek for a post, renders a cover
//! through the cover MCP tool and publishes through the platform MCP tool.
//!
//! - [`config`]: `config.json` + environment overlay
//! - [`weather`], [`lunar`], [`traffic`], [`visitor`], [`weibo`]: fetchers
//! - [`llm`]: DeepSeek chat-completions client
//! - [`mcp_client`], [`cover`], [`xhs`]: JSON-RPC clients for the MCP tools
//! - [`orchestrator`]: the six-step workflow
//! - [`scheduler`]: daily 20:00 Asia/Shanghai trigger
//! - [`api`]: `/api/generate-and-publish` and `/api/status`

pub mod api;
pub mod config;
pub mod cover;
pub mod fetch;
pub mod llm;
pub mod lunar;
pub mod mcp_client;
pub mod orchestrator;
pub mod scheduler;
pub mod traffic;
pub mod visitor;
pub mod weather;
pub mod weibo;
pub mod xhs;

pub use config::{Config, ConfigError};
pub use orchestrator::{Orchestrator, Workflow, WorkflowError, WorkflowResult};
pub use scheduler::Scheduler;
