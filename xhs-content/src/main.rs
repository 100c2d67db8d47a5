//! Xiaohongshu content service binary.
//!
//! Three modes:
//! - default: serve the MCP tools plus `/api/generate-and-publish` and `/api/status`
//! - `--scheduler`: run the workflow every day at 20:00 Beijing time
//! - `--run-once`: run the workflow now and exit

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use xhs_content_core::api::api_router;
use xhs_content_core::{Config, ConfigError, Orchestrator, Scheduler, Workflow};
use xhs_mcp_core::browser::{self, BrowserOptions};
use xhs_mcp_core::ServerMode;

#[derive(Parser)]
#[command(name = "xhs-content", about = "Xiaohongshu daily content service")]
struct Cli {
    /// Host to bind to
    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[clap(long, default_value = "18062")]
    port: u16,

    /// Run browsers headless (overrides the config file)
    #[clap(long, num_args = 0..=1, default_missing_value = "true")]
    headless: Option<bool>,

    /// Run the daily scheduler instead of the HTTP server
    #[clap(long, conflicts_with = "run_once")]
    scheduler: bool,

    /// Run the workflow once and exit
    #[clap(long)]
    run_once: bool,

    /// Image editor front-end used for covers [config default: http://localhost:3000]
    #[clap(long)]
    cover_base_url: Option<String>,

    /// Directory for generated covers [config default: the desktop]
    #[clap(long)]
    cover_dir: Option<PathBuf>,

    /// Path to config.json
    #[clap(long, default_value = "config.json")]
    config: PathBuf,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.cover_base_url {
            config.mcp.base_url = url.clone();
        }
        if let Some(dir) = &self.cover_dir {
            config.mcp.out_dir = dir.display().to_string();
        }
        if let Some(headless) = self.headless {
            config.mcp.headless = headless;
            config.xiaohongshu.headless = headless;
        }
    }

    fn server_args(&self) -> server_common::CliArgs {
        server_common::CliArgs {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config).map(|mut config| {
        cli.apply_overrides(&mut config);
        config
    });
    let log_level = loaded
        .as_ref()
        .map(|c| c.settings.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    server_common::init_logging(&log_level);

    if cli.run_once {
        run_once(loaded?).await
    } else if cli.scheduler {
        run_scheduler(loaded?).await
    } else {
        run_serve(&cli, loaded).await
    }
}

async fn run_once(config: Config) -> anyhow::Result<()> {
    let scheduler = Scheduler::new(Arc::new(Orchestrator::new(&config)));
    let result = scheduler.run_once().await.context("Workflow failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_scheduler(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        interval = %config.settings.post_interval,
        "Starting daily scheduler (20:00 Asia/Shanghai)"
    );

    let scheduler = Scheduler::new(Arc::new(Orchestrator::new(&config)));
    let token = scheduler.cancellation_token();
    tokio::spawn(async move {
        server_common::shutdown_signal().await;
        token.cancel();
    });

    scheduler.start().await;
    Ok(())
}

async fn run_serve(cli: &Cli, loaded: Result<Config, ConfigError>) -> anyhow::Result<()> {
    let headless = match &loaded {
        Ok(config) => config.xiaohongshu.headless,
        Err(_) => cli.headless.unwrap_or(true),
    };

    let workflow: Option<Arc<dyn Workflow>> = match loaded {
        Ok(config) => Some(Arc::new(Orchestrator::new(&config))),
        Err(e) => {
            tracing::warn!(error = %e, "Content generation disabled");
            None
        }
    };

    let options = BrowserOptions {
        headless,
        user_data_dir: browser::default_user_data_dir(),
        ..Default::default()
    };
    tracing::info!(
        headless,
        content_generation = workflow.is_some(),
        "Starting Xiaohongshu content server"
    );

    let dispatcher = xhs_mcp_core::build_dispatcher(options, ServerMode::Unified)
        .context("Invalid tool registry")?;
    let router =
        server_common::build_router(Arc::new(dispatcher)).merge(api_router(workflow));

    server_common::run_http(router, &cli.server_args()).await?;
    Ok(())
}
