//! Xiaohongshu MCP Server binary.
//!
//! Provides three subcommands:
//! - `serve` (default): Start the MCP server over HTTP
//! - `setup-login`: Open a browser for manual login, persisted in the profile dir
//! - `export`: Render the cover editor once and save the image

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use xhs_mcp_core::browser::{self, BrowserOptions};
use xhs_mcp_core::capture::{BrowserCapturer, Capturer, ScreenshotResult, EXPORT_DEADLINE};
use xhs_mcp_core::export::ExportOptions;
use xhs_mcp_core::xiaohongshu::EXPLORE_URL;
use xhs_mcp_core::ServerMode;

#[derive(Parser)]
#[command(name = "xhs-mcp-server", about = "Xiaohongshu MCP Server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (default when no subcommand given)
    Serve(ServeArgs),

    /// Open browser for manual login, save the session for reuse
    SetupLogin(SetupLoginArgs),

    /// Render the cover editor once and save a screenshot
    Export(ExportArgs),
}

#[derive(Parser)]
struct BrowserArgs {
    /// Custom Chrome/Edge binary path
    #[clap(long)]
    browser_path: Option<String>,

    /// Chrome user-data-dir holding the login session
    #[clap(long)]
    user_data_dir: Option<PathBuf>,
}

impl BrowserArgs {
    fn options(self, headless: bool) -> BrowserOptions {
        BrowserOptions {
            browser_path: self.browser_path,
            headless,
            user_data_dir: self.user_data_dir.or_else(browser::default_user_data_dir),
            ..Default::default()
        }
    }
}

#[derive(Parser)]
struct ServeArgs {
    #[clap(flatten)]
    server: server_common::CliArgs,

    #[clap(flatten)]
    browser: BrowserArgs,

    /// Run browser in headless mode
    #[clap(long, default_value_t = true, action = clap::ArgAction::Set)]
    headless: bool,

    /// Serve only the cover generation tool
    #[clap(long)]
    cover_only: bool,
}

#[derive(Parser)]
struct SetupLoginArgs {
    #[clap(flatten)]
    browser: BrowserArgs,

    /// URL to navigate to for login
    #[clap(long, default_value = EXPLORE_URL)]
    url: String,

    /// Timeout in seconds to wait for user to complete login
    #[clap(long, default_value = "300")]
    timeout_secs: u64,
}

#[derive(Parser)]
struct ExportArgs {
    /// Address of the cover editor front-end
    #[clap(long, default_value = "http://localhost:3000")]
    addr: String,

    /// Text to display on the image (defaults to the sample visitor banner)
    #[clap(long)]
    text: Option<String>,

    /// Background image path
    #[clap(long, default_value = "/assets/6.jpg")]
    image: String,

    /// Output file path and name (.jpg)
    #[clap(long, default_value = "untitled.jpg")]
    output: String,

    /// Custom Chrome/Edge binary path
    #[clap(long)]
    browser_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server_common::init_logging("info");

    let cli = Cli::parse();

    match cli.command {
        None => run_serve(ServeArgs::parse_from(["xhs-mcp-server", "serve"])).await,
        Some(Command::Serve(args)) => run_serve(args).await,
        Some(Command::SetupLogin(args)) => run_setup_login(args).await,
        Some(Command::Export(args)) => run_export(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mode = if args.cover_only {
        ServerMode::CoverOnly
    } else {
        ServerMode::Unified
    };
    let options = args.browser.options(args.headless);

    tracing::info!(
        ?mode,
        headless = options.headless,
        user_data_dir = ?options.user_data_dir,
        "Starting Xiaohongshu MCP server"
    );

    let dispatcher =
        xhs_mcp_core::build_dispatcher(options, mode).context("Invalid tool registry")?;
    let router = server_common::build_router(Arc::new(dispatcher));

    server_common::run_http(router, &args.server).await?;
    Ok(())
}

async fn run_setup_login(args: SetupLoginArgs) -> anyhow::Result<()> {
    let options = args.browser.options(false);

    tracing::info!(
        url = %args.url,
        user_data_dir = ?options.user_data_dir,
        "Launching browser for manual login"
    );

    let session = browser::launch_for_login(&options, &args.url).await?;

    println!();
    println!("Browser opened at: {}", args.url);
    println!(
        "Please log in. Press Enter when done (or wait {}s)...",
        args.timeout_secs
    );
    println!();

    // Wait for user input or timeout
    let timeout = tokio::time::Duration::from_secs(args.timeout_secs);
    let stdin_future = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)
    });

    tokio::select! {
        _ = stdin_future => {}
        _ = tokio::time::sleep(timeout) => {
            println!("Timeout reached.");
        }
    }

    session.close().await;

    println!();
    match &options.user_data_dir {
        Some(dir) => println!("Session saved in {}", dir.display()),
        None => println!("No user data dir configured; the session was not persisted."),
    }

    Ok(())
}

async fn run_export(args: ExportArgs) -> anyhow::Result<()> {
    let mut export = ExportOptions {
        addr: args.addr,
        image: args.image,
        output: args.output,
        ..Default::default()
    };
    if let Some(text) = args.text {
        export.text = text;
    }

    println!("{}", export.url());

    let capturer = BrowserCapturer::new(BrowserOptions {
        browser_path: args.browser_path,
        ..Default::default()
    })
    .with_deadline(EXPORT_DEADLINE);

    match capturer.capture(export.to_request()).await {
        Ok(result) => {
            println!("Screenshot saved as {}", result.output_path);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&ScreenshotResult::failed(&e))?);
            Err(e).context("Export failed")
        }
    }
}
