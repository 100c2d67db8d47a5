//! Shared MCP plumbing for the servers in this workspace.
//!
//! - [`jsonrpc`]: JSON-RPC 2.0 envelopes and tool-call payloads
//! - [`dispatch`]: the tool registry and method dispatcher
//! - [`router`]: the axum transport (`/mcp`, `/`, `/health`)
//!
//! Binary servers build a `Dispatcher`, turn it into a router and call
//! `run_http()`.

pub mod dispatch;
pub mod jsonrpc;
pub mod router;

pub use dispatch::{
    Dispatcher, RegistryError, Reply, ServerInfo, ToolDescriptor, ToolError, ToolHandler,
    ToolRegistry,
};
pub use jsonrpc::{Content, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolCall, ToolResult};
pub use router::{build_router, with_http_layers};

use axum::Router;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// CLI arguments shared across all MCP servers.
#[derive(Debug, Clone, clap::Args)]
pub struct CliArgs {
    /// Host to bind to
    #[clap(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind to
    #[clap(long, default_value = "18060")]
    pub port: u16,
}

#[derive(Debug, Error)]
pub enum HttpServerError {
    #[error("invalid listen address '{addr}': {source}")]
    Address {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("failed to bind on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Serve a router over HTTP until Ctrl+C / SIGTERM, then drain in-flight
/// requests and return.
pub async fn run_http(router: Router, args: &CliArgs) -> Result<(), HttpServerError> {
    let addr_str = format!("{}:{}", args.host, args.port);
    let addr: SocketAddr = addr_str.parse().map_err(|e| HttpServerError::Address {
        addr: addr_str.clone(),
        source: e,
    })?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| HttpServerError::Bind {
            addr: addr_str,
            source: e,
        })?;

    tracing::info!(host = %args.host, port = args.port, "MCP server listening on http://{}/mcp", addr);

    axum::serve(listener, with_http_layers(router))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_logging(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // A second call (e.g. from tests) is a no-op.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_args_defaults() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[clap(flatten)]
            server: CliArgs,
        }

        let cli = TestCli::parse_from(["test"]);
        assert_eq!(cli.server.host, "127.0.0.1");
        assert_eq!(cli.server.port, 18060);
    }

    #[test]
    fn test_cli_args_custom() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[clap(flatten)]
            server: CliArgs,
        }

        let cli = TestCli::parse_from(["test", "--host", "0.0.0.0", "--port", "18061"]);
        assert_eq!(cli.server.host, "0.0.0.0");
        assert_eq!(cli.server.port, 18061);
    }

    #[tokio::test]
    async fn test_run_http_rejects_bad_host() {
        let args = CliArgs {
            host: "not a host".into(),
            port: 1,
        };
        let err = run_http(Router::new(), &args).await.unwrap_err();
        assert!(matches!(err, HttpServerError::Address { .. }));
    }
}
