//! Shared HTTP plumbing for the fetchers and MCP clients.

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Timeout for the data fetchers.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },
    #[error("failed to decode {service} response: {detail}")]
    Decode {
        service: &'static str,
        detail: String,
    },
    #[error("{service} error: {detail}")]
    Api {
        service: &'static str,
        detail: String,
    },
    #[error("{0}")]
    Empty(&'static str),
}

/// A pooled client with an overall request timeout.
pub fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|_| Client::new())
}
