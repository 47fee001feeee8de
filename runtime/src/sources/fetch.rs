//! Text fetching seam.
//!
//! The pipeline never talks to the network directly; it goes through the
//! [`Fetch`] trait so hosts can substitute their own transport. The default
//! implementation is a thin `reqwest` wrapper issuing no-cache GETs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use tracing::debug;

/// Asynchronous text fetch used for documents, stylesheets, and scripts.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url` as text. `app_name` is carried for log correlation only.
    async fn fetch_text(&self, url: &str, app_name: &str) -> Result<String>;
}

/// Default HTTP fetcher.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Fetcher with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetcher reusing an existing client (connection pool sharing).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch_text(&self, url: &str, app_name: &str) -> Result<String> {
        debug!(app = app_name, "fetching {url}");
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .with_context(|| format!("requesting {url}"))?;
        response
            .text()
            .await
            .with_context(|| format!("reading body of {url}"))
    }
}
