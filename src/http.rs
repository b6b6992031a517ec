//! HTTP access for page fetches and segment downloads
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::config::HttpConfig;
use crate::error::{PipelineError, Result};

/// Source of page markup and media bytes.
///
/// `timeout` bounds each wait (connecting, headers, every body read), not
/// the whole transfer, so a slow but steady download is never cut off.
#[async_trait]
pub trait HttpSource: Send + Sync {
    /// Fetch a page body as text. Statuses >= 400 are errors.
    async fn fetch_page(&self, url: &str, timeout: Duration) -> Result<String>;

    /// Stream a resource to `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &Path, timeout: Duration) -> Result<u64>;
}

/// reqwest-backed source sending the configured browser User-Agent
#[derive(Clone)]
pub struct ReqwestSource {
    client: Client,
    chunk_size: usize,
}

impl ReqwestSource {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            chunk_size: config.chunk_size,
        })
    }

    /// Shared client, so the uploader can reuse the same connection pool
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send a GET and reject error statuses; only the wait for headers is bounded here
    async fn open(&self, url: &str, timeout: Duration) -> Result<Response> {
        let response = within(timeout, url, self.client.get(url).send()).await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(PipelineError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

/// Await one network step, failing if it stalls longer than `timeout`
async fn within<T, F>(timeout: Duration, url: &str, step: F) -> Result<T>
where
    F: Future<Output = reqwest::Result<T>>,
{
    match tokio::time::timeout(timeout, step).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(PipelineError::Stalled {
            url: url.to_string(),
            timeout,
        }),
    }
}

#[async_trait]
impl HttpSource for ReqwestSource {
    async fn fetch_page(&self, url: &str, timeout: Duration) -> Result<String> {
        debug!("GET {}", url);
        let mut response = self.open(url, timeout).await?;

        let mut body = Vec::new();
        while let Some(chunk) = within(timeout, url, response.chunk()).await? {
            body.extend_from_slice(&chunk);
        }

        let html = String::from_utf8_lossy(&body).into_owned();
        debug!("📄 Downloaded {} characters of HTML content", html.len());
        Ok(html)
    }

    async fn download(&self, url: &str, dest: &Path, timeout: Duration) -> Result<u64> {
        debug!("GET {} -> {}", url, dest.display());
        let mut response = self.open(url, timeout).await?;

        let file = File::create(dest).await?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut written = 0u64;

        while let Some(chunk) = within(timeout, url, response.chunk()).await? {
            if chunk.is_empty() {
                continue;
            }
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;

        Ok(written)
    }
}
