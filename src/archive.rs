//! Archive sinks for merged files
use async_trait::async_trait;
use reqwest::{Body, Client};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::config::{ArchiveConfig, ArchiveProvider};
use crate::error::{PipelineError, Result};

/// Result of handing a file to the archive
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub success: bool,
    pub message: String,
}

impl UploadOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Destination for merged files
#[async_trait]
pub trait ArchiveUploader: Send + Sync {
    /// Upload `path` under the archive item `identifier`
    async fn upload_file(&self, path: &Path, identifier: &str) -> UploadOutcome;
}

/// Internet Archive upload through its S3-compatible API
pub struct InternetArchiveUploader {
    client: Client,
    endpoint: String,
    access_key: String,
    secret_key: String,
    media_type: String,
    timeout: Duration,
}

impl InternetArchiveUploader {
    pub fn new(client: Client, config: &ArchiveConfig) -> Result<Self> {
        let access_key = config
            .access_key
            .clone()
            .ok_or_else(|| PipelineError::Configuration("Internet Archive access key not configured".to_string()))?;
        let secret_key = config
            .secret_key
            .clone()
            .ok_or_else(|| PipelineError::Configuration("Internet Archive secret key not configured".to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_key,
            secret_key,
            media_type: config.media_type.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    /// Item URL for a file: `{endpoint}/{identifier}/{encoded file name}`
    pub fn item_url(&self, identifier: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            urlencoding::encode(identifier),
            urlencoding::encode(file_name)
        )
    }

    async fn put(&self, path: &Path, identifier: &str) -> Result<String> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| PipelineError::Archive(format!("No file name in {}", path.display())))?;
        let url = self.item_url(identifier, &file_name);

        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();

        info!("☁️ Uploading {} ({} bytes) to {}", file_name, size, url);
        let response = self
            .client
            .put(&url)
            .timeout(self.timeout)
            .header("authorization", format!("LOW {}:{}", self.access_key, self.secret_key))
            .header("x-archive-auto-make-bucket", "1")
            .header("x-archive-meta-mediatype", self.media_type.as_str())
            .header("content-length", size)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Archive(format!("upload rejected ({}): {}", status, text.trim())));
        }

        Ok(url)
    }
}

#[async_trait]
impl ArchiveUploader for InternetArchiveUploader {
    async fn upload_file(&self, path: &Path, identifier: &str) -> UploadOutcome {
        match self.put(path, identifier).await {
            Ok(url) => UploadOutcome::ok(format!("Uploaded to {}", url)),
            Err(e) => {
                warn!("Upload of {} failed: {}", path.display(), e);
                UploadOutcome::failed(e.to_string())
            }
        }
    }
}

/// Copies merged files into `{dir}/{identifier}/`
pub struct LocalDirectoryUploader {
    dir: PathBuf,
}

impl LocalDirectoryUploader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn copy(&self, path: &Path, identifier: &str) -> Result<PathBuf> {
        let file_name = path
            .file_name()
            .ok_or_else(|| PipelineError::Archive(format!("No file name in {}", path.display())))?;
        let item_dir = self.dir.join(identifier);
        tokio::fs::create_dir_all(&item_dir).await?;

        let target = item_dir.join(file_name);
        tokio::fs::copy(path, &target).await?;
        Ok(target)
    }
}

#[async_trait]
impl ArchiveUploader for LocalDirectoryUploader {
    async fn upload_file(&self, path: &Path, identifier: &str) -> UploadOutcome {
        match self.copy(path, identifier).await {
            Ok(target) => {
                info!("📦 Archived to {}", target.display());
                UploadOutcome::ok(format!("Copied to {}", target.display()))
            }
            Err(e) => {
                warn!("Archiving {} failed: {}", path.display(), e);
                UploadOutcome::failed(e.to_string())
            }
        }
    }
}

/// Create the configured uploader
pub fn create_uploader(config: &ArchiveConfig, client: Client) -> Result<Arc<dyn ArchiveUploader>> {
    match config.provider {
        ArchiveProvider::InternetArchive => Ok(Arc::new(InternetArchiveUploader::new(client, config)?)),
        ArchiveProvider::LocalDirectory => Ok(Arc::new(LocalDirectoryUploader::new(config.local_dir.clone()))),
    }
}
