//! Per-record pipeline and the worklist runner that drives it
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::archive::ArchiveUploader;
use crate::concat::{ConcatDriver, Muxer};
use crate::config::Config;
use crate::download::SegmentFetcher;
use crate::error::{PipelineError, Result};
use crate::extraction::{DetailPageLocator, MediaLinkResolver};
use crate::http::HttpSource;
use crate::worklist::{RowStatus, WorklistRecord, WorklistStore};

/// States a record moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    Pending,
    PageFetched,
    DetailPagesFound,
    MediaLinksResolved,
    SegmentsDownloaded,
    Merged,
    Uploaded,
    Failed,
}

/// Terminal result of one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub success: bool,
    /// Failure diagnostic, or the uploader's message
    pub message: String,
    /// Last state reached before the outcome was decided
    pub state: RecordState,
}

impl PipelineOutcome {
    fn failed(state: RecordState, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            state,
        }
    }
}

/// One stage failure, tagged with the state it happened in
struct StageFailure {
    state: RecordState,
    error: PipelineError,
}

trait AtState<T> {
    fn at(self, state: RecordState) -> std::result::Result<T, StageFailure>;
}

impl<T> AtState<T> for Result<T> {
    fn at(self, state: RecordState) -> std::result::Result<T, StageFailure> {
        self.map_err(|error| StageFailure { state, error })
    }
}

/// Runs one worklist record from content page to archived file
pub struct RecordPipeline {
    config: Config,
    http: Arc<dyn HttpSource>,
    locator: DetailPageLocator,
    resolver: MediaLinkResolver,
    fetcher: SegmentFetcher,
    driver: ConcatDriver,
    uploader: Arc<dyn ArchiveUploader>,
}

impl RecordPipeline {
    pub fn new(
        config: Config,
        http: Arc<dyn HttpSource>,
        muxer: Arc<dyn Muxer>,
        uploader: Arc<dyn ArchiveUploader>,
    ) -> Result<Self> {
        let extension = config.extraction.media_extension.clone();
        let locator = DetailPageLocator::new(&config.extraction)?;
        let resolver = MediaLinkResolver::new(http.clone(), &config.extraction, config.http.detail_timeout())?;
        let fetcher = SegmentFetcher::new(http.clone(), config.http.segment_timeout(), extension.clone());
        let driver = ConcatDriver::new(muxer, extension);

        Ok(Self {
            config,
            http,
            locator,
            resolver,
            fetcher,
            driver,
            uploader,
        })
    }

    /// Process one record. The work directory is removed before returning.
    pub async fn process_record(&self, title: &str, link: &str, number: u32, identifier: &str) -> PipelineOutcome {
        let work_dir = match self.create_work_dir() {
            Ok(dir) => dir,
            Err(e) => return PipelineOutcome::failed(RecordState::Pending, e.to_string()),
        };
        debug!("📁 Work directory: {}", work_dir.path().display());

        let outcome = match self.run_stages(work_dir.path(), title, link, number, identifier).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                warn!("❌ {} failed at {:?}: {}", title, failure.state, failure.error);
                PipelineOutcome::failed(failure.state, failure.error.to_string())
            }
        };

        if let Err(e) = work_dir.close() {
            warn!("Failed to remove work directory: {}", e);
        }

        outcome
    }

    fn create_work_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.config.work.temp_prefix);

        let dir = match &self.config.work.temp_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    async fn run_stages(
        &self,
        work_dir: &Path,
        title: &str,
        link: &str,
        number: u32,
        identifier: &str,
    ) -> std::result::Result<PipelineOutcome, StageFailure> {
        // PENDING -> PAGE_FETCHED
        info!("🌐 Fetching content page: {}", link);
        let html = self
            .http
            .fetch_page(link, self.config.http.page_timeout())
            .await
            .at(RecordState::Pending)?;

        // PAGE_FETCHED -> DETAIL_PAGES_FOUND
        let detail_urls = self.locator.locate(&html, link).at(RecordState::PageFetched)?;
        if detail_urls.is_empty() {
            return Err(StageFailure {
                state: RecordState::PageFetched,
                error: PipelineError::NoDetailPages,
            });
        }

        // DETAIL_PAGES_FOUND -> MEDIA_LINKS_RESOLVED
        let media_urls = self.resolve_all(&detail_urls).await;
        if media_urls.is_empty() {
            return Err(StageFailure {
                state: RecordState::DetailPagesFound,
                error: PipelineError::NoMediaLinks(detail_urls.len()),
            });
        }
        info!("🎬 Resolved {} of {} detail pages", media_urls.len(), detail_urls.len());

        // MEDIA_LINKS_RESOLVED -> SEGMENTS_DOWNLOADED
        let parts = self
            .fetcher
            .fetch_all(&media_urls, work_dir)
            .await
            .at(RecordState::MediaLinksResolved)?;

        // SEGMENTS_DOWNLOADED -> MERGED
        let merged = self
            .driver
            .merge(&parts, work_dir, number, title)
            .await
            .at(RecordState::SegmentsDownloaded)?;

        // MERGED -> UPLOADED
        let upload = self.uploader.upload_file(&merged, identifier).await;
        let state = if upload.success {
            RecordState::Uploaded
        } else {
            RecordState::Merged
        };

        Ok(PipelineOutcome {
            success: upload.success,
            message: upload.message,
            state,
        })
    }

    /// Resolve every detail page, keeping only successes in discovery order
    async fn resolve_all(&self, detail_urls: &[String]) -> Vec<String> {
        let mut media_urls = Vec::new();
        for detail_url in detail_urls {
            match self.resolver.resolve(detail_url).await {
                Ok(url) => media_urls.push(url),
                Err(reason) => debug!("Skipping {}: {}", detail_url, reason),
            }
        }
        media_urls
    }
}

/// Totals for one worklist run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub done: usize,
    pub failed: usize,
    pub total_time: Duration,
    pub results: Vec<RecordResult>,
}

/// Outcome of one row within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResult {
    pub row: usize,
    pub title: String,
    /// Sequence number, assigned only on success
    pub number: Option<u32>,
    pub outcome: PipelineOutcome,
}

/// Runs the record pipeline over a worklist tab, writing one status per row
pub struct WorklistRunner {
    pipeline: RecordPipeline,
    store: Arc<dyn WorklistStore>,
}

impl WorklistRunner {
    pub fn new(pipeline: RecordPipeline, store: Arc<dyn WorklistStore>) -> Self {
        Self { pipeline, store }
    }

    /// Process every pending row of `tab` in order.
    ///
    /// Record failures never stop the run; only store read failures do.
    pub async fn run(&self, tab: &str) -> Result<RunSummary> {
        let start_time = Instant::now();
        let rows = self.store.read_pending_rows(tab).await?;
        let mut current_number = self.store.get_max_assigned_number(tab).await?;

        info!("🚀 Processing {} pending rows (last number {})", rows.len(), current_number);

        let mut results = Vec::with_capacity(rows.len());
        for (index, record) in rows.iter().enumerate() {
            let next_number = current_number + 1;
            info!("📹 Row {} ({}/{}): {}", record.row, index + 1, rows.len(), record.title);

            let outcome = self.process_guarded(record, next_number).await;

            let write = if outcome.success {
                current_number = next_number;
                info!("✅ Row {} done as #{}", record.row, next_number);
                self.store
                    .update_row(tab, record.row, RowStatus::Done, Some(next_number), "")
                    .await
            } else {
                warn!("❌ Row {} failed: {}", record.row, outcome.message);
                self.store
                    .update_row(tab, record.row, RowStatus::Failed, None, &outcome.message)
                    .await
            };

            if let Err(e) = write {
                error!("Failed to write status for row {}: {}", record.row, e);
            }

            results.push(RecordResult {
                row: record.row,
                title: record.title.clone(),
                number: outcome.success.then_some(next_number),
                outcome,
            });
        }

        let done = results.iter().filter(|r| r.outcome.success).count();
        Ok(RunSummary {
            total: results.len(),
            done,
            failed: results.len() - done,
            total_time: start_time.elapsed(),
            results,
        })
    }

    /// Run one record, turning a panic anywhere inside it into a failure
    async fn process_guarded(&self, record: &WorklistRecord, number: u32) -> PipelineOutcome {
        let future = self
            .pipeline
            .process_record(&record.title, &record.link, number, &record.identifier);

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<String>()
                    .cloned()
                    .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                    .unwrap_or_else(|| "unexpected failure".to_string());
                error!("💥 Unexpected failure on row {} ({}): {}", record.row, record.link, message);
                PipelineOutcome::failed(RecordState::Failed, message)
            }
        }
    }
}

/// Work directory root a pipeline would use, for diagnostics
pub fn work_root(config: &Config) -> PathBuf {
    config
        .work
        .temp_root
        .clone()
        .unwrap_or_else(std::env::temp_dir)
}
