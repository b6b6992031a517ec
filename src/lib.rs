/// Video Archiver
///
/// Finds the videos linked from a content page, downloads their parts,
/// merges them losslessly with ffmpeg and hands the result to an archive,
/// one worklist record at a time.

pub mod archive;
pub mod concat;
pub mod config;
pub mod download;
pub mod error;
pub mod extraction;
pub mod http;
pub mod pipeline;
pub mod worklist;

// Re-export main types for easy access
pub use crate::archive::{create_uploader, ArchiveUploader, UploadOutcome};
pub use crate::concat::{ConcatDriver, FfmpegMuxer, Muxer};
pub use crate::config::Config;
pub use crate::download::SegmentFetcher;
pub use crate::error::{PipelineError, Result};
pub use crate::extraction::{DetailPageLocator, MediaLinkResolver};
pub use crate::http::{HttpSource, ReqwestSource};
pub use crate::pipeline::{PipelineOutcome, RecordPipeline, RecordState, RunSummary, WorklistRunner};
pub use crate::worklist::{JsonWorklistStore, RowStatus, WorklistRecord, WorklistStore};
