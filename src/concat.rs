//! Lossless concatenation of downloaded segments through ffmpeg's concat demuxer
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::MergeConfig;
use crate::error::{PipelineError, Result};

/// External tool that joins the files listed in a concat manifest
#[async_trait]
pub trait Muxer: Send + Sync {
    async fn concat(&self, manifest: &Path, output: &Path) -> Result<()>;
}

/// ffmpeg in concat/copy mode
#[derive(Clone)]
pub struct FfmpegMuxer {
    binary: PathBuf,
    log_level: String,
}

impl FfmpegMuxer {
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            binary: config.ffmpeg_path.clone(),
            log_level: config.log_level.clone(),
        }
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn concat(&self, manifest: &Path, output: &Path) -> Result<()> {
        let result = tokio::process::Command::new(&self.binary)
            .args(["-loglevel", self.log_level.as_str()])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(manifest)
            .args(["-c", "copy"])
            .arg(output)
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            error!("❌ ffmpeg concat failed ({}): {}", result.status, stderr.trim());
            return Err(PipelineError::ToolFailed {
                tool: "ffmpeg".to_string(),
                detail: format!("{} {}", result.status, stderr.trim()).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Manifest contents: one `file '<path>'` line per segment.
///
/// Single quotes inside paths are closed, escaped and reopened as the
/// concat demuxer expects.
pub fn create_concat_manifest(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', r"'\''")))
        .collect()
}

/// Output file name for a record: `{number:02} - {title}.{ext}` with `/` replaced
pub fn merged_file_name(number: u32, title: &str, extension: &str) -> String {
    format!("{:02} - {}.{}", number, title.replace('/', "_"), extension)
}

/// Writes the manifest and drives the muxer
pub struct ConcatDriver {
    muxer: Arc<dyn Muxer>,
    extension: String,
}

impl ConcatDriver {
    pub fn new(muxer: Arc<dyn Muxer>, extension: impl Into<String>) -> Self {
        Self {
            muxer,
            extension: extension.into(),
        }
    }

    /// Merge `segments` in order into one file inside `work_dir`
    pub async fn merge(&self, segments: &[PathBuf], work_dir: &Path, number: u32, title: &str) -> Result<PathBuf> {
        if segments.is_empty() {
            return Err(PipelineError::NoSegments);
        }

        let manifest = work_dir.join("files.txt");
        tokio::fs::write(&manifest, create_concat_manifest(segments)).await?;
        info!("📝 Manifest written ({} segments): {}", segments.len(), manifest.display());

        let output = work_dir.join(merged_file_name(number, title, &self.extension));
        self.muxer.concat(&manifest, &output).await?;

        info!("🎞️ Merged output: {}", output.display());
        Ok(output)
    }
}
