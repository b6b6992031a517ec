//! Ordered segment downloads into a record's work directory
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::Result;
use crate::http::HttpSource;

/// Make a bare-path media URL absolute under https.
///
/// Matches joining against a scheme-only base: `/p/v.mp4` becomes
/// `https:///p/v.mp4` and `//cdn/v.mp4` becomes `https://cdn/v.mp4`.
/// URLs that do not start with `/` are returned unchanged.
pub fn absolutize_media_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else if url.starts_with('/') {
        format!("https://{}", url)
    } else {
        url.to_string()
    }
}

/// File name of the segment at `index` out of `total`.
///
/// Indices are zero-padded to at least two digits, wider when `total` needs
/// it, so names always sort in input order.
pub fn segment_file_name(index: usize, total: usize, extension: &str) -> String {
    let width = total.saturating_sub(1).to_string().len().max(2);
    format!("part_{:0width$}.{}", index, extension, width = width)
}

/// Downloads media URLs one after another, preserving their order on disk
pub struct SegmentFetcher {
    http: Arc<dyn HttpSource>,
    timeout: Duration,
    extension: String,
}

impl SegmentFetcher {
    pub fn new(http: Arc<dyn HttpSource>, timeout: Duration, extension: impl Into<String>) -> Self {
        Self {
            http,
            timeout,
            extension: extension.into(),
        }
    }

    /// Download every URL into `work_dir`, returning the files in input order.
    ///
    /// The first failure aborts the whole set.
    pub async fn fetch_all(&self, urls: &[String], work_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut parts = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            let url = absolutize_media_url(url);
            let path = work_dir.join(segment_file_name(index, urls.len(), &self.extension));

            info!("⬇️ Downloading part {}/{}: {}", index + 1, urls.len(), url);
            let bytes = self.http.download(&url, &path, self.timeout).await?;
            info!("✅ Saved {} ({} bytes)", path.display(), bytes);

            parts.push(path);
        }

        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    use crate::error::PipelineError;

    /// Serves every URL except those containing "missing"
    #[derive(Default)]
    struct CountingSource {
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpSource for CountingSource {
        async fn fetch_page(&self, url: &str, _timeout: Duration) -> Result<String> {
            Err(PipelineError::InvalidUrl(url.to_string()))
        }

        async fn download(&self, url: &str, dest: &Path, _timeout: Duration) -> Result<u64> {
            self.requested.lock().unwrap().push(url.to_string());
            if url.contains("missing") {
                return Err(PipelineError::HttpStatus {
                    status: 404,
                    url: url.to_string(),
                });
            }
            tokio::fs::write(dest, url.as_bytes()).await?;
            Ok(url.len() as u64)
        }
    }

    #[test]
    fn test_fetch_all_names_parts_in_order() {
        tokio_test::block_on(async {
            let dir = TempDir::new().unwrap();
            let source = Arc::new(CountingSource::default());
            let fetcher = SegmentFetcher::new(source.clone(), Duration::from_secs(5), "mp4");

            let urls = vec!["//cdn.example.com/a.mp4".to_string(), "https://cdn.example.com/b.mp4".to_string()];
            let parts = fetcher.fetch_all(&urls, dir.path()).await.unwrap();

            assert_eq!(parts, vec![dir.path().join("part_00.mp4"), dir.path().join("part_01.mp4")]);
            assert_eq!(
                *source.requested.lock().unwrap(),
                vec!["https://cdn.example.com/a.mp4".to_string(), "https://cdn.example.com/b.mp4".to_string()]
            );
        });
    }

    #[test]
    fn test_fetch_all_stops_at_first_failure() {
        tokio_test::block_on(async {
            let dir = TempDir::new().unwrap();
            let source = Arc::new(CountingSource::default());
            let fetcher = SegmentFetcher::new(source.clone(), Duration::from_secs(5), "mp4");

            let urls = vec![
                "https://cdn.example.com/missing.mp4".to_string(),
                "https://cdn.example.com/b.mp4".to_string(),
            ];
            assert!(fetcher.fetch_all(&urls, dir.path()).await.is_err());
            assert_eq!(source.requested.lock().unwrap().len(), 1);
        });
    }

    #[test]
    fn test_absolutize_media_url() {
        assert_eq!(absolutize_media_url("/path/video.mp4"), "https:///path/video.mp4");
        assert_eq!(absolutize_media_url("//cdn.example.com/v.mp4"), "https://cdn.example.com/v.mp4");
        assert_eq!(absolutize_media_url("http://cdn.example.com/v.mp4"), "http://cdn.example.com/v.mp4");
    }

    #[test]
    fn test_segment_names_sort_in_input_order() {
        let names: Vec<String> = (0..12).map(|i| segment_file_name(i, 12, "mp4")).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names[3], "part_03.mp4");
    }

    #[test]
    fn test_segment_names_widen_past_ninety_nine() {
        let names: Vec<String> = (0..120).map(|i| segment_file_name(i, 120, "mp4")).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names[7], "part_007.mp4");
        assert_eq!(names[119], "part_119.mp4");
        assert_eq!(segment_file_name(99, 100, "mp4"), "part_99.mp4");
    }
}
