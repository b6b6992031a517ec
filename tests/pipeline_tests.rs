use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use video_archiver::config::ConfigBuilder;
use video_archiver::{
    ArchiveUploader, HttpSource, Muxer, PipelineError, RecordPipeline, RecordState, Result, RowStatus,
    UploadOutcome, WorklistRecord, WorklistRunner, WorklistStore,
};

const PAGE: &str = "https://site.example/view/jane-doe.html";

/// In-memory web: pages by URL, media bytes by URL, everything else 404
#[derive(Default)]
struct FakeWeb {
    pages: HashMap<String, String>,
    media: HashMap<String, Vec<u8>>,
    downloads: Mutex<Vec<String>>,
}

impl FakeWeb {
    fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    fn media(mut self, url: &str, bytes: &[u8]) -> Self {
        self.media.insert(url.to_string(), bytes.to_vec());
        self
    }

    fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpSource for FakeWeb {
    async fn fetch_page(&self, url: &str, _timeout: Duration) -> Result<String> {
        self.pages.get(url).cloned().ok_or_else(|| PipelineError::HttpStatus {
            status: 404,
            url: url.to_string(),
        })
    }

    async fn download(&self, url: &str, dest: &Path, _timeout: Duration) -> Result<u64> {
        self.downloads.lock().unwrap().push(url.to_string());
        let bytes = self.media.get(url).ok_or_else(|| PipelineError::HttpStatus {
            status: 404,
            url: url.to_string(),
        })?;
        tokio::fs::write(dest, bytes).await?;
        Ok(bytes.len() as u64)
    }
}

/// Concatenates the manifest's files, or fails like a non-zero ffmpeg exit
struct FakeMuxer {
    fail: bool,
    manifests: Mutex<Vec<String>>,
}

impl FakeMuxer {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            manifests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Muxer for FakeMuxer {
    async fn concat(&self, manifest: &Path, output: &Path) -> Result<()> {
        let listing = tokio::fs::read_to_string(manifest).await?;
        self.manifests.lock().unwrap().push(listing.clone());

        if self.fail {
            return Err(PipelineError::ToolFailed {
                tool: "ffmpeg".to_string(),
                detail: "exit status: 1".to_string(),
            });
        }

        let mut merged = Vec::new();
        for line in listing.lines() {
            let path = line.trim_start_matches("file '").trim_end_matches('\'');
            merged.extend(tokio::fs::read(path).await?);
        }
        tokio::fs::write(output, merged).await?;
        Ok(())
    }
}

/// Remembers what it was given; panics for the identifier "boom"
#[derive(Default)]
struct FakeUploader {
    reject: bool,
    uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
}

#[async_trait]
impl ArchiveUploader for FakeUploader {
    async fn upload_file(&self, path: &Path, identifier: &str) -> UploadOutcome {
        if identifier == "boom" {
            panic!("uploader exploded");
        }

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        let bytes = tokio::fs::read(path).await.unwrap();
        self.uploads.lock().unwrap().push((identifier.to_string(), name, bytes));

        if self.reject {
            UploadOutcome::failed("item is dark")
        } else {
            UploadOutcome::ok(format!("uploaded to {}", identifier))
        }
    }
}

/// In-memory worklist recording every status write
struct FakeStore {
    rows: Vec<WorklistRecord>,
    max_number: u32,
    writes: Mutex<Vec<(usize, RowStatus, Option<u32>, String)>>,
}

#[async_trait]
impl WorklistStore for FakeStore {
    async fn read_pending_rows(&self, _tab: &str) -> Result<Vec<WorklistRecord>> {
        Ok(self.rows.clone())
    }

    async fn get_max_assigned_number(&self, _tab: &str) -> Result<u32> {
        Ok(self.max_number)
    }

    async fn update_row(
        &self,
        _tab: &str,
        row: usize,
        status: RowStatus,
        number: Option<u32>,
        message: &str,
    ) -> Result<()> {
        self.writes
            .lock()
            .unwrap()
            .push((row, status, number, message.to_string()));
        Ok(())
    }
}

struct Harness {
    _root: TempDir,
    work_root: PathBuf,
    web: Arc<FakeWeb>,
    muxer: Arc<FakeMuxer>,
    uploader: Arc<FakeUploader>,
}

impl Harness {
    fn new(web: FakeWeb, muxer: FakeMuxer, uploader: FakeUploader) -> Self {
        let root = TempDir::new().unwrap();
        let work_root = root.path().join("work");
        Self {
            _root: root,
            work_root,
            web: Arc::new(web),
            muxer: Arc::new(muxer),
            uploader: Arc::new(uploader),
        }
    }

    fn pipeline(&self) -> RecordPipeline {
        let config = ConfigBuilder::new().with_temp_root(self.work_root.clone()).build();
        RecordPipeline::new(config, self.web.clone(), self.muxer.clone(), self.uploader.clone()).unwrap()
    }

    fn work_dirs_left(&self) -> usize {
        std::fs::read_dir(&self.work_root).map(|entries| entries.count()).unwrap_or(0)
    }
}

fn content_page(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">clip</a>"#, href))
        .collect();
    format!(
        r#"<html><body><div class="single-page_content-container">{}</div></body></html>"#,
        anchors
    )
}

fn detail_page(media_href: &str) -> String {
    format!(
        r#"<html><body><a href="{}"><button class="single-video-download">Download</button></a></body></html>"#,
        media_href
    )
}

#[tokio::test]
async fn test_page_without_video_links_fails() {
    let web = FakeWeb::default().page(
        PAGE,
        r#"<div class="single-page_content-container"><a href="/pics/1.jpg">pic</a><a href="/about.html">about</a></div>"#,
    );
    let harness = Harness::new(web, FakeMuxer::new(false), FakeUploader::default());

    let outcome = harness.pipeline().process_record("Jane", PAGE, 1, "item-1").await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, "No video detail HTML pages found");
    assert_eq!(outcome.state, RecordState::PageFetched);
    assert_eq!(harness.work_dirs_left(), 0);
}

#[tokio::test]
async fn test_content_page_fetch_failure() {
    let harness = Harness::new(FakeWeb::default(), FakeMuxer::new(false), FakeUploader::default());

    let outcome = harness.pipeline().process_record("Jane", PAGE, 1, "item-1").await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, format!("HTTP 404 for url: {}", PAGE));
    assert_eq!(outcome.state, RecordState::Pending);
    assert_eq!(harness.work_dirs_left(), 0);
}

#[tokio::test]
async fn test_bare_path_media_link_is_fetched_over_https() {
    let web = FakeWeb::default()
        .page(PAGE, &content_page(&["/mrskin/scene-1.html"]))
        .page("https://site.example/mrskin/scene-1.html", &detail_page("/path/video.mp4"))
        .media("https:///path/video.mp4", b"AAAA");
    let harness = Harness::new(web, FakeMuxer::new(false), FakeUploader::default());

    let outcome = harness.pipeline().process_record("Jane", PAGE, 4, "item-4").await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(harness.web.downloads(), vec!["https:///path/video.mp4".to_string()]);

    let uploads = harness.uploader.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "item-4");
    assert_eq!(uploads[0].1, "04 - Jane.mp4");
}

#[tokio::test]
async fn test_unresolved_detail_pages_are_skipped_in_order() {
    let web = FakeWeb::default()
        .page(
            PAGE,
            &content_page(&["/mrskin/part-1.html", "/mrskin/part-2.html", "/mrskin/part-3.html"]),
        )
        .page("https://site.example/mrskin/part-1.html", &detail_page("https://cdn.example/p1.mp4"))
        // part-2 is missing, so its detail page fetch fails with a 404
        .page("https://site.example/mrskin/part-3.html", &detail_page("https://cdn.example/p3.mp4"))
        .media("https://cdn.example/p1.mp4", b"first-")
        .media("https://cdn.example/p3.mp4", b"third");
    let harness = Harness::new(web, FakeMuxer::new(false), FakeUploader::default());

    let outcome = harness.pipeline().process_record("Scene A/B", PAGE, 12, "item-12").await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.state, RecordState::Uploaded);
    assert_eq!(outcome.message, "uploaded to item-12");
    assert_eq!(
        harness.web.downloads(),
        vec!["https://cdn.example/p1.mp4".to_string(), "https://cdn.example/p3.mp4".to_string()]
    );

    let manifests = harness.muxer.manifests.lock().unwrap();
    let lines: Vec<&str> = manifests[0].lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("part_00.mp4'"));
    assert!(lines[1].ends_with("part_01.mp4'"));

    let uploads = harness.uploader.uploads.lock().unwrap();
    assert_eq!(uploads[0].1, "12 - Scene A_B.mp4");
    assert_eq!(uploads[0].2, b"first-third".to_vec());
    assert_eq!(harness.work_dirs_left(), 0);
}

#[tokio::test]
async fn test_no_media_links_reports_pages_checked() {
    let web = FakeWeb::default()
        .page(PAGE, &content_page(&["/mrskin/a.html", "/mrskin/b.html"]))
        .page("https://site.example/mrskin/a.html", "<p>no links</p>");
    let harness = Harness::new(web, FakeMuxer::new(false), FakeUploader::default());

    let outcome = harness.pipeline().process_record("Jane", PAGE, 1, "item-1").await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, "No media links found after checking 2 pages");
    assert!(harness.web.downloads().is_empty());
}

#[tokio::test]
async fn test_segment_failure_aborts_record() {
    let web = FakeWeb::default()
        .page(PAGE, &content_page(&["/mrskin/a.html", "/mrskin/b.html"]))
        .page("https://site.example/mrskin/a.html", &detail_page("https://cdn.example/a.mp4"))
        .page("https://site.example/mrskin/b.html", &detail_page("https://cdn.example/b.mp4"))
        .media("https://cdn.example/b.mp4", b"b");
    let harness = Harness::new(web, FakeMuxer::new(false), FakeUploader::default());

    let outcome = harness.pipeline().process_record("Jane", PAGE, 1, "item-1").await;

    assert!(!outcome.success);
    assert_eq!(outcome.state, RecordState::MediaLinksResolved);
    assert_eq!(harness.web.downloads(), vec!["https://cdn.example/a.mp4".to_string()]);
    assert!(harness.muxer.manifests.lock().unwrap().is_empty());
    assert_eq!(harness.work_dirs_left(), 0);
}

#[tokio::test]
async fn test_muxer_failure_skips_upload() {
    let web = FakeWeb::default()
        .page(PAGE, &content_page(&["/mrskin/a.html"]))
        .page("https://site.example/mrskin/a.html", &detail_page("https://cdn.example/a.mp4"))
        .media("https://cdn.example/a.mp4", b"a");
    let harness = Harness::new(web, FakeMuxer::new(true), FakeUploader::default());

    let outcome = harness.pipeline().process_record("Jane", PAGE, 1, "item-1").await;

    assert!(!outcome.success);
    assert_eq!(outcome.state, RecordState::SegmentsDownloaded);
    assert!(outcome.message.starts_with("ffmpeg failed"));
    assert!(harness.uploader.uploads.lock().unwrap().is_empty());
    assert_eq!(harness.work_dirs_left(), 0);
}

#[tokio::test]
async fn test_upload_result_passes_through() {
    let web = FakeWeb::default()
        .page(PAGE, &content_page(&["/mrskin/a.html"]))
        .page("https://site.example/mrskin/a.html", &detail_page("https://cdn.example/a.mp4"))
        .media("https://cdn.example/a.mp4", b"a");
    let uploader = FakeUploader {
        reject: true,
        ..Default::default()
    };
    let harness = Harness::new(web, FakeMuxer::new(false), uploader);

    let outcome = harness.pipeline().process_record("Jane", PAGE, 1, "item-1").await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, "item is dark");
    assert_eq!(harness.work_dirs_left(), 0);
}

#[tokio::test]
async fn test_runner_numbers_only_successful_rows() {
    let web = FakeWeb::default()
        .page(PAGE, &content_page(&["/mrskin/a.html"]))
        .page("https://site.example/mrskin/a.html", &detail_page("https://cdn.example/a.mp4"))
        .media("https://cdn.example/a.mp4", b"a");
    let harness = Harness::new(web, FakeMuxer::new(false), FakeUploader::default());

    let record = |row: usize, link: &str, identifier: &str| WorklistRecord {
        row,
        title: format!("Row {}", row),
        link: link.to_string(),
        identifier: identifier.to_string(),
    };
    let store = Arc::new(FakeStore {
        rows: vec![
            record(2, PAGE, "item-a"),
            record(3, "https://site.example/missing.html", "item-b"),
            record(4, PAGE, "boom"),
            record(5, PAGE, "item-c"),
        ],
        max_number: 9,
        writes: Mutex::new(Vec::new()),
    });

    let runner = WorklistRunner::new(harness.pipeline(), store.clone());
    let summary = runner.run("AZ").await.unwrap();

    assert_eq!(summary.total, 4);
    assert_eq!(summary.done, 2);
    assert_eq!(summary.failed, 2);

    let writes = store.writes.lock().unwrap();
    assert_eq!(writes.len(), 4);
    assert_eq!(writes[0], (2, RowStatus::Done, Some(10), String::new()));
    assert_eq!(writes[1].0, 3);
    assert_eq!(writes[1].1, RowStatus::Failed);
    assert_eq!(writes[1].2, None);
    assert!(writes[1].3.starts_with("HTTP 404"));
    assert_eq!(writes[2].0, 4);
    assert_eq!(writes[2].1, RowStatus::Failed);
    assert_eq!(writes[2].3, "uploader exploded");
    assert_eq!(writes[3], (5, RowStatus::Done, Some(11), String::new()));

    assert_eq!(harness.work_dirs_left(), 0);
}
