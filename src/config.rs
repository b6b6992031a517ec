use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Configuration for the video archiver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Outbound HTTP settings
    pub http: HttpConfig,

    /// Page scanning heuristics
    pub extraction: ExtractionConfig,

    /// External muxer settings
    pub merge: MergeConfig,

    /// Worklist store settings
    pub worklist: WorklistConfig,

    /// Archive sink settings
    pub archive: ArchiveConfig,

    /// Temporary working directory settings
    pub work: WorkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Browser-identifying User-Agent sent with every request
    pub user_agent: String,

    /// Longest stall while fetching the record's content page (seconds)
    pub page_timeout_seconds: u64,

    /// Longest stall while fetching a video detail page (seconds)
    pub detail_timeout_seconds: u64,

    /// Longest stall during a segment download (seconds)
    pub segment_timeout_seconds: u64,

    /// Write buffer size for segment downloads (bytes)
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// CSS selector of the primary content container
    pub content_container: String,

    /// Link suffixes that are never video pages
    pub image_extensions: Vec<String>,

    /// Path segments used by known video providers
    pub provider_markers: Vec<String>,

    /// Extension of direct media files, without the dot
    pub media_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Path or name of the ffmpeg binary
    pub ffmpeg_path: PathBuf,

    /// ffmpeg -loglevel value
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorklistConfig {
    /// JSON worklist file
    pub path: PathBuf,

    /// Tab (sheet) to process
    pub tab: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ArchiveProvider {
    InternetArchive,
    LocalDirectory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Which sink receives merged files
    pub provider: ArchiveProvider,

    /// S3-compatible upload endpoint
    pub endpoint: String,

    /// Access key (Internet Archive)
    pub access_key: Option<String>,

    /// Secret key (Internet Archive)
    pub secret_key: Option<String>,

    /// Media type attached to created items
    pub media_type: String,

    /// Upload timeout in seconds
    pub timeout_seconds: u64,

    /// Target directory for the local sink
    pub local_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkConfig {
    /// Prefix of each record's temporary directory
    pub temp_prefix: String,

    /// Parent directory for temporary directories (system default if unset)
    pub temp_root: Option<PathBuf>,
}

impl HttpConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_seconds)
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_seconds)
    }

    pub fn segment_timeout(&self) -> Duration {
        Duration::from_secs(self.segment_timeout_seconds)
    }
}

impl Config {
    /// Load configuration from the first well-known location that parses
    pub fn load() -> Result<Self> {
        let config_paths = [
            "video-archiver.toml",
            "config/video-archiver.toml",
            "/etc/video-archiver/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config.with_env_overrides());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Err(PipelineError::Configuration("No configuration file found".to_string()))
    }

    /// Load configuration from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)
            .map_err(|e| PipelineError::Configuration(format!("{}: {}", path.display(), e)))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config.with_env_overrides())
    }

    /// Defaults with environment variable overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(user_agent) = std::env::var("VIDEO_ARCHIVER_USER_AGENT") {
            self.http.user_agent = user_agent;
        }

        if let Ok(ffmpeg) = std::env::var("VIDEO_ARCHIVER_FFMPEG") {
            self.merge.ffmpeg_path = PathBuf::from(ffmpeg);
        }

        if let Ok(path) = std::env::var("VIDEO_ARCHIVER_WORKLIST") {
            self.worklist.path = PathBuf::from(path);
        }

        if let Ok(tab) = std::env::var("VIDEO_ARCHIVER_TAB") {
            self.worklist.tab = tab;
        }

        if let Ok(access_key) = std::env::var("VIDEO_ARCHIVER_IA_ACCESS_KEY") {
            self.archive.access_key = Some(access_key);
        }

        if let Ok(secret_key) = std::env::var("VIDEO_ARCHIVER_IA_SECRET_KEY") {
            self.archive.secret_key = Some(secret_key);
        }

        if let Ok(temp_root) = std::env::var("VIDEO_ARCHIVER_TEMP_ROOT") {
            self.work.temp_root = Some(PathBuf::from(temp_root));
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.http.page_timeout_seconds == 0
            || self.http.detail_timeout_seconds == 0
            || self.http.segment_timeout_seconds == 0
        {
            return Err(PipelineError::Configuration("HTTP timeouts must be greater than 0".to_string()));
        }

        if self.http.chunk_size == 0 {
            return Err(PipelineError::Configuration("chunk_size must be greater than 0".to_string()));
        }

        if self.extraction.media_extension.is_empty() || self.extraction.media_extension.starts_with('.') {
            return Err(PipelineError::Configuration(
                "media_extension must be a bare extension such as \"mp4\"".to_string(),
            ));
        }

        if scraper::Selector::parse(&self.extraction.content_container).is_err() {
            return Err(PipelineError::Configuration(format!(
                "Invalid content container selector: {}",
                self.extraction.content_container
            )));
        }

        if self.worklist.tab.is_empty() {
            return Err(PipelineError::Configuration("worklist tab must not be empty".to_string()));
        }

        if self.archive.provider == ArchiveProvider::InternetArchive
            && (self.archive.access_key.is_none() || self.archive.secret_key.is_none())
        {
            return Err(PipelineError::Configuration(
                "Access and secret keys required for the Internet Archive provider".to_string(),
            ));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Video Archiver Configuration:\n\
            - Worklist: {} (tab {})\n\
            - Archive Provider: {:?}\n\
            - Timeouts: page {}s, detail {}s, segment {}s\n\
            - Media Extension: {}\n\
            - ffmpeg: {}",
            self.worklist.path.display(),
            self.worklist.tab,
            self.archive.provider,
            self.http.page_timeout_seconds,
            self.http.detail_timeout_seconds,
            self.http.segment_timeout_seconds,
            self.extraction.media_extension,
            self.merge.ffmpeg_path.display(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                             (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36"
                    .to_string(),
                page_timeout_seconds: 30,
                detail_timeout_seconds: 20,
                segment_timeout_seconds: 60,
                chunk_size: 1024 * 1024, // 1MB
            },
            extraction: ExtractionConfig {
                content_container: "div.single-page_content-container".to_string(),
                image_extensions: vec![
                    "jpg".to_string(),
                    "jpeg".to_string(),
                    "png".to_string(),
                    "gif".to_string(),
                    "webp".to_string(),
                ],
                provider_markers: vec!["/mrskin/".to_string(), "/azncdn/".to_string()],
                media_extension: "mp4".to_string(),
            },
            merge: MergeConfig {
                ffmpeg_path: PathBuf::from("ffmpeg"),
                log_level: "error".to_string(),
            },
            worklist: WorklistConfig {
                path: PathBuf::from("worklist.json"),
                tab: "AZ".to_string(),
            },
            archive: ArchiveConfig {
                provider: ArchiveProvider::LocalDirectory,
                endpoint: "https://s3.us.archive.org".to_string(),
                access_key: None,
                secret_key: None,
                media_type: "movies".to_string(),
                timeout_seconds: 3600, // large files
                local_dir: PathBuf::from("./archive"),
            },
            work: WorkConfig {
                temp_prefix: "az_2026_".to_string(),
                temp_root: None,
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_worklist(mut self, path: PathBuf, tab: impl Into<String>) -> Self {
        self.config.worklist.path = path;
        self.config.worklist.tab = tab.into();
        self
    }

    pub fn with_ffmpeg_path(mut self, path: PathBuf) -> Self {
        self.config.merge.ffmpeg_path = path;
        self
    }

    pub fn with_temp_root(mut self, dir: PathBuf) -> Self {
        self.config.work.temp_root = Some(dir);
        self
    }

    pub fn with_media_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.extraction.media_extension = extension.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
