//! Error types shared by every pipeline stage

/// Result type for archiver operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error types for a single record's pipeline run
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for url: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("No data from {url} for {timeout:?}")]
    Stalled { url: String, timeout: std::time::Duration },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No video detail HTML pages found")]
    NoDetailPages,

    #[error("No media links found after checking {0} pages")]
    NoMediaLinks(usize),

    #[error("Nothing to merge")]
    NoSegments,

    #[error("{tool} failed: {detail}")]
    ToolFailed { tool: String, detail: String },

    #[error("Worklist error: {0}")]
    Worklist(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// HTTP status code, if this error came from a non-success response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            PipelineError::HttpStatus { status, .. } => Some(*status),
            PipelineError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_miss_messages() {
        assert_eq!(PipelineError::NoDetailPages.to_string(), "No video detail HTML pages found");
        assert_eq!(
            PipelineError::NoMediaLinks(3).to_string(),
            "No media links found after checking 3 pages"
        );
    }

    #[test]
    fn test_status_code() {
        let error = PipelineError::HttpStatus {
            status: 503,
            url: "https://www.example.com/".to_string(),
        };
        assert_eq!(error.status_code(), Some(503));
        assert_eq!(error.to_string(), "HTTP 503 for url: https://www.example.com/");
        assert_eq!(PipelineError::NoSegments.status_code(), None);

        let stalled = PipelineError::Stalled {
            url: "https://cdn.example.com/a.mp4".to_string(),
            timeout: std::time::Duration::from_millis(500),
        };
        assert_eq!(stalled.to_string(), "No data from https://cdn.example.com/a.mp4 for 500ms");
    }
}
