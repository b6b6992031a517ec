//! Direct media-link resolution on a video detail page
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::truncate_reason;
use crate::config::ExtractionConfig;
use crate::error::{PipelineError, Result};
use crate::http::HttpSource;

/// Longest failure reason reported for a detail page
pub const MAX_REASON_CHARS: usize = 70;

pub const NO_PATTERN_REASON: &str = "No media link pattern found";

/// Media URL, or the reason none was found
pub type Resolution = std::result::Result<String, String>;

/// Compiled patterns the strategies consult
pub struct MediaPatterns {
    /// Lowercase media suffix with its dot, e.g. ".mp4"
    suffix: String,
    download_button: Regex,
    direct_link: Regex,
    fallback_button: Regex,
    links: Selector,
    buttons: Selector,
    classed_buttons: Selector,
}

impl MediaPatterns {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let extension = config.media_extension.trim_start_matches('.').to_lowercase();
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| PipelineError::Configuration(format!("Invalid pattern {}: {}", pattern, e)))
        };
        let select = |selector: &str| {
            Selector::parse(selector)
                .map_err(|e| PipelineError::Configuration(format!("Invalid selector {}: {:?}", selector, e)))
        };

        Ok(Self {
            download_button: compile(r"(?i)download|single-video-download")?,
            direct_link: compile(format!(r"(?i)\.{}(?:$|\?|#)", regex::escape(&extension)).as_str())?,
            fallback_button: compile(r"(?i)download|btn.*down")?,
            suffix: format!(".{}", extension),
            links: select("a[href]")?,
            buttons: select("button")?,
            classed_buttons: select("button[class]")?,
        })
    }

    fn has_media_suffix(&self, href: &str) -> bool {
        href.to_lowercase().contains(&self.suffix)
    }
}

pub type MediaStrategy = fn(&MediaPatterns, &Html) -> Option<String>;

/// Strategies in priority order; the first match wins
pub const MEDIA_STRATEGIES: [(&str, MediaStrategy); 3] = [
    ("download-button-link", find_download_button_link),
    ("direct-media-link", find_direct_media_link),
    ("button-parent-link", find_button_parent_link),
];

/// A link wrapping a download button
fn find_download_button_link(patterns: &MediaPatterns, document: &Html) -> Option<String> {
    for link in document.select(&patterns.links) {
        let has_download_button = link.select(&patterns.buttons).any(|button| {
            button
                .value()
                .attr("class")
                .map_or(false, |class| patterns.download_button.is_match(class))
        });

        if has_download_button {
            if let Some(href) = link.value().attr("href") {
                if patterns.has_media_suffix(href) {
                    return Some(href.to_string());
                }
            }
        }
    }
    None
}

/// Any link whose target ends in the media suffix
fn find_direct_media_link(patterns: &MediaPatterns, document: &Html) -> Option<String> {
    document
        .select(&patterns.links)
        .filter_map(|link| link.value().attr("href"))
        .find(|href| patterns.direct_link.is_match(href))
        .map(str::to_string)
}

/// A download-looking button inside a link
fn find_button_parent_link(patterns: &MediaPatterns, document: &Html) -> Option<String> {
    for button in document.select(&patterns.classed_buttons) {
        let is_download = button
            .value()
            .attr("class")
            .map_or(false, |class| patterns.fallback_button.is_match(class));
        if !is_download {
            continue;
        }

        let parent = button
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|element| element.value().name() == "a");

        if let Some(href) = parent.and_then(|a| a.value().attr("href")) {
            if patterns.has_media_suffix(href) {
                return Some(href.to_string());
            }
        }
    }
    None
}

/// Resolves a video detail page to one direct media URL
pub struct MediaLinkResolver {
    http: Arc<dyn HttpSource>,
    patterns: MediaPatterns,
    timeout: Duration,
}

impl MediaLinkResolver {
    pub fn new(http: Arc<dyn HttpSource>, config: &ExtractionConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http,
            patterns: MediaPatterns::new(config)?,
            timeout,
        })
    }

    /// Fetch a detail page and resolve its media link.
    ///
    /// Never fails outright: fetch errors become the `Err` reason.
    pub async fn resolve(&self, detail_url: &str) -> Resolution {
        debug!("🔍 Resolving media link on {}", detail_url);

        let html = match self.http.fetch_page(detail_url, self.timeout).await {
            Ok(html) => html,
            Err(e) => return Err(fetch_failure_reason(&e)),
        };

        let resolution = self.resolve_markup(&html);
        match &resolution {
            Ok(url) => info!("🎬 Media link on {}: {}", detail_url, url),
            Err(reason) => debug!("No media link on {}: {}", detail_url, reason),
        }
        resolution
    }

    /// Run the strategies against already fetched markup
    pub fn resolve_markup(&self, html: &str) -> Resolution {
        let document = Html::parse_document(html);

        for (name, strategy) in MEDIA_STRATEGIES.iter() {
            if let Some(url) = strategy(&self.patterns, &document) {
                debug!("Strategy {} matched {}", name, url);
                return Ok(url);
            }
        }

        Err(NO_PATTERN_REASON.to_string())
    }
}

fn fetch_failure_reason(error: &PipelineError) -> String {
    let reason = match error.status_code() {
        Some(status) => format!("HTTP {}", status),
        None => error.to_string(),
    };
    truncate_reason(&reason, MAX_REASON_CHARS)
}
