//! Detail-page discovery on a content page
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

use super::MarkupElement;
use crate::config::ExtractionConfig;
use crate::error::{PipelineError, Result};

/// Decision of a single link rule
#[derive(Debug, Clone, PartialEq)]
pub enum LinkVerdict {
    /// Never a video page; stop evaluating rules for this link
    Reject,
    /// A video page at this target; stop evaluating rules for this link
    Accept(LinkTarget),
    /// No opinion; try the next rule
    Continue,
}

/// Accepted link value and what it is relative to
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    /// Resolved against the content page URL
    Href(String),
    /// Site-root relative path with the leading separator stripped
    SiteRoot(String),
}

/// Patterns and word lists the rules consult
pub struct LinkRules {
    image_suffixes: Vec<String>,
    provider_markers: Vec<String>,
    hash_page: Regex,
}

impl LinkRules {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let hash_page = Regex::new(r"(?i)[a-f0-9]{8,}-?hd")
            .map_err(|e| PipelineError::Configuration(format!("Invalid hash pattern: {}", e)))?;

        Ok(Self {
            image_suffixes: config
                .image_extensions
                .iter()
                .map(|ext| format!(".{}", ext.trim_start_matches('.').to_lowercase()))
                .collect(),
            provider_markers: config.provider_markers.clone(),
            hash_page,
        })
    }
}

pub type LinkRule = fn(&LinkRules, &str, &dyn MarkupElement) -> LinkVerdict;

/// Link rules in priority order; the first non-`Continue` verdict wins
pub const LINK_RULES: [(&str, LinkRule); 4] = [
    ("image-suffix", reject_image_links),
    ("video-marker", accept_video_marker),
    ("embed-reference", accept_embed_reference),
    ("html-video-page", accept_video_html_page),
];

fn reject_image_links(rules: &LinkRules, href: &str, _element: &dyn MarkupElement) -> LinkVerdict {
    let lower = href.to_lowercase();
    if rules.image_suffixes.iter().any(|suffix| lower.ends_with(suffix.as_str())) {
        LinkVerdict::Reject
    } else {
        LinkVerdict::Continue
    }
}

fn accept_video_marker(_rules: &LinkRules, href: &str, element: &dyn MarkupElement) -> LinkVerdict {
    if element.attr("data-type") == Some("video") {
        LinkVerdict::Accept(LinkTarget::Href(href.to_string()))
    } else {
        LinkVerdict::Continue
    }
}

fn accept_embed_reference(_rules: &LinkRules, _href: &str, element: &dyn MarkupElement) -> LinkVerdict {
    let eid = match element.attr("eid") {
        Some(eid) if eid.contains("/embed/") => eid,
        _ => return LinkVerdict::Continue,
    };

    let clean_path = eid.trim_start_matches('/');
    if clean_path.ends_with(".html") {
        LinkVerdict::Accept(LinkTarget::SiteRoot(clean_path.to_string()))
    } else {
        // An embed reference that is not a page rules the link out entirely
        LinkVerdict::Reject
    }
}

fn accept_video_html_page(rules: &LinkRules, href: &str, _element: &dyn MarkupElement) -> LinkVerdict {
    if !href.ends_with(".html") {
        return LinkVerdict::Continue;
    }

    if rules.hash_page.is_match(href) || rules.provider_markers.iter().any(|m| href.contains(m.as_str())) {
        LinkVerdict::Accept(LinkTarget::Href(href.to_string()))
    } else {
        LinkVerdict::Continue
    }
}

/// Evaluate the link rules for one element
pub fn classify_link(rules: &LinkRules, element: &dyn MarkupElement) -> Option<LinkTarget> {
    let href = element.attr("href")?.trim();

    for (name, rule) in LINK_RULES.iter() {
        match rule(rules, href, element) {
            LinkVerdict::Continue => continue,
            LinkVerdict::Reject => {
                debug!("✗ {} rejected by {}", href, name);
                return None;
            }
            LinkVerdict::Accept(target) => {
                debug!("✓ {} accepted by {}", href, name);
                return Some(target);
            }
        }
    }

    None
}

/// Finds the links on a content page that are likely single-video pages
pub struct DetailPageLocator {
    rules: LinkRules,
    container: Selector,
    links: Selector,
}

impl DetailPageLocator {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let container = Selector::parse(&config.content_container).map_err(|e| {
            PipelineError::Configuration(format!("Invalid container selector {}: {:?}", config.content_container, e))
        })?;
        let links = Selector::parse("a[href]")
            .map_err(|e| PipelineError::Configuration(format!("Invalid link selector: {:?}", e)))?;

        Ok(Self {
            rules: LinkRules::new(config)?,
            container,
            links,
        })
    }

    /// Return absolute, deduplicated detail-page URLs in first-seen order.
    ///
    /// An empty result means nothing on the page looked like a video page.
    pub fn locate(&self, html: &str, page_url: &str) -> Result<Vec<String>> {
        let base = Url::parse(page_url).map_err(|e| PipelineError::InvalidUrl(format!("{}: {}", page_url, e)))?;
        let document = Html::parse_document(html);

        let anchors: Vec<ElementRef> = match document.select(&self.container).next() {
            Some(container) => {
                debug!("Scanning primary content container");
                container.select(&self.links).collect()
            }
            None => {
                debug!("No content container, scanning whole document");
                document.select(&self.links).collect()
            }
        };

        let mut seen = HashSet::new();
        let mut urls = Vec::new();

        for anchor in anchors {
            let target = match classify_link(&self.rules, &anchor) {
                Some(target) => target,
                None => continue,
            };

            let absolute = match resolve_target(&base, &target) {
                Some(url) => url,
                None => {
                    debug!("Could not resolve {:?} against {}", target, base);
                    continue;
                }
            };

            if seen.insert(absolute.clone()) {
                urls.push(absolute);
            }
        }

        info!("🔗 Found {} candidate detail pages on {}", urls.len(), page_url);
        Ok(urls)
    }
}

fn resolve_target(base: &Url, target: &LinkTarget) -> Option<String> {
    let joined = match target {
        LinkTarget::Href(href) => base.join(href),
        LinkTarget::SiteRoot(path) => match Url::parse(path) {
            Ok(url) => Ok(url),
            Err(_) => base.join(&format!("/{}", path)),
        },
    };
    joined.ok().map(String::from)
}
