//! Media discovery over loosely structured content pages
//!
//! Discovery runs in two stages: the locator picks likely video detail pages
//! out of a content page, then the resolver turns each detail page into a
//! direct media URL. Both stages are ordered lists of small, independent
//! heuristics evaluated in a fixed priority order.

pub mod locator;
pub mod resolver;

pub use locator::DetailPageLocator;
pub use resolver::MediaLinkResolver;

/// Attribute access over a markup element.
///
/// Heuristics only need to read attributes, so they are written against this
/// trait rather than a concrete parser type.
pub trait MarkupElement {
    fn attr(&self, name: &str) -> Option<&str>;
}

impl MarkupElement for scraper::ElementRef<'_> {
    fn attr(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }
}

/// Truncate a diagnostic to at most `max_chars` characters
pub fn truncate_reason(reason: &str, max_chars: usize) -> String {
    reason.chars().take(max_chars).collect()
}
