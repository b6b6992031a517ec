use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::info;
use video_archiver::download::absolutize_media_url;
use video_archiver::{Config, DetailPageLocator, HttpSource, MediaLinkResolver, ReqwestSource};

/// Show which detail pages and media links a content page yields, without downloading
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("video_archiver=info")
        .init();

    let page_url = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: probe-page <content page URL>"))?;

    let config = Config::load().unwrap_or_else(|_| Config::from_env());
    let http: Arc<dyn HttpSource> = Arc::new(ReqwestSource::new(&config.http)?);

    info!("🌐 Fetching {}", page_url);
    let html = http.fetch_page(&page_url, config.http.page_timeout()).await?;

    let locator = DetailPageLocator::new(&config.extraction)?;
    let detail_urls = locator.locate(&html, &page_url)?;
    if detail_urls.is_empty() {
        info!("❌ No video detail HTML pages found");
        return Ok(());
    }

    let resolver = MediaLinkResolver::new(http.clone(), &config.extraction, config.http.detail_timeout())?;
    let mut resolved = 0;
    for (index, detail_url) in detail_urls.iter().enumerate() {
        match resolver.resolve(detail_url).await {
            Ok(media_url) => {
                resolved += 1;
                info!("✅ {:02} {} -> {}", index, detail_url, absolutize_media_url(&media_url));
            }
            Err(reason) => info!("❌ {:02} {} ({})", index, detail_url, reason),
        }
    }

    info!("📊 {} of {} detail pages resolved", resolved, detail_urls.len());
    Ok(())
}
