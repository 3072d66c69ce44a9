use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use url::Url;

use crate::browser::PageDriver;
use crate::config;

/// Open a category listing, run the infinite-scroll loop and return the
/// product-page URLs observed, in first-seen order.
///
/// The loop stops when a full scroll cycle yields no new fragments, or
/// after MAX_SCROLL_CYCLES if the page never settles. `limit` caps the
/// number of links returned (faster test runs).
pub async fn collect_product_links(
    driver: &dyn PageDriver,
    category_url: &str,
    limit: Option<usize>,
) -> Result<Vec<String>> {
    driver.goto(category_url, config::LISTING_NAV_TIMEOUT).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let mut seen: HashSet<String> = HashSet::new();
    let mut links: Vec<String> = Vec::new();

    for cycle in 0..config::MAX_SCROLL_CYCLES {
        let before = links.len();
        for href in driver.extract_fragments().await? {
            if let Some(url) = normalize_product_url(&href) {
                if seen.insert(url.clone()) {
                    links.push(url);
                }
            }
        }

        if let Some(max) = limit {
            if links.len() >= max {
                links.truncate(max);
                break;
            }
        }

        // A cycle that added nothing means the listing has stopped loading.
        if cycle > 0 && links.len() == before {
            break;
        }

        driver.scroll_to_bottom().await?;
        tokio::time::sleep(config::SCROLL_PAUSE).await;
    }

    info!("{}: {} product links", category_url, links.len());
    Ok(links)
}

/// Absolute product URL in the en-at locale, query stripped.
/// Returns None for anchors that are not product pages.
pub fn normalize_product_url(href: &str) -> Option<String> {
    if href.is_empty() || href.starts_with('#') || href.contains("javascript:") {
        return None;
    }
    let base = Url::parse(config::BASE_URL).ok()?;
    let mut url = base.join(href).ok()?.to_string();

    // Listing pages occasionally link other locales; keep ids consistent.
    if !url.contains("/en-at/") && url.contains("/en-") {
        url = url.replace("/en-us/", "/en-at/").replace("/en-gb/", "/en-at/");
    }
    if !url.contains("/products/") {
        return None;
    }
    Some(url.split('?').next().unwrap_or(&url).to_string())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Driver whose DOM "grows" by one batch per scroll.
    struct StubDriver {
        batches: Vec<Vec<&'static str>>,
        scrolls: AtomicUsize,
    }

    impl StubDriver {
        fn new(batches: Vec<Vec<&'static str>>) -> Self {
            Self {
                batches,
                scrolls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageDriver for StubDriver {
        async fn goto(&self, _url: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn scroll_to_bottom(&self) -> Result<()> {
            self.scrolls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn extract_fragments(&self) -> Result<Vec<String>> {
            let i = self
                .scrolls
                .load(Ordering::SeqCst)
                .min(self.batches.len() - 1);
            Ok(self.batches[i].iter().map(|s| s.to_string()).collect())
        }

        async fn content(&self) -> Result<String> {
            Ok(String::new())
        }
    }

    const A: &str = "https://emestudios.com/en-at/products/alpha";
    const B: &str = "https://emestudios.com/en-at/products/beta";

    #[tokio::test(start_paused = true)]
    async fn stops_after_quiet_cycle() {
        let driver = StubDriver::new(vec![vec![A], vec![A, B], vec![A, B]]);
        let links = collect_product_links(&driver, "https://emestudios.com/c", None)
            .await
            .unwrap();
        assert_eq!(links, vec![A.to_string(), B.to_string()]);
        // initial batch, growth, then one quiet cycle ends the loop
        assert!(driver.scrolls.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_listing_terminates() {
        let driver = StubDriver::new(vec![vec![]]);
        let links = collect_product_links(&driver, "https://emestudios.com/c", None)
            .await
            .unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn limit_caps_links() {
        let driver = StubDriver::new(vec![vec![A, B]]);
        let links = collect_product_links(&driver, "https://emestudios.com/c", Some(1))
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn relative_href_resolves() {
        assert_eq!(
            normalize_product_url("/en-at/products/hoodie").as_deref(),
            Some("https://emestudios.com/en-at/products/hoodie")
        );
    }

    #[test]
    fn query_is_stripped() {
        assert_eq!(
            normalize_product_url("https://emestudios.com/en-at/products/hoodie?variant=1")
                .as_deref(),
            Some("https://emestudios.com/en-at/products/hoodie")
        );
    }

    #[test]
    fn locale_is_normalized() {
        assert_eq!(
            normalize_product_url("https://emestudios.com/en-us/products/hoodie").as_deref(),
            Some("https://emestudios.com/en-at/products/hoodie")
        );
    }

    #[test]
    fn non_product_links_rejected() {
        assert_eq!(normalize_product_url("/en-at/collections/all"), None);
        assert_eq!(normalize_product_url("#main"), None);
        assert_eq!(normalize_product_url("javascript:void(0)"), None);
    }
}
