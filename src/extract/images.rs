use regex::Regex;
use scraper::{Html, Selector};

use crate::config;

/// Gather candidate product-image URLs from a product document, in document
/// order, first occurrence wins. Sources: img/source srcsets, lazy-load
/// data attributes and direct CDN links; `og:image` as a last resort.
pub fn collect_image_urls(doc: &Html) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    let media = Selector::parse(
        r#"img[src*="cdn/shop"], img[src*="emestudios"], source[srcset*="cdn/shop"]"#,
    )
    .unwrap();
    for el in doc.select(&media) {
        let raw = el.value().attr("src").or_else(|| el.value().attr("srcset"));
        if let Some(raw) = raw {
            for candidate in srcset_candidates(raw) {
                if let Some(url) = normalize_image_url(candidate) {
                    if (url.contains("/files/") || url.contains("/products/"))
                        && !urls.contains(&url)
                    {
                        urls.push(url);
                    }
                }
            }
        }
    }

    let lazy = Selector::parse(r#"[data-src*="cdn/shop"], a[href*="cdn/shop/files"]"#).unwrap();
    for el in doc.select(&lazy) {
        let raw = el.value().attr("data-src").or_else(|| el.value().attr("href"));
        if let Some(url) = raw.and_then(normalize_image_url) {
            if url.contains("/files/") && !urls.contains(&url) {
                urls.push(url);
            }
        }
    }

    if urls.is_empty() {
        let og = Selector::parse(r#"meta[property="og:image"]"#).unwrap();
        if let Some(url) = doc
            .select(&og)
            .next()
            .and_then(|el| el.value().attr("content"))
            .and_then(normalize_image_url)
        {
            urls.push(url);
        }
    }

    urls
}

/// Individual URL tokens of a srcset-like attribute ("url 400w, url 800w").
fn srcset_candidates(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').filter_map(|part| {
        let token = part.trim().split_whitespace().next()?;
        (token.contains("cdn/shop") || token.contains("emestudios")).then_some(token)
    })
}

/// Normalize an image URL: strip the query, resolve protocol-relative and
/// root-relative forms, and repair bare CDN paths and doubled-domain URLs
/// (emestudios.com//emestudios.com/...).
pub fn normalize_image_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() {
        return None;
    }
    let url = url.split('?').next().unwrap_or(url);
    let base = config::BASE_URL.trim_end_matches('/');

    if url.starts_with("http://") || url.starts_with("https://") {
        return Some(url.to_string());
    }
    if url.starts_with("//") {
        return Some(format!("https:{}", url));
    }
    if url.starts_with('/') {
        return Some(format!("{}{}", base, url));
    }
    if let Some(idx) = url.find("cdn/shop/files/") {
        return Some(format!("{}/{}", base, &url[idx..]));
    }
    if let Some(idx) = url.find("emestudios.com") {
        let path = url[idx + "emestudios.com".len()..].trim_start_matches('/');
        return Some(format!("{}/{}", base, path));
    }
    Some(format!("{}/{}", base, url.trim_start_matches('/')))
}

/// Split image URLs into the canonical plain-product image and the rest.
/// The first URL matching the canonical filename pattern wins; every other
/// URL, matching or not, stays in `additional` in original order. With no
/// match at all the canonical slot stays empty.
pub fn split_canonical(urls: &[String]) -> (Option<String>, Vec<String>) {
    let pattern = Regex::new(config::CANONICAL_IMAGE_PATTERN).unwrap();
    let mut canonical: Option<String> = None;
    let mut additional: Vec<String> = Vec::new();

    for url in urls {
        let url = url.trim();
        if url.is_empty() {
            continue;
        }
        if canonical.is_none() && pattern.is_match(url) {
            canonical = Some(url.to_string());
        } else {
            additional.push(url.to_string());
        }
    }
    (canonical, additional)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_match_becomes_canonical() {
        let urls = strings(&[
            "https://cdn/files/2024_05_10EMEshoe.webp",
            "https://cdn/files/extra1.webp",
        ]);
        let (canonical, additional) = split_canonical(&urls);
        assert_eq!(canonical.as_deref(), Some("https://cdn/files/2024_05_10EMEshoe.webp"));
        assert_eq!(additional, strings(&["https://cdn/files/extra1.webp"]));
    }

    #[test]
    fn zero_matches_leaves_canonical_empty() {
        let urls = strings(&[
            "https://cdn/files/lookbook1.webp",
            "https://cdn/files/lookbook2.webp",
        ]);
        let (canonical, additional) = split_canonical(&urls);
        assert_eq!(canonical, None);
        assert_eq!(additional, urls);
    }

    #[test]
    fn later_matches_stay_additional_in_order() {
        let urls = strings(&[
            "https://cdn/files/detail.webp",
            "https://emestudios.com/cdn/shop/files/2024_01_05EME102.webp",
            "https://emestudios.com/cdn/shop/files/2024_01_06EME103.webp",
        ]);
        let (canonical, additional) = split_canonical(&urls);
        assert_eq!(
            canonical.as_deref(),
            Some("https://emestudios.com/cdn/shop/files/2024_01_05EME102.webp")
        );
        assert_eq!(
            additional,
            strings(&[
                "https://cdn/files/detail.webp",
                "https://emestudios.com/cdn/shop/files/2024_01_06EME103.webp",
            ])
        );
    }

    #[test]
    fn canonical_never_in_additional() {
        let urls = strings(&["https://cdn/files/2024_05_10EMEshoe.webp"]);
        let (canonical, additional) = split_canonical(&urls);
        assert!(canonical.is_some());
        assert!(additional.is_empty());
    }

    #[test]
    fn protocol_relative_url() {
        assert_eq!(
            normalize_image_url("//emestudios.com/cdn/shop/files/a.webp").as_deref(),
            Some("https://emestudios.com/cdn/shop/files/a.webp")
        );
    }

    #[test]
    fn root_relative_url() {
        assert_eq!(
            normalize_image_url("/cdn/shop/files/a.webp?v=2").as_deref(),
            Some("https://emestudios.com/cdn/shop/files/a.webp")
        );
    }

    #[test]
    fn bare_cdn_path_repaired() {
        assert_eq!(
            normalize_image_url("emestudios.com//emestudios.com/cdn/shop/files/a.webp").as_deref(),
            Some("https://emestudios.com/cdn/shop/files/a.webp")
        );
    }
}
