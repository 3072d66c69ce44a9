pub mod gender;
pub mod images;
pub mod price;
mod shopify;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

/// Structured draft extracted from one product document. Fields with a
/// missing DOM marker degrade to None/empty; only a titleless document is
/// treated as unusable.
#[derive(Debug, Default)]
pub struct Product {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub gender: Option<String>,
    pub price: Option<f64>,
    pub sale: bool,
    pub image_urls: Vec<String>,
    pub metadata: Map<String, Value>,
}

/// Extract a product draft from a product-page document.
/// Returns None when no title can be found anywhere (dropped product).
pub fn extract_product(html: &str) -> Option<Product> {
    let doc = Html::parse_document(html);
    let data = shopify::scan_scripts(&doc);
    let mut metadata = Map::new();

    let title = first_text(&doc, "h1")
        .or_else(|| meta_content(&doc, r#"meta[property="og:title"]"#))
        .or(data.title)?;

    let description = meta_content(&doc, r#"meta[property="og:description"]"#)
        .or_else(|| meta_content(&doc, r#"meta[name="description"]"#))
        .or(data.description);

    // Images in document order; embedded JSON fills in what the DOM missed.
    let mut image_urls = images::collect_image_urls(&doc);
    for raw in &data.images {
        if let Some(url) = images::normalize_image_url(raw) {
            if !image_urls.contains(&url) {
                image_urls.push(url);
            }
        }
    }

    let price_raw = visible_price_text(&doc);
    if let Some(raw) = &price_raw {
        metadata.insert("priceRaw".into(), Value::String(raw.clone()));
    }
    let dom_price = price_raw.as_deref().and_then(price::normalize_amount);
    let (price, sale) = price::price_and_sale(data.price.or(dom_price), data.compare_at);
    if sale {
        if let Some(compare_at) = data.compare_at {
            metadata.insert("compareAtPrice".into(), compare_at.into());
        }
    }
    if let Some(currency) = &data.currency {
        metadata.insert("priceCurrency".into(), Value::String(currency.clone()));
    }

    let breadcrumb = first_text(
        &doc,
        r#"[class*="breadcrumb"] a, nav a[href*="collections"]"#,
    );
    if let Some(crumb) = &breadcrumb {
        metadata.insert("breadcrumb".into(), Value::String(crumb.clone()));
    }

    let category = data
        .category
        .clone()
        .or_else(|| {
            first_text(
                &doc,
                r#"[class*="category"], .product-type, [class*="product-type"]"#,
            )
        })
        .or(breadcrumb)
        .and_then(|raw| tidy_category(&raw));

    for (key, value) in [
        ("tags", &data.tags),
        ("vendor", &data.vendor),
        ("handle", &data.handle),
        ("collections", &data.collections),
    ] {
        if let Some(value) = value {
            metadata.insert(key.into(), Value::String(value.clone()));
        }
    }

    let gender_parts: Vec<&str> = [
        category.as_deref(),
        data.tags.as_deref(),
        data.handle.as_deref(),
        data.collections.as_deref(),
        data.vendor.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();
    let gender = gender::infer_gender(&gender_parts);

    Some(Product {
        title,
        description,
        category,
        gender: gender.map(str::to_string),
        price,
        sale,
        image_urls,
        metadata,
    })
}

/// "Sweaters & Hoodies" -> "Sweaters, Hoodies".
fn tidy_category(raw: &str) -> Option<String> {
    let category = raw.trim();
    if category.is_empty() {
        return None;
    }
    if category.contains('&') {
        return Some(
            category
                .split('&')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        );
    }
    Some(category.to_string())
}

/// Text of price-classed elements that actually look like a price.
fn visible_price_text(doc: &Html) -> Option<String> {
    let selector = Selector::parse(r#"[class*="price"]"#).unwrap();
    let money = Regex::new(r"[$€]|USD|EUR|CZK|PLN|\d+[.,]\d+").unwrap();

    let mut parts: Vec<String> = Vec::new();
    for el in doc.select(&selector) {
        let text = el.text().collect::<String>().trim().to_string();
        if !text.is_empty() && money.is_match(&text) && !parts.contains(&text) {
            parts.push(text);
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).unwrap();
    doc.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).unwrap();
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn load(fixture: &str) -> Product {
        let html =
            std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        extract_product(&html).expect("fixture should yield a product")
    }

    #[test]
    fn hoodie_fields() {
        let p = load("hoodie");
        assert_eq!(p.title, "Cloud Hoodie");
        assert_eq!(
            p.description.as_deref(),
            Some("Heavyweight organic cotton hoodie with embroidered logo.")
        );
        assert_eq!(p.category.as_deref(), Some("Sweaters, Hoodies"));
        assert_eq!(p.gender.as_deref(), Some("man"));
        assert_eq!(p.price, Some(89.0));
        assert!(!p.sale);
        assert_eq!(p.metadata.get("handle").and_then(Value::as_str), Some("cloud-hoodie"));
    }

    #[test]
    fn hoodie_images_in_document_order() {
        let p = load("hoodie");
        assert_eq!(
            p.image_urls,
            vec![
                "https://emestudios.com/cdn/shop/files/2024_03_18EME201.webp".to_string(),
                "https://emestudios.com/cdn/shop/files/hoodie_back.webp".to_string(),
                "https://emestudios.com/cdn/shop/files/hoodie_detail.webp".to_string(),
            ]
        );
        let (canonical, additional) = images::split_canonical(&p.image_urls);
        assert_eq!(
            canonical.as_deref(),
            Some("https://emestudios.com/cdn/shop/files/2024_03_18EME201.webp")
        );
        assert_eq!(additional.len(), 2);
    }

    #[test]
    fn sale_dress_discount() {
        let p = load("sale_dress");
        assert_eq!(p.title, "Breeze Dress");
        assert_eq!(p.price, Some(59.0));
        assert!(p.sale);
        assert_eq!(p.gender.as_deref(), Some("woman"));
        assert_eq!(
            p.metadata.get("compareAtPrice").and_then(Value::as_f64),
            Some(89.0)
        );
    }

    #[test]
    fn missing_description_still_emitted() {
        let p = load("no_description");
        assert_eq!(p.title, "Logo Cap");
        assert_eq!(p.description, None);
        assert_eq!(p.price, None);
        assert!(!p.sale);
        assert!(!p.image_urls.is_empty());
    }

    #[test]
    fn untitled_document_dropped() {
        let html = std::fs::read_to_string("tests/fixtures/untitled.html").unwrap();
        assert!(extract_product(&html).is_none());
    }
}
