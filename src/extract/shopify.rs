use scraper::{Html, Selector};
use serde_json::Value;

use super::price;

/// Product data recovered from embedded JSON blobs: Schema.org Product
/// nodes and Shopify theme product JSON. Every field is optional; the DOM
/// pass fills whatever is still missing.
#[derive(Debug, Default)]
pub struct ScriptData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub compare_at: Option<f64>,
    pub currency: Option<String>,
    pub images: Vec<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub vendor: Option<String>,
    pub handle: Option<String>,
    pub collections: Option<String>,
}

/// Scan application/json and ld+json script tags for product data.
/// Later blobs only fill fields earlier ones left empty.
pub fn scan_scripts(doc: &Html) -> ScriptData {
    let scripts =
        Selector::parse(r#"script[type="application/json"], script[type="application/ld+json"]"#)
            .unwrap();
    let mut out = ScriptData::default();

    for script in doc.select(&scripts) {
        let text: String = script.text().collect();
        let Ok(json) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        match &json {
            Value::Array(items) => {
                if let Some(product) = items.iter().find(|item| is_schema_product(item)) {
                    merge_schema_product(&mut out, product);
                }
            }
            Value::Object(obj) => {
                if is_schema_product(&json) {
                    merge_schema_product(&mut out, &json);
                } else if let Some(product) = obj
                    .get("product")
                    .or_else(|| obj.get("products").and_then(|list| list.get(0)))
                {
                    merge_shopify_product(&mut out, product);
                }
            }
            _ => {}
        }
    }
    out
}

fn is_schema_product(value: &Value) -> bool {
    value.get("@type").and_then(Value::as_str) == Some("Product")
}

fn merge_schema_product(out: &mut ScriptData, product: &Value) {
    fill(&mut out.title, str_field(product, "name"));
    fill(&mut out.description, str_field(product, "description"));

    // offers may be a single object or a list
    let offer = product.get("offers").map(|offers| match offers {
        Value::Array(list) => list.first().unwrap_or(offers),
        other => other,
    });
    if let Some(offer) = offer {
        if out.price.is_none() {
            out.price = offer.get("price").and_then(price::amount_from_json);
        }
        fill(&mut out.currency, str_field(offer, "priceCurrency"));
    }

    if let Some(image) = product.get("image") {
        push_images(&mut out.images, image, &["url"]);
    }
}

fn merge_shopify_product(out: &mut ScriptData, product: &Value) {
    fill(&mut out.title, str_field(product, "title"));
    fill(&mut out.description, str_field(product, "description"));

    if let Some(variant) = product.get("variants").and_then(|v| v.get(0)) {
        if out.price.is_none() {
            out.price = variant.get("price").and_then(price::amount_from_json);
        }
        if out.compare_at.is_none() {
            out.compare_at = variant
                .get("compare_at_price")
                .and_then(price::amount_from_json);
        }
        fill(&mut out.currency, str_field(variant, "price_currency"));
    }

    if let Some(images) = product.get("images") {
        push_images(&mut out.images, images, &["src", "url"]);
    }
    if let Some(media) = product.get("media").and_then(Value::as_array) {
        for item in media {
            let url = str_field(item, "src").or_else(|| {
                item.get("preview_image")
                    .and_then(|p| str_field(p, "src"))
            });
            if let Some(url) = url {
                out.images.push(url);
            }
        }
    }

    fill(&mut out.category, str_field(product, "type"));
    fill(&mut out.vendor, str_field(product, "vendor"));
    fill(&mut out.handle, str_field(product, "handle"));

    if out.tags.is_none() {
        out.tags = match product.get("tags") {
            Some(Value::Array(tags)) => Some(
                tags.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Some(Value::String(tags)) => Some(tags.clone()),
            _ => None,
        }
        .filter(|t| !t.is_empty());
    }

    if out.collections.is_none() {
        if let Some(collections) = product.get("collections").and_then(Value::as_array) {
            let joined = collections
                .iter()
                .filter_map(|c| str_field(c, "title").or_else(|| str_field(c, "handle")))
                .collect::<Vec<_>>()
                .join(", ");
            if !joined.is_empty() {
                out.collections = Some(joined);
            }
        }
    }
}

/// Image entries come as bare strings or objects with a URL-ish key.
fn push_images(into: &mut Vec<String>, value: &Value, keys: &[&str]) {
    let items = match value {
        Value::Array(list) => list.iter().collect::<Vec<_>>(),
        other => vec![other],
    };
    for item in items {
        let url = match item {
            Value::String(s) => Some(s.clone()),
            obj => keys.iter().find_map(|k| str_field(obj, k)),
        };
        if let Some(url) = url {
            into.push(url);
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}
