use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config;
use crate::extract::Product;

/// Upsert-ready row for the products table. Embedding fields are omitted
/// from the payload when absent, so a skip-embeddings run does not erase
/// vectors written by an earlier full run; every other column is always
/// sent and fully replaced on conflict.
#[derive(Debug, Clone, Serialize)]
pub struct ProductRecord {
    pub id: String,
    pub source: &'static str,
    pub product_url: String,
    pub brand: &'static str,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub gender: Option<String>,
    pub price: Option<f64>,
    pub sale: bool,
    pub second_hand: bool,
    pub country: Option<String>,
    pub image_url: Option<String>,
    pub additional_images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_embedding: Option<Vec<f32>>,
    pub metadata: Option<String>,
    pub created_at: String,
}

/// Stable row id: products are keyed by (source, product_url), never by a
/// freshly generated id.
pub fn product_id(product_url: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", config::SOURCE, product_url).as_bytes());
    hex::encode(digest)
}

/// Merge extractor, classifier and embedding output into one record.
/// Pure apart from the `created_at` clock read.
pub fn assemble(
    product: Product,
    product_url: &str,
    image_url: Option<String>,
    additional_images: Vec<String>,
    image_embedding: Option<Vec<f32>>,
    info_embedding: Option<Vec<f32>>,
) -> ProductRecord {
    let metadata = if product.metadata.is_empty() {
        None
    } else {
        serde_json::to_string(&Value::Object(product.metadata)).ok()
    };

    ProductRecord {
        id: product_id(product_url),
        source: config::SOURCE,
        product_url: product_url.to_string(),
        brand: config::BRAND,
        title: product.title,
        description: product.description.filter(|d| !d.trim().is_empty()),
        category: product.category,
        gender: product.gender,
        price: product.price,
        sale: product.sale,
        second_hand: false,
        country: None,
        image_url,
        additional_images,
        image_embedding,
        info_embedding,
        metadata,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}
