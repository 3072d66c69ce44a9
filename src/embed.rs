use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config;
use crate::extract::Product;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 500;

/// Encoder capability: fixed-length vectors for images and text. The
/// pipeline only depends on this trait, so the backing model or service
/// can be swapped without touching pipeline logic.
#[async_trait]
pub trait Embedder {
    async fn embed_image(&self, image: &[u8], mime: &str) -> Result<Vec<f32>>;
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;
}

/// Client for an OpenAI-compatible embeddings endpoint serving the SigLIP
/// encoder. Images travel as base64 data URIs; text as plain strings.
pub struct RemoteEncoder {
    client: reqwest::Client,
    endpoint: String,
    model: &'static str,
}

impl RemoteEncoder {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build embeddings HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: config::EMBEDDING_MODEL,
        })
    }

    /// One inference round-trip before any category is processed, so a
    /// dead encoder aborts the run while it is still cheap.
    pub async fn probe(&self) -> Result<()> {
        self.embed_text("probe").await.map(|_| ())
    }

    async fn request(&self, input: &str) -> Result<Vec<f32>> {
        let mut attempt = 0u32;
        loop {
            let body = EmbeddingRequest {
                model: self.model,
                input: [input],
            };
            let response = self.client.post(&self.endpoint).json(&body).send().await;
            match response {
                Ok(resp) if resp.status().is_success() => {
                    let mut parsed: EmbeddingResponse = resp
                        .json()
                        .await
                        .context("failed to parse embedding response")?;
                    parsed.data.sort_by_key(|entry| entry.index);
                    let vector = parsed
                        .data
                        .into_iter()
                        .next()
                        .context("empty embedding response")?
                        .embedding;
                    anyhow::ensure!(
                        vector.len() == config::EMBEDDING_DIM,
                        "encoder returned {} dims, expected {}",
                        vector.len(),
                        config::EMBEDDING_DIM
                    );
                    return Ok(vector);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if retryable && attempt < MAX_RETRIES {
                        attempt += 1;
                        backoff(attempt).await;
                        continue;
                    }
                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    anyhow::bail!("embedding request failed ({}): {}", status, body);
                }
                Err(err) => {
                    if (err.is_timeout() || err.is_connect()) && attempt < MAX_RETRIES {
                        attempt += 1;
                        backoff(attempt).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

async fn backoff(attempt: u32) {
    let delay = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt.min(5)));
    warn!("embedding request retry {} in {:?}", attempt, delay);
    tokio::time::sleep(delay).await;
}

#[async_trait]
impl Embedder for RemoteEncoder {
    async fn embed_image(&self, image: &[u8], mime: &str) -> Result<Vec<f32>> {
        let data_uri = format!("data:{};base64,{}", mime, STANDARD.encode(image));
        self.request(&data_uri).await
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        let text = if text.is_empty() { " " } else { text };
        self.request(text).await
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Download the canonical product image for embedding.
pub async fn fetch_image(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("image fetch failed for {}", url))?;
    Ok(response.bytes().await?.to_vec())
}

pub fn mime_for_url(url: &str) -> &'static str {
    let path = url.split('?').next().unwrap_or(url);
    match path.rsplit('.').next() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "image/webp",
    }
}

/// Text input for info_embedding: title, description, category, gender,
/// price, metadata, in that fixed order, missing fields omitted so
/// formatting noise cannot shift the vector. Truncated to 2000 chars for
/// the encoder's input limit.
pub fn compose_info_text(product: &Product) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.push(product.title.clone());
    if let Some(description) = &product.description {
        parts.push(description.clone());
    }
    if let Some(category) = &product.category {
        parts.push(category.clone());
    }
    if let Some(gender) = &product.gender {
        parts.push(gender.clone());
    }
    if let Some(price) = product.price {
        parts.push(format_price(price));
    }
    if !product.metadata.is_empty() {
        if let Ok(meta) = serde_json::to_string(&product.metadata) {
            parts.push(meta);
        }
    }

    let text = parts
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();
    let text = if text.is_empty() {
        product.title.clone()
    } else {
        text
    };
    truncate_chars(text, 2000)
}

fn format_price(price: f64) -> String {
    let formatted = format!("{:.2}", price);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn truncate_chars(text: String, max: usize) -> String {
    if text.chars().count() <= max {
        text
    } else {
        text.chars().take(max).collect()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        let mut metadata = serde_json::Map::new();
        metadata.insert("tags".into(), serde_json::Value::String("men, organic".into()));
        Product {
            title: "Cloud Hoodie".into(),
            description: Some("Heavyweight organic cotton hoodie.".into()),
            category: Some("Sweaters, Hoodies".into()),
            gender: Some("man".into()),
            price: Some(89.0),
            sale: false,
            image_urls: Vec::new(),
            metadata,
        }
    }

    #[test]
    fn info_text_is_deterministic() {
        let p = product();
        assert_eq!(compose_info_text(&p), compose_info_text(&p));
    }

    #[test]
    fn info_text_fixed_order() {
        assert_eq!(
            compose_info_text(&product()),
            "Cloud Hoodie Heavyweight organic cotton hoodie. Sweaters, Hoodies man 89 \
             {\"tags\":\"men, organic\"}"
        );
    }

    #[test]
    fn missing_fields_omitted_not_blank() {
        let mut p = product();
        p.description = None;
        p.gender = None;
        p.metadata = serde_json::Map::new();
        assert_eq!(compose_info_text(&p), "Cloud Hoodie Sweaters, Hoodies 89");
    }

    #[test]
    fn long_text_truncated_on_char_boundary() {
        let mut p = product();
        p.description = Some("é".repeat(3000));
        let text = compose_info_text(&p);
        assert_eq!(text.chars().count(), 2000);
    }

    #[test]
    fn price_formatting_trims_zeroes() {
        assert_eq!(format_price(89.0), "89");
        assert_eq!(format_price(89.9), "89.9");
        assert_eq!(format_price(89.95), "89.95");
    }

    #[test]
    fn mime_inferred_from_extension() {
        assert_eq!(mime_for_url("https://c/a.webp?v=1"), "image/webp");
        assert_eq!(mime_for_url("https://c/a.png"), "image/png");
        assert_eq!(mime_for_url("https://c/a.jpg"), "image/jpeg");
    }
}
