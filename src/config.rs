use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Row constant: which deployment wrote the record. Part of the persisted
/// id derivation, so it must never change between runs.
pub const SOURCE: &str = "scraper";
pub const BRAND: &str = "Eme Studios";

/// Base URL for resolving relative links and bare CDN paths.
pub const BASE_URL: &str = "https://emestudios.com";

/// Category listing pages to scrape, in order.
pub const CATEGORIES: &[(&str, &str)] = &[
    (
        "all-products",
        "https://emestudios.com/en-at/collections/all-products-old-ef689c",
    ),
    (
        "accessories",
        "https://emestudios.com/en-at/collections/accessories",
    ),
];

/// Filename pattern for "plain product on white" CDN images
/// (YYYY_MM_DDEME*.webp). The first URL matching this becomes the record's
/// canonical `image_url`; everything else lands in `additional_images`.
pub const CANONICAL_IMAGE_PATTERN: &str = r"/\d{4}_\d{2}_\d{2}EME\w*\.webp$";

// Infinite-scroll tuning. The listing keeps loading cards until a full
// scroll cycle yields no new product links; MAX_SCROLL_CYCLES caps the loop
// so a page that never settles cannot hang a run.
pub const SCROLL_PAUSE: Duration = Duration::from_secs(5);
pub const MAX_SCROLL_CYCLES: usize = 50;

pub const LISTING_NAV_TIMEOUT: Duration = Duration::from_secs(60);
pub const PRODUCT_NAV_TIMEOUT: Duration = Duration::from_secs(30);

/// Encoder served behind the OpenAI-compatible embeddings endpoint.
/// 768-dim image and text vectors from the same model.
pub const EMBEDDING_MODEL: &str = "google/siglip-base-patch16-384";
pub const EMBEDDING_DIM: usize = 768;

pub const UPSERT_BATCH: usize = 50;

/// Runtime configuration from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_key: String,
    pub embeddings_url: String,
}

impl Config {
    /// Load from the environment, reading `.env` first if present.
    /// Missing Supabase credentials are a fatal startup error.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            supabase_url: env::var("SUPABASE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .ok()
                .filter(|v| !v.is_empty())
                .context("SUPABASE_URL must be set")?,
            supabase_key: env::var("SUPABASE_KEY")
                .map(|v| v.trim().to_string())
                .ok()
                .filter(|v| !v.is_empty())
                .context("SUPABASE_KEY must be set")?,
            embeddings_url: env::var("EMBEDDINGS_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:7997".to_string()),
        })
    }
}
