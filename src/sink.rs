use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{info, warn};

use crate::config::{self, Config};
use crate::record::ProductRecord;

/// Outcome of one upsert pass.
pub struct UpsertStats {
    pub written: usize,
    pub failed: usize,
}

/// Writer for the hosted products table, via PostgREST. Conflicts on
/// (source, product_url) resolve by overwriting the existing row.
pub struct SupabaseSink {
    client: reqwest::Client,
    endpoint: String,
}

impl SupabaseSink {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&config.supabase_key).context("invalid Supabase key")?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.supabase_key))
                .context("invalid Supabase key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "prefer",
            HeaderValue::from_static("resolution=merge-duplicates"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .context("failed to build Supabase HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/products", config.supabase_url),
        })
    }

    /// Upsert records in batches. A failed batch is logged with the
    /// product URLs it carried and counted; remaining batches still run.
    pub async fn upsert(&self, records: &[ProductRecord]) -> UpsertStats {
        let mut stats = UpsertStats {
            written: 0,
            failed: 0,
        };

        for batch in records.chunks(config::UPSERT_BATCH) {
            match self.upsert_batch(batch).await {
                Ok(()) => stats.written += batch.len(),
                Err(e) => {
                    let urls: Vec<&str> = batch.iter().map(|r| r.product_url.as_str()).collect();
                    warn!("upsert batch failed: {:#}; records: {}", e, urls.join(", "));
                    stats.failed += batch.len();
                }
            }
        }

        info!("upserted {} rows ({} failed)", stats.written, stats.failed);
        stats
    }

    async fn upsert_batch(&self, batch: &[ProductRecord]) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("on_conflict", "source,product_url")])
            .json(batch)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("Supabase returned {}: {}", status, body);
        }
        Ok(())
    }
}
