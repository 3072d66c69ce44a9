mod browser;
mod catalog;
mod config;
mod embed;
mod extract;
mod record;
mod sink;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use browser::{BrowserSession, PageDriver};
use config::Config;
use embed::{Embedder, RemoteEncoder};
use sink::SupabaseSink;

#[derive(Parser)]
#[command(
    name = "eme_scraper",
    about = "Eme Studios catalog scraper with image/text embeddings"
)]
struct Cli {
    /// Run the browser with a visible window
    #[arg(long)]
    no_headless: bool,
    /// Skip embedding inference (faster for testing)
    #[arg(long)]
    skip_embeddings: bool,
    /// Max products to scrape across the whole run
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    // Startup failures (missing credentials, dead encoder, no browser)
    // abort with a non-zero exit before any category is touched. Everything
    // after this point degrades and is reported in the summary instead.
    let config = Config::from_env()?;

    let encoder = if cli.skip_embeddings {
        None
    } else {
        let encoder = RemoteEncoder::new(&config.embeddings_url)?;
        encoder
            .probe()
            .await
            .context("embedding encoder unavailable")?;
        Some(encoder)
    };

    let sink = SupabaseSink::new(&config)?;
    let images = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let session = BrowserSession::launch(!cli.no_headless).await?;
    let outcome = run(
        &session,
        encoder.as_ref().map(|e| e as &dyn Embedder),
        &images,
        &sink,
        cli.limit,
    )
    .await;
    // Tear the browser down on success and failure alike.
    if let Err(e) = session.close().await {
        warn!("browser shutdown failed: {:#}", e);
    }

    let summary = outcome?;
    summary.print();

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

#[derive(Default)]
struct RunSummary {
    categories_ok: usize,
    categories_failed: usize,
    products_written: usize,
    products_failed: usize,
}

impl RunSummary {
    fn print(&self) {
        println!(
            "Categories: {} processed, {} failed",
            self.categories_ok, self.categories_failed
        );
        println!(
            "Products:   {} written, {} failed",
            self.products_written, self.products_failed
        );
    }
}

/// One full pass over the configured categories:
/// fetch -> extract -> classify -> [embed] -> assemble -> upsert.
/// A category that fails to load is skipped and counted; a product that
/// fails is dropped and counted; everything else keeps going.
async fn run(
    session: &BrowserSession,
    encoder: Option<&dyn Embedder>,
    images: &reqwest::Client,
    sink: &SupabaseSink,
    limit: Option<usize>,
) -> Result<RunSummary> {
    let page = session.new_page().await?;
    let mut summary = RunSummary::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (name, listing_url) in config::CATEGORIES {
        let remaining = limit.map(|max| max.saturating_sub(seen.len()));
        if remaining == Some(0) {
            break;
        }

        info!("category {}: {}", name, listing_url);
        let links = match catalog::collect_product_links(&page, listing_url, remaining).await {
            Ok(links) => links,
            Err(e) => {
                warn!("category {} failed: {:#}", name, e);
                summary.categories_failed += 1;
                continue;
            }
        };

        // Products already handled by an earlier category this run.
        let fresh: Vec<String> = links
            .into_iter()
            .filter(|link| !seen.contains(link))
            .collect();

        let pb = ProgressBar::new(fresh.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );

        let mut records = Vec::new();
        for product_url in fresh {
            seen.insert(product_url.clone());
            match scrape_product(&page, &product_url).await {
                Ok(Some(product)) => {
                    let (image_url, additional) =
                        extract::images::split_canonical(&product.image_urls);
                    let (image_embedding, info_embedding) = match encoder {
                        Some(encoder) => {
                            embed_product(encoder, images, image_url.as_deref(), &product).await
                        }
                        None => (None, None),
                    };
                    records.push(record::assemble(
                        product,
                        &product_url,
                        image_url,
                        additional,
                        image_embedding,
                        info_embedding,
                    ));
                }
                Ok(None) => {
                    warn!("{}: no usable fields, dropped", product_url);
                    summary.products_failed += 1;
                }
                Err(e) => {
                    warn!("{}: {:#}", product_url, e);
                    summary.products_failed += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        if !records.is_empty() {
            let stats = sink.upsert(&records).await;
            summary.products_written += stats.written;
            summary.products_failed += stats.failed;
        }
        summary.categories_ok += 1;
    }

    Ok(summary)
}

/// Fetch one product page and extract its fields.
/// Ok(None) means the document carried no usable fields at all.
async fn scrape_product(
    driver: &dyn PageDriver,
    product_url: &str,
) -> Result<Option<extract::Product>> {
    driver
        .goto(product_url, config::PRODUCT_NAV_TIMEOUT)
        .await?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let html = driver.content().await?;
    Ok(extract::extract_product(&html))
}

/// Compute both embeddings for a product. Any failure degrades that
/// vector to None; the record is still written.
async fn embed_product(
    encoder: &dyn Embedder,
    images: &reqwest::Client,
    image_url: Option<&str>,
    product: &extract::Product,
) -> (Option<Vec<f32>>, Option<Vec<f32>>) {
    let image_embedding = match image_url {
        Some(url) => {
            let embedded = match embed::fetch_image(images, url).await {
                Ok(bytes) => encoder.embed_image(&bytes, embed::mime_for_url(url)).await,
                Err(e) => Err(e),
            };
            match embedded {
                Ok(vector) => Some(vector),
                Err(e) => {
                    warn!("image embedding failed for {}: {:#}", url, e);
                    None
                }
            }
        }
        None => None,
    };

    let info_text = embed::compose_info_text(product);
    let info_embedding = match encoder.embed_text(&info_text).await {
        Ok(vector) => Some(vector),
        Err(e) => {
            warn!("info embedding failed: {:#}", e);
            None
        }
    };

    (image_embedding, info_embedding)
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
