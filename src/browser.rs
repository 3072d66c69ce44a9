use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;

/// Links to product cards currently present in the listing DOM.
const FRAGMENT_JS: &str =
    r#"Array.from(document.querySelectorAll('a[href*="/products/"]'), a => a.href)"#;

const SCROLL_JS: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Browser automation capability. Anything that can navigate, scroll and
/// read the DOM can drive the pipeline; production uses Chromium over CDP,
/// tests use an in-memory stub.
#[async_trait]
pub trait PageDriver {
    /// Navigate to a URL, bounded by `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Scroll to the bottom of the page to trigger lazy loading.
    async fn scroll_to_bottom(&self) -> Result<()>;

    /// Hrefs of the per-product listing fragments currently in the DOM.
    async fn extract_fragments(&self) -> Result<Vec<String>>;

    /// Full serialized document of the current page.
    async fn content(&self) -> Result<String>;
}

/// One Chromium process plus the CDP event loop that keeps it responsive.
/// Acquired once per run; `close` must be called on the way out or the
/// child process lingers.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch(headless: bool) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(|e| anyhow!(e))?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // The handler stream must be polled for the browser to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self { browser, handler })
    }

    pub async fn new_page(&self) -> Result<ChromiumDriver> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to open browser page")?;
        Ok(ChromiumDriver { page })
    }

    /// Tear down the browser process and its event loop.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        self.browser.wait().await?;
        self.handler.abort();
        debug!("browser closed");
        Ok(())
    }
}

/// `PageDriver` over a chromiumoxide page.
pub struct ChromiumDriver {
    page: Page,
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| anyhow!("navigation to {} timed out", url))?
            .with_context(|| format!("navigation to {} failed", url))?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.page.evaluate(SCROLL_JS).await?;
        Ok(())
    }

    async fn extract_fragments(&self) -> Result<Vec<String>> {
        let hrefs: Vec<String> = self.page.evaluate(FRAGMENT_JS).await?.into_value()?;
        Ok(hrefs)
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }
}
