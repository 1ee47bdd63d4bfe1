//! Headless Chromium driver for the crawl job, built on `chromiumoxide`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::path::PathBuf;
use tokio::task::JoinHandle;

/// The browser operations the crawler needs. One page, driven sequentially.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate the page to `url`.
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Rendered text of the first element matching `selector`, or `None`
    /// when no element matches yet.
    async fn content_text(&mut self, selector: &str) -> Result<Option<String>>;

    /// Current document HTML.
    async fn html(&mut self) -> Result<String>;

    async fn close(&mut self) -> Result<()>;
}

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("RAGPREP_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser", "chrome"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launch Chromium and open a blank page.
    pub async fn launch(headless: bool) -> Result<Self> {
        let chrome_path = find_chromium().context(
            "Chromium not found. Install Chrome or Chromium, or set RAGPREP_CHROMIUM_PATH.",
        )?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open browser page")?;

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;
        result
            .into_value()
            .map_err(|e| anyhow!("failed to convert JS result: {e:?}"))
    }
}

/// JS expression returning the `innerText` of the first match, or null.
fn inner_text_script(selector: &str) -> String {
    // JSON string literals are valid JS string literals.
    let quoted = Value::String(selector.to_string()).to_string();
    format!(
        "(() => {{ const el = document.querySelector({}); return el ? el.innerText : null; }})()",
        quoted
    )
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {} failed", url))?;
        Ok(())
    }

    async fn content_text(&mut self, selector: &str) -> Result<Option<String>> {
        match self.evaluate(&inner_text_script(selector)).await? {
            Value::String(text) => Ok(Some(text)),
            _ => Ok(None),
        }
    }

    async fn html(&mut self) -> Result<String> {
        match self.evaluate("document.documentElement.outerHTML").await? {
            Value::String(html) => Ok(html),
            other => Err(anyhow!("unexpected HTML result: {}", other)),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            eprintln!("warning: could not reap browser process: {}", e);
        }
        self.handler.abort();
        closed.context("failed to close browser")?;
        Ok(())
    }
}
