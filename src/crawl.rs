//! Documentation site crawler.
//!
//! Loads the site's start page in a browser, reads the sidebar navigation,
//! then visits every linked page in sidebar order and captures the rendered
//! text of its content element.
//!
//! The site is a client-rendered single-page app: page text only exists
//! after scripts run, so every read goes through a [`PageDriver`] and waits
//! for the content element to fill in.

use anyhow::{anyhow, bail, Result};
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::browser::{ChromiumDriver, PageDriver};
use crate::config::CrawlConfig;
use crate::jsonio;
use crate::models::PageRecord;
use crate::progress::{ProgressEvent, ProgressReporter};

const JOB: &str = "crawl";

/// A navigation entry from the sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarLink {
    pub title: String,
    pub href: String,
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid CSS selector '{}': {:?}", selector, e))
}

fn absolutize(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|u| u.to_string())
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Sidebar links in document order, resolved against `base_url` and
/// deduplicated by resolved href (first occurrence wins).
pub fn collect_sidebar_links(html: &str, link_selector: &str, base_url: &str) -> Result<Vec<SidebarLink>> {
    let selector = parse_selector(link_selector)?;
    let base = Url::parse(base_url)?;
    let doc = Html::parse_document(html);

    let mut links: Vec<SidebarLink> = Vec::new();
    for el in doc.select(&selector) {
        let Some(href) = el.value().attr("href").and_then(|h| absolutize(&base, h)) else {
            continue;
        };
        if links.iter().any(|l| l.href == href) {
            continue;
        }
        let title = el
            .value()
            .attr("title")
            .map(str::to_string)
            .unwrap_or_else(|| el.text().collect::<String>())
            .trim()
            .to_string();
        links.push(SidebarLink { title, href });
    }
    Ok(links)
}

/// Title, image URLs, and outbound links found inside the content element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageAssets {
    pub title: Option<String>,
    pub image_urls: Vec<String>,
    pub links: Vec<String>,
}

pub fn extract_page_assets(html: &str, content_selector: &str, page_url: &str) -> Result<PageAssets> {
    let content = parse_selector(content_selector)?;
    let heading = parse_selector("h1, h2")?;
    let img = parse_selector("img[src]")?;
    let anchor = parse_selector("a[href]")?;
    let base = Url::parse(page_url)?;
    let doc = Html::parse_document(html);

    let Some(root) = doc.select(&content).next() else {
        return Ok(PageAssets::default());
    };

    let title = root
        .select(&heading)
        .next()
        .map(|h| h.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let mut assets = PageAssets {
        title,
        ..Default::default()
    };
    for el in root.select(&img) {
        if let Some(src) = el.value().attr("src").and_then(|s| absolutize(&base, s)) {
            push_unique(&mut assets.image_urls, src);
        }
    }
    for el in root.select(&anchor) {
        let href = el.value().attr("href").unwrap_or_default();
        if href.starts_with("javascript:") || href.starts_with("mailto:") {
            continue;
        }
        if let Some(link) = absolutize(&base, href) {
            push_unique(&mut assets.links, link);
        }
    }
    Ok(assets)
}

/// Poll until the content element has non-empty text that differs from
/// `previous`, returning the trimmed text.
///
/// Hash-route navigation keeps the old content on screen until the new page
/// renders, so unchanged text is not accepted right away. If the deadline
/// passes while the text is non-empty but unchanged, it is accepted (two
/// pages may share content). Empty text at the deadline is an error.
pub async fn wait_for_content(
    driver: &mut (impl PageDriver + ?Sized),
    selector: &str,
    previous: Option<&str>,
    timeout: Duration,
    poll: Duration,
) -> Result<String> {
    let deadline = Instant::now() + timeout;
    loop {
        let text = driver
            .content_text(selector)
            .await?
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        let changed = previous.map_or(true, |p| p != text);
        if !text.is_empty() && changed {
            return Ok(text);
        }
        if Instant::now() >= deadline {
            if !text.is_empty() {
                return Ok(text);
            }
            bail!(
                "timed out after {}s waiting for '{}' to render",
                timeout.as_secs_f64(),
                selector
            );
        }
        tokio::time::sleep(poll).await;
    }
}

/// Result of walking the site.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    pub links: Vec<SidebarLink>,
    pub pages: Vec<PageRecord>,
}

/// Walk the site with `driver`. With `dry_run`, stops after listing links.
pub async fn crawl_site(
    driver: &mut (impl PageDriver + ?Sized),
    config: &CrawlConfig,
    dry_run: bool,
    progress: &dyn ProgressReporter,
) -> Result<CrawlOutcome> {
    let timeout = Duration::from_secs(config.wait_timeout_secs);
    let poll = Duration::from_millis(config.poll_millis);
    let settle = Duration::from_millis(config.settle_millis);

    progress.report(ProgressEvent::Loading {
        job: JOB.to_string(),
        what: config.base_url.clone(),
    });
    driver.goto(&config.base_url).await?;
    let mut previous =
        wait_for_content(driver, &config.content_selector, None, timeout, poll).await?;

    let html = driver.html().await?;
    let links = collect_sidebar_links(&html, &config.link_selector, &config.base_url)?;

    println!("Found {} sidebar links:", links.len());
    for link in &links {
        println!("  {}", link.title);
    }

    if dry_run {
        return Ok(CrawlOutcome {
            links,
            pages: Vec::new(),
        });
    }

    let total = links.len() as u64;
    let mut pages = Vec::with_capacity(links.len());
    for (idx, link) in links.iter().enumerate() {
        progress.report(ProgressEvent::Processing {
            job: JOB.to_string(),
            n: idx as u64,
            total,
            item: Some(link.href.clone()),
        });

        driver.goto(&link.href).await?;
        wait_for_content(driver, &config.content_selector, Some(previous.as_str()), timeout, poll)
            .await?;
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        // Re-read after settling; late scripts may still be adding content.
        let content = wait_for_content(driver, &config.content_selector, None, timeout, poll)
            .await?;
        let html = driver.html().await?;
        let assets = extract_page_assets(&html, &config.content_selector, &link.href)?;

        pages.push(PageRecord {
            url: link.href.clone(),
            content: content.clone(),
            title: assets.title,
            image_urls: assets.image_urls,
            links: assets.links,
        });
        previous = content;
    }

    progress.report(ProgressEvent::Processing {
        job: JOB.to_string(),
        n: total,
        total,
        item: None,
    });

    Ok(CrawlOutcome { links, pages })
}

/// Summary of a crawl run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlStats {
    pub links: usize,
    pub pages: usize,
}

/// Launch Chromium, crawl, and write the page records. The browser is closed
/// even when the crawl fails.
pub async fn run_crawl(
    config: &CrawlConfig,
    dry_run: bool,
    progress: &dyn ProgressReporter,
) -> Result<CrawlStats> {
    let mut driver = ChromiumDriver::launch(config.headless).await?;
    let outcome = crawl_site(&mut driver, config, dry_run, progress).await;
    let closed = driver.close().await;
    let outcome = outcome?;
    closed?;

    if !dry_run {
        progress.report(ProgressEvent::Writing {
            job: JOB.to_string(),
            path: config.output.display().to_string(),
        });
        jsonio::write_json_pretty(&config.output, &outcome.pages)?;
    }

    Ok(CrawlStats {
        links: outcome.links.len(),
        pages: outcome.pages.len(),
    })
}
