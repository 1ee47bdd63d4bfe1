//! Paragraph-boundary chunker for crawled course pages.
//!
//! Splits each page's text into pieces that respect a configurable
//! `max_tokens` limit. Splitting occurs on paragraph boundaries (`\n\n`)
//! to preserve semantic coherence within each chunk. Every piece becomes a
//! [`CourseChunk`] carrying the page's title, description, and URLs.

use anyhow::Result;
use serde_json::{Map, Value};
use std::path::Path;

use crate::jsonio;
use crate::models::{ChunkPageMeta, CourseChunk, PageRecord};
use crate::progress::{ProgressEvent, ProgressReporter};

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

const MAX_DESCRIPTION_CHARS: usize = 200;

const JOB: &str = "chunk";

/// Split text into pieces on paragraph boundaries, respecting max_tokens.
/// Always returns at least one piece.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);

    let mut chunks = Vec::new();
    let mut current_buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            chunks.push(std::mem::take(&mut current_buf));
        }

        if trimmed.len() > max_chars {
            hard_split(trimmed, max_chars, &mut chunks);
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        chunks.push(current_buf);
    }

    if chunks.is_empty() {
        chunks.push(text.trim().to_string());
    }

    chunks
}

/// Split an oversized paragraph at max_chars, preferring a newline or space
/// boundary. Never splits inside a UTF-8 character.
fn hard_split(paragraph: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut remaining = paragraph;
    while !remaining.is_empty() {
        if remaining.len() <= max_chars {
            out.push(remaining.trim().to_string());
            break;
        }

        let mut split_at = max_chars;
        while !remaining.is_char_boundary(split_at) {
            split_at -= 1;
        }
        if split_at == 0 {
            // A single character wider than max_chars.
            split_at = remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());
        }

        let actual_split = remaining[..split_at]
            .rfind('\n')
            .or_else(|| remaining[..split_at].rfind(' '))
            .map(|pos| pos + 1)
            .unwrap_or(split_at);

        let piece = remaining[..actual_split].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[actual_split..];
    }
}

/// Stable identifier for a page URL: the segments of the hash route (or the
/// path, when there is no route), lowercased and joined with `-`.
pub fn page_slug(url: &str) -> String {
    let route = match url.split_once('#') {
        Some((_, fragment)) if !fragment.trim_matches('/').is_empty() => fragment.to_string(),
        _ => match url::Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url.to_string(),
        },
    };

    let mut slug = String::new();
    for c in route.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');

    if slug.is_empty() {
        "page".to_string()
    } else {
        slug.to_string()
    }
}

fn page_title(page: &PageRecord) -> String {
    if let Some(title) = page.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    page.content
        .lines()
        .map(|l| l.trim().trim_start_matches('#').trim())
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// First paragraph that is not the title or a heading, cut to a short
/// description.
fn page_description(content: &str, title: &str) -> String {
    let para = content
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty() && *p != title && !p.starts_with('#'))
        .unwrap_or_default();

    let flat = para.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_DESCRIPTION_CHARS {
        flat
    } else {
        flat.chars().take(MAX_DESCRIPTION_CHARS).collect()
    }
}

pub fn chunk_page(page: &PageRecord, max_tokens: usize) -> Vec<CourseChunk> {
    let slug = page_slug(&page.url);
    let title = page_title(page);
    let description = page_description(&page.content, &title);

    let page_meta = serde_json::to_value(ChunkPageMeta { title, description })
        .unwrap_or(Value::Object(Map::new()));
    let mut metadata = Map::new();
    metadata.insert(slug.clone(), page_meta);

    let image_urls: Vec<Value> = page.image_urls.iter().cloned().map(Value::String).collect();
    let embedded_urls: Vec<Value> = page.links.iter().cloned().map(Value::String).collect();

    chunk_text(&page.content, max_tokens)
        .into_iter()
        .enumerate()
        .map(|(idx, text)| CourseChunk {
            chunk_id: format!("{}_{}", slug, idx),
            text,
            url: page.url.clone(),
            metadata: metadata.clone(),
            image_urls: image_urls.clone(),
            embedded_urls: embedded_urls.clone(),
        })
        .collect()
}

/// Summary of a chunk run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkStats {
    pub pages: usize,
    pub chunks: usize,
}

pub fn run_chunk(
    input: &Path,
    output: &Path,
    max_tokens: usize,
    progress: &dyn ProgressReporter,
) -> Result<ChunkStats> {
    progress.report(ProgressEvent::Loading {
        job: JOB.to_string(),
        what: input.display().to_string(),
    });
    let pages: Vec<PageRecord> = jsonio::load_json(input)?;

    let total = pages.len() as u64;
    let mut chunks = Vec::new();
    for (idx, page) in pages.iter().enumerate() {
        chunks.extend(chunk_page(page, max_tokens));
        progress.report(ProgressEvent::Processing {
            job: JOB.to_string(),
            n: idx as u64 + 1,
            total,
            item: Some(page.url.clone()),
        });
    }

    progress.report(ProgressEvent::Writing {
        job: JOB.to_string(),
        path: output.display().to_string(),
    });
    jsonio::write_json_pretty(output, &chunks)?;

    Ok(ChunkStats {
        pages: pages.len(),
        chunks: chunks.len(),
    })
}
