//! Forum post enrichment.
//!
//! Attaches a window of preceding posts to every post as thread context and
//! flattens each post into a [`RagDocument`] whose text reads as a short
//! conversation: thread title, the preceding posts, then the post itself.

use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;

use crate::jsonio;
use crate::models::{ForumPost, RagDocument, RagMeta, ThreadContextEntry};
use crate::progress::{ProgressEvent, ProgressReporter};

const JOB: &str = "enrich";

/// Collapse runs of three or more newlines to a blank line, drop every
/// non-ASCII character, and trim surrounding whitespace.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    static NEWLINES: OnceLock<Regex> = OnceLock::new();
    static NON_ASCII: OnceLock<Regex> = OnceLock::new();
    let newlines = NEWLINES.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"));
    let non_ascii = NON_ASCII.get_or_init(|| Regex::new(r"[^\x00-\x7F]+").expect("valid regex"));

    let collapsed = newlines.replace_all(text, "\n\n");
    let ascii = non_ascii.replace_all(&collapsed, "");
    // File/group/record/unit separators count as whitespace too.
    ascii
        .trim_matches(|c: char| c.is_whitespace() || ('\x1c'..='\x1f').contains(&c))
        .to_string()
}

/// Render a scalar for inclusion in text or ids: strings without quotes,
/// `null` as empty, anything else as compact JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Context entries for the up-to-`n_context` posts immediately before
/// `current_index`, oldest first.
pub fn extract_context(
    posts: &[ForumPost],
    current_index: usize,
    n_context: usize,
) -> Vec<ThreadContextEntry> {
    let end = current_index.min(posts.len());
    let start = end.saturating_sub(n_context);
    posts[start..end]
        .iter()
        .map(|p| ThreadContextEntry {
            post_number: p.value_or("post_number", Value::String(String::new())),
            username: p.value_or("username", Value::String(String::new())),
            content: p.value_or("content", Value::String(String::new())),
            created_at: p.value_or("created_at", Value::String(String::new())),
        })
        .collect()
}

/// Set `thread_context` on every post. The window is positional over the
/// input order; posts are not regrouped by thread.
pub fn add_context_to_posts(posts: &mut [ForumPost], n_context: usize) -> Result<()> {
    // Windows come from the original posts, so compute them all before
    // mutating anything.
    let snapshot: &[ForumPost] = posts;
    let windows: Vec<Vec<ThreadContextEntry>> = (0..snapshot.len())
        .map(|i| extract_context(snapshot, i, n_context))
        .collect();

    for (post, window) in posts.iter_mut().zip(windows) {
        post.set("thread_context", serde_json::to_value(window)?);
    }
    Ok(())
}

pub fn build_rag_doc(post: &ForumPost) -> RagDocument {
    let content = clean_text(post.str_or_empty("content"));
    let thread_title = clean_text(post.str_or_empty("thread_title"));
    let thread_context = post
        .thread_context()
        .iter()
        .map(|ctx| {
            let content = match &ctx.content {
                Value::String(s) => clean_text(s),
                _ => String::new(),
            };
            format!("{}: {}", display_value(&ctx.username), content)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let username = post
        .get("username")
        .map(display_value)
        .unwrap_or_else(|| "unknown".to_string());

    let full_text = format!(
        "{}\n\n{}\n\n{}: {}",
        thread_title, thread_context, username, content
    );

    let unknown = || Value::String("unknown".to_string());
    let empty = || Value::String(String::new());

    let thread_id = post.value_or("thread_id", unknown());
    let post_number = post.value_or("post_number", unknown());

    RagDocument {
        id: format!(
            "{}_{}",
            display_value(&thread_id),
            display_value(&post_number)
        ),
        text: full_text.trim().to_string(),
        meta: RagMeta {
            thread_id,
            post_number,
            username: post.value_or("username", unknown()),
            created_at: post.value_or("created_at", empty()),
            url: post.value_or("post_url", empty()),
            category: post.value_or("category_id", Value::Null),
            title: thread_title,
            image_paths: post.value_or("image_paths", Value::Array(Vec::new())),
        },
    }
}

pub fn build_rag_docs(posts: &[ForumPost]) -> Vec<RagDocument> {
    posts.iter().map(build_rag_doc).collect()
}

/// Summary of an enrich run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichStats {
    pub posts: usize,
    pub documents: usize,
}

/// Read posts from JSONL, attach context, write RAG documents as JSONL and,
/// when `posts_output` is set, the context-augmented posts as a JSON array.
pub fn run_enrich(
    input: &Path,
    output: &Path,
    posts_output: Option<&Path>,
    n_context: usize,
    progress: &dyn ProgressReporter,
) -> Result<EnrichStats> {
    progress.report(ProgressEvent::Loading {
        job: JOB.to_string(),
        what: input.display().to_string(),
    });
    let mut posts: Vec<ForumPost> = jsonio::load_jsonl(input)?;

    add_context_to_posts(&mut posts, n_context)?;
    let docs = build_rag_docs(&posts);
    progress.report(ProgressEvent::Processing {
        job: JOB.to_string(),
        n: docs.len() as u64,
        total: posts.len() as u64,
        item: None,
    });

    progress.report(ProgressEvent::Writing {
        job: JOB.to_string(),
        path: output.display().to_string(),
    });
    jsonio::write_jsonl(output, &docs)?;

    if let Some(path) = posts_output {
        progress.report(ProgressEvent::Writing {
            job: JOB.to_string(),
            path: path.display().to_string(),
        });
        jsonio::write_json_pretty(path, &posts)?;
    }

    Ok(EnrichStats {
        posts: posts.len(),
        documents: docs.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn posts(values: Vec<Value>) -> Vec<ForumPost> {
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect()
    }

    #[test]
    fn clean_text_collapses_newlines() {
        assert_eq!(clean_text("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(clean_text("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn clean_text_strips_non_ascii_and_trims() {
        assert_eq!(clean_text("  héllo ✅ wörld \n"), "hllo  wrld");
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("✅"), "");
    }

    #[test]
    fn clean_text_trims_separator_controls() {
        assert_eq!(clean_text("\x1c\x1f hello \x1e\n"), "hello");
        assert_eq!(clean_text("a\x1fb"), "a\x1fb");
    }

    #[test]
    fn context_window_is_bounded() {
        let ps = posts((1..=5).map(|n| json!({"post_number": n, "username": format!("u{}", n)})).collect());

        assert!(extract_context(&ps, 0, 3).is_empty());

        let at_two = extract_context(&ps, 2, 3);
        assert_eq!(at_two.len(), 2);
        assert_eq!(at_two[0].post_number, json!(1));

        let at_four = extract_context(&ps, 4, 3);
        let numbers: Vec<_> = at_four.iter().map(|e| e.post_number.clone()).collect();
        assert_eq!(numbers, vec![json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn context_entries_default_to_empty_strings() {
        let ps = posts(vec![json!({}), json!({})]);
        let ctx = extract_context(&ps, 1, 3);
        assert_eq!(ctx[0].username, json!(""));
        assert_eq!(ctx[0].content, json!(""));
        assert_eq!(ctx[0].created_at, json!(""));
    }

    #[test]
    fn zero_context_size_gives_empty_windows() {
        let mut ps = posts(vec![json!({"content": "a"}), json!({"content": "b"})]);
        add_context_to_posts(&mut ps, 0).unwrap();
        assert_eq!(ps[1].get("thread_context"), Some(&json!([])));
    }

    #[test]
    fn added_context_uses_raw_content() {
        let mut ps = posts(vec![
            json!({"post_number": 1, "username": "ann", "content": "Hi ✅", "created_at": "t1"}),
            json!({"post_number": 2, "username": "bob", "content": "Yo"}),
        ]);
        add_context_to_posts(&mut ps, 3).unwrap();
        assert_eq!(
            ps[1].get("thread_context"),
            Some(&json!([{"post_number": 1, "username": "ann", "content": "Hi ✅", "created_at": "t1"}]))
        );
    }

    #[test]
    fn rag_doc_text_reads_as_conversation() {
        let mut ps = posts(vec![
            json!({"thread_id": 10, "post_number": 1, "username": "ann", "thread_title": "GA1 help", "content": "How do I start?"}),
            json!({"thread_id": 10, "post_number": 2, "username": "bob", "thread_title": "GA1 help", "content": "Read the docs.\n\n\n\nThen ask."}),
        ]);
        add_context_to_posts(&mut ps, 3).unwrap();
        let docs = build_rag_docs(&ps);

        assert_eq!(docs[0].id, "10_1");
        assert_eq!(docs[0].text, "GA1 help\n\n\n\nann: How do I start?");
        assert_eq!(docs[1].id, "10_2");
        assert_eq!(
            docs[1].text,
            "GA1 help\n\nann: How do I start?\n\nbob: Read the docs.\n\nThen ask."
        );
        assert_eq!(docs[1].meta.title, "GA1 help");
    }

    #[test]
    fn rag_doc_meta_defaults() {
        let ps = posts(vec![json!({"content": "orphan"})]);
        let doc = build_rag_doc(&ps[0]);

        assert_eq!(doc.id, "unknown_unknown");
        assert_eq!(doc.text, "unknown: orphan");
        assert_eq!(doc.meta.thread_id, json!("unknown"));
        assert_eq!(doc.meta.username, json!("unknown"));
        assert_eq!(doc.meta.created_at, json!(""));
        assert_eq!(doc.meta.url, json!(""));
        assert_eq!(doc.meta.category, Value::Null);
        assert_eq!(doc.meta.image_paths, json!([]));
    }

    #[test]
    fn rag_doc_meta_copies_source_fields() {
        let ps = posts(vec![json!({
            "thread_id": "t-9",
            "post_number": 4,
            "username": "carol",
            "created_at": "2025-02-01T10:00:00Z",
            "post_url": "https://forum/t/9/4",
            "category_id": 34,
            "image_paths": ["img/a.png"],
            "content": "x"
        })]);
        let doc = build_rag_doc(&ps[0]);
        assert_eq!(doc.id, "t-9_4");
        assert_eq!(doc.meta.url, json!("https://forum/t/9/4"));
        assert_eq!(doc.meta.category, json!(34));
        assert_eq!(doc.meta.image_paths, json!(["img/a.png"]));
    }
}
