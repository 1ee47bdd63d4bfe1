//! Merge course chunks and forum posts into one record list.
//!
//! Both inputs are normalized into [`CombinedRecord`]: course records first,
//! in file order, followed by forum records.

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::path::Path;

use crate::jsonio;
use crate::models::{
    CombinedRecord, CourseMetadata, DiscourseMetadata, ForumPost, RawCourseChunk,
    RecordMetadata, RecordSource,
};
use crate::progress::{ProgressEvent, ProgressReporter};

const JOB: &str = "merge";

fn empty() -> Value {
    Value::String(String::new())
}

/// Normalize a forum post. A post whose `post_id` is absent or `null`
/// cannot be identified and is an error.
pub fn transform_discourse_post(post: &ForumPost) -> Result<CombinedRecord> {
    let id = match post.get("post_id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) => return Err(anyhow!("forum post has a null post_id")),
        None => return Err(anyhow!("forum post is missing post_id")),
        Some(other) => other.to_string(),
    };

    Ok(CombinedRecord {
        source: RecordSource::Discourse,
        id,
        title: post.value_or("thread_title", empty()),
        text: post.value_or("content", empty()),
        url: post.value_or("post_url", empty()),
        created_at: post.value_or("created_at", Value::Null),
        metadata: RecordMetadata::Discourse(DiscourseMetadata {
            username: post.value_or("username", Value::Null),
            reply_to: post.value_or("reply_to", Value::Null),
            reply_count: post.value_or("reply_count", Value::from(0)),
            like_count: post.value_or("like_count", Value::from(0)),
            image_paths: post.value_or("image_paths", Value::Array(Vec::new())),
            thread_context: post.value_or("thread_context", Value::Array(Vec::new())),
        }),
    })
}

/// Normalize a course chunk. Title and description come from the first
/// entry of the chunk's `metadata` map, in file order; a `metadata` that is
/// absent, `null`, empty, or not a map reads as no entry. Other fields are
/// carried through as-is, `null` included.
pub fn transform_course_chunk(chunk: &RawCourseChunk) -> CombinedRecord {
    let page_meta = chunk
        .get("metadata")
        .and_then(Value::as_object)
        .and_then(|m| m.values().next())
        .and_then(Value::as_object);
    let meta_field = |key: &str| {
        page_meta
            .and_then(|m| m.get(key))
            .cloned()
            .unwrap_or_else(empty)
    };

    let id = match chunk.get("chunk_id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    CombinedRecord {
        source: RecordSource::CourseContent,
        id,
        title: meta_field("title"),
        text: chunk.value_or("text", empty()),
        url: chunk.value_or("url", empty()),
        created_at: Value::Null,
        metadata: RecordMetadata::Course(CourseMetadata {
            description: meta_field("description"),
            image_urls: chunk.value_or("image_urls", Value::Array(Vec::new())),
            embedded_urls: chunk.value_or("embedded_urls", Value::Array(Vec::new())),
        }),
    }
}

pub fn combine(chunks: &[RawCourseChunk], posts: &[ForumPost]) -> Result<Vec<CombinedRecord>> {
    let mut combined: Vec<CombinedRecord> = chunks.iter().map(transform_course_chunk).collect();
    for (idx, post) in posts.iter().enumerate() {
        let record = transform_discourse_post(post)
            .map_err(|e| anyhow!("forum post #{}: {}", idx + 1, e))?;
        combined.push(record);
    }
    Ok(combined)
}

/// Summary of a merge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub course_records: usize,
    pub discourse_records: usize,
}

impl MergeStats {
    pub fn total(&self) -> usize {
        self.course_records + self.discourse_records
    }
}

pub fn combine_sources(
    course_chunks_path: &Path,
    discourse_posts_path: &Path,
    output_path: &Path,
    progress: &dyn ProgressReporter,
) -> Result<MergeStats> {
    progress.report(ProgressEvent::Loading {
        job: JOB.to_string(),
        what: course_chunks_path.display().to_string(),
    });
    let chunks: Vec<RawCourseChunk> = jsonio::load_json(course_chunks_path)?;

    progress.report(ProgressEvent::Loading {
        job: JOB.to_string(),
        what: discourse_posts_path.display().to_string(),
    });
    let posts: Vec<ForumPost> = jsonio::load_json(discourse_posts_path)?;

    let combined = combine(&chunks, &posts)?;
    progress.report(ProgressEvent::Processing {
        job: JOB.to_string(),
        n: combined.len() as u64,
        total: (chunks.len() + posts.len()) as u64,
        item: None,
    });

    progress.report(ProgressEvent::Writing {
        job: JOB.to_string(),
        path: output_path.display().to_string(),
    });
    jsonio::write_json_pretty(output_path, &combined)?;

    Ok(MergeStats {
        course_records: chunks.len(),
        discourse_records: posts.len(),
    })
}
