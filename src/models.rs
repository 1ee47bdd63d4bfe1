//! Record types read and written by the pipeline jobs.
//!
//! Forum posts and incoming course chunks are kept as loose JSON objects
//! because exports vary in which keys they carry and in the JSON type of each key. Output records are
//! typed so that every key is always present, falling back to an empty or
//! `"unknown"` default.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One rendered documentation page captured by the crawler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
}

/// A JSON object read with "get with default" semantics. Keys not known to
/// the pipeline pass through untouched when the record is written back out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LooseRecord {
    pub fields: Map<String, Value>,
}

/// A scraped forum post.
pub type ForumPost = LooseRecord;

/// A course chunk as read by the merge job. Producers other than the chunk
/// job may leave keys out, set them to `null`, or use non-string ids.
pub type RawCourseChunk = LooseRecord;

impl LooseRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The value under `key`, or `default` when the key is absent. A key
    /// that is present with a `null` value stays `null`.
    pub fn value_or(&self, key: &str, default: Value) -> Value {
        self.fields.get(key).cloned().unwrap_or(default)
    }

    /// The string under `key`; absent keys and non-string values read as `""`.
    pub fn str_or_empty(&self, key: &str) -> &str {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    /// The attached thread context, or an empty window when the post has
    /// none or it cannot be read as a list of entries.
    pub fn thread_context(&self) -> Vec<ThreadContextEntry> {
        self.fields
            .get("thread_context")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

impl From<Map<String, Value>> for LooseRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

fn empty_string_value() -> Value {
    Value::String(String::new())
}

/// A preceding post attached to a post as conversational context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadContextEntry {
    #[serde(default = "empty_string_value")]
    pub post_number: Value,
    #[serde(default = "empty_string_value")]
    pub username: Value,
    #[serde(default = "empty_string_value")]
    pub content: Value,
    #[serde(default = "empty_string_value")]
    pub created_at: Value,
}

/// A flattened forum document ready for the retrieval index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagDocument {
    pub id: String,
    pub text: String,
    pub meta: RagMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagMeta {
    pub thread_id: Value,
    pub post_number: Value,
    pub username: Value,
    pub created_at: Value,
    pub url: Value,
    pub category: Value,
    pub title: String,
    pub image_paths: Value,
}

/// Title and description attached to a course chunk, keyed by page slug.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkPageMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// A slice of a course page, as written by the chunk job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    #[serde(default)]
    pub chunk_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub image_urls: Vec<Value>,
    #[serde(default)]
    pub embedded_urls: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Discourse,
    CourseContent,
}

/// The common schema both sources are normalized into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRecord {
    pub source: RecordSource,
    pub id: String,
    pub title: Value,
    pub text: Value,
    pub url: Value,
    pub created_at: Value,
    pub metadata: RecordMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordMetadata {
    Discourse(DiscourseMetadata),
    Course(CourseMetadata),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscourseMetadata {
    pub username: Value,
    pub reply_to: Value,
    pub reply_count: Value,
    pub like_count: Value,
    pub image_paths: Value,
    pub thread_context: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseMetadata {
    pub description: Value,
    pub image_urls: Value,
    pub embedded_urls: Value,
}
