use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub chunk: ChunkConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub merge: MergeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_content_selector")]
    pub content_selector: String,
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    #[serde(default = "default_pages_path")]
    pub output: PathBuf,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_settle_millis")]
    pub settle_millis: u64,
    #[serde(default = "default_poll_millis")]
    pub poll_millis: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            content_selector: default_content_selector(),
            link_selector: default_link_selector(),
            output: default_pages_path(),
            headless: default_headless(),
            wait_timeout_secs: default_wait_timeout_secs(),
            settle_millis: default_settle_millis(),
            poll_millis: default_poll_millis(),
        }
    }
}

fn default_base_url() -> String {
    "https://tds.s-anand.net/#/2025-01/".to_string()
}
fn default_content_selector() -> String {
    ".markdown-section".to_string()
}
fn default_link_selector() -> String {
    r##"li.file > a[href^="#/"]"##.to_string()
}
fn default_pages_path() -> PathBuf {
    PathBuf::from("data/tds_all_content.json")
}
fn default_headless() -> bool {
    true
}
fn default_wait_timeout_secs() -> u64 {
    20
}
fn default_settle_millis() -> u64 {
    1000
}
fn default_poll_millis() -> u64 {
    250
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkConfig {
    #[serde(default = "default_pages_path")]
    pub input: PathBuf,
    #[serde(default = "default_chunks_path")]
    pub output: PathBuf,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            input: default_pages_path(),
            output: default_chunks_path(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_chunks_path() -> PathBuf {
    PathBuf::from("data/tds_rich_chunks.json")
}
fn default_max_tokens() -> usize {
    700
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichConfig {
    #[serde(default = "default_posts_jsonl_path")]
    pub input: PathBuf,
    #[serde(default = "default_rag_docs_path")]
    pub output: PathBuf,
    #[serde(default)]
    pub posts_output: Option<PathBuf>,
    #[serde(default = "default_context_size")]
    pub context_size: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            input: default_posts_jsonl_path(),
            output: default_rag_docs_path(),
            posts_output: None,
            context_size: default_context_size(),
        }
    }
}

fn default_posts_jsonl_path() -> PathBuf {
    PathBuf::from("data/tds_discourse_rich_thread_aware_with_images.jsonl")
}
fn default_rag_docs_path() -> PathBuf {
    PathBuf::from("data/rag_documents.jsonl")
}
fn default_context_size() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct MergeConfig {
    #[serde(default = "default_chunks_path")]
    pub course: PathBuf,
    #[serde(default = "default_posts_json_path")]
    pub discourse: PathBuf,
    #[serde(default = "default_combined_path")]
    pub output: PathBuf,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            course: default_chunks_path(),
            discourse: default_posts_json_path(),
            output: default_combined_path(),
        }
    }
}

fn default_posts_json_path() -> PathBuf {
    PathBuf::from("data/tds_discourse_rich_thread_aware_with_images.json")
}
fn default_combined_path() -> PathBuf {
    PathBuf::from("data/combined_tds_rag_data.json")
}

impl Config {
    /// Built-in defaults, used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.crawl.base_url)
            .with_context(|| format!("crawl.base_url is not a valid URL: {}", self.crawl.base_url))?;
        if base.cannot_be_a_base() {
            bail!("crawl.base_url must be an absolute http(s) URL");
        }

        if self.crawl.wait_timeout_secs == 0 {
            bail!("crawl.wait_timeout_secs must be > 0");
        }
        if self.crawl.poll_millis == 0 {
            bail!("crawl.poll_millis must be > 0");
        }
        if self.crawl.content_selector.trim().is_empty() {
            bail!("crawl.content_selector must not be empty");
        }
        if self.crawl.link_selector.trim().is_empty() {
            bail!("crawl.link_selector must not be empty");
        }

        if self.chunk.max_tokens == 0 {
            bail!("chunk.max_tokens must be > 0");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Load the config at `path`, falling back to built-in defaults when the
/// file does not exist. A file that exists but fails to parse is an error.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

const CONFIG_TEMPLATE: &str = r##"# ragprep configuration. Every value shown is the built-in default.

[crawl]
base_url = "https://tds.s-anand.net/#/2025-01/"
content_selector = ".markdown-section"
link_selector = 'li.file > a[href^="#/"]'
output = "data/tds_all_content.json"
headless = true
wait_timeout_secs = 20
settle_millis = 1000
poll_millis = 250

[chunk]
input = "data/tds_all_content.json"
output = "data/tds_rich_chunks.json"
max_tokens = 700

[enrich]
input = "data/tds_discourse_rich_thread_aware_with_images.jsonl"
output = "data/rag_documents.jsonl"
# posts_output = "data/tds_discourse_rich_thread_aware_with_images.json"
context_size = 3

[merge]
course = "data/tds_rich_chunks.json"
discourse = "data/tds_discourse_rich_thread_aware_with_images.json"
output = "data/combined_tds_rag_data.json"
"##;

/// Write the commented default config to `path`. Refuses to overwrite.
pub fn scaffold_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Config file already exists: {}", path.display());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    std::fs::write(path, CONFIG_TEMPLATE)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.enrich.context_size, 3);
        assert_eq!(config.crawl.wait_timeout_secs, 20);
        assert_eq!(config.crawl.link_selector, r##"li.file > a[href^="#/"]"##);
        assert!(config.enrich.posts_output.is_none());
    }

    #[test]
    fn template_parses_to_defaults() {
        let config: Config = toml::from_str(CONFIG_TEMPLATE).unwrap();
        config.validate().unwrap();
        let defaults = Config::minimal();
        assert_eq!(config.crawl.base_url, defaults.crawl.base_url);
        assert_eq!(config.crawl.link_selector, defaults.crawl.link_selector);
        assert_eq!(config.merge.output, defaults.merge.output);
        assert_eq!(config.chunk.max_tokens, defaults.chunk.max_tokens);
    }

    #[test]
    fn rejects_zero_max_tokens() {
        let config: Config = toml::from_str("[chunk]\nmax_tokens = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk.max_tokens"));
    }

    #[test]
    fn rejects_relative_base_url() {
        let config: Config = toml::from_str("[crawl]\nbase_url = \"docs/index\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_context_size_is_allowed() {
        let config: Config = toml::from_str("[enrich]\ncontext_size = 0\n").unwrap();
        config.validate().unwrap();
        assert_eq!(config.enrich.context_size, 0);
    }
}
