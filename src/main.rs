//! # ragprep CLI
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragprep init` | Write a default config file |
//! | `ragprep crawl` | Capture rendered page text from the documentation site |
//! | `ragprep chunk` | Split crawled pages into course chunks |
//! | `ragprep enrich` | Attach thread context to forum posts and build RAG documents |
//! | `ragprep merge` | Combine course chunks and forum posts into one schema |
//!
//! ## Examples
//!
//! ```bash
//! ragprep init
//! ragprep crawl --dry-run
//! ragprep crawl --headed
//! ragprep chunk
//! ragprep enrich --posts-output data/posts_with_context.json
//! ragprep merge --discourse data/posts_with_context.json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ragprep::progress::ProgressMode;
use ragprep::{chunk, config, crawl, enrich, merge};

/// ragprep: scrape course docs and forum posts into RAG-ready records.
///
/// Every command reads `--config` when the file exists and falls back to
/// built-in defaults otherwise. Flags override config values.
#[derive(Parser)]
#[command(name = "ragprep", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragprep.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a commented default config file at `--config`.
    Init,

    /// Crawl the documentation site and save rendered page text.
    ///
    /// Opens the start page, reads the sidebar links, then visits each
    /// linked page in order.
    Crawl {
        /// Start page URL.
        #[arg(long)]
        base_url: Option<String>,

        /// Output JSON file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Run the browser without a window.
        #[arg(long, conflicts_with = "headed")]
        headless: bool,

        /// Show the browser window.
        #[arg(long)]
        headed: bool,

        /// List sidebar links without visiting pages or writing output.
        #[arg(long)]
        dry_run: bool,
    },

    /// Split crawled pages into course chunks.
    Chunk {
        /// Crawled pages JSON file.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output JSON file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Approximate chunk size in tokens.
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Attach thread context to forum posts and write RAG documents.
    Enrich {
        /// Forum posts, one JSON object per line.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output JSONL file of RAG documents.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write the posts with `thread_context` attached (JSON array).
        #[arg(long)]
        posts_output: Option<PathBuf>,

        /// Number of preceding posts to attach.
        #[arg(long)]
        context_size: Option<usize>,
    },

    /// Combine course chunks and forum posts into one record list.
    Merge {
        /// Course chunks JSON file.
        #[arg(long)]
        course: Option<PathBuf>,

        /// Forum posts JSON file.
        #[arg(long)]
        discourse: Option<PathBuf>,

        /// Output JSON file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        config::scaffold_config(&cli.config)?;
        println!("Wrote {}", cli.config.display());
        return Ok(());
    }

    let mut cfg = config::load_or_default(&cli.config)?;
    let reporter = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Init => {}
        Commands::Crawl {
            base_url,
            output,
            headless,
            headed,
            dry_run,
        } => {
            if let Some(url) = base_url {
                cfg.crawl.base_url = url;
            }
            if let Some(path) = output {
                cfg.crawl.output = path;
            }
            if headless {
                cfg.crawl.headless = true;
            }
            if headed {
                cfg.crawl.headless = false;
            }
            cfg.validate()?;

            let stats = crawl::run_crawl(&cfg.crawl, dry_run, reporter.as_ref()).await?;
            if dry_run {
                println!("crawl (dry-run)");
                println!("  links found: {}", stats.links);
            } else {
                println!("crawl");
                println!("  links found: {}", stats.links);
                println!("  pages saved: {}", stats.pages);
                println!("  output: {}", cfg.crawl.output.display());
            }
            println!("ok");
        }
        Commands::Chunk {
            input,
            output,
            max_tokens,
        } => {
            if let Some(path) = input {
                cfg.chunk.input = path;
            }
            if let Some(path) = output {
                cfg.chunk.output = path;
            }
            if let Some(n) = max_tokens {
                cfg.chunk.max_tokens = n;
            }
            cfg.validate()?;

            let stats = chunk::run_chunk(
                &cfg.chunk.input,
                &cfg.chunk.output,
                cfg.chunk.max_tokens,
                reporter.as_ref(),
            )?;
            println!("chunk");
            println!("  pages: {}", stats.pages);
            println!("  chunks written: {}", stats.chunks);
            println!("  output: {}", cfg.chunk.output.display());
            println!("ok");
        }
        Commands::Enrich {
            input,
            output,
            posts_output,
            context_size,
        } => {
            if let Some(path) = input {
                cfg.enrich.input = path;
            }
            if let Some(path) = output {
                cfg.enrich.output = path;
            }
            if posts_output.is_some() {
                cfg.enrich.posts_output = posts_output;
            }
            if let Some(n) = context_size {
                cfg.enrich.context_size = n;
            }

            let stats = enrich::run_enrich(
                &cfg.enrich.input,
                &cfg.enrich.output,
                cfg.enrich.posts_output.as_deref(),
                cfg.enrich.context_size,
                reporter.as_ref(),
            )?;
            println!("enrich");
            println!("  posts read: {}", stats.posts);
            println!("  documents written: {}", stats.documents);
            println!("  output: {}", cfg.enrich.output.display());
            if let Some(path) = &cfg.enrich.posts_output {
                println!("  posts with context: {}", path.display());
            }
            println!("ok");
        }
        Commands::Merge {
            course,
            discourse,
            output,
        } => {
            if let Some(path) = course {
                cfg.merge.course = path;
            }
            if let Some(path) = discourse {
                cfg.merge.discourse = path;
            }
            if let Some(path) = output {
                cfg.merge.output = path;
            }

            let stats = merge::combine_sources(
                &cfg.merge.course,
                &cfg.merge.discourse,
                &cfg.merge.output,
                reporter.as_ref(),
            )?;
            println!("merge");
            println!("  course records: {}", stats.course_records);
            println!("  discourse records: {}", stats.discourse_records);
            println!("  combined records: {}", stats.total());
            println!("  output: {}", cfg.merge.output.display());
            println!("ok");
        }
    }

    Ok(())
}
