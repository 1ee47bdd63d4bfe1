//! # ragprep
//!
//! Scrape a course documentation site and forum exports, then reshape the
//! captured content into JSON/JSONL records for a retrieval-augmented
//! generation (RAG) pipeline.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────┐   ┌─────────┐
//! │  crawl  │──▶│  chunk  │──────────────┐
//! │ browser │   │ pages   │              ▼
//! └─────────┘   └─────────┘         ┌─────────┐
//!                                   │  merge  │──▶ combined JSON
//! ┌─────────┐   posts + context     └─────────┘
//! │ enrich  │───────────────────────────▲
//! │ forum   │──▶ RAG documents (JSONL)
//! └─────────┘
//! ```
//!
//! Each job is a single sequential read → transform → write pass.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Record types |
//! | [`browser`] | Chromium page driver |
//! | [`crawl`] | Sidebar crawler |
//! | [`chunk`] | Page chunking |
//! | [`enrich`] | Thread context and RAG documents |
//! | [`merge`] | Source normalization |
//! | [`jsonio`] | JSON / JSONL files |
//! | [`progress`] | Progress reporting |

pub mod browser;
pub mod chunk;
pub mod config;
pub mod crawl;
pub mod enrich;
pub mod jsonio;
pub mod merge;
pub mod models;
pub mod progress;
