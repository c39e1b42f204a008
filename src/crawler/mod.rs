//! Crawler module for recipe discovery
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with politeness delay and retry
//! - HTML parsing, link extraction and recipe classification
//! - The per-run frontier
//! - Overall crawl coordination
//! - Prescan heuristics for configuring new sites

mod classifier;
mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod prescan;

pub use classifier::{classify, has_structured_recipe, PageVerdict, RecipeClassifier};
pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{
    build_http_client, is_transient_status, Backoff, FetchOptions, FetchResult, Fetcher,
};
pub use frontier::{Frontier, FrontierEntry, NextUrl};
pub use parser::{extract_title, parse_html, ParsedPage, MAX_TITLE_CHARS};
pub use prescan::{
    guess_pattern, guess_selectors, prescan, prescan_with, sample_links, PrescanReport,
    COMMON_PATTERNS, FALLBACK_PATTERN,
};
