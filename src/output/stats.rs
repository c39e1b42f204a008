//! Statistics generation from the recipe database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::state::{CrawlSnapshot, ProgressKind, UploadSnapshot};
use crate::storage::{LogEntry, LogSink, RecipeRecord, RecipeStore, SqliteStorage};
use crate::HarvestError;
use serde::Serialize;

/// Number of recent recipes and log lines included by default
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Harvest statistics summary
#[derive(Debug, Clone, Serialize)]
pub struct HarvestStatistics {
    pub total_recipes: u64,
    pub uploaded: u64,
    pub pending: u64,

    /// Newest recipes first
    pub recent_recipes: Vec<RecipeRecord>,

    /// Newest log entries first
    pub recent_logs: Vec<LogEntry>,

    /// Final snapshot of the last crawl, if any crawl has ended
    pub last_crawl: Option<CrawlSnapshot>,

    /// Final snapshot of the last upload, if any upload has ended
    pub last_upload: Option<UploadSnapshot>,
}

/// Loads statistics from storage
///
/// A stored snapshot that no longer parses is reported as absent.
pub fn load_statistics(
    storage: &SqliteStorage,
    recent_limit: usize,
) -> Result<HarvestStatistics, HarvestError> {
    let total_recipes = storage.count_total()?;
    let uploaded = storage.count_uploaded()?;

    let last_crawl = storage
        .load_progress(ProgressKind::Crawl)?
        .and_then(|json| parse_snapshot(&json));
    let last_upload = storage
        .load_progress(ProgressKind::Upload)?
        .and_then(|json| parse_snapshot(&json));

    Ok(HarvestStatistics {
        total_recipes,
        uploaded,
        pending: total_recipes.saturating_sub(uploaded),
        recent_recipes: storage.recent_recipes(recent_limit)?,
        recent_logs: storage.recent_logs(recent_limit)?,
        last_crawl,
        last_upload,
    })
}

fn parse_snapshot<T: serde::de::DeserializeOwned>(json: &str) -> Option<T> {
    serde_json::from_str(json)
        .map_err(|e| tracing::warn!("Ignoring unreadable stored snapshot: {}", e))
        .ok()
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Recipes:");
    println!("  Total stored: {}", stats.total_recipes);
    println!("  Uploaded: {}", stats.uploaded);
    println!("  Pending: {}", stats.pending);
    println!();

    if let Some(crawl) = &stats.last_crawl {
        println!("Last Crawl:");
        println!(
            "  Site: {}",
            crawl.site_name.as_deref().unwrap_or("(none)")
        );
        println!("  Status: {}", crawl.status);
        println!("  Pages fetched: {}", crawl.pages);
        println!("  Recipes found: {}", crawl.recipes_found);
        if let Some(message) = &crawl.message {
            println!("  Message: {}", message);
        }
        println!();
    }

    if let Some(upload) = &stats.last_upload {
        println!("Last Upload:");
        println!("  Status: {}", upload.status);
        println!(
            "  Attempted: {} / {} ({} uploaded, {} failed)",
            upload.done, upload.total, upload.uploaded, upload.failed
        );
        if let Some(message) = &upload.message {
            println!("  Message: {}", message);
        }
        println!();
    }

    if !stats.recent_recipes.is_empty() {
        println!("Recent Recipes:");
        for recipe in &stats.recent_recipes {
            println!(
                "  [{}] {} {}",
                recipe.upload_state.as_str(),
                recipe.url,
                recipe.title.as_deref().unwrap_or("")
            );
        }
        println!();
    }

    if !stats.recent_logs.is_empty() {
        println!("Recent Log:");
        for entry in &stats.recent_logs {
            match &entry.url {
                Some(url) => println!(
                    "  {} {:5} {} ({})",
                    entry.created_at, entry.level, entry.message, url
                ),
                None => println!("  {} {:5} {}", entry.created_at, entry.level, entry.message),
            }
        }
    }
}
