//! Output module for reports and exports
//!
//! This module handles:
//! - Summarizing stored recipes, recent log entries and the last runs
//! - Exporting stored recipe URLs as text or CSV

pub mod export;
pub mod stats;

pub use export::{export_recipes, write_urls, ExportFormat};
pub use stats::{load_statistics, print_statistics, HarvestStatistics, DEFAULT_RECENT_LIMIT};
