//! State module for tracking run progress
//!
//! # Components
//!
//! - `RunStatus` / `ProgressKind`: lifecycle of crawl and upload runs
//! - `CrawlSnapshot` / `UploadSnapshot`: fixed-shape progress records
//! - `ProgressBoard`: the progress sink external viewers read from
//! - `EntryStatus`: traversal status of a frontier entry

mod frontier_status;
mod progress;
mod run_status;

// Re-export main types
pub use frontier_status::EntryStatus;
pub use progress::{CrawlSnapshot, ProgressBoard, Snapshot, UploadSnapshot};
pub use run_status::{ProgressKind, RunStatus};
