//! Storage traits and error types
//!
//! The crawl engine and upload pipeline only talk to storage through these
//! traits.

use crate::state::ProgressKind;
use crate::storage::{LogEntry, LogLevel, RecipeRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Recipe not found: {0}")]
    RecipeNotFound(i64),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent set of discovered recipes
pub trait RecipeStore {
    // ===== Discovery =====

    /// Records a recipe URL unless it is already stored
    ///
    /// # Returns
    ///
    /// `true` if a new record was created, `false` if the URL was known.
    fn insert_if_absent(
        &mut self,
        url: &str,
        site_id: i64,
        title: Option<&str>,
    ) -> StorageResult<bool>;

    /// Gets a recipe by URL
    fn get_recipe_by_url(&self, url: &str) -> StorageResult<Option<RecipeRecord>>;

    // ===== Upload =====

    /// Lists records not yet uploaded, oldest discovery first
    fn list_pending(&self) -> StorageResult<Vec<RecipeRecord>>;

    /// Marks a record uploaded at the given time
    fn mark_uploaded(&mut self, id: i64, at: DateTime<Utc>) -> StorageResult<()>;

    // ===== Statistics =====

    fn count_total(&self) -> StorageResult<u64>;

    fn count_uploaded(&self) -> StorageResult<u64>;

    fn count_pending(&self) -> StorageResult<u64> {
        Ok(self.count_total()?.saturating_sub(self.count_uploaded()?))
    }

    /// Most recently discovered records, newest first
    fn recent_recipes(&self, limit: usize) -> StorageResult<Vec<RecipeRecord>>;

    /// Every stored URL in discovery order
    fn all_urls(&self) -> StorageResult<Vec<String>>;

    // ===== Progress =====

    /// Persists the serialized final snapshot of a run
    fn save_progress(&mut self, kind: ProgressKind, snapshot_json: &str) -> StorageResult<()>;

    /// Loads the last persisted snapshot of a run kind
    fn load_progress(&self, kind: ProgressKind) -> StorageResult<Option<String>>;
}

/// Append-only sink for operator-visible log entries
pub trait LogSink {
    fn append(
        &mut self,
        level: LogLevel,
        message: &str,
        url: Option<&str>,
        site_id: Option<i64>,
    ) -> StorageResult<()>;

    /// Most recent entries, newest first
    fn recent_logs(&self, limit: usize) -> StorageResult<Vec<LogEntry>>;
}
