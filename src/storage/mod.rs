//! Storage module for persisting harvest data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent recipe insertion and upload bookkeeping
//! - The append-only operator log
//! - The last snapshot of each run kind

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{LogSink, RecipeStore, StorageError, StorageResult};

use crate::HarvestError;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between workers of a run
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Opens (or creates) the database and wraps it for sharing
pub fn open_shared(path: &Path) -> Result<SharedStorage, HarvestError> {
    Ok(Arc::new(Mutex::new(SqliteStorage::new(path)?)))
}

/// Locks shared storage, recovering the connection if a holder panicked
///
/// Never hold the guard across an `.await`.
pub fn lock(storage: &SharedStorage) -> MutexGuard<'_, SqliteStorage> {
    storage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Emits a tracing event and appends the same message to the operator log
///
/// A failing log write is reported through tracing only; it never aborts the
/// caller's run.
pub fn log_event(
    storage: &SharedStorage,
    level: LogLevel,
    message: &str,
    url: Option<&str>,
    site_id: Option<i64>,
) {
    match level {
        LogLevel::Info => tracing::info!(url = url.unwrap_or(""), "{}", message),
        LogLevel::Warn => tracing::warn!(url = url.unwrap_or(""), "{}", message),
        LogLevel::Error => tracing::error!(url = url.unwrap_or(""), "{}", message),
    }

    if let Err(e) = lock(storage).append(level, message, url, site_id) {
        tracing::warn!("Failed to record log entry: {}", e);
    }
}

/// A recipe in the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeRecord {
    pub id: i64,
    pub url: String,
    pub website: String,
    pub title: Option<String>,
    pub site_id: Option<i64>,
    pub crawled_at: String,
    pub upload_state: UploadState,
    pub uploaded_at: Option<String>,
}

/// Upload status of a recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    Pending,
    Uploaded,
}

impl UploadState {
    pub fn from_flag(uploaded: bool) -> Self {
        if uploaded {
            Self::Uploaded
        } else {
            Self::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploaded => "uploaded",
        }
    }
}

/// An operator-visible log line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub level: LogLevel,
    pub message: String,
    pub url: Option<String>,
    pub site_id: Option<i64>,
    pub created_at: String,
}

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
