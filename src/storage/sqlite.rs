//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.

use crate::state::ProgressKind;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{LogSink, RecipeStore, StorageError, StorageResult};
use crate::storage::{LogEntry, LogLevel, RecipeRecord, UploadState};
use crate::url::host_key;
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RECIPE_COLUMNS: &str =
    "id, url, website, title, site_id, crawled_at, uploaded, uploaded_at";

/// SQLite storage backend
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn recipe_from_row(row: &Row<'_>) -> rusqlite::Result<RecipeRecord> {
    Ok(RecipeRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        website: row.get(2)?,
        title: row.get(3)?,
        site_id: row.get(4)?,
        crawled_at: row.get(5)?,
        upload_state: UploadState::from_flag(row.get::<_, i64>(6)? != 0),
        uploaded_at: row.get(7)?,
    })
}

fn website_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| host_key(&u))
        .unwrap_or_default()
}

impl RecipeStore for SqliteStorage {
    // ===== Discovery =====

    fn insert_if_absent(
        &mut self,
        url: &str,
        site_id: i64,
        title: Option<&str>,
    ) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO recipes (url, website, title, site_id, crawled_at, uploaded)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![url, website_of(url), title, site_id, now],
        )?;
        Ok(inserted > 0)
    }

    fn get_recipe_by_url(&self, url: &str) -> StorageResult<Option<RecipeRecord>> {
        let sql = format!("SELECT {} FROM recipes WHERE url = ?1", RECIPE_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, params![url], recipe_from_row)
            .optional()?;
        Ok(record)
    }

    // ===== Upload =====

    fn list_pending(&self) -> StorageResult<Vec<RecipeRecord>> {
        let sql = format!(
            "SELECT {} FROM recipes WHERE uploaded = 0 ORDER BY id ASC",
            RECIPE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn mark_uploaded(&mut self, id: i64, at: DateTime<Utc>) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE recipes SET uploaded = 1, uploaded_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(StorageError::RecipeNotFound(id));
        }
        Ok(())
    }

    // ===== Statistics =====

    fn count_total(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_uploaded(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM recipes WHERE uploaded = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn recent_recipes(&self, limit: usize) -> StorageResult<Vec<RecipeRecord>> {
        let sql = format!(
            "SELECT {} FROM recipes ORDER BY id DESC LIMIT ?1",
            RECIPE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![limit as i64], recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn all_urls(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT url FROM recipes ORDER BY id ASC")?;
        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    // ===== Progress =====

    fn save_progress(&mut self, kind: ProgressKind, snapshot_json: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO progress (kind, snapshot, updated_at) VALUES (?1, ?2, ?3)",
            params![kind.as_str(), snapshot_json, now],
        )?;
        Ok(())
    }

    fn load_progress(&self, kind: ProgressKind) -> StorageResult<Option<String>> {
        let snapshot = self
            .conn
            .query_row(
                "SELECT snapshot FROM progress WHERE kind = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(snapshot)
    }
}

impl LogSink for SqliteStorage {
    fn append(
        &mut self,
        level: LogLevel,
        message: &str,
        url: Option<&str>,
        site_id: Option<i64>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO logs (level, message, url, site_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![level.to_db_string(), message, url, site_id, now],
        )?;
        Ok(())
    }

    fn recent_logs(&self, limit: usize) -> StorageResult<Vec<LogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, level, message, url, site_id, created_at
             FROM logs ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, level, message, url, site_id, created_at)| {
                let level = LogLevel::from_db_string(&level)
                    .ok_or_else(|| StorageError::InvalidValue(format!("log level '{}'", level)))?;
                Ok(LogEntry {
                    id,
                    level,
                    message,
                    url,
                    site_id,
                    created_at,
                })
            })
            .collect()
    }
}
