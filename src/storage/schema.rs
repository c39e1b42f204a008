//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the recipe store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Discovered recipes; url uniqueness absorbs concurrent rediscovery
CREATE TABLE IF NOT EXISTS recipes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    website TEXT NOT NULL,
    title TEXT,
    site_id INTEGER,
    crawled_at TEXT NOT NULL,
    uploaded INTEGER NOT NULL DEFAULT 0,
    uploaded_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_recipes_uploaded ON recipes(uploaded);
CREATE INDEX IF NOT EXISTS idx_recipes_site ON recipes(site_id);

-- Append-only run log shown to operators
CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    url TEXT,
    site_id INTEGER,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_logs_site ON logs(site_id);

-- Last published snapshot per run kind, serialized as JSON
CREATE TABLE IF NOT EXISTS progress (
    kind TEXT PRIMARY KEY,
    snapshot TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
