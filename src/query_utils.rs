//! Database query utility functions
//!
//! Low-level helpers for common single-value query patterns. These reduce
//! boilerplate when probing SQLite for counts, pragma results and schema
//! membership.
//!
//! # Usage
//!
//! ```no_run
//! use featdb::query_utils::{query_single_i64_required, table_exists};
//! use rusqlite::Connection;
//!
//! let db = Connection::open("features.sqlite").unwrap();
//! let count = query_single_i64_required(&db, "SELECT COUNT(*) FROM Feature").unwrap();
//! let has_samples = table_exists(&db, "Sample").unwrap();
//! ```

use anyhow_ext::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

// ============================================================================
// Single value query helpers
// ============================================================================

/// Query a single optional String value
pub fn query_single_string(db: &Connection, sql: &str) -> Result<Option<String>> {
    db.prepare(sql)
        .dot()?
        .query_row([], |row| row.get(0))
        .optional()
        .dot()
}

/// Query a single optional i64 value
pub fn query_single_i64(db: &Connection, sql: &str) -> Result<Option<i64>> {
    db.prepare(sql)
        .dot()?
        .query_row([], |row| row.get(0))
        .optional()
        .dot()
}

/// Query a single required i64 value (returns error if not found)
pub fn query_single_i64_required(db: &Connection, sql: &str) -> Result<i64> {
    db.prepare(sql)
        .dot()?
        .query_row([], |row| row.get(0))
        .dot()
}

// ============================================================================
// Table utilities
// ============================================================================

/// Check if a table exists in the database
pub fn table_exists(db: &Connection, table_name: &str) -> Result<bool> {
    let count: i64 = db
        .prepare("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?1")?
        .query_row([table_name], |row| row.get(0))?;
    Ok(count > 0)
}
