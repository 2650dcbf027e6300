//! Readiness checks for connections handed to the store.
//!
//! # Invariants
//! - A store is only built on a connection at the latest schema version with
//!   the `kv_entries` shape this binary expects.

use super::migrations::{current_user_version, latest_version};
use super::{DbError, DbResult};
use rusqlite::Connection;

const KV_TABLE: &str = "kv_entries";
const KV_COLUMNS: [&str; 5] = ["namespace", "key", "value", "format_version", "updated_at"];

/// Verifies that `conn` has been migrated and carries the key/value table.
///
/// # Errors
/// - `UninitializedConnection` when `user_version` differs from the latest.
/// - `MissingRequiredTable` / `MissingRequiredColumn` for schema drift.
pub fn ensure_store_schema(conn: &Connection) -> DbResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(DbError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, KV_TABLE)? {
        return Err(DbError::MissingRequiredTable(KV_TABLE));
    }

    for column in KV_COLUMNS {
        if !table_has_column(conn, KV_TABLE, column)? {
            return Err(DbError::MissingRequiredColumn {
                table: KV_TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
