//! # raven-db
//!
//! Persisted state for the mesh/Nostr daemon (design spec §6): a single
//! namespaced key/value store, not a relational schema — `id.*` identity
//! keys, `peer.*` fingerprint index, `fav.*` favorites, `ch.*` joined
//! channels, plus blocked-user sets. [`kv::KeyValueStore`] is the trait
//! the rest of the workspace depends on; [`kv::SqliteStore`] backs it with
//! a single SQLite table and [`kv::InMemoryStore`] backs it for tests.
//!
//! ## Storage
//!
//! - WAL mode mandatory
//! - All timestamps are Unix epoch milliseconds (u64), per [`raven_types`]'s clock
//! - Schema version stored in `PRAGMA user_version`

pub mod kv;
pub mod migrations;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the database at `path`, configuring WAL mode and
/// running any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database, for tests and as the default before a data
/// directory is configured.
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -8000;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_memory_sets_schema_version() {
        let conn = open_memory().expect("open in-memory db");
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("get user_version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn journal_mode_is_wal_or_memory() {
        let conn = open_memory().expect("open");
        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("get journal_mode");
        // in-memory databases use "memory" mode, not WAL
        assert!(mode == "wal" || mode == "memory");
    }
}
