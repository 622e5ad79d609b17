//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- One row per broadcast
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('live', 'ended')),
            title TEXT,
            game_id TEXT,
            user_id TEXT,
            user_name TEXT,
            thumbnail_url TEXT,
            video_json TEXT,
            ended_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Raw reaction log, append-only
        CREATE TABLE IF NOT EXISTS reactions (
            session_id TEXT NOT NULL,
            id TEXT NOT NULL,
            posted_at INTEGER NOT NULL,
            positive INTEGER NOT NULL,
            text TEXT NOT NULL,
            recorded_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (session_id, id)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_posted ON reactions(session_id, posted_at);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Computed summaries; live and replay results kept side by side
        CREATE TABLE IF NOT EXISTS summaries (
            session_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('live', 'replay')),
            total INTEGER NOT NULL,
            min INTEGER NOT NULL,
            max INTEGER NOT NULL,
            running_high INTEGER NOT NULL,
            running_low INTEGER NOT NULL,
            series_json TEXT NOT NULL DEFAULT '[]',
            uptime_minutes INTEGER NOT NULL DEFAULT 0,
            event_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (session_id, kind)
        );

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_sets_version() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();

        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();
    }
}
