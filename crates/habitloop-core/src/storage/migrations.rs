//! Database schema migrations for habitloop.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    }) {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: challenge documents, their index tables, habits and entries.
///
/// `challenge_members` and `challenge_links` are derived from the challenge
/// document on every save and exist only to answer resolver lookups.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS challenges (
            id                TEXT PRIMARY KEY,
            workspace_id      TEXT NOT NULL,
            status            TEXT NOT NULL,
            habit_template_id TEXT,
            match_mode        TEXT NOT NULL,
            doc               TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS challenge_members (
            challenge_id TEXT NOT NULL,
            user_id      TEXT NOT NULL,
            status       TEXT NOT NULL,
            PRIMARY KEY (challenge_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS challenge_links (
            challenge_id TEXT NOT NULL,
            user_id      TEXT NOT NULL,
            habit_id     TEXT NOT NULL,
            PRIMARY KEY (challenge_id, user_id, habit_id)
        );

        CREATE TABLE IF NOT EXISTS habits (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL,
            name         TEXT NOT NULL DEFAULT '',
            template_id  TEXT,
            workspace_id TEXT
        );

        CREATE TABLE IF NOT EXISTS habit_entries (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id   TEXT NOT NULL,
            habit_id  TEXT NOT NULL,
            date      TEXT NOT NULL,
            completed INTEGER NOT NULL,
            value     REAL
        );

        CREATE INDEX IF NOT EXISTS idx_challenges_status ON challenges(status);
        CREATE INDEX IF NOT EXISTS idx_challenges_template ON challenges(habit_template_id, status);
        CREATE INDEX IF NOT EXISTS idx_challenges_workspace ON challenges(workspace_id, status);
        CREATE INDEX IF NOT EXISTS idx_members_user ON challenge_members(user_id);
        CREATE INDEX IF NOT EXISTS idx_links_user_habit ON challenge_links(user_id, habit_id);
        CREATE INDEX IF NOT EXISTS idx_habits_user ON habits(user_id);
        CREATE INDEX IF NOT EXISTS idx_entries_user_habit ON habit_entries(user_id, habit_id, completed);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: workspace activity feed.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS feed (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            workspace_id TEXT NOT NULL,
            user_id      TEXT NOT NULL,
            type         TEXT NOT NULL,
            data         TEXT NOT NULL,
            visibility   TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_feed_workspace ON feed(workspace_id, created_at);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'feed'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }
}
