//! Database schema migrations for kinring.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

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

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: users, connections, actions and the derived per-user rows.
///
/// `user_achievements.connection_id` uses `''` for global achievements so the
/// unique key also holds for them (SQLite treats NULLs as distinct).
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id           TEXT PRIMARY KEY,
            display_name TEXT NOT NULL DEFAULT '',
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS connections (
            id                    TEXT PRIMARY KEY,
            user_id               TEXT NOT NULL REFERENCES users(id),
            name                  TEXT NOT NULL,
            cadence               TEXT NOT NULL,
            ring_tier             TEXT NOT NULL DEFAULT 'outer',
            last_interaction_date TEXT,
            next_catchup_date     TEXT
        );

        CREATE TABLE IF NOT EXISTS actions (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL REFERENCES users(id),
            connection_id TEXT NOT NULL REFERENCES connections(id),
            action_type   TEXT NOT NULL,
            weight        INTEGER NOT NULL,
            date          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS daily_habit_logs (
            user_id        TEXT NOT NULL,
            date           TEXT NOT NULL,
            total_weight   INTEGER NOT NULL,
            action_count   INTEGER NOT NULL,
            is_valid_day   INTEGER NOT NULL,
            highest_action TEXT,
            PRIMARY KEY (user_id, date)
        );

        CREATE TABLE IF NOT EXISTS user_streaks (
            user_id                TEXT PRIMARY KEY,
            current_streak         INTEGER NOT NULL DEFAULT 0,
            longest_streak         INTEGER NOT NULL DEFAULT 0,
            last_interaction_date  TEXT,
            streak_started_at      TEXT,
            freezes_used_this_week INTEGER NOT NULL DEFAULT 0,
            week_freeze_reset_date TEXT
        );

        CREATE TABLE IF NOT EXISTS connection_health (
            connection_id            TEXT PRIMARY KEY REFERENCES connections(id),
            ring_tier                TEXT NOT NULL,
            ring_position            INTEGER NOT NULL DEFAULT 0,
            current_strength         TEXT NOT NULL,
            previous_strength        TEXT,
            strength_changed_at      TEXT,
            days_since_action        INTEGER,
            decay_started_at         TEXT,
            last_action_date         TEXT,
            last_action_type         TEXT,
            lifecycle_state          TEXT NOT NULL DEFAULT 'active',
            last_nudge_level         TEXT,
            last_nudge_at            TEXT,
            total_actions_logged     INTEGER NOT NULL DEFAULT 0,
            total_weight_accumulated INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS user_achievements (
            user_id          TEXT NOT NULL,
            achievement_id   TEXT NOT NULL,
            connection_id    TEXT NOT NULL DEFAULT '',
            current_progress INTEGER NOT NULL DEFAULT 0,
            is_unlocked      INTEGER NOT NULL DEFAULT 0,
            unlocked_at      TEXT,
            UNIQUE (user_id, achievement_id, connection_id)
        );

        CREATE INDEX IF NOT EXISTS idx_connections_user ON connections(user_id);
        CREATE INDEX IF NOT EXISTS idx_actions_user_date ON actions(user_id, date);
        CREATE INDEX IF NOT EXISTS idx_actions_connection ON actions(connection_id);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

/// Migration v2: memory notes on actions and the recovery event log.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE actions ADD COLUMN note TEXT;

        CREATE TABLE IF NOT EXISTS recovery_events (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       TEXT NOT NULL,
            connection_id TEXT NOT NULL,
            recovered_on  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_recovery_events_user ON recovery_events(user_id, recovered_on);",
    )?;

    set_schema_version(&tx, 2)?;
    tx.commit()?;
    Ok(())
}
