//! SQLite-backed engagement store.
//!
//! Provides persistent storage for:
//! - Users and their connections
//! - Logged actions and daily habit logs
//! - Per-user streaks (written with compare-and-swap)
//! - Per-connection health rows
//! - Achievement progress and the recovery event log
//!
//! Calendar dates are stored as `YYYY-MM-DD`, timestamps as RFC 3339 UTC with
//! millisecond precision so both sort lexicographically.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use super::migrations;
use super::Config;
use crate::achievements::UserAchievement;
use crate::action::{Action, Connection as Contact};
use crate::error::{DatabaseError, Result};
use crate::habit::DailyHabitLog;
use crate::health::ConnectionHealth;
use crate::recency::Cadence;
use crate::repository::{
    AchievementRepository, ActionRepository, ConnectionRepository, HabitLogRepository,
    HealthRepository, StreakRepository, Transactional, UserRepository,
};
use crate::streak::UserStreak;

const DATE_FORMAT: &str = "%Y-%m-%d";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn fmt_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn corrupt(column: &'static str, value: &str) -> DatabaseError {
    DatabaseError::CorruptValue {
        column,
        value: value.to_string(),
    }
}

fn parse_date(column: &'static str, value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| corrupt(column, value))
}

fn parse_ts(column: &'static str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| corrupt(column, value))
}

fn parse_uuid(column: &'static str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|_| corrupt(column, value))
}

fn parse_label<T: FromStr>(column: &'static str, value: &str) -> Result<T, DatabaseError> {
    value.parse().map_err(|_| corrupt(column, value))
}

fn parse_opt<T>(
    value: Option<String>,
    parse: impl FnOnce(&str) -> Result<T, DatabaseError>,
) -> Result<Option<T>, DatabaseError> {
    value.as_deref().map(parse).transpose()
}

/// Unknown cadence labels fall back to monthly rather than failing the read.
fn parse_cadence(value: &str) -> Cadence {
    value.parse().unwrap_or_else(|_| {
        tracing::warn!(cadence = value, "unknown cadence label, using monthly");
        Cadence::Monthly
    })
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

struct ContactRow {
    id: String,
    user_id: String,
    name: String,
    cadence: String,
    ring_tier: String,
    last_interaction_date: Option<String>,
    next_catchup_date: Option<String>,
}

impl ContactRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            cadence: row.get(3)?,
            ring_tier: row.get(4)?,
            last_interaction_date: row.get(5)?,
            next_catchup_date: row.get(6)?,
        })
    }

    fn decode(self) -> Result<Contact, DatabaseError> {
        Ok(Contact {
            id: parse_uuid("connections.id", &self.id)?,
            user_id: parse_uuid("connections.user_id", &self.user_id)?,
            name: self.name,
            cadence: parse_cadence(&self.cadence),
            ring_tier: parse_label("connections.ring_tier", &self.ring_tier)?,
            last_interaction_date: parse_opt(self.last_interaction_date, |v| {
                parse_ts("connections.last_interaction_date", v)
            })?,
            next_catchup_date: parse_opt(self.next_catchup_date, |v| {
                parse_date("connections.next_catchup_date", v)
            })?,
        })
    }
}

const CONTACT_COLUMNS: &str =
    "id, user_id, name, cadence, ring_tier, last_interaction_date, next_catchup_date";

struct ActionRow {
    id: String,
    connection_id: String,
    action_type: String,
    date: String,
    note: Option<String>,
}

impl ActionRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            connection_id: row.get(1)?,
            action_type: row.get(2)?,
            date: row.get(3)?,
            note: row.get(4)?,
        })
    }

    fn decode(self) -> Result<Action, DatabaseError> {
        Ok(Action {
            id: parse_uuid("actions.id", &self.id)?,
            connection_id: parse_uuid("actions.connection_id", &self.connection_id)?,
            action_type: parse_label("actions.action_type", &self.action_type)?,
            date: parse_date("actions.date", &self.date)?,
            note: self.note,
        })
    }
}

/// SQLite database for engagement storage.
///
/// Implements every repository trait the engine consumes.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database configured in `config`, inside the data directory.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.database_path()?;
        Self::open_at(&path)
    }

    /// Open (creating if needed) the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        tracing::debug!(
            version = migrations::get_schema_version(&conn),
            "database ready"
        );
        Ok(Self { conn })
    }
}

impl Transactional for Database {
    fn in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    tracing::error!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

impl UserRepository for Database {
    fn create_user(&self, user_id: Uuid, display_name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, display_name, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name",
            params![user_id.to_string(), display_name, fmt_ts(Utc::now())],
        )?;
        Ok(())
    }

    fn user_exists(&self, user_id: Uuid) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM users WHERE id = ?1",
                params![user_id.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl ConnectionRepository for Database {
    fn insert_connection(&self, connection: &Contact) -> Result<()> {
        self.conn.execute(
            "INSERT INTO connections
                (id, user_id, name, cadence, ring_tier, last_interaction_date, next_catchup_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                connection.id.to_string(),
                connection.user_id.to_string(),
                connection.name,
                connection.cadence.as_str(),
                connection.ring_tier.as_str(),
                connection.last_interaction_date.map(fmt_ts),
                connection.next_catchup_date.map(fmt_date),
            ],
        )?;
        Ok(())
    }

    fn get_connection(&self, user_id: Uuid, connection_id: Uuid) -> Result<Option<Contact>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM connections WHERE id = ?1 AND user_id = ?2"),
                params![connection_id.to_string(), user_id.to_string()],
                ContactRow::from_row,
            )
            .optional()?;
        Ok(row.map(ContactRow::decode).transpose()?)
    }

    fn list_connections(&self, user_id: Uuid) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONTACT_COLUMNS} FROM connections WHERE user_id = ?1 ORDER BY name, id"
        ))?;
        let rows = stmt.query_map(params![user_id.to_string()], ContactRow::from_row)?;

        let mut connections = Vec::new();
        for row in rows {
            connections.push(row?.decode()?);
        }
        Ok(connections)
    }

    fn touch_last_interaction(&self, connection_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE connections SET last_interaction_date = ?2
             WHERE id = ?1 AND (last_interaction_date IS NULL OR last_interaction_date < ?2)",
            params![connection_id.to_string(), fmt_ts(at)],
        )?;
        Ok(())
    }
}

impl ActionRepository for Database {
    fn insert_action(&self, user_id: Uuid, action: &Action) -> Result<()> {
        self.conn.execute(
            "INSERT INTO actions (id, user_id, connection_id, action_type, weight, date, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                action.id.to_string(),
                user_id.to_string(),
                action.connection_id.to_string(),
                action.action_type.as_str(),
                action.weight(),
                fmt_date(action.date),
                action.note,
            ],
        )?;
        Ok(())
    }

    fn actions_between(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Action>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, connection_id, action_type, date, note FROM actions
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, rowid",
        )?;
        let rows = stmt.query_map(
            params![user_id.to_string(), fmt_date(from), fmt_date(to)],
            ActionRow::from_row,
        )?;

        let mut actions = Vec::new();
        for row in rows {
            actions.push(row?.decode()?);
        }
        Ok(actions)
    }

    fn actions_for_user(&self, user_id: Uuid) -> Result<Vec<Action>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, connection_id, action_type, date, note FROM actions
             WHERE user_id = ?1 ORDER BY date, rowid",
        )?;
        let rows = stmt.query_map(params![user_id.to_string()], ActionRow::from_row)?;

        let mut actions = Vec::new();
        for row in rows {
            actions.push(row?.decode()?);
        }
        Ok(actions)
    }
}

impl HabitLogRepository for Database {
    fn upsert_daily_log(&self, user_id: Uuid, log: &DailyHabitLog) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO daily_habit_logs
                (user_id, date, total_weight, action_count, is_valid_day, highest_action)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id.to_string(),
                fmt_date(log.date),
                log.total_weight,
                log.action_count,
                log.is_valid_day,
                log.highest_action.map(|a| a.as_str()),
            ],
        )?;
        Ok(())
    }

    fn daily_log(&self, user_id: Uuid, date: NaiveDate) -> Result<Option<DailyHabitLog>> {
        let row = self
            .conn
            .query_row(
                "SELECT total_weight, action_count, is_valid_day, highest_action
                 FROM daily_habit_logs WHERE user_id = ?1 AND date = ?2",
                params![user_id.to_string(), fmt_date(date)],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, bool>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((total_weight, action_count, is_valid_day, highest)) = row else {
            return Ok(None);
        };
        Ok(Some(DailyHabitLog {
            date,
            total_weight: to_u32(total_weight),
            action_count: to_u32(action_count),
            is_valid_day,
            highest_action: parse_opt(highest, |v| {
                parse_label("daily_habit_logs.highest_action", v)
            })?,
        }))
    }
}

impl StreakRepository for Database {
    fn load_streak(&self, user_id: Uuid) -> Result<Option<UserStreak>> {
        let row = self
            .conn
            .query_row(
                "SELECT current_streak, longest_streak, last_interaction_date, streak_started_at,
                        freezes_used_this_week, week_freeze_reset_date
                 FROM user_streaks WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((current, longest, last, started, freezes, reset)) = row else {
            return Ok(None);
        };
        Ok(Some(UserStreak {
            current_streak: to_u32(current),
            longest_streak: to_u32(longest),
            last_interaction_date: parse_opt(last, |v| {
                parse_date("user_streaks.last_interaction_date", v)
            })?,
            streak_started_at: parse_opt(started, |v| {
                parse_date("user_streaks.streak_started_at", v)
            })?,
            freezes_used_this_week: to_u32(freezes),
            week_freeze_reset_date: parse_opt(reset, |v| {
                parse_date("user_streaks.week_freeze_reset_date", v)
            })?,
        }))
    }

    fn compare_and_swap_streak(
        &self,
        user_id: Uuid,
        expected_last: Option<NaiveDate>,
        streak: &UserStreak,
    ) -> Result<bool> {
        let user = user_id.to_string();
        let last = streak.last_interaction_date.map(fmt_date);
        let started = streak.streak_started_at.map(fmt_date);
        let reset = streak.week_freeze_reset_date.map(fmt_date);

        let changed = match expected_last {
            // First write, or a row that has never seen an interaction.
            None => self.conn.execute(
                "INSERT INTO user_streaks
                    (user_id, current_streak, longest_streak, last_interaction_date,
                     streak_started_at, freezes_used_this_week, week_freeze_reset_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(user_id) DO UPDATE SET
                    current_streak = excluded.current_streak,
                    longest_streak = excluded.longest_streak,
                    last_interaction_date = excluded.last_interaction_date,
                    streak_started_at = excluded.streak_started_at,
                    freezes_used_this_week = excluded.freezes_used_this_week,
                    week_freeze_reset_date = excluded.week_freeze_reset_date
                 WHERE user_streaks.last_interaction_date IS NULL",
                params![
                    user,
                    streak.current_streak,
                    streak.longest_streak,
                    last,
                    started,
                    streak.freezes_used_this_week,
                    reset,
                ],
            )?,
            Some(expected) => self.conn.execute(
                "UPDATE user_streaks SET
                    current_streak = ?2,
                    longest_streak = ?3,
                    last_interaction_date = ?4,
                    streak_started_at = ?5,
                    freezes_used_this_week = ?6,
                    week_freeze_reset_date = ?7
                 WHERE user_id = ?1 AND last_interaction_date = ?8",
                params![
                    user,
                    streak.current_streak,
                    streak.longest_streak,
                    last,
                    started,
                    streak.freezes_used_this_week,
                    reset,
                    fmt_date(expected),
                ],
            )?,
        };
        Ok(changed > 0)
    }
}

impl HealthRepository for Database {
    fn load_health(&self, connection_id: Uuid) -> Result<Option<ConnectionHealth>> {
        type Raw = (
            String,
            i64,
            String,
            Option<String>,
            Option<String>,
            Option<i64>,
            Option<String>,
            Option<String>,
            Option<String>,
            String,
            Option<String>,
            Option<String>,
            i64,
            i64,
        );

        let row: Option<Raw> = self
            .conn
            .query_row(
                "SELECT ring_tier, ring_position, current_strength, previous_strength,
                        strength_changed_at, days_since_action, decay_started_at,
                        last_action_date, last_action_type, lifecycle_state,
                        last_nudge_level, last_nudge_at,
                        total_actions_logged, total_weight_accumulated
                 FROM connection_health WHERE connection_id = ?1",
                params![connection_id.to_string()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                        row.get(10)?,
                        row.get(11)?,
                        row.get(12)?,
                        row.get(13)?,
                    ))
                },
            )
            .optional()?;

        let Some(raw) = row else {
            return Ok(None);
        };
        Ok(Some(ConnectionHealth {
            connection_id,
            ring_tier: parse_label("connection_health.ring_tier", &raw.0)?,
            ring_position: to_u32(raw.1),
            current_strength: parse_label("connection_health.current_strength", &raw.2)?,
            previous_strength: parse_opt(raw.3, |v| {
                parse_label("connection_health.previous_strength", v)
            })?,
            strength_changed_at: parse_opt(raw.4, |v| {
                parse_ts("connection_health.strength_changed_at", v)
            })?,
            days_since_action: raw.5,
            decay_started_at: parse_opt(raw.6, |v| {
                parse_ts("connection_health.decay_started_at", v)
            })?,
            last_action_date: parse_opt(raw.7, |v| {
                parse_date("connection_health.last_action_date", v)
            })?,
            last_action_type: parse_opt(raw.8, |v| {
                parse_label("connection_health.last_action_type", v)
            })?,
            lifecycle_state: parse_label("connection_health.lifecycle_state", &raw.9)?,
            last_nudge_level: parse_opt(raw.10, |v| {
                parse_label("connection_health.last_nudge_level", v)
            })?,
            last_nudge_at: parse_opt(raw.11, |v| {
                parse_ts("connection_health.last_nudge_at", v)
            })?,
            total_actions_logged: to_u32(raw.12),
            total_weight_accumulated: to_u32(raw.13),
        }))
    }

    fn save_health(&self, health: &ConnectionHealth) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO connection_health
                (connection_id, ring_tier, ring_position, current_strength, previous_strength,
                 strength_changed_at, days_since_action, decay_started_at, last_action_date,
                 last_action_type, lifecycle_state, last_nudge_level, last_nudge_at,
                 total_actions_logged, total_weight_accumulated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                health.connection_id.to_string(),
                health.ring_tier.as_str(),
                health.ring_position,
                health.current_strength.as_str(),
                health.previous_strength.map(|t| t.as_str()),
                health.strength_changed_at.map(fmt_ts),
                health.days_since_action,
                health.decay_started_at.map(fmt_ts),
                health.last_action_date.map(fmt_date),
                health.last_action_type.map(|a| a.as_str()),
                health.lifecycle_state.as_str(),
                health.last_nudge_level.map(|n| n.as_str()),
                health.last_nudge_at.map(fmt_ts),
                health.total_actions_logged,
                health.total_weight_accumulated,
            ],
        )?;
        Ok(())
    }
}

fn connection_key(connection_id: Option<Uuid>) -> String {
    connection_id.map(|id| id.to_string()).unwrap_or_default()
}

impl AchievementRepository for Database {
    fn list_user_achievements(&self, user_id: Uuid) -> Result<Vec<UserAchievement>> {
        let mut stmt = self.conn.prepare(
            "SELECT achievement_id, connection_id, current_progress, is_unlocked, unlocked_at
             FROM user_achievements WHERE user_id = ?1
             ORDER BY achievement_id, connection_id",
        )?;
        let rows = stmt.query_map(params![user_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut achievements = Vec::new();
        for row in rows {
            let (achievement_id, connection_id, progress, is_unlocked, unlocked_at) = row?;
            let connection_id = if connection_id.is_empty() {
                None
            } else {
                Some(parse_uuid("user_achievements.connection_id", &connection_id)?)
            };
            achievements.push(UserAchievement {
                user_id,
                achievement_id,
                connection_id,
                current_progress: to_u32(progress),
                is_unlocked,
                unlocked_at: parse_opt(unlocked_at, |v| {
                    parse_ts("user_achievements.unlocked_at", v)
                })?,
            });
        }
        Ok(achievements)
    }

    fn upsert_progress(&self, row: &UserAchievement) -> Result<()> {
        self.conn.execute(
            "INSERT INTO user_achievements
                (user_id, achievement_id, connection_id, current_progress, is_unlocked)
             VALUES (?1, ?2, ?3, ?4, 0)
             ON CONFLICT(user_id, achievement_id, connection_id) DO UPDATE SET
                current_progress = excluded.current_progress
             WHERE user_achievements.is_unlocked = 0",
            params![
                row.user_id.to_string(),
                row.achievement_id,
                connection_key(row.connection_id),
                row.current_progress,
            ],
        )?;
        Ok(())
    }

    fn unlock_if_absent(&self, row: &UserAchievement) -> Result<bool> {
        let unlocked_at = row.unlocked_at.unwrap_or_else(Utc::now);
        let changed = self.conn.execute(
            "INSERT INTO user_achievements
                (user_id, achievement_id, connection_id, current_progress, is_unlocked, unlocked_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)
             ON CONFLICT(user_id, achievement_id, connection_id) DO UPDATE SET
                current_progress = excluded.current_progress,
                is_unlocked = 1,
                unlocked_at = excluded.unlocked_at
             WHERE user_achievements.is_unlocked = 0",
            params![
                row.user_id.to_string(),
                row.achievement_id,
                connection_key(row.connection_id),
                row.current_progress,
                fmt_ts(unlocked_at),
            ],
        )?;
        Ok(changed > 0)
    }

    fn record_recovery(&self, user_id: Uuid, connection_id: Uuid, on: NaiveDate) -> Result<()> {
        self.conn.execute(
            "INSERT INTO recovery_events (user_id, connection_id, recovered_on)
             VALUES (?1, ?2, ?3)",
            params![user_id.to_string(), connection_id.to_string(), fmt_date(on)],
        )?;
        Ok(())
    }

    fn recovery_dates(&self, user_id: Uuid) -> Result<Vec<NaiveDate>> {
        let mut stmt = self.conn.prepare(
            "SELECT recovered_on FROM recovery_events WHERE user_id = ?1 ORDER BY recovered_on, id",
        )?;
        let rows = stmt.query_map(params![user_id.to_string()], |row| row.get::<_, String>(0))?;

        let mut dates = Vec::new();
        for row in rows {
            dates.push(parse_date("recovery_events.recovered_on", &row?)?);
        }
        Ok(dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionType;
    use crate::error::CoreError;
    use crate::health::StrengthTier;
    use chrono::TimeZone;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn seeded() -> (Database, Uuid, Contact) {
        let db = Database::open_memory().unwrap();
        let user = Uuid::new_v4();
        db.create_user(user, "Sam").unwrap();
        let contact = Contact::new(user, "Ada", Cadence::Weekly);
        db.insert_connection(&contact).unwrap();
        (db, user, contact)
    }

    #[test]
    fn users_are_created_once() {
        let (db, user, _) = seeded();
        assert!(db.user_exists(user).unwrap());
        db.create_user(user, "Sam again").unwrap();
        assert!(!db.user_exists(Uuid::new_v4()).unwrap());
    }

    #[test]
    fn connection_roundtrip_and_scope() {
        let (db, user, contact) = seeded();
        let loaded = db.get_connection(user, contact.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Ada");
        assert_eq!(loaded.cadence, Cadence::Weekly);
        assert!(db.get_connection(Uuid::new_v4(), contact.id).unwrap().is_none());
        assert_eq!(db.list_connections(user).unwrap().len(), 1);
    }

    #[test]
    fn last_interaction_only_moves_forward() {
        let (db, user, contact) = seeded();
        let later = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        db.touch_last_interaction(contact.id, later).unwrap();
        db.touch_last_interaction(contact.id, earlier).unwrap();
        let loaded = db.get_connection(user, contact.id).unwrap().unwrap();
        assert_eq!(loaded.last_interaction_date, Some(later));
    }

    #[test]
    fn actions_are_filtered_by_date_range() {
        let (db, user, contact) = seeded();
        for (day, kind) in [(1, ActionType::Text), (5, ActionType::Call), (9, ActionType::InPerson)] {
            let action = Action::new(contact.id, kind, d(day)).with_note("note");
            db.insert_action(user, &action).unwrap();
        }
        let window = db.actions_between(user, d(2), d(9)).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].action_type, ActionType::Call);
        assert!(window[1].has_memory_note());
        assert_eq!(db.actions_for_user(user).unwrap().len(), 3);
    }

    #[test]
    fn daily_log_upsert_replaces() {
        let (db, user, _) = seeded();
        let mut log = DailyHabitLog::empty(d(3));
        db.upsert_daily_log(user, &log).unwrap();
        log.total_weight = 7;
        log.action_count = 2;
        log.is_valid_day = true;
        log.highest_action = Some(ActionType::InPerson);
        db.upsert_daily_log(user, &log).unwrap();
        assert_eq!(db.daily_log(user, d(3)).unwrap(), Some(log));
        assert!(db.daily_log(user, d(4)).unwrap().is_none());
    }

    #[test]
    fn streak_compare_and_swap() {
        let (db, user, _) = seeded();
        let mut streak = UserStreak::default();
        streak.apply(d(3));
        assert!(db.compare_and_swap_streak(user, None, &streak).unwrap());
        // Stale writer still believes there is no row.
        assert!(!db.compare_and_swap_streak(user, None, &streak).unwrap());

        let mut next = streak.clone();
        next.apply(d(4));
        assert!(!db.compare_and_swap_streak(user, Some(d(1)), &next).unwrap());
        assert!(db.compare_and_swap_streak(user, Some(d(3)), &next).unwrap());
        assert_eq!(db.load_streak(user).unwrap(), Some(next));
    }

    #[test]
    fn health_roundtrip() {
        let (db, _, contact) = seeded();
        let mut health = ConnectionHealth::new(contact.id, contact.ring_tier);
        let now = Utc.with_ymd_and_hms(2024, 6, 20, 9, 0, 0).unwrap();
        health.recompute(Some(20), 7, now);
        assert_eq!(health.current_strength, StrengthTier::Decaying);
        db.save_health(&health).unwrap();
        assert_eq!(db.load_health(contact.id).unwrap(), Some(health));
    }

    #[test]
    fn unlock_happens_once_and_freezes_progress() {
        let (db, user, _) = seeded();
        let mut row = UserAchievement {
            user_id: user,
            achievement_id: "streak_7".into(),
            connection_id: None,
            current_progress: 3,
            is_unlocked: false,
            unlocked_at: None,
        };
        db.upsert_progress(&row).unwrap();

        row.current_progress = 7;
        row.unlocked_at = Some(Utc.with_ymd_and_hms(2024, 6, 9, 8, 0, 0).unwrap());
        assert!(db.unlock_if_absent(&row).unwrap());
        assert!(!db.unlock_if_absent(&row).unwrap());

        row.current_progress = 1;
        db.upsert_progress(&row).unwrap();
        let stored = db.list_user_achievements(user).unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].is_unlocked);
        assert_eq!(stored[0].current_progress, 7);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let (db, user, contact) = seeded();
        let result: Result<()> = db.in_transaction(|tx| {
            tx.insert_action(user, &Action::new(contact.id, ActionType::Call, d(2)))?;
            Err(CoreError::Custom("boom".into()))
        });
        assert!(result.is_err());
        assert!(db.actions_for_user(user).unwrap().is_empty());
    }

    #[test]
    fn corrupt_label_is_reported() {
        let (db, user, contact) = seeded();
        db.conn()
            .execute(
                "INSERT INTO actions (id, user_id, connection_id, action_type, weight, date)
                 VALUES (?1, ?2, ?3, 'carrier_pigeon', 1, '2024-06-01')",
                params![Uuid::new_v4().to_string(), user.to_string(), contact.id.to_string()],
            )
            .unwrap();
        let err = db.actions_for_user(user).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Database(DatabaseError::CorruptValue { column: "actions.action_type", .. })
        ));
    }

    #[test]
    fn recoveries_are_listed_in_order() {
        let (db, user, contact) = seeded();
        db.record_recovery(user, contact.id, d(9)).unwrap();
        db.record_recovery(user, contact.id, d(2)).unwrap();
        assert_eq!(db.recovery_dates(user).unwrap(), vec![d(2), d(9)]);
    }
}
