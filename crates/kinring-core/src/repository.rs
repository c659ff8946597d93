//! Typed storage interfaces, one per entity.
//!
//! The engine only talks to these traits. `storage::Database` implements all
//! of them on SQLite; tests or other front ends can supply their own.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::achievements::UserAchievement;
use crate::action::{Action, Connection};
use crate::error::Result;
use crate::habit::DailyHabitLog;
use crate::health::ConnectionHealth;
use crate::streak::UserStreak;

pub trait UserRepository {
    fn create_user(&self, user_id: Uuid, display_name: &str) -> Result<()>;

    fn user_exists(&self, user_id: Uuid) -> Result<bool>;
}

pub trait ConnectionRepository {
    fn insert_connection(&self, connection: &Connection) -> Result<()>;

    fn get_connection(&self, user_id: Uuid, connection_id: Uuid) -> Result<Option<Connection>>;

    fn list_connections(&self, user_id: Uuid) -> Result<Vec<Connection>>;

    /// Move `last_interaction_date` forward to `at`. Never moves it back.
    fn touch_last_interaction(&self, connection_id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

pub trait ActionRepository {
    fn insert_action(&self, user_id: Uuid, action: &Action) -> Result<()>;

    /// Actions dated within `from..=to`, oldest first.
    fn actions_between(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<Action>>;

    fn actions_for_user(&self, user_id: Uuid) -> Result<Vec<Action>>;
}

pub trait HabitLogRepository {
    fn upsert_daily_log(&self, user_id: Uuid, log: &DailyHabitLog) -> Result<()>;

    fn daily_log(&self, user_id: Uuid, date: NaiveDate) -> Result<Option<DailyHabitLog>>;
}

pub trait StreakRepository {
    fn load_streak(&self, user_id: Uuid) -> Result<Option<UserStreak>>;

    /// Write `streak` only if the stored `last_interaction_date` still equals
    /// `expected_last` (no row counts as `None`). Returns `false` when another
    /// writer got there first.
    fn compare_and_swap_streak(
        &self,
        user_id: Uuid,
        expected_last: Option<NaiveDate>,
        streak: &UserStreak,
    ) -> Result<bool>;
}

pub trait HealthRepository {
    fn load_health(&self, connection_id: Uuid) -> Result<Option<ConnectionHealth>>;

    fn save_health(&self, health: &ConnectionHealth) -> Result<()>;
}

pub trait AchievementRepository {
    fn list_user_achievements(&self, user_id: Uuid) -> Result<Vec<UserAchievement>>;

    /// Insert or update a progress row. Rows already unlocked are left alone.
    fn upsert_progress(&self, row: &UserAchievement) -> Result<()>;

    /// Mark a row unlocked unless it already is. Returns `true` when this call
    /// performed the unlock.
    fn unlock_if_absent(&self, row: &UserAchievement) -> Result<bool>;

    fn record_recovery(&self, user_id: Uuid, connection_id: Uuid, on: NaiveDate) -> Result<()>;

    fn recovery_dates(&self, user_id: Uuid) -> Result<Vec<NaiveDate>>;
}

/// Run a group of writes atomically.
pub trait Transactional {
    fn in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>;
}

/// Everything the engine needs from a store.
pub trait EngagementStore:
    UserRepository
    + ConnectionRepository
    + ActionRepository
    + HabitLogRepository
    + StreakRepository
    + HealthRepository
    + AchievementRepository
    + Transactional
{
}

impl<T> EngagementStore for T where
    T: UserRepository
        + ConnectionRepository
        + ActionRepository
        + HabitLogRepository
        + StreakRepository
        + HealthRepository
        + AchievementRepository
        + Transactional
{
}
