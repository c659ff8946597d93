//! Store failures during a logged interaction.
//!
//! Achievement writes that fail must not fail the interaction that caused
//! them. A streak row that keeps moving underneath the engine is retried a
//! bounded number of times and then rolls the whole interaction back.

use std::cell::Cell;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use kinring_core::engine::MAX_STREAK_ATTEMPTS;
use kinring_core::error::{CoreError, DatabaseError, Result};
use kinring_core::repository::{
    AchievementRepository, ActionRepository, ConnectionRepository, HabitLogRepository,
    HealthRepository, StreakRepository, Transactional, UserRepository,
};
use kinring_core::{
    Action, ActionType, Cadence, Connection, ConnectionHealth, DailyHabitLog, Database,
    EngagementEngine, RingTier, UserAchievement, UserStreak,
};
use uuid::Uuid;

/// Delegates to SQLite but refuses achievement writes while `failing` is
/// set, and loses the next `cas_losses` streak compare-and-swaps.
struct FlakyStore {
    inner: Database,
    failing: Cell<bool>,
    cas_losses: Cell<u32>,
    cas_calls: Cell<u32>,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: Database::open_memory().unwrap(),
            failing: Cell::new(false),
            cas_losses: Cell::new(0),
            cas_calls: Cell::new(0),
        }
    }

    fn refuse(&self) -> Result<()> {
        if self.failing.get() {
            Err(DatabaseError::Locked.into())
        } else {
            Ok(())
        }
    }
}

impl UserRepository for FlakyStore {
    fn create_user(&self, user_id: Uuid, display_name: &str) -> Result<()> {
        self.inner.create_user(user_id, display_name)
    }
    fn user_exists(&self, user_id: Uuid) -> Result<bool> {
        self.inner.user_exists(user_id)
    }
}

impl ConnectionRepository for FlakyStore {
    fn insert_connection(&self, connection: &Connection) -> Result<()> {
        self.inner.insert_connection(connection)
    }
    fn get_connection(&self, user_id: Uuid, connection_id: Uuid) -> Result<Option<Connection>> {
        self.inner.get_connection(user_id, connection_id)
    }
    fn list_connections(&self, user_id: Uuid) -> Result<Vec<Connection>> {
        self.inner.list_connections(user_id)
    }
    fn touch_last_interaction(&self, connection_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.inner.touch_last_interaction(connection_id, at)
    }
}

impl ActionRepository for FlakyStore {
    fn insert_action(&self, user_id: Uuid, action: &Action) -> Result<()> {
        self.inner.insert_action(user_id, action)
    }
    fn actions_between(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<Vec<Action>> {
        self.inner.actions_between(user_id, from, to)
    }
    fn actions_for_user(&self, user_id: Uuid) -> Result<Vec<Action>> {
        self.inner.actions_for_user(user_id)
    }
}

impl HabitLogRepository for FlakyStore {
    fn upsert_daily_log(&self, user_id: Uuid, log: &DailyHabitLog) -> Result<()> {
        self.inner.upsert_daily_log(user_id, log)
    }
    fn daily_log(&self, user_id: Uuid, date: NaiveDate) -> Result<Option<DailyHabitLog>> {
        self.inner.daily_log(user_id, date)
    }
}

impl StreakRepository for FlakyStore {
    fn load_streak(&self, user_id: Uuid) -> Result<Option<UserStreak>> {
        self.inner.load_streak(user_id)
    }
    fn compare_and_swap_streak(
        &self,
        user_id: Uuid,
        expected_last: Option<NaiveDate>,
        streak: &UserStreak,
    ) -> Result<bool> {
        self.cas_calls.set(self.cas_calls.get() + 1);
        let losses = self.cas_losses.get();
        if losses > 0 {
            self.cas_losses.set(losses - 1);
            return Ok(false);
        }
        self.inner.compare_and_swap_streak(user_id, expected_last, streak)
    }
}

impl HealthRepository for FlakyStore {
    fn load_health(&self, connection_id: Uuid) -> Result<Option<ConnectionHealth>> {
        self.inner.load_health(connection_id)
    }
    fn save_health(&self, health: &ConnectionHealth) -> Result<()> {
        self.inner.save_health(health)
    }
}

impl AchievementRepository for FlakyStore {
    fn list_user_achievements(&self, user_id: Uuid) -> Result<Vec<UserAchievement>> {
        self.inner.list_user_achievements(user_id)
    }
    fn upsert_progress(&self, row: &UserAchievement) -> Result<()> {
        self.refuse()?;
        self.inner.upsert_progress(row)
    }
    fn unlock_if_absent(&self, row: &UserAchievement) -> Result<bool> {
        self.refuse()?;
        self.inner.unlock_if_absent(row)
    }
    fn record_recovery(&self, user_id: Uuid, connection_id: Uuid, on: NaiveDate) -> Result<()> {
        self.inner.record_recovery(user_id, connection_id, on)
    }
    fn recovery_dates(&self, user_id: Uuid) -> Result<Vec<NaiveDate>> {
        self.inner.recovery_dates(user_id)
    }
}

impl Transactional for FlakyStore {
    fn in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.inner.in_transaction(|_| f(self))
    }
}

#[test]
fn test_failed_unlock_is_queued_then_retried() {
    let store = FlakyStore::new();
    store.failing.set(true);
    let engine = EngagementEngine::new(store);
    let user = Uuid::new_v4();
    engine.register_user(user, "Sam").unwrap();
    let ada = engine
        .add_connection(user, "Ada", Cadence::Weekly, RingTier::Core, None)
        .unwrap();

    let now = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
    let action = Action::new(ada.id, ActionType::InPerson, now.date_naive());
    let outcome = engine.log_interaction(user, action, now).unwrap();

    // The interaction itself committed.
    assert_eq!(outcome.current_streak, 1);
    assert_eq!(engine.store().inner.actions_for_user(user).unwrap().len(), 1);

    // Every achievement write was refused and handed back.
    assert!(outcome.achievements.unlocked.is_empty());
    assert_eq!(outcome.achievements.progress_updated, 0);
    assert!(!outcome.achievements.pending_retry.is_empty());
    assert!(engine.achievements(user).unwrap().is_empty());

    engine.store().failing.set(false);
    let retried = engine.evaluate_achievements(user, now).unwrap();
    assert!(retried.pending_retry.is_empty());
    assert!(retried.progress_updated > 0);
    assert!(!engine.achievements(user).unwrap().is_empty());
}

#[test]
fn test_validation_errors_pass_through_the_store_wrapper() {
    let engine = EngagementEngine::new(FlakyStore::new());
    let user = Uuid::new_v4();
    engine.register_user(user, "Sam").unwrap();

    let err = engine
        .add_connection(user, "", Cadence::Weekly, RingTier::Core, None)
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

fn engine_with_connection() -> (EngagementEngine<FlakyStore>, Uuid, Uuid) {
    let engine = EngagementEngine::new(FlakyStore::new());
    let user = Uuid::new_v4();
    engine.register_user(user, "Sam").unwrap();
    let ada = engine
        .add_connection(user, "Ada", Cadence::Weekly, RingTier::Core, None)
        .unwrap();
    (engine, user, ada.id)
}

#[test]
fn test_streak_retries_after_a_lost_swap() {
    let (engine, user, ada) = engine_with_connection();
    let now = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();

    engine.store().cas_losses.set(1);
    let action = Action::new(ada, ActionType::Call, now.date_naive());
    let outcome = engine.log_interaction(user, action, now).unwrap();

    assert_eq!(engine.store().cas_calls.get(), 2);
    assert_eq!(outcome.current_streak, 1);
    let stored = engine.store().inner.load_streak(user).unwrap().unwrap();
    assert_eq!(stored.last_interaction_date, Some(now.date_naive()));
}

#[test]
fn test_streak_succeeds_on_last_allowed_attempt() {
    let (engine, user, ada) = engine_with_connection();
    let now = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();

    engine.store().cas_losses.set(MAX_STREAK_ATTEMPTS - 1);
    let action = Action::new(ada, ActionType::Text, now.date_naive());
    let outcome = engine.log_interaction(user, action, now).unwrap();

    assert_eq!(engine.store().cas_calls.get(), MAX_STREAK_ATTEMPTS);
    assert_eq!(outcome.current_streak, 1);
}

#[test]
fn test_streak_conflict_rolls_back_the_interaction() {
    let (engine, user, ada) = engine_with_connection();
    let now = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
    let date = now.date_naive();

    engine.store().cas_losses.set(u32::MAX);
    let action = Action::new(ada, ActionType::InPerson, date);
    let err = engine.log_interaction(user, action, now).unwrap_err();

    assert!(matches!(
        err,
        CoreError::StreakConflict { attempts, .. } if attempts == MAX_STREAK_ATTEMPTS
    ));
    assert_eq!(engine.store().cas_calls.get(), MAX_STREAK_ATTEMPTS);

    let store = &engine.store().inner;
    assert!(store.actions_for_user(user).unwrap().is_empty());
    assert!(store.daily_log(user, date).unwrap().is_none());
    assert!(store.load_streak(user).unwrap().is_none());
    assert!(store.load_health(ada).unwrap().is_none());
    let connection = store.get_connection(user, ada).unwrap().unwrap();
    assert!(connection.last_interaction_date.is_none());

    // The same interaction goes through once the contention clears.
    engine.store().cas_losses.set(0);
    let retry = Action::new(ada, ActionType::InPerson, date);
    let outcome = engine.log_interaction(user, retry, now).unwrap();
    assert_eq!(outcome.current_streak, 1);
    assert_eq!(store.actions_for_user(user).unwrap().len(), 1);
}
