//! # Kinring Core Library
//!
//! This library provides the relationship health and engagement engine behind
//! Kinring. It implements a CLI-first philosophy where every operation is
//! available through the standalone `kinring` binary, with any other front end
//! being a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Scoring**: pure functions over actions and dates. Recency, strength
//!   tiers, daily habit scores, streaks, weekly patterns and ring visuals never
//!   touch storage.
//! - **Repositories**: one typed trait per entity in [`repository`], combined
//!   as [`EngagementStore`].
//! - **Storage**: SQLite persistence and TOML configuration.
//! - **Engine**: [`EngagementEngine`] ties a logged action to the habit log,
//!   streak, connection health and achievements.
//!
//! ## Key Components
//!
//! - [`EngagementEngine`]: Orchestration over a store
//! - [`UserStreak`]: Streak state machine with freezes and weekend flex
//! - [`AchievementEvaluator`]: Idempotent unlock evaluation
//! - [`Database`]: SQLite implementation of every repository
//! - [`Config`]: Application configuration management

pub mod achievements;
pub mod action;
pub mod engine;
pub mod error;
pub mod habit;
pub mod health;
pub mod pattern;
pub mod recency;
pub mod repository;
pub mod storage;
pub mod streak;
pub mod visual;

pub use achievements::{AchievementEvaluator, ProgressSignals, UserAchievement};
pub use action::{Action, ActionType, Connection, RingTier};
pub use engine::{
    AchievementOutcome, ConnectionRing, EngagementEngine, InteractionOutcome, NudgeSuggestion,
    SweepOutcome,
};
pub use error::{ConfigError, CoreError, DatabaseError, InvalidUserError, ValidationError};
pub use habit::DailyHabitLog;
pub use health::{ConnectionHealth, NudgeLevel, StrengthTier};
pub use pattern::{InsightType, WeeklyPattern};
pub use recency::Cadence;
pub use repository::EngagementStore;
pub use storage::{Config, Database};
pub use streak::{StreakOutcome, UserStreak};
pub use visual::RingVisualization;
