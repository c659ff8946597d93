//! Relationship strength: classification, persisted health rows, nudges.

mod connection;
mod nudge;
mod strength;

pub use connection::{
    decay_days, effective_tier, status_copy, ConnectionHealth, HealthTransition, LifecycleState,
};
pub use nudge::{mark_nudged, next_nudge, NudgeLevel};
pub use strength::{classify, contact_ratio, StrengthTier, NEVER_CONTACTED_TIER};
