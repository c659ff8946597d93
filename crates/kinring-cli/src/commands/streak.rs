use serde_json::json;

use super::{open_engine, print_json, CliResult};

pub fn run() -> CliResult {
    let (engine, user_id) = open_engine()?;
    let streak = engine.streak(user_id)?;
    print_json(&json!({
        "current_streak": streak.current_streak,
        "longest_streak": streak.longest_streak,
        "last_interaction_date": streak.last_interaction_date,
        "streak_started_at": streak.streak_started_at,
        "freezes_remaining": streak.freezes_remaining(),
    }))
}
