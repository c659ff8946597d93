use chrono::Utc;
use clap::Subcommand;
use kinring_core::achievements::{catalogue, find_definition};
use serde_json::json;

use super::{open_engine, print_json, CliResult};

#[derive(Subcommand)]
pub enum AchievementAction {
    /// Stored progress and unlocks
    List,
    /// Re-evaluate and persist achievements now
    Evaluate,
    /// Every achievement that can be earned
    Catalogue,
}

pub fn run(action: AchievementAction) -> CliResult {
    match action {
        AchievementAction::List => {
            let (engine, user_id) = open_engine()?;
            let rows: Vec<_> = engine
                .achievements(user_id)?
                .into_iter()
                .map(|row| {
                    let definition = find_definition(&row.achievement_id);
                    let percentage = definition.map(|d| row.percentage(d));
                    json!({
                        "achievement_id": row.achievement_id,
                        "name": definition.map(|d| d.name),
                        "connection_id": row.connection_id,
                        "current_progress": row.current_progress,
                        "percentage": percentage,
                        "is_unlocked": row.is_unlocked,
                        "unlocked_at": row.unlocked_at,
                    })
                })
                .collect();
            print_json(&rows)
        }
        AchievementAction::Evaluate => {
            let (engine, user_id) = open_engine()?;
            print_json(&engine.evaluate_achievements(user_id, Utc::now())?)
        }
        AchievementAction::Catalogue => print_json(catalogue()),
    }
}
