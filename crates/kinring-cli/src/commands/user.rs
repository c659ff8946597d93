use clap::Subcommand;
use kinring_core::{Config, Database, EngagementEngine};
use serde_json::json;
use uuid::Uuid;

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum UserAction {
    /// Create the local user (or re-register the existing one)
    Init {
        /// Display name
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Show the configured user
    Show,
}

pub fn run(action: UserAction) -> CliResult {
    match action {
        UserAction::Init { name } => {
            let mut config = Config::load()?;
            let user_id = config.user.id.filter(|id| !id.is_nil()).unwrap_or_else(Uuid::new_v4);
            config.user.id = Some(user_id);
            if !name.is_empty() {
                config.user.display_name = name;
            }
            config.save()?;

            let engine = EngagementEngine::new(Database::open(&config)?);
            engine.register_user(user_id, &config.user.display_name)?;
            print_json(&json!({
                "user_id": user_id,
                "display_name": config.user.display_name,
            }))?;
        }
        UserAction::Show => {
            let config = Config::load()?;
            let user_id = config.user_id()?;
            print_json(&json!({
                "user_id": user_id,
                "display_name": config.user.display_name,
            }))?;
        }
    }
    Ok(())
}
