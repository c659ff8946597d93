pub mod achievements;
pub mod config;
pub mod connection;
pub mod health;
pub mod log;
pub mod nudges;
pub mod pattern;
pub mod rings;
pub mod streak;
pub mod user;

use kinring_core::{Config, Database, EngagementEngine};
use serde::Serialize;
use uuid::Uuid;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Engine over the configured database, the configured user and the config
/// they were read from.
pub fn open_session(
) -> Result<(EngagementEngine<Database>, Uuid, Config), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let user_id = config.user_id()?;
    let db = Database::open(&config)?;
    Ok((EngagementEngine::new(db), user_id, config))
}

/// Engine over the configured database, plus the configured user.
pub fn open_engine() -> Result<(EngagementEngine<Database>, Uuid), Box<dyn std::error::Error>> {
    let (engine, user_id, _) = open_session()?;
    Ok((engine, user_id))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
