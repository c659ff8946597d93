use chrono::Utc;
use clap::Subcommand;

use super::{open_engine, print_json, CliResult};

#[derive(Subcommand)]
pub enum HealthAction {
    /// Recompute every connection's strength tier as of now
    Sweep,
}

pub fn run(action: HealthAction) -> CliResult {
    let (engine, user_id) = open_engine()?;

    match action {
        HealthAction::Sweep => {
            let outcome = engine.sweep_health(user_id, Utc::now())?;
            print_json(&outcome)?;
        }
    }
    Ok(())
}
