use chrono::Utc;
use clap::Subcommand;
use kinring_core::NudgeLevel;
use uuid::Uuid;

use super::{open_engine, print_json, CliResult};

#[derive(Subcommand)]
pub enum NudgeAction {
    /// Connections that need a nudge now
    List,
    /// Record that a nudge was sent
    Sent {
        /// Connection ID
        connection: Uuid,
        /// text, call or in_person
        level: NudgeLevel,
    },
}

pub fn run(action: NudgeAction) -> CliResult {
    let (engine, user_id) = open_engine()?;
    let now = Utc::now();

    match action {
        NudgeAction::List => print_json(&engine.nudges(user_id, now)?),
        NudgeAction::Sent { connection, level } => {
            print_json(&engine.record_nudge(user_id, connection, level, now)?)
        }
    }
}
