use chrono::{NaiveDate, Utc};
use clap::Args;
use kinring_core::{Action, ActionType};
use uuid::Uuid;

use super::{open_engine, print_json, CliResult};

#[derive(Args)]
pub struct LogArgs {
    /// Connection ID
    connection: Uuid,
    /// text, call or in_person
    action_type: ActionType,
    /// Day it happened (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Memory note
    #[arg(long)]
    note: Option<String>,
}

pub fn run(args: LogArgs) -> CliResult {
    let (engine, user_id) = open_engine()?;
    let now = Utc::now();

    let mut action = Action::new(
        args.connection,
        args.action_type,
        args.date.unwrap_or_else(|| now.date_naive()),
    );
    if let Some(note) = args.note {
        action = action.with_note(note);
    }

    let outcome = engine.log_interaction(user_id, action, now)?;
    print_json(&outcome)
}
