use chrono::{NaiveDate, Utc};
use clap::Args;

use super::{open_engine, print_json, CliResult};

#[derive(Args)]
pub struct PatternArgs {
    /// Last day of the window (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    end: Option<NaiveDate>,
}

pub fn run(args: PatternArgs) -> CliResult {
    let (engine, user_id) = open_engine()?;
    let end = args.end.unwrap_or_else(|| Utc::now().date_naive());
    print_json(&engine.weekly_pattern(user_id, end)?)
}
