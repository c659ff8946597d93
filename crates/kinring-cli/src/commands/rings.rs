use chrono::Utc;

use super::{open_engine, print_json, CliResult};

pub fn run() -> CliResult {
    let (engine, user_id) = open_engine()?;
    print_json(&engine.ring_visualizations(user_id, Utc::now())?)
}
