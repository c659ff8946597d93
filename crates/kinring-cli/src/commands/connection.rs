use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use kinring_core::{Cadence, RingTier};
use serde_json::json;
use uuid::Uuid;

use super::{open_session, print_json, CliResult};

#[derive(Subcommand)]
pub enum ConnectionAction {
    /// Add a connection
    Add {
        /// Name shown on the ring
        name: String,
        /// daily, weekly, biweekly, monthly, quarterly, biannually, annually
        #[arg(long)]
        cadence: Option<Cadence>,
        /// Put the connection in the core ring
        #[arg(long)]
        core: bool,
        /// Next planned catch-up (YYYY-MM-DD)
        #[arg(long)]
        next_catchup: Option<NaiveDate>,
    },
    /// List connections
    List,
    /// Show a connection with its health
    Show {
        /// Connection ID
        id: Uuid,
    },
    /// Archive a connection (or restore it with --restore)
    Archive {
        /// Connection ID
        id: Uuid,
        #[arg(long)]
        restore: bool,
    },
}

pub fn run(action: ConnectionAction) -> CliResult {
    let (engine, user_id, config) = open_session()?;

    match action {
        ConnectionAction::Add {
            name,
            cadence,
            core,
            next_catchup,
        } => {
            let cadence = cadence.unwrap_or(config.connections.default_cadence);
            let ring_tier = if core { RingTier::Core } else { RingTier::Outer };
            let connection =
                engine.add_connection(user_id, &name, cadence, ring_tier, next_catchup)?;
            print_json(&connection)?;
        }
        ConnectionAction::List => {
            print_json(&engine.connections(user_id)?)?;
        }
        ConnectionAction::Show { id } => {
            let now = Utc::now();
            let (connection, health) = engine.connection_health(user_id, id, now)?;
            print_json(&json!({
                "connection": connection,
                "health": health,
                "status": health.status_copy(now),
            }))?;
        }
        ConnectionAction::Archive { id, restore } => {
            let health = engine.set_archived(user_id, id, !restore, Utc::now())?;
            print_json(&health)?;
        }
    }
    Ok(())
}
