use clap::{Parser, Subcommand};
use kinring_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "kinring", version, about = "Kinring relationship health CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Local user identity
    User {
        #[command(subcommand)]
        action: commands::user::UserAction,
    },
    /// Connection management
    Connection {
        #[command(subcommand)]
        action: commands::connection::ConnectionAction,
    },
    /// Log a text, call or in-person catch-up
    Log(commands::log::LogArgs),
    /// Current and longest streak
    Streak,
    /// Connection health maintenance
    Health {
        #[command(subcommand)]
        action: commands::health::HealthAction,
    },
    /// Weekly depth, variety and consistency
    Pattern(commands::pattern::PatternArgs),
    /// Ring render parameters for every connection
    Rings,
    /// Nudge suggestions
    Nudges {
        #[command(subcommand)]
        action: commands::nudges::NudgeAction,
    },
    /// Achievement progress and unlocks
    Achievements {
        #[command(subcommand)]
        action: commands::achievements::AchievementAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// KINRING_LOG wins over the configured level. Output goes to stderr so
/// stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("KINRING_LOG").unwrap_or_else(|_| {
        let level = Config::load()
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "warn".to_string());
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "kinring starting");
    let result = match cli.command {
        Commands::User { action } => commands::user::run(action),
        Commands::Connection { action } => commands::connection::run(action),
        Commands::Log(args) => commands::log::run(args),
        Commands::Streak => commands::streak::run(),
        Commands::Health { action } => commands::health::run(action),
        Commands::Pattern(args) => commands::pattern::run(args),
        Commands::Rings => commands::rings::run(),
        Commands::Nudges { action } => commands::nudges::run(action),
        Commands::Achievements { action } => commands::achievements::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
