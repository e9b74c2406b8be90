use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use habitloop_core::storage::LoggingConfig;
use habitloop_core::Config;

mod commands;

#[derive(Parser)]
#[command(name = "habitloop", version, about = "Habitloop challenge engine CLI")]
struct Cli {
    /// Database file (defaults to the configured path)
    #[arg(long, global = true, env = "HABITLOOP_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Challenge management
    Challenge {
        #[command(subcommand)]
        action: commands::challenge::ChallengeAction,
    },
    /// Habit registration
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Record a check-in and update challenge progress
    Checkin(commands::checkin::CheckinArgs),
    /// Challenge lifecycle sweeps
    Scheduler {
        #[command(subcommand)]
        action: commands::scheduler::SchedulerAction,
    },
    /// Workspace activity feed
    Feed(commands::feed::FeedArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let json = logging.json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn dispatch(command: Commands, config: Config, db: Option<PathBuf>) -> commands::CliResult {
    let app = commands::App::open(config, db)?;
    match command {
        Commands::Challenge { action } => commands::challenge::run(action, &app).await,
        Commands::Habit { action } => commands::habit::run(action, &app).await,
        Commands::Checkin(args) => commands::checkin::run(args, &app).await,
        Commands::Scheduler { action } => commands::scheduler::run(action, &app).await,
        Commands::Feed(args) => commands::feed::run(args, &app),
        Commands::Config { action } => commands::config::run(action, app.config.clone()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging);

    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action, config),
        command => dispatch(command, config, cli.db).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
