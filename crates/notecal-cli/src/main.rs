use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "notecal-cli", version, about = "Sync daily-note schedules to Google Calendar")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule synchronization
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Service-account credential checks
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
}

fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Sync { action } => commands::sync::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Auth { action } => commands::auth::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
