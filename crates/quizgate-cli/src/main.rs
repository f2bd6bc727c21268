use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "quizgate-cli", version, about = "Quizgate CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Session lifecycle control
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Learning-resource progress reporting
    Progress {
        #[command(subcommand)]
        action: commands::progress::ProgressAction,
    },
    /// Submitted results
    Results {
        #[command(subcommand)]
        action: commands::results::ResultsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action),
        Commands::Progress { action } => commands::progress::run(action),
        Commands::Results { action } => commands::results::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
