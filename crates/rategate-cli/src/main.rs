use clap::{Parser, Subcommand};

mod commands;
mod telemetry;

#[derive(Parser)]
#[command(name = "rategate-cli", version, about = "rategate CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Inspect, evaluate or reset the persisted prompt state
    State {
        #[command(subcommand)]
        action: commands::state::StateAction,
    },
    /// Run one app session and request a prompt
    Prompt {
        #[command(subcommand)]
        action: commands::prompt::PromptAction,
    },
}

fn main() {
    let cli = Cli::parse();
    telemetry::init(&rategate_core::Config::load_or_default());

    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action),
        Commands::State { action } => commands::state::run(action),
        Commands::Prompt { action } => commands::prompt::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
