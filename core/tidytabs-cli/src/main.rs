//! tidytabs: command-line front end for the Tidy Tabs eviction engine.
//!
//! ## Subcommands
//!
//! - `replay`: Run a recorded session timeline against a simulated IDE
//! - `settings`: Show, locate or initialise `~/.tidytabs/settings.json`

mod logging;
mod replay;
mod settings;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tidytabs")]
#[command(about = "Closes editor tabs that have gone stale")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a session scenario (JSON) and report which tabs were closed
    Replay {
        #[arg(value_name = "SCENARIO")]
        scenario: PathBuf,

        /// Settings file used when the scenario carries none
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or create the settings file
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print effective settings
    Show {
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Print the default settings location
    Path,

    /// Write default settings
    Init {
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay {
            scenario,
            settings: settings_path,
            json,
        } => settings::load(settings_path.as_deref())
            .map_err(|e| e.to_string())
            .and_then(|fallback| {
                replay::run(&scenario, fallback, json).map_err(|e| e.to_string())
            }),
        Commands::Settings { action } => match action {
            SettingsAction::Show { path } => settings::show(path.as_deref()).map_err(String::from),
            SettingsAction::Path => settings::print_path().map_err(String::from),
            SettingsAction::Init { path, force } => settings::init(path.as_deref(), force)
                .map(|written| println!("{}", written.display()))
                .map_err(String::from),
        },
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "tidytabs failed");
        std::process::exit(1);
    }
}
