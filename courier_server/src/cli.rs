use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "La Poste letter tracker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The chosen subcommand, `serve` with its defaults when none was given.
    pub fn into_command(self) -> Commands {
        self.command.unwrap_or(Commands::Serve {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_path: None,
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default if no subcommand given).
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value = "8000")]
        port: u16,

        /// SQLite database file (overrides COURIER_DATABASE_PATH).
        #[arg(long)]
        database_path: Option<PathBuf>,
    },

    /// Refresh every tracked letter once, wait for completion, and print the stats.
    RefreshAll {
        /// SQLite database file (overrides COURIER_DATABASE_PATH).
        #[arg(long)]
        database_path: Option<PathBuf>,
    },

    /// Print current configuration (redacted secrets).
    Config,
}
