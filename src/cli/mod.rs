use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "taskpulse",
    about = "Task tracking backend with streaks, dashboards and a nightly sweep"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API and the sweep scheduler until Ctrl+C.
    Serve,
    /// Mark pending tasks dated on or before the given day as missed.
    Sweep {
        #[arg(long)]
        date: Option<String>,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
    Doctor,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum AdminCommands {
    Promote { username: String },
}
