use crate::models::TimeOfDay;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "umbrella", version, about = "Morning umbrella reminders from the hourly rain forecast")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override SQLite data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Re-run interactive setup
    Init,
    /// Validate config and test connections
    Check,
    /// Show preference, pending reminder and the next 12 hours
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Turn reminders on and reschedule
    Enable,
    /// Turn reminders off and cancel the pending reminder
    Disable,
    /// Set the reminder time of day (HH:MM, 24-hour)
    Time { at: TimeOfDay },
    /// Report a new location and reschedule
    #[command(allow_negative_numbers = true)]
    Locate { latitude: f64, longitude: f64 },
    /// Keep the reminder up to date in the background (default)
    Run,
}
