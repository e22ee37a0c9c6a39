mod app;
mod cli;
mod config;
mod datasources;
mod db;
mod error;
mod logic;
mod models;

use app::App;
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use db::Database;
use error::Result;
use models::Coordinates;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("umbrella=debug"),
        _ => EnvFilter::new("umbrella=trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::Run);

    if let Commands::Init = command {
        Config::setup_interactive(cli.config)?;
        return Ok(());
    }

    // First run: create a config before doing anything else
    if !Config::exists(cli.config.as_ref()) {
        println!("No configuration found.");
        Config::setup_interactive(cli.config.clone())?;
    }

    // Load configuration
    let config = match Config::load(cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("Run `umbrella init` to create a config file");
            std::process::exit(1);
        }
    };

    // Initialize database
    let db = Database::open(&Config::db_path(cli.data_dir.as_ref())?)?;

    if let Commands::Check = command {
        let coordinates = match config.location.as_ref() {
            Some(location) => location.coordinates(),
            None => db
                .load_preference()?
                .and_then(|pref| pref.location)
                .map(|location| location.coordinates)
                .unwrap_or_else(|| Coordinates::new(0.0, 0.0)),
        };
        println!("Database: {}", db.path().display());
        return app::check(&config, coordinates).await;
    }

    let app = App::new(config, db)?;

    match command {
        Commands::Status { json: false } => print!("{}", app.status_report().await?),
        Commands::Status { json: true } => println!("{}", app.status_json().await?),
        Commands::Enable => println!("Reminders enabled. {}", app::describe(&app.set_enabled(true).await?)),
        Commands::Disable => {
            app.set_enabled(false).await?;
            println!("Reminders disabled.");
        }
        Commands::Time { at } => println!(
            "Reminder time set to {}. {}",
            at,
            app::describe(&app.set_time(at).await?)
        ),
        Commands::Locate {
            latitude,
            longitude,
        } => {
            let result = app.set_location(Coordinates::new(latitude, longitude)).await?;
            println!("Location: {}", app.preference()?.location_text());
            println!("{}", app::describe(&result));
        }
        Commands::Run => app.run().await?,
        Commands::Init | Commands::Check => {}
    }

    Ok(())
}
