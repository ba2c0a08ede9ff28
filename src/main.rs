mod api;
mod auth;
mod cli;
mod config;
mod db;
mod outbox;
mod scheduler;
mod stats;
mod sweep;
mod uploads;

use crate::cli::{AdminCommands, Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::db::{Database, Role};
use crate::sweep::{SweepOutcome, Sweeper};
use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = load_or_default_config()?;
            run_service(config).await
        }
        Commands::Sweep { date } => handle_sweep(date).await,
        Commands::Config { command } => handle_config_command(command),
        Commands::Admin { command } => handle_admin_command(command),
        Commands::Doctor => handle_doctor(),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_admin_command(command: AdminCommands) -> Result<()> {
    match command {
        AdminCommands::Promote { username } => {
            let config = load_or_default_config()?;
            config.ensure_bootstrap_files()?;
            let database = Database::open(&config.db_path)?;

            if !database.set_role(&username, Role::Admin)? {
                bail!("User not found: {username}");
            }

            info!(username = %username, "user promoted to admin");
            println!("{username} is now an admin");
            Ok(())
        }
    }
}

async fn handle_sweep(date: Option<String>) -> Result<()> {
    let config = load_or_default_config()?;
    config.ensure_bootstrap_files()?;
    let today = parse_optional_date(&config, date)?;

    match Sweeper::new(config.db_path.clone()).run(today).await? {
        SweepOutcome::Completed { missed } => {
            println!("Sweep for {today}: {missed} task(s) marked missed");
        }
        SweepOutcome::Skipped => println!("Sweep for {today} skipped: another sweep is running"),
    }

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    if config.outbox_dir.exists() {
        println!("[OK] outbox dir exists: {}", config.outbox_dir.display());
    } else {
        println!("[WARN] outbox dir missing: {}", config.outbox_dir.display());
        issues.push("outbox dir missing".to_string());
    }

    if config.upload_dir.exists() {
        println!("[OK] upload dir exists: {}", config.upload_dir.display());
    } else {
        println!("[WARN] upload dir missing: {}", config.upload_dir.display());
        issues.push("upload dir missing".to_string());
    }

    match config.parse_sweep_time() {
        Ok(_) => println!("[OK] sweep_time format valid: {}", config.sweep_time),
        Err(error) => {
            println!("[WARN] invalid sweep_time setting: {error}");
            issues.push("invalid sweep_time".to_string());
        }
    }

    println!(
        "[OK] calendar offset: {} (today is {})",
        config.offset(),
        config.today()
    );

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let database = Database::open(&config.db_path)?;
    let expired = database.cleanup_expired_sessions(Utc::now().timestamp())?;
    if expired > 0 {
        info!(expired, "expired sessions removed");
    }
    drop(database);

    let shared_config = Arc::new(config);
    let scheduler_fallback = Arc::clone(&shared_config);
    let api_config = Arc::clone(&shared_config);
    let sweeper = Sweeper::new(shared_config.db_path.clone());

    info!("taskpulse service started");

    tokio::select! {
        scheduler_result = scheduler::run_cron_scheduler(move || {
            let sweep_time = Config::load()
                .map(|runtime| runtime.sweep_time)
                .unwrap_or_else(|_| scheduler_fallback.sweep_time.clone());

            scheduler::cron_from_sweep_time(&sweep_time)
        }, shared_config.offset(), move |date| {
            let sweeper = sweeper.clone();
            async move {
                sweeper.run(date).await?;
                Ok(())
            }
        }) => {
            scheduler_result?;
        }
        api_result = api::run_server(api_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn parse_optional_date(config: &Config, date: Option<String>) -> Result<NaiveDate> {
    match date {
        Some(value) => NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .with_context(|| format!("Invalid date format: {value}. Example: 2024-03-10")),
        None => Ok(config.today()),
    }
}

fn load_or_default_config() -> Result<Config> {
    let config_path = Config::config_path()?;
    if config_path.exists() {
        return Config::load();
    }

    warn!(path = %config_path.display(), "config file not found, using defaults");
    Ok(Config::default())
}
