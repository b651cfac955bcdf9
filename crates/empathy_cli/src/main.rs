//! `empathy` command-line runner.
//!
//! # Responsibility
//! - Load config, start logging and dispatch one command.
//! - Print command results as JSON on stdout.

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use empathy_core::db::open_db;
use empathy_core::repo::diary_repo::SqliteDiaryRepository;
use empathy_core::{empathy_digest, init_logging, EngineConfig, Scheduler};
use log::info;
use serde::Serialize;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig::load(cli.config.as_deref()).context("failed to load config")?;
    init_logging(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Match => {
            let report = Scheduler::new(config).trigger_matching().await;
            print_json(&report)?;
            if !report.success {
                bail!(report.message);
            }
            Ok(())
        }
        Commands::Cleanup => {
            let report = Scheduler::new(config).trigger_cleanup().await;
            print_json(&report)?;
            if !report.success {
                bail!(report.message);
            }
            Ok(())
        }
        Commands::Status => {
            let enabled = config.scheduler.enabled;
            let scheduler = Scheduler::new(config);
            print_json(&serde_json::json!({
                "enabled": enabled,
                "status": scheduler.status(),
                "schedule": scheduler.preview(Local::now()),
            }))
        }
        Commands::Digest => {
            let conn = open_db(&config.storage.database_path).with_context(|| {
                format!(
                    "failed to open database `{}`",
                    config.storage.database_path.display()
                )
            })?;
            let repo = SqliteDiaryRepository::new(&conn);
            let words = empathy_digest(&repo, Utc::now().timestamp_millis())?;
            print_json(&words)
        }
    }
}

async fn run(config: EngineConfig) -> Result<()> {
    if !config.scheduler.enabled {
        bail!("scheduler is disabled by configuration");
    }

    let scheduler = Scheduler::new(config);
    scheduler.start()?;
    print_json(&scheduler.status())?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("event=shutdown_signal module=cli status=ok");
    scheduler.shutdown();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
