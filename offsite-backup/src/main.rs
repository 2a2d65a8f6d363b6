//! Offsite Backup - Main entry point
//!
//! Dumps every VM and container, encrypts the archives, uploads them as one
//! dated snapshot set and prunes old sets. Meant to be started by cron or a
//! systemd timer.

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use offsite_backup::config::{Config, DEFAULT_CONFIG_PATH};
use offsite_backup::lifecycle::{RunLock, ShutdownCoordinator};
use offsite_backup::tools::Toolset;
use offsite_backup::{utils, Pipeline, RunContext};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", env = "OFFSITE_BACKUP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Back up every workload, upload and prune
    Run,
    /// Check that the environment is ready for a run
    Check,
    /// Apply the retention policy to the remote without backing up
    Prune {
        /// Print decisions without deleting anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("offsite-backup: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    // Load configuration
    let config = Config::from_file(&args.config)?;

    // Checks are read-only and may run beside a backup
    let lock = match args.command {
        Command::Check => None,
        _ => Some(RunLock::acquire(&config.lock_file)?),
    };

    // Initialize logging. Rotation happens only under the lock
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level, &config.log, lock.is_some())?;

    tracing::info!(
        config = %args.config.display(),
        "Starting offsite-backup v{}",
        env!("CARGO_PKG_VERSION")
    );

    let shutdown = ShutdownCoordinator::new();
    let signals = shutdown.listen()?;
    let mut pipeline = Pipeline::new(&config, Toolset::from_config(&config), shutdown);

    let result = match args.command {
        Command::Run => {
            let ctx = RunContext::new(Local::now().naive_local());
            pipeline.run(&ctx).await.map(|_| ())
        }
        Command::Check => pipeline.check().await.map(|()| println!("Environment ready")),
        Command::Prune { dry_run } => pipeline
            .prune(Local::now().date_naive(), dry_run)
            .await
            .map(|(outcome, classification)| {
                if dry_run {
                    for decision in classification.decisions() {
                        let action = if decision.keep() { "keep" } else { "delete" };
                        println!("{:<24} {:<7} {}", decision.set.name(), action, decision.tiers);
                    }
                }
                println!("{}", outcome);
            }),
    };

    signals.abort();
    Ok(result?)
}
