//! Quit-list reconciliation entry point.
//!
//! # Responsibility
//! - Load configuration, initialize logging and own the database connection.
//! - Run one batch and map fatal failures to a non-zero exit code.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::info;
use quitsweep_core::db::open_db;
use quitsweep_core::{
    flush_logging, init_logging, load_config, locate_config, read_quit_file, BatchController,
    BatchOptions, BatchReport,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "quitsweep")]
#[command(about = "Reconcile a quit list and soft-delete matched participants")]
#[command(version)]
struct Cli {
    /// Quit list to process (`first_name,last_name,email,company,soft_deleted`).
    input: PathBuf,

    /// Configuration file; defaults to $QUITSWEEP_CONFIG, then ./quitsweep.json.
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the configuration.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log level (trace|debug|info|warn|error), overriding the configuration.
    #[arg(long)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Run every row and roll it back instead of committing.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = run(cli);
    flush_logging();

    match outcome {
        Ok(report) => {
            println!(
                "quitsweep rows={} committed={} rolled_back={} skipped={}",
                report.rows.len(),
                report.committed(),
                report.rolled_back(),
                report.skipped()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("quitsweep: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<BatchReport> {
    let source = locate_config(cli.config.as_deref());
    let mut config = load_config(&source)
        .with_context(|| format!("loading configuration from `{}`", source.path().display()))?;

    if let Some(db) = cli.db {
        config.database.path = db;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
        config.debug_mode = false;
    }
    if let Some(dir) = cli.log_dir {
        config.logging.dir = Some(dir);
    }

    init_logging(config.effective_log_level(), config.logging.dir.as_deref())
        .map_err(|err| anyhow!(err))
        .context("initializing logging")?;
    info!(
        "event=config_loaded module=cli status=ok env={} source={} db={}",
        config.env,
        source.path().display(),
        config.database.path.display()
    );

    let rows = read_quit_file(&cli.input)?;
    let mut conn = open_db(&config.database).context("preparing storage")?;

    let options = BatchOptions {
        dry_run: cli.dry_run,
    };
    Ok(BatchController::new(&mut conn, options).process_batch(rows))
}
