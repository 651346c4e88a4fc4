//! Task Tree Server
//!
//! Serves the hierarchical task API and archives completed tasks in the
//! background.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use task_tree::archiver::{Archiver, SweepOutcome};
use task_tree::cli::{Cli, Command};
use task_tree::config::{Config, ConfigLoader};
use task_tree::db::Database;
use task_tree::logging::{self, LogTarget};
use task_tree::server;
use task_tree::service::TaskService;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_target: LogTarget = cli.log.parse()?;
    logging::init(&log_target, cli.verbose)?;

    let mut loader = ConfigLoader::load(cli.config.clone())?;
    if let Some(path) = loader.config_path() {
        info!(path = %path.display(), "Loaded configuration");
    }
    cli.apply_overrides(loader.config_mut());
    let config = loader.into_config();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Archive => run_archive(&config),
        Command::Serve => run_server(config).await,
    }
}

fn open_database(config: &Config) -> Result<Arc<Database>> {
    config.ensure_db_dir()?;
    let db = Database::open(&config.server.db_path)?;
    info!(
        path = %config.server.db_path.display(),
        tasks = db.count_tasks()?,
        "Database opened"
    );
    Ok(Arc::new(db))
}

/// Run a single sweep; a failed sweep exits non-zero.
fn run_archive(config: &Config) -> Result<()> {
    let db = open_database(config)?;
    match Archiver::new(db).run_once() {
        SweepOutcome::Archived(count) => {
            info!(count, "Archive sweep finished");
            Ok(())
        }
        SweepOutcome::Skipped => Ok(()),
        SweepOutcome::Failed => anyhow::bail!("archive sweep failed; see log for details"),
    }
}

async fn run_server(config: Config) -> Result<()> {
    let db = open_database(&config)?;
    let service = Arc::new(TaskService::new(Arc::clone(&db), config.pagination));

    let archiver = if config.archive.enabled {
        Some(Arc::new(Archiver::new(Arc::clone(&db))).spawn(config.archive.interval()))
    } else {
        warn!("Periodic archiving disabled");
        None
    };

    let server = server::start_server(service, &config.server.bind_addr()).await?;
    info!("Task API listening on http://{}", server.addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    server.shutdown().await;
    if let Some(archiver) = archiver {
        archiver.shutdown().await;
    }

    info!("Shutdown complete");
    Ok(())
}
