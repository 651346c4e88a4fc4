//! CLI definitions for task-tree.
//!
//! The main entry point is the `Cli` struct; `serve` is the default command.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

/// Hierarchical task manager server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Interface to bind (overrides config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Seconds between archive sweeps (overrides config)
    #[arg(long, global = true)]
    pub archive_interval: Option<u64>,

    /// Disable the periodic archiver
    #[arg(long, global = true)]
    pub no_archive: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the HTTP server and archiver (default if no subcommand given)
    Serve,

    /// Run a single archive sweep and exit
    Archive,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(db_path) = &self.database {
            config.server.db_path = db_path.clone();
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(interval) = self.archive_interval {
            config.archive.interval_seconds = interval;
        }
        if self.no_archive {
            config.archive.enabled = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::parse_from(["task-tree"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log, "2");
        assert!(!cli.verbose);
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = Cli::parse_from([
            "task-tree",
            "--port",
            "8081",
            "--database",
            "/tmp/t.db",
            "--archive-interval",
            "60",
            "--no-archive",
            "archive",
        ]);
        assert_eq!(cli.command, Some(Command::Archive));

        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.db_path, PathBuf::from("/tmp/t.db"));
        assert_eq!(config.archive.interval_seconds, 60);
        assert!(!config.archive.enabled);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
