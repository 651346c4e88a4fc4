//! Task Tree Library
//!
//! Hierarchical task storage with cascade delete, cycle-safe moves, tree
//! reconstruction and periodic archiving, plus the HTTP API that exposes it.

pub mod archiver;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod server;
pub mod service;
pub mod tree;
pub mod types;
