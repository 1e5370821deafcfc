//! Relay CLI library

pub mod action;
pub mod handoff;
pub mod session;

use anyhow::{Context, Result};
use relay_core::DatabaseManager;
use std::path::PathBuf;

// Re-export CLI types for testing
pub use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Workflow actions and session handoffs")]
#[command(version, author, long_about = None)]
pub struct Cli {
    /// Path to the state database (defaults to $RELAY_HOME/state.db)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Session management commands
    Session {
        #[command(subcommand)]
        subcommand: session::SessionCommands,
    },
    /// Workflow action commands
    Action {
        #[command(subcommand)]
        subcommand: action::ActionCommands,
    },
    /// Handoff commands
    Handoff {
        #[command(subcommand)]
        subcommand: handoff::HandoffCommands,
    },
}

impl Cli {
    /// Open the database selected by `--db`, or the default one.
    pub fn open_database(&self) -> Result<DatabaseManager> {
        match &self.db {
            Some(path) => DatabaseManager::with_path(path)
                .with_context(|| format!("Failed to open database at {}", path.display())),
            None => DatabaseManager::new().context("Failed to open default database"),
        }
    }

    pub fn tracing_level(&self) -> tracing::Level {
        match self.log_level.as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "info" => tracing::Level::INFO,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}
