//! SQLite persistence for relay.
//!
//! This crate stores sessions, per-session workflow state and the
//! `workflow_handoffs` records that move context from one session to its
//! successor. Every store operates on a borrowed `rusqlite::Connection` so
//! callers decide whether a group of writes shares a transaction.

pub mod connection;
pub mod migrations;
pub mod models;
pub mod schema;

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for database operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {message}")]
    Migration { message: String },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic database error: {0}")]
    Generic(String),
}

impl Error {
    /// Create a new migration error.
    pub fn migration<S: Into<String>>(message: S) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    /// Create a new generic database error.
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }
}

/// Database connection and management.
pub use connection::Database;

/// Database models and operations.
pub use models::{
    HandoffRecord, HandoffStore, NewHandoffRecord, SessionRecord, SessionStore,
    WorkflowStateRecord, WorkflowStateStore,
};

/// Schema definitions and constants.
pub use schema::*;
