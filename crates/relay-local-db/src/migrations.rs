//! Database migration management.

use rusqlite::{params, Connection};

/// Database migration manager.
pub struct MigrationManager;

impl MigrationManager {
    /// Apply all pending migrations to the database.
    pub fn migrate(conn: &Connection) -> crate::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        let current_version = Self::current_version(conn)?.unwrap_or(0);
        if current_version > crate::SCHEMA_VERSION {
            return Err(crate::Error::migration(format!(
                "database schema version {} is newer than supported version {}",
                current_version,
                crate::SCHEMA_VERSION
            )));
        }

        if current_version < 1 {
            tracing::debug!("Applying relay schema migration 1");
            Self::apply_migration_1(conn)?;
        }

        Ok(())
    }

    /// Migration 1: sessions, workflow state and handoff records.
    fn apply_migration_1(conn: &Connection) -> crate::Result<()> {
        conn.execute_batch(
            r#"
            -- Sessions as seen by the workflow engine; lifecycle lives elsewhere
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                parent_session_id TEXT REFERENCES sessions(id) ON DELETE SET NULL,
                summary_markdown TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Per-session workflow runtime state, saved by the driver between dispatches
            CREATE TABLE IF NOT EXISTS workflow_states (
                session_id TEXT PRIMARY KEY,
                workflow_name TEXT NOT NULL,
                phase TEXT NOT NULL,
                phase_action_count INTEGER NOT NULL DEFAULT 0,
                context_injected INTEGER NOT NULL DEFAULT 0,
                artifacts TEXT NOT NULL DEFAULT '{}',
                variables TEXT NOT NULL DEFAULT '{}',
                updated_at TEXT NOT NULL
            );

            -- Handoffs from a finishing session to its successor.
            -- consumed_by_session IS NULL means open; it is set exactly once.
            CREATE TABLE IF NOT EXISTS workflow_handoffs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id TEXT NOT NULL,
                workflow_name TEXT NOT NULL,
                from_session_id TEXT NOT NULL,
                phase TEXT NOT NULL,
                artifacts TEXT NOT NULL DEFAULT '{}',
                pending_tasks TEXT NOT NULL DEFAULT '[]',
                notes TEXT,
                consumed_by_session TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_id);
            CREATE INDEX IF NOT EXISTS idx_handoffs_open
                ON workflow_handoffs(project_id, consumed_by_session);
            CREATE INDEX IF NOT EXISTS idx_handoffs_consumer
                ON workflow_handoffs(consumed_by_session);

            INSERT OR REPLACE INTO schema_migrations (version) VALUES (1);
            "#,
        )?;

        Ok(())
    }

    /// Get the current schema version.
    pub fn current_version(conn: &Connection) -> crate::Result<Option<u32>> {
        let version: Option<u32> =
            conn.query_row("SELECT MAX(version) FROM schema_migrations", params![], |row| {
                row.get(0)
            })?;

        Ok(version)
    }
}
