//! Database models and persistence operations.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Database model for sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub project_id: String,
    pub parent_session_id: Option<String>,
    pub summary_markdown: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            parent_session_id: row.get(2)?,
            summary_markdown: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

/// Database model for persisted workflow state.
///
/// `artifacts` and `variables` hold JSON objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStateRecord {
    pub session_id: String,
    pub workflow_name: String,
    pub phase: String,
    pub phase_action_count: i64,
    pub context_injected: bool,
    pub artifacts: String,
    pub variables: String,
    pub updated_at: String,
}

/// Database model for handoff records.
///
/// `artifacts` is a JSON object and `pending_tasks` a JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub id: i64,
    pub project_id: String,
    pub workflow_name: String,
    pub from_session_id: String,
    pub phase: String,
    pub artifacts: String,
    pub pending_tasks: String,
    pub notes: Option<String>,
    pub consumed_by_session: Option<String>,
    pub created_at: String,
}

impl HandoffRecord {
    /// Whether no session has claimed this record yet.
    pub fn is_open(&self) -> bool {
        self.consumed_by_session.is_none()
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            workflow_name: row.get(2)?,
            from_session_id: row.get(3)?,
            phase: row.get(4)?,
            artifacts: row.get(5)?,
            pending_tasks: row.get(6)?,
            notes: row.get(7)?,
            consumed_by_session: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

/// Fields for a handoff that has not been written yet. Inserted rows are always open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHandoffRecord {
    pub project_id: String,
    pub workflow_name: String,
    pub from_session_id: String,
    pub phase: String,
    pub artifacts: String,
    pub pending_tasks: String,
    pub notes: Option<String>,
    pub created_at: String,
}

const HANDOFF_COLUMNS: &str = "id, project_id, workflow_name, from_session_id, phase, artifacts, pending_tasks, notes, consumed_by_session, created_at";

/// Database operations for sessions.
pub struct SessionStore<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> SessionStore<'a> {
    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, record: &SessionRecord) -> crate::Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO sessions (id, project_id, parent_session_id, summary_markdown, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.id,
                record.project_id,
                record.parent_session_id,
                record.summary_markdown,
                record.status,
                record.created_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, session_id: &str) -> crate::Result<Option<SessionRecord>> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT id, project_id, parent_session_id, summary_markdown, status, created_at, updated_at
                FROM sessions WHERE id = ?
                "#,
                params![session_id],
                SessionRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Update the status column. Returns false when no such session exists.
    pub fn update_status(&self, session_id: &str, status: &str, updated_at: &str) -> crate::Result<bool> {
        let changed = self.conn.execute(
            r#"
            UPDATE sessions
            SET status = ?, updated_at = ?
            WHERE id = ?
            "#,
            params![status, updated_at, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Replace the summary text. Returns false when no such session exists.
    pub fn update_summary(
        &self,
        session_id: &str,
        summary_markdown: Option<&str>,
        updated_at: &str,
    ) -> crate::Result<bool> {
        let changed = self.conn.execute(
            r#"
            UPDATE sessions
            SET summary_markdown = ?, updated_at = ?
            WHERE id = ?
            "#,
            params![summary_markdown, updated_at, session_id],
        )?;
        Ok(changed > 0)
    }

    pub fn list_by_project(&self, project_id: &str) -> crate::Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, project_id, parent_session_id, summary_markdown, status, created_at, updated_at
            FROM sessions
            WHERE project_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )?;

        let records = stmt.query_map(params![project_id], SessionRecord::from_row)?;

        let mut sessions = Vec::new();
        for record in records {
            sessions.push(record?);
        }
        Ok(sessions)
    }
}

/// Database operations for workflow state.
pub struct WorkflowStateStore<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> WorkflowStateStore<'a> {
    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Insert or replace the state row for `record.session_id`.
    pub fn save(&self, record: &WorkflowStateRecord) -> crate::Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO workflow_states (session_id, workflow_name, phase, phase_action_count, context_injected, artifacts, variables, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                workflow_name = excluded.workflow_name,
                phase = excluded.phase,
                phase_action_count = excluded.phase_action_count,
                context_injected = excluded.context_injected,
                artifacts = excluded.artifacts,
                variables = excluded.variables,
                updated_at = excluded.updated_at
            "#,
            params![
                record.session_id,
                record.workflow_name,
                record.phase,
                record.phase_action_count,
                record.context_injected,
                record.artifacts,
                record.variables,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    pub fn load(&self, session_id: &str) -> crate::Result<Option<WorkflowStateRecord>> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT session_id, workflow_name, phase, phase_action_count, context_injected, artifacts, variables, updated_at
                FROM workflow_states WHERE session_id = ?
                "#,
                params![session_id],
                |row| {
                    Ok(WorkflowStateRecord {
                        session_id: row.get(0)?,
                        workflow_name: row.get(1)?,
                        phase: row.get(2)?,
                        phase_action_count: row.get(3)?,
                        context_injected: row.get(4)?,
                        artifacts: row.get(5)?,
                        variables: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}

/// Database operations for handoff records.
pub struct HandoffStore<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> HandoffStore<'a> {
    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Insert a new, unclaimed handoff. Never deduplicates.
    pub fn insert(&self, record: &NewHandoffRecord) -> crate::Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO workflow_handoffs (project_id, workflow_name, from_session_id, phase, artifacts, pending_tasks, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.project_id,
                record.workflow_name,
                record.from_session_id,
                record.phase,
                record.artifacts,
                record.pending_tasks,
                record.notes,
                record.created_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get(&self, id: i64) -> crate::Result<Option<HandoffRecord>> {
        let sql = format!("SELECT {HANDOFF_COLUMNS} FROM workflow_handoffs WHERE id = ?");
        let record = self
            .conn
            .query_row(&sql, params![id], HandoffRecord::from_row)
            .optional()?;
        Ok(record)
    }

    /// The most recent handoff already claimed by `session_id`.
    pub fn find_consumed_by(&self, session_id: &str) -> crate::Result<Option<HandoffRecord>> {
        let sql = format!(
            "SELECT {HANDOFF_COLUMNS} FROM workflow_handoffs \
             WHERE consumed_by_session = ? ORDER BY id DESC LIMIT 1"
        );
        let record = self
            .conn
            .query_row(&sql, params![session_id], HandoffRecord::from_row)
            .optional()?;
        Ok(record)
    }

    /// Claim the oldest open handoff matching the filters for `session_id`.
    ///
    /// This is a single conditional UPDATE: the row is only written while
    /// `consumed_by_session` is still NULL, so of any number of concurrent
    /// callers exactly one gets the row back and the rest get `None`.
    pub fn claim(
        &self,
        session_id: &str,
        project_id: &str,
        workflow_name: Option<&str>,
    ) -> crate::Result<Option<HandoffRecord>> {
        let sql = format!(
            r#"
            UPDATE workflow_handoffs
            SET consumed_by_session = ?1
            WHERE id = (
                SELECT id FROM workflow_handoffs
                WHERE consumed_by_session IS NULL
                  AND project_id = ?2
                  AND (?3 IS NULL OR workflow_name = ?3)
                ORDER BY id ASC
                LIMIT 1
            )
            AND consumed_by_session IS NULL
            RETURNING {HANDOFF_COLUMNS}
            "#
        );
        let record = self
            .conn
            .query_row(
                &sql,
                params![session_id, project_id, workflow_name],
                HandoffRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Open handoffs for a project, oldest first.
    pub fn list_open(&self, project_id: &str) -> crate::Result<Vec<HandoffRecord>> {
        let sql = format!(
            "SELECT {HANDOFF_COLUMNS} FROM workflow_handoffs \
             WHERE project_id = ? AND consumed_by_session IS NULL ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt.query_map(params![project_id], HandoffRecord::from_row)?;

        let mut handoffs = Vec::new();
        for record in records {
            handoffs.push(record?);
        }
        Ok(handoffs)
    }

    pub fn list_by_session(&self, from_session_id: &str) -> crate::Result<Vec<HandoffRecord>> {
        let sql = format!(
            "SELECT {HANDOFF_COLUMNS} FROM workflow_handoffs \
             WHERE from_session_id = ? ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt.query_map(params![from_session_id], HandoffRecord::from_row)?;

        let mut handoffs = Vec::new();
        for record in records {
            handoffs.push(record?);
        }
        Ok(handoffs)
    }
}
