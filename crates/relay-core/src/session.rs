//! Sessions as seen by the workflow engine.
//!
//! Session lifecycle (creation by an agent host, transcript ingestion,
//! summarisation) happens elsewhere. The engine only needs to resolve a
//! session, follow its parent link and flip its status.

use crate::handoff::{HandoffDraft, HandoffManager};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_local_db::{Database, HandoffStore, SessionRecord, SessionStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a session in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session is running.
    Active,
    /// Session is paused.
    Paused,
    /// Session produced a handoff and waits for a successor to claim it.
    HandoffReady,
    /// Session completed successfully.
    Completed,
    /// Session failed with an error.
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::HandoffReady => "handoff_ready",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "paused" => Ok(SessionStatus::Paused),
            "handoff_ready" => Ok(SessionStatus::HandoffReady),
            "completed" => Ok(SessionStatus::Completed),
            "failed" => Ok(SessionStatus::Failed),
            other => Err(crate::Error::session(format!("Unknown session status: {}", other))),
        }
    }
}

/// A session referenced by workflow actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_id: String,
    pub parent_session_id: Option<String>,
    pub summary_markdown: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new active session.
    pub fn new(id: String, project_id: String, parent_session_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            parent_session_id,
            summary_markdown: None,
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// The summary text, if present and non-empty.
    pub fn summary(&self) -> Option<&str> {
        self.summary_markdown
            .as_deref()
            .filter(|summary| !summary.is_empty())
    }

    pub(crate) fn from_record(record: SessionRecord) -> crate::Result<Self> {
        Ok(Self {
            status: record.status.parse()?,
            created_at: parse_timestamp(&record.created_at, "created_at")?,
            updated_at: parse_timestamp(&record.updated_at, "updated_at")?,
            id: record.id,
            project_id: record.project_id,
            parent_session_id: record.parent_session_id,
            summary_markdown: record.summary_markdown,
        })
    }

    pub(crate) fn to_record(&self) -> SessionRecord {
        SessionRecord {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
            parent_session_id: self.parent_session_id.clone(),
            summary_markdown: self.summary_markdown.clone(),
            status: self.status.as_str().to_string(),
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }
}

pub(crate) fn parse_timestamp(value: &str, field: &str) -> crate::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| crate::Error::generic(format!("Invalid {}: {}", field, e)))
}

/// Session lookup capability handed to action handlers.
#[async_trait]
pub trait SessionLookup: Send + Sync {
    /// Resolve a session by id. `Ok(None)` when it does not exist.
    async fn get(&self, session_id: &str) -> crate::Result<Option<Session>>;

    /// Set the status of an existing session.
    async fn update_status(&self, session_id: &str, status: SessionStatus) -> crate::Result<()>;

    /// Record `draft` as an open handoff and mark its session `handoff_ready`.
    ///
    /// The default inserts through `handoffs` and then calls `update_status`;
    /// those are two separate commits.
    async fn publish_handoff(
        &self,
        handoffs: &HandoffManager,
        draft: &HandoffDraft,
    ) -> crate::Result<i64> {
        let id = handoffs.insert(draft)?;
        self.update_status(&draft.from_session_id, SessionStatus::HandoffReady)
            .await?;
        Ok(id)
    }
}

/// SQLite-backed session manager.
#[derive(Debug, Clone)]
pub struct SessionManager {
    db: Database,
}

impl SessionManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a new active session, optionally linked to a parent session.
    pub fn register(
        &self,
        project_id: &str,
        parent_session_id: Option<&str>,
    ) -> crate::Result<Session> {
        let session = Session::new(
            uuid::Uuid::new_v4().to_string(),
            project_id.to_string(),
            parent_session_id.map(str::to_string),
        );
        self.db
            .with_connection(|conn| SessionStore::new(conn).insert(&session.to_record()))?;
        tracing::debug!(session_id = %session.id, project_id, "Registered session");
        Ok(session)
    }

    pub fn find(&self, session_id: &str) -> crate::Result<Option<Session>> {
        let record = self
            .db
            .with_connection(|conn| SessionStore::new(conn).get(session_id))?;
        record.map(Session::from_record).transpose()
    }

    pub fn set_status(&self, session_id: &str, status: SessionStatus) -> crate::Result<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.db.with_connection(|conn| {
            SessionStore::new(conn).update_status(session_id, status.as_str(), &now)
        })?;
        if !updated {
            return Err(crate::Error::session(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    /// Replace the session summary that successors inject as context.
    pub fn update_summary(&self, session_id: &str, summary_markdown: &str) -> crate::Result<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.db.with_connection(|conn| {
            SessionStore::new(conn).update_summary(session_id, Some(summary_markdown), &now)
        })?;
        if !updated {
            return Err(crate::Error::session(format!("Session {} not found", session_id)));
        }
        Ok(())
    }

    /// Insert `draft` and mark its session `handoff_ready` in one transaction.
    ///
    /// Nobody observes a handoff whose session still reads as active, and a
    /// missing session leaves no record behind.
    pub fn commit_handoff(&self, draft: &HandoffDraft) -> crate::Result<i64> {
        let record = draft.to_record()?;
        let published = self.db.transaction(|conn| {
            let sessions = SessionStore::new(conn);
            if sessions.get(&record.from_session_id)?.is_none() {
                return Ok(None);
            }
            let id = HandoffStore::new(conn).insert(&record)?;
            sessions.update_status(
                &record.from_session_id,
                SessionStatus::HandoffReady.as_str(),
                &record.created_at,
            )?;
            Ok(Some(id))
        })?;

        let Some(id) = published else {
            return Err(crate::Error::handoff(format!(
                "Session {} not found while publishing handoff",
                draft.from_session_id
            )));
        };

        tracing::info!(
            handoff_id = id,
            from_session_id = %draft.from_session_id,
            workflow = %draft.workflow_name,
            phase = %draft.phase,
            "Published handoff"
        );
        Ok(id)
    }

    pub fn list_for_project(&self, project_id: &str) -> crate::Result<Vec<Session>> {
        let records = self
            .db
            .with_connection(|conn| SessionStore::new(conn).list_by_project(project_id))?;
        records.into_iter().map(Session::from_record).collect()
    }
}

#[async_trait]
impl SessionLookup for SessionManager {
    async fn get(&self, session_id: &str) -> crate::Result<Option<Session>> {
        self.find(session_id)
    }

    async fn update_status(&self, session_id: &str, status: SessionStatus) -> crate::Result<()> {
        self.set_status(session_id, status)
    }

    // Both rows live in this manager's database, so they commit together.
    async fn publish_handoff(
        &self,
        _handoffs: &HandoffManager,
        draft: &HandoffDraft,
    ) -> crate::Result<i64> {
        self.commit_handoff(draft)
    }
}
