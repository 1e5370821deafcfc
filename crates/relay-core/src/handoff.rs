//! Handoff records and the claim protocol.
//!
//! A finishing session publishes a handoff through its session collaborator
//! (see [`crate::session::SessionLookup::publish_handoff`]); a successor
//! session claims it. Publishing is always a fresh, open record. Claiming is one conditional
//! UPDATE in SQLite, so a record moves from open to claimed exactly once.

use crate::session::parse_timestamp;
use chrono::{DateTime, Utc};
use relay_local_db::{Database, HandoffRecord, HandoffStore, NewHandoffRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Notes written on generated handoffs until a summariser provides real ones.
pub const DEFAULT_HANDOFF_NOTES: &str = "Auto-generated handoff";

/// A durable handoff from one session to its successor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    pub id: i64,
    pub project_id: String,
    pub workflow_name: String,
    pub from_session_id: String,
    /// Phase of the originating session when the handoff was created.
    pub phase: String,
    pub artifacts: BTreeMap<String, String>,
    pub pending_tasks: Vec<String>,
    pub notes: Option<String>,
    /// `None` while open.
    pub consumed_by_session: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Handoff {
    pub fn is_open(&self) -> bool {
        self.consumed_by_session.is_none()
    }

    /// Plain-text rendering injected into the successor's context.
    ///
    /// Empty when the record carries neither notes nor pending tasks.
    pub fn injection_text(&self) -> String {
        let mut text = String::new();
        if let Some(notes) = self.notes.as_deref().filter(|n| !n.is_empty()) {
            text.push_str(&format!("Handoff Notes: {}\n", notes));
        }
        if !self.pending_tasks.is_empty() {
            text.push_str("Pending Tasks:\n");
            for task in &self.pending_tasks {
                text.push_str(&format!("- {}\n", task));
            }
        }
        text
    }

    fn from_record(record: HandoffRecord) -> crate::Result<Self> {
        Ok(Self {
            artifacts: serde_json::from_str(&record.artifacts)?,
            pending_tasks: serde_json::from_str(&record.pending_tasks)?,
            created_at: parse_created_at(&record.created_at)?,
            id: record.id,
            project_id: record.project_id,
            workflow_name: record.workflow_name,
            from_session_id: record.from_session_id,
            phase: record.phase,
            notes: record.notes,
            consumed_by_session: record.consumed_by_session,
        })
    }
}

// Rows inserted outside relay may carry SQLite's default timestamp, which has no offset.
fn parse_created_at(value: &str) -> crate::Result<DateTime<Utc>> {
    parse_timestamp(value, "created_at").or_else(|err| {
        chrono::NaiveDateTime::parse_from_str(value.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| err)
    })
}

/// Contents of a handoff about to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct HandoffDraft {
    pub project_id: String,
    pub workflow_name: String,
    pub from_session_id: String,
    pub phase: String,
    pub artifacts: BTreeMap<String, String>,
    pub pending_tasks: Vec<String>,
    pub notes: Option<String>,
}

impl HandoffDraft {
    pub(crate) fn to_record(&self) -> crate::Result<NewHandoffRecord> {
        Ok(NewHandoffRecord {
            project_id: self.project_id.clone(),
            workflow_name: self.workflow_name.clone(),
            from_session_id: self.from_session_id.clone(),
            phase: self.phase.clone(),
            artifacts: serde_json::to_string(&self.artifacts)?,
            pending_tasks: serde_json::to_string(&self.pending_tasks)?,
            notes: self.notes.clone(),
            created_at: Utc::now().to_rfc3339(),
        })
    }
}

/// Creates, claims and queries handoff records.
#[derive(Debug, Clone)]
pub struct HandoffManager {
    db: Database,
}

impl HandoffManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert an open handoff without touching the originating session.
    pub fn insert(&self, draft: &HandoffDraft) -> crate::Result<i64> {
        let record = draft.to_record()?;
        let id = self
            .db
            .with_connection(|conn| HandoffStore::new(conn).insert(&record))?;
        debug!(handoff_id = id, from_session_id = %draft.from_session_id, "Inserted handoff");
        Ok(id)
    }

    /// Atomically claim the oldest open handoff matching the filters.
    ///
    /// Returns `None` when nothing matches, including when another session won
    /// the race for the last open record.
    pub fn claim(
        &self,
        session_id: &str,
        project_id: &str,
        workflow_name: Option<&str>,
    ) -> crate::Result<Option<Handoff>> {
        let record = self.db.with_connection(|conn| {
            HandoffStore::new(conn).claim(session_id, project_id, workflow_name)
        })?;

        match record {
            Some(record) => {
                info!(
                    handoff_id = record.id,
                    session_id,
                    from_session_id = %record.from_session_id,
                    "Claimed handoff"
                );
                Handoff::from_record(record).map(Some)
            }
            None => {
                debug!(session_id, project_id, ?workflow_name, "No open handoff to claim");
                Ok(None)
            }
        }
    }

    /// The most recent handoff already claimed by `session_id`.
    pub fn find_claimed_by(&self, session_id: &str) -> crate::Result<Option<Handoff>> {
        let record = self
            .db
            .with_connection(|conn| HandoffStore::new(conn).find_consumed_by(session_id))?;
        record.map(Handoff::from_record).transpose()
    }

    pub fn get(&self, id: i64) -> crate::Result<Option<Handoff>> {
        let record = self
            .db
            .with_connection(|conn| HandoffStore::new(conn).get(id))?;
        record.map(Handoff::from_record).transpose()
    }

    pub fn list_open(&self, project_id: &str) -> crate::Result<Vec<Handoff>> {
        let records = self
            .db
            .with_connection(|conn| HandoffStore::new(conn).list_open(project_id))?;
        records.into_iter().map(Handoff::from_record).collect()
    }

    /// Every handoff published by `from_session_id`, oldest first.
    pub fn list_from_session(&self, from_session_id: &str) -> crate::Result<Vec<Handoff>> {
        let records = self
            .db
            .with_connection(|conn| HandoffStore::new(conn).list_by_session(from_session_id))?;
        records.into_iter().map(Handoff::from_record).collect()
    }
}
